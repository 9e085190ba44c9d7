use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

pub type ChatId = u64;

pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["true", "false"];

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    pub options: Vec<String>,
}

impl Question {
    pub fn new(text: String, options: Vec<String>) -> Self {
        Self { text, options }
    }

    pub fn true_false(text: String) -> Self {
        Self::new(
            text,
            TRUE_FALSE_OPTIONS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// One generated quiz. Questions are identified by their position.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Quiz {
    pub questions: Vec<Question>,

    pub hash: String,
}

impl Quiz {
    pub fn new(questions: Vec<Question>) -> Self {
        let hash = Self::hash_data(&questions[..]);

        Self { questions, hash }
    }

    fn hash_data(questions: &[Question]) -> String {
        let mut hasher = blake3::Hasher::new();

        for question in questions {
            hasher.update(question.text.as_bytes());
            hasher.update(&[0]);

            for option in &question.options {
                hasher.update(option.as_bytes());
                hasher.update(&[0]);
            }

            hasher.update(&[1]);
        }

        hasher.finalize().to_string()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(12)]
    }
}

/// Selected option per question index. Last write wins.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<usize, String>);

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().map(|(index, option)| (*index, option.as_str()))
    }

    pub(crate) fn insert(&mut self, index: usize, option: String) -> Option<String> {
        self.0.insert(index, option)
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(ParseError::Difficulty(s.to_owned())),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Multiple,
    TrueFalse,
}

impl FromStr for QuestionType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multiple" => Ok(Self::Multiple),
            "truefalse" => Ok(Self::TrueFalse),
            _ => Err(ParseError::QuestionType(s.to_owned())),
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Multiple => "multiple",
            Self::TrueFalse => "truefalse",
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    pub num_questions: u32,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradingResult {
    /// Where the backend stored the graded quiz.
    pub saved_artifact_ref: String,
    pub review_message: ConversationMessage,
}
