use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::{AnswerMap, ConversationMessage, Question};

/// Shapes a generation payload can take, in dispatch priority order.
#[derive(Debug)]
pub enum RawQuizPayload {
    List(Vec<Value>),
    Wrapped(Vec<Value>),
    Single(Map<String, Value>),
}

impl RawQuizPayload {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Self::List(items)),
            Value::Object(mut object) => {
                if matches!(object.get("quiz"), Some(Value::Array(_))) {
                    match object.remove("quiz") {
                        Some(Value::Array(items)) => Some(Self::Wrapped(items)),
                        _ => None,
                    }
                } else if object.get("question").map_or(false, |q| !q.is_null()) {
                    Some(Self::Single(object))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            Self::List(items) | Self::Wrapped(items) => items,
            Self::Single(object) => vec![Value::Object(object)],
        }
    }
}

/// One question element as the backend sent it. Any other fields are ignored.
#[derive(Debug, Default)]
pub struct RawQuestionData {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
}

impl RawQuestionData {
    pub fn from_value(value: &Value) -> Self {
        let question = value.get("question").and_then(scalar_text);
        let options = value
            .get("options")
            .and_then(Value::as_array)
            .map(|options| options.iter().map(option_text).collect());

        Self { question, options }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn option_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Deserialize, Debug)]
pub struct RawGenerationResponse {
    pub content: String,
}

#[derive(Serialize, Debug)]
pub struct RawGradingRequest<'a> {
    pub quiz: &'a [Question],
    pub answers: &'a AnswerMap,
}

#[derive(Deserialize, Debug)]
pub struct RawGradingResponse {
    pub saved_path: String,
    pub review: ConversationMessage,
}

#[derive(Serialize, Debug)]
pub struct RawSendMessageRequest<'a> {
    pub message: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct RawSendMessageResponse {
    pub reply: String,
}
