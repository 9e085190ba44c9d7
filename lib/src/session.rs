use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::conversation::{strip_think, ConversationLog};
use crate::data::{
    AnswerMap, ChatId, ConversationMessage, Difficulty, GenerationRequest, GradingResult,
    QuestionType, Question, Quiz,
};
use crate::error::{GenerationError, SessionError};
use crate::gateway::QuizGateway;
use crate::normalize::normalize_quiz;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
    Ready,
    Submitting,
    Graded,
    TipsRequested,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Submitting => "submitting",
            Self::Graded => "graded",
            Self::TipsRequested => "waiting on tips",
        })
    }
}

#[derive(Debug)]
struct SessionState {
    phase: Phase,
    /// Phase restored when an in-flight generation fails.
    resting_phase: Phase,
    quiz: Quiz,
    answers: AnswerMap,
    grading_result: Option<GradingResult>,
    log: ConversationLog,
    /// Bumped by every generation. Responses tagged with an older value are dropped.
    sequence: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            resting_phase: Phase::Idle,
            quiz: Quiz::default(),
            answers: AnswerMap::new(),
            grading_result: None,
            log: ConversationLog::new(),
            sequence: 0,
        }
    }
}

/// Everything a view needs to re-render.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub quiz: Quiz,
    pub answers: AnswerMap,
    pub grading_result: Option<GradingResult>,
    pub messages: Vec<ConversationMessage>,
}

/// Quiz state for one chat view.
///
/// Operations take `&self` so that overlapping calls can be awaited
/// concurrently; the state lock is never held across a gateway call.
pub struct QuizSession<G> {
    chat_id: ChatId,
    gateway: G,
    max_questions: u32,
    state: Mutex<SessionState>,
}

impl<G: QuizGateway> QuizSession<G> {
    pub fn new(chat_id: ChatId, gateway: G, max_questions: u32) -> Self {
        Self {
            chat_id,
            gateway,
            max_questions,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn quiz(&self) -> Quiz {
        self.state().quiz.clone()
    }

    pub fn questions(&self) -> Vec<Question> {
        self.state().quiz.questions.clone()
    }

    pub fn answers(&self) -> AnswerMap {
        self.state().answers.clone()
    }

    pub fn answer(&self, index: usize) -> Option<String> {
        self.state().answers.get(index).map(str::to_owned)
    }

    pub fn grading_result(&self) -> Option<GradingResult> {
        self.state().grading_result.clone()
    }

    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.state().log.messages().to_vec()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();

        SessionSnapshot {
            phase: state.phase,
            quiz: state.quiz.clone(),
            answers: state.answers.clone(),
            grading_result: state.grading_result.clone(),
            messages: state.log.messages().to_vec(),
        }
    }

    /// Requests a new quiz and replaces the current one with it.
    ///
    /// Unsubmitted answers are discarded. A call made while another
    /// generation is pending supersedes it.
    pub async fn generate(
        &self,
        num_questions: u32,
        difficulty: Difficulty,
        question_type: QuestionType,
    ) -> Result<Quiz, SessionError> {
        if num_questions == 0 || num_questions > self.max_questions {
            return Err(SessionError::InvalidQuestionCount {
                requested: num_questions,
                max: self.max_questions,
            });
        }

        let request = GenerationRequest {
            num_questions,
            difficulty,
            question_type,
        };

        let sequence = {
            let mut state = self.state();

            match state.phase {
                Phase::Idle | Phase::Ready | Phase::Graded | Phase::TipsRequested => {
                    state.resting_phase = state.phase;
                }
                Phase::Generating => {}
                phase => {
                    return Err(SessionError::InvalidPhase {
                        operation: "generate a quiz",
                        phase,
                    })
                }
            }

            state.phase = Phase::Generating;
            state.sequence += 1;
            debug!("Generation #{} started for chat {}", state.sequence, self.chat_id);

            state.sequence
        };

        let outcome = self.fetch_quiz(&request).await;

        let mut state = self.state();

        if state.sequence != sequence {
            warn!("Discarding stale generation #{sequence}, current is #{}", state.sequence);
            return Err(SessionError::Superseded);
        }

        match outcome {
            Ok((payload, quiz)) => {
                info!(
                    "Generated quiz {} with {} question(s) for chat {}",
                    quiz.short_hash(),
                    quiz.len(),
                    self.chat_id
                );

                state.quiz = quiz.clone();
                state.answers.clear();
                state.grading_result = None;
                state.log.append(ConversationMessage::assistant(payload));
                state.phase = Phase::Ready;
                state.resting_phase = Phase::Ready;

                Ok(quiz)
            }
            Err(e) => {
                state.phase = state.resting_phase;

                Err(SessionError::GenerationFailed(e))
            }
        }
    }

    async fn fetch_quiz(
        &self,
        request: &GenerationRequest,
    ) -> Result<(String, Quiz), GenerationError> {
        let raw = self
            .gateway
            .request_generation(self.chat_id, request)
            .await?;
        let payload = strip_think(&raw);
        let quiz = normalize_quiz(&payload)?;

        Ok((payload, quiz))
    }

    pub fn select_answer(&self, index: usize, option: &str) -> Result<(), SessionError> {
        let mut state = self.state();

        if !matches!(state.phase, Phase::Ready | Phase::Generating) {
            return Err(SessionError::InvalidPhase {
                operation: "select an answer",
                phase: state.phase,
            });
        }

        let len = state.quiz.len();
        let question = state
            .quiz
            .questions
            .get(index)
            .ok_or(SessionError::IndexOutOfRange { index, len })?;

        if !question.has_option(option) {
            return Err(SessionError::UnknownOption {
                index,
                option: option.to_owned(),
            });
        }

        state.answers.insert(index, option.to_owned());

        Ok(())
    }

    /// Sends the answers for grading. Every question must be answered.
    pub async fn submit(&self) -> Result<GradingResult, SessionError> {
        let (questions, answers) = {
            let mut state = self.state();

            if state.phase != Phase::Ready {
                return Err(SessionError::InvalidPhase {
                    operation: "submit answers",
                    phase: state.phase,
                });
            }

            if state.answers.len() != state.quiz.len() {
                return Err(SessionError::IncompleteAnswers {
                    answered: state.answers.len(),
                    total: state.quiz.len(),
                });
            }

            state.phase = Phase::Submitting;

            (state.quiz.questions.clone(), state.answers.clone())
        };

        let outcome = self
            .gateway
            .submit_grading(self.chat_id, &questions[..], &answers)
            .await;

        let mut state = self.state();

        match outcome {
            Ok(result) => {
                info!(
                    "Quiz graded for chat {}, saved to {}",
                    self.chat_id, result.saved_artifact_ref
                );

                state.log.append(result.review_message.clone());
                state.grading_result = Some(result.clone());
                state.phase = Phase::Graded;
                state.resting_phase = Phase::Graded;

                Ok(result)
            }
            Err(e) => {
                state.phase = Phase::Ready;

                Err(e.into())
            }
        }
    }

    /// Asks for improvement tips on the graded quiz.
    pub async fn request_tips(&self) -> Result<ConversationMessage, SessionError> {
        let (sequence, questions, answers) = {
            let state = self.state();

            if state.quiz.is_empty() {
                return Err(SessionError::NoQuizYet);
            }

            if state.answers.len() != state.quiz.len() {
                return Err(SessionError::AnswersIncomplete {
                    answered: state.answers.len(),
                    total: state.quiz.len(),
                });
            }

            if !matches!(state.phase, Phase::Graded | Phase::TipsRequested) {
                return Err(SessionError::InvalidPhase {
                    operation: "ask for tips",
                    phase: state.phase,
                });
            }

            (
                state.sequence,
                state.quiz.questions.clone(),
                state.answers.clone(),
            )
        };

        let tips = self
            .gateway
            .request_tips(self.chat_id, &questions[..], &answers)
            .await?;

        let mut state = self.state();

        if state.sequence != sequence {
            warn!("Discarding tips for replaced generation #{sequence}");
            return Err(SessionError::Superseded);
        }

        state.log.append(tips.clone());
        state.phase = Phase::TipsRequested;
        state.resting_phase = Phase::TipsRequested;

        Ok(tips)
    }

    /// Asks for a summary of overall quiz performance in this chat.
    /// Independent of the current quiz and its phase.
    pub async fn request_summary(&self) -> Result<ConversationMessage, SessionError> {
        let summary = self.gateway.request_summary(self.chat_id).await?;

        self.state().log.append(summary.clone());

        Ok(summary)
    }

    /// Loads the chat's stored messages into the log.
    pub async fn load_history(&self) -> Result<usize, SessionError> {
        let history = self.gateway.fetch_messages(self.chat_id).await?;
        let count = history.len();

        self.state().log.extend_history(history);
        debug!("Loaded {count} message(s) for chat {}", self.chat_id);

        Ok(count)
    }

    pub async fn send_message(&self, text: &str) -> Result<ConversationMessage, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        self.state().log.append(ConversationMessage::user(text));

        let reply = self.gateway.send_message(self.chat_id, text).await?;
        let reply = ConversationMessage::assistant(strip_think(&reply));

        self.state().log.append(reply.clone());

        Ok(reply)
    }
}
