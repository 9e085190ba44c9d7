use thiserror::Error;

use crate::session::Phase;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Failed to parse quiz data: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Unexpected quiz format")]
    UnrecognizedShape,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No credentials available, log in first")]
    MissingCredentials,

    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Token refresh rejected with status {0}")]
    RefreshRejected(u16),

    #[error("Login rejected with status {0}")]
    LoginRejected(u16),

    #[error("Request unauthorized even after refreshing the access token")]
    Unauthorized,

    #[error("Authentication request failed: {0}")]
    Network(String),

    #[error("Invalid response from authentication server: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request rejected with status {0}")]
    RequestRejected(u16),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Number of questions must be between 1 and {max}, got {requested}")]
    InvalidQuestionCount { requested: u32, max: u32 },

    #[error("Cannot {operation} while the quiz is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    #[error("Question {index} does not exist, the quiz has {len} question(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{option:?} is not an option of question {index}")]
    UnknownOption { index: usize, option: String },

    #[error("Please answer all questions before submitting ({answered}/{total} answered)")]
    IncompleteAnswers { answered: usize, total: usize },

    #[error("Generate a quiz and submit your answers first")]
    NoQuizYet,

    #[error("All answers must be confirmed before asking for tips ({answered}/{total} answered)")]
    AnswersIncomplete { answered: usize, total: usize },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Quiz generation failed: {0}")]
    GenerationFailed(#[source] GenerationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Response discarded, a newer operation replaced the quiz")]
    Superseded,
}

impl SessionError {
    /// Whether the failure came from the token boundary.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Gateway(GatewayError::Auth(_))
                | Self::GenerationFailed(GenerationError::Gateway(GatewayError::Auth(_)))
        )
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unknown difficulty {0:?}, expected easy, medium or hard")]
    Difficulty(String),

    #[error("Unknown question type {0:?}, expected multiple or truefalse")]
    QuestionType(String),
}
