pub mod config;
pub mod conversation;
mod data;
pub mod error;
pub mod gateway;
mod helpers;
pub mod normalize;
mod raw_data;
pub mod session;
pub mod token;

pub use config::ClientConfig;
pub use conversation::{strip_think, ConversationLog};
pub use data::*;
pub use error::{
    AuthError, GatewayError, GenerationError, NormalizeError, ParseError, SessionError,
};
pub use gateway::{build_client, HttpGateway, QuizGateway};
pub use normalize::{normalize, normalize_quiz};
pub use session::{Phase, QuizSession, SessionSnapshot};
pub use token::{CredentialStore, JwtTokenProvider, Token, TokenProvider};
