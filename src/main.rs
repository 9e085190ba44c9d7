use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use quiz_session::config::{DEFAULT_BASE_URL, DEFAULT_MAX_QUESTIONS};
use quiz_session::{
    build_client, ClientConfig, CredentialStore, Difficulty, HttpGateway, JwtTokenProvider,
    QuestionType, QuizSession,
};
use secrecy::Secret;
use url::Url;

mod interactive;
mod render;

#[derive(Parser)]
#[clap(name = "quiz-session", about = "Generate and take quizzes on your chat documents")]
struct QuizClient {
    #[clap(long, env = "QUIZ_BASE_URL", default_value = DEFAULT_BASE_URL, value_parser)]
    base_url: Url,

    #[clap(long, env = "QUIZ_ACCESS_TOKEN", hide_env_values = true, value_parser)]
    access_token: Option<String>,

    #[clap(long, env = "QUIZ_REFRESH_TOKEN", hide_env_values = true, value_parser)]
    refresh_token: Option<String>,

    #[clap(long, env = "QUIZ_USERNAME", value_parser)]
    username: Option<String>,

    #[clap(long, env = "QUIZ_PASSWORD", hide_env_values = true, value_parser)]
    password: Option<String>,

    #[clap(long, env = "QUIZ_MAX_QUESTIONS", default_value_t = DEFAULT_MAX_QUESTIONS, value_parser)]
    max_questions: u32,

    #[clap(long, env = "QUIZ_TIMEOUT_SECS", default_value_t = 120, value_parser)]
    timeout_secs: u64,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a quiz, answer it and get it graded
    Quiz {
        #[clap(value_parser)]
        chat_id: u64,

        #[clap(short, long, default_value_t = 5, value_parser)]
        num_questions: u32,

        #[clap(short, long, default_value = "easy", value_parser)]
        difficulty: Difficulty,

        #[clap(short = 't', long, default_value = "multiple", value_parser)]
        question_type: QuestionType,

        /// Ask for improvement tips after grading
        #[clap(long)]
        tips: bool,
    },
    /// Summarize performance over all saved quizzes
    Summary {
        #[clap(value_parser)]
        chat_id: u64,
    },
    /// Print the chat history
    Messages {
        #[clap(value_parser)]
        chat_id: u64,
    },
    /// Send a message to the chat assistant
    Send {
        #[clap(value_parser)]
        chat_id: u64,

        #[clap(value_parser)]
        message: String,
    },
    /// Check that the stored access token is accepted
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "env-file")]
    dotenvy::dotenv().ok();

    env_logger::init();

    let quiz_client = QuizClient::parse();

    let config = ClientConfig::new(quiz_client.base_url.clone())
        .with_max_questions(quiz_client.max_questions)
        .with_request_timeout(Duration::from_secs(quiz_client.timeout_secs));
    let client = build_client(&config)?;
    let tokens = Arc::new(JwtTokenProvider::new(
        client.clone(),
        &config,
        CredentialStore::global(),
    ));

    authenticate(&quiz_client, &tokens).await?;

    let gateway = HttpGateway::new(client, &config, tokens.clone());
    let session = |chat_id| QuizSession::new(chat_id, gateway, config.max_questions);

    match quiz_client.command {
        Command::Quiz {
            chat_id,
            num_questions,
            difficulty,
            question_type,
            tips,
        } => {
            let settings = interactive::QuizSettings {
                num_questions,
                difficulty,
                question_type,
                tips,
            };

            interactive::run_quiz(&session(chat_id), settings).await?;
        }
        Command::Summary { chat_id } => {
            let summary = session(chat_id).request_summary().await?;

            render::print_message(&summary);
        }
        Command::Messages { chat_id } => {
            let session = session(chat_id);
            session.load_history().await?;

            for message in session.messages() {
                render::print_message(&message);
            }
        }
        Command::Send { chat_id, message } => {
            let reply = session(chat_id).send_message(&message).await?;

            render::print_message(&reply);
        }
        Command::Verify => {
            if !tokens.verify().await? {
                bail!("access token rejected by the server");
            }

            println!("Access token is valid");
        }
    }

    tokens.logout();

    Ok(())
}

async fn authenticate(quiz_client: &QuizClient, tokens: &JwtTokenProvider) -> Result<()> {
    if let Some(access_token) = &quiz_client.access_token {
        tokens.store().install(
            Secret::new(access_token.clone()),
            quiz_client.refresh_token.clone().map(Secret::new),
        );

        return Ok(());
    }

    match (&quiz_client.username, &quiz_client.password) {
        (Some(username), Some(password)) => {
            tokens
                .login(username, &Secret::new(password.clone()))
                .await
                .context("login failed")?;
            info!("Logged in as {username}");

            Ok(())
        }
        _ => bail!(
            "no credentials: pass --access-token or --username and --password \
             (or set QUIZ_ACCESS_TOKEN / QUIZ_USERNAME and QUIZ_PASSWORD)"
        ),
    }
}
