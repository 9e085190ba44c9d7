use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use url::Url;

use crate::config::ClientConfig;
use crate::data::{
    AnswerMap, ChatId, ConversationMessage, GenerationRequest, GradingResult, Question,
};
use crate::error::{AuthError, GatewayError};
use crate::helpers::{chat_endpoint, is_unauthorized, read_json};
use crate::raw_data::{
    RawGenerationResponse, RawGradingRequest, RawGradingResponse, RawSendMessageRequest,
    RawSendMessageResponse,
};
use crate::token::TokenProvider;

/// Remote quiz actions. Pure request/response, no interpretation.
#[async_trait]
pub trait QuizGateway: Send + Sync {
    /// Returns the raw question payload string.
    async fn request_generation(
        &self,
        chat_id: ChatId,
        request: &GenerationRequest,
    ) -> Result<String, GatewayError>;

    async fn submit_grading(
        &self,
        chat_id: ChatId,
        questions: &[Question],
        answers: &AnswerMap,
    ) -> Result<GradingResult, GatewayError>;

    async fn request_tips(
        &self,
        chat_id: ChatId,
        questions: &[Question],
        answers: &AnswerMap,
    ) -> Result<ConversationMessage, GatewayError>;

    async fn request_summary(&self, chat_id: ChatId) -> Result<ConversationMessage, GatewayError>;

    async fn fetch_messages(
        &self,
        chat_id: ChatId,
    ) -> Result<Vec<ConversationMessage>, GatewayError>;

    /// Returns the assistant's raw reply text.
    async fn send_message(&self, chat_id: ChatId, message: &str) -> Result<String, GatewayError>;
}

pub fn build_client(config: &ClientConfig) -> Result<Client, GatewayError> {
    Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(GatewayError::from)
}

pub struct HttpGateway {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpGateway {
    pub fn new(client: Client, config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            tokens,
        }
    }

    /// Sends with a bearer token. A 401 refreshes the token and resends once,
    /// unless the token was already refreshed for this request.
    async fn send_authorized<F>(&self, build: F) -> Result<Response, GatewayError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let (token, refreshed) = self.tokens.acquire().await?;
        let response = build(&self.client)
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .send()
            .await?;

        if !is_unauthorized(&response) {
            return Ok(response);
        }

        if refreshed {
            return Err(AuthError::Unauthorized.into());
        }

        warn!("Request unauthorized, refreshing access token");
        let token = self.tokens.refresh().await?;
        let response = build(&self.client)
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .send()
            .await?;

        if is_unauthorized(&response) {
            return Err(AuthError::Unauthorized.into());
        }

        Ok(response)
    }

    fn url(&self, chat_id: ChatId, action: &str) -> Result<Url, GatewayError> {
        chat_endpoint(&self.base_url, chat_id, action)
    }
}

#[async_trait]
impl QuizGateway for HttpGateway {
    async fn request_generation(
        &self,
        chat_id: ChatId,
        request: &GenerationRequest,
    ) -> Result<String, GatewayError> {
        let url = self.url(chat_id, "generate-quiz")?;
        debug!(
            "Requesting {} {} question(s) for chat {chat_id}",
            request.num_questions, request.question_type
        );

        let response = self
            .send_authorized(|client| client.post(url.clone()).json(request))
            .await?;
        let generated: RawGenerationResponse = read_json(response).await?;

        Ok(generated.content)
    }

    async fn submit_grading(
        &self,
        chat_id: ChatId,
        questions: &[Question],
        answers: &AnswerMap,
    ) -> Result<GradingResult, GatewayError> {
        let url = self.url(chat_id, "submit-quiz")?;
        let body = RawGradingRequest {
            quiz: questions,
            answers,
        };
        debug!("Submitting {} answer(s) for chat {chat_id}", answers.len());

        let response = self
            .send_authorized(|client| client.post(url.clone()).json(&body))
            .await?;
        let graded: RawGradingResponse = read_json(response).await?;

        Ok(GradingResult {
            saved_artifact_ref: graded.saved_path,
            review_message: graded.review,
        })
    }

    async fn request_tips(
        &self,
        chat_id: ChatId,
        questions: &[Question],
        answers: &AnswerMap,
    ) -> Result<ConversationMessage, GatewayError> {
        let url = self.url(chat_id, "quiz-tips")?;
        let body = RawGradingRequest {
            quiz: questions,
            answers,
        };

        let response = self
            .send_authorized(|client| client.post(url.clone()).json(&body))
            .await?;

        read_json(response).await
    }

    async fn request_summary(&self, chat_id: ChatId) -> Result<ConversationMessage, GatewayError> {
        let url = self.url(chat_id, "quiz-summary")?;

        let response = self
            .send_authorized(|client| client.post(url.clone()).json(&json!({})))
            .await?;

        read_json(response).await
    }

    async fn fetch_messages(
        &self,
        chat_id: ChatId,
    ) -> Result<Vec<ConversationMessage>, GatewayError> {
        let url = self.url(chat_id, "messages")?;

        let response = self
            .send_authorized(|client| client.get(url.clone()))
            .await?;

        read_json(response).await
    }

    async fn send_message(&self, chat_id: ChatId, message: &str) -> Result<String, GatewayError> {
        let url = self.url(chat_id, "messages")?;
        let body = RawSendMessageRequest { message };

        let response = self
            .send_authorized(|client| client.post(url.clone()).json(&body))
            .await?;
        let reply: RawSendMessageResponse = read_json(response).await?;

        Ok(reply.reply)
    }
}
