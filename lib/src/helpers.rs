use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::data::ChatId;
use crate::error::GatewayError;

pub fn endpoint(base_url: &Url, path: &str) -> Result<Url, GatewayError> {
    base_url
        .join(path)
        .map_err(|e| GatewayError::Network(format!("invalid endpoint {path}: {e}")))
}

pub fn chat_endpoint(base_url: &Url, chat_id: ChatId, action: &str) -> Result<Url, GatewayError> {
    endpoint(base_url, &format!("api/chats/{chat_id}/{action}/"))
}

pub fn is_unauthorized(response: &Response) -> bool {
    response.status() == StatusCode::UNAUTHORIZED
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let status = response.status();

    if !status.is_success() {
        return Err(GatewayError::RequestRejected(status.as_u16()));
    }

    let body = response.bytes().await?;

    serde_json::from_slice(&body[..]).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}
