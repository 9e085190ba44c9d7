use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use once_cell::sync::Lazy;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret, SecretString};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{AuthError, GatewayError};
use crate::helpers::endpoint;

/// A bearer credential. Debug output is redacted.
#[derive(Debug)]
pub struct Token(SecretString);

impl Token {
    pub fn new(value: String) -> Self {
        Self(Secret::new(value))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

/// The only way the rest of the crate gets hold of a credential.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a token believed to be valid, refreshing it first if needed.
    async fn ensure_valid_token(&self) -> Result<Token, AuthError> {
        self.acquire().await.map(|(token, _)| token)
    }

    /// Like `ensure_valid_token`, also telling whether a refresh just happened.
    async fn acquire(&self) -> Result<(Token, bool), AuthError>;

    /// Replaces the access token, used once after the server answers 401.
    async fn refresh(&self) -> Result<Token, AuthError>;
}

struct Credentials {
    access: SecretString,
    refresh: Option<SecretString>,
    obtained_at: DateTime<Utc>,
}

static GLOBAL_STORE: Lazy<Arc<CredentialStore>> = Lazy::new(|| Arc::new(CredentialStore::new()));

/// Process-wide credential storage.
///
/// Filled at startup or login, its access token is replaced only by a
/// provider refresh and it is emptied on logout or a rejected refresh.
#[derive(Default)]
pub struct CredentialStore {
    inner: RwLock<Option<Credentials>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_STORE)
    }

    pub fn install(&self, access: SecretString, refresh: Option<SecretString>) {
        let credentials = Credentials {
            access,
            refresh,
            obtained_at: Utc::now(),
        };

        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_installed(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn access_token(&self) -> Option<(Token, DateTime<Utc>)> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| (Token::new(c.access.expose_secret().clone()), c.obtained_at))
    }

    fn refresh_token(&self) -> Option<Token> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|c| c.refresh.as_ref())
            .map(|r| Token::new(r.expose_secret().clone()))
    }

    fn replace_access(&self, access: SecretString) {
        if let Some(credentials) = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            credentials.access = access;
            credentials.obtained_at = Utc::now();
        }
    }
}

#[derive(Deserialize)]
struct RawTokenPair {
    access: SecretString,
    refresh: SecretString,
}

#[derive(Deserialize)]
struct RawAccessToken {
    access: SecretString,
}

fn body_error(error: reqwest::Error) -> AuthError {
    if error.is_decode() {
        AuthError::InvalidResponse(error.to_string())
    } else {
        AuthError::Network(error.to_string())
    }
}

/// Token provider for the backend's JWT endpoints.
pub struct JwtTokenProvider {
    client: Client,
    base_url: Url,
    access_token_lifetime: Duration,
    store: Arc<CredentialStore>,
}

impl JwtTokenProvider {
    pub fn new(client: Client, config: &ClientConfig, store: Arc<CredentialStore>) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            access_token_lifetime: config.access_token_lifetime,
            store,
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), AuthError> {
        let url = self.url("token/")?;
        debug!("Logging in as {username}");

        let response = self
            .client
            .post(url)
            .json(&json!({"username": username, "password": password.expose_secret()}))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::LoginRejected(response.status().as_u16()));
        }

        let pair: RawTokenPair = response.json().await.map_err(body_error)?;
        self.store.install(pair.access, Some(pair.refresh));

        Ok(())
    }

    /// Asks the server whether the current access token is still accepted.
    pub async fn verify(&self) -> Result<bool, AuthError> {
        let (token, _) = self
            .store
            .access_token()
            .ok_or(AuthError::MissingCredentials)?;
        let url = self.url("token/verify/")?;

        let response = self
            .client
            .post(url)
            .json(&json!({"token": token.expose()}))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    pub fn logout(&self) {
        self.store.clear();
    }

    fn url(&self, path: &str) -> Result<Url, AuthError> {
        endpoint(&self.base_url, path).map_err(|e| match e {
            GatewayError::Auth(auth) => auth,
            other => AuthError::Network(other.to_string()),
        })
    }

    fn is_expired(&self, obtained_at: DateTime<Utc>) -> bool {
        match Utc::now().signed_duration_since(obtained_at).to_std() {
            Ok(elapsed) => elapsed >= self.access_token_lifetime,
            Err(_) => false,
        }
    }
}

#[async_trait]
impl TokenProvider for JwtTokenProvider {
    async fn acquire(&self) -> Result<(Token, bool), AuthError> {
        let (token, obtained_at) = self
            .store
            .access_token()
            .ok_or(AuthError::MissingCredentials)?;

        if self.is_expired(obtained_at) {
            debug!("Access token expired, refreshing");
            return self.refresh().await.map(|token| (token, true));
        }

        Ok((token, false))
    }

    async fn refresh(&self) -> Result<Token, AuthError> {
        let refresh = self
            .store
            .refresh_token()
            .ok_or(AuthError::MissingRefreshToken)?;
        let url = self.url("token/refresh/")?;

        let response = self
            .client
            .post(url)
            .json(&json!({"refresh": refresh.expose()}))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!("Token refresh rejected with status {status}, clearing credentials");
            self.store.clear();

            return Err(AuthError::RefreshRejected(status));
        }

        let access: RawAccessToken = response.json().await.map_err(body_error)?;
        let token = Token::new(access.access.expose_secret().clone());
        self.store.replace_access(access.access);

        Ok(token)
    }
}
