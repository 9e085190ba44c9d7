use std::time::Duration;

use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";
pub const DEFAULT_MAX_QUESTIONS: u32 = 20;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    /// How long an access token is trusted before it is refreshed.
    pub access_token_lifetime: Duration,
    pub max_questions: u32,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            ..Self::default()
        }
    }

    pub fn with_max_questions(mut self, max_questions: u32) -> Self {
        self.max_questions = max_questions;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("valid default base url"),
            request_timeout: Duration::from_secs(120),
            access_token_lifetime: Duration::from_secs(5 * 60),
            max_questions: DEFAULT_MAX_QUESTIONS,
        }
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    url
}
