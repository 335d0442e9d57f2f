use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::models::backend::{SocialLoginRequest, SocialLoginResponse};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend rejected sign-in with status {0}")]
    Rejected(StatusCode),
    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// The backend answered and said no, as opposed to failing to answer.
    pub fn is_rejection(&self) -> bool {
        matches!(self, BackendError::Rejected(_))
    }
}

/// Exchange of an identity-provider token for a backend user and token.
#[async_trait]
pub trait SocialLoginBackend: Send + Sync {
    async fn social_login(&self, provider: &str, id_token: &str) -> Result<SocialLoginResponse, BackendError>;
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SocialLoginBackend for BackendClient {
    async fn social_login(&self, provider: &str, id_token: &str) -> Result<SocialLoginResponse, BackendError> {
        let url = format!("{}/auth/social-login", self.base_url);
        let body = SocialLoginRequest {
            provider: provider.to_string(),
            id_token: id_token.to_string(),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(id_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(provider = %provider, status = %status, "social login rejected by backend");
            return Err(BackendError::Rejected(status));
        }

        let bytes = response.bytes().await?;
        let de = &mut serde_json::Deserializer::from_slice(&bytes);
        serde_path_to_error::deserialize(de)
            .map_err(|err| BackendError::Decode(format!("at {}: {}", err.path(), err.inner())))
    }
}
