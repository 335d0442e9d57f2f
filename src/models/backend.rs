use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::session::SessionRole;

/// Body of `POST {BACKEND_BASE_URL}/auth/social-login`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SocialLoginRequest {
    pub provider: String,
    pub id_token: String,
}

/// User as returned by the backend. Ids may arrive as numbers or strings.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BackendUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub roles: Vec<SessionRole>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SocialLoginResponse {
    pub user: BackendUser,
    pub token: String,
}

/// Credentials callback body. `user` is the backend user either as a JSON
/// object or serialized into a string.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CredentialsSignInRequest {
    #[schema(example = "eyJhbGciOi...")]
    pub token: String,
    #[schema(value_type = Object)]
    pub user: Value,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SocialSignInRequest {
    pub id_token: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}
