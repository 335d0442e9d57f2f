use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoginProvider {
    Google,
    Credentials,
}

impl LoginProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginProvider::Google => "google",
            LoginProvider::Credentials => "credentials",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionRole {
    #[schema(example = "branch_manager")]
    pub name: String,
    #[serde(default)]
    #[schema(example = json!(["view_branch", "edit_branch"]))]
    pub permissions: Vec<String>,
}

/// User as carried inside the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    /// Backend-issued bearer token, passed through untouched.
    pub access_token: String,
    #[serde(default)]
    pub roles: Vec<SessionRole>,
    pub login_by: LoginProvider,
}

impl SessionUser {
    /// Union of every role's permission strings.
    pub fn permission_strings(&self) -> BTreeSet<&str> {
        self.roles
            .iter()
            .flat_map(|role| role.permissions.iter().map(String::as_str))
            .collect()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|role| role.name.clone()).collect()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.roles
            .iter()
            .any(|role| role.permissions.iter().any(|p| p == permission))
    }

    /// True when every required permission is present. Empty requirements
    /// always pass.
    pub fn has_all_permissions<S: AsRef<str>>(&self, required: &[S]) -> bool {
        let granted = self.permission_strings();
        required.iter().all(|p| granted.contains(p.as_ref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user: SessionUser,
    pub issued_at: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

/// Client view of a session; omits the backend token.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub roles: Vec<SessionRole>,
    pub login_by: LoginProvider,
    pub expires: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        let user = &session.user;
        SessionResponse {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            image: user.image.clone(),
            roles: user.roles.clone(),
            login_by: user.login_by,
            expires: session.expires,
        }
    }
}
