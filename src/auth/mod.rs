//! Authentication bridge
//!
//! Turns a credentials sign-in (backend token plus user) or a social sign-in
//! (identity-provider id token exchanged at the backend) into a
//! [`SessionUser`]. A failed sign-in never yields a partial user.

mod backend;

pub use backend::{BackendClient, BackendError, SocialLoginBackend};

use serde_json::Value;

use crate::errors::AppError;
use crate::models::backend::{BackendUser, CredentialsSignInRequest};
use crate::models::session::{LoginProvider, SessionUser};

/// Accepts the backend-issued token and user as they are.
pub fn credentials_sign_in(request: CredentialsSignInRequest) -> Result<SessionUser, AppError> {
    if request.token.trim().is_empty() {
        return Err(AppError::unauthorized("missing backend token"));
    }

    let user = match request.user {
        Value::String(serialized) => {
            let de = &mut serde_json::Deserializer::from_str(&serialized);
            serde_path_to_error::deserialize::<_, BackendUser>(de)
                .map_err(|err| AppError::bad_request(format!("invalid user at {}: {}", err.path(), err.inner())))?
        }
        value @ Value::Object(_) => serde_path_to_error::deserialize::<_, BackendUser>(value)
            .map_err(|err| AppError::bad_request(format!("invalid user at {}: {}", err.path(), err.inner())))?,
        _ => return Err(AppError::bad_request("user must be an object or a serialized object")),
    };

    tracing::info!(user_id = %user.id, provider = "credentials", "sign-in accepted");
    Ok(into_session_user(user, request.token, LoginProvider::Credentials))
}

/// Exchanges an id token at the backend. Any backend failure fails the
/// sign-in.
pub async fn social_sign_in(
    backend: &dyn SocialLoginBackend,
    provider: LoginProvider,
    id_token: &str,
) -> Result<SessionUser, AppError> {
    if id_token.trim().is_empty() {
        return Err(AppError::unauthorized("missing id token"));
    }

    let response = backend.social_login(provider.as_str(), id_token).await.map_err(|err| {
        tracing::warn!(provider = provider.as_str(), error = %err, "social sign-in failed");
        AppError::from(err)
    })?;

    tracing::info!(user_id = %response.user.id, provider = provider.as_str(), "sign-in accepted");
    Ok(into_session_user(response.user, response.token, provider))
}

fn into_session_user(user: BackendUser, access_token: String, login_by: LoginProvider) -> SessionUser {
    SessionUser {
        id: user.id,
        name: user.name,
        email: user.email,
        image: user.image,
        access_token,
        roles: user.roles,
        login_by,
    }
}
