use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::auth;
use crate::authz::{AbilityContext, Rule};
use crate::errors::{AppError, AppResult};
use crate::models::backend::{CredentialsSignInRequest, SocialSignInRequest};
use crate::models::session::{LoginProvider, SessionResponse, SessionUser};
use crate::session::{clear_session_cookie, session_cookie, CurrentSession, MAX_COOKIE_BYTES};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AbilityResponse {
    /// Hex SHA-256 of the sorted permission list; changes whenever the rules do.
    pub fingerprint: String,
    pub rules: Vec<Rule>,
}

#[utoipa::path(
    post,
    path = "/api/auth/callback/credentials",
    tag = "Auth",
    request_body = CredentialsSignInRequest,
    responses(
        (status = 200, description = "Session created", body = SessionResponse),
        (status = 400, description = "Malformed user payload"),
        (status = 401, description = "Missing backend token"),
        (status = 500, description = "Session too large for a cookie")
    )
)]
pub async fn credentials_callback(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsSignInRequest>,
) -> AppResult<impl IntoResponse> {
    let user = auth::credentials_sign_in(payload)?;
    start_session(&state, user)
}

#[utoipa::path(
    post,
    path = "/api/auth/callback/google",
    tag = "Auth",
    request_body = SocialSignInRequest,
    responses(
        (status = 200, description = "Session created", body = SessionResponse),
        (status = 401, description = "Backend rejected the id token"),
        (status = 502, description = "Backend unreachable or malformed response")
    )
)]
pub async fn google_callback(
    State(state): State<AppState>,
    Json(payload): Json<SocialSignInRequest>,
) -> AppResult<impl IntoResponse> {
    let user = auth::social_sign_in(state.backend.as_ref(), LoginProvider::Google, &payload.id_token).await?;
    start_session(&state, user)
}

fn start_session(state: &AppState, user: SessionUser) -> AppResult<impl IntoResponse> {
    let (session, token) = state.codec.issue(user)?;
    let cookie = session_cookie(&token, state.codec.max_age_seconds(), state.secure_cookies);
    if cookie.len() > MAX_COOKIE_BYTES {
        tracing::error!(
            user_id = %session.user.id,
            cookie_bytes = cookie.len(),
            "session cookie exceeds browser limit"
        );
        return Err(AppError::internal("session too large to store in a cookie"));
    }

    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(SessionResponse::from(&session))))
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    tag = "Auth",
    responses(
        (status = 200, description = "Current session", body = SessionResponse),
        (status = 401, description = "No valid session")
    )
)]
pub async fn session(CurrentSession(session): CurrentSession) -> AppResult<Json<SessionResponse>> {
    Ok(Json(SessionResponse::from(&session)))
}

#[utoipa::path(
    get,
    path = "/api/auth/ability",
    tag = "Auth",
    responses(
        (status = 200, description = "Compiled rules of the current session", body = AbilityResponse),
        (status = 401, description = "No valid session")
    )
)]
pub async fn ability(CurrentSession(session): CurrentSession) -> AppResult<Json<AbilityResponse>> {
    let ctx = AbilityContext::from_user(&session.user);
    Ok(Json(AbilityResponse {
        fingerprint: ctx.fingerprint().to_string(),
        rules: ctx.ability().rules().to_vec(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/signout",
    tag = "Auth",
    responses((status = 200, description = "Session cookie cleared"))
)]
pub async fn signout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, clear_session_cookie(state.secure_cookies))]),
        Json(MessageResponse {
            message: "Signed out".to_string(),
        }),
    )
}
