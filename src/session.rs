use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;
use crate::models::session::{Session, SessionUser};

pub const SESSION_COOKIE: &str = "next-auth.session-token";
pub const SECURE_SESSION_COOKIE: &str = "__Secure-next-auth.session-token";
/// Browsers drop larger cookies without telling the server.
pub const MAX_COOKIE_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct SessionCodec {
    pub secret: Arc<Vec<u8>>,
    pub max_age_hours: i64,
}

impl SessionCodec {
    pub fn new(secret: impl Into<Vec<u8>>, max_age_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            max_age_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("AUTH_SECRET").map_err(|_| AppError::configuration("AUTH_SECRET not set"))?;
        let max_age_hours = std::env::var("SESSION_MAX_AGE_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("SESSION_MAX_AGE_HOURS must be a valid integer"))?;

        if max_age_hours <= 0 {
            return Err(AppError::configuration("SESSION_MAX_AGE_HOURS must be positive"));
        }

        Ok(Self::new(secret.into_bytes(), max_age_hours))
    }

    pub fn max_age_seconds(&self) -> i64 {
        self.max_age_hours * 3600
    }

    /// Issues a fresh session for `user` and returns it with its token.
    pub fn issue(&self, user: SessionUser) -> Result<(Session, String), AppError> {
        // Whole seconds so the decoded session compares equal to the issued one.
        let now = truncate_to_seconds(Utc::now());
        let session = Session {
            id: Uuid::new_v4(),
            user,
            issued_at: now,
            expires: now + Duration::hours(self.max_age_hours),
        };
        let token = self.encode(&session)?;
        Ok((session, token))
    }

    pub fn encode(&self, session: &Session) -> Result<String, AppError> {
        let claims = SessionClaims {
            sub: session.user.id.clone(),
            sid: session.id,
            exp: session.expires.timestamp(),
            iat: session.issued_at.timestamp(),
            user: session.user.clone(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Session, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<SessionClaims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))?;

        Ok(Session {
            id: claims.sid,
            user: claims.user,
            issued_at: from_timestamp(claims.iat)?,
            expires: from_timestamp(claims.exp)?,
        })
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub sid: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub user: SessionUser,
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>, AppError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AppError::token(format!("timestamp {secs} out of range")))
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(at.timestamp(), 0).single().unwrap_or(at)
}

/// Raw session token from either session cookie name.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| (*name == SESSION_COOKIE || *name == SECURE_SESSION_COOKIE) && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn cookie_name(secure: bool) -> &'static str {
    if secure {
        SECURE_SESSION_COOKIE
    } else {
        SESSION_COOKIE
    }
}

pub fn session_cookie(token: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        cookie_name(secure),
        token,
        max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Decoded session of the caller; rejects with 401 when absent or invalid.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token_from_headers(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("session cookie missing"))?;

        let session = state.codec.decode(&token)?;
        Ok(CurrentSession(session))
    }
}
