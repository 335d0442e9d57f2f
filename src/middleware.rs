//! Edge gate
//!
//! Runs in front of every page request:
//!
//! 1. static assets and `/api/` are passed through untouched
//! 2. the authorized callback redirects by login state alone
//! 3. requests without a session cookie pass through
//! 4. gated prefixes require a valid session holding every listed permission
//! 5. unmapped prefixes follow [`UnmappedRoutePolicy`]
//!
//! The gate never fails a request: every error degrades to a redirect or a
//! pass-through.

use std::sync::OnceLock;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use regex::Regex;

use crate::app::AppState;
use crate::authz::{
    prefix_matches, RoutePermissionTable, UnmappedRoutePolicy, FORBIDDEN_ROUTE, HOME_ROUTE, LOGIN_ROUTE,
    UNAUTHORIZED_ROUTE,
};
use crate::models::session::Session;
use crate::session::{session_token_from_headers, SessionCodec};

const BYPASS_PATTERN: &str = r"^/(?:_next/|api/)|\.[A-Za-z0-9]+$";

fn bypass_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BYPASS_PATTERN).expect("bypass pattern is valid"))
}

pub fn is_bypassed(path: &str) -> bool {
    bypass_regex().is_match(path)
}

/// Collapses repeated slashes and resolves `.` and `..` segments so prefix
/// matching sees the path the router will serve. `..` never climbs above `/`.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Asset or API path; the gate did not look at it.
    Bypass,
    Continue,
    Redirect(&'static str),
}

/// Login-state rules applied before any permission check.
#[derive(Debug, Clone)]
pub struct AuthorizedCallback {
    /// Require a session.
    pub protected_prefixes: Vec<String>,
    /// Only for visitors without a session.
    pub auth_pages: Vec<String>,
}

impl Default for AuthorizedCallback {
    fn default() -> Self {
        let protected = [
            "/dashboard",
            "/settings",
            "/branches",
            "/users",
            "/loans",
            "/savings",
            "/roles",
            "/permissions",
            "/profile",
            "/notifications",
            "/security",
        ];
        let auth_pages = ["/auth/login", "/auth/register", "/auth/forgot-password", "/auth/reset-password"];

        Self {
            protected_prefixes: protected.iter().map(|p| p.to_string()).collect(),
            auth_pages: auth_pages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl AuthorizedCallback {
    pub fn redirect_for(&self, path: &str, logged_in: bool) -> Option<&'static str> {
        let protected = self.protected_prefixes.iter().any(|prefix| prefix_matches(prefix, path));
        let auth_page = self.auth_pages.iter().any(|prefix| prefix_matches(prefix, path));

        match (logged_in, protected, auth_page) {
            (false, true, _) => Some(LOGIN_ROUTE),
            (true, _, true) => Some(HOME_ROUTE),
            _ => None,
        }
    }
}

/// Gate configuration; shared read-only across requests.
#[derive(Debug, Clone)]
pub struct Gate {
    pub table: RoutePermissionTable,
    pub unmapped: UnmappedRoutePolicy,
    pub callback: AuthorizedCallback,
}

impl Gate {
    pub fn new(table: RoutePermissionTable, unmapped: UnmappedRoutePolicy) -> Self {
        Self {
            table,
            unmapped,
            callback: AuthorizedCallback::default(),
        }
    }

    /// `has_cookie` is whether a session cookie was sent; `session` is its
    /// decoded value, `None` when absent or invalid.
    pub fn decide(&self, path: &str, has_cookie: bool, session: Option<&Session>) -> GateDecision {
        let path = normalize_path(path);
        let path = path.as_str();

        if is_bypassed(path) {
            return GateDecision::Bypass;
        }

        if let Some(target) = self.callback.redirect_for(path, session.is_some()) {
            return GateDecision::Redirect(target);
        }

        if !has_cookie {
            return GateDecision::Continue;
        }

        match self.table.lookup(path) {
            Some(rule) => {
                let Some(session) = session else {
                    return GateDecision::Redirect(LOGIN_ROUTE);
                };
                if session.user.has_all_permissions(rule.required.as_slice()) {
                    GateDecision::Continue
                } else {
                    tracing::info!(
                        user_id = %session.user.id,
                        path = %path,
                        prefix = %rule.prefix,
                        required = ?rule.required,
                        "gate denied: missing permission"
                    );
                    GateDecision::Redirect(FORBIDDEN_ROUTE)
                }
            }
            None => match (self.unmapped, session) {
                (UnmappedRoutePolicy::Deny, Some(_)) if !is_terminal_page(path) => GateDecision::Redirect(FORBIDDEN_ROUTE),
                _ => GateDecision::Continue,
            },
        }
    }
}

/// Pages a signed-in user can always reach, whatever the unmapped policy.
fn is_terminal_page(path: &str) -> bool {
    path == HOME_ROUTE
        || [FORBIDDEN_ROUTE, UNAUTHORIZED_ROUTE, LOGIN_ROUTE]
            .iter()
            .any(|page| prefix_matches(page, path))
}

fn resolve_session(codec: &SessionCodec, token: Option<&str>) -> Option<Session> {
    let token = token?;
    match codec.decode(token) {
        Ok(session) => Some(session),
        Err(err) => {
            tracing::warn!(error = %err, "session cookie rejected");
            None
        }
    }
}

pub async fn gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = normalize_path(req.uri().path());

    if is_bypassed(&path) {
        return next.run(req).await;
    }

    let token = session_token_from_headers(req.headers());
    let session = resolve_session(&state.codec, token.as_deref());

    match state.gate.decide(&path, token.is_some(), session.as_ref()) {
        GateDecision::Bypass | GateDecision::Continue => next.run(req).await,
        GateDecision::Redirect(target) => {
            tracing::debug!(path = %path, location = target, "gate redirect");
            Redirect::temporary(target).into_response()
        }
    }
}
