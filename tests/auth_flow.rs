use std::sync::Arc;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::util::ServiceExt; // for `oneshot`

use backoffice_gate::auth::BackendClient;
use backoffice_gate::authz::{RoutePermissionTable, UnmappedRoutePolicy};
use backoffice_gate::middleware::Gate;
use backoffice_gate::session::SessionCodec;
use backoffice_gate::{build_router, AppState};

fn app_with_backend(base_url: &str) -> Result<Router> {
    let backend = BackendClient::new(base_url)?;
    let state = AppState::new(
        SessionCodec::new("test-secret", 1),
        Gate::new(RoutePermissionTable::default(), UnmappedRoutePolicy::Allow),
        Arc::new(backend),
        false,
    );
    Ok(build_router(state))
}

/// Serves a fake `/auth/social-login` that accepts only the token "good-token".
/// The token "garbled-token" gets a 200 with a body that is not a login response.
async fn spawn_backend() -> Result<String> {
    async fn social_login(headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if bearer == "Bearer garbled-token" {
            return Json(json!({"user": 1})).into_response();
        }

        if bearer != "Bearer good-token" || body["idToken"] != "good-token" {
            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "invalid token"}))).into_response();
        }

        Json(json!({
            "user": {
                "id": 42,
                "name": "Google User",
                "email": "g@example.com",
                "image": "https://example.com/a.png",
                "roles": [{"name": "admin", "permissions": ["edit_permissions", "view_roles"]}]
            },
            "token": "backend-issued"
        }))
        .into_response()
    }

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let router = Router::new().route("/api/auth/social-login", post(social_login));
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(format!("http://{addr}/api"))
}

async fn send(app: &Router, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Result<Response> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    Ok(app.clone().oneshot(builder.body(body)?).await?)
}

fn cookie_pair(resp: &Response) -> Option<String> {
    resp.headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn json_body(resp: Response) -> Result<Value> {
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn credentials_sign_in_creates_a_readable_session() -> Result<()> {
    let app = app_with_backend("http://127.0.0.1:9/api")?;

    let resp = send(
        &app,
        "POST",
        "/api/auth/callback/credentials",
        None,
        Some(json!({
            "token": "backend-token",
            "user": {"id": "u-1", "name": "Ada", "roles": [{"name": "staff", "permissions": ["view_roles"]}]}
        })),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with("next-auth.session-token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(!set_cookie.contains("Secure"));
    let cookie = cookie_pair(&resp).expect("session cookie");

    let created = json_body(resp).await?;
    assert_eq!(created["id"], "u-1");
    assert_eq!(created["loginBy"], "credentials");

    let resp = send(&app, "GET", "/api/auth/session", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let current = json_body(resp).await?;
    assert_eq!(current["name"], "Ada");
    assert!(current.get("accessToken").is_none());

    // Gate accepts the cookie for the route the permission covers.
    let resp = send(&app, "GET", "/roles", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn credentials_sign_in_rejects_missing_token() -> Result<()> {
    let app = app_with_backend("http://127.0.0.1:9/api")?;

    let resp = send(
        &app,
        "POST",
        "/api/auth/callback/credentials",
        None,
        Some(json!({"token": "", "user": {"id": 1}})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());

    let body = json_body(resp).await?;
    assert_eq!(body["error"], "unauthorized");
    Ok(())
}

#[tokio::test]
async fn session_endpoint_requires_cookie() -> Result<()> {
    let app = app_with_backend("http://127.0.0.1:9/api")?;

    let resp = send(&app, "GET", "/api/auth/session", None, None).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(&app, "GET", "/api/auth/session", Some("next-auth.session-token=garbage"), None).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn ability_endpoint_lists_compiled_rules() -> Result<()> {
    let app = app_with_backend("http://127.0.0.1:9/api")?;

    let resp = send(
        &app,
        "POST",
        "/api/auth/callback/credentials",
        None,
        Some(json!({
            "token": "t",
            "user": {"id": 7, "roles": [{"name": "staff", "permissions": ["remove_permission", "view_branch"]}]}
        })),
    )
    .await?;
    let cookie = cookie_pair(&resp).expect("session cookie");

    let resp = send(&app, "GET", "/api/auth/ability", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let ability = json_body(resp).await?;

    assert_eq!(ability["fingerprint"].as_str().map(str::len), Some(64));
    let rules = ability["rules"].as_array().cloned().unwrap_or_default();
    let has = |action: &str, subject: &str| {
        rules
            .iter()
            .any(|r| r["action"] == action && r["subject"] == subject)
    };
    assert!(has("view", "dashboard"));
    assert!(has("view", "profile"));
    assert!(has("delete", "permissions"));
    assert!(has("view", "branches"));
    Ok(())
}

#[tokio::test]
async fn google_sign_in_exchanges_id_token_at_backend() -> Result<()> {
    let base = spawn_backend().await?;
    let app = app_with_backend(&base)?;

    let resp = send(
        &app,
        "POST",
        "/api/auth/callback/google",
        None,
        Some(json!({"idToken": "good-token"})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = cookie_pair(&resp).expect("session cookie");

    let body = json_body(resp).await?;
    assert_eq!(body["id"], "42");
    assert_eq!(body["loginBy"], "google");

    let resp = send(&app, "GET", "/settings", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn google_sign_in_fails_closed_on_backend_rejection() -> Result<()> {
    let base = spawn_backend().await?;
    let app = app_with_backend(&base)?;

    let resp = send(
        &app,
        "POST",
        "/api/auth/callback/google",
        None,
        Some(json!({"idToken": "bad-token"})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    Ok(())
}

#[tokio::test]
async fn google_sign_in_reports_unreachable_backend() -> Result<()> {
    // Nothing listens on the discard port.
    let app = app_with_backend("http://127.0.0.1:9/api")?;

    let resp = send(
        &app,
        "POST",
        "/api/auth/callback/google",
        None,
        Some(json!({"idToken": "good-token"})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    Ok(())
}

#[tokio::test]
async fn signout_clears_the_cookie() -> Result<()> {
    let app = app_with_backend("http://127.0.0.1:9/api")?;

    let resp = send(&app, "POST", "/api/auth/signout", None, None).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(set_cookie.starts_with("next-auth.session-token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn google_sign_in_rejects_malformed_backend_body() -> Result<()> {
    let base = spawn_backend().await?;
    let app = app_with_backend(&base)?;

    let resp = send(
        &app,
        "POST",
        "/api/auth/callback/google",
        None,
        Some(json!({"idToken": "garbled-token"})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());

    let body = json_body(resp).await?;
    assert_eq!(body["error"], "backend");
    Ok(())
}

#[tokio::test]
async fn oversized_session_is_refused_instead_of_silently_dropped() -> Result<()> {
    let app = app_with_backend("http://127.0.0.1:9/api")?;
    let permissions: Vec<String> = (0..400).map(|i| format!("view_report_number_{i}")).collect();

    let resp = send(
        &app,
        "POST",
        "/api/auth/callback/credentials",
        None,
        Some(json!({
            "token": "t",
            "user": {"id": 1, "roles": [{"name": "admin", "permissions": permissions}]}
        })),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    Ok(())
}
