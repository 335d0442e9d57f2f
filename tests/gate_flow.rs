use std::sync::Arc;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::json;
use tower::util::ServiceExt; // for `oneshot`

use backoffice_gate::auth::BackendClient;
use backoffice_gate::authz::{RoutePermissionTable, UnmappedRoutePolicy};
use backoffice_gate::middleware::Gate;
use backoffice_gate::session::SessionCodec;
use backoffice_gate::{build_router, AppState};

fn app(unmapped: UnmappedRoutePolicy) -> Result<Router> {
    let backend = BackendClient::new("http://127.0.0.1:9")?;
    let state = AppState::new(
        SessionCodec::new("test-secret", 1),
        Gate::new(RoutePermissionTable::default(), unmapped),
        Arc::new(backend),
        false,
    );
    Ok(build_router(state))
}

/// Signs in through the credentials callback and returns the cookie pair.
async fn sign_in(app: &Router, permissions: &[&str]) -> Result<String> {
    let user = json!({
        "id": 1,
        "name": "Test User",
        "email": "test@example.com",
        "roles": [{"name": "staff", "permissions": permissions}]
    });
    let body = json!({"token": "backend-token", "user": user.to_string()});

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/callback/credentials")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?;

    let resp: Response = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK, "credentials sign-in failed");

    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("sign-in must set a cookie")
        .to_string();

    Ok(set_cookie.split(';').next().unwrap_or_default().to_string())
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Result<Response> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    Ok(app.clone().oneshot(builder.body(Body::empty())?).await?)
}

fn location(resp: &Response) -> Option<&str> {
    resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn settings_without_session_redirects_to_login() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Allow)?;

    let resp = get(&app, "/settings", None).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), Some("/auth/login"));
    Ok(())
}

#[tokio::test]
async fn settings_without_permission_redirects_to_forbidden() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Allow)?;
    let cookie = sign_in(&app, &["view_loan"]).await?;

    let resp = get(&app, "/settings", Some(&cookie)).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), Some("/403"));
    Ok(())
}

#[tokio::test]
async fn settings_with_permission_proceeds() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Allow)?;
    let cookie = sign_in(&app, &["edit_permissions"]).await?;

    let resp = get(&app, "/settings/roles", Some(&cookie)).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    assert!(String::from_utf8_lossy(&bytes).contains("/settings/roles"));
    Ok(())
}

#[tokio::test]
async fn unmapped_path_proceeds_for_any_session() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Allow)?;
    let cookie = sign_in(&app, &[]).await?;

    let resp = get(&app, "/dashboard/anything", Some(&cookie)).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn unmapped_path_denied_under_deny_policy() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Deny)?;
    let cookie = sign_in(&app, &[]).await?;

    let resp = get(&app, "/dashboard/anything", Some(&cookie)).await?;
    assert_eq!(location(&resp), Some("/403"));

    let resp = get(&app, "/403", Some(&cookie)).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(location(&resp).is_none());
    Ok(())
}

#[tokio::test]
async fn tampered_cookie_is_treated_as_no_session() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Allow)?;

    let resp = get(&app, "/settings", Some("next-auth.session-token=not-a-jwt")).await?;
    assert_eq!(location(&resp), Some("/auth/login"));

    // Public page with a broken cookie still renders.
    let resp = get(&app, "/reports", Some("next-auth.session-token=not-a-jwt")).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn signed_in_user_is_sent_away_from_login() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Allow)?;
    let cookie = sign_in(&app, &[]).await?;

    let resp = get(&app, "/auth/login", Some(&cookie)).await?;
    assert_eq!(location(&resp), Some("/dashboard"));

    let resp = get(&app, "/auth/login", None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn assets_and_api_bypass_the_gate() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Deny)?;

    // Protected prefix, but a file extension: served by the fallback, not redirected.
    let resp = get(&app, "/settings/logo.png", None).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = get(&app, "/_next/static/chunk", None).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = get(&app, "/api/health", None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn doubled_slashes_do_not_skip_the_gate() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Allow)?;

    let resp = get(&app, "//settings", None).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), Some("/auth/login"));

    let cookie = sign_in(&app, &["view_loan"]).await?;
    let resp = get(&app, "/settings//roles", Some(&cookie)).await?;
    assert_eq!(location(&resp), Some("/403"));
    Ok(())
}

#[tokio::test]
async fn home_stays_reachable_under_deny_policy() -> Result<()> {
    let app = app(UnmappedRoutePolicy::Deny)?;
    let cookie = sign_in(&app, &[]).await?;

    let resp = get(&app, "/auth/login", Some(&cookie)).await?;
    assert_eq!(location(&resp), Some("/dashboard"));

    let resp = get(&app, "/dashboard", Some(&cookie)).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}
