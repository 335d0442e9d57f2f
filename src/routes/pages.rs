//! Terminal pages and the page placeholder.
//!
//! `/403` and `/unauthorized` never consult a session so a redirect to them
//! cannot loop. Every other page path falls through to [`page`], which stands
//! in for the dashboard renderer behind the gate.

use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse};

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><main><h1>{title}</h1>{body}</main></body></html>"
    )
}

pub async fn forbidden() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Html(layout(
            "403 - Forbidden",
            "<p>You do not have permission to view this page.</p><p><a href=\"/dashboard\">Back to dashboard</a></p>",
        )),
    )
}

pub async fn unauthorized() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Html(layout(
            "Unauthorized",
            "<p>Your role does not have access to this page.</p><p><a href=\"/dashboard\">Back to dashboard</a></p>",
        )),
    )
}

pub async fn login() -> Html<String> {
    Html(layout(
        "Sign in",
        "<p>Sign in with your credentials or with Google to continue.</p>",
    ))
}

pub async fn page(uri: Uri) -> Html<String> {
    let path = escape(uri.path());
    Html(layout("Back office", &format!("<p data-path=\"{path}\">{path}</p>")))
}

fn escape(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            '"' => "&quot;".to_string(),
            other => other.to_string(),
        })
        .collect()
}
