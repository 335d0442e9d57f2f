use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::{Action, Actions, NormalizedPermission, Rule, RouteRule, Subject};
use crate::models;
use crate::routes;
use crate::session::SESSION_COOKIE;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::auth::credentials_callback,
		routes::auth::google_callback,
		routes::auth::session,
		routes::auth::ability,
		routes::auth::signout,
		routes::health::health
	),
	components(
		schemas(
			models::session::SessionResponse,
			models::session::SessionRole,
			models::session::LoginProvider,
			models::backend::CredentialsSignInRequest,
			models::backend::SocialSignInRequest,
			routes::auth::AbilityResponse,
			routes::auth::MessageResponse,
			routes::health::HealthResponse,
			Rule,
			RouteRule,
			NormalizedPermission,
			Action,
			Actions,
			Subject
		)
	),
	tags(
		(name = "Auth", description = "Sign-in, session and ability endpoints"),
		(name = "Health", description = "Liveness")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else {
		return;
	};

	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(components) = components.as_object_mut() else {
		return;
	};

	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));
	if let Some(schemes) = schemes.as_object_mut() {
		schemes.insert(
			"sessionCookie".to_string(),
			json!({
				"type": "apiKey",
				"in": "cookie",
				"name": SESSION_COOKIE
			}),
		);
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
