use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{BackendClient, SocialLoginBackend};
use crate::authz::RoutePermissionTable;
use crate::config::GateConfig;
use crate::errors::AppError;
use crate::middleware::{gate, Gate};
use crate::routes::{auth, health, pages};
use crate::session::SessionCodec;

#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<SessionCodec>,
    pub gate: Arc<Gate>,
    pub backend: Arc<dyn SocialLoginBackend>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(codec: SessionCodec, gate: Gate, backend: Arc<dyn SocialLoginBackend>, secure_cookies: bool) -> Self {
        Self {
            codec: Arc::new(codec),
            gate: Arc::new(gate),
            backend,
            secure_cookies,
        }
    }

    pub fn from_config(config: &GateConfig) -> Result<Self, AppError> {
        let codec = SessionCodec::from_env()?;

        let table = match &config.route_permissions_file {
            Some(path) => RoutePermissionTable::from_json_file(path)?,
            None => RoutePermissionTable::default(),
        };
        tracing::info!(
            routes = table.rules().len(),
            unmapped = ?config.unmapped_route_policy,
            "route permission table loaded"
        );

        let backend = BackendClient::new(config.backend_base_url.clone())?;
        tracing::info!(backend = backend.base_url(), "backend client configured");

        Ok(Self::new(
            codec,
            Gate::new(table, config.unmapped_route_policy),
            Arc::new(backend),
            config.secure_cookies,
        ))
    }
}

pub async fn create_app(config: GateConfig) -> Result<Router, AppError> {
    let state = AppState::from_config(&config)?;
    Ok(build_router(state))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/callback/credentials", post(auth::credentials_callback))
        .route("/callback/google", post(auth::google_callback))
        .route("/session", get(auth::session))
        .route("/ability", get(auth::ability))
        .route("/signout", post(auth::signout));

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health))
        .route("/403", get(pages::forbidden))
        .route("/unauthorized", get(pages::unauthorized))
        .route("/auth/login", get(pages::login))
        .fallback(pages::page)
        .layer(middleware::from_fn_with_state(state.clone(), gate))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
