pub mod app;
pub mod auth;
pub mod authz;
pub mod config;
pub mod docs;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session;

// Re-export commonly used items for tests
pub use app::{build_router, create_app, AppState};
