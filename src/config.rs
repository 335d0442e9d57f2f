use std::path::PathBuf;

use crate::authz::UnmappedRoutePolicy;
use crate::errors::AppError;

const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub backend_base_url: String,
    pub route_permissions_file: Option<PathBuf>,
    pub unmapped_route_policy: UnmappedRoutePolicy,
    pub secure_cookies: bool,
    pub port: u16,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            backend_base_url: DEFAULT_BACKEND_BASE_URL.to_string(),
            route_permissions_file: None,
            unmapped_route_policy: UnmappedRoutePolicy::Allow,
            secure_cookies: false,
            port: 3000,
        }
    }
}

impl GateConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let backend_base_url = std::env::var("BACKEND_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.backend_base_url);

        let route_permissions_file = std::env::var("ROUTE_PERMISSIONS_FILE")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let unmapped_route_policy = match std::env::var("UNMAPPED_ROUTE_POLICY") {
            Ok(value) => value.parse::<UnmappedRoutePolicy>()?,
            Err(_) => defaults.unmapped_route_policy,
        };

        let secure_cookies = match std::env::var("SECURE_COOKIES") {
            Ok(value) => parse_bool(&value)
                .ok_or_else(|| AppError::configuration("SECURE_COOKIES must be true or false"))?,
            Err(_) => defaults.secure_cookies,
        };

        let port = std::env::var("APP_PORT")
            .map(|val| val.parse::<u16>())
            .unwrap_or(Ok(defaults.port))
            .map_err(|_| AppError::configuration("APP_PORT must be a valid port number"))?;

        Ok(Self {
            backend_base_url,
            route_permissions_file,
            unmapped_route_policy,
            secure_cookies,
            port,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
