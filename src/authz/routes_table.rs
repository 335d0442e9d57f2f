use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use utoipa::ToSchema;

use super::permissions;
use crate::errors::AppError;

/// What the gate does with a path that has no table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedRoutePolicy {
    /// Any session may pass.
    Allow,
    /// Sessions are sent to the forbidden page.
    Deny,
}

impl UnmappedRoutePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnmappedRoutePolicy::Allow => "allow",
            UnmappedRoutePolicy::Deny => "deny",
        }
    }
}

impl FromStr for UnmappedRoutePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(AppError::configuration(format!(
                "UNMAPPED_ROUTE_POLICY must be `allow` or `deny`, got `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RouteRule {
    pub prefix: String,
    /// Empty means any authenticated session.
    pub required: Vec<String>,
}

/// Path prefix to required backend permission strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePermissionTable {
    // Longest prefix first so the most specific entry wins.
    rules: Vec<RouteRule>,
}

impl Default for RoutePermissionTable {
    fn default() -> Self {
        let defaults: [(&str, &[&str]); 8] = [
            ("/settings", &[permissions::EDIT_PERMISSIONS]),
            ("/branches/add", &[permissions::ADD_BRANCH]),
            ("/branches/edit", &[permissions::EDIT_BRANCH]),
            ("/users/edit", &[permissions::EDIT_USER]),
            ("/roles", &[permissions::VIEW_ROLES]),
            ("/permissions", &[permissions::VIEW_PERMISSIONS]),
            ("/loans/add", &[permissions::ADD_LOAN]),
            ("/profile", &[]),
        ];

        let map = defaults
            .into_iter()
            .map(|(prefix, perms)| (prefix.to_string(), perms.iter().map(|p| p.to_string()).collect()))
            .collect::<BTreeMap<String, Vec<String>>>();

        Self::from_rules(map)
    }
}

impl RoutePermissionTable {
    pub fn from_map(map: BTreeMap<String, Vec<String>>) -> Result<Self, AppError> {
        if let Some(bad) = map.keys().find(|prefix| !prefix.starts_with('/')) {
            return Err(AppError::configuration(format!("route prefix `{bad}` must start with `/`")));
        }
        Ok(Self::from_rules(map))
    }

    /// Reads a JSON object of `{"/prefix": ["permission", ...]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| AppError::configuration(format!("cannot read {}: {err}", path.display())))?;

        let de = &mut serde_json::Deserializer::from_str(&raw);
        let map: BTreeMap<String, Vec<String>> = serde_path_to_error::deserialize(de).map_err(|err| {
            AppError::configuration(format!("invalid route table {} at {}: {}", path.display(), err.path(), err))
        })?;

        Self::from_map(map)
    }

    fn from_rules(map: BTreeMap<String, Vec<String>>) -> Self {
        let mut rules: Vec<RouteRule> = map
            .into_iter()
            .map(|(prefix, required)| RouteRule {
                prefix: normalize_prefix(&prefix),
                required,
            })
            .collect();
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then_with(|| a.prefix.cmp(&b.prefix)));
        Self { rules }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Most specific rule whose prefix covers `path` on a segment boundary.
    pub fn lookup(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| prefix_matches(&rule.prefix, path))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `/settings` covers `/settings` and `/settings/roles`, not `/settings-old`.
pub fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
