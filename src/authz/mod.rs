//! Authorization module - permission normalization, abilities and guards
//!
//! This module implements:
//! - Backend permission string normalization
//! - Immutable abilities compiled from normalized permissions
//! - Per-session ability contexts rebuilt on permission change
//! - Page guards and the route permission table used by the edge gate

mod ability;
mod context;
mod guard;
mod normalizer;
mod permission;
mod routes_table;

pub use ability::{Ability, AbilityBuilder, AbilityError, Rule, DEFAULT_GRANTS};
pub use context::AbilityContext;
pub use guard::{AbilityState, GuardDecision, Navigator, PageGuard};
pub use normalizer::{convert, convert_all};
pub use permission::{Action, Actions, Conditions, NormalizedPermission, Subject, UnknownAction};
pub use routes_table::{prefix_matches, RoutePermissionTable, RouteRule, UnmappedRoutePolicy};

/// Unauthenticated users land here.
pub const LOGIN_ROUTE: &str = "/auth/login";
/// Authenticated users hitting an auth-only page land here.
pub const HOME_ROUTE: &str = "/dashboard";
/// Missing permission.
pub const FORBIDDEN_ROUTE: &str = "/403";
/// Role not allowed.
pub const UNAUTHORIZED_ROUTE: &str = "/unauthorized";

/// Well-known backend permission names
pub mod permissions {
    pub const EDIT_PERMISSIONS: &str = "edit_permissions";
    pub const VIEW_PERMISSIONS: &str = "view_permissions";
    pub const REMOVE_PERMISSION: &str = "remove_permission";
    pub const ASSIGN_ROLES_TO_USERS: &str = "assign_roles_to_users";
    pub const ASSIGN_PERMISSIONS_TO_ROLES: &str = "assign_permissions_to_roles";
    pub const VIEW_ROLES: &str = "view_roles";

    pub const ADD_BRANCH: &str = "add_branch";
    pub const EDIT_BRANCH: &str = "edit_branch";
    pub const EDIT_USER: &str = "edit_user";
    pub const ADD_LOAN: &str = "add_loan";
}
