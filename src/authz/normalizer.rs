//! Backend permission strings to `(action, subject)` rules.
//!
//! The backend names permissions `{action}_{...}_{subject}` but does not
//! follow that shape everywhere. Every irregular string lives in one of the
//! explicit tables below; a new compound pattern needs a new table entry.

use serde_json::Value;

use super::permission::{Action, Conditions, NormalizedPermission, Subject};
use super::permissions;

const ACTION_ALIASES: &[(&str, Action)] = &[
    ("add", Action::Create),
    ("create", Action::Create),
    ("edit", Action::Update),
    ("update", Action::Update),
    ("delete", Action::Delete),
    ("remove", Action::Delete),
    ("view", Action::View),
    ("assign", Action::Manage),
    ("detail", Action::View),
];

const SUBJECT_ALIASES: &[(&str, Subject)] = &[
    ("user", Subject::USER),
    ("users", Subject::USERS),
    ("role", Subject::ROLES),
    ("roles", Subject::ROLES),
    ("branch", Subject::BRANCHES),
    ("branches", Subject::BRANCHES),
    ("loan", Subject::LOANS),
    ("loans", Subject::LOANS),
    ("setting", Subject::SETTINGS),
    ("settings", Subject::SETTINGS),
    ("permissions", Subject::PERMISSIONS),
    ("saving", Subject::SAVING),
    ("savings", Subject::SAVING),
    ("notification", Subject::NOTIFICATIONS),
    ("notifications", Subject::NOTIFICATIONS),
    ("dashboard", Subject::DASHBOARD),
    ("profile", Subject::PROFILE),
    ("password", Subject::PASSWORD),
    ("security", Subject::SECURITY),
    ("2fa", Subject::TWO_FACTOR),
];

/// Strings the generic split gets wrong.
const EXCEPTIONS: &[(&str, Action, Subject)] = &[(permissions::REMOVE_PERMISSION, Action::Delete, Subject::PERMISSIONS)];

/// Whole-string matches that carry a literal `{key: true}` condition.
const COMPOUND_CONDITIONS: &[(&str, &str)] = &[
    (permissions::ASSIGN_ROLES_TO_USERS, "canAssignRoles"),
    (permissions::ASSIGN_PERMISSIONS_TO_ROLES, "canAssignPermissions"),
];

/// Normalizes one backend permission string. Never fails: an unknown action
/// token becomes `view` and an unknown subject token is kept as-is.
pub fn convert(permission: &str) -> NormalizedPermission {
    if let Some((_, action, subject)) = EXCEPTIONS.iter().find(|(name, _, _)| *name == permission) {
        return NormalizedPermission::new(*action, subject.clone());
    }

    // `split` always yields at least one item, even for "".
    let action_token = permission.split('_').next().unwrap_or(permission);
    let subject_token = permission.rsplit('_').next().unwrap_or(permission);

    let action = lookup_action(action_token).unwrap_or(Action::View);
    let subject = lookup_subject(subject_token).unwrap_or_else(|| Subject::new(subject_token));

    let normalized = NormalizedPermission::new(action, subject);
    match compound_conditions(permission) {
        Some(conditions) => normalized.with_conditions(conditions),
        None => normalized,
    }
}

pub fn convert_all<I, S>(permissions: I) -> Vec<NormalizedPermission>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    permissions
        .into_iter()
        .map(|permission| convert(permission.as_ref()))
        .collect()
}

fn lookup_action(token: &str) -> Option<Action> {
    ACTION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, action)| *action)
}

fn lookup_subject(token: &str) -> Option<Subject> {
    SUBJECT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, subject)| subject.clone())
}

fn compound_conditions(permission: &str) -> Option<Conditions> {
    COMPOUND_CONDITIONS
        .iter()
        .find(|(name, _)| *name == permission)
        .map(|(_, key)| {
            let mut conditions = Conditions::new();
            conditions.insert((*key).to_string(), Value::Bool(true));
            conditions
        })
}
