use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Literal condition map attached to a rule, e.g. `{"canAssignRoles": true}`.
pub type Conditions = Map<String, Value>;

/// Operation category a rule grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
    /// Matches every action when granted.
    Manage,
    Detail,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::View,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Manage,
        Action::Detail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
            Action::Detail => "detail",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action `{0}`")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// One action or a list of actions.
///
/// On a permission every listed action is granted; on a check any listed
/// action is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Actions {
    One(Action),
    Many(Vec<Action>),
}

impl Actions {
    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        let slice: &[Action] = match self {
            Actions::One(action) => std::slice::from_ref(action),
            Actions::Many(actions) => actions,
        };
        slice.iter().copied()
    }

    pub fn contains(&self, action: Action) -> bool {
        self.iter().any(|candidate| candidate == action)
    }
}

impl From<Action> for Actions {
    fn from(action: Action) -> Self {
        Actions::One(action)
    }
}

impl From<Vec<Action>> for Actions {
    fn from(actions: Vec<Action>) -> Self {
        Actions::Many(actions)
    }
}

impl From<&[Action]> for Actions {
    fn from(actions: &[Action]) -> Self {
        Actions::Many(actions.to_vec())
    }
}

impl<const N: usize> From<[Action; N]> for Actions {
    fn from(actions: [Action; N]) -> Self {
        Actions::Many(actions.to_vec())
    }
}

/// Resource a rule applies to. Open domain: unknown backend subjects are kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct Subject(Cow<'static, str>);

impl Subject {
    pub const ALL: Subject = Subject::known("all");
    pub const DASHBOARD: Subject = Subject::known("dashboard");
    pub const PROFILE: Subject = Subject::known("profile");
    pub const BRANCHES: Subject = Subject::known("branches");
    pub const USER: Subject = Subject::known("user");
    pub const USERS: Subject = Subject::known("users");
    pub const LOANS: Subject = Subject::known("loans");
    pub const SAVING: Subject = Subject::known("saving");
    pub const SETTINGS: Subject = Subject::known("settings");
    pub const ROLES: Subject = Subject::known("roles");
    pub const PERMISSIONS: Subject = Subject::known("permissions");
    pub const SECURITY: Subject = Subject::known("security");
    pub const NOTIFICATIONS: Subject = Subject::known("notifications");
    pub const PASSWORD: Subject = Subject::known("password");
    pub const TWO_FACTOR: Subject = Subject::known("2fa");

    const fn known(name: &'static str) -> Self {
        Subject(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Subject(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_all(&self) -> bool {
        self.as_str() == Self::ALL.as_str()
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Subject {
    fn from(name: &str) -> Self {
        Subject::new(name)
    }
}

impl From<String> for Subject {
    fn from(name: String) -> Self {
        Subject::new(name)
    }
}

/// Structured form of a backend permission string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedPermission {
    pub action: Actions,
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub conditions: Option<Conditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl NormalizedPermission {
    pub fn new(action: impl Into<Actions>, subject: impl Into<Subject>) -> Self {
        Self {
            action: action.into(),
            subject: subject.into(),
            conditions: None,
            fields: None,
        }
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}
