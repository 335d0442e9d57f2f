use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::permission::{Action, Actions, Conditions, NormalizedPermission, Subject};

/// Rules every session holds regardless of backend data.
pub const DEFAULT_GRANTS: [(Action, Subject); 2] = [
    (Action::View, Subject::DASHBOARD),
    (Action::View, Subject::PROFILE),
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AbilityError {
    #[error("subject must not be empty")]
    EmptySubject,
    #[error("conditions must be a JSON object, got {0}")]
    InvalidConditions(&'static str),
    #[error(transparent)]
    UnknownAction(#[from] super::permission::UnknownAction),
}

/// A single compiled grant: one action on one subject.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Rule {
    pub action: Action,
    pub subject: Subject,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub conditions: Option<Conditions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl Rule {
    fn matches_action(&self, action: Action) -> bool {
        self.action == Action::Manage || self.action == action
    }

    fn matches_subject(&self, subject: &str) -> bool {
        self.subject.is_all() || self.subject.as_str() == subject
    }

    fn matches_field(&self, field: Option<&str>) -> bool {
        match (&self.fields, field) {
            (Some(fields), Some(field)) => fields.iter().any(|f| f == field),
            _ => true,
        }
    }

    /// Rule conditions must be a structural subset of the supplied object.
    /// A type-level check (no supplied conditions) ignores rule conditions.
    fn matches_conditions(&self, supplied: Option<&Conditions>) -> bool {
        match (&self.conditions, supplied) {
            (Some(required), Some(supplied)) => is_subset(required, supplied),
            _ => true,
        }
    }
}

fn is_subset(required: &Conditions, supplied: &Conditions) -> bool {
    required.iter().all(|(key, expected)| match supplied.get(key) {
        Some(actual) => value_contains(expected, actual),
        None => false,
    })
}

fn value_contains(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => is_subset(expected, actual),
        _ => expected == actual,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Registers rules before freezing them into an [`Ability`].
#[derive(Debug, Clone, Default)]
pub struct AbilityBuilder {
    rules: Vec<Rule>,
}

impl AbilityBuilder {
    /// Empty builder without the default grants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder seeded with [`DEFAULT_GRANTS`].
    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        for (action, subject) in DEFAULT_GRANTS {
            builder = builder.can(action, subject);
        }
        builder
    }

    pub fn can(self, actions: impl Into<Actions>, subject: impl Into<Subject>) -> Self {
        self.can_with(actions, subject, None, None)
    }

    /// Registers one rule per action, all sharing subject, conditions and fields.
    pub fn can_with(
        mut self,
        actions: impl Into<Actions>,
        subject: impl Into<Subject>,
        conditions: Option<Conditions>,
        fields: Option<Vec<String>>,
    ) -> Self {
        let subject = subject.into();
        for action in actions.into().iter() {
            self.rules.push(Rule {
                action,
                subject: subject.clone(),
                conditions: conditions.clone(),
                fields: fields.clone(),
            });
        }
        self
    }

    pub fn permission(self, permission: NormalizedPermission) -> Self {
        let NormalizedPermission {
            action,
            subject,
            conditions,
            fields,
        } = permission;
        self.can_with(action, subject, conditions, fields)
    }

    pub fn permissions(self, permissions: impl IntoIterator<Item = NormalizedPermission>) -> Self {
        permissions
            .into_iter()
            .fold(self, |builder, permission| builder.permission(permission))
    }

    pub fn build(self) -> Ability {
        Ability { rules: self.rules }
    }
}

/// Frozen rule set. There are no mutating methods: a changed permission list
/// produces a new `Ability`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ability {
    rules: Vec<Rule>,
}

impl Ability {
    /// Default grants plus every rule derived from `permissions`.
    pub fn build(permissions: impl IntoIterator<Item = NormalizedPermission>) -> Self {
        AbilityBuilder::with_defaults().permissions(permissions).build()
    }

    pub fn from_permission_strings<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(super::normalizer::convert_all(permissions))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// True when ANY of `actions` is granted on `subject`.
    pub fn can(&self, actions: impl Into<Actions>, subject: impl AsRef<str>) -> bool {
        self.can_with(actions, subject, None)
    }

    /// Like [`Ability::can`], scoped by an instance description. Malformed
    /// input is a denial.
    pub fn can_with(&self, actions: impl Into<Actions>, subject: impl AsRef<str>, conditions: Option<&Value>) -> bool {
        let actions = actions.into();
        let subject = subject.as_ref();
        Self::settle(self.try_can(&actions, subject, conditions, None), &actions, subject)
    }

    pub fn can_field(&self, action: Action, subject: impl AsRef<str>, field: &str) -> bool {
        let actions = Actions::One(action);
        let subject = subject.as_ref();
        Self::settle(self.try_can(&actions, subject, None, Some(field)), &actions, subject)
    }

    /// String-level check for callers holding raw action names.
    pub fn can_str(&self, action: &str, subject: &str) -> bool {
        match action.parse::<Action>() {
            Ok(action) => self.can(action, subject),
            Err(err) => {
                tracing::warn!(action = %action, subject = %subject, error = %err, "ability check failed");
                false
            }
        }
    }

    pub fn try_can(
        &self,
        actions: &Actions,
        subject: &str,
        conditions: Option<&Value>,
        field: Option<&str>,
    ) -> Result<bool, AbilityError> {
        if subject.is_empty() {
            return Err(AbilityError::EmptySubject);
        }

        let conditions = match conditions {
            None => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => return Err(AbilityError::InvalidConditions(json_kind(other))),
        };

        Ok(actions.iter().any(|action| {
            self.rules.iter().any(|rule| {
                rule.matches_action(action)
                    && rule.matches_subject(subject)
                    && rule.matches_field(field)
                    && rule.matches_conditions(conditions)
            })
        }))
    }

    fn settle(outcome: Result<bool, AbilityError>, actions: &Actions, subject: &str) -> bool {
        match outcome {
            Ok(allowed) => {
                tracing::debug!(actions = ?actions, subject = %subject, allowed, "ability check");
                allowed
            }
            Err(err) => {
                tracing::warn!(actions = ?actions, subject = %subject, error = %err, "ability check failed");
                false
            }
        }
    }
}
