use std::collections::BTreeSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::ability::Ability;
use crate::models::session::SessionUser;

/// Per-session ability plus the permission list it was compiled from.
///
/// Contexts are values: refreshing with a different permission list yields a
/// new context holding a new `Ability`, never an edited one.
#[derive(Debug, Clone)]
pub struct AbilityContext {
    ability: Arc<Ability>,
    permissions: Vec<String>,
    fingerprint: String,
}

impl AbilityContext {
    pub fn from_permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let permissions: Vec<String> = permissions
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let fingerprint = fingerprint(&permissions);
        let ability = Arc::new(Ability::from_permission_strings(&permissions));

        tracing::debug!(
            permissions = permissions.len(),
            rules = ability.rules().len(),
            fingerprint = %fingerprint,
            "ability built"
        );

        Self {
            ability,
            permissions,
            fingerprint,
        }
    }

    pub fn from_user(user: &SessionUser) -> Self {
        Self::from_permissions(user.permission_strings())
    }

    pub fn ability(&self) -> &Arc<Ability> {
        &self.ability
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns `self` when the permission set is unchanged, otherwise a
    /// freshly built context.
    pub fn refresh<I, S>(self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let next = Self::from_permissions(permissions);
        if next.fingerprint == self.fingerprint {
            self
        } else {
            next
        }
    }

    pub fn shares_ability_with(&self, other: &AbilityContext) -> bool {
        Arc::ptr_eq(&self.ability, &other.ability)
    }
}

fn fingerprint(sorted_permissions: &[String]) -> String {
    let mut hasher = Sha256::new();
    for permission in sorted_permissions {
        hasher.update(permission.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Action;

    #[test]
    fn order_and_duplicates_do_not_change_fingerprint() {
        let a = AbilityContext::from_permissions(["edit_branch", "view_loan"]);
        let b = AbilityContext::from_permissions(["view_loan", "edit_branch", "view_loan"]);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(b.permissions(), ["edit_branch".to_string(), "view_loan".to_string()]);
    }

    #[test]
    fn refresh_keeps_ability_when_unchanged() {
        let ctx = AbilityContext::from_permissions(["edit_branch"]);
        let same = ctx.clone().refresh(["edit_branch"]);

        assert!(same.shares_ability_with(&ctx));
    }

    #[test]
    fn refresh_rebuilds_without_prior_grants() {
        let ctx = AbilityContext::from_permissions(["edit_branch", "delete_user"]);
        let next = ctx.clone().refresh(["edit_branch"]);

        assert!(!next.shares_ability_with(&ctx));
        assert!(ctx.ability().can(Action::Delete, "user"));
        assert!(!next.ability().can(Action::Delete, "user"));
        assert!(next.ability().can(Action::Update, "branches"));
    }
}
