//! Page guards for client-rendered views.
//!
//! A guard is driven by the view layer: every time the session, ability or
//! requirement may have changed it calls [`PageGuard::update`] and renders
//! according to the returned [`GuardDecision`]. Navigation side effects go
//! through a [`Navigator`] and happen at most once per distinct input.

use std::sync::Arc;

use super::ability::Ability;
use super::permission::{Actions, Subject};
use super::{FORBIDDEN_ROUTE, UNAUTHORIZED_ROUTE};

/// Client-side navigation sink.
pub trait Navigator {
    fn navigate(&self, route: &str);
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn navigate(&self, route: &str) {
        (**self).navigate(route)
    }
}

/// The ability as seen by a view that may render before the session resolves.
#[derive(Debug, Clone)]
pub enum AbilityState {
    Loading,
    Ready(Arc<Ability>),
}

impl AbilityState {
    fn ability(&self) -> Option<&Arc<Ability>> {
        match self {
            AbilityState::Loading => None,
            AbilityState::Ready(ability) => Some(ability),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Nothing rendered, no navigation.
    Pending,
    /// Navigated away; nothing rendered.
    Redirect(&'static str),
    /// Protected content may render.
    Render,
}

#[derive(Debug, Clone)]
struct Evaluated {
    ability: Option<Arc<Ability>>,
    roles: Option<Vec<String>>,
    decision: GuardDecision,
}

pub struct PageGuard<N> {
    actions: Actions,
    subject: Subject,
    allowed_roles: Option<Vec<String>>,
    navigator: N,
    last: Option<Evaluated>,
}

impl Evaluated {
    fn covers(&self, ability: &AbilityState, roles: &Option<Vec<String>>) -> bool {
        let same_ability = match (&self.ability, ability.ability()) {
            (None, None) => true,
            (Some(seen), Some(current)) => Arc::ptr_eq(seen, current),
            _ => false,
        };
        same_ability && &self.roles == roles
    }
}

impl<N: Navigator> PageGuard<N> {
    pub fn new(actions: impl Into<Actions>, subject: impl Into<Subject>, navigator: N) -> Self {
        Self {
            actions: actions.into(),
            subject: subject.into(),
            allowed_roles: None,
            navigator,
            last: None,
        }
    }

    /// Role-gated variant: the user must hold one of `roles` in addition to
    /// passing the ability check.
    pub fn with_allowed_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn set_requirement(&mut self, actions: impl Into<Actions>, subject: impl Into<Subject>) {
        let actions = actions.into();
        let subject = subject.into();
        if actions != self.actions || subject != self.subject {
            self.actions = actions;
            self.subject = subject;
            self.last = None;
        }
    }

    pub fn decision(&self) -> Option<GuardDecision> {
        self.last.as_ref().map(|last| last.decision)
    }

    /// `user_roles` is `None` until the session has resolved.
    pub fn update(&mut self, ability: &AbilityState, user_roles: Option<&[String]>) -> GuardDecision {
        // Roles only key the cache for role-gated guards.
        let roles = match self.allowed_roles {
            Some(_) => user_roles.map(<[String]>::to_vec),
            None => None,
        };

        if let Some(last) = &self.last {
            if last.covers(ability, &roles) {
                return last.decision;
            }
        }

        let decision = self.evaluate(ability, roles.as_deref());
        if let GuardDecision::Redirect(route) = decision {
            tracing::debug!(
                actions = ?self.actions,
                subject = %self.subject,
                route,
                "page guard redirect"
            );
            self.navigator.navigate(route);
        }

        self.last = Some(Evaluated {
            ability: ability.ability().cloned(),
            roles,
            decision,
        });
        decision
    }

    fn evaluate(&self, ability: &AbilityState, roles: Option<&[String]>) -> GuardDecision {
        let ability = match ability {
            AbilityState::Loading => return GuardDecision::Pending,
            AbilityState::Ready(ability) => ability,
        };

        if let Some(allowed) = &self.allowed_roles {
            let Some(roles) = roles else {
                return GuardDecision::Pending;
            };
            if !roles.iter().any(|role| allowed.contains(role)) {
                return GuardDecision::Redirect(UNAUTHORIZED_ROUTE);
            }
        }

        if ability.can(self.actions.clone(), &self.subject) {
            GuardDecision::Render
        } else {
            GuardDecision::Redirect(FORBIDDEN_ROUTE)
        }
    }
}
