//! Page access checks.

use async_trait::async_trait;

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    /// Send the user to the scope's configured redirect target.
    Denied,
    /// Send the user to the named page instead of initializing.
    Redirect(String),
}

/// Permission predicate consulted before a page initializes.
#[async_trait(?Send)]
pub trait AccessCheck {
    async fn check(&self, scope: &str) -> AccessDecision;
}

/// Grants every scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait(?Send)]
impl AccessCheck for AllowAll {
    async fn check(&self, _scope: &str) -> AccessDecision {
        AccessDecision::Granted
    }
}

/// Grants only while `allowed` returns `true`. Otherwise denies, or
/// redirects to an explicit target if one is set.
pub struct Predicate<F> {
    allowed: F,
    target: Option<String>,
}

impl<F: Fn(&str) -> bool> Predicate<F> {
    /// Deny every scope for which `allowed` returns `false`.
    pub fn new(allowed: F) -> Self {
        Self {
            allowed,
            target: None,
        }
    }

    /// Redirect denied scopes to `target` instead of the configured one.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

#[async_trait(?Send)]
impl<F: Fn(&str) -> bool> AccessCheck for Predicate<F> {
    async fn check(&self, scope: &str) -> AccessDecision {
        if (self.allowed)(scope) {
            return AccessDecision::Granted;
        }
        match &self.target {
            Some(target) => AccessDecision::Redirect(target.clone()),
            None => AccessDecision::Denied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_grants() {
        let decision = tokio_test::block_on(AllowAll.check("Main"));
        assert_eq!(decision, AccessDecision::Granted);
    }

    #[test]
    fn predicate_denies_when_disallowed() {
        let check = Predicate::new(|scope: &str| scope != "Admin");
        assert_eq!(
            tokio_test::block_on(check.check("Main")),
            AccessDecision::Granted
        );
        assert_eq!(
            tokio_test::block_on(check.check("Admin")),
            AccessDecision::Denied
        );
    }

    #[test]
    fn predicate_target_overrides_denial() {
        let check = Predicate::new(|_: &str| false).with_target("home");
        assert_eq!(
            tokio_test::block_on(check.check("Admin")),
            AccessDecision::Redirect("home".into())
        );
    }
}
