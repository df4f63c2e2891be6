//! Collaborator capabilities handed to the session components at construction.
//!
//! The auth machine and refresh coordinator never name concrete collaborator
//! types (tenant context, reference-data caches, router). They see only these
//! two small traits.

use std::sync::Arc;

use crate::state::UserProfile;

/// Client-side navigation.
pub trait Navigator: Send + Sync {
    /// Replace the current route with `route`.
    fn redirect(&self, route: &str);
}

/// Callbacks fired on session transitions. Every method defaults to a no-op.
pub trait SessionHooks: Send + Sync {
    /// A profile was loaded; forward tenant membership and similar data.
    fn apply_profile(&self, _profile: &UserProfile) {}

    /// The session ended; drop tenant selection.
    fn reset_tenant(&self) {}

    /// The session ended; drop cached reference data.
    fn reset_catalog(&self) {}

    /// The initial route check found a valid session; load reference data.
    fn on_authenticated(&self) {}
}

/// Hooks that do nothing.
pub struct NoopHooks;

impl SessionHooks for NoopHooks {}

/// Fan-out over several hook implementations, in order.
#[derive(Default, Clone)]
pub struct HookChain {
    hooks: Vec<Arc<dyn SessionHooks>>,
}

impl HookChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }
}

impl SessionHooks for HookChain {
    fn apply_profile(&self, profile: &UserProfile) {
        self.hooks.iter().for_each(|h| h.apply_profile(profile));
    }

    fn reset_tenant(&self) {
        self.hooks.iter().for_each(|h| h.reset_tenant());
    }

    fn reset_catalog(&self) {
        self.hooks.iter().for_each(|h| h.reset_catalog());
    }

    fn on_authenticated(&self) {
        self.hooks.iter().for_each(|h| h.on_authenticated());
    }
}
