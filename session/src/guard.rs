//! Route guard consulted before every client-side navigation.
//!
//! The first navigation of an app load resolves the session by fetching the
//! current user; later navigations decide from the stored status alone.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::{AuthSession, FetchOutcome};
use crate::config::ClientConfig;
use crate::hooks::SessionHooks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(String),
}

pub struct RouteGuard {
    auth: Arc<AuthSession>,
    hooks: Arc<dyn SessionHooks>,
    public_routes: Vec<String>,
    login_route: String,
    landing_route: String,
    /// Serializes the initial session check across concurrent navigations.
    first_check: Mutex<()>,
}

impl RouteGuard {
    /// Guard whose only public route is the login route.
    #[must_use]
    pub fn new(auth: Arc<AuthSession>, hooks: Arc<dyn SessionHooks>, config: &ClientConfig) -> Self {
        Self {
            auth,
            hooks,
            public_routes: vec![config.login_route.clone()],
            login_route: config.login_route.clone(),
            landing_route: config.landing_route.clone(),
            first_check: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_public_route(mut self, route: &str) -> Self {
        self.public_routes.push(route.to_string());
        self
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_routes.iter().any(|r| r == path)
    }

    /// Decide whether navigation to `path` may proceed.
    pub async fn check(&self, path: &str) -> GuardDecision {
        self.ensure_checked().await;
        let authenticated = self.auth.store().is_authenticated();

        if path == "/" {
            return redirect(if authenticated { &self.landing_route } else { &self.login_route });
        }
        match (authenticated, self.is_public(path)) {
            (true, _) if path == self.login_route => redirect(&self.landing_route),
            (true, _) | (false, true) => GuardDecision::Proceed,
            (false, false) => redirect(&self.login_route),
        }
    }

    async fn ensure_checked(&self) {
        if self.auth.store().is_checked() {
            return;
        }
        let _guard = self.first_check.lock().await;
        if self.auth.store().is_checked() {
            return;
        }
        match self.auth.fetch_user().await {
            FetchOutcome::Authenticated => self.hooks.on_authenticated(),
            FetchOutcome::Unauthorized => {}
            FetchOutcome::Failed(e) => {
                tracing::warn!(error = %e, "initial session check failed; treating as signed out");
            }
        }
    }
}

fn redirect(route: &str) -> GuardDecision {
    GuardDecision::Redirect(route.to_string())
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
