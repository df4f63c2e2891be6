//! Auth session machine: load the current user, sign in, sign out.
//!
//! SYSTEM CONTEXT
//! ==============
//! Sits on top of `ApiClient` and writes the resolved outcome into the shared
//! `SessionStore`. Tenant membership and reference-data caches are reached only
//! through `SessionHooks`; the router only through `Navigator`.
//!
//! DESIGN
//! ======
//! Every operation ends in a terminal status: `fetch_user` and `login` resolve
//! to `Authenticated` or `Unauthenticated`, `logout` always lands on
//! `Unauthenticated`. `loading` brackets each operation.

use std::sync::Arc;

use serde::Serialize;

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::hooks::{Navigator, SessionHooks};
use crate::state::{PermissionMode, SessionStore, UserProfile};
use crate::transport::{ApiRequest, to_body};

pub const ME_ENDPOINT: &str = "/auth/me";
pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Result of loading the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Authenticated,
    /// The server rejected the session (401).
    Unauthorized,
    /// Any other failure; the session may still be valid.
    Failed(ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// Login was rejected or the profile could not be loaded afterwards.
    Failed(String),
}

pub struct AuthSession {
    api: ApiClient,
    store: SessionStore,
    hooks: Arc<dyn SessionHooks>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
}

impl AuthSession {
    #[must_use]
    pub fn new(
        api: ApiClient,
        store: SessionStore,
        hooks: Arc<dyn SessionHooks>,
        navigator: Arc<dyn Navigator>,
        login_route: &str,
    ) -> Self {
        Self { api, store, hooks, navigator, login_route: login_route.to_string() }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Load the current user and resolve the session status.
    pub async fn fetch_user(&self) -> FetchOutcome {
        self.store.begin();
        let outcome = self.load_user().await;
        self.store.finish();
        outcome
    }

    async fn load_user(&self) -> FetchOutcome {
        let payload = match self.api.get(ME_ENDPOINT, &[]).await {
            Ok(response) => response.body,
            Err(e) if e.is_unauthorized() => {
                tracing::debug!("no active session");
                self.store.set_unauthenticated(None);
                return FetchOutcome::Unauthorized;
            }
            Err(e) => {
                tracing::warn!(error = %e, "user profile fetch failed");
                self.store.set_unauthenticated(Some(e.user_message()));
                return FetchOutcome::Failed(e);
            }
        };

        match UserProfile::from_payload(&payload) {
            Ok(profile) => {
                tracing::info!(user = %profile.email, permissions = profile.permissions.len(), "session authenticated");
                self.hooks.apply_profile(&profile);
                self.store.set_authenticated(profile);
                FetchOutcome::Authenticated
            }
            Err(e) => {
                let err = ApiError::Decode(e.to_string());
                tracing::warn!(error = %err, "user profile payload rejected");
                self.store.set_unauthenticated(Some(err.user_message()));
                FetchOutcome::Failed(err)
            }
        }
    }

    /// Sign in, then load the profile the new session belongs to.
    pub async fn login(&self, credentials: &Credentials) -> LoginOutcome {
        self.store.begin();
        let outcome = match self.submit_login(credentials).await {
            Ok(()) => match self.load_user().await {
                FetchOutcome::Authenticated => LoginOutcome::Success,
                FetchOutcome::Unauthorized => {
                    let message = ApiError::SessionExpired.to_string();
                    self.store.set_unauthenticated(Some(message.clone()));
                    LoginOutcome::Failed(message)
                }
                FetchOutcome::Failed(e) => LoginOutcome::Failed(e.user_message()),
            },
            Err(e) => {
                tracing::info!(error = %e, "login rejected");
                let message = e.user_message();
                self.store.set_unauthenticated(Some(message.clone()));
                LoginOutcome::Failed(message)
            }
        };
        self.store.finish();
        outcome
    }

    async fn submit_login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.api.post(LOGIN_ENDPOINT, to_body(credentials)?).await.map(|_| ())
    }

    /// Sign out. Local state is cleared and the user is sent to the login
    /// route even when the server call fails.
    pub async fn logout(&self) {
        self.store.begin();
        if let Err(e) = self.api.send(ApiRequest::post(LOGOUT_ENDPOINT)).await {
            tracing::warn!(error = %e, "logout call failed; clearing local session anyway");
        }
        self.reset();
        self.store.finish();
        self.navigator.redirect(&self.login_route);
    }

    /// Drop the session and everything scoped to it.
    pub fn reset(&self) {
        self.store.reset();
        self.hooks.reset_tenant();
        self.hooks.reset_catalog();
    }

    #[must_use]
    pub fn has_permission(&self, names: &[&str], mode: PermissionMode) -> bool {
        self.store.has_permission(names, mode)
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
