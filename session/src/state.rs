//! Shared auth-session state for the current console user.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SessionStore` is the single source of truth for "who is signed in". It is
//! constructed once per tab/process and handed by reference (cheap clone) to
//! the refresh coordinator, the auth machine and the route guard; there is no
//! ambient global.
//!
//! DESIGN
//! ======
//! Status moves `Unchecked -> Authenticated | Unauthenticated` and then only
//! between the two resolved states. No method returns it to `Unchecked`.
//! Locks are never held across an await point.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// PROFILE TYPES
// =============================================================================

/// Tenant (service scope) the user may act within.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Profile returned by the "who am I" endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Backend identifier; numeric or string depending on the deployment.
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub current_tenant: Option<Tenant>,
}

impl UserProfile {
    /// Decode a profile from either a `{"data": {...}}` envelope or a bare object.
    ///
    /// # Errors
    ///
    /// Returns the decode error if the payload is not a profile object.
    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        let inner = payload.get("data").filter(|d| d.is_object()).unwrap_or(payload);
        Self::deserialize(inner)
    }
}

// =============================================================================
// AUTH STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    /// The "who am I" call has not completed yet.
    #[default]
    Unchecked,
    Authenticated,
    Unauthenticated,
}

/// How a multi-permission query is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionMode {
    /// At least one named permission is held.
    #[default]
    Any,
    /// Every named permission is held.
    All,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthState {
    pub status: AuthStatus,
    pub user: Option<UserProfile>,
    pub permissions: BTreeSet<String>,
    pub loading: bool,
    /// Last user-facing error message.
    pub error: Option<String>,
}

impl AuthState {
    /// Evaluate `names` against the held permission set. An empty query passes.
    #[must_use]
    pub fn has_permission(&self, names: &[&str], mode: PermissionMode) -> bool {
        if names.is_empty() {
            return true;
        }
        match mode {
            PermissionMode::All => names.iter().all(|n| self.permissions.contains(*n)),
            PermissionMode::Any => names.iter().any(|n| self.permissions.contains(*n)),
        }
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Shared handle over `AuthState`. Clones observe the same state.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<AuthState>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, AuthState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuthState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.read().clone()
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.read().status
    }

    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.status() != AuthStatus::Unchecked
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status() == AuthStatus::Authenticated
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.read().user.clone()
    }

    #[must_use]
    pub fn user_name(&self) -> String {
        self.read().user.as_ref().map(|u| u.name.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn user_email(&self) -> String {
        self.read().user.as_ref().map(|u| u.email.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn allowed_tenants(&self) -> Vec<Tenant> {
        self.read().user.as_ref().map(|u| u.tenants.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn has_permission(&self, names: &[&str], mode: PermissionMode) -> bool {
        self.read().has_permission(names, mode)
    }

    /// Mark an auth operation as started, clearing the previous error.
    pub(crate) fn begin(&self) {
        let mut state = self.write();
        state.loading = true;
        state.error = None;
    }

    pub(crate) fn finish(&self) {
        self.write().loading = false;
    }

    pub(crate) fn set_authenticated(&self, user: UserProfile) {
        let mut state = self.write();
        state.permissions = user.permissions.iter().cloned().collect();
        state.user = Some(user);
        state.status = AuthStatus::Authenticated;
    }

    /// Resolve to `Unauthenticated`, recording why. User data is left for `reset`.
    pub(crate) fn set_unauthenticated(&self, error: Option<String>) {
        let mut state = self.write();
        state.status = AuthStatus::Unauthenticated;
        state.error = error;
    }

    /// Drop the session: `Unauthenticated`, no user, no permissions, no error.
    pub fn reset(&self) {
        let mut state = self.write();
        state.status = AuthStatus::Unauthenticated;
        state.user = None;
        state.permissions.clear();
        state.error = None;
    }

    /// Drop the session after an unrecoverable refresh, keeping the reason.
    pub(crate) fn expire(&self, reason: String) {
        self.reset();
        self.write().error = Some(reason);
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
