//! Current-tenant selection for multi-tenant consoles.
//!
//! The selected tenant scopes every API call through the `X-Tenant-Id`
//! header. Selection changes notify registered listeners so views can drop
//! tenant-scoped data.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::hooks::SessionHooks;
use crate::state::{Tenant, UserProfile};

pub const TENANT_HEADER: &str = "X-Tenant-Id";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("tenant {0} is not available to this user")]
    NotAllowed(String),
}

/// Called with `(new_id, previous_id)` when the selection moves away from a tenant.
type ChangeListener = Box<dyn Fn(Option<&str>, &str) + Send + Sync>;

#[derive(Debug, Default)]
struct TenantState {
    current: Option<Tenant>,
    tenants: Vec<Tenant>,
}

/// Shared tenant selection. Clones observe the same state.
#[derive(Clone, Default)]
pub struct TenantContext {
    inner: Arc<RwLock<TenantState>>,
    listeners: Arc<Mutex<Vec<ChangeListener>>>,
}

impl TenantContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, TenantState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TenantState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn current(&self) -> Option<Tenant> {
        self.read().current.clone()
    }

    #[must_use]
    pub fn current_id(&self) -> Option<String> {
        self.read().current.as_ref().map(|t| t.id.clone())
    }

    #[must_use]
    pub fn current_name(&self) -> String {
        self.read().current.as_ref().map(|t| t.name.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn tenants(&self) -> Vec<Tenant> {
        self.read().tenants.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.read().current.is_some()
    }

    /// More than one tenant is available.
    #[must_use]
    pub fn can_switch(&self) -> bool {
        self.read().tenants.len() > 1
    }

    /// Header scoping API calls to the selected tenant, if any.
    #[must_use]
    pub fn header(&self) -> Option<(&'static str, String)> {
        self.current_id().map(|id| (TENANT_HEADER, id))
    }

    /// Register a listener fired when the selection moves off a tenant.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(Option<&str>, &str) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    pub fn set_current(&self, tenant: Option<Tenant>) {
        let previous = {
            let mut state = self.write();
            let previous = state.current.as_ref().map(|t| t.id.clone());
            state.current = tenant;
            previous
        };
        let next = self.current_id();
        if let Some(previous) = previous {
            if next.as_deref() != Some(previous.as_str()) {
                self.notify(next.as_deref(), &previous);
            }
        }
    }

    /// Replace the tenant list. A sole tenant becomes the selection when none is set.
    pub fn set_tenants(&self, tenants: Vec<Tenant>) {
        let only = {
            let mut state = self.write();
            let only = match (tenants.as_slice(), &state.current) {
                ([only], None) => Some(only.clone()),
                _ => None,
            };
            state.tenants = tenants;
            only
        };
        if only.is_some() {
            self.set_current(only);
        }
    }

    /// Select one of the available tenants by id.
    ///
    /// # Errors
    ///
    /// Returns `TenantError::NotAllowed` if `id` is not in the tenant list.
    pub fn switch_tenant(&self, id: &str) -> Result<(), TenantError> {
        let tenant = self
            .read()
            .tenants
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| TenantError::NotAllowed(id.to_string()))?;
        tracing::info!(tenant = %id, "switching tenant");
        self.set_current(Some(tenant));
        Ok(())
    }

    /// Clear selection and list without notifying listeners.
    pub fn reset(&self) {
        let mut state = self.write();
        state.current = None;
        state.tenants.clear();
    }

    fn notify(&self, next: Option<&str>, previous: &str) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(next, previous);
        }
    }
}

impl SessionHooks for TenantContext {
    fn apply_profile(&self, profile: &UserProfile) {
        if profile.current_tenant.is_some() {
            self.set_current(profile.current_tenant.clone());
        }
        self.set_tenants(profile.tenants.clone());
    }

    fn reset_tenant(&self) {
        self.reset();
    }
}

#[cfg(test)]
#[path = "tenant_test.rs"]
mod tests;
