//! One-per-app wiring of the session components.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::AuthSession;
use crate::config::ClientConfig;
use crate::guard::RouteGuard;
use crate::hooks::{HookChain, Navigator, SessionHooks};
use crate::refresh::RefreshCoordinator;
use crate::state::SessionStore;
use crate::tenant::TenantContext;
use crate::transport::{HttpTransport, Transport, TransportBuildError};

/// Owns the session store, tenant selection, API client, auth machine and
/// route guard for one app instance. Everything shares the same store.
pub struct SessionContext {
    pub store: SessionStore,
    pub tenant: TenantContext,
    pub api: ApiClient,
    pub auth: Arc<AuthSession>,
    pub guard: RouteGuard,
}

impl SessionContext {
    /// Wire the components over an existing transport.
    ///
    /// `catalog` receives the reference-data hooks (reset on sign-out, load
    /// after the first successful session check). Tenant hooks are wired in
    /// automatically.
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
        catalog: Arc<dyn SessionHooks>,
    ) -> Self {
        let store = SessionStore::new();
        let tenant = TenantContext::new();
        let hooks: Arc<dyn SessionHooks> = Arc::new(
            HookChain::new()
                .with(Arc::new(tenant.clone()))
                .with(catalog),
        );

        let coordinator = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            store.clone(),
            navigator.clone(),
            hooks.clone(),
            config,
        ));
        let api = ApiClient::new(transport, coordinator, tenant.clone());
        let auth = Arc::new(AuthSession::new(
            api.clone(),
            store.clone(),
            hooks.clone(),
            navigator,
            &config.login_route,
        ));
        let guard = RouteGuard::new(auth.clone(), hooks, config);

        Self { store, tenant, api, auth, guard }
    }

    /// Wire the components over an HTTP transport built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(
        config: &ClientConfig,
        navigator: Arc<dyn Navigator>,
        catalog: Arc<dyn SessionHooks>,
    ) -> Result<Self, TransportBuildError> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::new(config, transport, navigator, catalog))
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
