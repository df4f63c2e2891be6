//! Client-side session boundary for the admin console.
//!
//! Talks to the same-origin gateway through a cookie-carrying transport,
//! coordinates single-flight session refresh, tracks the signed-in user and
//! tenant selection, and guards client-side navigation.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod refresh;
pub mod state;
pub mod tenant;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use api::ApiClient;
pub use auth::{AuthSession, Credentials, FetchOutcome, LoginOutcome};
pub use config::ClientConfig;
pub use context::SessionContext;
pub use error::ApiError;
pub use guard::{GuardDecision, RouteGuard};
pub use hooks::{HookChain, Navigator, NoopHooks, SessionHooks};
pub use refresh::RefreshCoordinator;
pub use state::{AuthState, AuthStatus, PermissionMode, SessionStore, Tenant, UserProfile};
pub use tenant::{TenantContext, TenantError};
pub use transport::{ApiRequest, ApiResponse, FormData, FormValue, HttpTransport, Transport};
