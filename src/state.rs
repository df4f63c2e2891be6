//! Shared gateway state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds only immutable configuration and a pooled upstream HTTP client, so
//! concurrent proxied requests share nothing mutable.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::cookie::CookieRewrite;

/// Errors raised while assembling gateway state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The upstream HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// Shared application state. Clone is required by Axum; inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub cookie_rewrite: Arc<CookieRewrite>,
    pub http: reqwest::Client,
}

impl AppState {
    /// Build state with an upstream client honoring the configured timeouts.
    ///
    /// Redirects are not followed: a 3xx from the upstream is relayed to the
    /// browser like any other status.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: GatewayConfig) -> Result<Self, StateError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| StateError::HttpClientBuild(e.to_string()))?;
        let cookie_rewrite = Arc::new(config.cookie_rewrite());
        Ok(Self { config: Arc::new(config), cookie_rewrite, http })
    }
}
