//! Client-side session configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_WAITERS: usize = 256;
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
pub const DEFAULT_LANDING_ROUTE: &str = "/admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub request: Duration,
    pub connect: Duration,
    /// Upper bound on one refresh attempt; expiry counts as a refresh failure.
    pub refresh: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            refresh: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Gateway mount the client talks to (e.g. `https://admin.example.com/api`).
    pub api_base: String,
    pub timeouts: ClientTimeouts,
    /// Maximum number of calls allowed to wait on one in-flight refresh.
    pub max_waiters: usize,
    /// Route the user is sent to when the session is gone.
    pub login_route: String,
    /// Default protected route for an authenticated user.
    pub landing_route: String,
}

impl ClientConfig {
    /// Config for an explicit gateway base with every other value defaulted.
    #[must_use]
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            timeouts: ClientTimeouts::default(),
            max_waiters: DEFAULT_MAX_WAITERS,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            landing_route: DEFAULT_LANDING_ROUTE.to_string(),
        }
    }

    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `SESSION_API_BASE`: default `http://localhost:3000/api`
    /// - `SESSION_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SESSION_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SESSION_REFRESH_TIMEOUT_SECS`: default 15
    /// - `SESSION_MAX_WAITERS`: default 256
    #[must_use]
    pub fn from_env() -> Self {
        let api_base = std::env::var("SESSION_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let timeouts = ClientTimeouts {
            request: Duration::from_secs(env_parse("SESSION_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)),
            connect: Duration::from_secs(env_parse("SESSION_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
            refresh: Duration::from_secs(env_parse("SESSION_REFRESH_TIMEOUT_SECS", DEFAULT_REFRESH_TIMEOUT_SECS)),
        };
        Self {
            timeouts,
            max_waiters: env_parse("SESSION_MAX_WAITERS", DEFAULT_MAX_WAITERS).max(1),
            ..Self::new(&api_base)
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
