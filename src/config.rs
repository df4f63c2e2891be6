//! Gateway configuration parsed from environment variables.

use std::time::Duration;

use crate::cookie::{CookieRewrite, Environment};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PREFIX: &str = "/api";
pub const DEFAULT_UPSTREAM_COOKIE_PATH: &str = "/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors produced while reading gateway configuration.
#[derive(Debug, thiserror::Error)]
pub enum GatewayConfigError {
    #[error("invalid PORT: {0}")]
    InvalidPort(String),

    #[error("unknown GATEWAY_ENV: {0}")]
    UnknownEnvironment(String),

    #[error("invalid GATEWAY_PREFIX '{0}': must start with '/'")]
    InvalidPrefix(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl UpstreamTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Upstream base URL, without trailing slash (e.g. `https://api.example.com/api/v1`).
    pub upstream_base: String,
    pub port: u16,
    /// Public mount point handled by the proxy (e.g. `/api`).
    pub prefix: String,
    pub environment: Environment,
    /// Cookie path the upstream issues its cookies under.
    pub upstream_cookie_path: String,
    pub timeouts: UpstreamTimeouts,
}

impl GatewayConfig {
    /// Build typed gateway config from environment variables.
    ///
    /// Optional:
    /// - `API_BASE_URL`: upstream base, default `http://localhost:8080/api/v1`
    /// - `PORT`: listen port, default 3000
    /// - `GATEWAY_PREFIX`: mount point, default `/api`
    /// - `GATEWAY_ENV`: `production` (default) or `development`
    /// - `UPSTREAM_COOKIE_PATH`: default `/api/v1`
    /// - `UPSTREAM_REQUEST_TIMEOUT_SECS`: default 30
    /// - `UPSTREAM_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT`, `GATEWAY_ENV` or `GATEWAY_PREFIX` is malformed.
    pub fn from_env() -> Result<Self, GatewayConfigError> {
        let upstream_base = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| GatewayConfigError::InvalidPort(raw.clone()))?,
            Err(_) => DEFAULT_PORT,
        };

        let prefix = parse_prefix(std::env::var("GATEWAY_PREFIX").ok().as_deref())?;
        let environment = parse_environment(std::env::var("GATEWAY_ENV").ok().as_deref())?;
        let upstream_cookie_path =
            std::env::var("UPSTREAM_COOKIE_PATH").unwrap_or_else(|_| DEFAULT_UPSTREAM_COOKIE_PATH.to_string());
        let timeouts = UpstreamTimeouts {
            request_secs: env_parse_u64("UPSTREAM_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("UPSTREAM_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { upstream_base, port, prefix, environment, upstream_cookie_path, timeouts })
    }

    /// Config pointing at an explicit upstream with every other value defaulted.
    #[must_use]
    pub fn with_upstream(upstream_base: &str, environment: Environment) -> Self {
        Self {
            upstream_base: upstream_base.trim_end_matches('/').to_string(),
            port: DEFAULT_PORT,
            prefix: DEFAULT_PREFIX.to_string(),
            environment,
            upstream_cookie_path: DEFAULT_UPSTREAM_COOKIE_PATH.to_string(),
            timeouts: UpstreamTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
        }
    }

    /// Cookie rewrite rule derived from the mount points and environment.
    #[must_use]
    pub fn cookie_rewrite(&self) -> CookieRewrite {
        CookieRewrite {
            upstream_path: self.upstream_cookie_path.clone(),
            gateway_path: self.prefix.clone(),
            environment: self.environment,
        }
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_environment(raw: Option<&str>) -> Result<Environment, GatewayConfigError> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("production" | "prod") => Ok(Environment::Production),
        Some("development" | "dev") => Ok(Environment::Development),
        Some(other) => Err(GatewayConfigError::UnknownEnvironment(other.to_string())),
    }
}

fn parse_prefix(raw: Option<&str>) -> Result<String, GatewayConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_PREFIX.to_string());
    };
    let trimmed = raw.trim().trim_end_matches('/');
    if !trimmed.starts_with('/') {
        return Err(GatewayConfigError::InvalidPrefix(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
