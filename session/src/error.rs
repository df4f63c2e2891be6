//! API error taxonomy shared by the transport, the refresh coordinator and
//! the auth machine.
//!
//! ERROR HANDLING
//! ==============
//! `Unauthorized` is the only kind that the refresh coordinator intercepts;
//! every other kind reaches the caller unchanged. `SessionExpired` is never
//! produced by the transport, only by the coordinator when a refresh fails.

use serde_json::Value;

/// Errors produced by API calls made through the session boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No response was received (DNS, connection refused, timeout).
    #[error("network failure: {0}")]
    Network(String),

    /// The server answered 401.
    #[error("unauthorized{}", suffix(.message.as_deref()))]
    Unauthorized { message: Option<String> },

    /// The server answered 403.
    #[error("forbidden{}", suffix(.message.as_deref()))]
    Forbidden { message: Option<String> },

    /// Any other 4xx.
    #[error("request rejected with status {status}{}", suffix(.message.as_deref()))]
    Client { status: u16, message: Option<String> },

    /// Any 5xx.
    #[error("server failure with status {status}{}", suffix(.message.as_deref()))]
    Server { status: u16, message: Option<String> },

    /// The session could not be refreshed; the user must sign in again.
    #[error("session expired")]
    SessionExpired,

    /// Too many calls are already waiting on the in-flight refresh.
    #[error("refresh backlog full ({limit} waiters)")]
    RefreshBacklogFull { limit: usize },

    /// The request could not be assembled (e.g. an invalid multipart MIME type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A successful response body could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),
}

fn suffix(message: Option<&str>) -> String {
    message.map(|m| format!(": {m}")).unwrap_or_default()
}

impl ApiError {
    /// Map a non-success HTTP status and its (possibly empty) body to an error kind.
    #[must_use]
    pub fn from_status(status: u16, body: &Value) -> Self {
        let message = server_message(body);
        match status {
            401 => Self::Unauthorized { message },
            403 => Self::Forbidden { message },
            500..=599 => Self::Server { status, message },
            _ => Self::Client { status, message },
        }
    }

    /// `true` when this error should trigger a session refresh.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// HTTP status carried by the error, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided message, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::Client { message, .. }
            | Self::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Text suitable for surfacing to the user: the server message when
    /// present, otherwise the error's own description.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.server_message()
            .map_or_else(|| self.to_string(), str::to_owned)
    }
}

/// Extract a human-readable message from `{"error":{"message":..}}`,
/// `{"message":..}` or `{"error":".."}`, in that order.
fn server_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| body.get("message").and_then(Value::as_str))
        .or_else(|| body.get("error").and_then(Value::as_str))
        .map(str::to_owned)
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
