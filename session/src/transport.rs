//! Transport seam: the generic "make HTTP call" capability the session
//! boundary consumes.
//!
//! DESIGN
//! ======
//! `Transport` is the only way the session crate reaches the network, so the
//! coordinator and auth machine can be driven by a mock in tests. The real
//! `HttpTransport` keeps a cookie jar: the session credential travels with
//! every call implicitly and is never inspected here.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use reqwest::Method;

use crate::config::ClientConfig;
use crate::error::ApiError;

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// One multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File { file_name: String, mime: Option<String>, bytes: Vec<u8> },
}

/// Multipart form kept as plain data so a replayed call can rebuild it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormData {
    pub parts: Vec<(String, FormValue)>,
}

impl FormData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push((name.to_string(), FormValue::Text(value.to_string())));
        self
    }

    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        let value = FormValue::File { file_name: file_name.to_string(), mime: mime.map(str::to_owned), bytes };
        self.parts.push((name.to_string(), value));
        self
    }

    fn to_multipart(&self) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &self.parts {
            form = match value {
                FormValue::Text(text) => form.text(name.clone(), text.clone()),
                FormValue::File { file_name, mime, bytes } => {
                    let mut part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        part = part
                            .mime_str(mime)
                            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                    }
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// One API call, addressed relative to the gateway mount (e.g. `/orders`).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Multipart payload; takes precedence over `body`.
    pub form: Option<FormData>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, endpoint: &str) -> Self {
        Self {
            method,
            endpoint: endpoint.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            form: None,
        }
    }

    #[must_use]
    pub fn get(endpoint: &str) -> Self {
        Self::new(Method::GET, endpoint)
    }

    #[must_use]
    pub fn post(endpoint: &str) -> Self {
        Self::new(Method::POST, endpoint)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_form(mut self, form: FormData) -> Self {
        self.form = Some(form);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Calls against the auth endpoints never trigger a refresh.
    #[must_use]
    pub fn is_auth_endpoint(&self) -> bool {
        self.endpoint.starts_with("/auth/")
    }
}

/// A successful (2xx) response. Non-success statuses surface as `ApiError`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Decode the body into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        T::deserialize(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Parse a raw body: empty -> `Null`, JSON -> value, anything else -> string.
pub(crate) fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Executes one API call. Implementations map non-2xx statuses to `ApiError`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportBuildError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// `reqwest`-backed transport talking to the gateway with a persistent cookie jar.
pub struct HttpTransport {
    http: reqwest::Client,
    api_base: String,
}

impl HttpTransport {
    /// Build a transport honoring the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportBuildError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeouts.request)
            .connect_timeout(config.timeouts.connect)
            .build()
            .map_err(|e| TransportBuildError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_base: config.api_base.clone() })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.api_base)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.endpoint))
            .header(reqwest::header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(form) = &request.form {
            builder = builder.multipart(form.to_multipart()?);
        } else if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let body = parse_body(&text);

        if !(200..300).contains(&status) {
            tracing::debug!(%status, endpoint = %request.endpoint, "api call failed");
            return Err(ApiError::from_status(status, &body));
        }
        Ok(ApiResponse { status, body })
    }
}

/// Serialize any payload into a request body.
///
/// # Errors
///
/// Returns `ApiError::Decode` if the payload cannot be represented as JSON.
pub fn to_body<T: Serialize>(payload: &T) -> Result<Value, ApiError> {
    serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
