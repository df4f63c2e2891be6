//! Upstream proxy: the only network path between the browser and the API.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every request under the gateway prefix is forwarded to the upstream base
//! with the prefix stripped. Request bodies stream through untouched; response
//! cookies are translated one by one so the session stays scoped to the
//! gateway origin.
//!
//! ERROR HANDLING
//! ==============
//! Upstream HTTP statuses (including 4xx/5xx) are relayed verbatim. Only a
//! transport failure (connect, DNS, timeout, broken body) becomes a local
//! `500 {"error": ...}`; it never affects other in-flight requests.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use crate::cookie::{self, CookieRewrite};
use crate::state::AppState;

/// Inbound headers copied to the upstream request. Everything else is dropped.
const FORWARDED_HEADERS: &[&str] = &["content-type", "content-length", "accept", "cookie", "x-tenant-id"];

const JSON_MEDIA_TYPE: &str = "application/json";

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// No response was received from the upstream.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The upstream response body could not be read.
    #[error("upstream body read failed: {0}")]
    Body(String),

    /// The relayed response could not be assembled.
    #[error("response build failed: {0}")]
    ResponseBuild(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

// =============================================================================
// HANDLER
// =============================================================================

/// `ANY <prefix>/**`: forward to the upstream and relay its response.
pub async fn proxy(State(state): State<AppState>, request: Request) -> Response {
    match forward(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "proxy request failed");
            e.into_response()
        }
    }
}

async fn forward(state: &AppState, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let target = upstream_url(&state.config.upstream_base, &state.config.prefix, parts.uri.path(), parts.uri.query());
    tracing::debug!(method = %parts.method, %target, "proxying request");

    let send_body = carries_body(&parts.method) && has_body(&parts.headers);
    let headers = forwarded_headers(&parts.headers, send_body);

    let mut upstream = state.http.request(parts.method, &target).headers(headers);
    if send_body {
        upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let response = upstream
        .send()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    relay(response, &state.cookie_rewrite).await
}

/// Build the upstream URL: base + path with the gateway prefix removed, query preserved verbatim.
pub(crate) fn upstream_url(base: &str, prefix: &str, path: &str, query: Option<&str>) -> String {
    let remainder = path.strip_prefix(prefix).unwrap_or(path);
    match query {
        Some(q) if !q.is_empty() => format!("{base}{remainder}?{q}"),
        _ => format!("{base}{remainder}"),
    }
}

pub(crate) fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

fn has_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|len| len > 0)
}

/// Copy the safelisted inbound headers, defaulting `accept` (and `content-type`
/// when a body is sent) to JSON.
pub(crate) fn forwarded_headers(inbound: &HeaderMap, with_body: bool) -> HeaderMap {
    let mut out = HeaderMap::new();
    for name in FORWARDED_HEADERS {
        if !with_body && (*name == "content-length" || *name == "content-type") {
            continue;
        }
        for value in inbound.get_all(*name) {
            out.append(HeaderName::from_static(*name), value.clone());
        }
    }
    if !out.contains_key(ACCEPT) {
        out.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
    }
    if with_body && !out.contains_key(CONTENT_TYPE) {
        out.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
    }
    out
}

/// `true` for `application/json` and `+json` structured-syntax media types.
pub(crate) fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == JSON_MEDIA_TYPE || (essence.starts_with("application/") && essence.ends_with("+json"))
}

// =============================================================================
// RESPONSE RELAY
// =============================================================================

async fn relay(response: reqwest::Response, rewrite: &CookieRewrite) -> Result<Response, ProxyError> {
    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    let cookies = translate_cookies(response.headers(), rewrite);

    let json = content_type
        .as_ref()
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_json_media_type);

    let body = if json {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProxyError::Body(e.to_string()))?;
        // Unparseable JSON bodies are relayed as received.
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => Body::from(serde_json::to_vec(&value).map_err(|e| ProxyError::Body(e.to_string()))?),
            Err(_) => Body::from(bytes),
        }
    } else {
        Body::from_stream(response.bytes_stream())
    };

    let mut builder = Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    for cookie in cookies {
        builder = builder.header(SET_COOKIE, cookie);
    }
    builder
        .body(body)
        .map_err(|e| ProxyError::ResponseBuild(e.to_string()))
}

/// Translate every upstream `Set-Cookie`, preserving order and multiplicity.
/// Translation works on the raw header bytes, so obs-text values are covered.
pub(crate) fn translate_cookies(headers: &HeaderMap, rewrite: &CookieRewrite) -> Vec<HeaderValue> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|raw| {
            let translated = cookie::translate_bytes(raw.as_bytes(), rewrite)
                .and_then(|bytes| HeaderValue::from_bytes(&bytes).ok());
            match translated {
                Some(value) => {
                    tracing::debug!(cookie = %cookie_name(raw), "rewrote set-cookie");
                    value
                }
                None => {
                    tracing::warn!(cookie = %cookie_name(raw), "set-cookie relayed untranslated");
                    raw.clone()
                }
            }
        })
        .collect()
}

/// Cookie name for logging; never the value.
fn cookie_name(raw: &HeaderValue) -> String {
    let bytes = raw.as_bytes();
    let end = bytes.iter().position(|b| *b == b'=' || *b == b';').unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

#[cfg(test)]
#[path = "proxy_test.rs"]
mod tests;
