//! Application-facing API client.
//!
//! Thin facade over `Transport` that scopes each call to the selected tenant
//! and routes it through the refresh coordinator. Calls against `/auth/*`
//! skip the refresh path.

use std::sync::Arc;

use serde_json::Value;

use crate::error::ApiError;
use crate::refresh::RefreshCoordinator;
use crate::tenant::TenantContext;
use crate::transport::{ApiRequest, ApiResponse, FormData, Method, Transport};

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    coordinator: Arc<RefreshCoordinator>,
    tenant: TenantContext,
}

impl ApiClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, coordinator: Arc<RefreshCoordinator>, tenant: TenantContext) -> Self {
        Self { transport, coordinator, tenant }
    }

    /// Send one request.
    ///
    /// # Errors
    ///
    /// See `RefreshCoordinator::execute`.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let request = match self.tenant.header() {
            Some((name, id)) if !request.headers.iter().any(|(h, _)| h.eq_ignore_ascii_case(name)) => {
                request.with_header(name, &id)
            }
            _ => request,
        };
        let skip_refresh = request.is_auth_endpoint();
        let transport = self.transport.as_ref();
        let request = &request;
        self.coordinator
            .execute(move || transport.send(request), skip_refresh)
            .await
    }

    /// GET with query parameters. Pairs with an empty value are dropped.
    ///
    /// # Errors
    ///
    /// See `RefreshCoordinator::execute`.
    pub async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<ApiResponse, ApiError> {
        let request = params
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .fold(ApiRequest::get(endpoint), |req, (key, value)| req.with_query(key, value));
        self.send(request).await
    }

    /// # Errors
    ///
    /// See `RefreshCoordinator::execute`.
    pub async fn post(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::post(endpoint).with_body(body)).await
    }

    /// # Errors
    ///
    /// See `RefreshCoordinator::execute`.
    pub async fn put(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::new(Method::PUT, endpoint).with_body(body)).await
    }

    /// # Errors
    ///
    /// See `RefreshCoordinator::execute`.
    pub async fn patch(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::new(Method::PATCH, endpoint).with_body(body)).await
    }

    /// DELETE, optionally carrying a JSON body.
    ///
    /// # Errors
    ///
    /// See `RefreshCoordinator::execute`.
    pub async fn delete(&self, endpoint: &str, body: Option<Value>) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::new(Method::DELETE, endpoint);
        self.send(match body {
            Some(body) => request.with_body(body),
            None => request,
        })
        .await
    }

    /// Multipart POST (file uploads).
    ///
    /// # Errors
    ///
    /// See `RefreshCoordinator::execute`.
    pub async fn post_form(&self, endpoint: &str, form: FormData) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::post(endpoint).with_form(form)).await
    }

    /// # Errors
    ///
    /// See `RefreshCoordinator::execute`.
    pub async fn put_form(&self, endpoint: &str, form: FormData) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::new(Method::PUT, endpoint).with_form(form)).await
    }

    /// # Errors
    ///
    /// See `RefreshCoordinator::execute`.
    pub async fn patch_form(&self, endpoint: &str, form: FormData) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::new(Method::PATCH, endpoint).with_form(form)).await
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
