use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::hooks::{Navigator, SessionHooks};
use crate::refresh::REFRESH_ENDPOINT;
use crate::state::UserProfile;
use crate::transport::{ApiRequest, ApiResponse, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Succeed,
    Reject,
    Hang,
}

/// Scriptable in-memory backend.
///
/// Unscripted non-auth endpoints answer 401 until a refresh succeeds (or
/// `authorize` is called), then echo the endpoint. Scripted routes are keyed
/// by `"METHOD /endpoint"` and always win.
pub struct MockTransport {
    authorized: AtomicBool,
    refresh_mode: Mutex<RefreshMode>,
    refresh_delay: Duration,
    routes: Mutex<HashMap<String, Result<ApiResponse, ApiError>>>,
    requests: Mutex<Vec<ApiRequest>>,
    pub refresh_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(mode: RefreshMode) -> Self {
        Self {
            authorized: AtomicBool::new(false),
            refresh_mode: Mutex::new(mode),
            refresh_delay: Duration::from_millis(20),
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn authorize(&self) {
        self.authorized.store(true, Ordering::SeqCst);
    }

    pub fn revoke(&self) {
        self.authorized.store(false, Ordering::SeqCst);
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn script(&self, method: &str, endpoint: &str, result: Result<ApiResponse, ApiError>) {
        self.routes.lock().unwrap().insert(format!("{method} {endpoint}"), result);
    }

    pub fn script_ok(&self, method: &str, endpoint: &str, body: Value) {
        self.script(method, endpoint, Ok(ApiResponse::new(200, body)));
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, endpoint: &str) -> usize {
        self.requests().iter().filter(|r| r.endpoint == endpoint).count()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());

        if request.endpoint == REFRESH_ENDPOINT {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.refresh_delay).await;
            let mode = *self.refresh_mode.lock().unwrap();
            return match mode {
                RefreshMode::Succeed => {
                    self.authorize();
                    Ok(ApiResponse::new(204, Value::Null))
                }
                RefreshMode::Reject => Err(ApiError::Unauthorized { message: Some("refresh token expired".into()) }),
                RefreshMode::Hang => std::future::pending().await,
            };
        }

        let key = format!("{} {}", request.method, request.endpoint);
        if let Some(result) = self.routes.lock().unwrap().get(&key) {
            return result.clone();
        }
        if !request.is_auth_endpoint() && !self.authorized.load(Ordering::SeqCst) {
            return Err(ApiError::Unauthorized { message: None });
        }
        Ok(ApiResponse::new(200, json!({ "endpoint": request.endpoint })))
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

#[derive(Default)]
pub struct RecordingHooks {
    pub profiles: AtomicUsize,
    pub tenant_resets: AtomicUsize,
    pub catalog_resets: AtomicUsize,
    pub authenticated: AtomicUsize,
}

impl RecordingHooks {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl SessionHooks for RecordingHooks {
    fn apply_profile(&self, _profile: &UserProfile) {
        self.profiles.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_tenant(&self) {
        self.tenant_resets.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_catalog(&self) {
        self.catalog_resets.fetch_add(1, Ordering::SeqCst);
    }

    fn on_authenticated(&self) {
        self.authenticated.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new("http://gateway.test/api")
}

pub fn profile_body() -> Value {
    json!({
        "success": true,
        "data": {
            "id": 1,
            "name": "Admin",
            "email": "admin@example.com",
            "permissions": ["dashboard.view", "orders.view"],
            "tenants": [
                { "id": "default", "name": "Default" },
                { "id": "outlet", "name": "Outlet" }
            ],
            "currentTenant": { "id": "default", "name": "Default" }
        }
    })
}

/// Arc handles for a fully mocked session stack.
pub struct Rig {
    pub transport: Arc<MockTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub hooks: Arc<RecordingHooks>,
}

impl Rig {
    pub fn new(mode: RefreshMode) -> Self {
        Self {
            transport: Arc::new(MockTransport::new(mode)),
            navigator: Arc::new(RecordingNavigator::default()),
            hooks: Arc::new(RecordingHooks::default()),
        }
    }
}
