use super::*;
use crate::config::{GatewayConfig, UpstreamTimeouts};
use crate::cookie::Environment;
use crate::routes;
use axum::Router;
use axum::body::Bytes;
use axum::http::{Request as HttpRequest, Uri};
use axum::response::AppendHeaders;
use axum::routing::{any, get, post};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceExt;

// =============================================================================
// FAKE UPSTREAM
// =============================================================================

async fn echo(method: Method, uri: Uri, headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "cookie": header("cookie"),
        "accept": header("accept"),
        "content_type": header("content-type"),
        "content_length": header("content-length"),
        "tenant": header("x-tenant-id"),
        "authorization": header("authorization"),
        "forwarded_for": header("x-forwarded-for"),
    }))
}

async fn upload(body: Bytes) -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/octet-stream")], body)
}

async fn login() -> impl IntoResponse {
    (
        AppendHeaders([
            (SET_COOKIE, "access_token=a.b.c; Path=/api/v1; Domain=api.example.com; HttpOnly; Secure; SameSite=None"),
            (SET_COOKIE, "refresh_token=r.s.t; Path=/api/v1/auth; Max-Age=604800; HttpOnly; Secure; SameSite=None"),
        ]),
        Json(json!({ "success": true })),
    )
}

async fn spaced_json() -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/json; charset=utf-8")], "{ \"ok\" :  true,\n \"n\": [1, 2] }")
}

async fn image() -> impl IntoResponse {
    ([(CONTENT_TYPE, "image/png")], vec![0x89_u8, b'P', b'N', b'G', 0x00, 0xff, 0xfe])
}

async fn unauthorized() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "token expired" })))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "late": true }))
}

fn upstream_router() -> Router {
    Router::new()
        .route("/api/v1/echo", any(echo))
        .route("/api/v1/orders/{id}", any(echo))
        .route("/api/v1/upload", post(upload))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/spaced", get(spaced_json))
        .route("/api/v1/image", get(image))
        .route("/api/v1/auth/me", get(unauthorized))
        .route("/api/v1/slow", get(slow))
}

async fn spawn_upstream() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, upstream_router())
            .await
            .expect("upstream serve");
    });
    addr
}

fn gateway_for(base: &str, environment: Environment) -> Router {
    let config = GatewayConfig::with_upstream(base, environment);
    routes::app(AppState::new(config).expect("gateway state"))
}

async fn gateway(environment: Environment) -> Router {
    let addr = spawn_upstream().await;
    gateway_for(&format!("http://{addr}/api/v1"), environment)
}

async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

// =============================================================================
// PURE HELPERS
// =============================================================================

#[test]
fn upstream_url_strips_prefix_and_keeps_query() {
    let base = "https://backend.test/api/v1";
    assert_eq!(upstream_url(base, "/api", "/api/orders", None), "https://backend.test/api/v1/orders");
    assert_eq!(
        upstream_url(base, "/api", "/api/orders", Some("page=2&status=a%20b")),
        "https://backend.test/api/v1/orders?page=2&status=a%20b"
    );
    assert_eq!(upstream_url(base, "/api", "/api", Some("")), "https://backend.test/api/v1");
}

#[test]
fn body_methods() {
    assert!(carries_body(&Method::POST));
    assert!(carries_body(&Method::PUT));
    assert!(carries_body(&Method::PATCH));
    assert!(carries_body(&Method::DELETE));
    assert!(!carries_body(&Method::GET));
    assert!(!carries_body(&Method::HEAD));
}

#[test]
fn json_media_type_detection() {
    assert!(is_json_media_type("application/json"));
    assert!(is_json_media_type("Application/JSON; charset=utf-8"));
    assert!(is_json_media_type("application/problem+json"));
    assert!(!is_json_media_type("text/plain"));
    assert!(!is_json_media_type("image/png"));
    assert!(!is_json_media_type(""));
}

#[test]
fn forwarded_headers_apply_safelist() {
    let mut inbound = HeaderMap::new();
    inbound.insert("cookie", HeaderValue::from_static("access_token=x"));
    inbound.insert("x-tenant-id", HeaderValue::from_static("shop-1"));
    inbound.insert("authorization", HeaderValue::from_static("Bearer leak"));
    inbound.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
    inbound.insert("content-type", HeaderValue::from_static("text/plain"));

    let out = forwarded_headers(&inbound, false);
    assert_eq!(out.get("cookie").unwrap(), "access_token=x");
    assert_eq!(out.get("x-tenant-id").unwrap(), "shop-1");
    assert_eq!(out.get(ACCEPT).unwrap(), "application/json");
    assert!(out.get("authorization").is_none());
    assert!(out.get("x-forwarded-for").is_none());
    assert!(out.get(CONTENT_TYPE).is_none());

    let out = forwarded_headers(&inbound, true);
    assert_eq!(out.get(CONTENT_TYPE).unwrap(), "text/plain");

    let out = forwarded_headers(&HeaderMap::new(), true);
    assert_eq!(out.get(CONTENT_TYPE).unwrap(), "application/json");
}

#[test]
fn translate_cookies_preserves_order_and_count() {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, HeaderValue::from_static("a=1; Path=/api/v1; Domain=x.test"));
    headers.append(SET_COOKIE, HeaderValue::from_static("b=2; Path=/api/v1/auth"));
    headers.append(SET_COOKIE, HeaderValue::from_static("not a cookie"));

    let out = translate_cookies(&headers, &CookieRewrite::default());
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], "a=1; Path=/api");
    assert_eq!(out[1], "b=2; Path=/api/auth");
    assert_eq!(out[2], "not a cookie");
}

#[test]
fn translate_cookies_handles_obs_text_and_nameless_lines() {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, HeaderValue::from_bytes(b"n=caf\xe9; Path=/api/v1; Domain=x.test").unwrap());
    headers.append(SET_COOKIE, HeaderValue::from_static("=sess; Domain=x.test; Path=/api/v1"));

    let out = translate_cookies(&headers, &CookieRewrite::default());
    assert_eq!(out[0].as_bytes(), b"n=caf\xe9; Path=/api");
    assert_eq!(out[1], "=sess; Path=/api");
}

// =============================================================================
// END TO END
// =============================================================================

#[tokio::test]
async fn get_is_forwarded_with_safelisted_headers() {
    let app = gateway(Environment::Production).await;
    let request = HttpRequest::builder()
        .method(Method::GET)
        .uri("/api/orders/42?page=2&q=a%20b")
        .header("cookie", "access_token=abc")
        .header("x-tenant-id", "default")
        .header("authorization", "Bearer internal")
        .header("x-forwarded-for", "10.1.1.1")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let echoed = body_json(response).await;
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["path"], "/api/v1/orders/42");
    assert_eq!(echoed["query"], "page=2&q=a%20b");
    assert_eq!(echoed["cookie"], "access_token=abc");
    assert_eq!(echoed["tenant"], "default");
    assert_eq!(echoed["accept"], "application/json");
    assert!(echoed["authorization"].is_null());
    assert!(echoed["forwarded_for"].is_null());
}

#[tokio::test]
async fn every_method_reaches_upstream() {
    let app = gateway(Environment::Production).await;
    for method in [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
        let request = HttpRequest::builder()
            .method(method.clone())
            .uri("/api/echo")
            .header("content-type", "application/json")
            .header("content-length", "2")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{method}");
        assert_eq!(body_json(response).await["method"], method.as_str());
    }
}

#[tokio::test]
async fn binary_body_is_forwarded_byte_for_byte() {
    let app = gateway(Environment::Production).await;
    let payload: Vec<u8> = (0..=255_u8).cycle().take(256 * 1024).collect();
    let request = HttpRequest::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header("content-type", "application/octet-stream")
        .header("content-length", payload.len().to_string())
        .body(Body::from(payload.clone()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/octet-stream");
    assert_eq!(body_bytes(response).await.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn set_cookies_are_translated_in_order() {
    let app = gateway(Environment::Development).await;
    let request = HttpRequest::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .header("content-length", "32")
        .body(Body::from(r#"{"email":"test","password":"12"}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(
        cookies,
        vec![
            "access_token=a.b.c; Path=/api; HttpOnly; SameSite=Lax",
            "refresh_token=r.s.t; Path=/api/auth; Max-Age=604800; HttpOnly; SameSite=Lax",
        ]
    );
}

#[tokio::test]
async fn production_cookies_keep_secure() {
    let app = gateway(Environment::Production).await;
    let request = HttpRequest::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let first = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    assert_eq!(first, "access_token=a.b.c; Path=/api; HttpOnly; Secure; SameSite=None");
}

#[tokio::test]
async fn json_body_is_reemitted() {
    let app = gateway(Environment::Production).await;
    let request = HttpRequest::builder().uri("/api/spaced").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json; charset=utf-8");
    assert_eq!(body_bytes(response).await.as_ref(), br#"{"ok":true,"n":[1,2]}"#);
}

#[tokio::test]
async fn binary_response_streams_unmodified() {
    let app = gateway(Environment::Production).await;
    let request = HttpRequest::builder().uri("/api/image").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(body_bytes(response).await.as_ref(), &[0x89, b'P', b'N', b'G', 0x00, 0xff, 0xfe]);
}

#[tokio::test]
async fn upstream_status_is_relayed() {
    let app = gateway(Environment::Production).await;
    let request = HttpRequest::builder().uri("/api/auth/me").body(Body::empty()).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "token expired");

    let request = HttpRequest::builder().uri("/api/nowhere").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_get_is_not_memoized() {
    let app = gateway(Environment::Production).await;
    let mut bodies = Vec::new();
    for _ in 0..2 {
        let request = HttpRequest::builder()
            .uri("/api/echo?x=1")
            .header("cookie", "access_token=same")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        bodies.push(body_bytes(response).await);
    }
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn connection_failure_becomes_structured_500() {
    let app = gateway_for("http://127.0.0.1:1/api/v1", Environment::Production);
    let request = HttpRequest::builder().uri("/api/echo").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("upstream request failed"));
}

#[tokio::test]
async fn timeout_does_not_affect_concurrent_calls() {
    let addr = spawn_upstream().await;
    let mut config = GatewayConfig::with_upstream(&format!("http://{addr}/api/v1"), Environment::Production);
    config.timeouts = UpstreamTimeouts { request_secs: 1, connect_secs: 1 };
    let app = routes::app(AppState::new(config).unwrap());

    let slow = app
        .clone()
        .oneshot(HttpRequest::builder().uri("/api/slow").body(Body::empty()).unwrap());
    let fast = app.oneshot(HttpRequest::builder().uri("/api/echo").body(Body::empty()).unwrap());
    let (slow, fast) = tokio::join!(slow, fast);

    assert_eq!(fast.unwrap().status(), StatusCode::OK);
    let slow = slow.unwrap();
    assert_eq!(slow.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(slow).await["error"].is_string());
}

#[tokio::test]
async fn healthz_answers_locally() {
    let app = gateway_for("http://127.0.0.1:1/api/v1", Environment::Production);
    let request = HttpRequest::builder().uri("/healthz").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
