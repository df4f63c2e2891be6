use gateway::{config, routes, state};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::GatewayConfig::from_env().expect("invalid gateway configuration");
    let port = config.port;
    tracing::info!(
        upstream = %config.upstream_base,
        prefix = %config.prefix,
        environment = ?config.environment,
        "gateway configured"
    );

    let state = state::AppState::new(config).expect("gateway state init failed");
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "gateway listening");
    axum::serve(listener, app).await.expect("server failed");
}
