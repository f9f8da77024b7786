use super::handlers::{
    handle_analytics_hourly, handle_analytics_messages, handle_analytics_overview,
    handle_analytics_sources, handle_analytics_top_queries, handle_chat_message,
    handle_clear_history, handle_create_session, handle_get_history, handle_get_session,
    handle_health, handle_index, handle_kb_categories, handle_kb_stats, handle_not_found,
};
use super::websocket::ws_handler;
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};

use crate::config::{Config, GatewayConfig};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Run the HTTP gateway on `host:port`.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parse gateway bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind gateway socket")?;

    run_gateway_with_listener(host, listener, config).await
}

/// Run the HTTP gateway from a pre-bound listener until Ctrl-C / SIGTERM.
pub async fn run_gateway_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    config: Config,
) -> Result<()> {
    let actual_port = listener
        .local_addr()
        .context("get gateway listener local address")?
        .port();

    let state = AppState::from_config(&config).await?;
    let app = build_app(state, &config.gateway);

    tracing::info!(
        addr = %format!("{host}:{actual_port}"),
        origins = ?config.gateway.allowed_origins,
        "gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve gateway")?;

    tracing::info!("gateway stopped");
    Ok(())
}

pub fn build_app(state: AppState, gateway: &GatewayConfig) -> Router {
    let api = Router::new()
        .route("/", get(handle_index))
        .route("/api/health", get(handle_health))
        .route("/api/chat/message", post(handle_chat_message))
        .route("/api/chat/session", post(handle_create_session))
        .route("/api/chat/session/{session_id}", get(handle_get_session))
        .route(
            "/api/chat/history/{user_id}",
            get(handle_get_history).delete(handle_clear_history),
        )
        .route("/api/analytics/overview", get(handle_analytics_overview))
        .route("/api/analytics/messages", get(handle_analytics_messages))
        .route("/api/analytics/sources", get(handle_analytics_sources))
        .route(
            "/api/analytics/top-queries",
            get(handle_analytics_top_queries),
        )
        .route("/api/analytics/hourly", get(handle_analytics_hourly))
        .route("/api/kb/stats", get(handle_kb_stats))
        .route("/api/kb/categories", get(handle_kb_categories))
        .route("/ws", get(ws_handler))
        .fallback(handle_not_found);

    api.with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(middleware::from_fn(log_requests))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|origin| origin.trim() == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!("failed to listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
