use super::AppState;
use crate::analytics;
use crate::error::RouterError;
use crate::llm::sanitize_api_error;
use crate::router::{TurnRequest, TurnTransport};
use crate::session::Conversation;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SessionBody {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HistoryQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `limit` stays a string so a junk value falls back to the default
/// instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub(super) struct TopQueriesQuery {
    #[serde(default)]
    pub limit: Option<String>,
}

impl TopQueriesQuery {
    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(analytics::DEFAULT_TOP_QUERIES)
    }
}

/// Structured response for a failed router call. `failure` is the 500 text.
fn router_error_response(failure: &'static str, error: RouterError) -> Response {
    match error {
        RouterError::EmptyMessage => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": error.to_string() })),
        )
            .into_response(),
        RouterError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": error.to_string() })),
        )
            .into_response(),
        RouterError::PersistenceFailed(store) => {
            tracing::error!(error = %store, "{failure}");
            internal_error(failure, &store.to_string())
        }
    }
}

fn internal_error(failure: &'static str, details: &str) -> Response {
    let body = json!({
        "error": failure,
        "details": sanitize_api_error(details),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// GET / — service index
pub(super) async fn handle_index() -> impl IntoResponse {
    Json(json!({
        "message": "Helpline support chat API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "chat": "/api/chat",
            "analytics": "/api/analytics",
            "knowledgeBase": "/api/kb",
            "realtime": "/ws",
        },
    }))
}

/// GET /api/health — process status and store connectivity
pub(super) async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let store_connected = state.router.store().is_durable_available().await;
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "store": if store_connected { "connected" } else { "disconnected" },
        "ai": if state.router.ai().is_configured() { "configured" } else { "not_configured" },
    }))
}

/// POST /api/chat/message — one request/response turn
pub(super) async fn handle_chat_message(
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    // A missing or malformed body is the same as an empty message.
    let request: TurnRequest = serde_json::from_slice(&body).unwrap_or_default();

    // Detached so a dropped request cannot cancel a turn halfway through.
    let router = state.router.clone();
    let turn =
        tokio::spawn(async move { router.handle_turn(request, TurnTransport::Request).await });

    match turn.await {
        Ok(Ok(reply)) => (StatusCode::OK, Json(reply)).into_response(),
        Ok(Err(error)) => router_error_response("Failed to process message", error),
        Err(join_error) => {
            tracing::error!(error = %join_error, "chat turn task failed");
            internal_error("Failed to process message", &join_error.to_string())
        }
    }
}

/// POST /api/chat/session — start a session with the welcome message
pub(super) async fn handle_create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    let request: SessionBody = serde_json::from_slice(&body).unwrap_or_default();

    match state.router.create_session(request.user_id).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(error) => router_error_response("Failed to create session", error),
    }
}

/// GET /api/chat/session/{sessionId}
pub(super) async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.router.get_session(&session_id).await {
        Ok(chat) => Json(json!({ "chat": chat })).into_response(),
        Err(error) => router_error_response("Failed to fetch session", error),
    }
}

/// GET /api/chat/history/{userId}?sessionId=
pub(super) async fn handle_get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let session_id = query.session_id.as_deref().filter(|id| !id.is_empty());
    match state.router.get_history(&user_id, session_id).await {
        Ok(chats) => {
            let count = chats.len();
            Json(json!({ "chats": chats, "count": count })).into_response()
        }
        Err(error) => router_error_response("Failed to fetch history", error),
    }
}

/// DELETE /api/chat/history/{userId}
pub(super) async fn handle_clear_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.router.clear_history(&user_id).await {
        Ok(deleted) => Json(json!({
            "message": "History cleared",
            "userId": user_id,
            "deleted": deleted,
        }))
        .into_response(),
        Err(error) => router_error_response("Failed to clear history", error),
    }
}

async fn snapshot(state: &AppState) -> Result<Vec<Conversation>, Response> {
    state
        .router
        .store()
        .all_conversations()
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "failed to load conversations for analytics");
            internal_error("Failed to fetch analytics", &error.to_string())
        })
}

/// GET /api/analytics/overview
pub(super) async fn handle_analytics_overview(State(state): State<AppState>) -> Response {
    match snapshot(&state).await {
        Ok(conversations) => Json(analytics::overview(
            &conversations,
            state.router.knowledge(),
            chrono::Utc::now(),
        ))
        .into_response(),
        Err(response) => response,
    }
}

/// GET /api/analytics/messages
pub(super) async fn handle_analytics_messages(State(state): State<AppState>) -> Response {
    match snapshot(&state).await {
        Ok(conversations) => {
            Json(json!({ "stats": analytics::message_stats(&conversations) })).into_response()
        }
        Err(response) => response,
    }
}

/// GET /api/analytics/sources
pub(super) async fn handle_analytics_sources(State(state): State<AppState>) -> Response {
    match snapshot(&state).await {
        Ok(conversations) => {
            Json(json!({ "stats": analytics::source_stats(&conversations) })).into_response()
        }
        Err(response) => response,
    }
}

/// GET /api/analytics/top-queries?limit=
pub(super) async fn handle_analytics_top_queries(
    State(state): State<AppState>,
    Query(query): Query<TopQueriesQuery>,
) -> Response {
    let limit = query.limit();
    match snapshot(&state).await {
        Ok(conversations) => Json(json!({
            "queries": analytics::top_queries(&conversations, limit),
        }))
        .into_response(),
        Err(response) => response,
    }
}

/// GET /api/analytics/hourly
pub(super) async fn handle_analytics_hourly(State(state): State<AppState>) -> Response {
    match snapshot(&state).await {
        Ok(conversations) => Json(json!({
            "hourlyStats": analytics::hourly_activity(&conversations),
        }))
        .into_response(),
        Err(response) => response,
    }
}

/// GET /api/kb/stats
pub(super) async fn handle_kb_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.router.knowledge().stats())
}

/// GET /api/kb/categories
pub(super) async fn handle_kb_categories(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "categories": state.router.knowledge().categories() }))
}

/// Anything unrouted.
pub(super) async fn handle_not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "path": uri.path(),
        })),
    )
}
