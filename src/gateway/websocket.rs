use super::AppState;
use super::events::{ClientEvent, ServerEvent};
use super::hub::SessionBinding;
use crate::error::RouterError;
use crate::router::{TurnRequest, TurnTransport, resolve_id};
use crate::session::Message as ChatMessage;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (connection_id, mut outbox) = state.hub.register().await;
    tracing::info!(connection_id = %connection_id, "realtime client connected");

    let writer = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            if sink.send(Message::Text(event.to_json().into())).await.is_err() {
                break;
            }
        }
    });

    state
        .hub
        .send_to(connection_id, ServerEvent::connected(connection_id.to_string()))
        .await;

    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!(connection_id = %connection_id, "websocket receive error: {error}");
                break;
            }
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(&state, connection_id, event).await,
                Err(error) => {
                    state
                        .hub
                        .send_to(
                            connection_id,
                            ServerEvent::error(format!("invalid message: {error}")),
                        )
                        .await;
                }
            },
            Message::Close(_) => break,
            // Protocol pings are answered by the socket itself.
            _ => {}
        }
    }

    let binding = state.hub.unregister(connection_id).await;
    writer.abort();
    tracing::info!(
        connection_id = %connection_id,
        session_id = binding.as_ref().map_or("", |b| b.session_id.as_str()),
        "realtime client disconnected"
    );
}

async fn handle_client_event(state: &AppState, connection_id: Uuid, event: ClientEvent) {
    match event {
        ClientEvent::InitSession {
            user_id,
            session_id,
        } => {
            let binding = SessionBinding {
                user_id: resolve_id(user_id),
                session_id: resolve_id(session_id),
            };
            bind_and_announce(state, connection_id, binding).await;
        }
        ClientEvent::SendMessage {
            message,
            user_id,
            session_id,
        } => {
            if message.trim().is_empty() {
                state
                    .hub
                    .send_to(
                        connection_id,
                        ServerEvent::error(RouterError::EmptyMessage.to_string()),
                    )
                    .await;
                return;
            }

            let binding = binding_for_message(state, connection_id, user_id, session_id).await;
            // The turn outlives the socket: a client that disconnects mid-turn
            // still gets its conversation saved.
            let state = state.clone();
            tokio::spawn(async move {
                run_realtime_turn(&state, connection_id, binding, message).await;
            });
        }
        ClientEvent::UserTyping { is_typing } => {
            if let Some(binding) = state.hub.binding(connection_id).await {
                let event = ServerEvent::UserTyping {
                    user_id: binding.user_id,
                    is_typing,
                };
                state
                    .hub
                    .broadcast_peers(connection_id, &binding.session_id, &event)
                    .await;
            }
        }
        ClientEvent::Ping => state.hub.send_to(connection_id, ServerEvent::Pong).await,
    }
}

async fn bind_and_announce(state: &AppState, connection_id: Uuid, binding: SessionBinding) {
    tracing::info!(
        connection_id = %connection_id,
        user_id = %binding.user_id,
        session_id = %binding.session_id,
        "realtime session bound"
    );
    state.hub.bind(connection_id, binding.clone()).await;
    state
        .hub
        .send_to(
            connection_id,
            ServerEvent::SessionInitialized {
                user_id: binding.user_id,
                session_id: binding.session_id,
            },
        )
        .await;
}

/// Ids from the payload win, then the connection's binding, then fresh ids.
/// The connection is (re)bound so it hears its own session's broadcasts.
async fn binding_for_message(
    state: &AppState,
    connection_id: Uuid,
    user_id: Option<String>,
    session_id: Option<String>,
) -> SessionBinding {
    let current = state.hub.binding(connection_id).await;
    let binding = SessionBinding {
        user_id: resolve_id(user_id.or_else(|| current.as_ref().map(|b| b.user_id.clone()))),
        session_id: resolve_id(
            session_id.or_else(|| current.as_ref().map(|b| b.session_id.clone())),
        ),
    };

    if current.as_ref() != Some(&binding) {
        bind_and_announce(state, connection_id, binding.clone()).await;
    }
    binding
}

async fn run_realtime_turn(
    state: &AppState,
    connection_id: Uuid,
    binding: SessionBinding,
    message: String,
) {
    let session_id = binding.session_id.as_str();
    let hub = &state.hub;

    let echo = ChatMessage::user(message.trim());
    hub.broadcast_session(
        session_id,
        &ServerEvent::receive_from(&echo, binding.user_id.as_str()),
    )
    .await;
    hub.broadcast_session(session_id, &ServerEvent::typing(true))
        .await;

    let outcome = state
        .realtime_router
        .handle_turn(
            TurnRequest {
                user_id: Some(binding.user_id.clone()),
                session_id: Some(binding.session_id.clone()),
                message,
            },
            TurnTransport::Realtime,
        )
        .await;

    hub.broadcast_session(session_id, &ServerEvent::typing(false))
        .await;

    match outcome {
        Ok(reply) => {
            if !reply.persisted {
                tracing::warn!(
                    user_id = %reply.user_id,
                    session_id = %reply.session_id,
                    "realtime reply delivered without being saved"
                );
            }
            let answer = ChatMessage::assistant(reply.reply, reply.source);
            hub.broadcast_session(session_id, &ServerEvent::receive(&answer))
                .await;
        }
        Err(error) => {
            tracing::error!(
                connection_id = %connection_id,
                user_id = %binding.user_id,
                session_id = %binding.session_id,
                error = %error,
                "realtime turn failed"
            );
            hub.send_to(connection_id, ServerEvent::error("Failed to process message"))
                .await;
        }
    }
}
