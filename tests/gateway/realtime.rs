use crate::harness::GatewayTestServer;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(server: &GatewayTestServer) -> Socket {
    let (mut socket, _) = connect_async(server.ws_url())
        .await
        .expect("websocket should connect");
    let hello = next_event(&mut socket).await;
    assert_eq!(hello["type"], "connected");
    assert!(hello["connectionId"].is_string());
    socket
}

async fn send(socket: &mut Socket, event: Value) {
    socket
        .send(Message::Text(event.to_string().into()))
        .await
        .expect("event should be sent");
}

async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("event should arrive in time")
            .expect("socket should stay open")
            .expect("frame should be readable");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("server events are json");
        }
    }
}

async fn init(socket: &mut Socket, user_id: &str, session_id: &str) {
    send(
        socket,
        json!({"type": "init-session", "userId": user_id, "sessionId": session_id}),
    )
    .await;
    let bound = next_event(socket).await;
    assert_eq!(bound["type"], "session-initialized");
    assert_eq!(bound["userId"], user_id);
    assert_eq!(bound["sessionId"], session_id);
}

async fn expect_turn(socket: &mut Socket, user_text: &str) -> Value {
    let echo = next_event(socket).await;
    assert_eq!(echo["type"], "receive-message");
    assert_eq!(echo["role"], "user");
    assert_eq!(echo["content"], user_text);
    assert!(echo["userId"].is_string());

    assert_eq!(next_event(socket).await, json!({"type": "typing", "isTyping": true}));
    assert_eq!(next_event(socket).await, json!({"type": "typing", "isTyping": false}));

    let reply = next_event(socket).await;
    assert_eq!(reply["type"], "receive-message");
    assert_eq!(reply["role"], "assistant");
    assert!(reply.get("userId").is_none());
    reply
}

#[tokio::test]
async fn send_message_round_trip_is_persisted() {
    let server = GatewayTestServer::start().await;
    let mut socket = connect(&server).await;
    init(&mut socket, "u1", "live-1").await;

    send(
        &mut socket,
        json!({"type": "send-message", "message": "How much does it cost?"}),
    )
    .await;
    let reply = expect_turn(&mut socket, "How much does it cost?").await;
    assert_eq!(reply["source"], "kb");
    assert!(reply["content"].as_str().unwrap().contains("Pricing"));

    let session: Value = reqwest::get(server.url("/api/chat/session/live-1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["chat"]["messages"].as_array().unwrap().len(), 2);
    assert_eq!(session["chat"]["metadata"]["kbHitsCount"], 1);
}

#[tokio::test]
async fn session_broadcast_reaches_every_listener() {
    let server = GatewayTestServer::start().await;
    let mut agent_view = connect(&server).await;
    let mut customer = connect(&server).await;
    init(&mut agent_view, "u1", "shared").await;
    init(&mut customer, "u1", "shared").await;

    send(
        &mut customer,
        json!({"type": "send-message", "message": "hello there"}),
    )
    .await;

    let customer_reply = expect_turn(&mut customer, "hello there").await;
    let agent_reply = expect_turn(&mut agent_view, "hello there").await;
    assert_eq!(customer_reply["content"], agent_reply["content"]);
}

#[tokio::test]
async fn user_typing_is_relayed_to_peers_only() {
    let server = GatewayTestServer::start().await;
    let mut first = connect(&server).await;
    let mut second = connect(&server).await;
    init(&mut first, "u1", "typing").await;
    init(&mut second, "u2", "typing").await;

    send(&mut first, json!({"type": "user-typing", "isTyping": true})).await;
    let relayed = next_event(&mut second).await;
    assert_eq!(
        relayed,
        json!({"type": "user-typing", "userId": "u1", "isTyping": true})
    );

    // The sender hears nothing about its own typing.
    send(&mut first, json!({"type": "ping"})).await;
    assert_eq!(next_event(&mut first).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn blank_and_malformed_events_are_rejected_to_sender() {
    let server = GatewayTestServer::start().await;
    let mut socket = connect(&server).await;
    init(&mut socket, "u1", "errors").await;

    send(&mut socket, json!({"type": "send-message", "message": "   "})).await;
    assert_eq!(
        next_event(&mut socket).await,
        json!({"type": "error", "message": "Message is required"})
    );

    socket
        .send(Message::Text("not json".into()))
        .await
        .unwrap();
    let error = next_event(&mut socket).await;
    assert_eq!(error["type"], "error");
    assert!(error["message"].as_str().unwrap().starts_with("invalid message"));
}

#[tokio::test]
async fn message_before_init_binds_implicitly() {
    let server = GatewayTestServer::start().await;
    let mut socket = connect(&server).await;

    send(
        &mut socket,
        json!({"type": "send-message", "message": "hi", "userId": "u5", "sessionId": "implicit"}),
    )
    .await;

    let bound = next_event(&mut socket).await;
    assert_eq!(bound["type"], "session-initialized");
    assert_eq!(bound["sessionId"], "implicit");
    expect_turn(&mut socket, "hi").await;
}
