use crate::harness::{GatewayTestServer, test_config};
use helpline::error::{FallbackError, NOT_CONFIGURED_REPLY};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn post_message(server: &GatewayTestServer, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(server.url("/api/chat/message"))
        .json(&body)
        .send()
        .await
        .expect("chat request should complete");
    let status = response.status();
    (status, response.json().await.expect("json body"))
}

async fn get_json(server: &GatewayTestServer, path: &str) -> (StatusCode, Value) {
    let response = reqwest::get(server.url(path))
        .await
        .expect("get request should complete");
    let status = response.status();
    (status, response.json().await.expect("json body"))
}

#[tokio::test]
async fn knowledge_base_turn_is_answered_and_persisted() {
    let server = GatewayTestServer::start().await;

    let (status, reply) = post_message(
        &server,
        json!({"userId": "u1", "sessionId": "s1", "message": "I want a refund"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["source"], "kb");
    assert_eq!(reply["messageCount"], 2);
    assert!(reply["reply"].as_str().unwrap().contains("Refund Policy"));

    let (status, session) = get_json(&server, "/api/chat/session/s1").await;
    assert_eq!(status, StatusCode::OK);
    let chat = &session["chat"];
    assert_eq!(chat["userId"], "u1");
    assert_eq!(chat["messages"][0]["role"], "user");
    assert_eq!(chat["messages"][0]["content"], "I want a refund");
    assert_eq!(chat["messages"][1]["source"], "kb");
    assert_eq!(chat["metadata"]["kbHitsCount"], 1);
    assert_eq!(chat["metadata"]["aiCallsCount"], 0);
    assert_eq!(chat["metadata"]["totalMessages"], 2);
}

#[tokio::test]
async fn missing_ids_are_generated() {
    let server = GatewayTestServer::start().await;

    let (status, reply) = post_message(&server, json!({"message": "hello"})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!reply["userId"].as_str().unwrap().is_empty());
    assert!(!reply["sessionId"].as_str().unwrap().is_empty());
    assert_ne!(reply["userId"], reply["sessionId"]);
}

#[tokio::test]
async fn unmatched_message_without_ai_gets_static_reply() {
    let server = GatewayTestServer::start().await;

    let (status, reply) = post_message(
        &server,
        json!({"userId": "u1", "sessionId": "s1", "message": "Tell me a joke about penguins"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["reply"], NOT_CONFIGURED_REPLY);
    assert_eq!(reply["source"], "kb");

    let (_, session) = get_json(&server, "/api/chat/session/s1").await;
    assert_eq!(session["chat"]["metadata"]["kbHitsCount"], 0);
    assert_eq!(session["chat"]["metadata"]["aiCallsCount"], 0);
}

#[tokio::test]
async fn unmatched_message_is_answered_by_ai_provider() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4",
            "choices": [{"message": {"role": "assistant", "content": "Penguins cannot fly, but they can swim!"}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 9, "total_tokens": 49}
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let base_url = upstream.uri();
    let server = GatewayTestServer::start_with(|config| {
        config.ai.api_key = Some("sk-test".into());
        config.ai.base_url = base_url;
    })
    .await;

    let (status, reply) = post_message(
        &server,
        json!({"userId": "u1", "sessionId": "s1", "message": "Tell me about penguins"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["source"], "ai");
    assert_eq!(reply["reply"], "Penguins cannot fly, but they can swim!");

    let (_, session) = get_json(&server, "/api/chat/session/s1").await;
    assert_eq!(session["chat"]["metadata"]["aiCallsCount"], 1);

    let (_, health) = get_json(&server, "/api/health").await;
    assert_eq!(health["ai"], "configured");
}

#[tokio::test]
async fn ai_quota_failure_still_yields_a_reply() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "You exceeded your current quota", "code": "insufficient_quota"}
        })))
        .mount(&upstream)
        .await;

    let base_url = upstream.uri();
    let server = GatewayTestServer::start_with(|config| {
        config.ai.api_key = Some("sk-test".into());
        config.ai.base_url = base_url;
    })
    .await;

    let (status, reply) = post_message(
        &server,
        json!({"userId": "u1", "sessionId": "s1", "message": "Tell me about penguins"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["source"], "ai");
    let text = reply["reply"].as_str().unwrap();
    assert!(text.contains("high demand"));
    assert!(!text.contains("quota"));
}

#[tokio::test]
async fn hung_provider_yields_apology_before_request_timeout() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"message": {"role": "assistant", "content": "late"}}]}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&upstream)
        .await;

    let base_url = upstream.uri();
    let server = GatewayTestServer::start_with(|config| {
        config.ai.api_key = Some("sk-test".into());
        config.ai.base_url = base_url;
        config.ai.timeout_secs = 1;
    })
    .await;

    let (status, reply) = post_message(
        &server,
        json!({"userId": "u1", "sessionId": "s1", "message": "zzz unknown"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["source"], "ai");
    assert_eq!(reply["reply"], FallbackError::Unknown(String::new()).reply());

    let (status, session) = get_json(&server, "/api/chat/session/s1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["chat"]["messages"][0]["content"], "zzz unknown");
    assert_eq!(session["chat"]["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn history_is_capped_and_newest_first() {
    let server = GatewayTestServer::start().await;

    for n in 0..12 {
        let (status, _) = post_message(
            &server,
            json!({"userId": "u1", "sessionId": format!("s{n}"), "message": "hi"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, history) = get_json(&server, "/api/chat/history/u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["count"], 10);
    assert_eq!(history["chats"][0]["sessionId"], "s11");

    let (_, filtered) = get_json(&server, "/api/chat/history/u1?sessionId=s3").await;
    assert_eq!(filtered["count"], 1);
    assert_eq!(filtered["chats"][0]["sessionId"], "s3");
}

#[tokio::test]
async fn conversations_survive_a_restart() {
    let workspace = TempDir::new().unwrap();
    let config = test_config(workspace.path());

    {
        let server = GatewayTestServer::spawn(config.clone(), TempDir::new().unwrap()).await;
        let (status, _) = post_message(
            &server,
            json!({"userId": "u1", "sessionId": "s1", "message": "what are your support hours"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let server = GatewayTestServer::spawn(config, TempDir::new().unwrap()).await;
    let (status, session) = get_json(&server, "/api/chat/session/s1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["chat"]["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn cors_allows_configured_dashboard_origin() {
    let server = GatewayTestServer::start().await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, server.url("/api/chat/message"))
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );

    let rejected = reqwest::Client::new()
        .get(server.url("/api/health"))
        .header("Origin", "https://elsewhere.example")
        .send()
        .await
        .unwrap();
    assert!(rejected.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn index_lists_endpoints_and_unknown_routes_are_404() {
    let server = GatewayTestServer::start().await;

    let (status, index) = get_json(&server, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(index["endpoints"]["health"], "/api/health");

    let (status, missing) = get_json(&server, "/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["error"], "Endpoint not found");
}
