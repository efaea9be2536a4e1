//! Path routing, buffered chat, and error envelopes.

use serde_json::{json, Value};

use super::common::{openai_agent, spawn_app, spawn_provider, text_reply, Reply};

#[tokio::test]
async fn agents_list_contains_loaded_paths() {
    let provider = spawn_provider(vec![]).await;
    let app = spawn_app(vec![
        openai_agent("sales-1", "sales", &provider),
        openai_agent("front-1", "front", &provider),
    ])
    .await;

    let body: Value = reqwest::get(format!("{}/agents", app.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let paths: Vec<&str> = body["agents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["front", "sales"]);
    assert_eq!(body["agents"][1]["id"], "sales-1");
}

#[tokio::test]
async fn chat_returns_output_with_empty_tool_calls() {
    let provider = spawn_provider(vec![Reply::Json(text_reply("Hello from sales."))]).await;
    let app = spawn_app(vec![openai_agent("sales-1", "sales", &provider)]).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/agents/sales/chat", app.base_url))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["text"], "Hello from sales.");
    assert_eq!(body["data"]["toolCalls"], json!([]));
    assert_eq!(body["data"]["finishReason"], "stop");
    assert!(body["traceId"].as_str().is_some());
}

#[tokio::test]
async fn unknown_agent_is_a_404_envelope() {
    let app = spawn_app(vec![]).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/agents/ghost/chat", app.base_url))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "AGENT_NOT_FOUND");
    assert!(body["error"]["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn empty_message_is_a_validation_error() {
    let provider = spawn_provider(vec![]).await;
    let app = spawn_app(vec![openai_agent("sales-1", "sales", &provider)]).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/agents/sales/chat", app.base_url))
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn get_agent_returns_summary() {
    let provider = spawn_provider(vec![]).await;
    let app = spawn_app(vec![openai_agent("sales-1", "sales", &provider)]).await;
    let body: Value = reqwest::get(format!("{}/agents/sales", app.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["path"], "sales");
    assert_eq!(body["id"], "sales-1");
}

#[tokio::test]
async fn provider_failure_surfaces_as_execution_error() {
    // No scripted replies: the provider mock refuses the connection.
    let provider = spawn_provider(vec![]).await;
    let app = spawn_app(vec![openai_agent("sales-1", "sales", &provider)]).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/agents/sales/chat", app.base_url))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "AGENT_EXECUTION_ERROR");
}
