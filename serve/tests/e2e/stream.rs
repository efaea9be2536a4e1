//! Chat streaming: SSE framing and chunk ordering.

use serde_json::{json, Value};

use super::common::{openai_agent, parse_sse_frames, spawn_app, spawn_provider, Reply};

const PROVIDER_SSE: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"lo!\"},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}],",
    "\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2,\"total_tokens\":5}}\n\n",
    "data: [DONE]\n\n",
);

#[tokio::test]
async fn stream_frames_start_chunks_finish_done() {
    let provider = spawn_provider(vec![Reply::Sse(PROVIDER_SSE)]).await;
    let app = spawn_app(vec![openai_agent("sales-1", "sales", &provider)]).await;

    let body = reqwest::Client::new()
        .post(format!("{}/agents/sales/stream", app.base_url))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let frames = parse_sse_frames(&body);
    assert!(frames.len() >= 4, "frames: {frames:?}");
    assert_eq!(frames.first().unwrap()["type"], "start");
    assert!(frames[0]["traceId"].as_str().is_some());
    assert_eq!(frames.last().unwrap()["type"], "done");

    let text: String = frames
        .iter()
        .filter(|f| f["type"] == "text")
        .map(|f| f["content"].as_str().unwrap())
        .collect();
    assert_eq!(text, "Hello!");

    let finishes: Vec<&Value> = frames.iter().filter(|f| f["type"] == "finish").collect();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0]["finishReason"], "stop");
    assert_eq!(finishes[0]["usage"]["total_tokens"], 5);
}

#[tokio::test]
async fn stream_of_unknown_agent_fails_before_sse() {
    let app = spawn_app(vec![]).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/agents/ghost/stream", app.base_url))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn provider_failure_ends_stream_with_error_frame() {
    // Provider refuses connections: the turn fails and the stream must carry
    // a terminal error frame instead of done.
    let provider = spawn_provider(vec![]).await;
    let app = spawn_app(vec![openai_agent("sales-1", "sales", &provider)]).await;

    let body = reqwest::Client::new()
        .post(format!("{}/agents/sales/stream", app.base_url))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let frames = parse_sse_frames(&body);
    assert_eq!(frames.first().unwrap()["type"], "start");
    let last = frames.last().unwrap();
    assert_eq!(last["type"], "error");
    assert!(last["content"].as_str().unwrap().contains("execution failed"));
    assert!(!frames.iter().any(|f| f["type"] == "done"));
}
