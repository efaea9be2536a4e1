//! A2A task lifecycle over HTTP: create, poll, cancel, stream.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};

use super::common::{openai_agent, spawn_app, spawn_provider, spawn_provider_repeating, text_reply, Reply};

async fn poll_until_terminal(base_url: &str, task_id: &str) -> Value {
    let client = reqwest::Client::new();
    for _ in 0..200 {
        let task: Value = client
            .get(format!("{}/a2a/tasks/{}", base_url, task_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if matches!(
            task["status"].as_str(),
            Some("completed") | Some("failed") | Some("cancelled")
        ) {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} never reached a terminal state");
}

#[tokio::test]
async fn task_lifecycle_create_poll_complete() {
    let provider = spawn_provider(vec![Reply::Json(text_reply("Task answer."))]).await;
    let app = spawn_app(vec![openai_agent("sales-1", "sales", &provider)]).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/a2a/tasks", app.base_url))
        .json(&json!({ "agentPath": "sales", "message": "price?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["status"], "pending");
    assert!(created["createdAt"].as_str().is_some());
    let task_id = created["taskId"].as_str().unwrap().to_string();

    let done = poll_until_terminal(&app.base_url, &task_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["result"]["text"], "Task answer.");

    // GC with zero max age removes the completed task; polling again is 404.
    let removed = app.state.executor.cleanup_old_tasks(Duration::ZERO);
    assert_eq!(removed, 1);
    let resp = client
        .get(format!("{}/a2a/tasks/{}", app.base_url, task_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "A2A_TASK_ERROR");
}

#[tokio::test]
async fn create_task_for_unknown_agent_is_404() {
    let app = spawn_app(vec![]).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/a2a/tasks", app.base_url))
        .json(&json!({ "agentPath": "ghost", "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "AGENT_NOT_FOUND");
}

#[tokio::test]
async fn list_tasks_filters_by_agent_path() {
    let provider = spawn_provider_repeating(Reply::Json(text_reply("ok"))).await;
    let app = spawn_app(vec![
        openai_agent("a-1", "a", &provider),
        openai_agent("b-1", "b", &provider),
    ])
    .await;
    let client = reqwest::Client::new();
    for (path, msg) in [("a", "one"), ("a", "two"), ("b", "three")] {
        client
            .post(format!("{}/a2a/tasks", app.base_url))
            .json(&json!({ "agentPath": path, "message": msg }))
            .send()
            .await
            .unwrap();
    }

    let all: Value = client
        .get(format!("{}/a2a/tasks", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["tasks"].as_array().unwrap().len(), 3);

    let filtered: Value = client
        .get(format!("{}/a2a/tasks?agentPath=a", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(filtered["tasks"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn cancelling_completed_task_reports_false() {
    let provider = spawn_provider(vec![Reply::Json(text_reply("done"))]).await;
    let app = spawn_app(vec![openai_agent("sales-1", "sales", &provider)]).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{}/a2a/tasks", app.base_url))
        .json(&json!({ "agentPath": "sales", "message": "hi" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = created["taskId"].as_str().unwrap().to_string();
    poll_until_terminal(&app.base_url, &task_id).await;

    let body: Value = client
        .post(format!("{}/a2a/tasks/{}/cancel", app.base_url, task_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["cancelled"], false);
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn stream_cancel_ends_stream_and_cancels_task() {
    // Provider stalls for 10s so the turn is in flight when cancel lands.
    let provider = spawn_provider_repeating(Reply::SlowJson(
        text_reply("too late"),
        Duration::from_secs(10),
    ))
    .await;
    let app = spawn_app(vec![openai_agent("slow-1", "slow", &provider)]).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{}/a2a/tasks", app.base_url))
        .json(&json!({ "agentPath": "slow", "message": "hang" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = created["taskId"].as_str().unwrap().to_string();

    let resp = client
        .get(format!("{}/a2a/tasks/{}/stream", app.base_url, task_id))
        .send()
        .await
        .unwrap();
    let mut body = resp.bytes_stream();

    // Cancel shortly after the stream opens.
    let cancel_client = client.clone();
    let cancel_url = format!("{}/a2a/tasks/{}/cancel", app.base_url, task_id);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = cancel_client.post(cancel_url).send().await;
    });

    // The stream must terminate promptly, not hang for the provider's 10s.
    let collected = tokio::time::timeout(Duration::from_secs(5), async {
        let mut text = String::new();
        while let Some(chunk) = body.next().await {
            let Ok(chunk) = chunk else { break };
            text.push_str(&String::from_utf8_lossy(&chunk));
        }
        text
    })
    .await
    .expect("stream must not hang");

    let frames = super::common::parse_sse_frames(&collected);
    assert_eq!(frames.first().unwrap()["type"], "status");
    let last = frames.last().unwrap();
    assert!(
        last["type"] == "error" || last["type"] == "complete",
        "terminal frame: {last:?}"
    );

    let task: Value = client
        .get(format!("{}/a2a/tasks/{}", app.base_url, task_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(task["status"], "cancelled");
}
