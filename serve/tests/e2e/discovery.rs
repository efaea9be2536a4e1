//! Health probes and well-known discovery cards.

use serde_json::{json, Value};

use super::common::{openai_agent, spawn_app, spawn_provider};

#[tokio::test]
async fn health_endpoints_respond() {
    let app = spawn_app(vec![]).await;
    for path in ["/health", "/health/live", "/health/ready"] {
        let resp = reqwest::get(format!("{}{}", app.base_url, path))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "{path}");
    }
    let ready: Value = reqwest::get(format!("{}/health/ready", app.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ready["agents"], 0);
}

#[tokio::test]
async fn service_card_lists_agents_and_capability_skills() {
    let provider = spawn_provider(vec![]).await;
    let mut sales = openai_agent("sales-1", "sales", &provider);
    sales["discovery"] = json!({
        "discoverable": true,
        "capabilities": [{"id": "quotes", "name": "Quotes", "description": "Produce quotes"}]
    });
    let mut hidden = openai_agent("internal-1", "internal", &provider);
    hidden["discovery"] = json!({ "discoverable": false });

    let app = spawn_app(vec![sales, hidden]).await;
    let card: Value = reqwest::get(format!("{}/.well-known/agent.json", app.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(card["protocolVersion"], "1.0");
    assert_eq!(card["url"], app.base_url);

    let ids: Vec<&str> = card["skills"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"sales-1"));
    assert!(ids.contains(&"sales-1:quotes"));
    assert!(!ids.iter().any(|id| id.starts_with("internal-1")));
}

#[tokio::test]
async fn agent_card_uses_bare_capability_ids() {
    let provider = spawn_provider(vec![]).await;
    let mut sales = openai_agent("sales-1", "sales", &provider);
    sales["discovery"] = json!({
        "capabilities": [{"id": "quotes"}]
    });
    let app = spawn_app(vec![sales]).await;

    let card: Value = reqwest::get(format!(
        "{}/.well-known/agents/sales/agent.json",
        app.base_url
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(card["skills"][0]["id"], "quotes");
}

#[tokio::test]
async fn non_discoverable_agent_has_no_card() {
    let provider = spawn_provider(vec![]).await;
    let mut hidden = openai_agent("internal-1", "internal", &provider);
    hidden["discovery"] = json!({ "discoverable": false });
    let app = spawn_app(vec![hidden]).await;

    let resp = reqwest::get(format!(
        "{}/.well-known/agents/internal/agent.json",
        app.base_url
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);
}
