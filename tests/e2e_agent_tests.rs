//! End-to-end tests for agent endpoints

mod common;

use common::{TestClient, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_seeded_agent_is_active_and_key_is_hidden() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.list_agents().await;
    assert_eq!(response.status(), StatusCode::OK);
    let agents: Value = response.json().await.unwrap();
    let agents = agents.as_array().unwrap();

    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["name"], "test-agent");
    assert_eq!(agents[0]["is_active"], true);
    assert!(agents[0].get("api_key").is_none());
}

#[tokio::test]
async fn test_new_agent_starts_inactive_until_activated() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .upsert_agent(json!({
            "name": "second",
            "model": "claude-other",
            "api_key": "other-key",
            "max_concurrent_requests": 1
        }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let id = response.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let active = |agents: &Value| -> Vec<String> {
        agents
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["is_active"] == true)
            .map(|a| a["name"].as_str().unwrap().to_string())
            .collect()
    };

    let agents: Value = client.list_agents().await.json().await.unwrap();
    assert_eq!(active(&agents), vec!["test-agent"]);

    let response = client.activate_agent(&id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let agents: Value = client.list_agents().await.json().await.unwrap();
    assert_eq!(active(&agents), vec!["second"]);
}

#[tokio::test]
async fn test_upsert_by_name_keeps_id() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body = json!({ "name": "test-agent", "model": "claude-newer", "api_key": "k" });
    let response = client.upsert_agent(body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let agents: Value = client.list_agents().await.json().await.unwrap();
    let agents = agents.as_array().unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["model"], "claude-newer");
    assert_eq!(agents[0]["is_active"], true);
}

#[tokio::test]
async fn test_invalid_agent_requests() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .upsert_agent(json!({
            "name": "busy",
            "model": "m",
            "api_key": "k",
            "max_concurrent_requests": 0
        }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client.activate_agent("missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
