//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per admin endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}/v1/admin{}", self.base_url, path)
    }

    // =========================================================================
    // Catalogue
    // =========================================================================

    pub async fn list_catalogue(&self, query: &[(&str, &str)]) -> Response {
        self.client
            .get(self.admin_url("/catalogue"))
            .query(query)
            .send()
            .await
            .expect("List catalogue request failed")
    }

    pub async fn set_status(&self, id: &str, status: &str) -> Response {
        self.client
            .put(self.admin_url(&format!("/catalogue/{id}/status")))
            .json(&json!({ "status": status }))
            .send()
            .await
            .expect("Set status request failed")
    }

    pub async fn set_status_batch(&self, ids: &[String], status: &str) -> Response {
        self.client
            .put(self.admin_url("/catalogue/status/batch"))
            .json(&json!({ "ids": ids, "status": status }))
            .send()
            .await
            .expect("Batch status request failed")
    }

    pub async fn trigger_index(&self, distributor: &str) -> Response {
        self.client
            .post(self.admin_url(&format!("/catalogue/index/{distributor}")))
            .send()
            .await
            .expect("Trigger index request failed")
    }

    pub async fn list_jobs(&self) -> Response {
        self.client
            .get(self.admin_url("/jobs"))
            .send()
            .await
            .expect("List jobs request failed")
    }

    /// Triggers indexing and waits until the job is no longer running.
    pub async fn index_and_wait(&self, distributor: &str) {
        let response = self.trigger_index(distributor).await;
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

        let start = Instant::now();
        loop {
            let jobs: Value = self.list_jobs().await.json().await.unwrap();
            let finished = jobs
                .as_array()
                .unwrap()
                .iter()
                .all(|job| job["is_running"] == false && !job["last_run"].is_null());
            if finished {
                return;
            }
            if start.elapsed() > Duration::from_millis(INDEXING_TIMEOUT_MS) {
                panic!("Indexing did not finish within {}ms", INDEXING_TIMEOUT_MS);
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
    }

    // =========================================================================
    // Verification
    // =========================================================================

    pub async fn list_candidates(&self, query: &[(&str, &str)]) -> Response {
        self.client
            .get(self.admin_url("/verification"))
            .query(query)
            .send()
            .await
            .expect("List candidates request failed")
    }

    /// Runs verification and collects every progress event of the stream.
    pub async fn run_verification(&self, body: Option<Value>) -> Vec<Value> {
        let request = self.client.post(self.admin_url("/verification/run"));
        let request = match body {
            Some(body) => request.json(&body),
            None => request,
        };
        let response = request.send().await.expect("Run verification request failed");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let text = response.text().await.expect("Failed to read event stream");
        text.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim()).expect("Event is not JSON"))
            .collect()
    }

    pub async fn set_decision(&self, id: &str, decision: &str) -> Response {
        self.client
            .put(self.admin_url(&format!("/verification/{id}/decision")))
            .json(&json!({ "decision": decision }))
            .send()
            .await
            .expect("Decision request failed")
    }

    pub async fn set_bulk_decision(&self, body: Value) -> Response {
        self.client
            .put(self.admin_url("/verification/decision/bulk"))
            .json(&body)
            .send()
            .await
            .expect("Bulk decision request failed")
    }

    pub async fn set_batch_decision(&self, ids: &[String], decision: &str) -> Response {
        self.client
            .put(self.admin_url("/verification/decision/batch"))
            .json(&json!({ "ids": ids, "decision": decision }))
            .send()
            .await
            .expect("Batch decision request failed")
    }

    // =========================================================================
    // Agents
    // =========================================================================

    pub async fn list_agents(&self) -> Response {
        self.client
            .get(self.admin_url("/agents"))
            .send()
            .await
            .expect("List agents request failed")
    }

    pub async fn upsert_agent(&self, body: Value) -> Response {
        self.client
            .post(self.admin_url("/agents"))
            .json(&body)
            .send()
            .await
            .expect("Upsert agent request failed")
    }

    pub async fn activate_agent(&self, id: &str) -> Response {
        self.client
            .put(self.admin_url(&format!("/agents/{id}/activate")))
            .send()
            .await
            .expect("Activate agent request failed")
    }
}
