//! Test server lifecycle management
//!
//! Provides TestServer, which spawns an isolated admin server instance
//! for each test with its own database, fake shop and fake LLM endpoint.

use super::constants::*;
use super::fixtures::{create_test_db, spawn_fake_llm, spawn_fake_shop};
use release_index_server::background_jobs::create_scheduler;
use release_index_server::background_jobs::jobs::{CatalogueIndexJob, SelectorSourceFactory};
use release_index_server::catalogue::{DistributorCode, MediaType};
use release_index_server::config::{DistributorConfig, LlmSettings};
use release_index_server::indexer::{CatalogueIndexer, PolitenessDelay};
use release_index_server::listing::{CategoryUrl, DistributorSelectors};
use release_index_server::server::{make_app, ServerConfig, ServerState};
use release_index_server::verification::llm::AnthropicProviderFactory;
use release_index_server::verification::{seed_agent, AiVerificationEngine, DecisionResolver};
use release_index_server::{RequestsLoggingLevel, SqliteCatalogueStore};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Prompt the fake LLM knows how to read
const TEST_PROMPT_TEMPLATE: &str = "Band: {{bandName}}\nAlbum: {{albumTitle}}\n{{discography}}";

/// Test server instance with automatic cleanup
///
/// Each TestServer runs on a random port with isolated storage.
/// When dropped, the server and its background jobs are shut down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Store for direct database access in tests
    pub store: SqliteCatalogueStore,

    /// Number of requests the fake LLM has answered
    pub llm_calls: Arc<AtomicUsize>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    shutdown_token: CancellationToken,
}

impl TestServer {
    /// Spawns a server with the configured agent active
    pub async fn spawn() -> Self {
        Self::spawn_inner(true).await
    }

    /// Spawns a server without any stored agent
    pub async fn spawn_without_agent() -> Self {
        Self::spawn_inner(false).await
    }

    async fn spawn_inner(with_agent: bool) -> Self {
        let (temp_db_dir, db_path) = create_test_db().expect("Failed to create test database");
        let store = SqliteCatalogueStore::open(&db_path).expect("Failed to open store");
        let shared = Arc::new(store.clone());

        let shop_url = spawn_fake_shop().await;
        let (llm_url, llm_calls) = spawn_fake_llm().await;

        if with_agent {
            seed_agent(
                &store,
                &LlmSettings {
                    agent_name: "test-agent".to_string(),
                    model: "claude-test".to_string(),
                    max_tokens: 256,
                    max_concurrent_requests: 2,
                    api_key: "test-key".to_string(),
                    base_url: llm_url.clone(),
                    prompt_template: TEST_PROMPT_TEMPLATE.to_string(),
                    request_timeout_secs: 5,
                },
            )
            .expect("Failed to seed agent");
        }

        let engine = AiVerificationEngine::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            Arc::new(AnthropicProviderFactory::new(llm_url)),
            Duration::from_secs(5),
        );

        let shutdown_token = CancellationToken::new();
        let distributor = DistributorConfig {
            code: DistributorCode::Drakkar,
            name: "Drakkar".to_string(),
            enabled: true,
            categories: vec![CategoryUrl {
                url: shop_url,
                media_type: MediaType::Cd,
            }],
            selectors: Some(DistributorSelectors {
                item: ".product".to_string(),
                link: "a.title".to_string(),
                title: None,
                band: None,
                album: None,
                media_type: None,
                next_page: Some("a.next".to_string()),
                title_separator: " - ".to_string(),
            }),
        };
        let indexer = Arc::new(CatalogueIndexer::new(
            shared.clone(),
            shared.clone(),
            PolitenessDelay::none(),
        ));
        let index_job = CatalogueIndexJob::new(
            indexer,
            vec![distributor],
            Arc::new(SelectorSourceFactory::new(Duration::from_secs(5))),
            None,
        );
        let (mut scheduler, scheduler_handle) = create_scheduler(shutdown_token.clone());
        scheduler.register_job(Arc::new(index_job)).await;
        tokio::spawn(async move { scheduler.run().await });

        let state = ServerState {
            config: ServerConfig {
                requests_logging_level: RequestsLoggingLevel::None,
                port: 0,
            },
            start_time: Instant::now(),
            hash: "test".to_string(),
            catalogue_store: shared.clone(),
            verification_store: shared.clone(),
            agent_store: shared.clone(),
            verification_engine: Arc::new(engine),
            decision_resolver: Arc::new(DecisionResolver::new(shared)),
            scheduler_handle: Some(scheduler_handle),
            shutdown_token: shutdown_token.clone(),
        };
        let app = make_app(state);

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let server_token = shutdown_token.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            store,
            llm_calls,
            _temp_db_dir: temp_db_dir,
            shutdown_token,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
