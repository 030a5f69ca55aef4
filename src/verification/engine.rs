//! AI verification runs.
//!
//! A run takes every `Relevant` catalogue entry, asks the active agent's model
//! whether the listing belongs to a Ukrainian band and stores one pending
//! verification per successful answer. Calls run in parallel, bounded by the
//! agent's concurrency limit. The first fatal provider error stops any call
//! that has not started yet.

use super::llm::{CompletionOptions, LlmError, LlmProvider, LlmProviderFactory, Message};
use super::models::{AiAgent, AiVerification, VerificationProgress};
use super::parse::parse_reply;
use super::prompt::render_prompt;
use crate::catalogue::{
    BandDiscographyEntry, CatalogueIndexEntry, CatalogueIndexStatus, DistributorCode,
};
use crate::catalogue_store::{
    AgentStore, BandReferenceStore, CatalogueIndexStore, VerificationStore,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Buffer of the progress channel handed out by [`AiVerificationEngine::start_run`].
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

pub const NO_ACTIVE_AGENT_MESSAGE: &str = "No active AI agent is configured";

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Verification run was cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

enum EntryOutcome {
    Verified(AiVerification),
    Failed(LlmError),
    Fatal(LlmError),
    /// Never dispatched because a fatal error was seen first.
    Skipped,
    /// The task panicked or was aborted before reporting.
    Aborted,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    processed: usize,
    total: usize,
    failed: usize,
}

pub struct AiVerificationEngine {
    catalogue_store: Arc<dyn CatalogueIndexStore>,
    band_store: Arc<dyn BandReferenceStore>,
    verification_store: Arc<dyn VerificationStore>,
    agent_store: Arc<dyn AgentStore>,
    providers: Arc<dyn LlmProviderFactory>,
    request_timeout: Duration,
}

impl AiVerificationEngine {
    pub fn new(
        catalogue_store: Arc<dyn CatalogueIndexStore>,
        band_store: Arc<dyn BandReferenceStore>,
        verification_store: Arc<dyn VerificationStore>,
        agent_store: Arc<dyn AgentStore>,
        providers: Arc<dyn LlmProviderFactory>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            catalogue_store,
            band_store,
            verification_store,
            agent_store,
            providers,
            request_timeout,
        }
    }

    /// Spawns a run and returns its progress stream. The stream ends after
    /// the terminal event, or without one if the run is cancelled.
    pub fn start_run(
        self: &Arc<Self>,
        distributor: Option<DistributorCode>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<VerificationProgress> {
        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            match engine.run_verification(distributor, &tx, &cancel).await {
                Ok(()) => {}
                Err(VerificationError::Cancelled) => {
                    warn!("Verification run cancelled");
                }
                Err(e) => {
                    error!("Verification run failed: {}", e);
                }
            }
        });
        rx
    }

    /// Runs one verification pass, sending progress events to `progress`.
    ///
    /// Always sends a terminal event unless cancelled. A store failure is
    /// reported as an `error` event and returned.
    pub async fn run_verification(
        &self,
        distributor: Option<DistributorCode>,
        progress: &mpsc::Sender<VerificationProgress>,
        cancel: &CancellationToken,
    ) -> Result<(), VerificationError> {
        let mut tally = Tally::default();
        let result = self.run(distributor, progress, cancel, &mut tally).await;
        if let Err(VerificationError::Store(e)) = &result {
            emit(
                progress,
                VerificationProgress::error(tally.processed, tally.total, tally.failed, e.to_string()),
            )
            .await;
        }
        result
    }

    async fn run(
        &self,
        distributor: Option<DistributorCode>,
        progress: &mpsc::Sender<VerificationProgress>,
        cancel: &CancellationToken,
        tally: &mut Tally,
    ) -> Result<(), VerificationError> {
        if cancel.is_cancelled() {
            return Err(VerificationError::Cancelled);
        }

        let Some(agent) = self.agent_store.get_active_agent()? else {
            warn!("Verification requested without an active agent");
            emit(progress, VerificationProgress::error(0, 0, 0, NO_ACTIVE_AGENT_MESSAGE)).await;
            return Ok(());
        };

        let provider = match self.providers.create(&agent) {
            Ok(provider) => provider,
            Err(e) => {
                error!("Cannot create provider for agent {}: {}", agent.name, e);
                emit(progress, VerificationProgress::error(0, 0, 0, e.to_string())).await;
                return Ok(());
            }
        };

        let entries = self
            .catalogue_store
            .get_by_status(distributor, CatalogueIndexStatus::Relevant)?;
        let entry_ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        let removed = self.verification_store.delete_pending_for_entries(&entry_ids)?;
        if removed > 0 {
            debug!("Removed {} pending verifications before re-run", removed);
        }

        if entries.is_empty() {
            info!("Nothing to verify");
            emit(progress, VerificationProgress::completed(0, 0, 0)).await;
            return Ok(());
        }

        let discographies = self.load_discographies(&entries)?;
        tally.total = entries.len();

        info!(
            "Verifying {} entries with agent {} ({}, {} concurrent)",
            tally.total,
            agent.name,
            provider.model(),
            agent.max_concurrent_requests
        );
        emit(progress, VerificationProgress::started(tally.total)).await;

        let agent = Arc::new(agent);
        let semaphore = Arc::new(Semaphore::new(agent.max_concurrent_requests.max(1) as usize));
        let fatal = Arc::new(AtomicBool::new(false));
        let options = CompletionOptions {
            max_tokens: agent.max_tokens,
            timeout: self.request_timeout,
        };

        let mut tasks = JoinSet::new();
        for entry in entries {
            let discography = entry
                .band_reference_id
                .as_ref()
                .and_then(|id| discographies.get(id))
                .cloned()
                .unwrap_or_default();
            let agent = Arc::clone(&agent);
            let provider = Arc::clone(&provider);
            let semaphore = Arc::clone(&semaphore);
            let fatal = Arc::clone(&fatal);
            let options = options.clone();

            tasks.spawn(async move {
                let label = format!("{} - {}", entry.band_name, entry.album_title);
                if fatal.load(Ordering::SeqCst) {
                    return (label, EntryOutcome::Skipped);
                }
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (label, EntryOutcome::Skipped);
                };
                if fatal.load(Ordering::SeqCst) {
                    return (label, EntryOutcome::Skipped);
                }

                let outcome =
                    match verify_entry(provider.as_ref(), &agent, &options, &entry, &discography)
                        .await
                    {
                        Ok(verification) => EntryOutcome::Verified(verification),
                        Err(e) if e.is_fatal() => {
                            // Set while the permit is held so queued tasks see it.
                            fatal.store(true, Ordering::SeqCst);
                            EntryOutcome::Fatal(e)
                        }
                        Err(e) => EntryOutcome::Failed(e),
                    };
                (label, outcome)
            });
        }

        let mut verified = Vec::new();
        let mut fatal_message: Option<String> = None;

        loop {
            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    tasks.shutdown().await;
                    self.commit(&verified)?;
                    return Err(VerificationError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            let (label, outcome) = match joined {
                Ok(result) => result,
                Err(e) => (e.to_string(), EntryOutcome::Aborted),
            };

            match outcome {
                EntryOutcome::Skipped => continue,
                EntryOutcome::Aborted => {
                    error!("Verification task failed: {}", label);
                    tally.failed += 1;
                }
                EntryOutcome::Verified(verification) => {
                    debug!(
                        "{}: ukrainian={} confidence={:.2}",
                        label, verification.is_ukrainian, verification.confidence_score
                    );
                    verified.push(verification);
                }
                EntryOutcome::Failed(e) => {
                    warn!("Verification of {} failed: {}", label, e);
                    tally.failed += 1;
                }
                EntryOutcome::Fatal(e) => {
                    error!("Fatal provider error while verifying {}: {}", label, e);
                    tally.failed += 1;
                    fatal_message.get_or_insert_with(|| e.to_string());
                }
            }
            tally.processed += 1;
            emit(
                progress,
                VerificationProgress::progress(tally.processed, tally.total, tally.failed, label),
            )
            .await;
        }

        self.commit(&verified)?;

        match fatal_message {
            Some(message) => {
                error!(
                    "Verification aborted after {} of {} entries: {}",
                    tally.processed, tally.total, message
                );
                emit(
                    progress,
                    VerificationProgress::error(tally.processed, tally.total, tally.failed, message),
                )
                .await;
            }
            None => {
                info!(
                    "Verification completed: {} processed, {} failed, {} stored",
                    tally.processed,
                    tally.failed,
                    verified.len()
                );
                emit(
                    progress,
                    VerificationProgress::completed(tally.processed, tally.total, tally.failed),
                )
                .await;
            }
        }
        Ok(())
    }

    fn load_discographies(
        &self,
        entries: &[CatalogueIndexEntry],
    ) -> anyhow::Result<HashMap<String, Vec<BandDiscographyEntry>>> {
        let mut band_ids: Vec<String> = entries
            .iter()
            .filter_map(|e| e.band_reference_id.clone())
            .collect();
        band_ids.sort();
        band_ids.dedup();
        if band_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.band_store.get_discography_for_bands(&band_ids)
    }

    fn commit(&self, verified: &[AiVerification]) -> anyhow::Result<()> {
        if verified.is_empty() {
            return Ok(());
        }
        self.verification_store.insert_verifications(verified)
    }
}

async fn verify_entry(
    provider: &dyn LlmProvider,
    agent: &AiAgent,
    options: &CompletionOptions,
    entry: &CatalogueIndexEntry,
    discography: &[BandDiscographyEntry],
) -> Result<AiVerification, LlmError> {
    let prompt = render_prompt(
        &agent.prompt_template,
        &entry.band_name,
        &entry.album_title,
        discography,
    );
    let response = provider.complete(&[Message::user(prompt)], options).await?;
    let reply = parse_reply(&response.content)
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    let matched_discography_id = match reply.matched_album_id {
        Some(id) if discography.iter().any(|d| d.id == id) => Some(id),
        Some(id) => {
            warn!(
                "Discarding matched album id {} for {} - {}: not in offered discography",
                id, entry.band_name, entry.album_title
            );
            None
        }
        None => None,
    };

    Ok(AiVerification {
        id: uuid::Uuid::new_v4().to_string(),
        catalogue_index_id: entry.id.clone(),
        band_name: entry.band_name.clone(),
        album_title: entry.album_title.clone(),
        is_ukrainian: reply.is_ukrainian,
        confidence_score: reply.confidence,
        ai_analysis: reply.analysis,
        matched_discography_id,
        admin_decision: None,
        admin_decision_at: None,
        created_at: chrono::Utc::now().timestamp_millis(),
    })
}

/// A closed receiver means the client went away; the run carries on.
async fn emit(progress: &mpsc::Sender<VerificationProgress>, event: VerificationProgress) {
    if progress.send(event).await.is_err() {
        debug!("Progress receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{BandReference, MediaType};
    use crate::catalogue_store::{
        CatalogueIndexUpsert, PendingVerificationFilter, SqliteCatalogueStore,
    };
    use crate::verification::llm::CompletionResponse;
    use crate::verification::ProgressEventType;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    type Responder = Box<dyn Fn(&str, usize) -> Result<String, LlmError> + Send + Sync>;

    /// Counts calls and the peak number of calls in flight.
    struct MockProvider {
        respond: Responder,
        delay: Box<dyn Fn(usize) -> Duration + Send + Sync>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl MockProvider {
        fn new(
            delay: Duration,
            respond: impl Fn(&str, usize) -> Result<String, LlmError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Self::with_call_delay(move |_| delay, respond)
        }

        /// The delay of each call depends on its dispatch index.
        fn with_call_delay(
            delay: impl Fn(usize) -> Duration + Send + Sync + 'static,
            respond: impl Fn(&str, usize) -> Result<String, LlmError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                respond: Box::new(respond),
                delay: Box::new(delay),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            messages: &[Message],
            _options: &CompletionOptions,
        ) -> Result<CompletionResponse, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let prompt = messages[0].content.clone();
            self.prompts.lock().unwrap().push(prompt.clone());

            tokio::time::sleep((self.delay)(call)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            (self.respond)(&prompt, call).map(|content| CompletionResponse {
                content,
                stop_reason: Some("end_turn".to_string()),
                usage: None,
            })
        }
    }

    struct MockFactory(Arc<MockProvider>);

    impl LlmProviderFactory for MockFactory {
        fn create(&self, _agent: &AiAgent) -> Result<Arc<dyn LlmProvider>, LlmError> {
            Ok(self.0.clone())
        }
    }

    fn engine(store: &SqliteCatalogueStore, provider: Arc<MockProvider>) -> AiVerificationEngine {
        let store = Arc::new(store.clone());
        AiVerificationEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            Arc::new(MockFactory(provider)),
            Duration::from_secs(5),
        )
    }

    fn add_agent(store: &SqliteCatalogueStore, concurrency: u32) {
        let id = store
            .upsert_agent(&AiAgent {
                id: uuid::Uuid::new_v4().to_string(),
                name: "default".into(),
                description: None,
                prompt_template: "Band: {{bandName}}\nAlbum: {{albumTitle}}\n{{discography}}".into(),
                model: "mock-model".into(),
                max_tokens: 256,
                max_concurrent_requests: concurrency,
                api_key: "key".into(),
                is_active: false,
                created_at: 0,
                updated_at: 0,
            })
            .unwrap();
        store.set_active_agent(&id).unwrap();
    }

    fn add_entry(
        store: &SqliteCatalogueStore,
        distributor: DistributorCode,
        band: &str,
        album: &str,
        band_reference_id: Option<&str>,
    ) -> String {
        store
            .upsert(&CatalogueIndexUpsert {
                distributor_code: distributor,
                band_name: band.to_string(),
                album_title: album.to_string(),
                raw_title: format!("{band} - {album}"),
                detail_url: format!("https://shop.example/{band}/{album}"),
                media_type: Some(MediaType::Cd),
                status: CatalogueIndexStatus::Relevant,
                band_reference_id: band_reference_id.map(str::to_string),
            })
            .unwrap()
    }

    fn ukrainian_reply(matched: Option<&str>) -> String {
        let matched = matched
            .map(|id| format!("\"{}\"", id))
            .unwrap_or_else(|| "null".to_string());
        format!(
            "Verdict: {{\"isUkrainian\": true, \"confidence\": 0.9, \"analysis\": \"Kharkiv\", \"matchedAlbumId\": {}}}",
            matched
        )
    }

    async fn collect(
        engine: &AiVerificationEngine,
        distributor: Option<DistributorCode>,
    ) -> (Result<(), VerificationError>, Vec<VerificationProgress>) {
        let (tx, mut rx) = mpsc::channel(1024);
        let result = engine
            .run_verification(distributor, &tx, &CancellationToken::new())
            .await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (result, events)
    }

    #[tokio::test]
    async fn test_no_active_agent_emits_single_error() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Autumn Aurora", None);
        let provider = MockProvider::new(Duration::ZERO, |_, _| Ok(ukrainian_reply(None)));

        let (result, events) = collect(&engine(&store, provider.clone()), None).await;
        assert!(result.is_ok());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, ProgressEventType::Error);
        assert_eq!(events[0].error_message.as_deref(), Some(NO_ACTIVE_AGENT_MESSAGE));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_nothing_to_verify_completes_immediately() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 2);
        let provider = MockProvider::new(Duration::ZERO, |_, _| Ok(ukrainian_reply(None)));

        let (_, events) = collect(&engine(&store, provider), None).await;
        assert_eq!(events, vec![VerificationProgress::completed(0, 0, 0)]);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_agent_limit() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 2);
        for i in 0..6 {
            add_entry(&store, DistributorCode::Drakkar, "Drudkh", &format!("Album {i}"), None);
        }
        let provider = MockProvider::new(
            Duration::from_millis(30),
            |_, _| Ok(ukrainian_reply(None)),
        );

        let (result, events) = collect(&engine(&store, provider.clone()), None).await;
        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
        assert!(provider.max_in_flight.load(Ordering::SeqCst) <= 2);

        assert_eq!(events.first().unwrap().event_type, ProgressEventType::Started);
        assert_eq!(events.first().unwrap().total, 6);
        let progress: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == ProgressEventType::Progress)
            .collect();
        assert_eq!(progress.len(), 6);
        assert!(progress.windows(2).all(|w| w[0].processed < w[1].processed));
        assert_eq!(events.last().unwrap(), &VerificationProgress::completed(6, 6, 0));

        let pending = store.list_pending(&PendingVerificationFilter::default()).unwrap();
        assert_eq!(pending.len(), 6);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_dispatch() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 1);
        for i in 0..5 {
            add_entry(&store, DistributorCode::Drakkar, "Drudkh", &format!("Album {i}"), None);
        }
        let provider = MockProvider::new(
            Duration::from_millis(5),
            |_, _| Err(LlmError::RateLimited("slow down".into())),
        );

        let (result, events) = collect(&engine(&store, provider.clone()), None).await;
        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let last = events.last().unwrap();
        assert_eq!(last.event_type, ProgressEventType::Error);
        assert_eq!(last.processed, 1);
        assert_eq!(last.failed, 1);
        assert!(last.error_message.as_deref().unwrap().contains("slow down"));
        assert!(store
            .list_pending(&PendingVerificationFilter::default())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_fatal_error_lets_in_flight_calls_finish() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 2);
        for i in 0..5 {
            add_entry(&store, DistributorCode::Drakkar, "Drudkh", &format!("Album {i}"), None);
        }
        let provider = MockProvider::with_call_delay(
            |call| {
                if call == 0 {
                    Duration::from_millis(10)
                } else {
                    Duration::from_millis(150)
                }
            },
            |_, call| {
                if call == 0 {
                    Err(LlmError::Api {
                        status: 429,
                        message: "quota exceeded".into(),
                    })
                } else {
                    Ok(ukrainian_reply(None))
                }
            },
        );

        let (result, events) = collect(&engine(&store, provider.clone()), None).await;
        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        let last = events.last().unwrap();
        assert_eq!(last.event_type, ProgressEventType::Error);
        assert_eq!(last.processed, 2);
        assert_eq!(last.total, 5);
        assert_eq!(last.failed, 1);

        let pending = store.list_pending(&PendingVerificationFilter::default()).unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].is_pending());
    }

    #[tokio::test]
    async fn test_numeric_matched_id_keeps_verdict() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 1);
        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Autumn Aurora", None);
        let provider = MockProvider::new(Duration::ZERO, |_, _| {
            Ok(r#"{"isUkrainian": true, "confidence": 0.8, "analysis": "Kharkiv", "matchedAlbumId": 42}"#.to_string())
        });

        let (_, events) = collect(&engine(&store, provider), None).await;
        assert_eq!(events.last().unwrap(), &VerificationProgress::completed(1, 1, 0));

        let pending = store.list_pending(&PendingVerificationFilter::default()).unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].is_ukrainian);
        assert_eq!(pending[0].matched_discography_id, None);
    }

    #[tokio::test]
    async fn test_non_fatal_failures_are_counted_and_run_continues() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 1);
        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Broken", None);
        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Unreachable", None);
        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Fine", None);
        let provider = MockProvider::new(
            Duration::ZERO,
            |prompt, _| {
                if prompt.contains("Broken") {
                    Ok("no json here".to_string())
                } else if prompt.contains("Unreachable") {
                    Err(LlmError::Api {
                        status: 500,
                        message: "overloaded".into(),
                    })
                } else {
                    Ok(ukrainian_reply(None))
                }
            },
        );

        let (_, events) = collect(&engine(&store, provider.clone()), None).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(events.last().unwrap(), &VerificationProgress::completed(3, 3, 2));
        let pending = store.list_pending(&PendingVerificationFilter::default()).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].album_title, "Fine");
    }

    #[tokio::test]
    async fn test_panicked_task_reports_progress_as_failed() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 1);
        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Crashing", None);
        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Fine", None);
        let provider = MockProvider::new(Duration::ZERO, |prompt, _| {
            if prompt.contains("Crashing") {
                panic!("provider bug");
            }
            Ok(ukrainian_reply(None))
        });

        let (result, events) = collect(&engine(&store, provider), None).await;
        assert!(result.is_ok());
        let progress: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == ProgressEventType::Progress)
            .collect();
        assert_eq!(progress.len(), 2);
        assert_eq!(events.last().unwrap(), &VerificationProgress::completed(2, 2, 1));
        assert_eq!(
            store.list_pending(&PendingVerificationFilter::default()).unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_hallucinated_matched_id_is_discarded() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 2);
        let reference = BandReference {
            id: uuid::Uuid::new_v4().to_string(),
            band_name: "Drudkh".into(),
            metal_archives_id: 1,
            genre: None,
            last_synced_at: 0,
        };
        store.upsert_band_reference(&reference).unwrap();
        let album = BandDiscographyEntry::new(&reference.id, "Autumn Aurora", "Full-length", Some(2004));
        store.replace_discography(&reference.id, &[album.clone()]).unwrap();

        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Autumn Aurora", Some(&reference.id));
        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Invented", Some(&reference.id));

        let real_id = album.id.clone();
        let provider = MockProvider::new(
            Duration::ZERO,
            move |prompt, _| {
                if prompt.contains("Album: Autumn Aurora") {
                    Ok(ukrainian_reply(Some(&real_id)))
                } else {
                    Ok(ukrainian_reply(Some("made-up-id")))
                }
            },
        );

        collect(&engine(&store, provider.clone()), None).await;
        assert!(provider
            .prompts
            .lock()
            .unwrap()
            .iter()
            .all(|p| p.contains(&format!("[{}] Autumn Aurora (Full-length, 2004)", album.id))));

        let pending = store.list_pending(&PendingVerificationFilter::default()).unwrap();
        let matched: HashMap<_, _> = pending
            .iter()
            .map(|v| (v.album_title.as_str(), v.matched_discography_id.clone()))
            .collect();
        assert_eq!(matched["Autumn Aurora"], Some(album.id.clone()));
        assert_eq!(matched["Invented"], None);
    }

    #[tokio::test]
    async fn test_rerun_replaces_pending_and_respects_distributor_filter() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 2);
        add_entry(&store, DistributorCode::Drakkar, "Drudkh", "Autumn Aurora", None);
        add_entry(&store, DistributorCode::NapalmRecords, "Jinjer", "Wallflowers", None);
        let provider = MockProvider::new(Duration::ZERO, |_, _| Ok(ukrainian_reply(None)));
        let engine = engine(&store, provider.clone());

        collect(&engine, Some(DistributorCode::Drakkar)).await;
        collect(&engine, Some(DistributorCode::Drakkar)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        let pending = store.list_pending(&PendingVerificationFilter::default()).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].band_name, "Drudkh");
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_cancelled_without_terminal_event() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        add_agent(&store, 1);
        for i in 0..3 {
            add_entry(&store, DistributorCode::Drakkar, "Drudkh", &format!("Album {i}"), None);
        }
        let provider = MockProvider::new(
            Duration::from_secs(30),
            |_, _| Ok(ukrainian_reply(None)),
        );
        let engine = engine(&store, provider);

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(16);
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = engine.run_verification(None, &tx, &cancel).await;
        assert!(matches!(result, Err(VerificationError::Cancelled)));
        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(events.iter().all(|e| !e.is_terminal()));
    }
}
