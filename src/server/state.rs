use axum::extract::FromRef;

use crate::background_jobs::SchedulerHandle;
use crate::catalogue_store::{AgentStore, CatalogueIndexStore, VerificationStore};
use crate::verification::{AiVerificationEngine, DecisionResolver};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::ServerConfig;

pub type GuardedCatalogueStore = Arc<dyn CatalogueIndexStore>;
pub type GuardedVerificationStore = Arc<dyn VerificationStore>;
pub type GuardedAgentStore = Arc<dyn AgentStore>;
pub type GuardedVerificationEngine = Arc<AiVerificationEngine>;
pub type GuardedDecisionResolver = Arc<DecisionResolver>;
pub type OptionalSchedulerHandle = Option<SchedulerHandle>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub catalogue_store: GuardedCatalogueStore,
    pub verification_store: GuardedVerificationStore,
    pub agent_store: GuardedAgentStore,
    pub verification_engine: GuardedVerificationEngine,
    pub decision_resolver: GuardedDecisionResolver,
    pub scheduler_handle: OptionalSchedulerHandle,
    /// Parent of every verification run started over HTTP.
    pub shutdown_token: CancellationToken,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedCatalogueStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalogue_store.clone()
    }
}

impl FromRef<ServerState> for GuardedVerificationStore {
    fn from_ref(input: &ServerState) -> Self {
        input.verification_store.clone()
    }
}

impl FromRef<ServerState> for GuardedAgentStore {
    fn from_ref(input: &ServerState) -> Self {
        input.agent_store.clone()
    }
}

impl FromRef<ServerState> for GuardedVerificationEngine {
    fn from_ref(input: &ServerState) -> Self {
        input.verification_engine.clone()
    }
}

impl FromRef<ServerState> for GuardedDecisionResolver {
    fn from_ref(input: &ServerState) -> Self {
        input.decision_resolver.clone()
    }
}

impl FromRef<ServerState> for OptionalSchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler_handle.clone()
    }
}

impl FromRef<ServerState> for CancellationToken {
    fn from_ref(input: &ServerState) -> Self {
        input.shutdown_token.clone()
    }
}
