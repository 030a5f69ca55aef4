//! Admin HTTP routes.
//!
//! Provides endpoints for:
//! - Browsing the catalogue index and overriding entry statuses
//! - Triggering indexing runs
//! - Running AI verification with a progress stream
//! - Deciding on verifications
//! - Managing AI agents

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::background_jobs::jobs::CATALOGUE_INDEX_JOB_ID;
use crate::background_jobs::JobError;
use crate::catalogue::{CatalogueIndexStatus, DistributorCode};
use crate::catalogue_store::{
    CatalogueIndexFilter, PendingVerificationFilter, VerificationCandidateFilter,
};
use crate::server::state::*;
use crate::verification::{AiAgent, VerificationDecision, DEFAULT_PROMPT_TEMPLATE};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: CatalogueIndexStatus,
}

#[derive(Debug, Deserialize)]
pub struct BatchStatusBody {
    pub ids: Vec<String>,
    pub status: CatalogueIndexStatus,
}

/// Request body for a verification run. An empty body verifies every distributor.
#[derive(Debug, Default, Deserialize)]
pub struct RunVerificationBody {
    #[serde(default)]
    pub distributor_code: Option<DistributorCode>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub decision: VerificationDecision,
}

#[derive(Debug, Deserialize)]
pub struct BatchDecisionBody {
    pub ids: Vec<String>,
    pub decision: VerificationDecision,
}

#[derive(Debug, Deserialize)]
pub struct BulkDecisionBody {
    #[serde(default)]
    pub distributor_code: Option<DistributorCode>,
    #[serde(default)]
    pub is_ukrainian: Option<bool>,
    pub decision: VerificationDecision,
}

/// Request body for creating or updating an agent, keyed by name.
#[derive(Debug, Deserialize)]
pub struct UpsertAgentBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt_template: Option<String>,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,
    pub api_key: String,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_max_concurrent_requests() -> u32 {
    5
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn storage_error(context: &str, e: anyhow::Error) -> Response {
    warn!("{}: {}", context, e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, context)
}

// =============================================================================
// Catalogue Routes
// =============================================================================

/// GET /catalogue - List catalogue index entries
async fn list_catalogue(
    State(store): State<GuardedCatalogueStore>,
    Query(filter): Query<CatalogueIndexFilter>,
) -> Response {
    match store.list(&filter) {
        Ok(page) => Json(page).into_response(),
        Err(e) => storage_error("Failed to list catalogue entries", e),
    }
}

/// PUT /catalogue/:id/status - Override an entry's status
async fn update_catalogue_status(
    State(store): State<GuardedCatalogueStore>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Response {
    match store.update_status(&id, body.status) {
        Ok(true) => {
            info!("Catalogue entry {} set to {}", id, body.status.as_str());
            StatusCode::OK.into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Catalogue entry not found"),
        Err(e) => storage_error("Failed to update catalogue entry", e),
    }
}

/// PUT /catalogue/status/batch - Override the status of many entries
async fn update_catalogue_status_batch(
    State(store): State<GuardedCatalogueStore>,
    Json(body): Json<BatchStatusBody>,
) -> Response {
    match store.update_status_batch(&body.ids, body.status) {
        Ok(count) => {
            info!("{} catalogue entries set to {}", count, body.status.as_str());
            Json(CountResponse { count }).into_response()
        }
        Err(e) => storage_error("Failed to update catalogue entries", e),
    }
}

/// POST /catalogue/index/:distributor - Start indexing one distributor
async fn trigger_index(
    State(scheduler): State<OptionalSchedulerHandle>,
    Path(distributor): Path<String>,
) -> Response {
    let Some(code) = DistributorCode::parse(&distributor) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown distributor {}", distributor),
        );
    };
    let Some(scheduler) = scheduler else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Job scheduler not available");
    };

    let params = serde_json::json!({ "distributor": code.as_str() });
    match scheduler.trigger_job(CATALOGUE_INDEX_JOB_ID, Some(params)).await {
        Ok(()) => {
            info!("Indexing of {} triggered", code);
            StatusCode::ACCEPTED.into_response()
        }
        Err(JobError::AlreadyRunning) => {
            error_response(StatusCode::CONFLICT, "Indexing is already running")
        }
        Err(JobError::NotFound) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Indexing job not registered")
        }
        Err(e) => {
            warn!("Failed to trigger indexing of {}: {}", code, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// =============================================================================
// Verification Routes
// =============================================================================

/// GET /verification - List verification candidates
async fn list_verification_candidates(
    State(store): State<GuardedVerificationStore>,
    Query(filter): Query<VerificationCandidateFilter>,
) -> Response {
    match store.list_candidates(&filter) {
        Ok(page) => Json(page).into_response(),
        Err(e) => storage_error("Failed to list verification candidates", e),
    }
}

/// POST /verification/run - Run verification and stream progress as SSE
///
/// The run is a child of the server shutdown token. A client that goes away
/// does not stop the run.
async fn run_verification(
    State(engine): State<GuardedVerificationEngine>,
    State(shutdown_token): State<CancellationToken>,
    body: Bytes,
) -> Response {
    let body: RunVerificationBody = if body.iter().all(u8::is_ascii_whitespace) {
        RunVerificationBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(body) => body,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        }
    };

    info!(
        "Starting verification run (distributor: {:?})",
        body.distributor_code
    );
    let progress = engine.start_run(body.distributor_code, shutdown_token.child_token());
    let events = ReceiverStream::new(progress).map(|event| Event::default().json_data(event));

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// PUT /verification/:id/decision - Decide on one verification
async fn set_decision(
    State(resolver): State<GuardedDecisionResolver>,
    Path(id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Response {
    match resolver.set_decision(&id, body.decision) {
        Ok(true) => {
            info!("Verification {} {}", id, body.decision.as_str());
            StatusCode::OK.into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Verification not found"),
        Err(e) => storage_error("Failed to apply decision", e),
    }
}

/// PUT /verification/decision/batch - Decide on listed verifications
async fn set_batch_decision(
    State(resolver): State<GuardedDecisionResolver>,
    Json(body): Json<BatchDecisionBody>,
) -> Response {
    match resolver.set_batch_decision(&body.ids, body.decision) {
        Ok(count) => Json(CountResponse { count }).into_response(),
        Err(e) => storage_error("Failed to apply decisions", e),
    }
}

/// PUT /verification/decision/bulk - Decide on every matching pending verification
async fn set_bulk_decision(
    State(resolver): State<GuardedDecisionResolver>,
    Json(body): Json<BulkDecisionBody>,
) -> Response {
    let filter = PendingVerificationFilter {
        distributor_code: body.distributor_code,
        is_ukrainian: body.is_ukrainian,
    };
    match resolver.set_bulk_decision_by_filter(&filter, body.decision) {
        Ok(count) => Json(CountResponse { count }).into_response(),
        Err(e) => storage_error("Failed to apply decisions", e),
    }
}

// =============================================================================
// Agent Routes
// =============================================================================

/// GET /agents - List agents. API keys are never returned.
async fn list_agents(State(store): State<GuardedAgentStore>) -> Response {
    match store.list_agents() {
        Ok(agents) => Json(agents).into_response(),
        Err(e) => storage_error("Failed to list agents", e),
    }
}

/// POST /agents - Create or update an agent by name
async fn upsert_agent(
    State(store): State<GuardedAgentStore>,
    Json(body): Json<UpsertAgentBody>,
) -> Response {
    if body.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Agent name must not be empty");
    }
    if body.max_concurrent_requests == 0 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "max_concurrent_requests must be at least 1",
        );
    }

    let now = chrono::Utc::now().timestamp_millis();
    let agent = AiAgent {
        id: uuid::Uuid::new_v4().to_string(),
        name: body.name,
        description: body.description,
        prompt_template: body
            .prompt_template
            .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
        model: body.model,
        max_tokens: body.max_tokens,
        max_concurrent_requests: body.max_concurrent_requests,
        api_key: body.api_key,
        is_active: false,
        created_at: now,
        updated_at: now,
    };
    match store.upsert_agent(&agent) {
        Ok(id) => {
            info!("Agent {} saved as {}", agent.name, id);
            Json(IdResponse { id }).into_response()
        }
        Err(e) => storage_error("Failed to save agent", e),
    }
}

/// PUT /agents/:id/activate - Make an agent the active one
async fn activate_agent(State(store): State<GuardedAgentStore>, Path(id): Path<String>) -> Response {
    match store.set_active_agent(&id) {
        Ok(true) => {
            info!("Agent {} activated", id);
            StatusCode::OK.into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Agent not found"),
        Err(e) => storage_error("Failed to activate agent", e),
    }
}

// =============================================================================
// Job Routes
// =============================================================================

/// GET /jobs - List background jobs
async fn list_jobs(State(scheduler): State<OptionalSchedulerHandle>) -> Response {
    match scheduler {
        Some(scheduler) => Json(scheduler.list_jobs().await).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "Job scheduler not available"),
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the admin routes.
///
/// Catalogue:
/// - GET /catalogue - List entries
/// - PUT /catalogue/:id/status - Override one status
/// - PUT /catalogue/status/batch - Override many statuses
/// - POST /catalogue/index/:distributor - Trigger indexing (202)
///
/// Verification:
/// - GET /verification - List candidates
/// - POST /verification/run - Run verification (SSE)
/// - PUT /verification/:id/decision - Decide one
/// - PUT /verification/decision/batch - Decide listed ids
/// - PUT /verification/decision/bulk - Decide by filter
///
/// Agents and jobs:
/// - GET/POST /agents, PUT /agents/:id/activate
/// - GET /jobs
pub fn admin_routes() -> Router<ServerState> {
    let catalogue_routes = Router::new()
        .route("/catalogue", get(list_catalogue))
        .route("/catalogue/{id}/status", put(update_catalogue_status))
        .route("/catalogue/status/batch", put(update_catalogue_status_batch))
        .route("/catalogue/index/{distributor}", post(trigger_index));

    let verification_routes = Router::new()
        .route("/verification", get(list_verification_candidates))
        .route("/verification/run", post(run_verification))
        .route("/verification/{id}/decision", put(set_decision))
        .route("/verification/decision/batch", put(set_batch_decision))
        .route("/verification/decision/bulk", put(set_bulk_decision));

    let agent_routes = Router::new()
        .route("/agents", get(list_agents).post(upsert_agent))
        .route("/agents/{id}/activate", put(activate_agent))
        .route("/jobs", get(list_jobs));

    catalogue_routes
        .merge(verification_routes)
        .merge(agent_routes)
}
