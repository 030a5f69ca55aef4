use super::context::JobContext;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Schedule for when a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Run at fixed intervals. The first run happens one interval after start.
    Interval(Duration),
    /// Run only when triggered through the admin API.
    Manual,
}

/// Errors that can occur during job execution.
#[derive(Debug, Clone, PartialEq)]
pub enum JobError {
    NotFound,
    AlreadyRunning,
    InvalidParams(String),
    ExecutionFailed(String),
    Cancelled,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::NotFound => write!(f, "Job not found"),
            JobError::AlreadyRunning => write!(f, "Job is already running"),
            JobError::InvalidParams(msg) => write!(f, "Invalid job parameters: {}", msg),
            JobError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            JobError::Cancelled => write!(f, "Job was cancelled"),
        }
    }
}

impl std::error::Error for JobError {}

/// Trait for background jobs.
///
/// Jobs run on the tokio runtime and must check `ctx.is_cancelled()` (or
/// select on the token) during long-running work.
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job.
    fn id(&self) -> &'static str;

    /// Human-readable name for this job.
    fn name(&self) -> &'static str;

    /// Description of what this job does.
    fn description(&self) -> &'static str;

    /// When this job should be scheduled to run.
    fn schedule(&self) -> JobSchedule;

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;

    /// Execute the job with optional parameters from a manual trigger.
    ///
    /// The default implementation ignores the parameters and delegates to
    /// `execute()`.
    async fn execute_with_params(
        &self,
        ctx: &JobContext,
        _params: Option<JsonValue>,
    ) -> Result<(), JobError> {
        self.execute(ctx).await
    }
}
