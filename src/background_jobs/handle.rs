use super::job::{BackgroundJob, JobError, JobSchedule};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Information about a registered job for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub schedule: JobScheduleInfo,
    pub is_running: bool,
    pub last_run: Option<JobRunInfo>,
    pub next_run_at: Option<String>,
}

/// Serializable schedule information.
#[derive(Debug, Clone, Serialize)]
pub struct JobScheduleInfo {
    #[serde(rename = "type")]
    pub schedule_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_secs: Option<u64>,
}

impl From<JobSchedule> for JobScheduleInfo {
    fn from(schedule: JobSchedule) -> Self {
        match schedule {
            JobSchedule::Interval(duration) => JobScheduleInfo {
                schedule_type: "interval".to_string(),
                value_secs: Some(duration.as_secs()),
            },
            JobSchedule::Manual => JobScheduleInfo {
                schedule_type: "manual".to_string(),
                value_secs: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Most recent run of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRunInfo {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: JobRunStatus,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

impl JobRunInfo {
    pub(super) fn started(triggered_by: &str) -> Self {
        Self {
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            status: JobRunStatus::Running,
            error_message: None,
            triggered_by: triggered_by.to_string(),
        }
    }

    pub(super) fn finish(&mut self, status: JobRunStatus, error_message: Option<String>) {
        self.finished_at = Some(Utc::now().to_rfc3339());
        self.status = status;
        self.error_message = error_message;
    }
}

/// Command sent to the scheduler.
pub enum SchedulerCommand {
    TriggerJob {
        job_id: String,
        params: Option<JsonValue>,
        response: oneshot::Sender<Result<(), JobError>>,
    },
}

/// Shared state between scheduler and handle.
pub struct SharedJobState {
    /// Static job info (set at registration, never changes)
    pub jobs: HashMap<String, Arc<dyn BackgroundJob>>,
    /// Currently running job IDs
    pub running_jobs: HashSet<String>,
    pub last_runs: HashMap<String, JobRunInfo>,
    /// Next run of interval jobs.
    pub next_runs: HashMap<String, DateTime<Utc>>,
}

impl SharedJobState {
    pub(super) fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            running_jobs: HashSet::new(),
            last_runs: HashMap::new(),
            next_runs: HashMap::new(),
        }
    }
}

/// Handle to interact with the job scheduler from HTTP handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    /// Channel to send commands to the scheduler
    command_tx: mpsc::Sender<SchedulerCommand>,
    /// Shared state for reading job info
    shared_state: Arc<RwLock<SharedJobState>>,
}

impl SchedulerHandle {
    pub fn new(
        command_tx: mpsc::Sender<SchedulerCommand>,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            command_tx,
            shared_state,
        }
    }

    /// Get information about all registered jobs.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let state = self.shared_state.read().await;
        let mut jobs: Vec<JobInfo> = state
            .jobs
            .iter()
            .map(|(job_id, job)| job_info(&state, job_id, job.as_ref()))
            .collect();

        // Sort by job ID for consistent ordering
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    /// Get information about a specific job.
    pub async fn get_job(&self, job_id: &str) -> Option<JobInfo> {
        let state = self.shared_state.read().await;
        state
            .jobs
            .get(job_id)
            .map(|job| job_info(&state, job_id, job.as_ref()))
    }

    /// Trigger a job manually.
    pub async fn trigger_job(&self, job_id: &str, params: Option<JsonValue>) -> Result<(), JobError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::TriggerJob {
                job_id: job_id.to_string(),
                params,
                response: response_tx,
            })
            .await
            .map_err(|_| JobError::ExecutionFailed("Scheduler not available".to_string()))?;

        response_rx
            .await
            .map_err(|_| JobError::ExecutionFailed("Scheduler did not respond".to_string()))?
    }

    /// Check if a job is currently running.
    pub async fn is_job_running(&self, job_id: &str) -> bool {
        let state = self.shared_state.read().await;
        state.running_jobs.contains(job_id)
    }
}

fn job_info(state: &SharedJobState, job_id: &str, job: &dyn BackgroundJob) -> JobInfo {
    JobInfo {
        id: job_id.to_string(),
        name: job.name().to_string(),
        description: job.description().to_string(),
        schedule: job.schedule().into(),
        is_running: state.running_jobs.contains(job_id),
        last_run: state.last_runs.get(job_id).cloned(),
        next_run_at: state.next_runs.get(job_id).map(|t| t.to_rfc3339()),
    }
}
