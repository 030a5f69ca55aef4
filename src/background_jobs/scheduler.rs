use super::context::JobContext;
use super::handle::{JobRunInfo, JobRunStatus, SchedulerCommand, SchedulerHandle, SharedJobState};
use super::job::{BackgroundJob, JobError, JobSchedule};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long the scheduler sleeps when no interval job is due sooner.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Recheck delay for a job that is due while its previous run is still going.
const RUNNING_RECHECK_INTERVAL: Duration = Duration::from_secs(1);

/// How long shutdown waits for each cancelled job to return.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Manages background job scheduling and execution.
pub struct JobScheduler {
    /// Shared state accessible by SchedulerHandle
    shared_state: Arc<RwLock<SharedJobState>>,

    /// Currently running jobs with their task handles (not shared, managed by scheduler loop)
    running_handles: HashMap<String, JoinHandle<()>>,

    /// Cancellation tokens for each running job.
    job_cancel_tokens: HashMap<String, CancellationToken>,

    /// Receiver for commands from SchedulerHandle
    command_receiver: mpsc::Receiver<SchedulerCommand>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,
}

impl JobScheduler {
    pub fn new(
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            shared_state,
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            command_receiver,
            shutdown_token,
        }
    }

    /// Register a job with the scheduler.
    pub async fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!("Registering job: {} - {}", job_id, job.description());
        let mut state = self.shared_state.write().await;
        if let JobSchedule::Interval(interval) = job.schedule() {
            state.next_runs.insert(job_id.clone(), next_run_after(interval));
        }
        state.jobs.insert(job_id, job);
    }

    /// Get the number of registered jobs.
    pub async fn job_count(&self) -> usize {
        self.shared_state.read().await.jobs.len()
    }

    /// Main scheduler loop.
    pub async fn run(&mut self) {
        let job_count = self.job_count().await;
        info!("Starting job scheduler with {} registered jobs", job_count);

        loop {
            self.cleanup_completed_jobs().await;

            let sleep_duration = self.time_until_next_scheduled_job().await;
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs().await;
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::TriggerJob {
                job_id,
                params,
                response,
            } => {
                let result = self.trigger_job(&job_id, params).await;
                let _ = response.send(result);
            }
        }
    }

    /// Manually trigger a job by ID.
    async fn trigger_job(&mut self, job_id: &str, params: Option<JsonValue>) -> Result<(), JobError> {
        let state = self.shared_state.read().await;
        if !state.jobs.contains_key(job_id) {
            return Err(JobError::NotFound);
        }

        if state.running_jobs.contains(job_id) {
            return Err(JobError::AlreadyRunning);
        }
        drop(state);

        self.spawn_job(job_id, "manual", params).await;
        Ok(())
    }

    /// Calculate time until the next scheduled job should run.
    async fn time_until_next_scheduled_job(&self) -> Duration {
        let now = chrono::Utc::now();
        let state = self.shared_state.read().await;
        state
            .next_runs
            .iter()
            .map(|(job_id, next_run)| {
                let remaining = (*next_run - now).to_std().unwrap_or(Duration::ZERO);
                if state.running_jobs.contains(job_id) {
                    remaining.max(RUNNING_RECHECK_INTERVAL)
                } else {
                    remaining
                }
            })
            .min()
            .map_or(IDLE_CHECK_INTERVAL, |d| d.min(IDLE_CHECK_INTERVAL))
    }

    /// Run all jobs that are due for scheduled execution.
    async fn run_due_jobs(&mut self) {
        let now = chrono::Utc::now();
        let jobs_to_run: Vec<String> = {
            let state = self.shared_state.read().await;
            state
                .next_runs
                .iter()
                .filter(|(job_id, next_run)| **next_run <= now && !state.running_jobs.contains(*job_id))
                .map(|(job_id, _)| job_id.clone())
                .collect()
        };

        for job_id in jobs_to_run {
            self.spawn_job(&job_id, "schedule", None).await;
        }
    }

    async fn spawn_job(&mut self, job_id: &str, triggered_by: &str, params: Option<JsonValue>) {
        let job = {
            let mut state = self.shared_state.write().await;
            let Some(job) = state.jobs.get(job_id).map(Arc::clone) else {
                error!("Attempted to spawn unknown job: {}", job_id);
                return;
            };
            state.running_jobs.insert(job_id.to_string());
            state
                .last_runs
                .insert(job_id.to_string(), JobRunInfo::started(triggered_by));
            // Set before the run finishes so a long run cannot be scheduled twice.
            if let JobSchedule::Interval(interval) = job.schedule() {
                state.next_runs.insert(job_id.to_string(), next_run_after(interval));
            }
            job
        };

        info!("Starting job: {} (triggered_by: {})", job_id, triggered_by);

        let cancel_token = self.shutdown_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = JobContext::new(cancel_token);

        let job_id_owned = job_id.to_string();
        let shared_state = Arc::clone(&self.shared_state);

        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            let result = job.execute_with_params(&ctx, params).await;
            let elapsed = start_time.elapsed();

            let (status, error_msg) = match result {
                Ok(()) => {
                    info!("Job {} completed successfully in {:?}", job_id_owned, elapsed);
                    (JobRunStatus::Completed, None)
                }
                Err(JobError::Cancelled) => {
                    warn!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    (JobRunStatus::Cancelled, None)
                }
                Err(e) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(e.to_string()))
                }
            };

            let mut state = shared_state.write().await;
            if let Some(run) = state.last_runs.get_mut(&job_id_owned) {
                run.finish(status, error_msg);
            }
            state.running_jobs.remove(&job_id_owned);
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    /// Clean up handles for completed jobs.
    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                if let Err(e) = handle.await {
                    error!("Job {} panicked: {}", job_id, e);
                    let mut state = self.shared_state.write().await;
                    state.running_jobs.remove(&job_id);
                    if let Some(run) = state.last_runs.get_mut(&job_id) {
                        run.finish(JobRunStatus::Failed, Some(format!("Task panic: {}", e)));
                    }
                }
            }
            self.job_cancel_tokens.remove(&job_id);
        }
    }

    /// Cancel all running jobs and wait for them to return.
    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            debug!("Cancelling job: {}", job_id);
            token.cancel();
        }

        for (job_id, handle) in self.running_handles.drain() {
            if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, handle).await.is_err() {
                warn!("Job {} did not stop within {:?}", job_id, SHUTDOWN_GRACE_PERIOD);
            }
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}

fn next_run_after(interval: Duration) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now() + chrono::Duration::from_std(interval).unwrap_or_default()
}

/// Create a scheduler and its handle.
pub fn create_scheduler(shutdown_token: CancellationToken) -> (JobScheduler, SchedulerHandle) {
    let (command_tx, command_rx) = mpsc::channel(100);
    let shared_state = Arc::new(RwLock::new(SharedJobState::new()));

    let scheduler = JobScheduler::new(command_rx, shutdown_token, Arc::clone(&shared_state));
    let handle = SchedulerHandle::new(command_tx, shared_state);

    (scheduler, handle)
}
