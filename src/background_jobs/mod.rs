//! Background job scheduling and execution system.
//!
//! Runs the catalogue indexing job on its configured interval and on demand
//! from the admin API.

mod context;
mod handle;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use handle::{JobInfo, JobRunInfo, JobRunStatus, JobScheduleInfo, SchedulerHandle};
pub use job::{BackgroundJob, JobError, JobSchedule};
pub use scheduler::{create_scheduler, JobScheduler};
