//! Deferred function submissions.
//!
//! The scheduler runs functions later; this crate only submits jobs and
//! keeps the returned id. [`MemoryScheduler`] records submissions so tests
//! can inspect them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;

use crate::error::{Result, TesseraError};

/// Table name under which scheduled jobs are reported.
pub const SCHEDULED_FUNCTIONS: &str = "_scheduled_functions";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(raw: impl Into<String>) -> Self {
        JobId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Run `function` with `args` once `delay` has passed.
    async fn run_after(&self, delay: std::time::Duration, function: &str, args: Value)
        -> Result<JobId>;

    /// Run `function` with `args` at `at`. A time in the past runs as soon
    /// as possible.
    async fn run_at(&self, at: DateTime<Utc>, function: &str, args: Value) -> Result<JobId>;

    async fn cancel(&self, job: &JobId) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Canceled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub id: JobId,
    pub function: String,
    pub args: Value,
    pub run_at: DateTime<Utc>,
    pub state: JobState,
}

/// Records submissions without running anything.
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    jobs: Mutex<Vec<ScheduledJob>>,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// All submitted jobs, in submission order.
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.lock().clone()
    }

    fn submit(&self, run_at: DateTime<Utc>, function: &str, args: Value) -> JobId {
        let id = JobId(uuid::Uuid::new_v4().to_string());
        log::info!("Scheduled '{function}' as job {id} for {run_at}");
        self.jobs.lock().push(ScheduledJob {
            id: id.clone(),
            function: function.to_string(),
            args,
            run_at,
            state: JobState::Pending,
        });
        id
    }
}

#[async_trait]
impl Scheduler for MemoryScheduler {
    async fn run_after(
        &self,
        delay: std::time::Duration,
        function: &str,
        args: Value,
    ) -> Result<JobId> {
        let delay = Duration::from_std(delay)
            .map_err(|err| TesseraError::InvalidArgument(format!("delay out of range: {err}")))?;
        let run_at = Utc::now()
            .checked_add_signed(delay)
            .ok_or_else(|| TesseraError::InvalidArgument("delay out of range".to_string()))?;
        Ok(self.submit(run_at, function, args))
    }

    async fn run_at(&self, at: DateTime<Utc>, function: &str, args: Value) -> Result<JobId> {
        Ok(self.submit(at, function, args))
    }

    async fn cancel(&self, job: &JobId) -> Result<()> {
        let mut jobs = self.jobs.lock();
        let entry = jobs
            .iter_mut()
            .find(|j| j.id == *job && j.state == JobState::Pending)
            .ok_or_else(|| TesseraError::NotFound {
                table: SCHEDULED_FUNCTIONS.to_string(),
                id: job.to_string(),
            })?;
        entry.state = JobState::Canceled;
        log::info!("Canceled job {job}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_run_after_records_job() {
        let scheduler = MemoryScheduler::new();
        let before = Utc::now();
        let id = scheduler
            .run_after(std::time::Duration::from_secs(60), "notes:cleanup", json!({ "tag": "x" }))
            .await
            .unwrap();

        let jobs = scheduler.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].function, "notes:cleanup");
        assert_eq!(jobs[0].args, json!({ "tag": "x" }));
        assert!(jobs[0].run_at >= before + Duration::seconds(60));
        assert_eq!(jobs[0].state, JobState::Pending);
    }

    #[tokio::test]
    async fn test_cancel() {
        let scheduler = MemoryScheduler::new();
        let at = Utc::now() + Duration::hours(1);
        let id = scheduler.run_at(at, "notes:remind", Value::Null).await.unwrap();

        scheduler.cancel(&id).await.unwrap();
        assert_eq!(scheduler.jobs()[0].state, JobState::Canceled);

        let err = scheduler.cancel(&id).await.unwrap_err();
        assert!(err.is_not_found());

        let err = scheduler.cancel(&JobId::new("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
