//! Cron service: persisted job store plus a cancellable scheduler.
//!
//! Jobs are stored as one JSON file. The scheduler loop computes the
//! next due job, sleeps until then (or the cancellation fires), and
//! hands the fired job to an injected handler — the embedding process
//! routes it to the agent manager and, when a delivery target is set,
//! onto the bus.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pepebot_types::cron::{CronJob, CronSchedule, CronStore};

use crate::error::{Result, ServiceError};

/// Handler invoked with each fired job.
pub type FireHandler = std::sync::Arc<dyn Fn(CronJob) -> BoxFuture<'static, ()> + Send + Sync>;

/// Upper bound on one scheduler sleep, so newly added jobs are picked
/// up within a reasonable window even with an empty schedule.
const MAX_SLEEP: Duration = Duration::from_secs(3600);

/// JSON-persisted cron job store with scheduling.
pub struct CronService {
    path: PathBuf,
    store: Mutex<CronStore>,
}

impl CronService {
    /// Load the store from disk (missing file = empty store; corrupt
    /// file = logged and empty).
    pub async fn load(path: PathBuf) -> Self {
        let store = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(store) => store,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt cron store, starting empty");
                    CronStore::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CronStore::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read cron store, starting empty");
                CronStore::default()
            }
        };
        Self {
            path,
            store: Mutex::new(store),
        }
    }

    /// Add a job. Its schedule is validated and its first run
    /// computed. Returns the job id.
    pub async fn add_job(&self, mut job: CronJob) -> Result<String> {
        validate_schedule(&job.schedule)?;
        if job.id.is_empty() {
            job.id = uuid::Uuid::new_v4().to_string();
        }
        job.state.next_run_ms = next_run_ms(&job.schedule, Utc::now().timestamp_millis());

        let id = job.id.clone();
        let mut store = self.store.lock().await;
        store.jobs.retain(|j| j.id != id);
        store.jobs.push(job);
        self.persist(&store).await?;
        debug!(id = %id, "cron job added");
        Ok(id)
    }

    /// Remove a job by id.
    pub async fn remove_job(&self, id: &str) -> Result<bool> {
        let mut store = self.store.lock().await;
        let before = store.jobs.len();
        store.jobs.retain(|j| j.id != id);
        let removed = store.jobs.len() != before;
        if removed {
            self.persist(&store).await?;
        }
        Ok(removed)
    }

    /// Copies of all jobs.
    pub async fn list_jobs(&self) -> Vec<CronJob> {
        self.store.lock().await.jobs.clone()
    }

    /// Enable or disable a job.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        let mut store = self.store.lock().await;
        let Some(job) = store.jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(false);
        };
        job.enabled = enabled;
        if enabled {
            job.state.next_run_ms = next_run_ms(&job.schedule, Utc::now().timestamp_millis());
        }
        self.persist(&store).await?;
        Ok(true)
    }

    /// Run the scheduler until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken, handler: FireHandler) {
        info!("cron scheduler started");
        loop {
            let now = Utc::now().timestamp_millis();
            let due = self.pop_due(now).await;

            match due {
                Some(job) => {
                    info!(id = %job.id, name = %job.name, "cron job fired");
                    handler(job).await;
                }
                None => {
                    let sleep_for = self
                        .next_wakeup(now)
                        .await
                        .map(|ms| Duration::from_millis(ms.max(0) as u64))
                        .unwrap_or(MAX_SLEEP)
                        .min(MAX_SLEEP);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!("cron scheduler exiting");
                            return;
                        }
                        _ = tokio::time::sleep(sleep_for) => {}
                    }
                }
            }

            if cancel.is_cancelled() {
                info!("cron scheduler exiting");
                return;
            }
        }
    }

    /// Take the first due job, advancing its state.
    async fn pop_due(&self, now_ms: i64) -> Option<CronJob> {
        let mut store = self.store.lock().await;
        let job = store
            .jobs
            .iter_mut()
            .filter(|j| j.enabled)
            .find(|j| j.state.next_run_ms.is_some_and(|next| next <= now_ms))?;

        job.state.last_run_ms = Some(now_ms);
        job.state.next_run_ms = next_run_ms(&job.schedule, now_ms);
        let fired = job.clone();

        if let Err(e) = self.persist(&store).await {
            warn!(error = %e, "failed to persist cron state");
        }
        Some(fired)
    }

    /// Milliseconds until the earliest scheduled run, if any.
    async fn next_wakeup(&self, now_ms: i64) -> Option<i64> {
        let store = self.store.lock().await;
        store
            .jobs
            .iter()
            .filter(|j| j.enabled)
            .filter_map(|j| j.state.next_run_ms)
            .min()
            .map(|next| next - now_ms)
    }

    async fn persist(&self, store: &CronStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(store)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

/// Validate a schedule at add time.
fn validate_schedule(schedule: &CronSchedule) -> Result<()> {
    match schedule {
        CronSchedule::Every { every_ms } => {
            if *every_ms == 0 {
                return Err(ServiceError::InvalidSchedule(
                    "interval must be positive".into(),
                ));
            }
            Ok(())
        }
        CronSchedule::Cron { expr } => {
            cron::Schedule::from_str(expr)
                .map_err(|e| ServiceError::InvalidSchedule(format!("{expr}: {e}")))?;
            Ok(())
        }
    }
}

/// Compute the next run after `now_ms`, or `None` when the schedule
/// has no future occurrence.
fn next_run_ms(schedule: &CronSchedule, now_ms: i64) -> Option<i64> {
    match schedule {
        CronSchedule::Every { every_ms } => Some(now_ms + *every_ms as i64),
        CronSchedule::Cron { expr } => {
            let schedule = cron::Schedule::from_str(expr).ok()?;
            schedule
                .after(&Utc::now())
                .next()
                .map(|dt| dt.timestamp_millis())
        }
    }
}
