//! Cron scheduling types.
//!
//! Defines the data model for scheduled jobs: [`CronJob`], its tagged
//! [`CronSchedule`], and the [`CronStore`] container persisted to disk.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Schedule definition for a cron job: fixed interval or cron
/// expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CronSchedule {
    /// Fire repeatedly at a fixed interval.
    Every {
        /// Interval in milliseconds.
        every_ms: u64,
    },
    /// Fire according to a cron expression (e.g. `"0 0 9 * * *"`).
    Cron {
        /// The cron expression.
        expr: String,
    },
}

/// A scheduled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    /// Stable identifier.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// When to fire.
    pub schedule: CronSchedule,

    /// Message delivered to the agent when the job fires.
    pub message: String,

    /// Optional delivery channel for the agent's response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Optional delivery recipient within the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Whether the job is live.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Runtime bookkeeping.
    #[serde(default)]
    pub state: CronJobState,
}

/// Mutable runtime state for a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronJobState {
    /// Next scheduled fire time, ms since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_ms: Option<i64>,

    /// Last fire time, ms since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_ms: Option<i64>,
}

/// Top-level container persisted as `cron/jobs.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronStore {
    /// All jobs, fired or not.
    #[serde(default)]
    pub jobs: Vec<CronJob>,
}
