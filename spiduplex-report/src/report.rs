//! Run report model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Complete record of one duplex run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub meta: ReportMeta,
    pub config: ReportConfig,
    pub latency: LatencySummary,
    pub master: ActorSummary,
    pub slave: ActorSummary,
    /// Wall time from actor start to join.
    pub total_duration_ms: f64,
}

impl RunReport {
    /// Total mismatches detected by both actors.
    pub fn mismatches(&self) -> u64 {
        self.master.mismatches() + self.slave.mismatches()
    }

    pub fn has_fatal_error(&self) -> bool {
        self.master.status == ActorStatus::Failed || self.slave.status == ActorStatus::Failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub backend: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub transactions: u64,
    pub transfer_size: usize,
    pub speed_hz: u32,
    pub delay_us: u16,
    pub bits_per_word: u8,
    pub mode_bits: u32,
    pub pacing: String,
    pub loopback: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Accumulated `sum(duration) / transactions`, in microseconds.
    pub average_us: f64,
    /// Number of durations accumulated.
    pub samples: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Master,
    Slave,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Master => f.write_str("master"),
            ActorRole::Slave => f.write_str("slave"),
        }
    }
}

/// Terminal state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    Completed,
    MismatchAborted,
    /// Stopped by an unrecoverable transport error.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSummary {
    pub role: ActorRole,
    pub status: ActorStatus,
    pub completed_iterations: u64,
    pub planned_iterations: u64,
    pub tag_mismatches: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_mismatch_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActorSummary {
    pub fn mismatches(&self) -> u64 {
        self.tag_mismatches + u64::from(self.window_mismatch_at.is_some())
    }
}
