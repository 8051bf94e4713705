//! Resource Usage Records
//!
//! The two record shapes written to the shared resource log: periodic
//! [`Sample`]s and one [`RunSummary`] per orchestrated unit.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A single resource usage measurement.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Sample {
    /// Wall-clock time the measurement window closed
    pub timestamp: DateTime<Local>,
    /// Label of the unit being sampled
    #[serde(rename = "script")]
    pub label: String,
    /// Process CPU usage over the window (0-100 per core)
    pub cpu_percent: f64,
    /// Process resident memory as a share of host memory
    pub memory_percent: f64,
}

impl Sample {
    /// Creates a sample stamped with the current time.
    pub fn now(label: impl Into<String>, usage: Usage) -> Self {
        Self {
            timestamp: Local::now(),
            label: label.into(),
            cpu_percent: usage.cpu_percent,
            memory_percent: usage.memory_percent,
        }
    }
}

/// Timing summary appended once a unit has finished.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub timestamp: DateTime<Local>,
    #[serde(rename = "script")]
    pub label: String,
    /// Seconds spent inside the unit's entry point
    #[serde(rename = "total_execution_time")]
    pub total_duration_seconds: f64,
}

impl RunSummary {
    pub fn now(label: impl Into<String>, total_duration_seconds: f64) -> Self {
        Self {
            timestamp: Local::now(),
            label: label.into(),
            total_duration_seconds,
        }
    }
}

/// Either record shape, as stored in the resource log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum UsageRecord {
    Sample(Sample),
    Summary(RunSummary),
}

impl From<Sample> for UsageRecord {
    fn from(sample: Sample) -> Self {
        Self::Sample(sample)
    }
}

impl From<RunSummary> for UsageRecord {
    fn from(summary: RunSummary) -> Self {
        Self::Summary(summary)
    }
}

/// A raw CPU/memory reading produced by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Usage {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}
