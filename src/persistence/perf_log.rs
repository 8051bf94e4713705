//! Per-Step Performance Log
//!
//! Instrumentation used inside a work unit: API latency, query execution
//! time and host resource usage, one record per call. Records accumulate
//! in a buffer owned by the [`PerfLog`] and are flushed to its file after
//! every call.

use std::time::Duration;

use chrono::{DateTime, Local};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{LogError, ProbeError};
use crate::monitoring::{Usage, UsageProbe};

use super::record_log::RecordLog;

/// Window over which host CPU usage is measured for a resource record.
pub const RESOURCE_WINDOW: Duration = Duration::from_secs(1);

/// Default number of decimals kept for durations.
pub const DEFAULT_PRECISION: u32 = 4;

/// Most decimals an `f64` duration can meaningfully carry.
pub const MAX_PRECISION: u32 = 15;

/// One performance record. Every field is written; unset ones as `null`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PerfRecord {
    pub timestamp: DateTime<Local>,
    pub step: String,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub latency_seconds: Option<f64>,
    pub execution_time_seconds: Option<f64>,
}

impl PerfRecord {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            step: step.into(),
            cpu_usage: None,
            memory_usage: None,
            latency_seconds: None,
            execution_time_seconds: None,
        }
    }
}

/// Buffered performance logger bound to one file.
#[derive(Debug)]
pub struct PerfLog {
    log: RecordLog,
    buffer: Vec<PerfRecord>,
    precision: u32,
}

impl PerfLog {
    pub fn new(log: RecordLog) -> Self {
        Self {
            log,
            buffer: Vec::new(),
            precision: DEFAULT_PRECISION,
        }
    }

    /// Sets the number of decimals kept for durations, at most
    /// [`MAX_PRECISION`].
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision.min(MAX_PRECISION);
        self
    }

    /// Returns the records not yet flushed.
    pub fn pending(&self) -> &[PerfRecord] {
        &self.buffer
    }

    /// Buffers `record` and flushes the buffer.
    pub fn log_step(&mut self, record: PerfRecord) -> Result<(), LogError> {
        self.buffer.push(record);
        self.flush()
    }

    /// Records how long an API call took.
    pub fn log_latency(&mut self, step: &str, elapsed: Duration) -> Result<(), LogError> {
        let mut record = PerfRecord::new(step);
        record.latency_seconds = Some(self.round(elapsed));
        self.log_step(record)
    }

    /// Records how long a query or processing step took.
    pub fn log_query_time(&mut self, step: &str, elapsed: Duration) -> Result<(), LogError> {
        let mut record = PerfRecord::new(step);
        record.execution_time_seconds = Some(self.round(elapsed));
        self.log_step(record)
    }

    /// Measures host usage over [`RESOURCE_WINDOW`] and records it.
    ///
    /// A probe failure skips the record rather than failing the caller.
    pub fn log_resource_usage(
        &mut self,
        step: &str,
        probe: &mut dyn UsageProbe,
    ) -> Result<(), LogError> {
        let usage = match measure_once(probe) {
            Ok(usage) => usage,
            Err(e) => {
                debug!("Skipping resource record '{}': {}", step, e);
                return Ok(());
            }
        };

        let mut record = PerfRecord::new(step);
        record.cpu_usage = Some(usage.cpu_percent);
        record.memory_usage = Some(usage.memory_percent);
        self.log_step(record)
    }

    /// Merges the buffer into the file and clears it.
    pub fn flush(&mut self) -> Result<(), LogError> {
        self.log.flush(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }

    fn round(&self, elapsed: Duration) -> f64 {
        let scale = 10f64.powi(self.precision as i32);
        (elapsed.as_secs_f64() * scale).round() / scale
    }
}

fn measure_once(probe: &mut dyn UsageProbe) -> Result<Usage, ProbeError> {
    probe.prime()?;
    probe.measure(RESOURCE_WINDOW)
}
