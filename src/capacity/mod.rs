//! Capacity Aggregation Module
//!
//! Derives the monthly FTE picture from the two upstream services:
//!
//! - [`forecast`]: committed FTE and headcount from the planning export
//! - [`deals`]: pipeline FTE from paginated CRM deals
//!
//! Fetching is abstracted behind [`PayloadSource`] and
//! [`deals::DealSource`]; the crate ships file-backed sources.

pub mod deals;
pub mod forecast;

use std::fs;
use std::path::PathBuf;

use chrono::{Datelike, Local, Months, NaiveDate};
use log::{info, warn};

use crate::error::CapacityError;

pub use deals::{aggregate_deals, collect_deals, DealSource, FileDealSource};
pub use forecast::{aggregate_export, ForecastTotals, DEFAULT_ROLES, HOURS_PER_FTE};

/// A source of a raw text payload.
pub trait PayloadSource {
    fn fetch(&mut self) -> Result<String, CapacityError>;
}

/// Reads the payload from a file on every fetch.
pub struct FilePayload {
    path: PathBuf,
}

impl FilePayload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PayloadSource for FilePayload {
    fn fetch(&mut self) -> Result<String, CapacityError> {
        fs::read_to_string(&self.path).map_err(|source| CapacityError::Read {
            path: self.path.clone(),
            source,
        })
    }
}

/// Returns the first day of the month after `today`.
pub fn target_month(today: NaiveDate) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    first.checked_add_months(Months::new(1)).unwrap_or(first)
}

/// Target month relative to the local date.
pub fn next_month() -> NaiveDate {
    target_month(Local::now().date_naive())
}

/// The combined capacity picture for one month.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityReport {
    pub month: NaiveDate,
    /// FTE already scheduled in the planning service
    pub committed_ftes: f64,
    /// FTE from CRM deals starting this month
    pub pipeline_ftes: f64,
    /// Distinct people available
    pub capacity: usize,
}

impl CapacityReport {
    pub fn new(month: NaiveDate, forecast: ForecastTotals, pipeline_ftes: f64) -> Self {
        Self {
            month,
            committed_ftes: forecast.ftes,
            pipeline_ftes,
            capacity: forecast.capacity,
        }
    }

    /// Capacity left after committed and pipeline FTE. Negative when over.
    pub fn remaining(&self) -> f64 {
        self.capacity as f64 - (self.pipeline_ftes + self.committed_ftes)
    }

    pub fn is_over_capacity(&self) -> bool {
        self.remaining() < 0.0
    }

    /// Logs the figures and the capacity verdict.
    pub fn log(&self) {
        info!("Month: {}", self.month.format("%Y-%m"));
        info!("Pipeline FTEs: {:.4}", self.pipeline_ftes);
        info!("Capacity: {}", self.capacity);
        info!("Committed FTEs: {:.4}", self.committed_ftes);

        if self.is_over_capacity() {
            warn!("Over capacity! Remaining capacity: {:.4}", self.remaining());
        } else {
            info!("Enough capacity. Remaining capacity: {:.4}", self.remaining());
        }
    }
}
