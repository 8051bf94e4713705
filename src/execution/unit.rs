//! Work Units
//!
//! A work unit is one synchronous fetch-aggregate-log job. Units are
//! rebuilt from their configuration on every invocation, so edits to the
//! plan's inputs are picked up between iterations without restarting.
//!
//! - [`CommandUnit`]: runs a shell command with bash
//! - [`CapacityUnit`]: aggregates capacity payloads in-process

use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use chrono::NaiveDate;
use log::{debug, error};

use crate::capacity::{
    aggregate_deals, aggregate_export, collect_deals, next_month, CapacityReport, DealSource,
    FileDealSource, FilePayload, ForecastTotals, PayloadSource,
};
use crate::error::UnitError;
use crate::monitoring::SystemProbe;
use crate::persistence::{PerfLog, RecordLog};
use crate::plan::{CapacitySpec, UnitSpec};

/// A zero-argument synchronous job.
pub trait WorkUnit {
    fn run(&mut self) -> Result<(), UnitError>;
}

/// Builds a fresh [`WorkUnit`] for each invocation.
pub trait UnitFactory {
    /// Unique unit name
    fn name(&self) -> &str;

    /// Label written to resource records
    fn label(&self) -> &str;

    fn build(&self) -> Result<Box<dyn WorkUnit>, UnitError>;
}

impl UnitFactory for UnitSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        UnitSpec::label(self)
    }

    fn build(&self) -> Result<Box<dyn WorkUnit>, UnitError> {
        match (&self.command, &self.capacity) {
            (Some(command), _) => Ok(Box::new(CommandUnit::new(
                command.clone(),
                self.working_dir.clone(),
            ))),
            (None, Some(spec)) => Ok(Box::new(CapacityUnit::from_spec(spec))),
            (None, None) => Err(UnitError::Misconfigured(self.name.clone())),
        }
    }
}

/// Runs a command through `bash -c` and waits for it.
pub struct CommandUnit {
    command: String,
    working_dir: Option<PathBuf>,
}

impl CommandUnit {
    pub fn new(command: impl Into<String>, working_dir: Option<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir,
        }
    }
}

impl WorkUnit for CommandUnit {
    fn run(&mut self) -> Result<(), UnitError> {
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(&self.command);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
            debug!("Executing in directory: {}", dir.display());
        }

        let output = cmd.output().map_err(|source| UnitError::Launch {
            command: self.command.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("Command output:\n{}", stdout);
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!("Command '{}' failed with exit code: {:?}", self.command, output.status.code());

        Err(UnitError::Exit {
            code: output.status.code(),
            stderr,
        })
    }
}

/// Fetches both payloads, aggregates them and logs the capacity verdict.
///
/// Every step is timed into the unit's own performance log.
pub struct CapacityUnit {
    month: NaiveDate,
    roles: Vec<String>,
    forecast: Box<dyn PayloadSource>,
    deals: Box<dyn DealSource>,
    perf: PerfLog,
    probe: Option<SystemProbe>,
    report: Option<CapacityReport>,
}

impl CapacityUnit {
    /// Builds a unit reading its payloads from the files in `spec`.
    ///
    /// The month is validated with the plan; an unset or unparseable one
    /// falls back to next month.
    pub fn from_spec(spec: &CapacitySpec) -> Self {
        let month = spec
            .parsed_month()
            .and_then(Result::ok)
            .unwrap_or_else(next_month);

        let perf = PerfLog::new(RecordLog::new(&spec.perf_log)).with_precision(spec.precision);

        let mut unit = Self::new(
            month,
            spec.roles.clone(),
            Box::new(FilePayload::new(&spec.forecast)),
            Box::new(FileDealSource::new(&spec.deals)),
            perf,
        );
        if spec.resource_usage {
            unit.probe = Some(SystemProbe::new());
        }
        unit
    }

    pub fn new(
        month: NaiveDate,
        roles: Vec<String>,
        forecast: Box<dyn PayloadSource>,
        deals: Box<dyn DealSource>,
        perf: PerfLog,
    ) -> Self {
        Self {
            month,
            roles,
            forecast,
            deals,
            perf,
            probe: None,
            report: None,
        }
    }

    /// Returns the report from the last successful run.
    pub fn report(&self) -> Option<&CapacityReport> {
        self.report.as_ref()
    }

    fn forecast_totals(&mut self) -> Result<ForecastTotals, UnitError> {
        self.log_resources("Before Forecast Query")?;

        let api_start = Instant::now();
        let export = self.forecast.fetch()?;
        self.perf.log_latency("Forecast API", api_start.elapsed())?;

        let query_start = Instant::now();
        let totals = aggregate_export(&export, self.month, &self.roles)?;
        self.perf
            .log_query_time("Forecast Query", query_start.elapsed())?;

        self.log_resources("After Forecast Query")?;
        Ok(totals)
    }

    fn pipeline_ftes(&mut self) -> Result<f64, UnitError> {
        self.log_resources("Before HubSpot Query")?;

        let api_start = Instant::now();
        let deals = collect_deals(&mut *self.deals)?;
        self.perf.log_latency("HubSpot API", api_start.elapsed())?;

        let query_start = Instant::now();
        let ftes = aggregate_deals(&deals, self.month);
        self.perf
            .log_query_time("HubSpot Query", query_start.elapsed())?;

        self.log_resources("After HubSpot Query")?;
        Ok(ftes)
    }

    fn log_resources(&mut self, step: &str) -> Result<(), UnitError> {
        if let Some(probe) = self.probe.as_mut() {
            self.perf.log_resource_usage(step, probe)?;
        }
        Ok(())
    }
}

impl WorkUnit for CapacityUnit {
    fn run(&mut self) -> Result<(), UnitError> {
        let forecast_start = Instant::now();
        let forecast = self.forecast_totals()?;
        self.perf
            .log_query_time("Forecast Entire Query Process", forecast_start.elapsed())?;

        let deals_start = Instant::now();
        let pipeline = self.pipeline_ftes()?;
        self.perf
            .log_query_time("HubSpot Entire Query Process", deals_start.elapsed())?;

        let report = CapacityReport::new(self.month, forecast, pipeline);
        report.log();
        self.report = Some(report);

        Ok(())
    }
}
