//! Sampled Unit Orchestrator
//!
//! Runs every unit of a plan in order, once per iteration, on the calling
//! thread. Each invocation is wrapped by:
//! - a background [`Sampler`] started before the unit and joined after it
//! - a [`RunSummary`] carrying the measured duration
//! - a flush of all records to the shared resource log
//!
//! A failing unit is reported and skipped; it never stops the batch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;

use colored::Colorize;
use log::{debug, error, info};

use crate::error::UnitError;
use crate::monitoring::{RunSummary, Sample, Sampler, SamplerConfig, UsageRecord};
use crate::persistence::RecordLog;
use crate::plan::{RunPlan, DEFAULT_ITERATIONS};

use super::unit::UnitFactory;

/// Records produced by one unit invocation.
#[derive(Debug, Clone)]
pub struct UnitRun {
    pub samples: Vec<Sample>,
    pub summary: RunSummary,
}

impl UnitRun {
    /// Samples followed by the summary, in log order.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.samples
            .iter()
            .cloned()
            .map(UsageRecord::from)
            .chain(std::iter::once(UsageRecord::from(self.summary.clone())))
            .collect()
    }
}

/// Outcome counts for a whole batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub completed: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn invocations(&self) -> usize {
        self.completed + self.failed
    }
}

/// Sequential driver for a fixed list of units.
///
/// # Example
///
/// ```rust,no_run
/// use fterunner::execution::Orchestrator;
/// use fterunner::plan::load_plan;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let plan = load_plan("plan.yaml")?;
///     let report = Orchestrator::from_plan(&plan).run();
///     println!("{} failed", report.failed);
///     Ok(())
/// }
/// ```
pub struct Orchestrator {
    units: Vec<Box<dyn UnitFactory>>,
    iterations: usize,
    log: RecordLog,
    sampler: SamplerConfig,
}

impl Orchestrator {
    /// Creates an orchestrator with default settings.
    pub fn new(units: Vec<Box<dyn UnitFactory>>) -> Self {
        Self {
            units,
            iterations: DEFAULT_ITERATIONS,
            log: RecordLog::new(crate::persistence::DEFAULT_RESOURCE_LOG),
            sampler: SamplerConfig::default(),
        }
    }

    /// Creates an orchestrator for every unit of `plan`.
    pub fn from_plan(plan: &RunPlan) -> Self {
        let units = plan
            .units
            .iter()
            .cloned()
            .map(|unit| Box::new(unit) as Box<dyn UnitFactory>)
            .collect();

        let mut orchestrator = Self::new(units);
        orchestrator.set_iterations(plan.iterations);
        orchestrator.set_output(plan.output.clone());
        orchestrator.set_sampler_config(plan.sampler);
        orchestrator
    }

    /// Sets the number of passes over the unit list.
    pub fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations;
    }

    /// Sets the shared resource log file.
    pub fn set_output(&mut self, path: impl Into<PathBuf>) {
        self.log = RecordLog::new(path);
    }

    pub fn set_sampler_config(&mut self, config: SamplerConfig) {
        self.sampler = config;
    }

    /// Runs all iterations and returns the outcome counts.
    pub fn run(&self) -> BatchReport {
        let mut report = BatchReport::default();

        info!("Starting {} iterations over {} units", self.iterations, self.units.len());

        for i in 0..self.iterations {
            println!("--- Iteration {} ---", i + 1);
            self.run_pass(&mut report);
        }

        info!("Batch finished: {} completed, {} failed", report.completed, report.failed);
        report
    }

    /// Runs every unit once, in order.
    pub fn run_pass(&self, report: &mut BatchReport) {
        for unit in &self.units {
            let label = unit.label();

            match self.run_and_flush(&**unit) {
                Ok(run) => {
                    let secs = run.summary.total_duration_seconds;
                    println!("{} ran successfully.", label.green());
                    println!("Execution time: {:.4}s\n", secs);
                    report.completed += 1;
                }
                Err(e) => {
                    error!("Unit '{}' failed: {}", unit.name(), e);
                    println!("{} {}: {}\n", "An error occurred while running".red(), label, e);
                    report.failed += 1;
                }
            }
            // Per-unit buffers are dropped here, before the next unit starts.
        }
    }

    /// Runs one unit under the sampler and returns its records.
    ///
    /// The sampler has fully stopped before this returns, whether the unit
    /// succeeded, failed or panicked.
    pub fn run_unit(&self, factory: &dyn UnitFactory) -> Result<UnitRun, UnitError> {
        let mut unit = factory.build()?;
        let label = factory.label();

        let sampler = Sampler::start(label, self.sampler);

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| unit.run()))
            .unwrap_or_else(|payload| Err(UnitError::Panicked(panic_message(payload))));
        let elapsed = start.elapsed();

        let samples = sampler.stop();
        outcome?;

        debug!("Unit '{}' produced {} samples", factory.name(), samples.len());

        Ok(UnitRun {
            samples,
            summary: RunSummary::now(label, elapsed.as_secs_f64()),
        })
    }

    fn run_and_flush(&self, factory: &dyn UnitFactory) -> Result<UnitRun, UnitError> {
        let run = self.run_unit(factory)?;
        self.log.flush(&run.records())?;
        Ok(run)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
