//! FteRunner - Sampled Batch Runner for Capacity Jobs
//!
//! Runs a fixed list of work units over many iterations, sampling the
//! process CPU and memory while each unit executes and appending the
//! samples plus a duration summary to a shared JSON log.
//!
//! # Architecture
//!
//! - [`plan`]: YAML run plans
//! - [`execution`]: work units, the sampled orchestrator and the spawner
//! - [`monitoring`]: resource probes and the background sampler
//! - [`persistence`]: de-duplicating JSON log files
//! - [`capacity`]: monthly FTE aggregation
//!
//! # Example
//!
//! ```rust,no_run
//! use fterunner::execution::Orchestrator;
//! use fterunner::load_plan;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plan = load_plan("plan.yaml")?;
//!
//!     let mut orchestrator = Orchestrator::from_plan(&plan);
//!     orchestrator.set_iterations(10);
//!
//!     let report = orchestrator.run();
//!     println!("{} completed, {} failed", report.completed, report.failed);
//!     Ok(())
//! }
//! ```

pub mod capacity;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod persistence;
pub mod plan;

// Re-export commonly used types
pub use execution::{BatchReport, Orchestrator, Spawner};
pub use monitoring::{Sampler, UsageRecord};
pub use persistence::RecordLog;
pub use plan::{load_plan, RunPlan, UnitSpec};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FteRunner";
