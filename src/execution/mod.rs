//! Unit Execution Module
//!
//! Drives work units through repeated batch runs.
//!
//! # Architecture
//!
//! - [`unit`]: the work unit seam and its command and capacity kinds
//! - [`orchestrator`]: sampled, in-process batch runs
//! - [`spawner`]: unsampled runs with one child process per unit

pub mod orchestrator;
pub mod spawner;
pub mod unit;

pub use orchestrator::{BatchReport, Orchestrator, UnitRun};
pub use spawner::{run_unsampled, ChildSpec, Spawner};
pub use unit::{CapacityUnit, CommandUnit, UnitFactory, WorkUnit};
