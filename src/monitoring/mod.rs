//! Resource Monitoring Module
//!
//! Provides utilities for sampling process resource usage while a
//! unit of work executes.
//!
//! # Components
//!
//! - [`Sampler`]: background CPU and memory sampling thread
//! - [`UsageProbe`]: the measurement seam (`ProcessProbe`, `SystemProbe`)
//! - [`UsageRecord`]: the record shapes written to the resource log

pub mod probe;
pub mod record;
pub mod sampler;

pub use probe::{ProcessProbe, SystemProbe, UsageProbe};
pub use record::{RunSummary, Sample, Usage, UsageRecord};
pub use sampler::{Sampler, SamplerConfig};
