//! Log Persistence Module
//!
//! JSON-array log files rewritten in full on every flush.
//!
//! - [`record_log`]: read-merge-dedup-overwrite file handle
//! - [`perf_log`]: buffered per-step performance records

pub mod perf_log;
pub mod record_log;

pub use perf_log::{PerfLog, PerfRecord};
pub use record_log::{merge_unique, RecordLog, DEFAULT_RESOURCE_LOG};
