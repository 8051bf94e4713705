//! Error Types
//!
//! One enum per concern. Library functions return these and propagate
//! with `?`; the binary boxes them at the top level.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a run plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse plan YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("plan has no units")]
    NoUnits,

    #[error("unit has empty or whitespace-only name")]
    EmptyUnitName,

    #[error("duplicate unit name: '{0}'")]
    DuplicateUnit(String),

    #[error("unit '{0}' must define exactly one of `command` or `capacity`")]
    AmbiguousUnit(String),

    #[error("unit '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("iterations must be at least 1")]
    ZeroIterations,

    #[error("sampler window must be greater than zero")]
    ZeroWindow,

    #[error("unit '{unit}' has invalid month '{month}' (expected YYYY-MM)")]
    InvalidMonth { unit: String, month: String },

    #[error("unknown unit: '{0}'")]
    UnknownUnit(String),
}

/// Errors raised by a resource probe. Fatal to the sampling loop only.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot resolve current process id: {0}")]
    Pid(String),

    #[error("process {0} is no longer visible")]
    ProcessGone(u32),
}

/// Errors raised while reading or rewriting a persisted log file.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to write log file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize log records: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while fetching or aggregating capacity payloads.
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("failed to read payload '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("forecast export is empty")]
    EmptyExport,

    #[error("forecast export has no '{0}' column")]
    MissingColumn(String),

    #[error("malformed deals payload: {0}")]
    Deals(#[from] serde_json::Error),

    #[error("deal source returned no pages")]
    NoPages,
}

/// Errors raised by a single work unit invocation.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("unit '{0}' defines neither a command nor a capacity job")]
    Misconfigured(String),

    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("command exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("unit panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error(transparent)]
    Log(#[from] LogError),
}
