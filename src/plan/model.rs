//! Run Plan Data Model
//!
//! # Example YAML Format
//!
//! ```yaml
//! iterations: 100
//! output: resource_usage.json
//! spawn_delay_ms: 1000
//! sampler:
//!   settle_ms: 100
//!   window_ms: 500
//! units:
//!   - name: json_queries
//!     label: json_queries.py
//!     command: ./bin/json_queries
//!
//!   - name: capacity
//!     capacity:
//!       forecast: payloads/forecast.csv
//!       deals: payloads/deals.json
//!       month: 2025-01
//!       perf_log: capacity-performance.json
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::capacity::DEFAULT_ROLES;
use crate::monitoring::SamplerConfig;
use crate::persistence::perf_log::DEFAULT_PRECISION;
use crate::persistence::DEFAULT_RESOURCE_LOG;

/// Default number of passes over the unit list.
pub const DEFAULT_ITERATIONS: usize = 100;

/// Default pause before each child process in spawn mode.
pub const DEFAULT_SPAWN_DELAY_MS: u64 = 1000;

/// Top-level run configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunPlan {
    /// Passes over the unit list; each unit runs once per pass
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Shared resource log file
    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default = "default_spawn_delay_ms")]
    pub spawn_delay_ms: u64,

    #[serde(default)]
    pub sampler: SamplerConfig,

    /// Units in execution order
    #[serde(default)]
    pub units: Vec<UnitSpec>,
}

impl RunPlan {
    /// Creates a plan with default settings.
    pub fn new(units: Vec<UnitSpec>) -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            output: default_output(),
            spawn_delay_ms: DEFAULT_SPAWN_DELAY_MS,
            sampler: SamplerConfig::default(),
            units,
        }
    }

    pub fn spawn_delay(&self) -> Duration {
        Duration::from_millis(self.spawn_delay_ms)
    }

    /// Looks up a unit by name.
    pub fn unit(&self, name: &str) -> Option<&UnitSpec> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// One work unit. Exactly one of `command` or `capacity` is set.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UnitSpec {
    /// Unique identifier
    pub name: String,

    /// Label written to resource records (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Shell command run with `bash -c`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// In-process capacity aggregation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<CapacitySpec>,
}

impl UnitSpec {
    /// Creates a shell command unit.
    pub fn command(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            command: Some(command.to_string()),
            working_dir: None,
            capacity: None,
        }
    }

    /// Creates a capacity aggregation unit.
    pub fn capacity(name: &str, spec: CapacitySpec) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            command: None,
            working_dir: None,
            capacity: Some(spec),
        }
    }

    /// Sets the record label.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Inputs for a capacity aggregation unit.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CapacitySpec {
    /// Planning-service export (CSV)
    pub forecast: PathBuf,

    /// CRM deal pages (JSON)
    pub deals: PathBuf,

    /// Target month as `YYYY-MM`; defaults to next month
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,

    #[serde(default = "default_roles")]
    pub roles: Vec<String>,

    /// Performance log written by this unit
    #[serde(default = "default_perf_log")]
    pub perf_log: PathBuf,

    /// Record host usage before and after each query
    #[serde(default)]
    pub resource_usage: bool,

    /// Decimals kept for logged durations
    #[serde(default = "default_precision")]
    pub precision: u32,
}

impl CapacitySpec {
    pub fn new(forecast: impl Into<PathBuf>, deals: impl Into<PathBuf>) -> Self {
        Self {
            forecast: forecast.into(),
            deals: deals.into(),
            month: None,
            roles: default_roles(),
            perf_log: default_perf_log(),
            resource_usage: false,
            precision: DEFAULT_PRECISION,
        }
    }

    /// Parses the configured month, if any.
    pub fn parsed_month(&self) -> Option<Result<NaiveDate, String>> {
        self.month.as_ref().map(|m| parse_month(m).ok_or_else(|| m.clone()))
    }
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d").ok()
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_RESOURCE_LOG)
}

fn default_spawn_delay_ms() -> u64 {
    DEFAULT_SPAWN_DELAY_MS
}

fn default_roles() -> Vec<String> {
    DEFAULT_ROLES.iter().map(|r| r.to_string()).collect()
}

fn default_perf_log() -> PathBuf {
    PathBuf::from("capacity-performance.json")
}

fn default_precision() -> u32 {
    DEFAULT_PRECISION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults() {
        let plan: RunPlan = serde_yaml::from_str("units: []").unwrap();

        assert_eq!(plan.iterations, 100);
        assert_eq!(plan.output, PathBuf::from("resource_usage.json"));
        assert_eq!(plan.spawn_delay(), Duration::from_secs(1));
        assert_eq!(plan.sampler, SamplerConfig::default());
    }

    #[test]
    fn test_unit_label_defaults_to_name() {
        let unit = UnitSpec::command("json_queries", "true");
        assert_eq!(unit.label(), "json_queries");

        let unit = unit.with_label("json_queries.py");
        assert_eq!(unit.label(), "json_queries.py");
    }

    #[test]
    fn test_capacity_defaults() {
        let yaml = "forecast: f.csv\ndeals: d.json\n";
        let spec: CapacitySpec = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(spec.roles, vec!["DK", "US inc."]);
        assert_eq!(spec.perf_log, PathBuf::from("capacity-performance.json"));
        assert_eq!(spec.precision, 4);
        assert!(!spec.resource_usage);
        assert!(spec.parsed_month().is_none());
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2025-01"), NaiveDate::from_ymd_opt(2025, 1, 1));
        assert!(parse_month("2025-13").is_none());
        assert!(parse_month("January").is_none());
    }

    #[test]
    fn test_plan_unit_lookup() {
        let plan = RunPlan::new(vec![
            UnitSpec::command("a", "true"),
            UnitSpec::command("b", "false"),
        ]);

        assert_eq!(plan.unit("b").and_then(|u| u.command.as_deref()), Some("false"));
        assert!(plan.unit("c").is_none());
    }
}
