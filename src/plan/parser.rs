//! Run Plan Parser
//!
//! Loads run plans from YAML files and validates them.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::PlanError;

use super::model::RunPlan;
use super::validator::validate_plan;

/// Loads and validates a run plan from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use fterunner::plan::load_plan;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let plan = load_plan("plan.yaml")?;
///     println!("Loaded {} units", plan.units.len());
///     Ok(())
/// }
/// ```
pub fn load_plan(path: impl AsRef<Path>) -> Result<RunPlan, PlanError> {
    let path = path.as_ref();
    info!("Loading plan from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|source| PlanError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());
    parse_plan(&yaml_content)
}

/// Parses and validates a run plan from YAML text.
pub fn parse_plan(yaml_content: &str) -> Result<RunPlan, PlanError> {
    let plan: RunPlan = serde_yaml::from_str(yaml_content)?;

    info!("Parsed {} units, {} iterations", plan.units.len(), plan.iterations);

    validate_plan(&plan)?;
    Ok(plan)
}
