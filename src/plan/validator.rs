//! Run Plan Validation
//!
//! Checks plan-level settings and every unit definition before anything
//! is executed. The first problem found is reported.

use std::collections::HashSet;

use log::{debug, warn};

use crate::error::PlanError;
use crate::persistence::perf_log::MAX_PRECISION;

use super::model::{RunPlan, UnitSpec};

/// Validates a whole plan.
pub fn validate_plan(plan: &RunPlan) -> Result<(), PlanError> {
    if plan.units.is_empty() {
        return Err(PlanError::NoUnits);
    }

    if plan.iterations == 0 {
        return Err(PlanError::ZeroIterations);
    }

    if plan.sampler.window.is_zero() {
        return Err(PlanError::ZeroWindow);
    }

    let mut seen = HashSet::new();
    for unit in &plan.units {
        validate_unit(unit)?;

        if !seen.insert(unit.name.as_str()) {
            return Err(PlanError::DuplicateUnit(unit.name.clone()));
        }
    }

    debug!("Plan validated: {} units", plan.units.len());
    Ok(())
}

/// Validates a single unit's fields.
fn validate_unit(unit: &UnitSpec) -> Result<(), PlanError> {
    if unit.name.trim().is_empty() {
        return Err(PlanError::EmptyUnitName);
    }

    match (&unit.command, &unit.capacity) {
        (Some(command), None) => {
            if command.trim().is_empty() {
                return Err(PlanError::EmptyCommand(unit.name.clone()));
            }
        }
        (None, Some(capacity)) => {
            if let Some(Err(month)) = capacity.parsed_month() {
                return Err(PlanError::InvalidMonth {
                    unit: unit.name.clone(),
                    month,
                });
            }
            if capacity.precision > MAX_PRECISION {
                warn!(
                    "Unit '{}': precision {} clamped to {}",
                    unit.name, capacity.precision, MAX_PRECISION
                );
            }
            if capacity.roles.is_empty() {
                warn!("Unit '{}' has no roles; capacity will be zero", unit.name);
            }
        }
        _ => return Err(PlanError::AmbiguousUnit(unit.name.clone())),
    }

    if unit.working_dir.is_some() && unit.capacity.is_some() {
        warn!("Unit '{}': working_dir only applies to command units", unit.name);
    }

    Ok(())
}
