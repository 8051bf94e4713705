//! Run Plan Module
//!
//! The YAML configuration describing which units run, how often, and
//! where their records go.
//!
//! - [`model`]: plan and unit data structures
//! - [`parser`]: YAML loading
//! - [`validator`]: structural checks

pub mod model;
pub mod parser;
pub mod validator;

pub use model::{
    parse_month, CapacitySpec, RunPlan, UnitSpec, DEFAULT_ITERATIONS, DEFAULT_SPAWN_DELAY_MS,
};
pub use parser::{load_plan, parse_plan};
pub use validator::validate_plan;
