// src/dag/mod.rs

//! Task graph: definitions, resolution and per-run state.
//!
//! - [`registry`] holds task definitions keyed by name.
//! - [`resolver`] turns a requested name into a deduplicated [`Plan`].
//! - [`plan`] partitions a plan into dependency waves.
//! - [`run_state`] tracks task status while one plan executes.

pub mod plan;
pub mod registry;
pub mod resolver;
pub mod run_state;

pub use plan::{Plan, PlannedTask};
pub use registry::{DuplicateDefinition, Task, TaskRegistry};
pub use resolver::resolve;
pub use run_state::{RunState, TaskRecord, TaskStatus};
