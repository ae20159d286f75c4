// src/dag/registry.rs

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::model::ConfigFile;
use crate::engine::TaskName;
use crate::errors::{Result, SitedagError};
use crate::exec::action::SharedAction;
use crate::exec::factory::ActionFactory;

/// A named unit of work with declared prerequisites.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: TaskName,
    /// Prerequisites in declared order. Order does not affect correctness
    /// but keeps plans and diagnostics deterministic.
    pub prerequisites: Vec<TaskName>,
    pub action: SharedAction,
}

/// Warning produced when a name is registered twice; the later definition
/// replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateDefinition {
    pub name: TaskName,
    pub previous_prerequisites: Vec<TaskName>,
}

/// Mapping from task name to definition.
///
/// The registry is built up front and then handed to the engine by value,
/// which shares it read-only between runs; after that point it can no longer
/// change.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskName, Task>,
    /// Registration order, for stable listings.
    order: Vec<TaskName>,
    warnings: Vec<DuplicateDefinition>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a task.
    ///
    /// Prerequisite names are not checked here; an undefined one surfaces as
    /// [`SitedagError::InvalidReference`] when a plan that reaches it is
    /// resolved. Replacing an existing name is allowed (last registration
    /// wins) and returns the recorded warning.
    pub fn define<N, P, I>(
        &mut self,
        name: N,
        prerequisites: I,
        action: SharedAction,
    ) -> Option<DuplicateDefinition>
    where
        N: Into<TaskName>,
        I: IntoIterator<Item = P>,
        P: Into<TaskName>,
    {
        let name = name.into();
        let task = Task {
            name: name.clone(),
            prerequisites: prerequisites.into_iter().map(Into::into).collect(),
            action,
        };

        match self.tasks.insert(name.clone(), task) {
            Some(previous) => {
                warn!(
                    task = %name,
                    "task defined more than once; the later definition replaces the earlier one"
                );
                let dup = DuplicateDefinition {
                    name,
                    previous_prerequisites: previous.prerequisites,
                };
                self.warnings.push(dup.clone());
                Some(dup)
            }
            None => {
                debug!(task = %name, "task defined");
                self.order.push(name);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&Task> {
        self.tasks
            .get(name)
            .ok_or_else(|| SitedagError::UnknownTask(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in first-registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Duplicate-definition warnings recorded so far.
    pub fn warnings(&self) -> &[DuplicateDefinition] {
        &self.warnings
    }

    /// Build a registry from a validated manifest.
    pub fn from_config(cfg: &ConfigFile, factory: &ActionFactory) -> Result<Self> {
        let mut registry = Self::new();
        for (name, task) in cfg.tasks() {
            let action = factory.build(name, task.action())?;
            registry.define(name.clone(), task.after.iter().cloned(), action);
        }
        Ok(registry)
    }
}
