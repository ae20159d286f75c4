// src/dag/plan.rs

use std::collections::HashMap;

use crate::engine::TaskName;

/// One entry in a plan: a task plus the prerequisites it waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub name: TaskName,
    pub prerequisites: Vec<TaskName>,
    /// Wave index: 0 for tasks without prerequisites, otherwise one more
    /// than the highest wave among its prerequisites.
    pub wave: usize,
}

/// Deduplicated, dependency-ordered set of tasks required by one request.
///
/// `tasks` is a post-order: every task appears exactly once and after all
/// of its prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    requested: TaskName,
    tasks: Vec<PlannedTask>,
}

impl Plan {
    /// Build a plan from a post-order of `(name, prerequisites)` pairs,
    /// assigning waves as it goes. Callers guarantee the ordering.
    pub(crate) fn from_post_order(
        requested: TaskName,
        ordered: Vec<(TaskName, Vec<TaskName>)>,
    ) -> Self {
        let mut wave_of: HashMap<TaskName, usize> = HashMap::with_capacity(ordered.len());
        let mut tasks = Vec::with_capacity(ordered.len());

        for (name, prerequisites) in ordered {
            let wave = prerequisites
                .iter()
                .filter_map(|p| wave_of.get(p))
                .map(|w| w + 1)
                .max()
                .unwrap_or(0);
            wave_of.insert(name.clone(), wave);
            tasks.push(PlannedTask {
                name,
                prerequisites,
                wave,
            });
        }

        Self { requested, tasks }
    }

    pub fn requested(&self) -> &str {
        &self.requested
    }

    pub fn tasks(&self) -> &[PlannedTask] {
        &self.tasks
    }

    /// Task names in execution (post-)order.
    pub fn order(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name)
    }

    pub fn wave_count(&self) -> usize {
        self.tasks.iter().map(|t| t.wave + 1).max().unwrap_or(0)
    }

    /// Partition into waves. Tasks inside a wave keep plan order, so the
    /// result is identical for identical graphs.
    pub fn waves(&self) -> Vec<Vec<&str>> {
        let mut waves: Vec<Vec<&str>> = vec![Vec::new(); self.wave_count()];
        for task in &self.tasks {
            waves[task.wave].push(task.name.as_str());
        }
        waves
    }
}
