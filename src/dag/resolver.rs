// src/dag/resolver.rs

//! Turn a requested task name into an executable [`Plan`].

use std::collections::HashMap;

use tracing::debug;

use crate::dag::plan::Plan;
use crate::dag::registry::{Task, TaskRegistry};
use crate::engine::TaskName;
use crate::errors::{Result, SitedagError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current DFS path; meeting it again means a cycle.
    Visiting,
    Done,
}

/// Depth-first traversal over prerequisites producing a deduplicated
/// post-order.
///
/// Fails before anything runs with:
/// - [`SitedagError::UnknownTask`] if `requested` is not defined,
/// - [`SitedagError::InvalidReference`] if a reachable prerequisite is not
///   defined,
/// - [`SitedagError::CycleDetected`] if a cycle is reachable; the path
///   starts and ends with the same task.
pub fn resolve(registry: &TaskRegistry, requested: &str) -> Result<Plan> {
    let root = registry.get(requested)?;

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut ordered: Vec<(TaskName, Vec<TaskName>)> = Vec::new();

    // Each frame is a task on the current path plus the index of the next
    // prerequisite to visit.
    let mut stack: Vec<(&Task, usize)> = vec![(root, 0)];
    marks.insert(root.name.as_str(), Mark::Visiting);

    while let Some(frame) = stack.last_mut() {
        // Copy the registry reference out so the stack is free to change.
        let task: &Task = frame.0;
        let idx = frame.1;
        frame.1 += 1;

        if let Some(prereq) = task.prerequisites.get(idx) {
            match marks.get(prereq.as_str()) {
                Some(Mark::Done) => continue,
                Some(Mark::Visiting) => {
                    return Err(SitedagError::CycleDetected {
                        path: cycle_path(&stack, prereq),
                    });
                }
                None => {}
            }

            let child = registry.get(prereq).map_err(|_| SitedagError::InvalidReference {
                task: task.name.clone(),
                prerequisite: prereq.clone(),
            })?;
            marks.insert(child.name.as_str(), Mark::Visiting);
            stack.push((child, 0));
        } else {
            marks.insert(task.name.as_str(), Mark::Done);
            ordered.push((task.name.clone(), task.prerequisites.clone()));
            stack.pop();
        }
    }

    let plan = Plan::from_post_order(requested.to_string(), ordered);
    debug!(
        requested,
        tasks = plan.len(),
        waves = plan.wave_count(),
        "resolved plan"
    );
    Ok(plan)
}

/// The slice of the DFS path from `back_to` to the top, closed with
/// `back_to` again.
fn cycle_path(stack: &[(&Task, usize)], back_to: &str) -> Vec<TaskName> {
    let start = stack
        .iter()
        .position(|(t, _)| t.name == back_to)
        .unwrap_or(0);
    let mut path: Vec<TaskName> = stack[start..].iter().map(|(t, _)| t.name.clone()).collect();
    path.push(back_to.to_string());
    path
}
