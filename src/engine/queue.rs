// src/engine/queue.rs

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::engine::TaskName;
use crate::types::RetriggerBehaviour;

/// Bookkeeping for watch triggers that arrive while runs are in flight.
///
/// Semantics:
/// - `Concurrent`: every trigger starts a run immediately; the queue only
///   counts in-flight runs per task.
/// - `Coalesce`: a trigger for a task with a run in flight is remembered in
///   a pending set. Any number of such triggers collapse into one pending
///   re-run, started when the in-flight run finishes.
#[derive(Debug)]
pub struct RetriggerQueue {
    behaviour: RetriggerBehaviour,
    in_flight: HashMap<TaskName, usize>,
    pending: BTreeSet<TaskName>,
}

impl RetriggerQueue {
    pub fn new(behaviour: RetriggerBehaviour) -> Self {
        Self {
            behaviour,
            in_flight: HashMap::new(),
            pending: BTreeSet::new(),
        }
    }

    pub fn behaviour(&self) -> RetriggerBehaviour {
        self.behaviour
    }

    /// Record a trigger. Returns true if a run should start now.
    pub fn on_trigger(&mut self, task: &str) -> bool {
        let running = self.in_flight_for(task);
        if self.behaviour == RetriggerBehaviour::Coalesce && running > 0 {
            let fresh = self.pending.insert(task.to_string());
            debug!(task, fresh, "run in flight; coalescing trigger");
            return false;
        }
        *self.in_flight.entry(task.to_string()).or_insert(0) += 1;
        true
    }

    /// Record that a run for `task` finished. Returns true if a coalesced
    /// re-run should start now.
    pub fn on_finished(&mut self, task: &str) -> bool {
        if let Some(count) = self.in_flight.get_mut(task) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.in_flight.remove(task);
            }
        }

        if self.pending.remove(task) {
            *self.in_flight.entry(task.to_string()).or_insert(0) += 1;
            debug!(task, "starting coalesced re-run");
            return true;
        }
        false
    }

    pub fn in_flight_for(&self, task: &str) -> usize {
        self.in_flight.get(task).copied().unwrap_or(0)
    }

    pub fn is_pending(&self, task: &str) -> bool {
        self.pending.contains(task)
    }

    /// No runs in flight and nothing pending.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty() && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_always_starts() {
        let mut q = RetriggerQueue::new(RetriggerBehaviour::Concurrent);
        assert!(q.on_trigger("styles"));
        assert!(q.on_trigger("styles"));
        assert_eq!(q.in_flight_for("styles"), 2);

        assert!(!q.on_finished("styles"));
        assert!(!q.on_finished("styles"));
        assert!(q.is_idle());
    }

    #[test]
    fn coalesce_keeps_one_pending_rerun() {
        let mut q = RetriggerQueue::new(RetriggerBehaviour::Coalesce);
        assert!(q.on_trigger("styles"));
        assert!(!q.on_trigger("styles"));
        assert!(!q.on_trigger("styles"));
        assert!(q.is_pending("styles"));

        // Other tasks are unaffected.
        assert!(q.on_trigger("html"));

        assert!(q.on_finished("styles"));
        assert_eq!(q.in_flight_for("styles"), 1);
        assert!(!q.on_finished("styles"));
        assert!(!q.on_finished("html"));
        assert!(q.is_idle());
    }
}
