// src/dag/run_state.rs

//! Per-run task status tracking.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::dag::plan::Plan;
use crate::engine::TaskName;

/// Status of a task inside one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// In the plan, waiting for its wave.
    Pending,
    /// Action started and not yet resolved.
    Running,
    Succeeded,
    Failed,
    /// Never started because an earlier wave failed.
    NotStarted,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::NotStarted
        )
    }
}

/// Status plus timing for one task of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRecord {
    pub status: TaskStatus,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl TaskRecord {
    fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Mutable state of one run over a fixed plan.
///
/// Transitions are `Pending → Running → Succeeded | Failed`, plus
/// `Pending → NotStarted` when the run is abandoned.
#[derive(Debug, Clone)]
pub struct RunState {
    run_id: u64,
    records: HashMap<TaskName, TaskRecord>,
}

impl RunState {
    pub fn new(run_id: u64, plan: &Plan) -> Self {
        let records = plan
            .tasks()
            .iter()
            .map(|t| (t.name.clone(), TaskRecord::pending()))
            .collect();
        Self { run_id, records }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn status_of(&self, task: &str) -> Option<TaskStatus> {
        self.records.get(task).map(|r| r.status)
    }

    pub fn record_of(&self, task: &str) -> Option<&TaskRecord> {
        self.records.get(task)
    }

    pub fn mark_running(&mut self, task: &str) {
        self.transition(task, TaskStatus::Pending, TaskStatus::Running);
    }

    pub fn mark_succeeded(&mut self, task: &str) {
        self.transition(task, TaskStatus::Running, TaskStatus::Succeeded);
    }

    pub fn mark_failed(&mut self, task: &str) {
        self.transition(task, TaskStatus::Running, TaskStatus::Failed);
    }

    /// Move every still-pending task to `NotStarted`. Returns their names.
    pub fn abandon_pending(&mut self) -> Vec<TaskName> {
        let mut skipped: Vec<TaskName> = self
            .records
            .iter_mut()
            .filter(|(_, r)| r.status == TaskStatus::Pending)
            .map(|(name, r)| {
                r.status = TaskStatus::NotStarted;
                name.clone()
            })
            .collect();
        skipped.sort();
        skipped
    }

    pub fn all_terminal(&self) -> bool {
        self.records.values().all(|r| r.status.is_terminal())
    }

    pub fn into_records(self) -> HashMap<TaskName, TaskRecord> {
        self.records
    }

    fn transition(&mut self, task: &str, from: TaskStatus, to: TaskStatus) {
        let Some(record) = self.records.get_mut(task) else {
            debug!(task, run_id = self.run_id, "status change for task outside plan; ignoring");
            return;
        };
        if record.status != from {
            debug!(
                task,
                run_id = self.run_id,
                current = ?record.status,
                wanted = ?to,
                "ignoring out-of-order status change"
            );
            return;
        }

        let now = Instant::now();
        match to {
            TaskStatus::Running => record.started_at = Some(now),
            TaskStatus::Succeeded | TaskStatus::Failed => record.finished_at = Some(now),
            TaskStatus::Pending | TaskStatus::NotStarted => {}
        }
        record.status = to;
    }
}
