// src/engine/core.rs

//! Pure core runtime state machine for watch mode.
//!
//! The core consumes [`RuntimeEvent`]s and returns [`CoreStep`]s describing
//! what the IO shell (`engine::runtime::Runtime`) should do. It has no
//! channels, no Tokio types and performs no IO, so the re-trigger policy can
//! be tested synchronously.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::engine::queue::RetriggerQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions, TaskName, TriggerReason};
use crate::types::RetriggerBehaviour;

/// Command produced by the core, executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start a new independent run for `task`.
    StartRun {
        task: TaskName,
        run_id: u64,
        reason: TriggerReason,
    },
    /// The shell should stop its loop.
    RequestExit,
}

/// Decision returned after handling one event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn exit() -> Self {
        Self {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        }
    }
}

#[derive(Debug)]
pub struct CoreRuntime {
    queue: RetriggerQueue,
    options: RuntimeOptions,
    next_run_id: u64,
    /// Runs started and not yet finished, by run id.
    running: BTreeMap<u64, TaskName>,
}

impl CoreRuntime {
    pub fn new(behaviour: RetriggerBehaviour, options: RuntimeOptions) -> Self {
        Self {
            queue: RetriggerQueue::new(behaviour),
            options,
            next_run_id: 1,
            running: BTreeMap::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.queue.is_idle()
    }

    pub fn running_runs(&self) -> usize {
        self.running.len()
    }

    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => {
                if self.queue.on_trigger(&task) {
                    CoreStep::continue_with(vec![self.start_run(task, reason)])
                } else {
                    CoreStep::continue_with(Vec::new())
                }
            }
            RuntimeEvent::RunFinished {
                task,
                run_id,
                succeeded,
            } => {
                if self.running.remove(&run_id).is_none() {
                    debug!(run_id, task = %task, "finish for unknown run; ignoring");
                }
                info!(run_id, task = %task, succeeded, "watch run finished");

                let mut commands = Vec::new();
                if self.queue.on_finished(&task) {
                    commands.push(self.start_run(task, TriggerReason::Coalesced));
                }

                if commands.is_empty() && self.options.exit_when_idle && self.is_idle() {
                    return CoreStep::exit();
                }
                CoreStep::continue_with(commands)
            }
            RuntimeEvent::ShutdownRequested => CoreStep::exit(),
        }
    }

    fn start_run(&mut self, task: TaskName, reason: TriggerReason) -> CoreCommand {
        let run_id = self.next_run_id;
        self.next_run_id += 1;
        self.running.insert(run_id, task.clone());
        CoreCommand::StartRun {
            task,
            run_id,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(task: &str) -> RuntimeEvent {
        RuntimeEvent::TaskTriggered {
            task: task.to_string(),
            reason: TriggerReason::FileWatch,
        }
    }

    fn finished(task: &str, run_id: u64) -> RuntimeEvent {
        RuntimeEvent::RunFinished {
            task: task.to_string(),
            run_id,
            succeeded: true,
        }
    }

    fn started(step: &CoreStep) -> Vec<u64> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::StartRun { run_id, .. } => Some(*run_id),
                CoreCommand::RequestExit => None,
            })
            .collect()
    }

    #[test]
    fn concurrent_triggers_start_independent_runs() {
        let mut core = CoreRuntime::new(RetriggerBehaviour::Concurrent, RuntimeOptions::default());
        assert_eq!(started(&core.step(trigger("styles"))), vec![1]);
        assert_eq!(started(&core.step(trigger("styles"))), vec![2]);
        assert_eq!(core.running_runs(), 2);
    }

    #[test]
    fn coalesced_trigger_starts_after_finish() {
        let mut core = CoreRuntime::new(RetriggerBehaviour::Coalesce, RuntimeOptions::default());
        assert_eq!(started(&core.step(trigger("styles"))), vec![1]);
        assert!(started(&core.step(trigger("styles"))).is_empty());
        assert!(started(&core.step(trigger("styles"))).is_empty());

        let step = core.step(finished("styles", 1));
        assert_eq!(
            step.commands,
            vec![CoreCommand::StartRun {
                task: "styles".to_string(),
                run_id: 2,
                reason: TriggerReason::Coalesced,
            }]
        );
        assert!(started(&core.step(finished("styles", 2))).is_empty());
        assert!(core.is_idle());
    }

    #[test]
    fn exit_when_idle_and_shutdown() {
        let mut core = CoreRuntime::new(
            RetriggerBehaviour::Concurrent,
            RuntimeOptions {
                exit_when_idle: true,
            },
        );
        core.step(trigger("html"));
        assert!(!core.step(finished("html", 1)).keep_running);

        let mut core = CoreRuntime::new(RetriggerBehaviour::Concurrent, RuntimeOptions::default());
        assert!(!core.step(RuntimeEvent::ShutdownRequested).keep_running);
    }
}
