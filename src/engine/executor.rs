// src/engine/executor.rs

//! Wave-by-wave execution of a resolved plan.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::{Plan, RunState, TaskRecord, TaskRegistry, TaskStatus, resolve};
use crate::engine::TaskName;
use crate::errors::{Result, SitedagError};
use crate::exec::context::ActionContext;

/// Summary of one finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: u64,
    pub requested: TaskName,
    pub plan: Plan,
    pub records: HashMap<TaskName, TaskRecord>,
    /// First task that failed, with its error rendered.
    pub failure: Option<(TaskName, String)>,
    pub started_at: Instant,
    pub finished_at: Instant,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn status_of(&self, task: &str) -> Option<TaskStatus> {
        self.records.get(task).map(|r| r.status)
    }

    /// Tasks in the given status, in plan order.
    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<&str> {
        self.plan
            .order()
            .into_iter()
            .filter(|name| self.status_of(name) == Some(status))
            .collect()
    }

    /// `Ok(self)` if every task succeeded, otherwise the first failure as
    /// [`SitedagError::ActionFailure`].
    pub fn into_result(self) -> Result<Self> {
        match self.failure {
            Some((task, message)) => Err(SitedagError::ActionFailure { task, message }),
            None => Ok(self),
        }
    }
}

/// Runs requested tasks against a frozen registry.
///
/// Cheap to clone; clones share the registry and the run counter.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<TaskRegistry>,
    ctx: ActionContext,
    next_run_id: Arc<AtomicU64>,
}

impl Engine {
    /// Engine rooted at the current directory on the real filesystem.
    pub fn new(registry: TaskRegistry) -> Self {
        Self::with_context(registry, ActionContext::on_disk("."))
    }

    pub fn with_context(registry: TaskRegistry, ctx: ActionContext) -> Self {
        Self {
            registry: Arc::new(registry),
            ctx,
            next_run_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }

    /// Resolve `task` without running anything.
    pub fn plan(&self, task: &str) -> Result<Plan> {
        resolve(&self.registry, task)
    }

    /// Resolve and execute `task` with all of its prerequisites.
    ///
    /// Resolution errors are returned before any action starts. Action
    /// failures are reported through [`RunReport::failure`]: siblings in the
    /// failing wave still finish, later waves never start.
    pub async fn run(&self, task: &str) -> Result<RunReport> {
        let plan = self.plan(task)?;
        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let mut state = RunState::new(run_id, &plan);
        let mut failure: Option<(TaskName, String)> = None;
        let started_at = Instant::now();

        info!(run_id, requested = task, tasks = plan.len(), "run started");

        for (wave_idx, wave) in plan.waves().into_iter().enumerate() {
            debug!(run_id, wave = wave_idx, tasks = ?wave, "starting wave");

            let mut set: JoinSet<(TaskName, std::result::Result<(), String>)> = JoinSet::new();
            for name in &wave {
                let entry = self.registry.get(name)?;
                let fut = entry.action.start(self.ctx.for_task(name));
                let name = name.to_string();
                state.mark_running(&name);
                set.spawn(async move {
                    let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(err)) => Err(format!("{err:#}")),
                        Err(panic) => Err(panic_message(panic.as_ref())),
                    };
                    (name, outcome)
                });
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => {
                        state.mark_succeeded(&name);
                        debug!(run_id, task = %name, "task succeeded");
                    }
                    Ok((name, Err(message))) => {
                        state.mark_failed(&name);
                        error!(run_id, task = %name, error = %message, "task failed");
                        failure.get_or_insert((name, message));
                    }
                    Err(join_err) => {
                        // Unattributable: resolved below by sweeping tasks
                        // still marked running.
                        error!(run_id, error = %join_err, "task join failed");
                    }
                }
            }

            for name in &wave {
                if state.status_of(name) == Some(TaskStatus::Running) {
                    state.mark_failed(name);
                    failure.get_or_insert((name.to_string(), "task aborted".to_string()));
                }
            }

            if failure.is_some() {
                let skipped = state.abandon_pending();
                if !skipped.is_empty() {
                    warn!(run_id, ?skipped, "later waves not started after failure");
                }
                break;
            }
        }

        let finished_at = Instant::now();
        match &failure {
            None => info!(
                run_id,
                requested = task,
                elapsed_ms = finished_at.duration_since(started_at).as_millis() as u64,
                "run succeeded"
            ),
            Some((failed, _)) => error!(run_id, requested = task, failed = %failed, "run failed"),
        }

        Ok(RunReport {
            run_id,
            requested: task.to_string(),
            plan,
            records: state.into_records(),
            failure,
            started_at,
            finished_at,
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
