// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::Result;

use super::core::{CoreCommand, CoreRuntime};
use super::executor::Engine;
use super::{RuntimeEvent, TaskName, TriggerReason};

/// Async IO shell around [`CoreRuntime`].
///
/// Reads `RuntimeEvent`s from the watcher and Ctrl-C handler, feeds them to
/// the core and starts runs on the [`Engine`] as the core instructs. Each
/// run reports back with `RunFinished` on the same channel.
pub struct Runtime {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    event_tx: mpsc::Sender<RuntimeEvent>,
    engine: Engine,
    runs: JoinSet<()>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("in_flight", &self.runs.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// `event_tx` must feed `event_rx`; runs use it to report completion.
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        event_tx: mpsc::Sender<RuntimeEvent>,
        engine: Engine,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            engine,
            runs: JoinSet::new(),
        }
    }

    /// Main event loop. Returns when the core asks to exit; runs still in
    /// flight at that point are aborted.
    pub async fn run(mut self) -> Result<()> {
        info!("sitedag watch runtime started");

        loop {
            let event = tokio::select! {
                event = self.event_rx.recv() => event,
                Some(joined) = self.runs.join_next(), if !self.runs.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "watch run task ended abnormally");
                    }
                    continue;
                }
            };

            let Some(event) = event else {
                info!("runtime event channel closed; exiting");
                break;
            };

            debug!(?event, "runtime received event");
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command);
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        if !self.runs.is_empty() {
            info!(in_flight = self.runs.len(), "aborting in-flight runs");
        }
        self.runs.shutdown().await;
        info!("runtime exiting");
        Ok(())
    }

    fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::StartRun {
                task,
                run_id,
                reason,
            } => self.spawn_run(task, run_id, reason),
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
    }

    fn spawn_run(&mut self, task: TaskName, run_id: u64, reason: TriggerReason) {
        info!(task = %task, run_id, ?reason, "starting watch run");
        let engine = self.engine.clone();
        let tx = self.event_tx.clone();

        self.runs.spawn(async move {
            let succeeded = match engine.run(&task).await {
                Ok(report) => report.succeeded(),
                Err(e) => {
                    warn!(task = %task, error = %e, "watch run could not start");
                    false
                }
            };
            let _ = tx
                .send(RuntimeEvent::RunFinished {
                    task,
                    run_id,
                    succeeded,
                })
                .await;
        });
    }
}
