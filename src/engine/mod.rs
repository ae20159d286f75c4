// src/engine/mod.rs

//! Orchestration engine for sitedag.
//!
//! - [`executor`] runs one requested task and its prerequisites wave by wave.
//! - [`queue`] and [`core`] decide, without IO, what happens when watch
//!   triggers arrive while runs are in flight.
//! - [`runtime`] is the async shell feeding events into the core and
//!   starting runs on the executor.

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Why a watch-mode run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Requested at startup.
    Manual,
    /// A watched file changed.
    FileWatch,
    /// Pending re-run released after the previous run finished.
    Coalesced,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once no runs are in flight or pending (used by tests).
    pub exit_when_idle: bool,
}

/// Events flowing into the watch runtime.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    RunFinished {
        task: TaskName,
        run_id: u64,
        succeeded: bool,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod executor;
pub mod queue;
pub mod runtime;

pub use core::{CoreCommand, CoreRuntime, CoreStep};
pub use executor::{Engine, RunReport};
pub use queue::RetriggerQueue;
pub use runtime::Runtime;
