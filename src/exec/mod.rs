// src/exec/mod.rs

//! Actions: the work a task performs.
//!
//! - [`action`] defines [`TaskAction`], the one-future-per-invocation
//!   contract the engine awaits, plus adapters for closures and streams.
//! - [`context`] carries what an action may touch (root, filesystem, mode).
//! - [`command`] runs shell commands and external tools.
//! - [`clean`] and [`vendor`] are the built-in file actions.
//! - [`factory`] maps manifest entries to actions.

pub mod action;
pub mod clean;
pub mod command;
pub mod context;
pub mod factory;
pub mod vendor;

pub use action::{ActionFuture, SharedAction, TaskAction, from_async, from_fn, from_stream, noop};
pub use context::ActionContext;
pub use factory::ActionFactory;
