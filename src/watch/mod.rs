// src/watch/mod.rs

//! Standing watch subscriptions and live-reload notifications.
//!
//! - [`patterns`] compiles `[[watch]]` entries into subscriptions.
//! - [`watcher`] turns `notify` events into task triggers or reloads.
//! - [`reload`] is the broadcast hub a live-preview server listens on.
//!
//! Nothing here knows about the task graph; a trigger only names a task.

pub mod patterns;
pub mod reload;
pub mod watcher;

pub use patterns::{WatchSubscription, WatchTarget, build_subscriptions};
pub use reload::{ReloadEvent, ReloadHub, spawn_reload_logger};
pub use watcher::{WatcherHandle, dispatch_paths, spawn_watcher};
