// src/watch/reload.rs

//! Live-reload notifications.
//!
//! The preview server is an external collaborator; sitedag only publishes
//! "these paths changed" events on a broadcast channel that a server (or the
//! CLI's logger) can subscribe to.

use std::path::PathBuf;

use tokio::sync::broadcast;
use tracing::{debug, info};

/// Paths that connected live-preview clients should reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadEvent {
    pub paths: Vec<PathBuf>,
}

/// Cheap, cloneable handle onto the reload broadcast channel.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ReloadHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Publish a reload for `paths`. Having no subscribers is not an error:
    /// batch builds publish into the void.
    pub fn notify(&self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        match self.tx.send(ReloadEvent { paths }) {
            Ok(receivers) => debug!(receivers, "published reload event"),
            Err(_) => debug!("reload event dropped; no live-preview subscribers"),
        }
    }
}

/// Log every reload event at info level until the hub is dropped.
///
/// Used by the CLI in `--watch` mode in place of a real preview server.
pub fn spawn_reload_logger(hub: &ReloadHub) -> tokio::task::JoinHandle<()> {
    let mut rx = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => info!(paths = ?event.paths, "reload"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "reload logger lagged behind")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
