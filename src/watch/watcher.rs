// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TaskName, TriggerReason};
use crate::fs::paths::relative_str;
use crate::watch::patterns::{WatchSubscription, WatchTarget};
use crate::watch::reload::ReloadHub;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a recursive watcher on `root`.
///
/// Changes matching a task subscription become `TaskTriggered` events on
/// `runtime_tx`; changes matching a reload subscription are published on
/// `reload`.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    subscriptions: Vec<WatchSubscription>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    reload: ReloadHub,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());
    let subscriptions = Arc::new(subscriptions);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("sitedag: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("sitedag: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = ?root, subscriptions = subscriptions.len(), "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            debug!(?event, "received notify event");
            dispatch_paths(&root, &event.paths, &subscriptions, &runtime_tx, &reload).await;
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Route one batch of changed paths to the subscriptions interested in
/// them. Each task is triggered at most once per batch; every matching
/// subscription fires independently.
pub async fn dispatch_paths(
    root: &Path,
    paths: &[PathBuf],
    subscriptions: &[WatchSubscription],
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    reload: &ReloadHub,
) {
    let mut tasks: BTreeSet<TaskName> = BTreeSet::new();
    let mut reload_paths: Vec<PathBuf> = Vec::new();

    for path in paths {
        let Some(rel) = relative_str(root, path) else {
            debug!(path = ?path, "change outside watch root; ignoring");
            continue;
        };
        for sub in subscriptions.iter().filter(|s| s.matches(&rel)) {
            match sub.target() {
                WatchTarget::Task(task) => {
                    tasks.insert(task.clone());
                }
                WatchTarget::Reload => {
                    if !reload_paths.contains(path) {
                        reload_paths.push(path.clone());
                    }
                }
            }
        }
    }

    for task in tasks {
        debug!(task = %task, "watch trigger");
        if let Err(e) = runtime_tx
            .send(RuntimeEvent::TaskTriggered {
                task,
                reason: TriggerReason::FileWatch,
            })
            .await
        {
            warn!(error = %e, "runtime is gone; dropping watch trigger");
        }
    }
    reload.notify(reload_paths);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overlapping_subscriptions_fire_independently() {
        let subs = vec![
            WatchSubscription::new(WatchTarget::Task("styles".into()), &["app/**/*.scss".into()], &[])
                .unwrap(),
            WatchSubscription::new(WatchTarget::Task("lint".into()), &["app/**".into()], &[]).unwrap(),
            WatchSubscription::new(WatchTarget::Reload, &["app/**/*.scss".into()], &[]).unwrap(),
        ];
        let (tx, mut rx) = mpsc::channel(8);
        let hub = ReloadHub::default();
        let mut reloads = hub.subscribe();

        let root = Path::new("/project");
        let changed = vec![
            root.join("app/styles/main.scss"),
            root.join("app/styles/_vars.scss"),
        ];
        dispatch_paths(root, &changed, &subs, &tx, &hub).await;
        drop(tx);

        let mut triggered = Vec::new();
        while let Some(RuntimeEvent::TaskTriggered { task, .. }) = rx.recv().await {
            triggered.push(task);
        }
        assert_eq!(triggered, vec!["lint".to_string(), "styles".to_string()]);
        assert_eq!(reloads.try_recv().unwrap().paths, changed);
    }
}
