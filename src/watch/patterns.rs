// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::config::model::{ConfigFile, WatchConfig};
use crate::engine::TaskName;
use crate::pipeline::fileset::build_globset;

/// What a subscription does when a matching file changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// Start a run of this task.
    Task(TaskName),
    /// Publish a live-reload notification for the changed path.
    Reload,
}

/// Compiled `[[watch]]` entry.
///
/// Patterns are relative to the project root; the watcher passes relative,
/// `/`-separated paths (e.g. `"app/styles/main.scss"`) into [`matches`].
///
/// [`matches`]: WatchSubscription::matches
#[derive(Clone)]
pub struct WatchSubscription {
    target: WatchTarget,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl WatchSubscription {
    pub fn new(target: WatchTarget, patterns: &[String], exclude: &[String]) -> Result<Self> {
        let watch_set = build_globset(patterns)
            .with_context(|| format!("building watch globset for {target:?}"))?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(exclude)
                    .with_context(|| format!("building exclude globset for {target:?}"))?,
            )
        };
        Ok(Self {
            target,
            watch_set,
            exclude_set,
        })
    }

    pub fn from_config(cfg: &WatchConfig) -> Result<Self> {
        let target = match &cfg.task {
            Some(task) => WatchTarget::Task(task.clone()),
            None => WatchTarget::Reload,
        };
        Self::new(target, &cfg.patterns, &cfg.exclude)
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Returns true if this subscription is interested in `rel_path`.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Compile every `[[watch]]` entry of a validated manifest, in order.
pub fn build_subscriptions(cfg: &ConfigFile) -> Result<Vec<WatchSubscription>> {
    cfg.watches().iter().map(WatchSubscription::from_config).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_wins_over_watch() {
        let sub = WatchSubscription::new(
            WatchTarget::Task("styles".into()),
            &["app/styles/**/*.scss".into()],
            &["app/styles/vendor/**".into()],
        )
        .unwrap();

        assert!(sub.matches("app/styles/main.scss"));
        assert!(!sub.matches("app/styles/vendor/x.scss"));
        assert!(!sub.matches("app/scripts/main.js"));
    }

    #[test]
    fn entry_without_task_is_a_reload_subscription() {
        let sub = WatchSubscription::from_config(&WatchConfig {
            patterns: vec![".tmp/**/*.css".into()],
            reload: true,
            ..WatchConfig::default()
        })
        .unwrap();
        assert_eq!(sub.target(), &WatchTarget::Reload);
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = WatchSubscription::new(WatchTarget::Reload, &["app/[".into()], &[]).unwrap_err();
        assert!(format!("{err:#}").contains("invalid glob"));
    }
}
