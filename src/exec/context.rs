// src/exec/context.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::TaskName;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::RunMode;
use crate::watch::reload::ReloadHub;

/// Everything an action may touch while it runs.
///
/// The engine clones one base context per task invocation and stamps the
/// task name on it.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Task the action is running for (empty in the base context).
    pub task: TaskName,
    pub mode: RunMode,
    /// Project root; relative paths in the manifest resolve against it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub reload: ReloadHub,
    /// Target-platform list exported to external tools.
    pub browsers: Arc<Vec<String>>,
}

impl ActionContext {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            task: TaskName::new(),
            mode: RunMode::Batch,
            root: root.into(),
            fs,
            reload: ReloadHub::default(),
            browsers: Arc::new(Vec::new()),
        }
    }

    /// Context rooted at `root` using the real filesystem.
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(RealFileSystem))
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_reload(mut self, reload: ReloadHub) -> Self {
        self.reload = reload;
        self
    }

    pub fn with_browsers(mut self, browsers: Vec<String>) -> Self {
        self.browsers = Arc::new(browsers);
        self
    }

    pub fn for_task(&self, task: &str) -> Self {
        let mut ctx = self.clone();
        ctx.task = task.to_string();
        ctx
    }

    /// Resolve a manifest path against the project root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
