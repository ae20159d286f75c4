// src/exec/clean.rs

use std::path::PathBuf;

use anyhow::Context;
use futures::FutureExt;
use tracing::info;

use crate::exec::action::{ActionFuture, TaskAction};
use crate::exec::context::ActionContext;

/// Deletes output directories. Missing paths are fine, so cleaning twice
/// is a no-op.
#[derive(Debug, Clone)]
pub struct CleanAction {
    paths: Vec<PathBuf>,
}

impl CleanAction {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl TaskAction for CleanAction {
    fn start(&self, ctx: ActionContext) -> ActionFuture {
        let paths = self.paths.clone();
        async move {
            for path in &paths {
                let target = ctx.resolve(path);
                ctx.fs
                    .remove_all(&target)
                    .with_context(|| format!("removing {}", target.display()))?;
                info!(task = %ctx.task, path = %path.display(), "removed");
            }
            Ok(())
        }
        .boxed()
    }

    fn describe(&self) -> String {
        let shown: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
        format!("clean: {}", shown.join(", "))
    }
}
