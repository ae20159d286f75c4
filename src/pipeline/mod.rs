// src/pipeline/mod.rs

//! File pipelines: select files, run them through stages, write the result.
//!
//! - [`fileset`] selects and reads source files.
//! - [`stages`] holds the stage kinds a pipeline can chain.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::config::model::PipelineConfig;
use crate::exec::action::{ActionFuture, TaskAction};
use crate::exec::context::ActionContext;

pub mod fileset;
pub mod stages;

pub use fileset::FileSet;
pub use stages::{Stage, build_stage};

/// One file flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// Path relative to the pipeline base, and later to `dest`.
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

#[derive(Debug)]
struct Pipeline {
    files: FileSet,
    stages: Vec<Box<dyn Stage>>,
    dest: PathBuf,
    reload: bool,
}

impl Pipeline {
    /// Read, transform, then write. Nothing is written unless every stage
    /// succeeded, and a failed write restores the outputs written before it.
    /// Returns the written paths.
    async fn run(&self, ctx: &ActionContext) -> Result<Vec<PathBuf>> {
        let mut items = self.files.collect(ctx)?;

        for stage in &self.stages {
            let before = items.len();
            items = stage
                .apply(items, ctx)
                .await
                .with_context(|| format!("{} stage failed", stage.kind()))?;
            debug!(task = %ctx.task, stage = stage.kind(), before, after = items.len(), "stage done");
        }

        let dest = ctx.resolve(&self.dest);
        let mut written = Vec::with_capacity(items.len());
        let mut replaced: Vec<Option<Vec<u8>>> = Vec::with_capacity(items.len());
        for item in items {
            let target = dest.join(&item.path);
            let res = previous_contents(ctx, &target)
                .and_then(|prior| ctx.fs.write(&target, &item.contents).map(|()| prior));
            match res {
                Ok(prior) => {
                    written.push(target);
                    replaced.push(prior);
                }
                Err(e) => {
                    roll_back(ctx, &written, replaced);
                    return Err(e)
                        .with_context(|| format!("writing pipeline output {}", target.display()));
                }
            }
        }

        info!(task = %ctx.task, files = written.len(), dest = %self.dest.display(), "pipeline wrote output");
        if self.reload {
            ctx.reload.notify(written.clone());
        }
        Ok(written)
    }
}

fn previous_contents(ctx: &ActionContext, target: &Path) -> Result<Option<Vec<u8>>> {
    if ctx.fs.is_file(target) {
        ctx.fs.read(target).map(Some)
    } else {
        Ok(None)
    }
}

/// Put back what a partial write replaced and drop the files it created.
fn roll_back(ctx: &ActionContext, written: &[PathBuf], replaced: Vec<Option<Vec<u8>>>) {
    for (path, prior) in written.iter().zip(replaced) {
        let res = match prior {
            Some(contents) => ctx.fs.write(path, &contents),
            None => ctx.fs.remove_all(path),
        };
        if let Err(e) = res {
            warn!(task = %ctx.task, path = %path.display(), error = %e, "could not roll back pipeline output");
        }
    }
}

/// Task action wrapping a compiled pipeline.
#[derive(Debug, Clone)]
pub struct PipelineAction {
    pipeline: Arc<Pipeline>,
}

impl PipelineAction {
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let files = FileSet::new(&cfg.src, cfg.base.as_deref())?;
        let stages = cfg
            .stages
            .iter()
            .map(build_stage)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            pipeline: Arc::new(Pipeline {
                files,
                stages,
                dest: PathBuf::from(&cfg.dest),
                reload: cfg.reload,
            }),
        })
    }
}

impl TaskAction for PipelineAction {
    fn start(&self, ctx: ActionContext) -> ActionFuture {
        let pipeline = Arc::clone(&self.pipeline);
        async move { pipeline.run(&ctx).await.map(|_| ()) }.boxed()
    }

    fn describe(&self) -> String {
        let kinds: Vec<&str> = self.pipeline.stages.iter().map(|s| s.kind()).collect();
        format!(
            "pipeline: {:?} -> {} [{}]",
            self.pipeline.files,
            self.pipeline.dest.display(),
            kinds.join(", ")
        )
    }
}
