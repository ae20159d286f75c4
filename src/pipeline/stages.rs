// src/pipeline/stages.rs

//! Pipeline stages. Each stage takes the whole item list and returns a new
//! one; the first error aborts the pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use futures::FutureExt;
use futures::future::BoxFuture;
use globset::GlobSet;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::model::StageConfig;
use crate::exec::command::run_tool;
use crate::exec::context::ActionContext;
use crate::pipeline::FileItem;
use crate::pipeline::fileset::build_globset;

pub type StageFuture<'a> = BoxFuture<'a, Result<Vec<FileItem>>>;

pub trait Stage: Send + Sync + fmt::Debug {
    /// Kind name used in logs and errors.
    fn kind(&self) -> &'static str;

    fn apply<'a>(&'a self, items: Vec<FileItem>, ctx: &'a ActionContext) -> StageFuture<'a>;
}

/// Compile a stage from its manifest entry.
pub fn build_stage(cfg: &StageConfig) -> Result<Box<dyn Stage>> {
    Ok(match cfg {
        StageConfig::Exec {
            program,
            args,
            extension,
            only,
        } => Box::new(ExecStage {
            program: program.clone(),
            args: args.clone(),
            extension: extension.clone(),
            only: OnlyFilter::new(only)?,
        }),
        StageConfig::Lint {
            program,
            args,
            only,
        } => Box::new(LintStage {
            program: program.clone(),
            args: args.clone(),
            only: OnlyFilter::new(only)?,
        }),
        StageConfig::Concat { into, separator } => Box::new(ConcatStage {
            into: PathBuf::from(into),
            separator: separator.clone(),
        }),
        StageConfig::Rename { extension, dir } => Box::new(RenameStage {
            extension: extension.clone(),
            dir: dir.as_ref().map(PathBuf::from),
        }),
        StageConfig::Replace {
            pattern,
            replacement,
            only,
        } => Box::new(ReplaceStage {
            regex: Regex::new(pattern).with_context(|| format!("invalid regex {pattern:?}"))?,
            replacement: replacement.clone(),
            only: OnlyFilter::new(only)?,
        }),
    })
}

/// Optional glob restriction on item paths; empty means every item.
#[derive(Clone)]
struct OnlyFilter(Option<GlobSet>);

impl OnlyFilter {
    fn new(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            Ok(Self(None))
        } else {
            Ok(Self(Some(build_globset(patterns)?)))
        }
    }

    fn applies_to(&self, path: &Path) -> bool {
        match &self.0 {
            None => true,
            Some(set) => set.is_match(path.to_string_lossy().replace('\\', "/")),
        }
    }
}

impl fmt::Debug for OnlyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => write!(f, "all"),
            Some(set) => write!(f, "{} globs", set.len()),
        }
    }
}

#[derive(Debug)]
struct ExecStage {
    program: String,
    args: Vec<String>,
    extension: Option<String>,
    only: OnlyFilter,
}

impl Stage for ExecStage {
    fn kind(&self) -> &'static str {
        "exec"
    }

    fn apply<'a>(&'a self, items: Vec<FileItem>, ctx: &'a ActionContext) -> StageFuture<'a> {
        async move {
            let mut out = Vec::with_capacity(items.len());
            for mut item in items {
                if self.only.applies_to(&item.path) {
                    let res = run_tool(&self.program, &self.args, &ctx.root, &ctx.browsers, &item.contents)
                        .await?;
                    if !res.success {
                        bail!(
                            "{} failed on {} (status {}): {}",
                            self.program,
                            item.path.display(),
                            res.code,
                            res.stderr.trim()
                        );
                    }
                    item.contents = res.stdout;
                    if let Some(ext) = &self.extension {
                        item.path.set_extension(ext);
                    }
                }
                out.push(item);
            }
            Ok(out)
        }
        .boxed()
    }
}

#[derive(Debug)]
struct LintStage {
    program: String,
    args: Vec<String>,
    only: OnlyFilter,
}

impl Stage for LintStage {
    fn kind(&self) -> &'static str {
        "lint"
    }

    fn apply<'a>(&'a self, items: Vec<FileItem>, ctx: &'a ActionContext) -> StageFuture<'a> {
        async move {
            let mut problems = Vec::new();
            for item in items.iter().filter(|i| self.only.applies_to(&i.path)) {
                let res = run_tool(&self.program, &self.args, &ctx.root, &ctx.browsers, &item.contents)
                    .await?;
                if !res.success {
                    problems.push(format!("{}: {}", item.path.display(), res.stderr.trim()));
                }
            }

            if problems.is_empty() {
                return Ok(items);
            }
            if ctx.mode.is_watch() {
                for problem in &problems {
                    warn!(task = %ctx.task, linter = %self.program, "{}", problem);
                }
                return Ok(items);
            }
            bail!(
                "{} reported problems in {} file(s): {}",
                self.program,
                problems.len(),
                problems.join("; ")
            )
        }
        .boxed()
    }
}

#[derive(Debug)]
struct ConcatStage {
    into: PathBuf,
    separator: String,
}

impl Stage for ConcatStage {
    fn kind(&self) -> &'static str {
        "concat"
    }

    fn apply<'a>(&'a self, items: Vec<FileItem>, _ctx: &'a ActionContext) -> StageFuture<'a> {
        let mut contents = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                contents.extend_from_slice(self.separator.as_bytes());
            }
            contents.extend_from_slice(&item.contents);
        }
        let out = if items.is_empty() {
            Vec::new()
        } else {
            vec![FileItem {
                path: self.into.clone(),
                contents,
            }]
        };
        futures::future::ready(Ok(out)).boxed()
    }
}

#[derive(Debug)]
struct RenameStage {
    extension: Option<String>,
    dir: Option<PathBuf>,
}

impl Stage for RenameStage {
    fn kind(&self) -> &'static str {
        "rename"
    }

    fn apply<'a>(&'a self, mut items: Vec<FileItem>, _ctx: &'a ActionContext) -> StageFuture<'a> {
        for item in &mut items {
            if let Some(ext) = &self.extension {
                item.path.set_extension(ext);
            }
            if let Some(dir) = &self.dir {
                item.path = dir.join(&item.path);
            }
        }
        futures::future::ready(Ok(items)).boxed()
    }
}

#[derive(Debug)]
struct ReplaceStage {
    regex: Regex,
    replacement: String,
    only: OnlyFilter,
}

impl Stage for ReplaceStage {
    fn kind(&self) -> &'static str {
        "replace"
    }

    fn apply<'a>(&'a self, items: Vec<FileItem>, _ctx: &'a ActionContext) -> StageFuture<'a> {
        let result = items
            .into_iter()
            .map(|mut item| -> Result<FileItem> {
                if self.only.applies_to(&item.path) {
                    let text = std::str::from_utf8(&item.contents)
                        .with_context(|| format!("{} is not UTF-8", item.path.display()))?;
                    let replaced = self.regex.replace_all(text, self.replacement.as_str());
                    debug!(path = %item.path.display(), "replace applied");
                    item.contents = replaced.into_owned().into_bytes();
                }
                Ok(item)
            })
            .collect::<Result<Vec<_>>>();
        futures::future::ready(result).boxed()
    }
}
