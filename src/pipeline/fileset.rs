// src/pipeline/fileset.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::exec::context::ActionContext;
use crate::fs::paths::relative_str;
use crate::pipeline::FileItem;

/// Glob-selected set of source files.
///
/// Patterns are relative to the project root; a leading `!` turns a pattern
/// into an exclusion. Items are read through the context's filesystem and
/// returned sorted by path.
#[derive(Clone)]
pub struct FileSet {
    patterns: Vec<String>,
    include: GlobSet,
    exclude: GlobSet,
    /// Directories to walk, one per include pattern (deduplicated).
    roots: Vec<PathBuf>,
    base: PathBuf,
}

impl fmt::Debug for FileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSet")
            .field("patterns", &self.patterns)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl FileSet {
    pub fn new(patterns: &[String], base: Option<&str>) -> Result<Self> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for pat in patterns {
            match pat.strip_prefix('!') {
                Some(neg) => exclude.push(neg.to_string()),
                None => include.push(pat.clone()),
            }
        }
        anyhow::ensure!(!include.is_empty(), "file set needs at least one include pattern");

        let mut roots: Vec<PathBuf> = Vec::new();
        for pat in &include {
            let root = literal_prefix(pat);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        let base = match base {
            Some(b) => PathBuf::from(b),
            None => literal_prefix(&include[0]),
        };

        Ok(Self {
            patterns: patterns.to_vec(),
            include: build_globset(&include)?,
            exclude: build_globset(&exclude)?,
            roots,
            base,
        })
    }

    /// Directory item paths are relative to.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether a root-relative, `/`-separated path is selected.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.include.is_match(rel_path) && !self.exclude.is_match(rel_path)
    }

    /// Read every selected file.
    pub fn collect(&self, ctx: &ActionContext) -> Result<Vec<FileItem>> {
        let fs = ctx.fs.as_ref();
        let mut selected: BTreeSet<String> = BTreeSet::new();

        for root in &self.roots {
            let mut stack = vec![ctx.resolve(root)];
            while let Some(dir) = stack.pop() {
                if !fs.is_dir(&dir) {
                    continue;
                }
                for path in fs.read_dir(&dir)? {
                    if fs.is_dir(&path) {
                        stack.push(path);
                    } else if let Some(rel) = relative_str(&ctx.root, &path) {
                        if self.matches(&rel) {
                            selected.insert(rel);
                        }
                    }
                }
            }
        }

        let mut items = Vec::with_capacity(selected.len());
        for rel in selected {
            let source = Path::new(&rel);
            let contents = fs
                .read(&ctx.resolve(source))
                .with_context(|| format!("reading source file {rel}"))?;
            let path = source
                .strip_prefix(&self.base)
                .unwrap_or(source)
                .to_path_buf();
            items.push(FileItem { path, contents });
        }

        debug!(task = %ctx.task, files = items.len(), patterns = ?self.patterns, "collected file set");
        Ok(items)
    }
}

/// Leading path components without glob metacharacters. A pattern that is
/// entirely literal names a file, so its parent directory is returned.
pub fn literal_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    let mut globbed = false;
    for part in pattern.split('/') {
        if part.contains(['*', '?', '[', '{']) {
            globbed = true;
            break;
        }
        if !part.is_empty() && part != "." {
            prefix.push(part);
        }
    }
    if !globbed {
        prefix.pop();
    }
    if prefix.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        prefix
    }
}

/// Build a GlobSet from simple string patterns.
pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
