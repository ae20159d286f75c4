// src/exec/vendor.rs

//! Third-party asset bundling from the `[vendor]` manifest section.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use tracing::{debug, info};

use crate::config::model::VendorSection;
use crate::exec::action::{ActionFuture, TaskAction};
use crate::exec::context::ActionContext;
use crate::pipeline::FileSet;

#[derive(Debug)]
struct Bundle {
    /// Output file relative to `dest` → input files in order.
    concat: Vec<(PathBuf, Vec<PathBuf>)>,
    /// Sub-directory relative to `dest` → files selected by globs.
    copy: Vec<(PathBuf, FileSet)>,
    dest: PathBuf,
}

/// Concatenates and copies vendor assets into `dest`.
#[derive(Debug, Clone)]
pub struct VendorAction {
    bundle: Arc<Bundle>,
}

impl VendorAction {
    pub fn new(section: &VendorSection, dest: &str) -> Result<Self> {
        let concat = section
            .concat
            .iter()
            .map(|(out, inputs)| (PathBuf::from(out), inputs.iter().map(PathBuf::from).collect()))
            .collect();
        let copy = section
            .copy
            .iter()
            .map(|(dir, globs)| {
                let set = FileSet::new(globs, None)
                    .with_context(|| format!("vendor copy list for '{dir}'"))?;
                Ok((PathBuf::from(dir), set))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bundle: Arc::new(Bundle {
                concat,
                copy,
                dest: PathBuf::from(dest),
            }),
        })
    }
}

impl Bundle {
    fn run(&self, ctx: &ActionContext) -> Result<usize> {
        let dest = ctx.resolve(&self.dest);
        let mut written = 0usize;

        for (out, inputs) in &self.concat {
            let mut contents = Vec::new();
            for (i, input) in inputs.iter().enumerate() {
                if i > 0 {
                    contents.push(b'\n');
                }
                let bytes = ctx
                    .fs
                    .read(&ctx.resolve(input))
                    .with_context(|| format!("vendor input {}", input.display()))?;
                contents.extend_from_slice(&bytes);
            }
            ctx.fs.write(&dest.join(out), &contents)?;
            debug!(task = %ctx.task, out = %out.display(), inputs = inputs.len(), "vendor bundle written");
            written += 1;
        }

        for (dir, set) in &self.copy {
            for item in set.collect(ctx)? {
                ctx.fs.write(&dest.join(dir).join(&item.path), &item.contents)?;
                written += 1;
            }
        }

        info!(task = %ctx.task, files = written, dest = %self.dest.display(), "vendor assets bundled");
        Ok(written)
    }
}

impl TaskAction for VendorAction {
    fn start(&self, ctx: ActionContext) -> ActionFuture {
        let bundle = Arc::clone(&self.bundle);
        async move { bundle.run(&ctx).map(|_| ()) }.boxed()
    }

    fn describe(&self) -> String {
        format!(
            "vendor: {} bundle(s), {} copy list(s) -> {}",
            self.bundle.concat.len(),
            self.bundle.copy.len(),
            self.bundle.dest.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::fs::mock::MockFileSystem;

    #[tokio::test]
    async fn concatenates_in_listed_order_and_copies_globs() {
        let fs = MockFileSystem::new();
        fs.add_file("bower_components/jquery/jquery.js", "jq");
        fs.add_file("bower_components/slick/slick.js", "slick");
        fs.add_file("bower_components/fa/fonts/fa.woff", "font");

        let section = VendorSection {
            concat: BTreeMap::from([(
                "scripts/vendor-concat.js".to_string(),
                vec![
                    "bower_components/slick/slick.js".to_string(),
                    "bower_components/jquery/jquery.js".to_string(),
                ],
            )]),
            copy: BTreeMap::from([(
                "fonts".to_string(),
                vec!["bower_components/fa/fonts/*".to_string()],
            )]),
        };
        let ctx = ActionContext::new(".", Arc::new(fs.clone())).for_task("vendor");
        VendorAction::new(&section, ".tmp").unwrap().start(ctx).await.unwrap();

        assert_eq!(
            fs.contents(".tmp/scripts/vendor-concat.js").as_deref(),
            Some("slick\njq")
        );
        assert_eq!(fs.contents(".tmp/fonts/fa.woff").as_deref(), Some("font"));
    }

    #[tokio::test]
    async fn missing_input_fails() {
        let section = VendorSection {
            concat: BTreeMap::from([("a.js".to_string(), vec!["nope.js".to_string()])]),
            copy: BTreeMap::new(),
        };
        let ctx = ActionContext::new(".", Arc::new(MockFileSystem::new())).for_task("vendor");
        let err = VendorAction::new(&section, "dist").unwrap().start(ctx).await.unwrap_err();
        assert!(format!("{err:#}").contains("nope.js"));
    }
}
