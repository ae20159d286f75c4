// src/deploy/mod.rs

//! Upload the distributable tree to a transfer endpoint.
//!
//! Every source file maps to a stable remote path, so re-running a deploy
//! after a partial failure converges on the source state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{FutureExt, StreamExt, stream};
use tracing::{debug, error, info};

use crate::config::model::{DeployConfig, UploadCommand};
use crate::errors::SitedagError;
use crate::exec::action::{ActionFuture, TaskAction};
use crate::exec::context::ActionContext;
use crate::fs::FileSystem;
use crate::fs::hash::compute_bytes_hash;
use crate::fs::paths::relative_str;

pub mod command;
pub mod credentials;
pub mod transfer;

pub use command::CommandClient;
pub use credentials::TransferCredentials;
pub use transfer::{BuiltinConnector, Endpoint, LocalMirror, TransferClient, TransferConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Uploaded,
    Unchanged,
}

/// Counts from one deploy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeploySummary {
    pub uploaded: usize,
    pub unchanged: usize,
}

#[derive(Debug)]
struct Deploy {
    src: PathBuf,
    remote_dir: String,
    credentials: PathBuf,
    parallel: usize,
    only_changed: bool,
    upload: Option<UploadCommand>,
    connector: Arc<dyn TransferConnector>,
}

#[derive(Debug, Clone)]
pub struct DeployAction {
    inner: Arc<Deploy>,
}

impl DeployAction {
    /// `default_src` is used when the manifest names no `src`.
    pub fn from_config(
        cfg: &DeployConfig,
        default_src: &str,
        connector: Arc<dyn TransferConnector>,
    ) -> Self {
        Self {
            inner: Arc::new(Deploy {
                src: PathBuf::from(cfg.src.as_deref().unwrap_or(default_src)),
                remote_dir: cfg.remote_dir.clone(),
                credentials: PathBuf::from(&cfg.credentials),
                parallel: cfg.parallel.max(1),
                only_changed: cfg.only_changed,
                upload: cfg.upload.clone(),
                connector,
            }),
        }
    }

    pub async fn deploy(&self, ctx: &ActionContext) -> Result<DeploySummary> {
        self.inner.run(ctx).await
    }
}

impl TaskAction for DeployAction {
    fn start(&self, ctx: ActionContext) -> ActionFuture {
        let action = self.clone();
        async move { action.deploy(&ctx).await.map(|_| ()) }.boxed()
    }

    fn describe(&self) -> String {
        format!(
            "deploy: {} -> {} (parallel {})",
            self.inner.src.display(),
            self.inner.remote_dir,
            self.inner.parallel
        )
    }
}

impl Deploy {
    async fn run(&self, ctx: &ActionContext) -> Result<DeploySummary> {
        let creds = TransferCredentials::load(ctx.fs.as_ref(), &ctx.resolve(&self.credentials))?;
        let client = self.connector.connect(Endpoint {
            creds: &creds,
            upload: self.upload.as_ref(),
            ctx,
        })?;

        let src = ctx.resolve(&self.src);
        let files = list_files(ctx.fs.as_ref(), &src)
            .with_context(|| format!("listing deploy source {}", src.display()))?;
        let total = files.len();
        info!(task = %ctx.task, files = total, remote_dir = %self.remote_dir, "deploy started");

        let results: Vec<(String, Result<FileOutcome>)> = stream::iter(files)
            .map(|rel| {
                let client = Arc::clone(&client);
                let local = src.join(&rel);
                let remote = remote_path(&self.remote_dir, &rel);
                async move {
                    let res = self.transfer_one(ctx, client.as_ref(), &local, &remote).await;
                    (remote, res)
                }
            })
            .buffer_unordered(self.parallel)
            .collect()
            .await;

        let mut summary = DeploySummary::default();
        let mut failed = 0usize;
        let mut first: Option<String> = None;
        for (remote, res) in results {
            match res {
                Ok(FileOutcome::Uploaded) => summary.uploaded += 1,
                Ok(FileOutcome::Unchanged) => summary.unchanged += 1,
                Err(e) => {
                    let message = format!("{e:#}");
                    error!(task = %ctx.task, file = %remote, error = %message, "transfer failed");
                    failed += 1;
                    first.get_or_insert_with(|| format!("{remote}: {message}"));
                }
            }
        }

        if let Some(first) = first {
            return Err(SitedagError::TransferFailure {
                failed,
                total,
                first,
            }
            .into());
        }

        info!(
            task = %ctx.task,
            uploaded = summary.uploaded,
            unchanged = summary.unchanged,
            "deploy finished"
        );
        Ok(summary)
    }

    async fn transfer_one(
        &self,
        ctx: &ActionContext,
        client: &dyn TransferClient,
        local: &Path,
        remote: &str,
    ) -> Result<FileOutcome> {
        let contents = ctx.fs.read(local)?;
        if self.only_changed {
            let local_hash = compute_bytes_hash(&contents);
            if client.remote_hash(remote).await?.as_deref() == Some(local_hash.as_str()) {
                debug!(file = %remote, "remote copy up to date");
                return Ok(FileOutcome::Unchanged);
            }
        }
        client.upload(remote, contents).await?;
        debug!(file = %remote, "uploaded");
        Ok(FileOutcome::Uploaded)
    }
}

/// Every file under `root`, as sorted `/`-separated relative paths.
fn list_files(fs: &dyn FileSystem, root: &Path) -> Result<Vec<String>> {
    anyhow::ensure!(fs.is_dir(root), "{} is not a directory", root.display());
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if let Some(rel) = relative_str(root, &path) {
                files.push(rel);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn remote_path(remote_dir: &str, rel: &str) -> String {
    let dir = remote_dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("/{rel}")
    } else {
        format!("{dir}/{rel}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use futures::future::BoxFuture;

    use crate::fs::mock::MockFileSystem;

    #[derive(Debug, Default)]
    struct FlakyClient {
        uploads: Mutex<Vec<String>>,
    }

    impl TransferClient for FlakyClient {
        fn upload<'a>(&'a self, remote_path: &'a str, _contents: Vec<u8>) -> BoxFuture<'a, Result<()>> {
            let res = if remote_path.ends_with("broken.css") {
                Err(anyhow!("connection reset"))
            } else {
                self.uploads.lock().unwrap().push(remote_path.to_string());
                Ok(())
            };
            futures::future::ready(res).boxed()
        }

        fn remote_hash<'a>(&'a self, _remote_path: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
            futures::future::ready(Ok(None)).boxed()
        }
    }

    #[derive(Debug)]
    struct FlakyConnector(Arc<FlakyClient>);

    impl TransferConnector for FlakyConnector {
        fn connect(&self, _endpoint: Endpoint<'_>) -> Result<Arc<dyn TransferClient>> {
            Ok(self.0.clone())
        }
    }

    fn site() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("transfer.toml", "host = \"file://mirror\"\n");
        fs.add_file("dist/index.html", "<html>");
        fs.add_file("dist/styles/main.css", "body{}");
        fs
    }

    fn config(only_changed: bool) -> DeployConfig {
        DeployConfig {
            src: None,
            remote_dir: "/public_html".into(),
            credentials: "transfer.toml".into(),
            parallel: 2,
            only_changed,
            upload: None,
        }
    }

    #[test]
    fn remote_paths_are_stable() {
        assert_eq!(remote_path("/public_html/", "a/b.css"), "/public_html/a/b.css");
        assert_eq!(remote_path("", "a.css"), "/a.css");
    }

    #[tokio::test]
    async fn redeploy_converges_and_skips_unchanged() {
        let fs = site();
        let ctx = ActionContext::new(".", Arc::new(fs.clone())).for_task("deploy");
        let action = DeployAction::from_config(&config(true), "dist", Arc::new(BuiltinConnector));

        let first = action.deploy(&ctx).await.unwrap();
        assert_eq!(first, DeploySummary { uploaded: 2, unchanged: 0 });
        let snapshot = fs.file_paths();

        let second = action.deploy(&ctx).await.unwrap();
        assert_eq!(second, DeploySummary { uploaded: 0, unchanged: 2 });
        assert_eq!(fs.file_paths(), snapshot);
        assert_eq!(fs.contents("mirror/public_html/styles/main.css").as_deref(), Some("body{}"));
    }

    #[tokio::test]
    async fn failures_are_collected_after_attempting_every_file() {
        let fs = site();
        fs.add_file("dist/broken.css", "x");
        let ctx = ActionContext::new(".", Arc::new(fs)).for_task("deploy");
        let client = Arc::new(FlakyClient::default());
        let action = DeployAction::from_config(
            &config(false),
            "dist",
            Arc::new(FlakyConnector(client.clone())),
        );

        let err = action.deploy(&ctx).await.unwrap_err();
        match err.downcast_ref::<SitedagError>() {
            Some(SitedagError::TransferFailure { failed, total, first }) => {
                assert_eq!((*failed, *total), (1, 3));
                assert!(first.contains("broken.css"));
            }
            other => panic!("expected transfer failure, got {other:?}"),
        }
        assert_eq!(client.uploads.lock().unwrap().len(), 2);
    }
}
