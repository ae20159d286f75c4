// src/deploy/transfer.rs

//! Seam between the deploy action and whatever moves bytes to the remote
//! host. A local mirror and an external upload command are built in; other
//! clients plug in through [`TransferConnector`].

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::config::model::UploadCommand;
use crate::deploy::command::CommandClient;
use crate::deploy::credentials::TransferCredentials;
use crate::exec::context::ActionContext;
use crate::fs::FileSystem;
use crate::fs::hash::compute_file_hash;

/// An open connection to a transfer endpoint.
pub trait TransferClient: Send + Sync + Debug {
    /// Store `contents` at `remote_path`, replacing whatever is there.
    fn upload<'a>(&'a self, remote_path: &'a str, contents: Vec<u8>) -> BoxFuture<'a, Result<()>>;

    /// blake3 hash of the file at `remote_path`, `None` if absent.
    fn remote_hash<'a>(&'a self, remote_path: &'a str) -> BoxFuture<'a, Result<Option<String>>>;
}

/// What a deploy hands its connector.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub creds: &'a TransferCredentials,
    /// `[task.<name>.deploy.upload]`, if the task set one.
    pub upload: Option<&'a UploadCommand>,
    pub ctx: &'a ActionContext,
}

/// Opens clients from credentials.
pub trait TransferConnector: Send + Sync + Debug {
    fn connect(&self, endpoint: Endpoint<'_>) -> Result<Arc<dyn TransferClient>>;
}

/// `file://` hosts become a [`LocalMirror`] under the project root; any
/// other host goes through the task's upload command.
#[derive(Debug, Clone, Default)]
pub struct BuiltinConnector;

impl TransferConnector for BuiltinConnector {
    fn connect(&self, endpoint: Endpoint<'_>) -> Result<Arc<dyn TransferClient>> {
        let Endpoint { creds, upload, ctx } = endpoint;
        if let Some(dir) = creds.host.strip_prefix("file://") {
            return Ok(Arc::new(LocalMirror::new(ctx.resolve(dir), Arc::clone(&ctx.fs))));
        }
        match upload {
            Some(cmd) => Ok(Arc::new(CommandClient::new(cmd, creds, ctx))),
            None => bail!(
                "no transfer client available for host '{}': use a file:// host or set `upload` on the deploy task",
                creds.host
            ),
        }
    }
}

/// Client that mirrors uploads into a local directory.
#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    fn local_path(&self, remote_path: &str) -> PathBuf {
        self.root.join(Path::new(remote_path.trim_start_matches('/')))
    }
}

impl TransferClient for LocalMirror {
    fn upload<'a>(&'a self, remote_path: &'a str, contents: Vec<u8>) -> BoxFuture<'a, Result<()>> {
        let res = self.fs.write(&self.local_path(remote_path), &contents);
        futures::future::ready(res).boxed()
    }

    fn remote_hash<'a>(&'a self, remote_path: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        let path = self.local_path(remote_path);
        let res = if self.fs.is_file(&path) {
            compute_file_hash(self.fs.as_ref(), &path).map(Some)
        } else {
            Ok(None)
        };
        futures::future::ready(res).boxed()
    }
}
