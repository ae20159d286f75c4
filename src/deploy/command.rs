// src/deploy/command.rs

//! Transfer client that runs an external uploader once per file.

use std::path::PathBuf;

use anyhow::{Result, bail};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use crate::config::model::UploadCommand;
use crate::deploy::credentials::TransferCredentials;
use crate::deploy::transfer::TransferClient;
use crate::exec::command::{BROWSERS_ENV, run_tool_with_env};
use crate::exec::context::ActionContext;

pub const HOST_ENV: &str = "SITEDAG_TRANSFER_HOST";
pub const USER_ENV: &str = "SITEDAG_TRANSFER_USER";
pub const PASSWORD_ENV: &str = "SITEDAG_TRANSFER_PASSWORD";
pub const PORT_ENV: &str = "SITEDAG_TRANSFER_PORT";

/// Placeholder in upload arguments replaced by the remote path.
pub const REMOTE_PLACEHOLDER: &str = "{remote}";

/// Pipes each file into the configured program.
///
/// Credentials travel in the environment, never on the command line. The
/// program cannot report remote hashes, so `only_changed` uploads everything.
#[derive(Clone)]
pub struct CommandClient {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
    env: Vec<(&'static str, String)>,
}

impl std::fmt::Debug for CommandClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandClient")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

impl CommandClient {
    pub fn new(cmd: &UploadCommand, creds: &TransferCredentials, ctx: &ActionContext) -> Self {
        let env = vec![
            (BROWSERS_ENV, ctx.browsers.join(",")),
            (HOST_ENV, creds.host.clone()),
            (USER_ENV, creds.user.clone()),
            (PASSWORD_ENV, creds.password.clone()),
            (PORT_ENV, creds.port.map(|p| p.to_string()).unwrap_or_default()),
        ];
        Self {
            program: cmd.program.clone(),
            args: cmd.args.clone(),
            cwd: ctx.root.clone(),
            env,
        }
    }

    fn args_for(&self, remote_path: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(REMOTE_PLACEHOLDER, remote_path))
            .collect()
    }
}

impl TransferClient for CommandClient {
    fn upload<'a>(&'a self, remote_path: &'a str, contents: Vec<u8>) -> BoxFuture<'a, Result<()>> {
        async move {
            let args = self.args_for(remote_path);
            debug!(program = %self.program, file = %remote_path, "running upload command");
            let out = run_tool_with_env(&self.program, &args, &self.cwd, &self.env, &contents).await?;
            if !out.success {
                bail!(
                    "upload command `{}` exited with status {}: {}",
                    self.program,
                    out.code,
                    out.stderr.trim()
                );
            }
            Ok(())
        }
        .boxed()
    }

    fn remote_hash<'a>(&'a self, _remote_path: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        futures::future::ready(Ok(None)).boxed()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn creds() -> TransferCredentials {
        TransferCredentials {
            host: "ftp.example.com".into(),
            user: "deploy".into(),
            password: "s3cret".into(),
            port: Some(2121),
        }
    }

    fn sh(script: &str) -> UploadCommand {
        UploadCommand {
            program: "sh".into(),
            args: vec!["-c".into(), script.into(), "upload".into(), "{remote}".into()],
        }
    }

    #[tokio::test]
    async fn uploads_stdin_to_the_remote_path_with_credentials_in_env() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ActionContext::on_disk(dir.path()).for_task("deploy");
        let client = CommandClient::new(
            &sh(concat!(
                "mkdir -p \"out$(dirname \"$1\")\" && cat > \"out$1\" && ",
                "printf '%s|%s|%s|%s' \"$SITEDAG_TRANSFER_HOST\" \"$SITEDAG_TRANSFER_USER\" ",
                "\"$SITEDAG_TRANSFER_PASSWORD\" \"$SITEDAG_TRANSFER_PORT\" > out/env.txt"
            )),
            &creds(),
            &ctx,
        );

        client
            .upload("/www/styles/main.css", b"body{}".to_vec())
            .await
            .unwrap();

        let uploaded = std::fs::read_to_string(dir.path().join("out/www/styles/main.css")).unwrap();
        assert_eq!(uploaded, "body{}");
        let env = std::fs::read_to_string(dir.path().join("out/env.txt")).unwrap();
        assert_eq!(env, "ftp.example.com|deploy|s3cret|2121");
        assert_eq!(client.remote_hash("/www/styles/main.css").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_upload_reports_status_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ActionContext::on_disk(dir.path()).for_task("deploy");
        let client = CommandClient::new(&sh("cat > /dev/null; echo 'login denied' >&2; exit 7"), &creds(), &ctx);

        let err = client.upload("/index.html", b"<html>".to_vec()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("status 7"), "{message}");
        assert!(message.contains("login denied"), "{message}");
    }

    #[test]
    fn debug_output_hides_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ActionContext::on_disk(dir.path());
        let client = CommandClient::new(&sh("true"), &creds(), &ctx);
        assert!(!format!("{client:?}").contains("s3cret"));
    }
}
