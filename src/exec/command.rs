// src/exec/command.rs

//! Shell command actions and the shared process helper used by external
//! pipeline stages.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use futures::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::action::{ActionFuture, TaskAction};
use crate::exec::context::ActionContext;

/// Environment variable carrying `[config].browsers` to external tools.
pub const BROWSERS_ENV: &str = "SITEDAG_BROWSERS";

/// Runs a command line through the platform shell in the project root.
#[derive(Debug, Clone)]
pub struct ShellCommandAction {
    cmd: String,
}

impl ShellCommandAction {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl TaskAction for ShellCommandAction {
    fn start(&self, ctx: ActionContext) -> ActionFuture {
        let cmd = self.cmd.clone();
        async move { run_shell(&cmd, &ctx).await }.boxed()
    }

    fn describe(&self) -> String {
        format!("cmd: {}", self.cmd)
    }
}

/// Build a shell command appropriate for the platform.
fn shell(cmd_line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    }
}

async fn run_shell(cmd_line: &str, ctx: &ActionContext) -> Result<()> {
    info!(task = %ctx.task, cmd = %cmd_line, "starting task process");

    let mut cmd = shell(cmd_line);
    cmd.current_dir(&ctx.root)
        .env(BROWSERS_ENV, ctx.browsers.join(","))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", ctx.task))?;

    // Always consume both pipes so buffers don't fill.
    if let Some(stdout) = child.stdout.take() {
        let task_name = ctx.task.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(task = %task_name, "{}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let task_name = ctx.task.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{}'", ctx.task))?;

    let code = status.code().unwrap_or(-1);
    info!(
        task = %ctx.task,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    if !status.success() {
        bail!("command `{}` exited with status {}", cmd_line, code);
    }
    Ok(())
}

/// Output of an external tool fed through stdin.
#[derive(Debug)]
pub struct ToolOutput {
    pub success: bool,
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Run `program args…` in `cwd`, write `input` to its stdin and collect
/// everything it prints. Used by external pipeline stages.
pub async fn run_tool(
    program: &str,
    args: &[String],
    cwd: &Path,
    browsers: &[String],
    input: &[u8],
) -> Result<ToolOutput> {
    run_tool_with_env(program, args, cwd, &[(BROWSERS_ENV, browsers.join(","))], input).await
}

/// [`run_tool`] with an explicit set of extra environment variables.
pub async fn run_tool_with_env(
    program: &str,
    args: &[String],
    cwd: &Path,
    env: &[(&str, String)],
    input: &[u8],
) -> Result<ToolOutput> {
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .envs(env.iter().map(|(key, value)| (*key, value.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning external tool '{}'", program))?;

    let mut stdin = child
        .stdin
        .take()
        .with_context(|| format!("no stdin pipe for '{}'", program))?;
    let input = input.to_vec();
    // Feed stdin concurrently with draining stdout to avoid pipe deadlocks.
    let writer = tokio::spawn(async move {
        let res = stdin.write_all(&input).await;
        drop(stdin);
        res
    });

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for external tool '{}'", program))?;

    match writer.await {
        Ok(Ok(())) => {}
        // A tool that exits without reading all of stdin is judged by its
        // exit status alone.
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => return Err(e).with_context(|| format!("writing stdin of '{}'", program)),
        Err(e) => bail!("stdin writer for '{}' panicked: {}", program, e),
    }

    Ok(ToolOutput {
        success: output.status.success(),
        code: output.status.code().unwrap_or(-1),
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
