// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod deploy;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::dag::{Plan, TaskRegistry};
use crate::engine::{CoreRuntime, Engine, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use crate::exec::{ActionContext, ActionFactory};
use crate::types::RunMode;
use crate::watch::{ReloadHub, build_subscriptions, spawn_reload_logger, spawn_watcher};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading and registry construction
/// - a single run of the requested task
/// - (with `--watch`) the file watcher, watch runtime, reload logger and
///   Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading manifest {}", config_path.display()))?;
    let root = config_root_dir(&config_path);

    let mode = if args.watch {
        RunMode::Watch
    } else {
        RunMode::Batch
    };
    let factory = ActionFactory::new(cfg.settings().clone(), cfg.vendor().clone());
    let registry = TaskRegistry::from_config(&cfg, &factory)?;
    let reload = ReloadHub::default();
    let ctx = ActionContext::on_disk(&root)
        .with_mode(mode)
        .with_reload(reload.clone())
        .with_browsers(cfg.settings().browsers.clone());
    let engine = Engine::with_context(registry, ctx);

    if args.dry_run {
        let plan = engine.plan(&args.task)?;
        print_dry_run(&engine, &plan);
        return Ok(());
    }

    if !args.watch {
        engine.run(&args.task).await?.into_result()?;
        return Ok(());
    }

    // Definition errors stay fatal in watch mode.
    engine.plan(&args.task)?;
    let _reload_logger = spawn_reload_logger(&reload);

    // The first run goes through the runtime like any other trigger, so a
    // failure is reported but not fatal.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    rt_tx
        .send(RuntimeEvent::TaskTriggered {
            task: args.task.clone(),
            reason: TriggerReason::Manual,
        })
        .await
        .context("queueing initial run")?;
    let subscriptions = build_subscriptions(&cfg)?;
    if subscriptions.is_empty() {
        warn!("no [[watch]] entries in manifest; nothing will be re-run");
    }
    let _watcher = spawn_watcher(&root, subscriptions, rt_tx.clone(), reload.clone())?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    info!(retrigger = ?cfg.settings().retrigger, "watching for changes");
    let core = CoreRuntime::new(cfg.settings().retrigger, RuntimeOptions::default());
    Runtime::new(core, rt_rx, rt_tx, engine).run().await?;
    Ok(())
}

/// Figure out the project root: the manifest's directory, or the working
/// directory for a bare file name like `Sitedag.toml`.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print the waves of `plan` and what each task would do.
fn print_dry_run(engine: &Engine, plan: &Plan) {
    println!("sitedag dry-run: {}", plan.requested());
    for (idx, wave) in plan.waves().iter().enumerate() {
        println!("wave {idx}:");
        for name in wave {
            let action = engine
                .registry()
                .get(name)
                .map(|t| t.action.describe())
                .unwrap_or_default();
            println!("  - {name}: {action}");
        }
    }
    debug!(tasks = plan.len(), "dry-run complete (no execution)");
}
