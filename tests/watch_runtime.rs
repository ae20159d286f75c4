// tests/watch_runtime.rs

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sitedag::dag::TaskRegistry;
use sitedag::engine::{
    CoreRuntime, Engine, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
};
use sitedag::exec::ActionContext;
use sitedag::fs::mock::MockFileSystem;
use sitedag::types::RetriggerBehaviour;
use sitedag::watch::{ReloadHub, WatchSubscription, WatchTarget, dispatch_paths};
use sitedag_test_utils::spy::SpyLog;
use sitedag_test_utils::{init_tracing, with_timeout};
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn Error>>;

const RUN_TIME: Duration = Duration::from_millis(50);

fn engine_with(spy: &SpyLog, delay: Duration) -> Engine {
    let mut reg = TaskRegistry::new();
    reg.define("styles", Vec::<String>::new(), spy.action(delay));
    reg.define("html", ["styles"], spy.action(delay));
    Engine::with_context(reg, ActionContext::new(".", Arc::new(MockFileSystem::new())))
}

fn trigger(task: &str) -> RuntimeEvent {
    RuntimeEvent::TaskTriggered {
        task: task.to_string(),
        reason: TriggerReason::FileWatch,
    }
}

/// Queue `events`, then run the runtime until it goes idle.
async fn run_until_idle(
    behaviour: RetriggerBehaviour,
    engine: Engine,
    events: Vec<RuntimeEvent>,
) -> TestResult {
    let (tx, rx) = mpsc::channel(16);
    for event in events {
        tx.send(event).await?;
    }
    let core = CoreRuntime::new(
        behaviour,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );
    with_timeout(Runtime::new(core, rx, tx, engine).run()).await?;
    Ok(())
}

#[tokio::test]
async fn concurrent_retrigger_starts_independent_runs() -> TestResult {
    init_tracing();
    let spy = SpyLog::new();
    let engine = engine_with(&spy, RUN_TIME);

    run_until_idle(
        RetriggerBehaviour::Concurrent,
        engine,
        vec![trigger("styles"), trigger("styles")],
    )
    .await?;

    assert_eq!(spy.invocations("styles"), 2);
    assert_eq!(spy.finished().len(), 2);
    Ok(())
}

#[tokio::test]
async fn coalesce_collapses_pending_triggers_into_one_rerun() -> TestResult {
    let spy = SpyLog::new();
    let engine = engine_with(&spy, RUN_TIME);

    run_until_idle(
        RetriggerBehaviour::Coalesce,
        engine,
        vec![trigger("styles"), trigger("styles"), trigger("styles")],
    )
    .await?;

    // One run for the first trigger, one re-run for the two that arrived
    // while it was in flight.
    assert_eq!(spy.invocations("styles"), 2);
    Ok(())
}

#[tokio::test]
async fn coalesce_is_per_task() -> TestResult {
    let spy = SpyLog::new();
    let engine = engine_with(&spy, RUN_TIME);

    run_until_idle(
        RetriggerBehaviour::Coalesce,
        engine,
        vec![trigger("styles"), trigger("html"), trigger("html")],
    )
    .await?;

    assert_eq!(spy.invocations("html"), 2);
    // One direct run plus one per html run (its prerequisite).
    assert_eq!(spy.invocations("styles"), 3);
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_the_runtime_with_runs_in_flight() -> TestResult {
    let spy = SpyLog::new();
    let engine = engine_with(&spy, Duration::from_secs(30));

    let (tx, rx) = mpsc::channel(16);
    tx.send(trigger("styles")).await?;
    let core = CoreRuntime::new(RetriggerBehaviour::Concurrent, RuntimeOptions::default());
    let runtime = tokio::spawn(Runtime::new(core, rx, tx.clone(), engine).run());

    // Let the run start before asking to stop.
    for _ in 0..50 {
        if spy.invocations("styles") == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tx.send(RuntimeEvent::ShutdownRequested).await?;

    with_timeout(runtime).await??;
    assert_eq!(spy.invocations("styles"), 1);
    assert!(spy.finished().is_empty());
    Ok(())
}

#[tokio::test]
async fn file_changes_drive_runs_through_the_runtime() -> TestResult {
    let spy = SpyLog::new();
    let engine = engine_with(&spy, Duration::from_millis(5));

    let subs = vec![
        WatchSubscription::new(
            WatchTarget::Task("html".into()),
            &["app/jade/**/*.jade".into()],
            &[],
        )?,
        WatchSubscription::new(WatchTarget::Reload, &[".tmp/**/*.html".into()], &[])?,
    ];
    let hub = ReloadHub::default();
    let mut reloads = hub.subscribe();

    let root = Path::new("/project");
    let (tx, rx) = mpsc::channel(16);
    dispatch_paths(
        root,
        &[
            root.join("app/jade/index.jade"),
            root.join("app/jade/layout.jade"),
            root.join(".tmp/index.html"),
            root.join("README.md"),
        ],
        &subs,
        &tx,
        &hub,
    )
    .await;

    let core = CoreRuntime::new(
        RetriggerBehaviour::Concurrent,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );
    with_timeout(Runtime::new(core, rx, tx, engine).run()).await?;

    // Two matching files in one batch trigger the task once.
    assert_eq!(spy.invocations("html"), 1);
    assert_eq!(spy.started(), vec!["styles".to_string(), "html".to_string()]);
    assert_eq!(reloads.try_recv()?.paths, vec![root.join(".tmp/index.html")]);
    Ok(())
}
