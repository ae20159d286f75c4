// src/exec/action.rs

//! The single completion type the engine awaits.
//!
//! Whatever a task does, be it a plain function, an async block, or a stream
//! of produced files, it is adapted into a [`TaskAction`] whose `start`
//! returns exactly one [`ActionFuture`]. The engine never sees anything else.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use tracing::debug;

use crate::exec::context::ActionContext;

/// One future per task invocation; `Ok(())` is success.
pub type ActionFuture = BoxFuture<'static, Result<()>>;

/// A unit of work attached to a task.
pub trait TaskAction: Send + Sync {
    /// Start the work. Nothing may happen before the returned future is
    /// polled, so building a plan never has side effects.
    fn start(&self, ctx: ActionContext) -> ActionFuture;

    /// Short human-readable description for dry runs and logs.
    fn describe(&self) -> String;
}

/// Actions are shared between the registry and in-flight runs.
pub type SharedAction = Arc<dyn TaskAction>;

impl fmt::Debug for dyn TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskAction({})", self.describe())
    }
}

/// Action for tasks that only group prerequisites.
pub fn noop() -> SharedAction {
    Arc::new(NoopAction)
}

/// Adapt a synchronous closure; its return value is the completion signal.
pub fn from_fn<F>(f: F) -> SharedAction
where
    F: Fn(&ActionContext) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnAction(Arc::new(f)))
}

/// Adapt a closure returning a future; resolution is the completion signal.
pub fn from_async<F, Fut>(f: F) -> SharedAction
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(AsyncAction(Arc::new(f), PhantomData))
}

/// Adapt a closure returning a stream; exhaustion is the completion signal
/// and the first `Err` item is a failure.
pub fn from_stream<F, S, T>(f: F) -> SharedAction
where
    F: Fn(ActionContext) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    Arc::new(StreamAction(Arc::new(f), PhantomData))
}

struct NoopAction;

impl TaskAction for NoopAction {
    fn start(&self, _ctx: ActionContext) -> ActionFuture {
        futures::future::ready(Ok(())).boxed()
    }

    fn describe(&self) -> String {
        "(group)".to_string()
    }
}

struct FnAction<F>(Arc<F>);

impl<F> TaskAction for FnAction<F>
where
    F: Fn(&ActionContext) -> Result<()> + Send + Sync + 'static,
{
    fn start(&self, ctx: ActionContext) -> ActionFuture {
        let f = Arc::clone(&self.0);
        async move { f(&ctx) }.boxed()
    }

    fn describe(&self) -> String {
        "fn".to_string()
    }
}

struct AsyncAction<F, Fut>(Arc<F>, PhantomData<fn() -> Fut>);

impl<F, Fut> TaskAction for AsyncAction<F, Fut>
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn start(&self, ctx: ActionContext) -> ActionFuture {
        let f = Arc::clone(&self.0);
        async move { f(ctx).await }.boxed()
    }

    fn describe(&self) -> String {
        "async fn".to_string()
    }
}

struct StreamAction<F, S, T>(Arc<F>, PhantomData<fn() -> (S, T)>);

impl<F, S, T> TaskAction for StreamAction<F, S, T>
where
    F: Fn(ActionContext) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    fn start(&self, ctx: ActionContext) -> ActionFuture {
        let f = Arc::clone(&self.0);
        async move {
            let task = ctx.task.clone();
            let mut stream = Box::pin(f(ctx));
            let mut items = 0usize;
            while let Some(item) = stream.next().await {
                item?;
                items += 1;
            }
            debug!(task = %task, items, "stream exhausted");
            Ok(())
        }
        .boxed()
    }

    fn describe(&self) -> String {
        "stream".to_string()
    }
}
