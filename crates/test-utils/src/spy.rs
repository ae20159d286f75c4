use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sitedag::exec::{ActionContext, SharedAction, from_async};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpyPhase {
    Started,
    Finished,
}

/// Shared record of spy action invocations, in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct SpyLog {
    events: Arc<Mutex<Vec<(String, SpyPhase, Instant)>>>,
}

impl SpyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action that records start, sleeps for `delay`, records finish and
    /// succeeds.
    pub fn action(&self, delay: Duration) -> SharedAction {
        self.build(delay, None)
    }

    /// Like [`SpyLog::action`] but fails with `message` after the delay.
    pub fn failing(&self, delay: Duration, message: &str) -> SharedAction {
        self.build(delay, Some(message.to_string()))
    }

    fn build(&self, delay: Duration, failure: Option<String>) -> SharedAction {
        let log = self.clone();
        from_async(move |ctx: ActionContext| {
            let log = log.clone();
            let failure = failure.clone();
            async move {
                log.record(&ctx.task, SpyPhase::Started);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                log.record(&ctx.task, SpyPhase::Finished);
                match failure {
                    Some(message) => Err(anyhow::anyhow!(message)),
                    None => Ok(()),
                }
            }
        })
    }

    fn record(&self, task: &str, phase: SpyPhase) {
        self.events
            .lock()
            .unwrap()
            .push((task.to_string(), phase, Instant::now()));
    }

    /// Tasks in start order.
    pub fn started(&self) -> Vec<String> {
        self.names_in(SpyPhase::Started)
    }

    /// Tasks in finish order.
    pub fn finished(&self) -> Vec<String> {
        self.names_in(SpyPhase::Finished)
    }

    pub fn invocations(&self, task: &str) -> usize {
        self.started().iter().filter(|t| *t == task).count()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }

    /// Position of the first event for `task` in `phase`.
    pub fn position(&self, task: &str, phase: SpyPhase) -> Option<usize> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .position(|(t, p, _)| t == task && *p == phase)
    }

    pub fn at(&self, task: &str, phase: SpyPhase) -> Option<Instant> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(t, p, _)| t == task && *p == phase)
            .map(|(_, _, at)| *at)
    }

    fn names_in(&self, phase: SpyPhase) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p, _)| *p == phase)
            .map(|(t, _, _)| t.clone())
            .collect()
    }
}
