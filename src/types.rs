use std::str::FromStr;

use serde::Deserialize;

/// What happens when a watch subscription fires for a task whose previous
/// run (started by the same kind of trigger) is still in flight.
///
/// - `Concurrent`: start a new, independent run right away (default).
/// - `Coalesce`: remember at most one pending re-run per task and start it
///   once the in-flight run finishes; further triggers in between collapse
///   into that single pending re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetriggerBehaviour {
    #[default]
    Concurrent,
    Coalesce,
}

impl FromStr for RetriggerBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "concurrent" => Ok(RetriggerBehaviour::Concurrent),
            "coalesce" => Ok(RetriggerBehaviour::Coalesce),
            other => Err(format!(
                "invalid retrigger behaviour: {other} (expected \"concurrent\" or \"coalesce\")"
            )),
        }
    }
}

/// Mode the current process runs actions in.
///
/// Some actions behave differently while serving: lint stages report
/// problems instead of failing the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// One-shot build; every failure is fatal.
    #[default]
    Batch,
    /// Interactive watch/serve session.
    Watch,
}

impl RunMode {
    pub fn is_watch(self) -> bool {
        matches!(self, RunMode::Watch)
    }
}
