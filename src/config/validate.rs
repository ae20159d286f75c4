// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile, StageConfig};
use crate::errors::{Result, SitedagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SitedagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Run every manifest check; the first failing one wins.
pub fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_actions(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_watches(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> SitedagError {
    SitedagError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.tmp_dir.trim().is_empty() || cfg.config.dist_dir.trim().is_empty() {
        return Err(config_error(
            "[config].tmp_dir and [config].dist_dir must not be empty",
        ));
    }
    if cfg.config.tmp_dir == cfg.config.dist_dir {
        return Err(config_error(format!(
            "[config].tmp_dir and [config].dist_dir must differ (both '{}')",
            cfg.config.tmp_dir
        )));
    }
    Ok(())
}

fn validate_task_actions(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let kinds = task.declared_action_kinds();
        if kinds.len() > 1 {
            return Err(config_error(format!(
                "task '{}' declares more than one action ({})",
                name,
                kinds.join(", ")
            )));
        }

        if let Some(pipeline) = &task.pipeline {
            if pipeline.src.is_empty() {
                return Err(config_error(format!(
                    "task '{}' pipeline has an empty `src` list",
                    name
                )));
            }
            for stage in &pipeline.stages {
                if let StageConfig::Replace { pattern, .. } = stage {
                    Regex::new(pattern).map_err(|e| {
                        config_error(format!(
                            "task '{}' replace stage has invalid pattern '{}': {}",
                            name, pattern, e
                        ))
                    })?;
                }
            }
        }

        if let Some(deploy) = &task.deploy {
            if deploy.parallel == 0 {
                return Err(config_error(format!(
                    "task '{}' deploy.parallel must be >= 1 (got 0)",
                    name
                )));
            }
            if deploy
                .upload
                .as_ref()
                .is_some_and(|upload| upload.program.trim().is_empty())
            {
                return Err(config_error(format!(
                    "task '{}' deploy.upload.program must not be empty",
                    name
                )));
            }
        }
    }
    Ok(())
}

/// Undefined names in `after` are left for the resolver, which reports them
/// only when a run actually reaches the task.
fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(config_error(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task, so `[task.B] after = ["A"]` adds A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter().filter(|dep| cfg.task.contains_key(*dep)) {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(SitedagError::CycleDetected {
                path: cycle_through(cfg, node),
            })
        }
    }
}

/// Walk `after` edges from `start` until we get back to it, returning the
/// loop as `start -> ... -> start`.
fn cycle_through(cfg: &RawConfigFile, start: &str) -> Vec<String> {
    let mut path = vec![start.to_string()];
    let mut visited = HashSet::new();
    if walk_back_to(cfg, start, start, &mut path, &mut visited) {
        path
    } else {
        vec![start.to_string(), start.to_string()]
    }
}

fn walk_back_to(
    cfg: &RawConfigFile,
    target: &str,
    current: &str,
    path: &mut Vec<String>,
    visited: &mut HashSet<String>,
) -> bool {
    let Some(task) = cfg.task.get(current) else {
        return false;
    };
    for dep in &task.after {
        if dep == target {
            path.push(dep.clone());
            return true;
        }
        if visited.insert(dep.clone()) {
            path.push(dep.clone());
            if walk_back_to(cfg, target, dep, path, visited) {
                return true;
            }
            path.pop();
        }
    }
    false
}

fn validate_watches(cfg: &RawConfigFile) -> Result<()> {
    for (idx, watch) in cfg.watch.iter().enumerate() {
        if watch.patterns.is_empty() {
            return Err(config_error(format!(
                "[[watch]] entry #{} has no patterns",
                idx + 1
            )));
        }
        match (&watch.task, watch.reload) {
            (Some(_), true) | (None, false) => {
                return Err(config_error(format!(
                    "[[watch]] entry #{} must set exactly one of `task` or `reload = true`",
                    idx + 1
                )));
            }
            (Some(task), false) if !cfg.task.contains_key(task) => {
                return Err(config_error(format!(
                    "[[watch]] entry #{} refers to unknown task '{}'",
                    idx + 1,
                    task
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> RawConfigFile {
        toml::from_str(src).expect("test manifest should parse")
    }

    #[test]
    fn rejects_two_actions_on_one_task() {
        let raw = parse(
            r#"
[task.styles]
cmd = "sassc"
clean = []
"#,
        );
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("more than one action"));
    }

    #[test]
    fn rejects_watch_with_both_task_and_reload() {
        let raw = parse(
            r#"
[task.styles]
cmd = "sassc"

[[watch]]
patterns = ["app/**/*.scss"]
task = "styles"
reload = true
"#,
        );
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("exactly one of"));
    }

    #[test]
    fn rejects_invalid_replace_regex() {
        let raw = parse(
            r#"
[task.html.pipeline]
src = ["app/*.html"]
dest = "dist"

[[task.html.pipeline.stage]]
kind = "replace"
pattern = "(unclosed"
replacement = ""
"#,
        );
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, SitedagError::ConfigError(_)));
    }

    #[test]
    fn unknown_task_keys_are_rejected_by_deserialisation() {
        let res: std::result::Result<RawConfigFile, _> = toml::from_str(
            r#"
[task.styles]
command = "sassc"
"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn undefined_prerequisite_is_left_for_resolution() {
        let raw = parse(
            r#"
[task.fonts]
cmd = "true"

[task.html]
after = ["jade"]

[task.styles]
after = ["html", "missing"]
"#,
        );
        let cfg = ConfigFile::try_from(raw).expect("undefined names load");
        assert_eq!(cfg.tasks()["html"].after, vec!["jade".to_string()]);
    }

    #[test]
    fn cycle_is_rejected_at_load_time() {
        let raw = parse(
            r#"
[task.a]
after = ["b"]

[task.b]
after = ["a"]
"#,
        );
        match ConfigFile::try_from(raw).unwrap_err() {
            SitedagError::CycleDetected { path } => {
                assert_eq!(path.len(), 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }
}
