#![allow(dead_code)]

use sitedag::config::{
    ConfigFile, ConfigSection, PipelineConfig, RawConfigFile, StageConfig, TaskConfig,
    VendorSection, WatchConfig,
};
use sitedag::errors::Result;
use sitedag::types::RetriggerBehaviour;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                vendor: VendorSection::default(),
                task: Default::default(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_watch(mut self, patterns: &[&str], task: &str) -> Self {
        self.config.watch.push(WatchConfig {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            task: Some(task.to_string()),
            ..WatchConfig::default()
        });
        self
    }

    pub fn with_reload_watch(mut self, patterns: &[&str]) -> Self {
        self.config.watch.push(WatchConfig {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            reload: true,
            ..WatchConfig::default()
        });
        self
    }

    pub fn with_retrigger(mut self, behaviour: RetriggerBehaviour) -> Self {
        self.config.config.retrigger = behaviour;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`. Starts as a grouping task with no action.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn group() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn cmd(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn pipeline(src: &[&str], dest: &str, stages: Vec<StageConfig>) -> Self {
        Self {
            task: TaskConfig {
                pipeline: Some(PipelineConfig {
                    src: src.iter().map(|s| s.to_string()).collect(),
                    base: None,
                    dest: dest.to_string(),
                    stages,
                    reload: false,
                }),
                ..TaskConfig::default()
            },
        }
    }

    pub fn clean(paths: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                clean: Some(paths.iter().map(|p| p.to_string()).collect()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.task.description = Some(text.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
