// src/exec/factory.rs

use std::sync::Arc;

use anyhow::Context;

use crate::config::model::{ActionConfig, ConfigSection, VendorSection};
use crate::deploy::{BuiltinConnector, DeployAction, TransferConnector};
use crate::errors::Result;
use crate::exec::action::{SharedAction, noop};
use crate::exec::clean::CleanAction;
use crate::exec::command::ShellCommandAction;
use crate::exec::vendor::VendorAction;
use crate::pipeline::PipelineAction;

/// Turns manifest action entries into runnable actions.
#[derive(Debug, Clone)]
pub struct ActionFactory {
    settings: ConfigSection,
    vendor: VendorSection,
    connector: Arc<dyn TransferConnector>,
}

impl ActionFactory {
    pub fn new(settings: ConfigSection, vendor: VendorSection) -> Self {
        Self {
            settings,
            vendor,
            connector: Arc::new(BuiltinConnector),
        }
    }

    /// Replace the transfer connector used by deploy actions.
    pub fn with_connector(mut self, connector: Arc<dyn TransferConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn build(&self, task: &str, action: ActionConfig<'_>) -> Result<SharedAction> {
        let built: SharedAction = match action {
            ActionConfig::Group => noop(),
            ActionConfig::Command(cmd) => Arc::new(ShellCommandAction::new(cmd)),
            ActionConfig::Pipeline(cfg) => Arc::new(
                PipelineAction::from_config(cfg)
                    .with_context(|| format!("building pipeline for task '{task}'"))?,
            ),
            ActionConfig::Clean(paths) if paths.is_empty() => Arc::new(CleanAction::new([
                self.settings.tmp_dir.as_str(),
                self.settings.dist_dir.as_str(),
            ])),
            ActionConfig::Clean(paths) => Arc::new(CleanAction::new(paths.iter().map(String::as_str))),
            ActionConfig::Vendor(cfg) => Arc::new(
                VendorAction::new(&self.vendor, &cfg.dest)
                    .with_context(|| format!("building vendor bundle for task '{task}'"))?,
            ),
            ActionConfig::Deploy(cfg) => Arc::new(DeployAction::from_config(
                cfg,
                &self.settings.dist_dir,
                Arc::clone(&self.connector),
            )),
        };
        Ok(built)
    }
}
