// src/config/mod.rs

//! Manifest loading and validation for sitedag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk (`loader.rs`).
//! - Validate invariants like graph acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{
    ActionConfig, ConfigFile, ConfigSection, DeployConfig, PipelineConfig, RawConfigFile,
    StageConfig, TaskConfig, UploadCommand, VendorSection, VendorTaskConfig, WatchConfig,
};
pub use validate::validate_raw_config;
