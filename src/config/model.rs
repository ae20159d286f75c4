// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::RetriggerBehaviour;

/// Top-level manifest as read from `Sitedag.toml`, before validation.
///
/// ```toml
/// [config]
/// tmp_dir = ".tmp"
/// dist_dir = "dist"
/// browsers = ["> 1%", "last 10 versions"]
///
/// [vendor.concat]
/// "scripts/vendor-concat.js" = ["bower_components/jquery/dist/jquery.js"]
///
/// [task.styles.pipeline]
/// src = ["app/styles/*.scss"]
/// dest = ".tmp/styles"
///
/// [task.html]
/// after = ["styles"]
/// cmd = "jade app/jade/pages -o .tmp"
///
/// [[watch]]
/// patterns = ["app/styles/**/*.scss"]
/// task = "styles"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub vendor: VendorSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Standing watch subscriptions from `[[watch]]`.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// Validated manifest. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    vendor: VendorSection,
    task: BTreeMap<String, TaskConfig>,
    watch: Vec<WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            vendor: raw.vendor,
            task: raw.task,
            watch: raw.watch,
        }
    }

    pub fn settings(&self) -> &ConfigSection {
        &self.config
    }

    pub fn vendor(&self) -> &VendorSection {
        &self.vendor
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn watches(&self) -> &[WatchConfig] {
        &self.watch
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Policy for watch triggers that fire while a run of the same task is
    /// still executing.
    #[serde(default)]
    pub retrigger: RetriggerBehaviour,

    /// Intermediate output directory; safe to delete at any time.
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: String,

    /// Final distributable output directory.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: String,

    /// Target-platform compatibility list handed to external stages.
    #[serde(default)]
    pub browsers: Vec<String>,
}

fn default_tmp_dir() -> String {
    ".tmp".to_string()
}

fn default_dist_dir() -> String {
    "dist".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            retrigger: RetriggerBehaviour::default(),
            tmp_dir: default_tmp_dir(),
            dist_dir: default_dist_dir(),
            browsers: Vec::new(),
        }
    }
}

/// `[vendor]` section: third-party assets to bundle.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct VendorSection {
    /// Output file (relative to the vendor task's `dest`) → input files,
    /// concatenated in the listed order.
    #[serde(default)]
    pub concat: BTreeMap<String, Vec<String>>,

    /// Sub-directory (relative to `dest`) → glob patterns copied into it.
    #[serde(default)]
    pub copy: BTreeMap<String, Vec<String>>,
}

/// `[task.<name>]` section.
///
/// At most one of `cmd`, `pipeline`, `clean`, `vendor` and `deploy` may be
/// set. A task with none of them only groups its prerequisites.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Prerequisites, in declared order.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Shell command (`sh -c` / `cmd /C`).
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,

    /// Paths to delete. An empty list means `tmp_dir` and `dist_dir`.
    #[serde(default)]
    pub clean: Option<Vec<String>>,

    #[serde(default)]
    pub vendor: Option<VendorTaskConfig>,

    #[serde(default)]
    pub deploy: Option<DeployConfig>,
}

/// Borrowed view of the single action a task declares.
#[derive(Debug, Clone, Copy)]
pub enum ActionConfig<'a> {
    Group,
    Command(&'a str),
    Pipeline(&'a PipelineConfig),
    Clean(&'a [String]),
    Vendor(&'a VendorTaskConfig),
    Deploy(&'a DeployConfig),
}

impl TaskConfig {
    /// Names of the action kinds set on this task.
    pub fn declared_action_kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.cmd.is_some() {
            kinds.push("cmd");
        }
        if self.pipeline.is_some() {
            kinds.push("pipeline");
        }
        if self.clean.is_some() {
            kinds.push("clean");
        }
        if self.vendor.is_some() {
            kinds.push("vendor");
        }
        if self.deploy.is_some() {
            kinds.push("deploy");
        }
        kinds
    }

    /// The task's action. Validation guarantees at most one kind is set; if
    /// several were, the first in declaration order of the struct wins.
    pub fn action(&self) -> ActionConfig<'_> {
        if let Some(cmd) = &self.cmd {
            ActionConfig::Command(cmd)
        } else if let Some(p) = &self.pipeline {
            ActionConfig::Pipeline(p)
        } else if let Some(paths) = &self.clean {
            ActionConfig::Clean(paths)
        } else if let Some(v) = &self.vendor {
            ActionConfig::Vendor(v)
        } else if let Some(d) = &self.deploy {
            ActionConfig::Deploy(d)
        } else {
            ActionConfig::Group
        }
    }
}

/// `[task.<name>.pipeline]`: read a file set, run stages, write to `dest`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Glob patterns relative to the project root; `!pattern` excludes.
    pub src: Vec<String>,

    /// Directory item paths are made relative to. Defaults to the literal
    /// prefix of the first `src` pattern.
    #[serde(default)]
    pub base: Option<String>,

    pub dest: String,

    #[serde(default, rename = "stage")]
    pub stages: Vec<StageConfig>,

    /// Emit a live-reload notification for written files.
    #[serde(default)]
    pub reload: bool,
}

/// One `[[task.<name>.pipeline.stage]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageConfig {
    /// External transformer: contents on stdin, replacement on stdout.
    Exec {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        /// New file extension for transformed items (e.g. `"css"`).
        #[serde(default)]
        extension: Option<String>,
        /// Only apply to items matching these globs (all items if empty).
        #[serde(default)]
        only: Vec<String>,
    },
    /// External linter: non-zero exit is a lint failure.
    Lint {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        only: Vec<String>,
    },
    /// Concatenate every item into a single file.
    Concat {
        into: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    Rename {
        #[serde(default)]
        extension: Option<String>,
        #[serde(default)]
        dir: Option<String>,
    },
    /// Regex replacement over UTF-8 contents.
    Replace {
        pattern: String,
        replacement: String,
        #[serde(default)]
        only: Vec<String>,
    },
}

fn default_separator() -> String {
    "\n".to_string()
}

/// `[task.<name>.vendor]`: bundle the `[vendor]` lists into `dest`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VendorTaskConfig {
    pub dest: String,
}

/// `[task.<name>.deploy]`: push a directory tree to a transfer endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Local directory to upload. Defaults to `[config].dist_dir`.
    #[serde(default)]
    pub src: Option<String>,

    /// Destination directory on the remote side.
    pub remote_dir: String,

    /// TOML file holding endpoint credentials, read at deploy time.
    pub credentials: String,

    /// Maximum concurrent uploads.
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Skip files whose remote content hash already matches.
    #[serde(default)]
    pub only_changed: bool,

    /// External uploader for hosts that are not `file://` mirrors.
    #[serde(default)]
    pub upload: Option<UploadCommand>,
}

/// `[task.<name>.deploy.upload]`: program run once per file.
///
/// The file arrives on stdin. `{remote}` in `args` becomes the remote path,
/// and the endpoint credentials are exported as `SITEDAG_TRANSFER_*`.
///
/// ```toml
/// [task.deploy.deploy.upload]
/// program = "sh"
/// args = [
///     "-c",
///     "curl -sS --ftp-create-dirs -u \"$SITEDAG_TRANSFER_USER:$SITEDAG_TRANSFER_PASSWORD\" -T - \"ftp://$SITEDAG_TRANSFER_HOST$1\"",
///     "upload",
///     "{remote}",
/// ]
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UploadCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_parallel() -> usize {
    4
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    pub patterns: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Task to run when a matching file changes.
    #[serde(default)]
    pub task: Option<String>,

    /// Emit a live-reload notification instead of running a task.
    #[serde(default)]
    pub reload: bool,
}
