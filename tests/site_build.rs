// tests/site_build.rs

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use sitedag::config::{DeployConfig, UploadCommand, load_and_validate};
use sitedag::dag::{TaskRegistry, TaskStatus};
use sitedag::deploy::{BuiltinConnector, DeployAction, DeploySummary};
use sitedag::engine::Engine;
use sitedag::errors::SitedagError;
use sitedag::exec::{ActionContext, ActionFactory};
use sitedag::types::RunMode;
use sitedag_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

const MANIFEST: &str = r#"
[config]
tmp_dir = ".tmp"
dist_dir = "dist"

[vendor.concat]
"scripts/vendor.js" = ["bower_components/a.js", "bower_components/b.js"]

[vendor.copy]
"fonts" = ["bower_components/fonts/*.woff"]

[task.clean]
clean = []

[task.vendor]
after = ["clean"]
vendor = { dest = "dist" }

[task.styles]
after = ["clean"]

[task.styles.pipeline]
src = ["app/styles/**/*.scss", "!app/styles/**/_*.scss"]
dest = "dist/styles"

[[task.styles.pipeline.stage]]
kind = "replace"
pattern = "\\.\\./fonts"
replacement = "fonts"

[[task.styles.pipeline.stage]]
kind = "rename"
extension = "css"

[task.scripts]
after = ["clean"]

[task.scripts.pipeline]
src = ["app/scripts/*.js"]
dest = "dist/scripts"

[[task.scripts.pipeline.stage]]
kind = "concat"
into = "main.js"
separator = ";\n"

[task.build]
after = ["styles", "scripts", "vendor"]
description = "Production build"
"#;

struct Project {
    dir: TempDir,
}

impl Project {
    fn new(manifest: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = Self { dir };
        project.write("Sitedag.toml", manifest);
        project
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, rel: &str, contents: impl AsRef<[u8]>) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, contents).expect("write");
    }

    fn read(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.root().join(rel)).ok()
    }

    fn engine(&self, mode: RunMode) -> Result<Engine, SitedagError> {
        let cfg = load_and_validate(self.root().join("Sitedag.toml"))?;
        let factory = ActionFactory::new(cfg.settings().clone(), cfg.vendor().clone());
        let registry = TaskRegistry::from_config(&cfg, &factory)?;
        let ctx = ActionContext::on_disk(self.root()).with_mode(mode);
        Ok(Engine::with_context(registry, ctx))
    }
}

fn seed_sources(project: &Project) {
    project.write("app/styles/main.scss", "src: url(../fonts/x.woff)");
    project.write("app/styles/_vars.scss", "$c: red;");
    project.write("app/scripts/a.js", "var a = 1");
    project.write("app/scripts/b.js", "var b = 2");
    project.write("bower_components/a.js", "A");
    project.write("bower_components/b.js", "B");
    project.write("bower_components/fonts/x.woff", "font");
}

#[tokio::test]
async fn build_produces_the_dist_tree() -> TestResult {
    init_tracing();
    let project = Project::new(MANIFEST);
    seed_sources(&project);
    project.write("dist/stale.html", "old");
    project.write(".tmp/cache", "old");

    let engine = project.engine(RunMode::Batch)?;
    assert_eq!(
        engine.plan("build")?.waves(),
        vec![vec!["clean"], vec!["styles", "scripts", "vendor"], vec!["build"]]
    );
    with_timeout(engine.run("build")).await?.into_result()?;

    assert_eq!(project.read("dist/stale.html"), None);
    assert_eq!(project.read(".tmp/cache"), None);
    assert_eq!(
        project.read("dist/styles/main.css").as_deref(),
        Some("src: url(fonts/x.woff)")
    );
    assert_eq!(project.read("dist/styles/_vars.css"), None);
    assert_eq!(
        project.read("dist/scripts/main.js").as_deref(),
        Some("var a = 1;\nvar b = 2")
    );
    assert_eq!(project.read("dist/scripts/vendor.js").as_deref(), Some("A\nB"));
    assert_eq!(project.read("dist/fonts/x.woff").as_deref(), Some("font"));
    Ok(())
}

#[tokio::test]
async fn failing_pipeline_writes_nothing_and_skips_dependents() -> TestResult {
    let project = Project::new(MANIFEST);
    seed_sources(&project);
    // Replace requires UTF-8.
    project.write("app/styles/broken.scss", [0xffu8, 0xfe, 0x00]);

    let engine = project.engine(RunMode::Batch)?;
    let report = with_timeout(engine.run("build")).await?;

    let (failed, message) = report.failure.clone().expect("styles should fail");
    assert_eq!(failed, "styles");
    assert!(message.contains("replace stage failed"), "{message}");
    assert_eq!(report.status_of("scripts"), Some(TaskStatus::Succeeded));
    assert_eq!(report.status_of("build"), Some(TaskStatus::NotStarted));
    assert!(!project.root().join("dist/styles").exists());
    Ok(())
}

#[tokio::test]
async fn deploy_to_local_mirror_is_idempotent() -> TestResult {
    let project = Project::new(MANIFEST);
    project.write("dist/index.html", "<html>");
    project.write("dist/styles/main.css", "body{}");
    let mirror = project.root().join("mirror");
    project.write(
        "secrets/transfer.toml",
        format!("host = \"file://{}\"\nuser = \"deploy\"\n", mirror.display()),
    );

    let action = DeployAction::from_config(
        &DeployConfig {
            src: None,
            remote_dir: "/www".into(),
            credentials: "secrets/transfer.toml".into(),
            parallel: 2,
            only_changed: true,
            upload: None,
        },
        "dist",
        Arc::new(BuiltinConnector),
    );
    let ctx = ActionContext::on_disk(project.root()).for_task("deploy");

    let first = action.deploy(&ctx).await?;
    assert_eq!(
        first,
        DeploySummary {
            uploaded: 2,
            unchanged: 0
        }
    );
    assert_eq!(
        fs::read_to_string(mirror.join("www/styles/main.css"))?,
        "body{}"
    );

    let second = action.deploy(&ctx).await?;
    assert_eq!(
        second,
        DeploySummary {
            uploaded: 0,
            unchanged: 2
        }
    );

    project.write("dist/index.html", "<html>v2");
    let third = action.deploy(&ctx).await?;
    assert_eq!(third.uploaded, 1);
    assert_eq!(fs::read_to_string(mirror.join("www/index.html"))?, "<html>v2");
    Ok(())
}

#[tokio::test]
async fn deploy_with_unsupported_host_fails() {
    let project = Project::new(MANIFEST);
    project.write("dist/index.html", "<html>");
    project.write("secrets/transfer.toml", "host = \"ftp.example.com\"\n");

    let action = DeployAction::from_config(
        &DeployConfig {
            src: None,
            remote_dir: "/".into(),
            credentials: "secrets/transfer.toml".into(),
            parallel: 1,
            only_changed: false,
            upload: None,
        },
        "dist",
        Arc::new(BuiltinConnector),
    );
    let ctx = ActionContext::on_disk(project.root()).for_task("deploy");
    let err = action.deploy(&ctx).await.unwrap_err();
    assert!(format!("{err:#}").contains("ftp.example.com"));
}

fn deploy_config(remote_dir: &str, upload: Option<UploadCommand>) -> DeployConfig {
    DeployConfig {
        src: None,
        remote_dir: remote_dir.into(),
        credentials: "transfer.toml".into(),
        parallel: 2,
        only_changed: false,
        upload,
    }
}

#[tokio::test]
async fn relative_mirror_resolves_against_the_project_root() -> TestResult {
    let project = Project::new(MANIFEST);
    project.write("site/dist/index.html", "<html>");
    project.write("site/transfer.toml", "host = \"file://mirror\"\n");

    let action = DeployAction::from_config(
        &deploy_config("/pub", None),
        "dist",
        Arc::new(BuiltinConnector),
    );
    let ctx = ActionContext::on_disk(project.root().join("site")).for_task("deploy");
    action.deploy(&ctx).await?;

    assert_eq!(project.read("site/mirror/pub/index.html").as_deref(), Some("<html>"));
    assert!(!project.root().join("mirror").exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn deploy_through_upload_command_reaches_every_file() -> TestResult {
    let project = Project::new(MANIFEST);
    project.write("dist/index.html", "<html>");
    project.write("dist/styles/main.css", "body{}");
    project.write("transfer.toml", "host = \"ftp.example.com\"\nuser = \"deploy\"\n");

    let upload = UploadCommand {
        program: "sh".into(),
        args: vec![
            "-c".into(),
            "dest=\"remote/$SITEDAG_TRANSFER_HOST$1\"; mkdir -p \"$(dirname \"$dest\")\" && cat > \"$dest\"".into(),
            "upload".into(),
            "{remote}".into(),
        ],
    };
    let action = DeployAction::from_config(
        &deploy_config("/www", Some(upload)),
        "dist",
        Arc::new(BuiltinConnector),
    );
    let ctx = ActionContext::on_disk(project.root()).for_task("deploy");

    let summary = with_timeout(action.deploy(&ctx)).await?;
    assert_eq!(
        summary,
        DeploySummary {
            uploaded: 2,
            unchanged: 0
        }
    );
    assert_eq!(
        project.read("remote/ftp.example.com/www/styles/main.css").as_deref(),
        Some("body{}")
    );
    assert_eq!(
        project.read("remote/ftp.example.com/www/index.html").as_deref(),
        Some("<html>")
    );
    Ok(())
}

#[cfg(unix)]
const LINT_MANIFEST: &str = r#"
[task.scripts.pipeline]
src = ["app/scripts/*.js"]
dest = ".tmp/scripts"

[[task.scripts.pipeline.stage]]
kind = "lint"
program = "sh"
args = ["-c", "cat > /dev/null; echo 'unused variable' >&2; exit 1"]

[[task.scripts.pipeline.stage]]
kind = "exec"
program = "tr"
args = ["a-z", "A-Z"]
"#;

#[cfg(unix)]
#[tokio::test]
async fn lint_problems_fail_batch_but_not_watch() -> TestResult {
    let project = Project::new(LINT_MANIFEST);
    project.write("app/scripts/a.js", "var a");

    let batch = project.engine(RunMode::Batch)?;
    let err = with_timeout(batch.run("scripts"))
        .await?
        .into_result()
        .unwrap_err();
    assert!(err.to_string().contains("unused variable"), "{err}");
    assert_eq!(project.read(".tmp/scripts/a.js"), None);

    let watch = project.engine(RunMode::Watch)?;
    with_timeout(watch.run("scripts")).await?.into_result()?;
    assert_eq!(project.read(".tmp/scripts/a.js").as_deref(), Some("VAR A"));
    Ok(())
}
