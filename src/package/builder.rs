use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use crate::changeset::ItemId;

pub const DEFAULT_SETTINGS: &str = "var/sample_per_bag_config.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failure(String),
}

/// Produces the archival package for one item.
#[async_trait]
pub trait PackageBuilder: Send + Sync {
    async fn build(&self, id: &ItemId) -> BuildOutcome;
}

/// Runs an external command once per item with `--node=<id>` appended.
#[derive(Debug, Clone)]
pub struct ConsoleBuilder {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ConsoleBuilder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// The islandora_bagger console in `app_dir`, with its per-bag settings file.
    ///
    /// A relative `app_dir` is anchored to the current directory so the
    /// program path still resolves once the child has changed into it.
    pub fn islandora_bagger(app_dir: impl AsRef<Path>, settings: &str) -> Self {
        let app_dir = anchored(app_dir.as_ref());
        Self::new(app_dir.join("bin/console"))
            .arg("app:islandora_bagger:create_bag")
            .arg("-vvv")
            .arg(format!("--settings={}", settings))
            .working_dir(app_dir)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn command_line(&self, id: &ItemId) -> Vec<String> {
        let mut line = vec![self.program.display().to_string()];
        line.extend(self.args.iter().cloned());
        line.push(format!("--node={}", id));
        line
    }
}

fn anchored(dir: &Path) -> PathBuf {
    std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())
}

#[async_trait]
impl PackageBuilder for ConsoleBuilder {
    async fn build(&self, id: &ItemId) -> BuildOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(format!("--node={}", id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(e) => {
                return BuildOutcome::Failure(format!(
                    "failed to start {}: {}",
                    self.program.display(),
                    e
                ));
            }
        };

        debug!(
            id = %id,
            stdout = %String::from_utf8_lossy(&output.stdout),
            "builder output"
        );

        if output.status.success() {
            BuildOutcome::Success
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            BuildOutcome::Failure(format!("exit status {}: {}", code, stderr.trim()))
        }
    }
}
