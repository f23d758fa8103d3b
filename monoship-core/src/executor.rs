//! Shell command unit of work.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ExecutionError;
use crate::scheduler::{SkipReason, UnitOfWork, WorkContext, WorkOutcome};

pub const ENV_PACKAGE_NAME: &str = "MONOSHIP_PACKAGE_NAME";
pub const ENV_ROOT_PATH: &str = "MONOSHIP_ROOT_PATH";
pub const ENV_FILE_CHANGES: &str = "MONOSHIP_FILE_CHANGES";

/// Runs a command through `sh -c` inside each package directory.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
    root: PathBuf,
    file_changes: Option<String>,
    dry_run: bool,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            root: root.into(),
            file_changes: None,
            dry_run: false,
        }
    }

    /// Exposes changed files to the command, as a delimited list.
    pub fn with_file_changes(mut self, files: impl Into<String>) -> Self {
        self.file_changes = Some(files.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[inline]
    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl UnitOfWork for ShellCommand {
    async fn execute(&self, context: WorkContext) -> WorkOutcome {
        let package = &context.package;
        if self.dry_run {
            info!(package = %package.name, location = %package.location.display(), command = %self.command, "dry run");
            return WorkOutcome::Skipped(SkipReason::DryRun);
        }

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .current_dir(&package.location)
            .env(ENV_PACKAGE_NAME, &package.name)
            .env(ENV_ROOT_PATH, &self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(files) = &self.file_changes {
            command.env(ENV_FILE_CHANGES, files);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return WorkOutcome::Failed(ExecutionError::Spawn {
                    package: package.name.clone(),
                    message: e.to_string(),
                })
            }
        };
        debug!(package = %package.name, command = %self.command, "spawned");

        let stdout = child.stdout.take().map(|out| {
            let sink = context.output.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(out).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    sink.stdout(line);
                }
            })
        });
        let stderr = child.stderr.take().map(|err| {
            let sink = context.output.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    sink.stderr(line);
                }
            })
        });

        let outcome = tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => WorkOutcome::Success,
                Ok(status) => WorkOutcome::Failed(ExecutionError::NonZeroExit {
                    package: package.name.clone(),
                    code: status.code(),
                }),
                Err(e) => WorkOutcome::Failed(ExecutionError::Spawn {
                    package: package.name.clone(),
                    message: e.to_string(),
                }),
            },
            _ = context.cancel.cancelled() => {
                debug!(package = %package.name, "terminating");
                let _ = child.kill().await;
                WorkOutcome::Cancelled
            }
        };

        for reader in [stdout, stderr].into_iter().flatten() {
            let _ = reader.await;
        }
        outcome
    }
}

/// Runs a manifest script through the package manager, in packages that declare it.
#[derive(Debug, Clone)]
pub struct ScriptCommand {
    script: String,
    client: String,
    shell: ShellCommand,
}

impl ScriptCommand {
    pub fn new(script: impl Into<String>, client: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let script = script.into();
        let client = client.into();
        let shell = ShellCommand::new(format!("{} run {}", client, script), root);
        Self {
            script,
            client,
            shell,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.shell = self.shell.with_dry_run(dry_run);
        self
    }

    #[inline]
    pub fn script(&self) -> &str {
        &self.script
    }

    #[inline]
    pub fn client(&self) -> &str {
        &self.client
    }
}

#[async_trait]
impl UnitOfWork for ScriptCommand {
    async fn execute(&self, context: WorkContext) -> WorkOutcome {
        self.shell.execute(context).await
    }
}
