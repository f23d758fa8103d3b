//! Registry publish boundary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ExecutionError, PublishError};
use crate::scheduler::{SkipReason, UnitOfWork, WorkContext, WorkOutcome};

pub const DEFAULT_PUBLISH_COMMAND: &str = "npm publish";
pub const DEFAULT_DIST_TAG: &str = "latest";

/// Publish `package` at `version` under `dist_tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub package: String,
    pub version: Version,
    pub location: PathBuf,
    pub dist_tag: String,
    pub otp: Option<String>,
    pub registry: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishResponse {
    Published,
    /// The registry wants a one-time password; retry with one.
    OtpRequired,
}

#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn publish(&self, request: PublishRequest) -> Result<PublishResponse, PublishError>;

    /// Whether `package@version` is already on the registry. Unknown counts as
    /// not published; the publish attempt then reports the real problem.
    async fn is_published(&self, _package: &str, _version: &Version, _registry: Option<&str>) -> bool {
        false
    }
}

/// Publishes by running the package manager's publish command.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    command: String,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLISH_COMMAND)
    }
}

impl CommandRegistry {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn arguments(&self, request: &PublishRequest) -> (String, Vec<String>) {
        let mut tokens = self.command.split_whitespace().map(str::to_string);
        let program = tokens.next().unwrap_or_else(|| "npm".to_string());
        let mut args: Vec<String> = tokens.collect();
        args.push("--tag".to_string());
        args.push(request.dist_tag.clone());
        if let Some(otp) = &request.otp {
            args.push("--otp".to_string());
            args.push(otp.clone());
        }
        if let Some(registry) = &request.registry {
            args.push("--registry".to_string());
            args.push(registry.clone());
        }
        (program, args)
    }

    /// `<program> view <package>@<version> version`, run through the same
    /// package manager as the publish command.
    fn view_arguments(&self, package: &str, version: &Version, registry: Option<&str>) -> (String, Vec<String>) {
        let program = self
            .command
            .split_whitespace()
            .next()
            .unwrap_or("npm")
            .to_string();
        let mut args = vec![
            "view".to_string(),
            format!("{}@{}", package, version),
            "version".to_string(),
        ];
        if let Some(registry) = registry {
            args.push("--registry".to_string());
            args.push(registry.to_string());
        }
        (program, args)
    }
}

#[async_trait]
impl RegistryClient for CommandRegistry {
    async fn is_published(&self, package: &str, version: &Version, registry: Option<&str>) -> bool {
        let (program, args) = self.view_arguments(package, version, registry);
        match Command::new(&program).args(&args).output().await {
            Ok(output) if output.status.success() => {
                let found = String::from_utf8_lossy(&output.stdout).trim() == version.to_string();
                debug!(%package, %version, found, "checked registry");
                found
            }
            Ok(_) => false,
            Err(e) => {
                debug!(%package, error = %e, "registry lookup failed");
                false
            }
        }
    }

    async fn publish(&self, request: PublishRequest) -> Result<PublishResponse, PublishError> {
        let (program, args) = self.arguments(&request);
        debug!(package = %request.package, %program, ?args, "publishing");

        let output = Command::new(&program)
            .args(&args)
            .current_dir(&request.location)
            .output()
            .await
            .map_err(|e| PublishError::Rejected {
                package: request.package.clone(),
                version: request.version.to_string(),
                message: format!("failed to run {}: {}", program, e),
            })?;

        if output.status.success() {
            return Ok(PublishResponse::Published);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if requires_otp(&stderr) {
            return match request.otp {
                Some(_) => Err(PublishError::OtpInvalid {
                    package: request.package,
                }),
                None => Ok(PublishResponse::OtpRequired),
            };
        }

        Err(PublishError::Rejected {
            package: request.package,
            version: request.version.to_string(),
            message: stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("publish command failed")
                .trim()
                .to_string(),
        })
    }
}

fn requires_otp(stderr: &str) -> bool {
    stderr.contains("EOTP") || stderr.to_ascii_lowercase().contains("one-time password")
}

/// Unit of work publishing each planned package.
///
/// Ignores cancellation once started; a half-finished upload is worse than
/// a finished one.
pub struct RegistryPublish {
    client: Arc<dyn RegistryClient>,
    versions: BTreeMap<String, Version>,
    dist_tag: String,
    pre_dist_tag: Option<String>,
    otp: Option<String>,
    registry: Option<String>,
    dry_run: bool,
}

impl RegistryPublish {
    pub fn new(client: Arc<dyn RegistryClient>, versions: BTreeMap<String, Version>) -> Self {
        Self {
            client,
            versions,
            dist_tag: DEFAULT_DIST_TAG.to_string(),
            pre_dist_tag: None,
            otp: None,
            registry: None,
            dry_run: false,
        }
    }

    pub fn with_dist_tags(mut self, dist_tag: impl Into<String>, pre_dist_tag: Option<String>) -> Self {
        self.dist_tag = dist_tag.into();
        self.pre_dist_tag = pre_dist_tag;
        self
    }

    pub fn with_otp(mut self, otp: Option<String>) -> Self {
        self.otp = otp;
        self
    }

    pub fn with_registry(mut self, registry: Option<String>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Prerelease versions go to `pre_dist_tag` when one is configured.
    pub fn dist_tag_for(&self, version: &Version) -> &str {
        match &self.pre_dist_tag {
            Some(tag) if !version.pre.is_empty() => tag,
            _ => &self.dist_tag,
        }
    }
}

#[async_trait]
impl UnitOfWork for RegistryPublish {
    async fn execute(&self, context: WorkContext) -> WorkOutcome {
        let package = &context.package;
        let version = self
            .versions
            .get(&package.name)
            .cloned()
            .unwrap_or_else(|| package.version.clone());
        let dist_tag = self.dist_tag_for(&version).to_string();

        if self.dry_run {
            info!(package = %package.name, %version, %dist_tag, "dry run, not publishing");
            return WorkOutcome::Skipped(SkipReason::DryRun);
        }

        let request = PublishRequest {
            package: package.name.clone(),
            version: version.clone(),
            location: package.location.clone(),
            dist_tag,
            otp: self.otp.clone(),
            registry: self.registry.clone(),
        };

        match self.client.publish(request).await {
            Ok(PublishResponse::Published) => {
                context.output.stdout(format!("published {}@{}", package.name, version));
                WorkOutcome::Success
            }
            Ok(PublishResponse::OtpRequired) => WorkOutcome::Failed(ExecutionError::Publish(
                PublishError::OtpRequired {
                    package: package.name.clone(),
                },
            )),
            Err(e) => WorkOutcome::Failed(ExecutionError::Publish(e)),
        }
    }
}
