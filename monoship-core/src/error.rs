//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {context}: {error}")]
    Json {
        error: serde_json::Error,
        context: String,
    },

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Manifest error in {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    ChangeDetection(#[from] ChangeDetectionError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Git(#[from] GitCommandError),

    #[error("Workspace is locked by another run: {0}. Remove the lock file if no run is in progress.")]
    Locked(PathBuf),

    #[error("Release aborted: {0}")]
    Release(String),

    #[error("File watcher error: {0}")]
    Watch(String),
}

/// Failures while building the package graph. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate package name '{name}' found at {first} and {second}")]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Dependency cycle detected: {}. Use graph_type = \"dependencies\" or allow_cycles = true to tolerate it.", .members.join(" -> "))]
    UnresolvedCycle { members: Vec<String> },

    #[error("Package not found: {name}. Available packages: {available}")]
    PackageNotFound { name: String, available: String },
}

#[derive(Error, Debug)]
pub enum ChangeDetectionError {
    #[error("Unable to resolve reference point '{reference}': {message}")]
    UnresolvedReference { reference: String, message: String },

    #[error("Git query failed: {0}")]
    Git(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Cannot graduate '{package}': {message}")]
    AmbiguousGraduate { package: String, message: String },

    #[error("Invalid manual bump: {0}")]
    InvalidManualBump(String),

    #[error("Invalid version '{version}' for {package}: {message}")]
    InvalidVersion {
        package: String,
        version: String,
        message: String,
    },

    #[error("Invalid dependency range '{range}': {message}")]
    InvalidRange { range: String, message: String },
}

/// A unit of work did not complete successfully.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("{package} exited with {}", .code.map(|c| format!("code {c}")).unwrap_or_else(|| "a signal".to_string()))]
    NonZeroExit { package: String, code: Option<i32> },

    #[error("Failed to start work for {package}: {message}")]
    Spawn { package: String, message: String },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Registry rejections, reported per package.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Registry rejected {package}@{version}: {message}")]
    Rejected {
        package: String,
        version: String,
        message: String,
    },

    #[error("Registry requires a one-time password to publish {package}")]
    OtpRequired { package: String },

    #[error("One-time password was rejected while publishing {package}")]
    OtpInvalid { package: String },
}

impl PublishError {
    /// Whether retrying with a fresh one-time password may succeed.
    pub fn needs_otp(&self) -> bool {
        matches!(
            self,
            PublishError::OtpRequired { .. } | PublishError::OtpInvalid { .. }
        )
    }
}

/// A git invocation that failed, with the exact command for manual recovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("git command failed: `{command}`\n{stderr}")]
pub struct GitCommandError {
    pub command: String,
    pub stderr: String,
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "monoship.toml".to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            error,
            context: "package.json".to_string(),
        }
    }
}

impl From<git2::Error> for ChangeDetectionError {
    fn from(error: git2::Error) -> Self {
        ChangeDetectionError::Git(error.message().to_string())
    }
}

impl From<git2::Error> for Error {
    fn from(error: git2::Error) -> Self {
        Error::ChangeDetection(error.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
