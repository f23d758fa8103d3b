//! Core library for monorepo release orchestration.

pub mod adapter;
pub mod adapter_registry;
pub mod change;
pub mod changelog;
pub mod config;
pub mod conventional;
pub mod error;
pub mod executor;
pub mod git;
pub mod graph;
pub mod lockfile;
pub mod package;
pub mod path_utils;
pub mod range;
pub mod registry;
pub mod release;
pub mod release_reporter;
pub mod scanner;
pub mod scheduler;
pub mod streaming;
pub mod transaction;
pub mod version;
pub mod watch;
pub mod watcher;

pub use adapter::{ManifestAdapter, ManifestUpdate, RangeUpdate};
pub use adapter_registry::AdapterRegistry;
pub use change::{ChangeDetector, ChangeOptions, ChangeReason, ChangeSet, PackageSelection, ReferencePoint};
pub use changelog::{ChangelogEntry, ChangelogGenerator, MarkdownChangelog};
pub use config::MonoshipConfig;
pub use error::{
    ChangeDetectionError, Error, ExecutionError, GitCommandError, GraphError, PublishError, Result,
    VersionError,
};
pub use executor::{ScriptCommand, ShellCommand};
pub use git::{CommitInfo, GitClient, SystemGit};
pub use graph::{DependencyGraph, GraphOptions, GraphType};
pub use package::{Dependency, DependencyKind, ManifestKind, Package};
pub use registry::{CommandRegistry, PublishRequest, PublishResponse, RegistryClient, RegistryPublish};
pub use release::{
    ExistingPublishOptions, PublishReport, PublishSource, PublishSummaryEntry, ReleaseCoordinator, ReleaseOptions,
    ReleaseReport,
};
pub use release_reporter::ReleaseReporter;
pub use scanner::Scanner;
pub use scheduler::{
    ConcurrencyMode, ExecutionPlan, PackageStatus, RunPolicy, RunResult, Scheduler, SkipReason,
    UnitOfWork, WorkContext, WorkOutcome,
};
pub use streaming::{OutputHandler, OutputMode};
pub use version::{
    BumpKind, ManualBump, PlannedBump, VersionBumpEngine, VersionBumpPlan, VersionMode, Versioning,
};
pub use watch::{ChangeBatch, RawEvent, RawEventKind, WatchDebouncer, WatchEventFilter};
pub use watcher::FileWatcher;
