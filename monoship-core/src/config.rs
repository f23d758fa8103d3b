//! Workspace configuration from `monoship.toml`.
//!
//! The file is normalised before it is deserialised: deprecated keys are
//! mapped onto their replacements and `no_*` negations are folded into the
//! positive field, so nothing downstream ever sees either form.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::Pattern;
use semver::Version;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};
use tracing::warn;

use crate::change::{ChangeOptions, PackageSelection};
use crate::error::{Error, Result};
use crate::graph::{GraphOptions, GraphType};
use crate::scheduler::{ConcurrencyMode, RunPolicy};
use crate::streaming::OutputMode;
use crate::version::{
    ConventionalOptions, GraduatePrecedence, PlanOptions, PrereleasePolicy, Versioning,
};
use crate::watch::WatchEventFilter;

pub const CONFIG_FILE: &str = "monoship.toml";
const INDEPENDENT: &str = "independent";

/// `(section, deprecated key, replacement)`
const DEPRECATED_KEYS: &[(&str, &str, &str)] = &[
    ("exec", "cmd_dry_run", "dry_run"),
    ("exec", "git_dry_run", "dry_run"),
    (
        "release",
        "changelog_include_commit_author_fullname",
        "changelog_include_commits_git_author",
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonoshipConfig {
    /// Globs locating package directories.
    pub packages: Vec<String>,
    /// Shared version in fixed mode, or `"independent"`.
    pub version: Option<String>,
    pub graph_type: GraphType,
    pub allow_cycles: bool,
    pub changed: ChangedConfig,
    pub release: ReleaseConfig,
    pub publish: PublishConfig,
    pub exec: ExecConfig,
    pub watch: WatchConfig,
}

impl Default for MonoshipConfig {
    fn default() -> Self {
        Self {
            packages: vec!["packages/*".to_string()],
            version: None,
            graph_type: GraphType::All,
            allow_cycles: false,
            changed: ChangedConfig::default(),
            release: ReleaseConfig::default(),
            publish: PublishConfig::default(),
            exec: ExecConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangedConfig {
    pub ignore_changes: Vec<String>,
    pub include_merged_tags: bool,
    /// Package names, or `*`, released even without changes.
    pub force_publish: Vec<String>,
    pub propagate_dev_dependencies: bool,
}

impl Default for ChangedConfig {
    fn default() -> Self {
        Self {
            ignore_changes: Vec::new(),
            include_merged_tags: false,
            force_publish: Vec::new(),
            propagate_dev_dependencies: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    pub conventional_commits: bool,
    pub conventional_graduate: Vec<String>,
    pub conventional_prerelease: Vec<String>,
    pub conventional_bump_prerelease: bool,
    pub graduate_precedence: GraduatePrecedence,
    pub preid: Option<String>,
    pub prerelease_seed: u64,
    pub exact: bool,
    pub allow_peer_dependencies_update: bool,
    /// Commit message; `%s` is the tag and `%v` the version in fixed mode.
    pub message: Option<String>,
    pub tag_version_prefix: String,
    pub git_remote: String,
    pub push: bool,
    pub git_tag_version: bool,
    pub changelog: bool,
    pub changelog_header_message: Option<String>,
    pub changelog_include_commits_git_author: bool,
    pub sign_git_commit: bool,
    pub signoff_git_commit: bool,
    pub sign_git_tag: bool,
    pub force_git_tag: bool,
    pub git_tag_command: Option<String>,
    pub amend: bool,
    pub commit_hooks: bool,
    pub granular_pathspec: bool,
    /// Version private packages too.
    pub private: bool,
    pub allow_branch: Vec<String>,
    pub manually_update_root_lockfile: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            conventional_commits: false,
            conventional_graduate: Vec::new(),
            conventional_prerelease: Vec::new(),
            conventional_bump_prerelease: false,
            graduate_precedence: GraduatePrecedence::Graduate,
            preid: None,
            prerelease_seed: 0,
            exact: false,
            allow_peer_dependencies_update: false,
            message: None,
            tag_version_prefix: "v".to_string(),
            git_remote: "origin".to_string(),
            push: true,
            git_tag_version: true,
            changelog: true,
            changelog_header_message: None,
            changelog_include_commits_git_author: false,
            sign_git_commit: false,
            signoff_git_commit: false,
            sign_git_tag: false,
            force_git_tag: false,
            git_tag_command: None,
            amend: false,
            commit_hooks: true,
            granular_pathspec: true,
            private: true,
            allow_branch: Vec::new(),
            manually_update_root_lockfile: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub dist_tag: String,
    /// Dist-tag for prerelease versions.
    pub pre_dist_tag: Option<String>,
    pub registry: Option<String>,
    pub otp: Option<String>,
    pub publish_command: String,
    /// JSON publish report, a `.json` file or a directory.
    pub summary_file: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            dist_tag: crate::registry::DEFAULT_DIST_TAG.to_string(),
            pre_dist_tag: None,
            registry: None,
            otp: None,
            publish_command: crate::registry::DEFAULT_PUBLISH_COMMAND.to_string(),
            summary_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    pub bail: bool,
    pub prefix: bool,
    pub stream: bool,
    pub parallel: bool,
    pub concurrency: Option<usize>,
    pub sort: bool,
    pub dry_run: bool,
    /// Client used by `run` to invoke manifest scripts.
    pub npm_client: String,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            bail: true,
            prefix: true,
            stream: false,
            parallel: false,
            concurrency: None,
            sort: true,
            dry_run: false,
            npm_client: "npm".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period in milliseconds.
    pub emit_changes_delay: u64,
    pub file_delimiter: String,
    pub glob: Option<String>,
    /// Files to never react to, relative to their package.
    pub ignored: Vec<String>,
    pub watch_all_events: bool,
    pub watch_added_file: bool,
    pub watch_added_dir: bool,
    pub watch_removed_file: bool,
    pub watch_removed_dir: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            emit_changes_delay: 100,
            file_delimiter: " ".to_string(),
            glob: None,
            ignored: Vec::new(),
            watch_all_events: false,
            watch_added_file: false,
            watch_added_dir: false,
            watch_removed_file: false,
            watch_removed_dir: false,
        }
    }
}

impl MonoshipConfig {
    /// Loads `monoship.toml` from `root`, falling back to defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Self::parse(&content).map_err(|e| match e {
            Error::Toml { error, .. } => Error::Toml {
                error,
                context: path.display().to_string(),
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut table: Table = toml::from_str(content)?;
        normalize(&mut table)?;
        Ok(Value::Table(table).try_into()?)
    }

    /// Walks up from `start` to the first directory holding `monoship.toml`.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(CONFIG_FILE).is_file())
            .map(Path::to_path_buf)
    }

    pub fn versioning(&self) -> Result<Versioning> {
        match self.version.as_deref() {
            None | Some(INDEPENDENT) => Ok(Versioning::Independent),
            Some(raw) => Version::parse(raw)
                .map(Versioning::Fixed)
                .map_err(|e| Error::Config(format!("Invalid workspace version '{}': {}", raw, e))),
        }
    }

    pub fn is_independent(&self) -> bool {
        matches!(self.version.as_deref(), None | Some(INDEPENDENT))
    }

    /// Glob matching this workspace's release tags.
    pub fn tag_pattern(&self) -> String {
        if self.is_independent() {
            "*@*".to_string()
        } else {
            format!("{}*", self.release.tag_version_prefix)
        }
    }

    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            graph_type: self.graph_type,
            allow_cycles: self.allow_cycles,
        }
    }

    pub fn change_options(&self) -> ChangeOptions {
        ChangeOptions {
            ignore_changes: self.changed.ignore_changes.clone(),
            include_merged_tags: self.changed.include_merged_tags,
            force_publish: PackageSelection::from_names(self.changed.force_publish.iter().cloned()),
            graduate: PackageSelection::from_names(self.release.conventional_graduate.iter().cloned()),
            propagate_dev_dependencies: self.changed.propagate_dev_dependencies,
            conventional_commits: self.release.conventional_commits,
            tag_pattern: self.tag_pattern(),
            include_private: self.release.private,
        }
    }

    pub fn conventional_options(&self) -> ConventionalOptions {
        ConventionalOptions {
            prerelease: PackageSelection::from_names(self.release.conventional_prerelease.iter().cloned()),
            graduate: PackageSelection::from_names(self.release.conventional_graduate.iter().cloned()),
            bump_prerelease: self.release.conventional_bump_prerelease,
            precedence: self.release.graduate_precedence,
        }
    }

    pub fn plan_options(&self) -> Result<PlanOptions> {
        Ok(PlanOptions {
            versioning: self.versioning()?,
            prerelease: PrereleasePolicy {
                preid: self.release.preid.clone(),
                seed: self.release.prerelease_seed,
            },
            exact: self.release.exact,
            allow_peer_dependencies_update: self.release.allow_peer_dependencies_update,
            include_private: self.release.private,
        })
    }

    pub fn run_policy(&self) -> RunPolicy {
        let mode = if self.exec.parallel || !self.exec.sort {
            ConcurrencyMode::Parallel
        } else if self.exec.concurrency == Some(1) {
            ConcurrencyMode::Serial
        } else {
            ConcurrencyMode::Topological
        };
        RunPolicy {
            mode,
            concurrency: if self.exec.parallel { None } else { self.exec.concurrency },
            bail: self.exec.bail,
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        match (self.exec.stream || self.exec.parallel, self.exec.prefix) {
            (true, true) => OutputMode::Prefixed,
            (true, false) => OutputMode::Raw,
            (false, _) => OutputMode::Buffered,
        }
    }

    pub fn watch_filter(&self) -> WatchEventFilter {
        if self.watch.watch_all_events {
            return WatchEventFilter::all();
        }
        WatchEventFilter {
            add: self.watch.watch_added_file,
            add_dir: self.watch.watch_added_dir,
            change: true,
            unlink: self.watch.watch_removed_file,
            unlink_dir: self.watch.watch_removed_dir,
        }
    }

    #[inline]
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.watch.emit_changes_delay)
    }

    pub fn watch_ignored(&self) -> Result<Vec<Pattern>> {
        crate::change::compile_globs(&self.watch.ignored)
    }
}

/// Rewrites the top-level `version` key of a `monoship.toml` document,
/// keeping its formatting.
pub fn write_fixed_version(content: &str, version: &Version) -> Result<String> {
    let mut document: toml_edit::DocumentMut = content
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {}: {}", CONFIG_FILE, e)))?;
    document["version"] = toml_edit::value(version.to_string());
    Ok(document.to_string())
}

fn normalize(table: &mut Table) -> Result<()> {
    fold_negations("", table)?;
    for (name, value) in table.iter_mut() {
        if let Value::Table(section) = value {
            map_deprecated(name, section);
            fold_negations(name, section)?;
        }
    }
    Ok(())
}

fn map_deprecated(section: &str, table: &mut Table) {
    for (owner, old, new) in DEPRECATED_KEYS {
        if *owner != section {
            continue;
        }
        if let Some(value) = table.remove(*old) {
            warn!("`{}.{}` is deprecated, use `{}.{}` instead", section, old, section, new);
            table.entry(new.to_string()).or_insert(value);
        }
    }
}

fn fold_negations(section: &str, table: &mut Table) -> Result<()> {
    let negated: Vec<String> = table
        .keys()
        .filter(|key| key.starts_with("no_"))
        .cloned()
        .collect();

    for key in negated {
        let Some(value) = table.remove(&key) else {
            continue;
        };
        let Some(positive) = key.strip_prefix("no_").map(str::to_string) else {
            continue;
        };
        let Value::Boolean(flag) = value else {
            return Err(Error::Config(format!("`{}` must be a boolean", qualified(section, &key))));
        };
        if table.contains_key(&positive) {
            warn!(
                "both `{}` and `{}` are set, keeping `{}`",
                qualified(section, &key),
                qualified(section, &positive),
                qualified(section, &positive)
            );
            continue;
        }
        table.insert(positive, Value::Boolean(!flag));
    }
    Ok(())
}

fn qualified(section: &str, key: &str) -> String {
    if section.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", section, key)
    }
}
