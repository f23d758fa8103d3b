//! Release sequencing: plan, write, commit, tag, push and publish.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use glob::Pattern;
use semver::Version;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::ManifestUpdate;
use crate::adapter_registry::AdapterRegistry;
use crate::change::{ChangeDetector, ChangeOptions, ChangeSet, ReferencePoint};
use crate::changelog::{ChangelogEntry, ChangelogGenerator, MarkdownChangelog, CHANGELOG_FILE};
use crate::config::{self, MonoshipConfig, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::git::{CommitInfo, CommitOptions, GitClient, TagOptions};
use crate::graph::DependencyGraph;
use crate::lockfile::RootLockfile;
use crate::registry::{RegistryClient, RegistryPublish};
use crate::release_reporter::{ReleaseReporter, SilentReporter};
use crate::scanner::relative_location;
use crate::scheduler::{ExecutionPlan, PackageStatus, RunPolicy, RunResult, Scheduler};
use crate::transaction::{ManifestTransaction, WorkspaceWriteLock};
use crate::version::{PlanOptions, VersionBumpEngine, VersionBumpPlan, VersionMode};

const DEFAULT_INDEPENDENT_MESSAGE: &str = "chore(release): publish";
const DEFAULT_FIXED_MESSAGE: &str = "chore(release): %s";
pub const PUBLISH_SUMMARY_FILE: &str = "monoship-publish-summary.json";

#[derive(Debug, Clone)]
pub struct GitReleaseOptions {
    pub remote: String,
    /// Commit message template. `%s` is the tag and `%v` the version in fixed mode.
    pub message: Option<String>,
    pub tag_prefix: String,
    pub commit: CommitOptions,
    pub tag: TagOptions,
    /// Commit and tag the release. Without it the manifests are left unstaged.
    pub tag_version: bool,
    pub push: bool,
    /// Stage only the files the release wrote instead of the whole tree.
    pub granular_pathspec: bool,
    pub allow_branch: Vec<String>,
}

impl Default for GitReleaseOptions {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            message: None,
            tag_prefix: "v".to_string(),
            commit: CommitOptions::default(),
            tag: TagOptions::default(),
            tag_version: true,
            push: true,
            granular_pathspec: true,
            allow_branch: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub dist_tag: String,
    pub pre_dist_tag: Option<String>,
    pub otp: Option<String>,
    pub registry: Option<String>,
    pub policy: RunPolicy,
}

impl PublishOptions {
    pub fn from_config(config: &MonoshipConfig) -> Self {
        Self {
            dist_tag: config.publish.dist_tag.clone(),
            pre_dist_tag: config.publish.pre_dist_tag.clone(),
            otp: config.publish.otp.clone(),
            registry: config.publish.registry.clone(),
            policy: RunPolicy {
                bail: config.exec.bail,
                concurrency: config.exec.concurrency,
                ..RunPolicy::default()
            },
        }
    }
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            dist_tag: crate::registry::DEFAULT_DIST_TAG.to_string(),
            pre_dist_tag: None,
            otp: None,
            registry: None,
            policy: RunPolicy::default(),
        }
    }
}

/// Everything one `version` or `publish` run needs to know.
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub reference: ReferencePoint,
    pub changes: ChangeOptions,
    pub mode: VersionMode,
    pub plan: PlanOptions,
    pub git: GitReleaseOptions,
    pub changelog: bool,
    pub update_root_lockfile: bool,
    /// `Some` for publish runs.
    pub publish: Option<PublishOptions>,
    pub dry_run: bool,
}

impl ReleaseOptions {
    pub fn new(mode: VersionMode) -> Self {
        Self {
            reference: ReferencePoint::LastTag,
            changes: ChangeOptions::default(),
            mode,
            plan: PlanOptions::default(),
            git: GitReleaseOptions::default(),
            changelog: true,
            update_root_lockfile: true,
            publish: None,
            dry_run: false,
        }
    }

    /// Builds options from the resolved configuration.
    pub fn from_config(config: &MonoshipConfig, mode: VersionMode) -> Result<Self> {
        let release = &config.release;
        Ok(Self {
            reference: ReferencePoint::LastTag,
            changes: config.change_options(),
            mode,
            plan: config.plan_options()?,
            git: GitReleaseOptions {
                remote: release.git_remote.clone(),
                message: release.message.clone(),
                tag_prefix: release.tag_version_prefix.clone(),
                commit: CommitOptions {
                    sign: release.sign_git_commit,
                    signoff: release.signoff_git_commit,
                    no_verify: !release.commit_hooks,
                    amend: release.amend,
                },
                tag: TagOptions {
                    sign: release.sign_git_tag,
                    force: release.force_git_tag,
                    command: release.git_tag_command.clone(),
                },
                tag_version: release.git_tag_version,
                push: release.push && !release.amend,
                granular_pathspec: release.granular_pathspec,
                allow_branch: release.allow_branch.clone(),
            },
            changelog: release.changelog,
            update_root_lockfile: release.manually_update_root_lockfile,
            publish: None,
            dry_run: config.exec.dry_run,
        })
    }

    /// Turns this into a publish run with the configured registry settings.
    pub fn with_publish(mut self, config: &MonoshipConfig) -> Self {
        self.publish = Some(PublishOptions::from_config(config));
        self
    }
}

/// Where a publish-only run takes its versions from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PublishSource {
    /// Release tags pointing at `HEAD`.
    #[default]
    Git,
    /// Versions currently in the manifests.
    Package,
}

/// Options for publishing an already versioned release.
#[derive(Debug, Clone)]
pub struct ExistingPublishOptions {
    pub source: PublishSource,
    pub tag_prefix: String,
    pub publish: PublishOptions,
    pub dry_run: bool,
}

impl Default for ExistingPublishOptions {
    fn default() -> Self {
        Self {
            source: PublishSource::Git,
            tag_prefix: GitReleaseOptions::default().tag_prefix,
            publish: PublishOptions::default(),
            dry_run: false,
        }
    }
}

/// What a publish-only run did.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// Versions found for every candidate package.
    pub versions: BTreeMap<String, Version>,
    /// Candidates the registry already had, left alone.
    pub already_published: Vec<String>,
    pub publish: Option<RunResult>,
    pub dry_run: bool,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.publish.as_ref().map(RunResult::is_success).unwrap_or(true)
    }

    pub fn summary(&self) -> Vec<PublishSummaryEntry> {
        self.publish
            .as_ref()
            .map(|result| publish_summary(result, &self.versions))
            .unwrap_or_default()
    }
}

/// One line of the JSON publish summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishSummaryEntry {
    pub package_name: String,
    pub version: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a release run did.
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    pub changes: ChangeSet,
    pub plan: VersionBumpPlan,
    /// Files written by the release, relative to the workspace root.
    pub written: Vec<String>,
    pub changelogs: Vec<PathBuf>,
    pub commit: Option<String>,
    pub tags: Vec<String>,
    pub pushed: bool,
    pub publish: Option<RunResult>,
    pub dry_run: bool,
}

impl ReleaseReport {
    fn new(changes: ChangeSet, plan: VersionBumpPlan, dry_run: bool) -> Self {
        Self {
            changes,
            plan,
            written: Vec::new(),
            changelogs: Vec::new(),
            commit: None,
            tags: Vec::new(),
            pushed: false,
            publish: None,
            dry_run,
        }
    }

    /// False when any publish unit failed.
    pub fn is_success(&self) -> bool {
        self.publish.as_ref().map(RunResult::is_success).unwrap_or(true)
    }

    pub fn summary(&self) -> Vec<PublishSummaryEntry> {
        let versions = self
            .plan
            .iter()
            .map(|(name, bump)| (name.clone(), bump.next.clone()))
            .collect();
        self.publish
            .as_ref()
            .map(|result| publish_summary(result, &versions))
            .unwrap_or_default()
    }
}

/// Drives a release from change detection to registry publish.
///
/// Failures before the commit leave the working tree as it was. Git
/// failures report the command that failed and do not undo earlier git
/// steps. Publish failures leave earlier publishes in place.
pub struct ReleaseCoordinator {
    root: PathBuf,
    graph: DependencyGraph,
    adapters: AdapterRegistry,
    git: Arc<dyn GitClient>,
    changelog: Box<dyn ChangelogGenerator>,
    registry: Option<Arc<dyn RegistryClient>>,
    reporter: Box<dyn ReleaseReporter>,
    scheduler: Scheduler,
}

impl ReleaseCoordinator {
    pub fn new(
        root: impl Into<PathBuf>,
        graph: DependencyGraph,
        adapters: AdapterRegistry,
        git: Arc<dyn GitClient>,
    ) -> Self {
        Self {
            root: root.into(),
            graph,
            adapters,
            git,
            changelog: Box::new(MarkdownChangelog::default()),
            registry: None,
            reporter: Box::new(SilentReporter),
            scheduler: Scheduler::new(),
        }
    }

    pub fn with_changelog<G>(mut self, generator: G) -> Self
    where
        G: ChangelogGenerator + 'static,
    {
        self.changelog = Box::new(generator);
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_reporter<R>(mut self, reporter: R) -> Self
    where
        R: ReleaseReporter + 'static,
    {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Computes the plan without touching the workspace.
    pub fn plan(&self, options: &ReleaseOptions) -> Result<(ChangeSet, VersionBumpPlan)> {
        let changes = ChangeDetector::detect(
            &self.graph,
            self.git.as_ref(),
            &self.root,
            &options.reference,
            &options.changes,
        )?;
        let plan = VersionBumpEngine::new(options.plan.clone()).plan(&changes, &self.graph, &options.mode)?;
        Ok((changes, plan))
    }

    /// Runs the release.
    ///
    /// # Errors
    ///
    /// Graph, change detection and version errors abort before any write.
    /// Write failures are rolled back. Git failures carry the failed command.
    /// Per-package publish failures are reported in
    /// [`ReleaseReport::publish`], not as an error.
    pub async fn run(&self, options: &ReleaseOptions, cancel: CancellationToken) -> Result<ReleaseReport> {
        if !options.dry_run && options.git.tag_version {
            self.check_branch(&options.git.allow_branch)?;
        }

        let (changes, plan) = self.plan(options)?;
        for (name, bump) in plan.iter() {
            self.reporter
                .report_bump(name, &bump.current, &bump.next, options.dry_run);
        }

        let mut report = ReleaseReport::new(changes, plan, options.dry_run);
        if report.plan.is_empty() {
            info!("no changed packages, nothing to release");
            return Ok(report);
        }

        if options.dry_run {
            info!(packages = report.plan.len(), "dry run, skipping writes and git");
        } else {
            self.write_release(options, &mut report)?;
            if options.git.tag_version {
                self.commit_and_tag(options, &mut report)?;
            }
        }

        if let Some(publish) = &options.publish {
            let versions = report
                .plan
                .iter()
                .map(|(name, bump)| (name.clone(), bump.next.clone()))
                .collect();
            report.publish = self.publish(versions, publish, options.dry_run, cancel).await?;
        }

        Ok(report)
    }

    /// Publishes a release that is already versioned and tagged, skipping
    /// change detection, writes and git.
    ///
    /// Versions come from the tags at `HEAD` or from the manifests. Packages
    /// the registry already has are left out, so a run that failed half way
    /// can be finished by running this again.
    pub async fn publish_existing(
        &self,
        options: &ExistingPublishOptions,
        cancel: CancellationToken,
    ) -> Result<PublishReport> {
        let Some(registry) = &self.registry else {
            warn!("no registry client configured, skipping publish");
            return Ok(PublishReport {
                dry_run: options.dry_run,
                ..PublishReport::default()
            });
        };

        let candidates = match options.source {
            PublishSource::Git => {
                let tags = self.git.tags_at_head()?;
                debug!(?tags, "tags at HEAD");
                versions_from_tags(&self.graph, &tags, &options.tag_prefix)
            }
            PublishSource::Package => self
                .graph
                .packages()
                .map(|package| (package.name.clone(), package.version.clone()))
                .collect(),
        };
        let candidates: BTreeMap<String, Version> = candidates
            .into_iter()
            .filter(|(name, _)| self.graph.package(name).map(|p| !p.private).unwrap_or(false))
            .collect();

        let mut report = PublishReport {
            dry_run: options.dry_run,
            ..PublishReport::default()
        };
        let mut pending = BTreeMap::new();
        for (name, version) in &candidates {
            if registry
                .is_published(name, version, options.publish.registry.as_deref())
                .await
            {
                info!(package = %name, %version, "already published, skipping");
                report.already_published.push(name.clone());
            } else {
                pending.insert(name.clone(), version.clone());
            }
        }
        report.versions = candidates;

        if pending.is_empty() {
            info!("no unpublished packages found");
            return Ok(report);
        }
        for (name, version) in &pending {
            self.reporter.report_step("publish", &format!("{}@{}", name, version));
        }
        report.publish = self
            .publish(pending, &options.publish, options.dry_run, cancel)
            .await?;
        Ok(report)
    }

    fn check_branch(&self, allowed: &[String]) -> Result<()> {
        if allowed.is_empty() {
            return Ok(());
        }
        let branch = self
            .git
            .current_branch()?
            .ok_or_else(|| Error::Release("HEAD is detached, releases must run on a branch".to_string()))?;
        let patterns = allowed
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| {
                    Error::Config(format!("Invalid allow_branch glob '{}': {}", pattern, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let permitted = patterns.iter().any(|pattern| pattern.matches(&branch));
        if !permitted {
            return Err(Error::Release(format!(
                "branch '{}' is not in allow_branch ({})",
                branch,
                allowed.join(", ")
            )));
        }
        Ok(())
    }

    /// Writes manifests, the root lockfile, changelogs and the fixed version
    /// under one lock. Any failure restores every file.
    fn write_release(&self, options: &ReleaseOptions, report: &mut ReleaseReport) -> Result<()> {
        let lock = WorkspaceWriteLock::acquire(&self.root)?;
        let mut transaction = ManifestTransaction::begin(lock);

        match self.write_files(&mut transaction, options, report) {
            Ok(()) => {
                let touched = transaction.commit();
                report.written = touched
                    .iter()
                    .map(|path| relative_location(&self.root, path))
                    .collect();
                debug!(files = report.written.len(), "release files written");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "release write failed, restoring files");
                transaction.rollback()?;
                report.changelogs.clear();
                Err(e)
            }
        }
    }

    fn write_files(
        &self,
        transaction: &mut ManifestTransaction,
        options: &ReleaseOptions,
        report: &mut ReleaseReport,
    ) -> Result<()> {
        for (name, bump) in report.plan.iter() {
            let package = self.package(name)?;
            let adapter = self.adapters.for_kind(package.manifest).ok_or_else(|| {
                Error::Config(format!("no adapter for {} manifests", package.manifest.as_str()))
            })?;
            let update = ManifestUpdate {
                version: Some(bump.next.clone()),
                ranges: bump.range_updates.clone(),
            };
            transaction.snapshot(&package.manifest_path())?;
            adapter.write(package, &update)?;
        }

        if options.update_root_lockfile {
            if let Some(mut lockfile) = RootLockfile::load(&self.root)? {
                if lockfile.apply(&report.plan, &self.graph) {
                    let rendered = lockfile.render()?;
                    let path = lockfile.path().to_path_buf();
                    transaction.write(&path, rendered)?;
                }
            }
        }

        if options.changelog {
            report.changelogs = self.write_changelogs(transaction, &report.changes, &report.plan)?;
        }

        if let Some(version) = &report.plan.fixed_version {
            let path = self.root.join(CONFIG_FILE);
            if path.exists() {
                let content = fs::read_to_string(&path)?;
                transaction.write(&path, config::write_fixed_version(&content, version)?)?;
            }
        }

        Ok(())
    }

    fn write_changelogs(
        &self,
        transaction: &mut ManifestTransaction,
        changes: &ChangeSet,
        plan: &VersionBumpPlan,
    ) -> Result<Vec<PathBuf>> {
        let date = Local::now().date_naive();
        let mut written = Vec::new();
        let mut all_commits: Vec<CommitInfo> = Vec::new();

        for (name, bump) in plan.iter() {
            let package = self.package(name)?;
            let commits = match changes.get(name) {
                Some(changed) if !changed.commits.is_empty() => changed.commits.clone(),
                _ => self
                    .git
                    .commits_since(changes.reference.as_deref(), &package.location)?,
            };
            for commit in &commits {
                if !all_commits.iter().any(|c| c.sha == commit.sha) {
                    all_commits.push(commit.clone());
                }
            }

            let entry = ChangelogEntry {
                package: Some(name.clone()),
                version: bump.next.clone(),
                date,
                commits,
            };
            let path = package.location.join(CHANGELOG_FILE);
            let existing = read_optional(&path)?;
            transaction.write(&path, self.changelog.render(&entry, existing.as_deref()))?;
            written.push(path);
        }

        if let Some(version) = &plan.fixed_version {
            let entry = ChangelogEntry {
                package: None,
                version: version.clone(),
                date,
                commits: all_commits,
            };
            let path = self.root.join(CHANGELOG_FILE);
            let existing = read_optional(&path)?;
            transaction.write(&path, self.changelog.render(&entry, existing.as_deref()))?;
            written.push(path);
        }

        Ok(written)
    }

    fn commit_and_tag(&self, options: &ReleaseOptions, report: &mut ReleaseReport) -> Result<()> {
        let git = &options.git;
        let pathspecs = if git.granular_pathspec {
            report.written.clone()
        } else {
            vec![".".to_string()]
        };
        self.git.add(&pathspecs)?;

        let tags = release_tags(&report.plan, &git.tag_prefix);
        let message = commit_message(&report.plan, git.message.as_deref(), &git.tag_prefix);
        self.git.commit(&message, &git.commit)?;
        self.reporter.report_step("commit", message.lines().next().unwrap_or_default());
        report.commit = Some(message);

        for tag in &tags {
            self.git.tag(tag, tag, &git.tag)?;
            self.reporter.report_step("tag", tag);
            report.tags.push(tag.clone());
        }

        if git.push {
            let branch = self.git.current_branch()?.ok_or_else(|| {
                Error::Release("HEAD is detached, cannot push the release commit".to_string())
            })?;
            self.git.push(&git.remote, &branch)?;
            self.reporter
                .report_step("push", &format!("{} {}", git.remote, branch));
            report.pushed = true;
        }
        Ok(())
    }

    async fn publish(
        &self,
        versions: BTreeMap<String, Version>,
        options: &PublishOptions,
        dry_run: bool,
        cancel: CancellationToken,
    ) -> Result<Option<RunResult>> {
        let Some(registry) = &self.registry else {
            warn!("no registry client configured, skipping publish");
            return Ok(None);
        };

        let names: Vec<String> = versions
            .keys()
            .filter(|name| self.graph.package(name).map(|p| !p.private).unwrap_or(false))
            .cloned()
            .collect();
        if names.is_empty() {
            info!("every planned package is private, nothing to publish");
            return Ok(None);
        }

        let execution = ExecutionPlan::new(&self.graph, names, true)?;
        let unit = RegistryPublish::new(Arc::clone(registry), versions)
            .with_dist_tags(options.dist_tag.clone(), options.pre_dist_tag.clone())
            .with_otp(options.otp.clone())
            .with_registry(options.registry.clone())
            .with_dry_run(dry_run);

        let result = self
            .scheduler
            .run(&execution, Arc::new(unit), &options.policy, cancel)
            .await;
        Ok(Some(result))
    }

    fn package(&self, name: &str) -> Result<&crate::package::Package> {
        self.graph.package(name).ok_or_else(|| {
            crate::error::GraphError::PackageNotFound {
                name: name.to_string(),
                available: self.graph.topological_order().join(", "),
            }
            .into()
        })
    }
}

/// Reads release versions back out of tags.
///
/// `name@version` tags name one package each. A `{prefix}{version}` tag is a
/// fixed release and covers every package whose manifest carries that
/// version. Tags that match neither are ignored.
pub fn versions_from_tags(graph: &DependencyGraph, tags: &[String], prefix: &str) -> BTreeMap<String, Version> {
    let mut versions = BTreeMap::new();
    for tag in tags {
        if let Some(version) = tag.strip_prefix(prefix).and_then(|v| Version::parse(v).ok()) {
            for package in graph.packages().filter(|p| p.version == version) {
                versions.insert(package.name.clone(), version.clone());
            }
            continue;
        }
        let Some((name, version)) = tag.rsplit_once('@') else {
            continue;
        };
        match (graph.package(name), Version::parse(version)) {
            (Some(_), Ok(version)) => {
                versions.insert(name.to_string(), version);
            }
            _ => debug!(%tag, "tag does not name a workspace release"),
        }
    }
    versions
}

/// Per-package publish outcome, in package name order.
pub fn publish_summary(result: &RunResult, versions: &BTreeMap<String, Version>) -> Vec<PublishSummaryEntry> {
    result
        .outcomes
        .iter()
        .map(|(name, status)| PublishSummaryEntry {
            package_name: name.clone(),
            version: versions.get(name).map(Version::to_string).unwrap_or_default(),
            status: status.label().to_string(),
            error: match status {
                PackageStatus::Failed(e) => Some(e.to_string()),
                _ => None,
            },
        })
        .collect()
}

/// Writes the summary as JSON. A `path` not ending in `.json` is a directory
/// that receives [`PUBLISH_SUMMARY_FILE`]. Returns the file written.
pub fn write_publish_summary(path: &Path, entries: &[PublishSummaryEntry]) -> Result<PathBuf> {
    let target = if path.extension().map(|ext| ext == "json").unwrap_or(false) {
        path.to_path_buf()
    } else {
        path.join(PUBLISH_SUMMARY_FILE)
    };
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut content = serde_json::to_string_pretty(entries).map_err(|error| Error::Json {
        error,
        context: target.display().to_string(),
    })?;
    content.push('\n');
    fs::write(&target, content)?;
    debug!(path = %target.display(), entries = entries.len(), "wrote publish summary");
    Ok(target)
}

/// `name@version` per package, or one `{prefix}{version}` tag in fixed mode.
pub fn release_tags(plan: &VersionBumpPlan, prefix: &str) -> Vec<String> {
    match &plan.fixed_version {
        Some(version) => vec![format!("{}{}", prefix, version)],
        None => plan
            .iter()
            .map(|(name, bump)| format!("{}@{}", name, bump.next))
            .collect(),
    }
}

/// Release commit message.
///
/// Fixed mode substitutes `%s` with the tag and `%v` with the version.
/// Independent mode lists every released package under the subject.
pub fn commit_message(plan: &VersionBumpPlan, template: Option<&str>, prefix: &str) -> String {
    match &plan.fixed_version {
        Some(version) => template
            .unwrap_or(DEFAULT_FIXED_MESSAGE)
            .replace("%s", &format!("{}{}", prefix, version))
            .replace("%v", &version.to_string()),
        None => {
            let mut message = template.unwrap_or(DEFAULT_INDEPENDENT_MESSAGE).to_string();
            message.push_str("\n\n");
            for (name, bump) in plan.iter() {
                message.push_str(&format!(" - {}@{}\n", name, bump.next));
            }
            message.trim_end().to_string()
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RangeUpdate;
    use crate::version::{BumpKind, BumpReason, PlannedBump};

    fn bump(current: Version, next: Version) -> PlannedBump {
        PlannedBump {
            current,
            next,
            kind: BumpKind::Minor,
            reason: BumpReason::Requested,
            range_updates: Vec::<RangeUpdate>::new(),
        }
    }

    fn independent_plan() -> VersionBumpPlan {
        let mut plan = VersionBumpPlan::default();
        plan.entries
            .insert("pkg-a".to_string(), bump(Version::new(1, 0, 0), Version::new(1, 1, 0)));
        plan.entries
            .insert("pkg-b".to_string(), bump(Version::new(2, 0, 0), Version::new(2, 0, 1)));
        plan
    }

    #[test]
    fn independent_tags_and_message() {
        let plan = independent_plan();
        assert_eq!(release_tags(&plan, "v"), vec!["pkg-a@1.1.0", "pkg-b@2.0.1"]);
        assert_eq!(
            commit_message(&plan, None, "v"),
            "chore(release): publish\n\n - pkg-a@1.1.0\n - pkg-b@2.0.1"
        );
    }

    #[test]
    fn fixed_message_placeholders() {
        let mut plan = independent_plan();
        plan.fixed_version = Some(Version::new(3, 0, 0));
        assert_eq!(release_tags(&plan, "v"), vec!["v3.0.0"]);
        assert_eq!(commit_message(&plan, None, "v"), "chore(release): v3.0.0");
        assert_eq!(
            commit_message(&plan, Some("release %v (%s)"), "v"),
            "release 3.0.0 (v3.0.0)"
        );
    }
}
