#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use monoship_core::error::{ChangeDetectionError, Error, GitCommandError, PublishError, Result};
use monoship_core::git::{CommitInfo, CommitOptions, GitClient, TagOptions};
use monoship_core::{
    Dependency, DependencyGraph, DependencyKind, GraphOptions, ManifestAdapter, ManifestKind,
    ManifestUpdate, Package, PublishRequest, PublishResponse, RegistryClient,
};
use semver::Version;
use serde_json::{json, Map, Value};

pub const ROOT: &str = "/workspace";

pub fn package(name: &str, version: &str, deps: &[(&str, &str)]) -> Package {
    let location = format!("packages/{}", name);
    let mut package = Package::new(
        name,
        Version::parse(version).unwrap(),
        Path::new(ROOT).join(&location),
        location,
        ManifestKind::Npm,
    );
    for (dep, range) in deps {
        package = package.with_dependency(Dependency::new(*dep, *range, DependencyKind::Normal));
    }
    package
}

pub fn dev_package(name: &str, version: &str, dev_deps: &[(&str, &str)]) -> Package {
    let mut package = package(name, version, &[]);
    for (dep, range) in dev_deps {
        package = package.with_dependency(Dependency::new(*dep, *range, DependencyKind::Dev));
    }
    package
}

pub fn graph(packages: Vec<Package>) -> DependencyGraph {
    DependencyGraph::build(packages, GraphOptions::default()).unwrap()
}

/// pkg-a <- pkg-b <- pkg-c, all at 1.0.0 with caret ranges.
pub fn chain() -> DependencyGraph {
    graph(vec![
        package("pkg-a", "1.0.0", &[]),
        package("pkg-b", "1.0.0", &[("pkg-a", "^1.0.0")]),
        package("pkg-c", "1.0.0", &[("pkg-b", "^1.0.0")]),
    ])
}

pub fn file(package: &str, path: &str) -> PathBuf {
    Path::new(ROOT).join("packages").join(package).join(path)
}

/// In-memory [`GitClient`] that records every write.
#[derive(Default)]
pub struct FakeGit {
    pub last_tag: Option<String>,
    pub refs: BTreeSet<String>,
    pub changed: Vec<PathBuf>,
    pub commits: BTreeMap<PathBuf, Vec<CommitInfo>>,
    pub branch: Option<String>,
    pub fail_on: Option<&'static str>,
    pub head_tags: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            branch: Some("main".to_string()),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.last_tag = Some(tag.to_string());
        self.refs.insert(tag.to_string());
        self
    }

    pub fn with_changed(mut self, paths: Vec<PathBuf>) -> Self {
        self.changed = paths;
        self
    }

    pub fn with_commits(mut self, location: impl Into<PathBuf>, commits: Vec<CommitInfo>) -> Self {
        self.commits.insert(location.into(), commits);
        self
    }

    /// Tags already pointing at `HEAD`, as left behind by an earlier release.
    pub fn with_head_tags(mut self, tags: &[&str]) -> Self {
        self.head_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, call: String) -> std::result::Result<(), GitCommandError> {
        if self.fail_on == Some(operation) {
            return Err(GitCommandError {
                command: format!("git {}", call),
                stderr: "fatal: simulated failure".to_string(),
            });
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl GitClient for FakeGit {
    fn head_sha(&self) -> Result<String> {
        Ok("0000000".to_string())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        Ok(self.branch.clone())
    }

    fn last_tag(&self, _pattern: &str, _include_merged: bool) -> Result<Option<String>> {
        Ok(self.last_tag.clone())
    }

    fn resolve(&self, reference: &str) -> Result<String> {
        if self.refs.contains(reference) {
            Ok(format!("sha-{}", reference))
        } else {
            Err(Error::ChangeDetection(ChangeDetectionError::UnresolvedReference {
                reference: reference.to_string(),
                message: "unknown revision".to_string(),
            }))
        }
    }

    fn changed_files(&self, _since: &str) -> Result<Vec<PathBuf>> {
        Ok(self.changed.clone())
    }

    fn commits_since(&self, _since: Option<&str>, location: &Path) -> Result<Vec<CommitInfo>> {
        Ok(self.commits.get(location).cloned().unwrap_or_default())
    }

    fn tags_at_head(&self) -> Result<Vec<String>> {
        let mut tags: Vec<String> = self
            .calls()
            .iter()
            .filter_map(|call| call.strip_prefix("tag ").map(str::to_string))
            .chain(self.head_tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }

    fn diff(&self, since: Option<&str>, paths: &[PathBuf]) -> Result<String> {
        let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        Ok(format!("diff {} -- {}\n", since.unwrap_or("(root)"), paths.join(" ")))
    }

    fn add(&self, pathspecs: &[String]) -> std::result::Result<(), GitCommandError> {
        self.record("add", format!("add {}", pathspecs.join(" ")))
    }

    fn commit(&self, message: &str, _options: &CommitOptions) -> std::result::Result<(), GitCommandError> {
        let subject = message.lines().next().unwrap_or_default();
        self.record("commit", format!("commit {}", subject))
    }

    fn tag(&self, name: &str, _message: &str, _options: &TagOptions) -> std::result::Result<(), GitCommandError> {
        self.record("tag", format!("tag {}", name))
    }

    fn push(&self, remote: &str, branch: &str) -> std::result::Result<(), GitCommandError> {
        self.record("push", format!("push {} {}", remote, branch))
    }
}

/// Registry that accepts everything except the packages it is told to reject.
#[derive(Default)]
pub struct FakeRegistry {
    pub reject: BTreeSet<String>,
    pub needs_otp: bool,
    /// `name@version` entries the registry already holds.
    pub existing: BTreeSet<String>,
    pub published: Mutex<Vec<(String, String, String)>>,
}

impl FakeRegistry {
    pub fn rejecting(name: &str) -> Self {
        Self {
            reject: [name.to_string()].into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn requiring_otp() -> Self {
        Self {
            needs_otp: true,
            ..Self::default()
        }
    }

    pub fn holding(mut self, package: &str, version: &str) -> Self {
        self.existing.insert(format!("{}@{}", package, version));
        self
    }

    pub fn published(&self) -> Vec<(String, String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn publish(&self, request: PublishRequest) -> std::result::Result<PublishResponse, PublishError> {
        if self.reject.contains(&request.package) {
            return Err(PublishError::Rejected {
                package: request.package,
                version: request.version.to_string(),
                message: "403 Forbidden".to_string(),
            });
        }
        if self.needs_otp && request.otp.is_none() {
            return Ok(PublishResponse::OtpRequired);
        }
        self.published.lock().unwrap().push((
            request.package,
            request.version.to_string(),
            request.dist_tag,
        ));
        Ok(PublishResponse::Published)
    }

    async fn is_published(&self, package: &str, version: &Version, _registry: Option<&str>) -> bool {
        let id = format!("{}@{}", package, version);
        let version = version.to_string();
        self.existing.contains(&id)
            || self
                .published()
                .iter()
                .any(|(name, published, _)| name == package && *published == version)
    }
}

/// Minimal `package.json` adapter for tests that write to disk.
#[derive(Default)]
pub struct JsonAdapter {
    pub fail_for: Option<String>,
}

impl ManifestAdapter for JsonAdapter {
    fn kind(&self) -> ManifestKind {
        ManifestKind::Npm
    }

    fn detect(&self, dir: &Path) -> bool {
        dir.join("package.json").is_file()
    }

    fn read(&self, dir: &Path, root: &Path) -> Result<Package> {
        let content = fs::read_to_string(dir.join("package.json"))?;
        let manifest: Value = serde_json::from_str(&content)?;
        let name = manifest["name"].as_str().unwrap_or_default();
        let version = Version::parse(manifest["version"].as_str().unwrap_or("0.0.0")).map_err(|e| {
            Error::Manifest {
                path: dir.join("package.json"),
                message: e.to_string(),
            }
        })?;
        let relative = monoship_core::scanner::relative_location(root, dir);
        let mut package = Package::new(name, version, dir, relative, ManifestKind::Npm)
            .with_private(manifest["private"].as_bool().unwrap_or(false));
        if let Some(deps) = manifest["dependencies"].as_object() {
            for (dep, range) in deps {
                package = package.with_dependency(Dependency::new(
                    dep.clone(),
                    range.as_str().unwrap_or("*"),
                    DependencyKind::Normal,
                ));
            }
        }
        Ok(package)
    }

    fn write(&self, package: &Package, update: &ManifestUpdate) -> Result<()> {
        if self.fail_for.as_deref() == Some(package.name.as_str()) {
            return Err(Error::Manifest {
                path: package.manifest_path(),
                message: "simulated write failure".to_string(),
            });
        }
        let path = package.manifest_path();
        let mut manifest: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if let Some(version) = &update.version {
            manifest["version"] = json!(version.to_string());
        }
        for range in &update.ranges {
            if let Some(deps) = manifest[range.kind.npm_field()].as_object_mut() {
                deps.insert(range.name.clone(), json!(range.range));
            }
        }
        let mut out = serde_json::to_string_pretty(&manifest)?;
        out.push('\n');
        fs::write(&path, out)?;
        Ok(())
    }
}

/// Writes `packages/<name>/package.json` under `root`.
pub fn write_manifest(root: &Path, name: &str, version: &str, deps: &[(&str, &str)]) {
    let dir = root.join("packages").join(name);
    fs::create_dir_all(&dir).unwrap();
    let mut dependencies = Map::new();
    for (dep, range) in deps {
        dependencies.insert(dep.to_string(), json!(range));
    }
    let manifest = json!({
        "name": name,
        "version": version,
        "dependencies": dependencies,
    });
    fs::write(
        dir.join("package.json"),
        format!("{}\n", serde_json::to_string_pretty(&manifest).unwrap()),
    )
    .unwrap();
}

pub fn read_manifest(root: &Path, name: &str) -> Value {
    let content = fs::read_to_string(root.join("packages").join(name).join("package.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}
