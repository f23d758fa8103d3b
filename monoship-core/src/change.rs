//! Change detection for determining which packages need a release.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, GraphError, Result};
use crate::git::{CommitInfo, GitClient};
use crate::graph::DependencyGraph;
use crate::package::DependencyKind;
use crate::path_utils::PackageLocator;

/// Where change detection starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReferencePoint {
    /// The most recent release tag reachable from `HEAD`.
    #[default]
    LastTag,
    /// Any ref git can resolve.
    Explicit(String),
}

/// A set of package names, or every package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageSelection {
    #[default]
    None,
    All,
    Only(BTreeSet<String>),
}

impl PackageSelection {
    /// Builds a selection from a name list, where `*` selects everything.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            PackageSelection::None
        } else if names.contains("*") {
            PackageSelection::All
        } else {
            PackageSelection::Only(names)
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            PackageSelection::None => false,
            PackageSelection::All => true,
            PackageSelection::Only(names) => names.contains(name),
        }
    }

    /// Names that were selected explicitly, rather than through `*`.
    pub fn explicit(&self) -> Vec<&str> {
        match self {
            PackageSelection::Only(names) => names.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, PackageSelection::None)
    }
}

#[derive(Debug, Clone)]
pub struct ChangeOptions {
    /// Globs, relative to each package, whose changes are ignored.
    pub ignore_changes: Vec<String>,
    pub include_merged_tags: bool,
    pub force_publish: PackageSelection,
    /// Prerelease packages that should graduate are always included.
    pub graduate: PackageSelection,
    pub propagate_dev_dependencies: bool,
    /// Attribute commits since the reference to each changed package.
    pub conventional_commits: bool,
    /// Tag glob used to find the last release, e.g. `v*` or `*@*`.
    pub tag_pattern: String,
    pub include_private: bool,
}

impl Default for ChangeOptions {
    fn default() -> Self {
        Self {
            ignore_changes: Vec::new(),
            include_merged_tags: false,
            force_publish: PackageSelection::None,
            graduate: PackageSelection::None,
            propagate_dev_dependencies: true,
            conventional_commits: false,
            tag_pattern: "v*".to_string(),
            include_private: true,
        }
    }
}

/// Why a package is part of a change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum ChangeReason {
    /// Files inside the package differ from the reference.
    Diff { files: Vec<String> },
    /// A package it depends on changed.
    Propagated { from: String },
    Forced,
    Graduate,
    /// No release tag exists yet.
    NoPriorRelease,
}

impl ChangeReason {
    #[inline]
    pub fn is_propagated(&self) -> bool {
        matches!(self, ChangeReason::Propagated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPackage {
    pub reason: ChangeReason,
    /// Commits since the reference, when commit attribution was requested.
    pub commits: Vec<CommitInfo>,
}

impl ChangedPackage {
    pub fn new(reason: ChangeReason) -> Self {
        Self {
            reason,
            commits: Vec::new(),
        }
    }
}

/// Packages judged changed, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// The resolved reference point, `None` before the first release.
    pub reference: Option<String>,
    pub packages: BTreeMap<String, ChangedPackage>,
}

impl ChangeSet {
    pub fn new(reference: Option<String>) -> Self {
        Self {
            reference,
            packages: BTreeMap::new(),
        }
    }

    /// Inserts a package unless it is already present with another reason.
    pub fn insert(&mut self, name: impl Into<String>, reason: ChangeReason) -> bool {
        let name = name.into();
        if self.packages.contains_key(&name) {
            return false;
        }
        self.packages.insert(name, ChangedPackage::new(reason));
        true
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&ChangedPackage> {
        self.packages.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Detects packages changed since a release reference.
pub struct ChangeDetector;

impl ChangeDetector {
    /// Computes the change set for the workspace rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns a change detection error when an explicit reference cannot be
    /// resolved or git cannot be queried.
    pub fn detect(
        graph: &DependencyGraph,
        git: &dyn GitClient,
        root: &Path,
        reference: &ReferencePoint,
        options: &ChangeOptions,
    ) -> Result<ChangeSet> {
        let resolved = Self::resolve_reference(git, reference, options)?;

        let mut set = ChangeSet::new(resolved.clone());
        match &resolved {
            None => {
                info!("no release tag found, treating every package as changed");
                for package in graph.packages() {
                    set.insert(package.name.clone(), ChangeReason::NoPriorRelease);
                }
            }
            Some(since) => {
                let files = git.changed_files(since)?;
                let locator = PackageLocator::new(root, graph);
                let ignore = compile_globs(&options.ignore_changes)?;
                for (name, files) in Self::group_by_package(&locator, &files, &ignore) {
                    set.insert(name, ChangeReason::Diff { files });
                }
            }
        }

        for package in graph.packages() {
            if options.force_publish.matches(&package.name) {
                set.insert(package.name.clone(), ChangeReason::Forced);
            }
            if options.graduate.matches(&package.name) && !package.version.pre.is_empty() {
                set.insert(package.name.clone(), ChangeReason::Graduate);
            }
        }

        Self::propagate(&mut set, graph, options.propagate_dev_dependencies)?;

        if !options.include_private {
            set.packages
                .retain(|name, _| graph.package(name).map(|p| !p.private).unwrap_or(false));
        }

        if options.conventional_commits {
            for (name, changed) in set.packages.iter_mut() {
                if let Some(package) = graph.package(name) {
                    changed.commits = git.commits_since(resolved.as_deref(), &package.location)?;
                }
            }
        }

        debug!(reference = ?set.reference, changed = set.len(), "change detection complete");
        Ok(set)
    }

    /// The ref changes are measured from, `None` when nothing was released yet.
    pub fn resolve_reference(
        git: &dyn GitClient,
        reference: &ReferencePoint,
        options: &ChangeOptions,
    ) -> Result<Option<String>> {
        match reference {
            ReferencePoint::LastTag => git.last_tag(&options.tag_pattern, options.include_merged_tags),
            ReferencePoint::Explicit(reference) => {
                git.resolve(reference)?;
                Ok(Some(reference.clone()))
            }
        }
    }

    /// Patch of everything that changed since the reference, limited to
    /// `package` when given.
    pub fn diff(
        graph: &DependencyGraph,
        git: &dyn GitClient,
        reference: &ReferencePoint,
        package: Option<&str>,
        options: &ChangeOptions,
    ) -> Result<String> {
        let paths = match package {
            Some(name) => {
                let package = graph.package(name).ok_or_else(|| GraphError::PackageNotFound {
                    name: name.to_string(),
                    available: graph.topological_order().join(", "),
                })?;
                vec![package.location.clone()]
            }
            None => graph.packages().map(|p| p.location.clone()).collect(),
        };
        let since = Self::resolve_reference(git, reference, options)?;
        debug!(?since, paths = paths.len(), "diffing");
        git.diff(since.as_deref(), &paths)
    }

    /// Adds every transitive dependent of a changed package.
    ///
    /// Iterates until no package is added, so running it again on its own
    /// output is a no-op. Dev-only edges are skipped unless
    /// `propagate_dev_dependencies` is set.
    pub fn propagate(
        set: &mut ChangeSet,
        graph: &DependencyGraph,
        propagate_dev_dependencies: bool,
    ) -> Result<()> {
        loop {
            let mut additions: BTreeMap<String, String> = BTreeMap::new();
            for name in set.packages.keys() {
                for dependent in graph.dependents_of(name)? {
                    if set.contains(&dependent) || additions.contains_key(&dependent) {
                        continue;
                    }
                    let dev_only = graph.edge_kind(&dependent, name) == Some(DependencyKind::Dev);
                    if dev_only && !propagate_dev_dependencies {
                        continue;
                    }
                    additions.insert(dependent, name.clone());
                }
            }

            if additions.is_empty() {
                return Ok(());
            }
            for (dependent, from) in additions {
                set.insert(dependent, ChangeReason::Propagated { from });
            }
        }
    }

    /// Maps raw file paths to the names of the packages that own them.
    pub fn packages_for_paths(
        graph: &DependencyGraph,
        root: &Path,
        paths: &[PathBuf],
    ) -> BTreeSet<String> {
        let locator = PackageLocator::new(root, graph);
        paths
            .iter()
            .filter_map(|p| locator.package_for(p).map(str::to_string))
            .collect()
    }

    fn group_by_package(
        locator: &PackageLocator,
        files: &[PathBuf],
        ignore: &[Pattern],
    ) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in files {
            let Some((name, relative)) = locator.locate(file) else {
                continue;
            };
            if is_ignored(&relative, ignore) {
                debug!(package = name, file = %relative, "ignoring change");
                continue;
            }
            grouped.entry(name.to_string()).or_default().push(relative);
        }
        grouped
    }
}

pub(crate) fn compile_globs(globs: &[String]) -> Result<Vec<Pattern>> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(g).map_err(|e| Error::Config(format!("Invalid ignore glob '{}': {}", g, e)))
        })
        .collect()
}

/// Globs without a `/` also match the file name alone.
pub(crate) fn is_ignored(relative: &str, ignore: &[Pattern]) -> bool {
    let options = MatchOptions {
        require_literal_separator: false,
        ..MatchOptions::new()
    };
    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    ignore.iter().any(|pattern| {
        pattern.matches_with(relative, options)
            || (!pattern.as_str().contains('/') && pattern.matches_with(file_name, options))
    })
}
