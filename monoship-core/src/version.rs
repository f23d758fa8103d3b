//! Version bump planning.
//!
//! The engine turns a [`ChangeSet`] into a [`VersionBumpPlan`]: one next
//! version per package, plus the dependency range rewrites that keep every
//! in-workspace dependent pointing at the new versions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::RangeUpdate;
use crate::change::{ChangeReason, ChangeSet, ChangedPackage, PackageSelection};
use crate::conventional::{recommend, CommitImpact};
use crate::error::VersionError;
use crate::graph::DependencyGraph;
use crate::package::{DependencyKind, Package};
use crate::range::VersionRange;

const DEFAULT_PREID: &str = "alpha";

/// How a version moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
    PreMajor,
    PreMinor,
    PrePatch,
    Prerelease,
    Exact(Version),
}

impl BumpKind {
    /// The prerelease flavour of a release bump.
    pub fn to_prerelease(&self) -> BumpKind {
        match self {
            BumpKind::Major => BumpKind::PreMajor,
            BumpKind::Minor => BumpKind::PreMinor,
            BumpKind::Patch => BumpKind::PrePatch,
            other => other.clone(),
        }
    }

    #[inline]
    pub fn is_prerelease(&self) -> bool {
        matches!(
            self,
            BumpKind::PreMajor | BumpKind::PreMinor | BumpKind::PrePatch | BumpKind::Prerelease
        )
    }

    fn from_impact(impact: CommitImpact) -> Self {
        match impact {
            CommitImpact::Major => BumpKind::Major,
            CommitImpact::Minor => BumpKind::Minor,
            CommitImpact::Patch => BumpKind::Patch,
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BumpKind::Major => write!(f, "major"),
            BumpKind::Minor => write!(f, "minor"),
            BumpKind::Patch => write!(f, "patch"),
            BumpKind::PreMajor => write!(f, "premajor"),
            BumpKind::PreMinor => write!(f, "preminor"),
            BumpKind::PrePatch => write!(f, "prepatch"),
            BumpKind::Prerelease => write!(f, "prerelease"),
            BumpKind::Exact(version) => write!(f, "{version}"),
        }
    }
}

impl FromStr for BumpKind {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(BumpKind::Major),
            "minor" => Ok(BumpKind::Minor),
            "patch" => Ok(BumpKind::Patch),
            "premajor" => Ok(BumpKind::PreMajor),
            "preminor" => Ok(BumpKind::PreMinor),
            "prepatch" => Ok(BumpKind::PrePatch),
            "prerelease" => Ok(BumpKind::Prerelease),
            other => {
                let raw = other.strip_prefix('v').unwrap_or(other);
                Version::parse(raw).map(BumpKind::Exact).map_err(|_| {
                    VersionError::InvalidManualBump(format!(
                        "'{}' is neither a bump keyword nor a semantic version",
                        s
                    ))
                })
            }
        }
    }
}

/// Identifier policy for prerelease versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrereleasePolicy {
    /// Explicit identifier; otherwise the current one is kept, or `alpha`.
    pub preid: Option<String>,
    /// First numeric suffix of a new prerelease line.
    pub seed: u64,
}

impl PrereleasePolicy {
    fn identifier(&self, current: &Version) -> String {
        if let Some(preid) = &self.preid {
            return preid.clone();
        }
        current
            .pre
            .as_str()
            .split('.')
            .next()
            .filter(|id| !id.is_empty() && id.parse::<u64>().is_err())
            .unwrap_or(DEFAULT_PREID)
            .to_string()
    }

    fn seeded(&self, identifier: &str) -> Result<Prerelease, VersionError> {
        prerelease(&format!("{}.{}", identifier, self.seed))
    }
}

fn prerelease(raw: &str) -> Result<Prerelease, VersionError> {
    Prerelease::new(raw).map_err(|e| {
        VersionError::InvalidManualBump(format!("invalid prerelease identifier '{}': {}", raw, e))
    })
}

/// Computes the next version, following npm's increment rules.
///
/// Release bumps on a prerelease land on its release line first, so
/// `1.0.0-alpha.3` with `major` becomes `1.0.0` and `1.2.0-rc.0` with
/// `minor` becomes `1.2.0`. Build metadata is dropped.
pub fn increment(
    current: &Version,
    kind: &BumpKind,
    policy: &PrereleasePolicy,
) -> Result<Version, VersionError> {
    let released = current.pre.is_empty();
    let mut next = Version::new(current.major, current.minor, current.patch);

    match kind {
        BumpKind::Major => {
            if current.minor != 0 || current.patch != 0 || released {
                next.major += 1;
            }
            next.minor = 0;
            next.patch = 0;
        }
        BumpKind::Minor => {
            if current.patch != 0 || released {
                next.minor += 1;
            }
            next.patch = 0;
        }
        BumpKind::Patch => {
            if released {
                next.patch += 1;
            }
        }
        BumpKind::PreMajor => {
            next = Version::new(current.major + 1, 0, 0);
            next.pre = policy.seeded(&policy.identifier(current))?;
        }
        BumpKind::PreMinor => {
            next = Version::new(current.major, current.minor + 1, 0);
            next.pre = policy.seeded(&policy.identifier(current))?;
        }
        BumpKind::PrePatch => {
            next.patch += 1;
            next.pre = policy.seeded(&policy.identifier(current))?;
        }
        BumpKind::Prerelease => {
            if released {
                next.patch += 1;
                next.pre = policy.seeded(&policy.identifier(current))?;
            } else {
                next.pre = next_prerelease(&current.pre, policy)?;
            }
        }
        BumpKind::Exact(version) => return Ok(version.clone()),
    }

    next.build = BuildMetadata::EMPTY;
    Ok(next)
}

fn next_prerelease(current: &Prerelease, policy: &PrereleasePolicy) -> Result<Prerelease, VersionError> {
    let mut identifiers: Vec<String> = current.as_str().split('.').map(str::to_string).collect();

    if let Some(preid) = &policy.preid {
        if identifiers.first() != Some(preid) {
            return policy.seeded(preid);
        }
    }

    match identifiers.iter().rposition(|id| id.parse::<u64>().is_ok()) {
        Some(idx) => {
            let value: u64 = identifiers[idx].parse().unwrap_or(0);
            identifiers[idx] = (value + 1).to_string();
        }
        None => identifiers.push(policy.seed.to_string()),
    }
    prerelease(&identifiers.join("."))
}

/// Which side wins when a graduating package also has commits to classify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraduatePrecedence {
    /// Move to the release line of the prerelease, ignoring commit content.
    #[default]
    Graduate,
    /// Apply the commit-derived bump to the prerelease.
    Conventional,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConventionalOptions {
    pub prerelease: PackageSelection,
    pub graduate: PackageSelection,
    /// Use the commit-derived `pre*` bump even for packages already in prerelease.
    pub bump_prerelease: bool,
    pub precedence: GraduatePrecedence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualBump {
    /// The same bump for every changed package.
    Uniform(BumpKind),
    /// One bump per package, independent mode only.
    PerPackage(BTreeMap<String, BumpKind>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionMode {
    Manual(ManualBump),
    Conventional(ConventionalOptions),
}

/// Whether packages share one version line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Versioning {
    /// Every released package moves to one version derived from this one.
    Fixed(Version),
    Independent,
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub versioning: Versioning,
    pub prerelease: PrereleasePolicy,
    /// Rewrite ranges as exact versions instead of keeping their operator.
    pub exact: bool,
    pub allow_peer_dependencies_update: bool,
    /// Private packages may be pulled in by range propagation.
    pub include_private: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            versioning: Versioning::Independent,
            prerelease: PrereleasePolicy::default(),
            exact: false,
            allow_peer_dependencies_update: false,
            include_private: true,
        }
    }
}

/// Why a package is in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum BumpReason {
    Requested,
    Commits,
    Graduate,
    Propagated { from: String },
    /// Added because its range on `dependency` no longer admitted the new version.
    DependencyRange { dependency: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBump {
    pub current: Version,
    pub next: Version,
    pub kind: BumpKind,
    pub reason: BumpReason,
    /// Dependency declarations in this package's manifest to rewrite.
    pub range_updates: Vec<RangeUpdate>,
}

impl PlannedBump {
    #[inline]
    pub fn is_prerelease(&self) -> bool {
        !self.next.pre.is_empty()
    }
}

/// Next versions for every package that will be released.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionBumpPlan {
    pub entries: BTreeMap<String, PlannedBump>,
    /// The shared next version in fixed mode.
    pub fixed_version: Option<Version>,
}

impl VersionBumpPlan {
    #[inline]
    pub fn get(&self, name: &str) -> Option<&PlannedBump> {
        self.entries.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PlannedBump)> {
        self.entries.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Plans version bumps for a change set.
#[derive(Debug, Clone, Default)]
pub struct VersionBumpEngine {
    options: PlanOptions,
}

impl VersionBumpEngine {
    pub fn new(options: PlanOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    /// Builds the plan, then propagates range updates until nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidManualBump`] for per-package bumps in
    /// fixed mode or missing per-package bumps, and
    /// [`VersionError::AmbiguousGraduate`] when a graduate request has no
    /// prerelease to graduate from.
    pub fn plan(
        &self,
        change_set: &ChangeSet,
        graph: &DependencyGraph,
        mode: &VersionMode,
    ) -> Result<VersionBumpPlan, VersionError> {
        if let VersionMode::Conventional(options) = mode {
            check_graduate(options, graph)?;
        }

        let mut plan = match &self.options.versioning {
            Versioning::Independent => self.plan_independent(change_set, graph, mode)?,
            Versioning::Fixed(current) => self.plan_fixed(current, change_set, graph, mode)?,
        };

        self.propagate_ranges(&mut plan, graph)?;
        self.collect_range_updates(&mut plan, graph)?;

        debug!(packages = plan.len(), "version plan ready");
        Ok(plan)
    }

    fn plan_independent(
        &self,
        change_set: &ChangeSet,
        graph: &DependencyGraph,
        mode: &VersionMode,
    ) -> Result<VersionBumpPlan, VersionError> {
        if let VersionMode::Manual(ManualBump::PerPackage(bumps)) = mode {
            let missing: Vec<&str> = change_set
                .packages
                .keys()
                .filter(|name| !bumps.contains_key(*name))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(VersionError::InvalidManualBump(format!(
                    "no bump given for {}",
                    missing.join(", ")
                )));
            }
        }

        let mut plan = VersionBumpPlan::default();
        for (name, changed) in &change_set.packages {
            let Some(package) = graph.package(name) else {
                continue;
            };
            let (kind, reason) = match mode {
                VersionMode::Manual(ManualBump::Uniform(kind)) => {
                    (kind.clone(), requested_reason(changed))
                }
                VersionMode::Manual(ManualBump::PerPackage(bumps)) => {
                    let kind = bumps.get(name).cloned().unwrap_or(BumpKind::Patch);
                    (kind, requested_reason(changed))
                }
                VersionMode::Conventional(options) => conventional_kind(package, changed, options),
            };
            let next = increment(&package.version, &kind, &self.options.prerelease)?;
            plan.entries.insert(
                name.clone(),
                PlannedBump {
                    current: package.version.clone(),
                    next,
                    kind,
                    reason,
                    range_updates: Vec::new(),
                },
            );
        }
        Ok(plan)
    }

    fn plan_fixed(
        &self,
        current: &Version,
        change_set: &ChangeSet,
        graph: &DependencyGraph,
        mode: &VersionMode,
    ) -> Result<VersionBumpPlan, VersionError> {
        let kind = match mode {
            VersionMode::Manual(ManualBump::Uniform(kind)) => kind.clone(),
            VersionMode::Manual(ManualBump::PerPackage(_)) => {
                return Err(VersionError::InvalidManualBump(
                    "per-package bumps require independent versioning".to_string(),
                ))
            }
            VersionMode::Conventional(options) => {
                fixed_conventional_kind(current, change_set, options)
            }
        };
        let next = increment(current, &kind, &self.options.prerelease)?;

        let mut plan = VersionBumpPlan {
            entries: BTreeMap::new(),
            fixed_version: Some(next.clone()),
        };
        for (name, changed) in &change_set.packages {
            let Some(package) = graph.package(name) else {
                continue;
            };
            let reason = match mode {
                VersionMode::Conventional(options)
                    if options.graduate.matches(name) && !package.version.pre.is_empty() =>
                {
                    BumpReason::Graduate
                }
                VersionMode::Conventional(_) if !changed.reason.is_propagated() => BumpReason::Commits,
                _ => requested_reason(changed),
            };
            plan.entries.insert(
                name.clone(),
                PlannedBump {
                    current: package.version.clone(),
                    next: next.clone(),
                    kind: kind.clone(),
                    reason,
                    range_updates: Vec::new(),
                },
            );
        }
        Ok(plan)
    }

    /// Pulls in dependents whose declared range stops admitting a planned
    /// version, repeating until a pass adds nothing.
    fn propagate_ranges(
        &self,
        plan: &mut VersionBumpPlan,
        graph: &DependencyGraph,
    ) -> Result<(), VersionError> {
        loop {
            let mut additions: BTreeMap<String, String> = BTreeMap::new();

            for package in graph.packages() {
                if plan.contains(&package.name) || additions.contains_key(&package.name) {
                    continue;
                }
                if package.private && !self.options.include_private {
                    continue;
                }
                for dep in &package.dependencies {
                    let Some(target) = plan.get(&dep.name) else {
                        continue;
                    };
                    if !graph.resolves_locally(package, dep) {
                        continue;
                    }
                    let range = VersionRange::parse(&dep.range, package.manifest)?;
                    if !self.tracks(dep.kind, &range) || range.satisfies(&target.next) {
                        continue;
                    }
                    additions.insert(package.name.clone(), dep.name.clone());
                    break;
                }
            }

            if additions.is_empty() {
                return Ok(());
            }

            for (name, dependency) in additions {
                let Some(package) = graph.package(&name) else {
                    continue;
                };
                let next = match &plan.fixed_version {
                    Some(version) => version.clone(),
                    None => increment(&package.version, &BumpKind::Patch, &self.options.prerelease)?,
                };
                debug!(package = %name, dependency = %dependency, next = %next, "dependency range forces a bump");
                plan.entries.insert(
                    name,
                    PlannedBump {
                        current: package.version.clone(),
                        next,
                        kind: BumpKind::Patch,
                        reason: BumpReason::DependencyRange { dependency },
                        range_updates: Vec::new(),
                    },
                );
            }
        }
    }

    /// Rewrites every planned package's ranges on other planned packages.
    fn collect_range_updates(
        &self,
        plan: &mut VersionBumpPlan,
        graph: &DependencyGraph,
    ) -> Result<(), VersionError> {
        let next_versions: BTreeMap<String, Version> = plan
            .entries
            .iter()
            .map(|(name, bump)| (name.clone(), bump.next.clone()))
            .collect();

        for (name, bump) in plan.entries.iter_mut() {
            let Some(package) = graph.package(name) else {
                continue;
            };
            for dep in &package.dependencies {
                let Some(next) = next_versions.get(&dep.name) else {
                    continue;
                };
                if !graph.resolves_locally(package, dep) {
                    continue;
                }
                let range = VersionRange::parse(&dep.range, package.manifest)?;
                if !self.tracks(dep.kind, &range) {
                    continue;
                }
                match range.rewrite(next, self.options.exact) {
                    Some(rewritten) if rewritten != dep.range => {
                        bump.range_updates.push(RangeUpdate {
                            name: dep.name.clone(),
                            kind: dep.kind,
                            range: rewritten,
                        });
                    }
                    Some(_) => {}
                    None if !range.satisfies(next) => {
                        warn!(
                            package = %name,
                            dependency = %dep.name,
                            range = %dep.range,
                            version = %next,
                            "range cannot be rewritten and no longer matches"
                        );
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    /// Peer ranges are left alone unless explicitly allowed, and never
    /// rewritten when they are comparator ranges.
    fn tracks(&self, kind: DependencyKind, range: &VersionRange) -> bool {
        kind != DependencyKind::Peer
            || (self.options.allow_peer_dependencies_update && !range.is_complex())
    }
}

fn requested_reason(changed: &ChangedPackage) -> BumpReason {
    match &changed.reason {
        ChangeReason::Propagated { from } => BumpReason::Propagated { from: from.clone() },
        ChangeReason::Graduate => BumpReason::Graduate,
        _ => BumpReason::Requested,
    }
}

/// Commit-derived bump, with major demoted to minor during 0.x development.
fn impact_kind(current: &Version, commits: &[crate::git::CommitInfo]) -> BumpKind {
    let impact = recommend(commits).unwrap_or(CommitImpact::Patch);
    if impact == CommitImpact::Major && current.major == 0 {
        BumpKind::Minor
    } else {
        BumpKind::from_impact(impact)
    }
}

fn conventional_kind(
    package: &Package,
    changed: &ChangedPackage,
    options: &ConventionalOptions,
) -> (BumpKind, BumpReason) {
    let in_prerelease = !package.version.pre.is_empty();
    let reason = match &changed.reason {
        ChangeReason::Propagated { from } if changed.commits.is_empty() => {
            BumpReason::Propagated { from: from.clone() }
        }
        _ => BumpReason::Commits,
    };
    let kind = impact_kind(&package.version, &changed.commits);

    if in_prerelease && options.graduate.matches(&package.name) {
        return match options.precedence {
            GraduatePrecedence::Graduate => (BumpKind::Patch, BumpReason::Graduate),
            GraduatePrecedence::Conventional => (kind, BumpReason::Graduate),
        };
    }

    if options.prerelease.matches(&package.name) {
        let kind = if in_prerelease && !options.bump_prerelease {
            BumpKind::Prerelease
        } else {
            kind.to_prerelease()
        };
        return (kind, reason);
    }

    (kind, reason)
}

fn fixed_conventional_kind(
    current: &Version,
    change_set: &ChangeSet,
    options: &ConventionalOptions,
) -> BumpKind {
    let commits: Vec<crate::git::CommitInfo> = change_set
        .packages
        .values()
        .flat_map(|changed| changed.commits.iter().cloned())
        .collect();
    let kind = impact_kind(current, &commits);
    let in_prerelease = !current.pre.is_empty();
    let any = |selection: &PackageSelection| {
        change_set.packages.keys().any(|name| selection.matches(name))
    };

    if in_prerelease && any(&options.graduate) {
        return match options.precedence {
            GraduatePrecedence::Graduate => BumpKind::Patch,
            GraduatePrecedence::Conventional => kind,
        };
    }
    if any(&options.prerelease) {
        if in_prerelease && !options.bump_prerelease {
            return BumpKind::Prerelease;
        }
        return kind.to_prerelease();
    }
    kind
}

/// Explicitly named graduate packages must be prereleases and must not
/// also be asked to stay in prerelease.
fn check_graduate(options: &ConventionalOptions, graph: &DependencyGraph) -> Result<(), VersionError> {
    let named: BTreeSet<&str> = options.graduate.explicit().into_iter().collect();
    for name in named {
        let Some(package) = graph.package(name) else {
            return Err(VersionError::AmbiguousGraduate {
                package: name.to_string(),
                message: "not a workspace package".to_string(),
            });
        };
        if package.version.pre.is_empty() {
            return Err(VersionError::AmbiguousGraduate {
                package: name.to_string(),
                message: format!("version {} is not a prerelease", package.version),
            });
        }
        if options.prerelease.matches(name) {
            return Err(VersionError::AmbiguousGraduate {
                package: name.to_string(),
                message: "also selected for conventional prerelease".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> Version {
        Version::parse(raw).unwrap()
    }

    fn inc(current: &str, kind: BumpKind) -> String {
        increment(&v(current), &kind, &PrereleasePolicy::default())
            .unwrap()
            .to_string()
    }

    #[test]
    fn release_bumps() {
        assert_eq!(inc("1.2.3", BumpKind::Major), "2.0.0");
        assert_eq!(inc("1.2.3", BumpKind::Minor), "1.3.0");
        assert_eq!(inc("1.2.3", BumpKind::Patch), "1.2.4");
    }

    #[test]
    fn release_bumps_graduate_prereleases_onto_their_line() {
        assert_eq!(inc("2.0.0-alpha.3", BumpKind::Major), "2.0.0");
        assert_eq!(inc("1.3.0-rc.1", BumpKind::Minor), "1.3.0");
        assert_eq!(inc("1.2.4-beta.0", BumpKind::Patch), "1.2.4");
        assert_eq!(inc("1.2.4-beta.0", BumpKind::Minor), "1.3.0");
    }

    #[test]
    fn pre_bumps_seed_identifier() {
        assert_eq!(inc("1.2.3", BumpKind::PreMajor), "2.0.0-alpha.0");
        assert_eq!(inc("1.2.3", BumpKind::PreMinor), "1.3.0-alpha.0");
        assert_eq!(inc("1.2.3", BumpKind::PrePatch), "1.2.4-alpha.0");
        assert_eq!(inc("1.2.3", BumpKind::Prerelease), "1.2.4-alpha.0");
    }

    #[test]
    fn prerelease_increments_trailing_number() {
        assert_eq!(inc("1.0.0-beta.4", BumpKind::Prerelease), "1.0.0-beta.5");
        assert_eq!(inc("1.0.0-beta", BumpKind::Prerelease), "1.0.0-beta.0");
    }

    #[test]
    fn explicit_preid_restarts_the_line() {
        let policy = PrereleasePolicy {
            preid: Some("rc".to_string()),
            seed: 1,
        };
        let next = increment(&v("1.0.0-beta.4"), &BumpKind::Prerelease, &policy).unwrap();
        assert_eq!(next.to_string(), "1.0.0-rc.1");
        let next = increment(&v("1.0.0-rc.1"), &BumpKind::Prerelease, &policy).unwrap();
        assert_eq!(next.to_string(), "1.0.0-rc.2");
    }

    #[test]
    fn build_metadata_is_dropped() {
        assert_eq!(inc("1.0.0+build.5", BumpKind::Patch), "1.0.1");
    }

    #[test]
    fn parses_keywords_and_versions() {
        assert_eq!("minor".parse::<BumpKind>().unwrap(), BumpKind::Minor);
        assert_eq!(
            "v3.1.0".parse::<BumpKind>().unwrap(),
            BumpKind::Exact(v("3.1.0"))
        );
        assert!("sideways".parse::<BumpKind>().is_err());
    }
}
