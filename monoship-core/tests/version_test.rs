mod common;

use std::collections::BTreeMap;
use std::path::Path;

use common::{chain, file, package, FakeGit, ROOT};
use monoship_core::change::ChangeOptions;
use monoship_core::version::{
    BumpReason, ConventionalOptions, GraduatePrecedence, PlanOptions, PrereleasePolicy,
};
use monoship_core::{
    BumpKind, ChangeDetector, ChangeReason, ChangeSet, CommitInfo, Dependency, DependencyKind,
    ManualBump, PackageSelection, RangeUpdate, ReferencePoint, VersionBumpEngine, VersionError,
    VersionMode, Versioning,
};
use semver::Version;

fn v(raw: &str) -> Version {
    Version::parse(raw).unwrap()
}

fn changed(names: &[&str]) -> ChangeSet {
    let mut set = ChangeSet::new(Some("v1.0.0".to_string()));
    for name in names {
        set.insert(*name, ChangeReason::Forced);
    }
    set
}

fn uniform(kind: BumpKind) -> VersionMode {
    VersionMode::Manual(ManualBump::Uniform(kind))
}

fn engine() -> VersionBumpEngine {
    VersionBumpEngine::new(PlanOptions::default())
}

#[test]
fn test_minor_bump_keeps_satisfied_dependents_out() {
    let graph = common::graph(vec![
        package("pkg-a", "1.2.3", &[]),
        package("pkg-b", "1.0.0", &[("pkg-a", "^1.2.0")]),
    ]);
    let plan = engine()
        .plan(&changed(&["pkg-a"]), &graph, &uniform(BumpKind::Minor))
        .unwrap();

    assert_eq!(plan.names(), vec!["pkg-a"]);
    assert_eq!(plan.get("pkg-a").unwrap().next, v("1.3.0"));
    assert!(plan.fixed_version.is_none());
}

#[test]
fn test_major_bump_pulls_in_dependents_with_broken_ranges() {
    let graph = common::graph(vec![
        package("pkg-a", "1.2.3", &[]),
        package("pkg-b", "1.0.0", &[("pkg-a", "^1.2.0")]),
    ]);
    let plan = engine()
        .plan(&changed(&["pkg-a"]), &graph, &uniform(BumpKind::Major))
        .unwrap();

    assert_eq!(plan.get("pkg-a").unwrap().next, v("2.0.0"));
    let dependent = plan.get("pkg-b").unwrap();
    assert_eq!(dependent.next, v("1.0.1"));
    assert_eq!(
        dependent.reason,
        BumpReason::DependencyRange { dependency: "pkg-a".to_string() }
    );
    assert_eq!(
        dependent.range_updates,
        vec![RangeUpdate {
            name: "pkg-a".to_string(),
            kind: DependencyKind::Normal,
            range: "^2.0.0".to_string(),
        }]
    );
}

#[test]
fn test_range_propagation_reaches_a_fixed_point() {
    let graph = common::graph(vec![
        package("pkg-a", "1.0.0", &[]),
        package("pkg-b", "1.0.0", &[("pkg-a", "1.0.0")]),
        package("pkg-c", "1.0.0", &[("pkg-b", "1.0.0")]),
    ]);
    let plan = engine()
        .plan(&changed(&["pkg-a"]), &graph, &uniform(BumpKind::Patch))
        .unwrap();

    assert_eq!(plan.names(), vec!["pkg-a", "pkg-b", "pkg-c"]);
    assert_eq!(plan.get("pkg-c").unwrap().range_updates[0].range, "1.0.1");
}

#[test]
fn test_conventional_commits_end_to_end() {
    let graph = chain();
    let git = FakeGit::new()
        .with_tag("v1.0.0")
        .with_changed(vec![file("pkg-a", "src/index.js")])
        .with_commits(
            Path::new(ROOT).join("packages/pkg-a"),
            vec![CommitInfo::new("c1", "feat: add parser")],
        );
    let options = ChangeOptions {
        conventional_commits: true,
        ..ChangeOptions::default()
    };
    let changes =
        ChangeDetector::detect(&graph, &git, Path::new(ROOT), &ReferencePoint::LastTag, &options)
            .unwrap();

    let plan = engine()
        .plan(
            &changes,
            &graph,
            &VersionMode::Conventional(ConventionalOptions::default()),
        )
        .unwrap();

    let a = plan.get("pkg-a").unwrap();
    assert_eq!(a.next, v("1.1.0"));
    assert_eq!(a.reason, BumpReason::Commits);

    let b = plan.get("pkg-b").unwrap();
    assert_eq!(b.next, v("1.0.1"));
    assert_eq!(b.reason, BumpReason::Propagated { from: "pkg-a".to_string() });
    assert_eq!(b.range_updates[0].range, "^1.1.0");

    assert_eq!(plan.get("pkg-c").unwrap().range_updates[0].range, "^1.0.1");
}

#[test]
fn test_breaking_change_before_one_is_minor() {
    let graph = common::graph(vec![package("pkg-a", "0.4.2", &[])]);
    let mut set = ChangeSet::new(Some("v0.4.2".to_string()));
    set.insert("pkg-a", ChangeReason::Diff { files: vec!["index.js".to_string()] });
    set.packages.get_mut("pkg-a").unwrap().commits =
        vec![CommitInfo::new("c1", "feat!: drop the old api")];

    let plan = engine()
        .plan(&set, &graph, &VersionMode::Conventional(ConventionalOptions::default()))
        .unwrap();
    assert_eq!(plan.get("pkg-a").unwrap().next, v("0.5.0"));
}

#[test]
fn test_fixed_mode_moves_every_package_to_one_version() {
    let options = PlanOptions {
        versioning: Versioning::Fixed(v("2.3.0")),
        ..PlanOptions::default()
    };
    let plan = VersionBumpEngine::new(options)
        .plan(&changed(&["pkg-a", "pkg-c"]), &chain(), &uniform(BumpKind::Minor))
        .unwrap();

    assert_eq!(plan.fixed_version, Some(v("2.4.0")));
    for (_, bump) in plan.iter() {
        assert_eq!(bump.next, v("2.4.0"));
    }
    assert!(plan.contains("pkg-b"));
}

#[test]
fn test_per_package_bumps_require_independent_mode() {
    let options = PlanOptions {
        versioning: Versioning::Fixed(v("1.0.0")),
        ..PlanOptions::default()
    };
    let bumps: BTreeMap<String, BumpKind> = [("pkg-a".to_string(), BumpKind::Major)].into();
    let result = VersionBumpEngine::new(options).plan(
        &changed(&["pkg-a"]),
        &chain(),
        &VersionMode::Manual(ManualBump::PerPackage(bumps)),
    );
    assert!(matches!(result, Err(VersionError::InvalidManualBump(_))));
}

#[test]
fn test_per_package_bumps_must_cover_every_change() {
    let bumps: BTreeMap<String, BumpKind> = [("pkg-a".to_string(), BumpKind::Major)].into();
    let result = engine().plan(
        &changed(&["pkg-a", "pkg-c"]),
        &chain(),
        &VersionMode::Manual(ManualBump::PerPackage(bumps)),
    );
    match result {
        Err(VersionError::InvalidManualBump(message)) => assert!(message.contains("pkg-c")),
        other => panic!("expected InvalidManualBump, got {:?}", other.map(|p| p.len())),
    }
}

#[test]
fn test_graduate_moves_prerelease_to_its_release_line() {
    let graph = common::graph(vec![package("pkg-a", "2.0.0-beta.3", &[])]);
    let mut set = ChangeSet::new(Some("v1.0.0".to_string()));
    set.insert("pkg-a", ChangeReason::Graduate);
    set.packages.get_mut("pkg-a").unwrap().commits = vec![CommitInfo::new("c1", "feat: more")];

    let graduate = ConventionalOptions {
        graduate: PackageSelection::from_names(["pkg-a"]),
        ..ConventionalOptions::default()
    };
    let plan = engine()
        .plan(&set, &graph, &VersionMode::Conventional(graduate.clone()))
        .unwrap();
    let bump = plan.get("pkg-a").unwrap();
    assert_eq!(bump.next, v("2.0.0"));
    assert_eq!(bump.reason, BumpReason::Graduate);

    let conventional = ConventionalOptions {
        precedence: GraduatePrecedence::Conventional,
        ..graduate
    };
    let plan = engine()
        .plan(&set, &graph, &VersionMode::Conventional(conventional))
        .unwrap();
    assert_eq!(plan.get("pkg-a").unwrap().next, v("2.0.0"));
}

#[test]
fn test_graduating_a_release_version_is_ambiguous() {
    let options = ConventionalOptions {
        graduate: PackageSelection::from_names(["pkg-a"]),
        ..ConventionalOptions::default()
    };
    let result = engine().plan(&changed(&["pkg-a"]), &chain(), &VersionMode::Conventional(options));
    assert!(matches!(
        result,
        Err(VersionError::AmbiguousGraduate { ref package, .. }) if package == "pkg-a"
    ));
}

#[test]
fn test_conventional_prerelease_uses_preid() {
    let graph = common::graph(vec![package("pkg-a", "1.0.0", &[])]);
    let mut set = ChangeSet::new(Some("v1.0.0".to_string()));
    set.insert("pkg-a", ChangeReason::Forced);
    set.packages.get_mut("pkg-a").unwrap().commits = vec![CommitInfo::new("c1", "feat: beta")];

    let options = PlanOptions {
        prerelease: PrereleasePolicy {
            preid: Some("beta".to_string()),
            seed: 0,
        },
        ..PlanOptions::default()
    };
    let mode = VersionMode::Conventional(ConventionalOptions {
        prerelease: PackageSelection::All,
        ..ConventionalOptions::default()
    });
    let plan = VersionBumpEngine::new(options).plan(&set, &graph, &mode).unwrap();
    assert_eq!(plan.get("pkg-a").unwrap().next, v("1.1.0-beta.0"));
}

#[test]
fn test_peer_ranges_are_left_alone_by_default() {
    let graph = common::graph(vec![
        package("pkg-a", "1.0.0", &[]),
        package("pkg-b", "1.0.0", &[])
            .with_dependency(Dependency::new("pkg-a", "^1.0.0", DependencyKind::Peer)),
    ]);
    let plan = engine()
        .plan(&changed(&["pkg-a", "pkg-b"]), &graph, &uniform(BumpKind::Major))
        .unwrap();
    assert!(plan.get("pkg-b").unwrap().range_updates.is_empty());

    let options = PlanOptions {
        allow_peer_dependencies_update: true,
        ..PlanOptions::default()
    };
    let plan = VersionBumpEngine::new(options)
        .plan(&changed(&["pkg-a", "pkg-b"]), &graph, &uniform(BumpKind::Major))
        .unwrap();
    assert_eq!(plan.get("pkg-b").unwrap().range_updates[0].range, "^2.0.0");
}

#[test]
fn test_exact_ranges_drop_the_operator() {
    let options = PlanOptions {
        exact: true,
        ..PlanOptions::default()
    };
    let plan = VersionBumpEngine::new(options)
        .plan(&changed(&["pkg-a", "pkg-b"]), &chain(), &uniform(BumpKind::Minor))
        .unwrap();
    assert_eq!(plan.get("pkg-b").unwrap().range_updates[0].range, "1.1.0");
}
