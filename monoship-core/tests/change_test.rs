mod common;

use std::path::Path;

use common::{chain, dev_package, file, package, FakeGit, ROOT};
use monoship_core::error::{ChangeDetectionError, Error, GraphError};
use monoship_core::{
    ChangeDetector, ChangeOptions, ChangeReason, ChangeSet, CommitInfo, PackageSelection,
    ReferencePoint,
};

fn detect(git: &FakeGit, options: &ChangeOptions) -> ChangeSet {
    ChangeDetector::detect(&chain(), git, Path::new(ROOT), &ReferencePoint::LastTag, options).unwrap()
}

#[test]
fn test_diff_is_grouped_by_package() {
    let git = FakeGit::new().with_tag("v1.0.0").with_changed(vec![
        file("pkg-a", "src/index.js"),
        file("pkg-a", "src/util.js"),
        Path::new(ROOT).join("README.md"),
    ]);
    let set = detect(&git, &ChangeOptions::default());

    assert_eq!(set.reference.as_deref(), Some("v1.0.0"));
    match &set.get("pkg-a").unwrap().reason {
        ChangeReason::Diff { files } => assert_eq!(files, &vec!["src/index.js", "src/util.js"]),
        other => panic!("unexpected reason {:?}", other),
    }
    assert_eq!(set.names(), vec!["pkg-a", "pkg-b", "pkg-c"]);
}

#[test]
fn test_dependents_are_propagated_transitively() {
    let git = FakeGit::new()
        .with_tag("v1.0.0")
        .with_changed(vec![file("pkg-a", "index.js")]);
    let set = detect(&git, &ChangeOptions::default());

    assert_eq!(
        set.get("pkg-b").unwrap().reason,
        ChangeReason::Propagated { from: "pkg-a".to_string() }
    );
    assert_eq!(
        set.get("pkg-c").unwrap().reason,
        ChangeReason::Propagated { from: "pkg-b".to_string() }
    );
}

#[test]
fn test_leaf_change_does_not_propagate_upwards() {
    let git = FakeGit::new()
        .with_tag("v1.0.0")
        .with_changed(vec![file("pkg-c", "index.js")]);
    let set = detect(&git, &ChangeOptions::default());
    assert_eq!(set.names(), vec!["pkg-c"]);
}

#[test]
fn test_ignored_files_do_not_count() {
    let git = FakeGit::new().with_tag("v1.0.0").with_changed(vec![
        file("pkg-a", "README.md"),
        file("pkg-a", "test/unit.test.js"),
    ]);
    let options = ChangeOptions {
        ignore_changes: vec!["*.md".to_string(), "test/**".to_string()],
        ..ChangeOptions::default()
    };
    assert!(detect(&git, &options).is_empty());
}

#[test]
fn test_no_prior_release_marks_everything() {
    let git = FakeGit::new();
    let set = detect(&git, &ChangeOptions::default());

    assert_eq!(set.reference, None);
    assert_eq!(set.len(), 3);
    for name in ["pkg-a", "pkg-b", "pkg-c"] {
        assert_eq!(set.get(name).unwrap().reason, ChangeReason::NoPriorRelease);
    }
}

#[test]
fn test_unresolvable_explicit_reference() {
    let result = ChangeDetector::detect(
        &chain(),
        &FakeGit::new(),
        Path::new(ROOT),
        &ReferencePoint::Explicit("does-not-exist".to_string()),
        &ChangeOptions::default(),
    );
    assert!(matches!(
        result,
        Err(Error::ChangeDetection(ChangeDetectionError::UnresolvedReference { .. }))
    ));
}

#[test]
fn test_force_publish_includes_unchanged_packages() {
    let git = FakeGit::new().with_tag("v1.0.0");
    let options = ChangeOptions {
        force_publish: PackageSelection::from_names(["pkg-c"]),
        ..ChangeOptions::default()
    };
    let set = detect(&git, &options);
    assert_eq!(set.names(), vec!["pkg-c"]);
    assert_eq!(set.get("pkg-c").unwrap().reason, ChangeReason::Forced);
}

#[test]
fn test_graduating_prerelease_is_always_changed() {
    let graph = common::graph(vec![
        package("pkg-a", "1.0.0-beta.2", &[]),
        package("pkg-b", "1.0.0", &[]),
    ]);
    let options = ChangeOptions {
        graduate: PackageSelection::All,
        ..ChangeOptions::default()
    };
    let set = ChangeDetector::detect(
        &graph,
        &FakeGit::new().with_tag("v1.0.0"),
        Path::new(ROOT),
        &ReferencePoint::LastTag,
        &options,
    )
    .unwrap();

    assert_eq!(set.names(), vec!["pkg-a"]);
    assert_eq!(set.get("pkg-a").unwrap().reason, ChangeReason::Graduate);
}

#[test]
fn test_dev_edges_propagate_only_when_enabled() {
    let graph = common::graph(vec![
        package("pkg-a", "1.0.0", &[]),
        dev_package("pkg-b", "1.0.0", &[("pkg-a", "^1.0.0")]),
    ]);

    let mut set = ChangeSet::new(Some("v1.0.0".to_string()));
    set.insert("pkg-a", ChangeReason::Forced);
    ChangeDetector::propagate(&mut set, &graph, false).unwrap();
    assert_eq!(set.names(), vec!["pkg-a"]);

    ChangeDetector::propagate(&mut set, &graph, true).unwrap();
    assert_eq!(set.names(), vec!["pkg-a", "pkg-b"]);
}

#[test]
fn test_propagation_is_idempotent() {
    let graph = chain();
    let mut set = ChangeSet::new(None);
    set.insert("pkg-a", ChangeReason::Forced);

    ChangeDetector::propagate(&mut set, &graph, true).unwrap();
    let once = set.clone();
    ChangeDetector::propagate(&mut set, &graph, true).unwrap();
    assert_eq!(set, once);
}

#[test]
fn test_private_packages_can_be_excluded() {
    let graph = common::graph(vec![
        package("pkg-a", "1.0.0", &[]),
        package("pkg-b", "1.0.0", &[("pkg-a", "^1.0.0")]).with_private(true),
    ]);
    let options = ChangeOptions {
        include_private: false,
        ..ChangeOptions::default()
    };
    let set = ChangeDetector::detect(
        &graph,
        &FakeGit::new(),
        Path::new(ROOT),
        &ReferencePoint::LastTag,
        &options,
    )
    .unwrap();
    assert_eq!(set.names(), vec!["pkg-a"]);
}

#[test]
fn test_commits_are_attributed_when_requested() {
    let git = FakeGit::new()
        .with_tag("v1.0.0")
        .with_changed(vec![file("pkg-c", "index.js")])
        .with_commits(
            Path::new(ROOT).join("packages/pkg-c"),
            vec![CommitInfo::new("abc", "feat: shiny")],
        );
    let options = ChangeOptions {
        conventional_commits: true,
        ..ChangeOptions::default()
    };
    let set = detect(&git, &options);
    assert_eq!(set.get("pkg-c").unwrap().commits.len(), 1);
}

#[test]
fn test_packages_for_paths() {
    let names = ChangeDetector::packages_for_paths(
        &chain(),
        Path::new(ROOT),
        &[file("pkg-b", "src/lib.js"), Path::new("packages/pkg-c/index.js").to_path_buf()],
    );
    assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["pkg-b", "pkg-c"]);
}

#[test]
fn test_diff_of_one_package_since_the_last_tag() {
    let git = FakeGit::new().with_tag("v1.0.0");
    let patch = ChangeDetector::diff(
        &chain(),
        &git,
        &ReferencePoint::LastTag,
        Some("pkg-b"),
        &ChangeOptions::default(),
    )
    .unwrap();

    let location = Path::new(ROOT).join("packages/pkg-b");
    assert_eq!(patch, format!("diff v1.0.0 -- {}\n", location.display()));
}

#[test]
fn test_diff_without_a_release_covers_every_package() {
    let patch = ChangeDetector::diff(
        &chain(),
        &FakeGit::new(),
        &ReferencePoint::LastTag,
        None,
        &ChangeOptions::default(),
    )
    .unwrap();

    assert!(patch.starts_with("diff (root) -- "));
    for name in ["pkg-a", "pkg-b", "pkg-c"] {
        assert!(patch.contains(&format!("packages/{}", name)));
    }
}

#[test]
fn test_diff_of_unknown_package() {
    let result = ChangeDetector::diff(
        &chain(),
        &FakeGit::new().with_tag("v1.0.0"),
        &ReferencePoint::LastTag,
        Some("pkg-z"),
        &ChangeOptions::default(),
    );
    assert!(matches!(
        result,
        Err(Error::Graph(GraphError::PackageNotFound { ref name, .. })) if name == "pkg-z"
    ));
}
