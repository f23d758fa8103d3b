mod common;

use common::{chain, dev_package, package};
use monoship_core::{DependencyGraph, DependencyKind, GraphError, GraphOptions, GraphType};

#[test]
fn test_topological_order() {
    let graph = chain();
    assert_eq!(graph.topological_order(), &["pkg-a", "pkg-b", "pkg-c"]);
}

#[test]
fn test_independent_packages_order_lexically() {
    let graph = common::graph(vec![
        package("zeta", "1.0.0", &[]),
        package("alpha", "1.0.0", &[]),
        package("mid", "1.0.0", &[("zeta", "^1.0.0")]),
    ]);
    assert_eq!(graph.topological_order(), &["alpha", "zeta", "mid"]);
}

#[test]
fn test_dependencies_and_dependents() {
    let graph = chain();

    assert_eq!(graph.dependencies_of("pkg-b").unwrap(), vec!["pkg-a"]);
    assert!(graph.dependencies_of("pkg-a").unwrap().is_empty());
    assert_eq!(graph.dependents_of("pkg-a").unwrap(), vec!["pkg-b"]);
    assert!(graph.dependents_of("pkg-c").unwrap().is_empty());
}

#[test]
fn test_transitive_dependents() {
    let graph = chain();
    let dependents = graph.transitive_dependents("pkg-a").unwrap();
    assert_eq!(dependents.len(), 2);
    assert!(dependents.contains("pkg-b"));
    assert!(dependents.contains("pkg-c"));
}

#[test]
fn test_unknown_package() {
    let graph = chain();
    assert!(matches!(
        graph.dependencies_of("missing"),
        Err(GraphError::PackageNotFound { .. })
    ));
}

#[test]
fn test_duplicate_name_is_rejected() {
    let mut copy = package("pkg-a", "2.0.0", &[]);
    copy.location = "/workspace/vendor/pkg-a".into();

    let result = DependencyGraph::build(
        vec![package("pkg-a", "1.0.0", &[]), copy],
        GraphOptions::default(),
    );
    match result {
        Err(GraphError::DuplicateName { name, .. }) => assert_eq!(name, "pkg-a"),
        other => panic!("expected DuplicateName, got {:?}", other.map(|g| g.len())),
    }
}

#[test]
fn test_cycle_is_fatal_by_default() {
    let result = DependencyGraph::build(
        vec![
            package("pkg-a", "1.0.0", &[("pkg-b", "^1.0.0")]),
            package("pkg-b", "1.0.0", &[("pkg-a", "^1.0.0")]),
        ],
        GraphOptions::default(),
    );
    match result {
        Err(GraphError::UnresolvedCycle { members }) => {
            assert_eq!(members, vec!["pkg-a", "pkg-b"]);
        }
        other => panic!("expected UnresolvedCycle, got {:?}", other.map(|g| g.len())),
    }
}

#[test]
fn test_allowed_cycle_collapses_into_one_unit() {
    let graph = DependencyGraph::build(
        vec![
            package("pkg-a", "1.0.0", &[("pkg-b", "^1.0.0")]),
            package("pkg-b", "1.0.0", &[("pkg-a", "^1.0.0")]),
            package("pkg-c", "1.0.0", &[("pkg-a", "^1.0.0")]),
        ],
        GraphOptions {
            allow_cycles: true,
            ..GraphOptions::default()
        },
    )
    .unwrap();

    assert_eq!(graph.cycles().len(), 1);
    let order = graph.topological_order();
    assert_eq!(order.len(), 3);
    assert_eq!(order[2], "pkg-c");
}

#[test]
fn test_dependencies_graph_type_ignores_dev_cycles() {
    let packages = vec![
        package("pkg-a", "1.0.0", &[("pkg-b", "^1.0.0")]),
        dev_package("pkg-b", "1.0.0", &[("pkg-a", "^1.0.0")]),
    ];

    assert!(DependencyGraph::build(packages.clone(), GraphOptions::default()).is_err());

    let graph = DependencyGraph::build(
        packages,
        GraphOptions {
            graph_type: GraphType::Dependencies,
            allow_cycles: false,
        },
    )
    .unwrap();
    assert_eq!(graph.topological_order(), &["pkg-b", "pkg-a"]);
}

#[test]
fn test_unsatisfied_range_is_external() {
    let graph = common::graph(vec![
        package("pkg-a", "1.0.0", &[]),
        package("pkg-b", "1.0.0", &[("pkg-a", "^2.0.0")]),
    ]);
    assert!(graph.dependencies_of("pkg-b").unwrap().is_empty());
}

#[test]
fn test_workspace_protocol_is_always_local() {
    let graph = common::graph(vec![
        package("pkg-a", "1.0.0", &[]),
        package("pkg-b", "1.0.0", &[("pkg-a", "workspace:^")]),
    ]);
    assert_eq!(graph.dependencies_of("pkg-b").unwrap(), vec!["pkg-a"]);
}

#[test]
fn test_runtime_edge_wins_over_dev_edge() {
    let graph = common::graph(vec![
        package("pkg-a", "1.0.0", &[]),
        dev_package("pkg-b", "1.0.0", &[("pkg-a", "^1.0.0")])
            .with_dependency(monoship_core::Dependency::new(
                "pkg-a",
                "^1.0.0",
                DependencyKind::Normal,
            )),
    ]);
    assert_eq!(graph.edge_kind("pkg-b", "pkg-a"), Some(DependencyKind::Normal));
}
