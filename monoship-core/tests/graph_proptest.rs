mod common;

use std::collections::BTreeSet;

use common::package;
use monoship_core::{DependencyGraph, GraphOptions, Package};
use proptest::prelude::*;

/// Random DAGs: package `i` may only depend on packages with a lower index.
fn gen_dag() -> impl Strategy<Value = Vec<Package>> {
    (2usize..8).prop_flat_map(|count| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), count), count).prop_map(
            move |matrix| {
                (0..count)
                    .map(|i| {
                        let deps: Vec<(String, &str)> = (0..i)
                            .filter(|j| matrix[i][*j])
                            .map(|j| (format!("pkg-{}", j), "^1.0.0"))
                            .collect();
                        let deps: Vec<(&str, &str)> =
                            deps.iter().map(|(name, range)| (name.as_str(), *range)).collect();
                        package(&format!("pkg-{}", i), "1.0.0", &deps)
                    })
                    .collect()
            },
        )
    })
}

proptest! {
    #[test]
    fn test_dependencies_precede_dependents(packages in gen_dag()) {
        let graph = DependencyGraph::build(packages.clone(), GraphOptions::default()).unwrap();
        let order = graph.topological_order();
        prop_assert_eq!(order.len(), packages.len());

        for package in &packages {
            let position = order.iter().position(|n| n == &package.name).unwrap();
            for dep in graph.dependencies_of(&package.name).unwrap() {
                let dep_position = order.iter().position(|n| n == &dep).unwrap();
                prop_assert!(dep_position < position);
            }
        }
    }

    #[test]
    fn test_order_has_no_duplicates(packages in gen_dag()) {
        let graph = DependencyGraph::build(packages, GraphOptions::default()).unwrap();
        let order = graph.topological_order();
        let unique: BTreeSet<&String> = order.iter().collect();
        prop_assert_eq!(unique.len(), order.len());
    }

    #[test]
    fn test_build_is_deterministic(packages in gen_dag()) {
        let mut reversed = packages.clone();
        reversed.reverse();
        let first = DependencyGraph::build(packages, GraphOptions::default()).unwrap();
        let second = DependencyGraph::build(reversed, GraphOptions::default()).unwrap();
        prop_assert_eq!(first.topological_order(), second.topological_order());
    }
}
