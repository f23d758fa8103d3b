//! Root `package-lock.json` maintenance.
//!
//! Only in-workspace versions and ranges are touched; external entries are
//! never re-resolved.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::version::VersionBumpPlan;

pub const NPM_LOCKFILE: &str = "package-lock.json";

#[derive(Debug, Clone)]
pub struct RootLockfile {
    path: PathBuf,
    document: Value,
}

impl RootLockfile {
    /// Loads the lockfile at the workspace root, if there is one.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = root.join(NPM_LOCKFILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let document = serde_json::from_str(&content).map_err(|error| Error::Json {
            error,
            context: path.display().to_string(),
        })?;
        Ok(Some(Self { path, document }))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies planned versions and range rewrites. Returns whether anything changed.
    pub fn apply(&mut self, plan: &VersionBumpPlan, graph: &DependencyGraph) -> bool {
        let mut changed = false;

        for (name, bump) in plan.iter() {
            let Some(package) = graph.package(name) else {
                continue;
            };
            let next = bump.next.to_string();

            // lockfileVersion 2 and 3
            if let Some(packages) = self.document.get_mut("packages").and_then(Value::as_object_mut) {
                if let Some(entry) = packages.get_mut(&package.relative_location) {
                    changed |= set_string(entry, "version", &next);
                    for update in &bump.range_updates {
                        if let Some(deps) = entry
                            .get_mut(update.kind.npm_field())
                            .and_then(Value::as_object_mut)
                        {
                            if let Some(range) = deps.get_mut(&update.name) {
                                if range.as_str() != Some(update.range.as_str()) {
                                    *range = Value::String(update.range.clone());
                                    changed = true;
                                }
                            }
                        }
                    }
                }
                let installed = format!("node_modules/{}", name);
                if let Some(entry) = packages.get_mut(&installed) {
                    let linked = entry.get("link").and_then(Value::as_bool).unwrap_or(false);
                    if !linked {
                        changed |= set_string(entry, "version", &next);
                    }
                }
            }

            // lockfileVersion 1
            if let Some(entry) = self
                .document
                .get_mut("dependencies")
                .and_then(Value::as_object_mut)
                .and_then(|deps| deps.get_mut(name))
            {
                let pinned = entry
                    .get("version")
                    .and_then(Value::as_str)
                    .map(|v| semver::Version::parse(v).is_ok())
                    .unwrap_or(false);
                if pinned {
                    changed |= set_string(entry, "version", &next);
                }
            }

            if package.relative_location.is_empty() {
                changed |= set_string(&mut self.document, "version", &next);
            }
        }

        debug!(path = %self.path.display(), changed, "updated root lockfile");
        changed
    }

    /// Serialized document with npm's two-space indent and a trailing newline.
    pub fn render(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&self.document).map_err(|error| Error::Json {
            error,
            context: self.path.display().to_string(),
        })?;
        out.push('\n');
        Ok(out)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}

fn set_string(entry: &mut Value, key: &str, value: &str) -> bool {
    match entry.as_object_mut() {
        Some(object) if object.contains_key(key) && object[key].as_str() != Some(value) => {
            object.insert(key.to_string(), Value::String(value.to_string()));
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use semver::Version;
    use serde_json::json;

    use super::*;
    use crate::adapter::RangeUpdate;
    use crate::graph::GraphOptions;
    use crate::package::{Dependency, DependencyKind, ManifestKind, Package};
    use crate::version::{BumpKind, BumpReason, PlannedBump};

    fn graph() -> DependencyGraph {
        let a = Package::new(
            "pkg-a",
            Version::new(1, 0, 0),
            "/w/packages/pkg-a",
            "packages/pkg-a",
            ManifestKind::Npm,
        );
        let b = Package::new(
            "pkg-b",
            Version::new(1, 0, 0),
            "/w/packages/pkg-b",
            "packages/pkg-b",
            ManifestKind::Npm,
        )
        .with_dependency(Dependency::new("pkg-a", "^1.0.0", DependencyKind::Normal));
        DependencyGraph::build(vec![a, b], GraphOptions::default()).unwrap()
    }

    fn plan() -> VersionBumpPlan {
        let mut entries = BTreeMap::new();
        entries.insert(
            "pkg-a".to_string(),
            PlannedBump {
                current: Version::new(1, 0, 0),
                next: Version::new(2, 0, 0),
                kind: BumpKind::Major,
                reason: BumpReason::Requested,
                range_updates: Vec::new(),
            },
        );
        entries.insert(
            "pkg-b".to_string(),
            PlannedBump {
                current: Version::new(1, 0, 0),
                next: Version::new(1, 0, 1),
                kind: BumpKind::Patch,
                reason: BumpReason::DependencyRange {
                    dependency: "pkg-a".to_string(),
                },
                range_updates: vec![RangeUpdate {
                    name: "pkg-a".to_string(),
                    kind: DependencyKind::Normal,
                    range: "^2.0.0".to_string(),
                }],
            },
        );
        VersionBumpPlan {
            entries,
            fixed_version: None,
        }
    }

    fn lockfile(document: Value) -> RootLockfile {
        RootLockfile {
            path: PathBuf::from("/w").join(NPM_LOCKFILE),
            document,
        }
    }

    #[test]
    fn updates_workspace_entries_only() {
        let mut lock = lockfile(json!({
            "name": "root",
            "lockfileVersion": 3,
            "packages": {
                "": { "name": "root" },
                "packages/pkg-a": { "version": "1.0.0" },
                "packages/pkg-b": { "version": "1.0.0", "dependencies": { "pkg-a": "^1.0.0" } },
                "node_modules/pkg-a": { "resolved": "packages/pkg-a", "link": true },
                "node_modules/left-pad": { "version": "1.3.0" }
            }
        }));

        assert!(lock.apply(&plan(), &graph()));

        let packages = &lock.document()["packages"];
        assert_eq!(packages["packages/pkg-a"]["version"], "2.0.0");
        assert_eq!(packages["packages/pkg-b"]["version"], "1.0.1");
        assert_eq!(packages["packages/pkg-b"]["dependencies"]["pkg-a"], "^2.0.0");
        assert!(packages["node_modules/pkg-a"].get("version").is_none());
        assert_eq!(packages["node_modules/left-pad"]["version"], "1.3.0");
    }

    #[test]
    fn v1_lockfiles_only_touch_pinned_versions() {
        let mut lock = lockfile(json!({
            "lockfileVersion": 1,
            "dependencies": {
                "pkg-a": { "version": "1.0.0" },
                "pkg-b": { "version": "file:packages/pkg-b" }
            }
        }));

        assert!(lock.apply(&plan(), &graph()));
        assert_eq!(lock.document()["dependencies"]["pkg-a"]["version"], "2.0.0");
        assert_eq!(lock.document()["dependencies"]["pkg-b"]["version"], "file:packages/pkg-b");
    }

    #[test]
    fn unchanged_document_reports_nothing() {
        let mut lock = lockfile(json!({ "lockfileVersion": 3, "packages": {} }));
        assert!(!lock.apply(&plan(), &graph()));
        assert!(lock.render().unwrap().ends_with("}\n"));
    }
}
