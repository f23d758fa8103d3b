use std::fs;
use std::path::Path;

use monoship_core::adapter::{ManifestAdapter, ManifestUpdate};
use monoship_core::error::{Error, Result};
use monoship_core::package::{Dependency, DependencyKind, ManifestKind, Package};
use monoship_core::scanner::relative_location;
use semver::Version;
use serde_json::{Map, Value};
use tracing::debug;

const DEPENDENCY_FIELDS: [DependencyKind; 4] = [
    DependencyKind::Normal,
    DependencyKind::Dev,
    DependencyKind::Peer,
    DependencyKind::Optional,
];

/// `package.json` manifests.
///
/// Documents are read with key order preserved, so a write only changes
/// the version and the rewritten ranges.
pub struct NpmAdapter;

impl NpmAdapter {
    fn load(path: &Path) -> Result<Map<String, Value>> {
        let content = fs::read_to_string(path).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: format!("failed to read: {}", e),
        })?;
        match serde_json::from_str(&content) {
            Ok(Value::Object(object)) => Ok(object),
            Ok(_) => Err(Error::Manifest {
                path: path.to_path_buf(),
                message: "expected a JSON object".to_string(),
            }),
            Err(e) => Err(Error::Manifest {
                path: path.to_path_buf(),
                message: format!("failed to parse: {}", e),
            }),
        }
    }
}

impl ManifestAdapter for NpmAdapter {
    fn kind(&self) -> ManifestKind {
        ManifestKind::Npm
    }

    fn detect(&self, dir: &Path) -> bool {
        dir.join(ManifestKind::Npm.file_name()).is_file()
    }

    fn read(&self, dir: &Path, root: &Path) -> Result<Package> {
        let path = dir.join(ManifestKind::Npm.file_name());
        let manifest = Self::load(&path)?;

        let name = manifest
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Manifest {
                path: path.clone(),
                message: "missing \"name\"".to_string(),
            })?;
        let private = manifest.get("private").and_then(Value::as_bool).unwrap_or(false);

        let version = match manifest.get("version").and_then(Value::as_str) {
            Some(raw) => Version::parse(raw).map_err(|e| Error::Manifest {
                path: path.clone(),
                message: format!("invalid version '{}': {}", raw, e),
            })?,
            None if private => Version::new(0, 0, 0),
            None => {
                return Err(Error::Manifest {
                    path,
                    message: "missing \"version\"".to_string(),
                })
            }
        };

        let mut package = Package::new(
            name,
            version,
            dir,
            relative_location(root, dir),
            ManifestKind::Npm,
        )
        .with_private(private);

        for kind in DEPENDENCY_FIELDS {
            let Some(fields) = manifest.get(kind.npm_field()).and_then(Value::as_object) else {
                continue;
            };
            for (dependency, range) in fields {
                if let Some(range) = range.as_str() {
                    package = package.with_dependency(Dependency::new(dependency, range, kind));
                }
            }
        }

        if let Some(scripts) = manifest.get("scripts").and_then(Value::as_object) {
            package = package.with_scripts(scripts.keys().cloned().collect());
        }

        Ok(package)
    }

    fn write(&self, package: &Package, update: &ManifestUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let path = package.manifest_path();
        let mut manifest = Self::load(&path)?;

        if let Some(version) = &update.version {
            manifest.insert("version".to_string(), Value::String(version.to_string()));
        }
        for range in &update.ranges {
            let field = manifest
                .get_mut(range.kind.npm_field())
                .and_then(Value::as_object_mut)
                .and_then(|deps| deps.get_mut(&range.name));
            match field {
                Some(value) => *value = Value::String(range.range.clone()),
                None => debug!(
                    package = %package.name,
                    dependency = %range.name,
                    "range to rewrite is not declared, skipping"
                ),
            }
        }

        let mut content = serde_json::to_string_pretty(&Value::Object(manifest)).map_err(|error| {
            Error::Json {
                error,
                context: path.display().to_string(),
            }
        })?;
        content.push('\n');
        fs::write(&path, content)?;
        Ok(())
    }
}
