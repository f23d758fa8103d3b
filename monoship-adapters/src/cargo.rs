use std::fs;
use std::path::Path;

use monoship_core::adapter::{ManifestAdapter, ManifestUpdate};
use monoship_core::error::{Error, Result};
use monoship_core::package::{Dependency, DependencyKind, ManifestKind, Package};
use monoship_core::scanner::relative_location;
use semver::Version;
use toml_edit::{DocumentMut, Item};
use tracing::debug;

/// `Cargo.toml` manifests, edited in place so comments and layout survive.
pub struct CargoAdapter;

fn section(kind: DependencyKind) -> Option<&'static str> {
    match kind {
        DependencyKind::Normal => Some("dependencies"),
        DependencyKind::Dev => Some("dev-dependencies"),
        DependencyKind::Peer | DependencyKind::Optional => None,
    }
}

impl CargoAdapter {
    fn load(path: &Path) -> Result<DocumentMut> {
        let content = fs::read_to_string(path).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: format!("failed to read: {}", e),
        })?;
        content.parse::<DocumentMut>().map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: format!("failed to parse: {}", e),
        })
    }

    /// The requirement declared for a dependency, `*` for path-only entries.
    fn requirement(item: &Item) -> Option<String> {
        if let Some(raw) = item.as_str() {
            return Some(raw.to_string());
        }
        let table = item.as_table_like()?;
        match table.get("version").and_then(Item::as_str) {
            Some(raw) => Some(raw.to_string()),
            None if table.contains_key("path") => Some("*".to_string()),
            None => None,
        }
    }
}

impl ManifestAdapter for CargoAdapter {
    fn kind(&self) -> ManifestKind {
        ManifestKind::Cargo
    }

    fn detect(&self, dir: &Path) -> bool {
        let path = dir.join(ManifestKind::Cargo.file_name());
        // Virtual workspace manifests have no [package] table.
        path.is_file()
            && fs::read_to_string(&path)
                .map(|content| content.contains("[package]"))
                .unwrap_or(false)
    }

    fn read(&self, dir: &Path, root: &Path) -> Result<Package> {
        let path = dir.join(ManifestKind::Cargo.file_name());
        let document = Self::load(&path)?;
        let manifest_error = |message: &str| Error::Manifest {
            path: path.clone(),
            message: message.to_string(),
        };

        let package = document
            .get("package")
            .and_then(Item::as_table_like)
            .ok_or_else(|| manifest_error("missing [package]"))?;
        let name = package
            .get("name")
            .and_then(Item::as_str)
            .ok_or_else(|| manifest_error("missing package.name"))?;
        let raw_version = package
            .get("version")
            .and_then(Item::as_str)
            .ok_or_else(|| manifest_error("package.version must be a literal version"))?;
        let version = Version::parse(raw_version).map_err(|e| Error::Manifest {
            path: path.clone(),
            message: format!("invalid version '{}': {}", raw_version, e),
        })?;
        let private = match package.get("publish") {
            Some(item) => {
                item.as_bool() == Some(false)
                    || item.as_array().map(|a| a.is_empty()).unwrap_or(false)
            }
            None => false,
        };

        let mut result = Package::new(
            name,
            version,
            dir,
            relative_location(root, dir),
            ManifestKind::Cargo,
        )
        .with_private(private);

        for kind in [DependencyKind::Normal, DependencyKind::Dev] {
            let Some(table) = section(kind)
                .and_then(|name| document.get(name))
                .and_then(Item::as_table_like)
            else {
                continue;
            };
            for (dependency, item) in table.iter() {
                if let Some(range) = Self::requirement(item) {
                    result = result.with_dependency(Dependency::new(dependency, range, kind));
                }
            }
        }

        Ok(result)
    }

    fn write(&self, package: &Package, update: &ManifestUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let path = package.manifest_path();
        let mut document = Self::load(&path)?;

        if let Some(version) = &update.version {
            document["package"]["version"] = toml_edit::value(version.to_string());
        }

        for range in &update.ranges {
            let entry = section(range.kind)
                .and_then(|name| document.get_mut(name))
                .and_then(|table| table.get_mut(&range.name));
            let Some(entry) = entry else {
                debug!(package = %package.name, dependency = %range.name, "no such dependency, skipping");
                continue;
            };
            if entry.is_str() {
                *entry = toml_edit::value(range.range.as_str());
            } else if let Some(table) = entry.as_table_like_mut() {
                if table.contains_key("version") {
                    table.insert("version", toml_edit::value(range.range.as_str()));
                }
            }
        }

        fs::write(&path, document.to_string())?;
        Ok(())
    }
}
