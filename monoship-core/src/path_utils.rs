//! Shared path utilities for mapping files to packages.

use std::path::{Path, PathBuf};

use crate::graph::DependencyGraph;

/// Index of package locations, longest first, for prefix lookups.
#[derive(Debug, Clone)]
pub struct PackageLocator {
    root: PathBuf,
    locations: Vec<(String, String)>,
}

impl PackageLocator {
    pub fn new(root: impl Into<PathBuf>, graph: &DependencyGraph) -> Self {
        let mut locations: Vec<(String, String)> = graph
            .packages()
            .map(|p| (p.relative_location.clone(), p.name.clone()))
            .collect();
        locations.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self {
            root: root.into(),
            locations,
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Converts a file path to the name of the package that owns it.
    ///
    /// Relative paths are taken as relative to the workspace root. Nested
    /// packages win over their parents.
    pub fn package_for(&self, file_path: &Path) -> Option<&str> {
        self.locate(file_path).map(|(name, _)| name)
    }

    /// Owning package plus the file path relative to that package.
    pub fn locate(&self, file_path: &Path) -> Option<(&str, String)> {
        let relative = if file_path.is_absolute() {
            file_path.strip_prefix(&self.root).ok()?
        } else {
            file_path
        };
        let relative = crate::scanner::relative_location(Path::new(""), relative);

        self.locations.iter().find_map(|(location, name)| {
            if location.is_empty() || location == "." {
                return Some((name.as_str(), relative.clone()));
            }
            let rest = relative.strip_prefix(location.as_str())?;
            if rest.is_empty() {
                Some((name.as_str(), String::new()))
            } else {
                rest.strip_prefix('/')
                    .map(|inner| (name.as_str(), inner.to_string()))
            }
        })
    }
}
