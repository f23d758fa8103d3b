//! Workspace scanner for discovering packages.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::adapter_registry::AdapterRegistry;
use crate::error::{Error, Result};
use crate::package::Package;

const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "target", "dist"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Scans a workspace for package manifests.
///
/// Directories are matched against the configured location globs (for
/// example `packages/*`), then handed to the first adapter that recognises
/// a manifest in them.
pub struct Scanner<'a> {
    root: PathBuf,
    patterns: Vec<Pattern>,
    max_depth: usize,
    adapters: &'a AdapterRegistry,
}

impl<'a> Scanner<'a> {
    pub fn new(
        root: impl AsRef<Path>,
        patterns: &[String],
        adapters: &'a AdapterRegistry,
    ) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.trim_end_matches('/'))
                    .map_err(|e| Error::Config(format!("Invalid package glob '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let max_depth = patterns
            .iter()
            .map(|p| {
                if p.contains("**") {
                    usize::MAX
                } else {
                    p.trim_end_matches('/').split('/').count()
                }
            })
            .max()
            .unwrap_or(1);

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            patterns: compiled,
            max_depth,
            adapters,
        })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discovers packages, sorted by name.
    pub fn scan(&self) -> Result<Vec<Package>> {
        let candidates: Vec<PathBuf> = WalkDir::new(&self.root)
            .max_depth(self.max_depth)
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && e.depth() > 0
                    && e.file_name()
                        .to_str()
                        .map(|n| SKIPPED_DIRS.contains(&n))
                        .unwrap_or(false))
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter(|e| self.matches(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        let packages: Result<Vec<Option<Package>>> = candidates
            .into_par_iter()
            .map(|dir| match self.adapters.detect(&dir) {
                Some(adapter) => adapter.read(&dir, &self.root).map(Some),
                None => Ok(None),
            })
            .collect();

        let mut packages: Vec<Package> = packages?.into_iter().flatten().collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = packages.len(), root = %self.root.display(), "scanned workspace");
        Ok(packages)
    }

    fn matches(&self, dir: &Path) -> bool {
        let relative = relative_location(&self.root, dir);
        let relative = if relative.is_empty() { "." } else { relative.as_str() };
        self.patterns
            .iter()
            .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }
}

/// Location of `path` relative to `root`, with `/` separators.
pub fn relative_location(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
