//! Manifest adapter trait for reading and rewriting package manifests.

use std::path::Path;

use semver::Version;

use crate::error::Result;
use crate::package::{DependencyKind, ManifestKind, Package};

/// A dependency range rewrite for one declaration in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeUpdate {
    pub name: String,
    pub kind: DependencyKind,
    pub range: String,
}

/// Changes to apply to a single manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestUpdate {
    pub version: Option<Version>,
    pub ranges: Vec<RangeUpdate>,
}

impl ManifestUpdate {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.version.is_none() && self.ranges.is_empty()
    }
}

/// Trait for manifest-format specific operations.
///
/// Adapters only read the identity, version and dependency fields. Writes
/// must leave every other field of the manifest as it was.
pub trait ManifestAdapter: Send + Sync {
    fn kind(&self) -> ManifestKind;
    fn detect(&self, dir: &Path) -> bool;
    /// Reads the package in `dir`; `root` is the workspace root.
    fn read(&self, dir: &Path, root: &Path) -> Result<Package>;
    fn write(&self, package: &Package, update: &ManifestUpdate) -> Result<()>;
}
