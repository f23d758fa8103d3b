//! Package data models.

use std::fmt;
use std::path::PathBuf;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Manifest formats a package can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    /// `package.json`
    Npm,
    /// `Cargo.toml`
    Cargo,
}

impl ManifestKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestKind::Npm => "npm",
            ManifestKind::Cargo => "cargo",
        }
    }

    #[inline]
    pub fn file_name(&self) -> &'static str {
        match self {
            ManifestKind::Npm => "package.json",
            ManifestKind::Cargo => "Cargo.toml",
        }
    }
}

/// The manifest field a dependency was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Normal,
    Dev,
    Peer,
    Optional,
}

impl DependencyKind {
    /// Manifest field name used by npm-style manifests.
    pub fn npm_field(&self) -> &'static str {
        match self {
            DependencyKind::Normal => "dependencies",
            DependencyKind::Dev => "devDependencies",
            DependencyKind::Peer => "peerDependencies",
            DependencyKind::Optional => "optionalDependencies",
        }
    }
}

/// A declared dependency: name plus the range string exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub range: String,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn new(name: impl Into<String>, range: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            range: range.into(),
            kind,
        }
    }
}

/// A package in the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(with = "version_string")]
    pub version: Version,
    /// Absolute path to the package directory.
    pub location: PathBuf,
    /// Path relative to the workspace root, using `/` separators.
    pub relative_location: String,
    pub private: bool,
    pub dependencies: Vec<Dependency>,
    pub manifest: ManifestKind,
    /// Script names declared by the manifest, for `run`.
    #[serde(default)]
    pub scripts: Vec<String>,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        version: Version,
        location: impl Into<PathBuf>,
        relative_location: impl Into<String>,
        manifest: ManifestKind,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            location: location.into(),
            relative_location: relative_location.into(),
            private: false,
            dependencies: Vec::new(),
            manifest,
            scripts: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn with_scripts(mut self, scripts: Vec<String>) -> Self {
        self.scripts = scripts;
        self
    }

    #[inline]
    pub fn manifest_path(&self) -> PathBuf {
        self.location.join(self.manifest.file_name())
    }

    /// Declarations of `name`, across every dependency field.
    pub fn dependency_on<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Dependency> + 'a {
        self.dependencies.iter().filter(move |d| d.name == name)
    }

    #[inline]
    pub fn has_script(&self, script: &str) -> bool {
        self.scripts.iter().any(|s| s == script)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

mod version_string {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(version)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
