//! Registry of manifest adapters, consulted in registration order.

use std::path::Path;

use crate::adapter::ManifestAdapter;
use crate::package::ManifestKind;

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn ManifestAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter. Earlier registrations win detection ties.
    pub fn register<A>(&mut self, adapter: A)
    where
        A: ManifestAdapter + 'static,
    {
        self.adapters.push(Box::new(adapter));
    }

    pub fn with<A>(mut self, adapter: A) -> Self
    where
        A: ManifestAdapter + 'static,
    {
        self.register(adapter);
        self
    }

    /// Returns the first adapter that recognises `dir`.
    pub fn detect(&self, dir: &Path) -> Option<&dyn ManifestAdapter> {
        self.adapters
            .iter()
            .find(|a| a.detect(dir))
            .map(|a| a.as_ref())
    }

    pub fn for_kind(&self, kind: ManifestKind) -> Option<&dyn ManifestAdapter> {
        self.adapters
            .iter()
            .find(|a| a.kind() == kind)
            .map(|a| a.as_ref())
    }

    pub fn kinds(&self) -> Vec<ManifestKind> {
        self.adapters.iter().map(|a| a.kind()).collect()
    }
}
