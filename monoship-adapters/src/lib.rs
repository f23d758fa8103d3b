pub mod cargo;
pub mod npm;

pub use cargo::CargoAdapter;
pub use npm::NpmAdapter;

use monoship_core::adapter_registry::AdapterRegistry;

/// Registry with every built-in adapter. `package.json` wins when a
/// directory has both manifests.
pub fn default_registry() -> AdapterRegistry {
    AdapterRegistry::new().with(NpmAdapter).with(CargoAdapter)
}
