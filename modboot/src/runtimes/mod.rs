//! Module runtime implementations.
//!
//! - [`interpreter`] - `wasmi` interpreter runtime (default)
//!
//! # Adding New Runtimes
//!
//! 1. Create a new submodule under `runtimes/`
//! 2. Implement [`ModuleRuntime`](crate::runtime::ModuleRuntime)
//! 3. Register it in [`RuntimeRegistry::with_builtin`]

pub mod interpreter;

pub use interpreter::WasmiRuntime;

use crate::runtime::ModuleRuntime;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Factory function type for creating runtime instances.
pub type RuntimeFactory = fn() -> Arc<dyn ModuleRuntime>;

/// Name of the runtime used when none is requested.
pub const DEFAULT_RUNTIME: &str = interpreter::RUNTIME_NAME;

/// Registry of available module runtimes.
///
/// Constructed at startup and queried by name; no global state.
pub struct RuntimeRegistry {
    factories: BTreeMap<&'static str, RuntimeFactory>,
}

impl RuntimeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry populated with every built-in runtime.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(interpreter::RUNTIME_NAME, interpreter::create_runtime);
        registry
    }

    /// Register a runtime factory.
    ///
    /// # Panics
    /// Panics if a runtime with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: RuntimeFactory) {
        if self.factories.contains_key(name) {
            panic!("Runtime '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Create a runtime instance by name.
    pub fn create(&self, name: &str) -> Option<Arc<dyn ModuleRuntime>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Registered runtime names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_wasmi() {
        let registry = RuntimeRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["wasmi"]);
        let runtime = registry.create(DEFAULT_RUNTIME).expect("should create");
        assert_eq!(runtime.name(), "wasmi");
    }

    #[test]
    fn unknown_runtime_is_none() {
        assert!(RuntimeRegistry::new().create("wasmtime").is_none());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut registry = RuntimeRegistry::with_builtin();
        registry.register("wasmi", interpreter::create_runtime);
    }
}
