//! Host and module capability descriptors.
//!
//! Capabilities are resolved once: the host side by [`HostCapabilities::probe`]
//! before instantiation, the module side by the runtime from the module's
//! import and export tables at load time. Later phases only consult the
//! descriptors; nothing probes a module ad hoc.

use crate::runtime::ModuleRuntime;
use bitflags::bitflags;
use modboot_common::config::ConfigError;
use modboot_common::consts::{
    DEFAULT_ENTRY_SYMBOL, DEFAULT_MEMORY_IMPORT, DEFAULT_POOL_INIT_SYMBOL,
};
use serde::Serialize;
use std::num::NonZeroUsize;

bitflags! {
    /// Optional features a loaded module exposes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Exports a function named by the entry symbol. The `() -> ()`
        /// signature is checked when it is called.
        const ENTRY_POINT = 1 << 0;
        /// Exports a function named by the pool-init symbol. Its signature
        /// is checked when it is called.
        const POOL_INIT = 1 << 1;
        /// Imports its linear memory from the host.
        const IMPORTS_MEMORY = 1 << 2;
        /// Defines and exports its own linear memory.
        const EXPORTS_MEMORY = 1 << 3;
    }
}

impl Capabilities {
    /// Flag names, for logs and reports.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

/// Export and import names the runtime resolves capabilities against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSymbols {
    /// Entry point export.
    pub entry: String,
    /// Pool-init export.
    pub pool_init: String,
    /// Import module name of a host-provided memory.
    pub memory_module: String,
    /// Import field name of a host-provided memory.
    pub memory_name: String,
}

impl ModuleSymbols {
    /// Build from an entry symbol, a pool-init symbol and a
    /// `module.name` memory import.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if a symbol is empty or the
    /// memory import is not of the form `module.name`.
    pub fn new(entry: &str, pool_init: &str, memory_import: &str) -> Result<Self, ConfigError> {
        if entry.is_empty() {
            return Err(ConfigError::ValidationError(
                "entry_symbol cannot be empty".to_string(),
            ));
        }
        if pool_init.is_empty() {
            return Err(ConfigError::ValidationError(
                "init_symbol cannot be empty".to_string(),
            ));
        }
        let (memory_module, memory_name) = memory_import
            .split_once('.')
            .filter(|(module, name)| !module.is_empty() && !name.is_empty())
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "memory_import must be of the form module.name, got {memory_import:?}"
                ))
            })?;

        Ok(Self {
            entry: entry.to_string(),
            pool_init: pool_init.to_string(),
            memory_module: memory_module.to_string(),
            memory_name: memory_name.to_string(),
        })
    }
}

impl Default for ModuleSymbols {
    fn default() -> Self {
        let (memory_module, memory_name) = DEFAULT_MEMORY_IMPORT
            .split_once('.')
            .unwrap_or(("env", "memory"));
        Self {
            entry: DEFAULT_ENTRY_SYMBOL.to_string(),
            pool_init: DEFAULT_POOL_INIT_SYMBOL.to_string(),
            memory_module: memory_module.to_string(),
            memory_name: memory_name.to_string(),
        }
    }
}

/// Result of the host capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostCapabilities {
    /// A linear memory can be shared between pool workers.
    pub shared_memory: bool,
    /// Hardware threads available to the process.
    pub parallelism: usize,
}

impl HostCapabilities {
    /// Query the runtime and the OS. Synchronous and side-effect free.
    pub fn probe(runtime: &dyn ModuleRuntime) -> Self {
        Self {
            shared_memory: runtime.supports_shared_memory(),
            parallelism: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}
