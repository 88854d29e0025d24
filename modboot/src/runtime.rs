//! Runtime abstraction.
//!
//! The bootstrapper drives modules through these traits, so the engine that
//! actually executes the binary is pluggable (see [`crate::runtimes`]).
//!
//! # Lifecycle
//!
//! 1. [`ModuleRuntime::instantiate`] - once, produces the [`ModuleHandle`]
//! 2. [`ModuleHandle::call_pool_init`] - at most once, after the pool is up
//! 3. [`ModuleHandle::call_entry`] - at most once, last
//!
//! All trait methods block; the bootstrapper runs them off the async
//! executor.

use crate::artifact::ModuleArtifact;
use crate::capability::{Capabilities, ModuleSymbols};
use crate::error::{InstantiationError, ModuleError};
use crate::pool::WorkerSpawner;
use modboot_common::memory::MemoryConfig;
use std::sync::Arc;

/// An engine able to instantiate binary modules.
pub trait ModuleRuntime: Send + Sync {
    /// Runtime identifier (e.g. "wasmi").
    fn name(&self) -> &'static str;

    /// Whether linear memories can be shared between pool workers.
    fn supports_shared_memory(&self) -> bool;

    /// Compile, link and start a module.
    ///
    /// With `memory` set, the runtime provides a memory of exactly these
    /// limits to a module importing one under `symbols`. Without it, the
    /// module's own memory definition is used.
    ///
    /// Module capabilities are resolved here, once, against `symbols`.
    ///
    /// # Errors
    /// Any failure to produce a running instance.
    fn instantiate(
        &self,
        artifact: &ModuleArtifact,
        memory: Option<MemoryConfig>,
        symbols: &ModuleSymbols,
    ) -> Result<Box<dyn ModuleHandle>, InstantiationError>;
}

/// Exclusively owned handle to an instantiated module.
pub trait ModuleHandle: Send {
    /// Capabilities resolved at load time.
    fn capabilities(&self) -> Capabilities;

    /// Invoke the entry symbol with no arguments.
    fn call_entry(&mut self) -> Result<(), ModuleError>;

    /// Invoke the pool-init symbol with the worker count.
    fn call_pool_init(&mut self, workers: u32) -> Result<(), ModuleError>;

    /// Factory for pool workers bound to this module.
    ///
    /// Default: `None` (no worker support).
    fn worker_spawner(&self) -> Option<Arc<dyn WorkerSpawner>> {
        None
    }
}
