//! # modboot
//!
//! Host-side bootstrapper for WebAssembly modules: probes the host, loads
//! and instantiates a module with an optional memory configuration, starts
//! a worker pool when the module supports one, and finally calls the
//! module's entry point.
//!
//! # Module Structure
//!
//! - [`bootstrap`] - Bootstrapper, phase sequencing, run report
//! - [`state`] - Phase state machine
//! - [`capability`] - Host probe and module capability flags
//! - [`artifact`] - Artifact resolution and loading
//! - [`runtime`] - `ModuleRuntime` / `ModuleHandle` traits
//! - [`runtimes`] - Runtime implementations and registry
//! - [`pool`] - Worker pool
//! - [`config`] - TOML configuration
//! - [`error`] - Error types
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          Bootstrapper                          │
//! │  probe ──► instantiate ──► init_pool (opt) ──► invoke_entry    │
//! │                │                 │                   │         │
//! └────────────────┼─────────────────┼───────────────────┼─────────┘
//!                  ▼                 ▼                   ▼
//!          ┌──────────────┐   ┌─────────────┐    ┌──────────────┐
//!          │ ModuleRuntime│   │ WorkerPool  │    │ ModuleHandle │
//!          │   (trait)    │   │ (N threads) │    │   (trait)    │
//!          └──────┬───────┘   └──────┬──────┘    └──────────────┘
//!                 ▼                  ▼
//!          ┌──────────────────────────────────┐
//!          │   WasmiRuntime (one instance     │
//!          │   per handle and per worker)     │
//!          └──────────────────────────────────┘
//! ```
//!
//! # Logging
//!
//! At `info` level a successful run logs exactly `capability=<bool>`,
//! `module initialized` and, if the module has an entry point,
//! `entry called`. A terminal failure logs one `error` line.

#![warn(missing_docs)]

pub mod artifact;
pub mod bootstrap;
pub mod capability;
pub mod config;
pub mod error;
pub mod pool;
pub mod runtime;
pub mod runtimes;
pub mod state;

// Re-export key types for convenience
pub use crate::bootstrap::{BootOptions, BootReport, Bootstrapper};
pub use crate::capability::{Capabilities, HostCapabilities, ModuleSymbols};
pub use crate::config::{BootConfig, PoolFailurePolicy};
pub use crate::error::{BootError, BootResult, InstantiationError, ModuleError, PoolError};
pub use crate::runtimes::{RuntimeRegistry, WasmiRuntime};
pub use crate::state::BootPhase;
