//! modboot Common Library
//!
//! Shared constants, configuration loading and memory configuration for
//! all modboot workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`memory`] - Linear-memory configuration record
//! - [`consts`] - Workspace-wide limits and default symbol names
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use modboot_common::config::{ConfigLoader, SharedConfig};
//! use modboot_common::memory::MemoryConfig;
//! ```

pub mod config;
pub mod consts;
pub mod memory;
pub mod prelude;
