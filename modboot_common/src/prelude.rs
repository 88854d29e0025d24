//! Prelude module for common re-exports.
//!
//! ```rust
//! use modboot_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── Memory ─────────────────────────────────────────────────────────
pub use crate::memory::MemoryConfig;

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{
    DEFAULT_ENTRY_SYMBOL, DEFAULT_MEMORY_IMPORT, DEFAULT_POOL_INIT_SYMBOL, MAX_MEMORY_PAGES,
    MAX_POOL_WORKERS, WASM_PAGE_SIZE,
};
