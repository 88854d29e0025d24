//! Linear-memory configuration.
//!
//! A [`MemoryConfig`] is built once, validated, and handed by value to the
//! runtime at instantiation time. Page counts are in units of
//! [`WASM_PAGE_SIZE`](crate::consts::WASM_PAGE_SIZE).

use crate::config::ConfigError;
use crate::consts::{MAX_MEMORY_PAGES, WASM_PAGE_SIZE};
use serde::{Deserialize, Serialize};

/// Initial/maximum page counts and the shared flag of a module memory.
///
/// # TOML Example
///
/// ```toml
/// [module.memory]
/// initial = 18
/// maximum = 16384
/// shared = true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Pages allocated at instantiation.
    pub initial: u32,
    /// Upper bound the memory may grow to. Required for shared memories.
    #[serde(default)]
    pub maximum: Option<u32>,
    /// Request a memory shareable between workers.
    #[serde(default)]
    pub shared: bool,
}

impl MemoryConfig {
    /// Private memory with the given limits.
    pub const fn private(initial: u32, maximum: Option<u32>) -> Self {
        Self {
            initial,
            maximum,
            shared: false,
        }
    }

    /// Shared memory with the given limits.
    pub const fn shared(initial: u32, maximum: u32) -> Self {
        Self {
            initial,
            maximum: Some(maximum),
            shared: true,
        }
    }

    /// The same limits with the shared flag cleared.
    pub const fn into_private(self) -> Self {
        Self {
            shared: false,
            ..self
        }
    }

    /// Initial size in bytes.
    pub fn initial_bytes(&self) -> usize {
        self.initial as usize * WASM_PAGE_SIZE
    }

    /// Validate the page limits.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `initial` or `maximum` exceeds [`MAX_MEMORY_PAGES`]
    /// - `initial > maximum`
    /// - `shared` is set without a `maximum`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial > MAX_MEMORY_PAGES {
            return Err(ConfigError::ValidationError(format!(
                "memory.initial = {} exceeds {MAX_MEMORY_PAGES} pages",
                self.initial
            )));
        }
        match self.maximum {
            Some(maximum) if maximum > MAX_MEMORY_PAGES => {
                Err(ConfigError::ValidationError(format!(
                    "memory.maximum = {maximum} exceeds {MAX_MEMORY_PAGES} pages"
                )))
            }
            Some(maximum) if self.initial > maximum => Err(ConfigError::ValidationError(format!(
                "memory.initial = {} is larger than memory.maximum = {maximum}",
                self.initial
            ))),
            None if self.shared => Err(ConfigError::ValidationError(
                "a shared memory must declare memory.maximum".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
