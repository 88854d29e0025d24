//! Error types for bootstrap operations.

use modboot_common::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// The module artifact failed to load or initialize.
///
/// Terminal: the bootstrap sequence never continues past it.
#[derive(Error, Debug)]
pub enum InstantiationError {
    /// Artifact file does not exist
    #[error("Module artifact not found: {}", path.display())]
    ArtifactNotFound {
        /// Resolved artifact path
        path: PathBuf,
    },

    /// Artifact file exists but could not be read
    #[error("Failed to read module artifact {}: {source}", path.display())]
    ArtifactRead {
        /// Resolved artifact path
        path: PathBuf,
        /// Source IO error
        source: std::io::Error,
    },

    /// Binary failed to parse or validate
    #[error("Malformed module: {0}")]
    Compile(String),

    /// Memory region could not be created with the requested limits
    #[error("Failed to create module memory: {0}")]
    Memory(String),

    /// Imports could not be satisfied
    #[error("Failed to link module: {0}")]
    Link(String),

    /// The module's start function trapped
    #[error("Module start function failed: {0}")]
    Start(String),

    /// The blocking instantiation task did not complete
    #[error("Instantiation task aborted: {0}")]
    Aborted(String),
}

/// A call into an instantiated module failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// No export with this name
    #[error("Export not found: {0}")]
    MissingExport(String),

    /// Export exists but has an unexpected signature
    #[error("Export {symbol} has signature {found}, expected {expected}")]
    SignatureMismatch {
        /// Export name
        symbol: String,
        /// Expected signature
        expected: &'static str,
        /// Actual signature
        found: String,
    },

    /// Execution trapped
    #[error("Call to {symbol} trapped: {reason}")]
    Trap {
        /// Export name
        symbol: String,
        /// Trap description
        reason: String,
    },

    /// Module-defined failure code returned from an export
    #[error("Call to {symbol} returned error code {code}")]
    ErrorCode {
        /// Export name
        symbol: String,
        /// Non-zero return value
        code: i32,
    },
}

/// Worker pool startup or dispatch failed.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Requested pool size is outside `1..=MAX_POOL_WORKERS`
    #[error("Invalid pool size: {0}")]
    InvalidSize(usize),

    /// The module exposes no worker spawner
    #[error("Module does not support a worker pool")]
    Unsupported,

    /// OS thread for a worker could not be created
    #[error("Failed to spawn worker {index}: {source}")]
    Spawn {
        /// Worker index
        index: usize,
        /// Source IO error
        source: std::io::Error,
    },

    /// A worker failed to come up
    #[error("Worker {index} failed to start: {reason}")]
    WorkerFailed {
        /// Worker index
        index: usize,
        /// Failure description
        reason: String,
    },

    /// The module's pool-init export failed
    #[error("Pool initialization call failed: {0}")]
    Init(#[from] ModuleError),

    /// A job dispatched to a worker failed
    #[error("Worker job failed: {0}")]
    Job(ModuleError),

    /// The pool was shut down before the job completed
    #[error("Worker pool is closed")]
    Closed,
}

/// Terminal failure of a bootstrap run.
#[derive(Error, Debug)]
pub enum BootError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Instantiation failed
    #[error("Module instantiation failed: {0}")]
    Instantiation(#[from] InstantiationError),

    /// Worker pool failed under the abort policy
    #[error("Worker pool initialization failed: {0}")]
    Pool(#[from] PoolError),

    /// Entry point failed
    #[error("Entry point failed: {0}")]
    Entry(#[from] ModuleError),

    /// Operation attempted in the wrong phase
    #[error("Invalid bootstrap transition: {0}")]
    InvalidTransition(&'static str),
}

/// Result type for bootstrap operations
pub type BootResult<T> = Result<T, BootError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instantiation_error_display_names_path() {
        let err = InstantiationError::ArtifactNotFound {
            path: PathBuf::from("/srv/app_bg.wasm"),
        };
        assert!(err.to_string().contains("/srv/app_bg.wasm"));
    }

    #[test]
    fn boot_error_wraps_cause() {
        let err: BootError = InstantiationError::Compile("bad magic".to_string()).into();
        let text = err.to_string();
        assert!(text.contains("instantiation failed"));
        assert!(text.contains("bad magic"));
    }

    #[test]
    fn pool_error_from_module_error() {
        let err: PoolError = ModuleError::MissingExport("initThreadPool".to_string()).into();
        assert!(matches!(err, PoolError::Init(ModuleError::MissingExport(_))));
    }
}
