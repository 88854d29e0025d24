//! Bootstrapper configuration.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "demo-app"
//!
//! [module]
//! artifact = "pkg/demo_app_bg.wasm"
//! entry_symbol = "wasm_main"
//!
//! [module.memory]
//! initial = 18
//! maximum = 16384
//! shared = true
//!
//! [pool]
//! workers = 3
//! on_failure = "abort"
//! ```

use crate::capability::ModuleSymbols;
use crate::runtimes::DEFAULT_RUNTIME;
use modboot_common::config::{ConfigError, ConfigLoader, SharedConfig};
use modboot_common::consts::{
    DEFAULT_CONFIG_FILE, DEFAULT_ENTRY_SYMBOL, DEFAULT_MEMORY_IMPORT, DEFAULT_POOL_INIT_SYMBOL,
    MAX_POOL_WORKERS,
};
use modboot_common::memory::MemoryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do when the worker pool fails to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PoolFailurePolicy {
    /// Pool failure is terminal.
    #[default]
    Abort,
    /// Log a warning and continue without a pool.
    Degrade,
}

/// `[module]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSection {
    /// Artifact location, relative to the config file's directory.
    pub artifact: PathBuf,

    /// Runtime used to execute the module.
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// Export invoked once the module is ready.
    #[serde(default = "default_entry_symbol")]
    pub entry_symbol: String,

    /// `module.name` import under which a configured memory is provided.
    #[serde(default = "default_memory_import")]
    pub memory_import: String,

    /// Memory limits; module-defined memory when absent.
    #[serde(default)]
    pub memory: Option<MemoryConfig>,
}

/// `[pool]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSection {
    /// Number of workers.
    pub workers: u32,

    /// Export told the worker count once the pool is up.
    #[serde(default = "default_pool_init_symbol")]
    pub init_symbol: String,

    /// Reaction to a pool start failure.
    #[serde(default)]
    pub on_failure: PoolFailurePolicy,
}

/// Values given on the command line. Each `Some` (or a set `shared`)
/// replaces the matching file field; everything else keeps the file value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `module.artifact`
    pub artifact: Option<PathBuf>,
    /// `module.runtime`
    pub runtime: Option<String>,
    /// `module.entry_symbol`
    pub entry_symbol: Option<String>,
    /// `module.memory.initial`
    pub initial: Option<u32>,
    /// `module.memory.maximum`
    pub maximum: Option<u32>,
    /// Sets `module.memory.shared`.
    pub shared: bool,
    /// `pool.workers`; creates the `[pool]` table when absent.
    pub workers: Option<u32>,
    /// `pool.on_failure`; requires a pool.
    pub on_failure: Option<PoolFailurePolicy>,
}

/// Complete bootstrapper configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfig {
    /// Common fields.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Module to load.
    pub module: ModuleSection,

    /// Optional worker pool.
    #[serde(default)]
    pub pool: Option<PoolSection>,
}

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

fn default_entry_symbol() -> String {
    DEFAULT_ENTRY_SYMBOL.to_string()
}

fn default_memory_import() -> String {
    DEFAULT_MEMORY_IMPORT.to_string()
}

fn default_pool_init_symbol() -> String {
    DEFAULT_POOL_INIT_SYMBOL.to_string()
}

impl ModuleSection {
    /// Section for `artifact` with every other field defaulted.
    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            runtime: default_runtime(),
            entry_symbol: default_entry_symbol(),
            memory_import: default_memory_import(),
            memory: None,
        }
    }
}

impl PoolSection {
    /// Section for `workers` with every other field defaulted.
    pub fn new(workers: u32) -> Self {
        Self {
            workers,
            init_symbol: default_pool_init_symbol(),
            on_failure: PoolFailurePolicy::default(),
        }
    }
}

impl BootConfig {
    /// Configuration loading `artifact` with all defaults.
    pub fn for_artifact(artifact: impl Into<PathBuf>) -> Self {
        Self {
            shared: SharedConfig::default(),
            module: ModuleSection::new(artifact),
            pool: None,
        }
    }

    /// Load and validate a config file.
    ///
    /// Returns the config and the directory artifact paths are resolved
    /// against.
    pub fn load_file(path: &Path) -> Result<(Self, PathBuf), ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        let base_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((config, base_dir))
    }

    /// Pick the configuration source.
    ///
    /// An explicit `config` file wins. Otherwise an `artifact` gives an
    /// all-defaults configuration based in `search_dir`. With neither,
    /// `search_dir/modboot.toml` is loaded if it exists.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` if no source is available, or any
    /// error from [`BootConfig::load_file`].
    pub fn discover(
        config: Option<&Path>,
        artifact: Option<&Path>,
        search_dir: &Path,
    ) -> Result<(Self, PathBuf), ConfigError> {
        match (config, artifact) {
            (Some(path), _) => Self::load_file(path),
            (None, Some(artifact)) => Ok((Self::for_artifact(artifact), search_dir.to_path_buf())),
            (None, None) => {
                let default = search_dir.join(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load_file(&default)
                } else {
                    Err(ConfigError::ValidationError(format!(
                        "no artifact given and no {DEFAULT_CONFIG_FILE} in {}",
                        search_dir.display()
                    )))
                }
            }
        }
    }

    /// Merge command-line values over the file, field by field, and
    /// re-validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `maximum` or `shared` is given with no `initial` and no
    ///   `[module.memory]` table to take it from
    /// - `on_failure` is given but no pool is configured
    /// - the merged configuration fails [`BootConfig::validate`]
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(artifact) = &overrides.artifact {
            self.module.artifact = artifact.clone();
        }
        if let Some(runtime) = &overrides.runtime {
            self.module.runtime = runtime.clone();
        }
        if let Some(entry) = &overrides.entry_symbol {
            self.module.entry_symbol = entry.clone();
        }

        let touches_memory =
            overrides.initial.is_some() || overrides.maximum.is_some() || overrides.shared;
        if touches_memory {
            let mut memory = match (self.module.memory, overrides.initial) {
                (Some(memory), _) => memory,
                (None, Some(initial)) => MemoryConfig::private(initial, None),
                (None, None) => {
                    return Err(ConfigError::ValidationError(
                        "memory.initial is required when no [module.memory] is configured"
                            .to_string(),
                    ));
                }
            };
            if let Some(initial) = overrides.initial {
                memory.initial = initial;
            }
            if let Some(maximum) = overrides.maximum {
                memory.maximum = Some(maximum);
            }
            if overrides.shared {
                memory.shared = true;
            }
            self.module.memory = Some(memory);
        }

        if let Some(workers) = overrides.workers {
            self.pool.get_or_insert_with(|| PoolSection::new(workers)).workers = workers;
        }
        if let Some(policy) = overrides.on_failure {
            let pool = self.pool.as_mut().ok_or_else(|| {
                ConfigError::ValidationError(
                    "pool.on_failure given but no worker pool is configured".to_string(),
                )
            })?;
            pool.on_failure = policy;
        }

        self.validate()
    }

    /// Names the runtime resolves capabilities against.
    pub fn symbols(&self) -> Result<ModuleSymbols, ConfigError> {
        let pool_init = self
            .pool
            .as_ref()
            .map(|pool| pool.init_symbol.as_str())
            .unwrap_or(DEFAULT_POOL_INIT_SYMBOL);
        ModuleSymbols::new(&self.module.entry_symbol, pool_init, &self.module.memory_import)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `shared.service_name` is empty
    /// - `module.artifact` is empty
    /// - a symbol name or the memory import is malformed
    /// - `module.memory` limits are invalid
    /// - `pool.workers` is outside `1..=MAX_POOL_WORKERS`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.module.artifact.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "module.artifact cannot be empty".to_string(),
            ));
        }
        if self.module.runtime.is_empty() {
            return Err(ConfigError::ValidationError(
                "module.runtime cannot be empty".to_string(),
            ));
        }
        self.symbols()?;

        if let Some(memory) = &self.module.memory {
            memory.validate()?;
        }

        if let Some(pool) = &self.pool {
            if pool.workers == 0 || pool.workers > MAX_POOL_WORKERS {
                return Err(ConfigError::ValidationError(format!(
                    "pool.workers must be in 1..={MAX_POOL_WORKERS}, got {}",
                    pool.workers
                )));
            }
        }

        Ok(())
    }
}
