//! The module bootstrapper.
//!
//! Drives one module through the phases of [`crate::state`]:
//! capability probe, instantiation, optional worker pool, entry point.
//! Each phase suspends the caller until it completes; engine work runs on
//! tokio's blocking pool so the executor is never stalled.
//!
//! # Example
//!
//! ```rust,no_run
//! use modboot::bootstrap::{BootOptions, Bootstrapper};
//! use modboot::runtimes::WasmiRuntime;
//! use std::sync::Arc;
//!
//! # async fn run() -> modboot::error::BootResult<()> {
//! let options = BootOptions::new(".", "pkg/app_bg.wasm");
//! let mut boot = Bootstrapper::new(Arc::new(WasmiRuntime::new()), options);
//! boot.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::artifact::ModuleArtifact;
use crate::capability::{Capabilities, HostCapabilities, ModuleSymbols};
use crate::config::{BootConfig, PoolFailurePolicy};
use crate::error::{BootError, BootResult, InstantiationError, ModuleError, PoolError};
use crate::pool::WorkerPool;
use crate::runtime::{ModuleHandle, ModuleRuntime};
use crate::runtimes::RuntimeRegistry;
use crate::state::{BootEvent, BootPhase, BootStateMachine, TransitionResult};
use modboot_common::config::ConfigError;
use modboot_common::memory::MemoryConfig;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Worker pool request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Number of workers.
    pub workers: u32,
    /// Reaction to a pool start failure.
    pub on_failure: PoolFailurePolicy,
}

/// Inputs of one bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootOptions {
    /// Directory relative artifact locations are resolved against.
    pub base_dir: PathBuf,
    /// Artifact location.
    pub artifact: PathBuf,
    /// Memory limits; module-defined memory when `None`.
    pub memory: Option<MemoryConfig>,
    /// Export and import names.
    pub symbols: ModuleSymbols,
    /// Worker pool request.
    pub pool: Option<PoolOptions>,
}

impl BootOptions {
    /// Load `artifact` from `base_dir` with default symbols, no memory
    /// configuration and no pool.
    pub fn new(base_dir: impl Into<PathBuf>, artifact: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            artifact: artifact.into(),
            memory: None,
            symbols: ModuleSymbols::default(),
            pool: None,
        }
    }

    /// Set the memory configuration.
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Request a worker pool.
    pub fn with_pool(mut self, workers: u32, on_failure: PoolFailurePolicy) -> Self {
        self.pool = Some(PoolOptions {
            workers,
            on_failure,
        });
        self
    }

    /// Options described by a validated configuration.
    pub fn from_config(config: &BootConfig, base_dir: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            artifact: config.module.artifact.clone(),
            memory: config.module.memory,
            symbols: config.symbols()?,
            pool: config.pool.as_ref().map(|pool| PoolOptions {
                workers: pool.workers,
                on_failure: pool.on_failure,
            }),
        })
    }
}

/// Serializable summary of a bootstrap run.
#[derive(Debug, Clone, Serialize)]
pub struct BootReport {
    /// Runtime that executed the module.
    pub runtime: &'static str,
    /// Host probe result, once probed.
    pub host: Option<HostCapabilities>,
    /// Phases entered, in order.
    pub phases: Vec<BootPhase>,
    /// Last phase reached.
    pub outcome: BootPhase,
    /// Module capability names.
    pub capabilities: Vec<&'static str>,
    /// Memory configuration actually handed to the runtime.
    pub memory: Option<MemoryConfig>,
    /// Size of the running worker pool.
    pub pool_workers: Option<usize>,
    /// Whether the entry point was invoked.
    pub entry_called: bool,
    /// Terminal error, if any.
    pub error: Option<String>,
}

/// Owns the runtime, the module handle and the worker pool of one module.
pub struct Bootstrapper {
    runtime: Arc<dyn ModuleRuntime>,
    options: BootOptions,
    state: BootStateMachine,
    host: Option<HostCapabilities>,
    memory: Option<MemoryConfig>,
    handle: Option<Box<dyn ModuleHandle>>,
    pool: Option<WorkerPool>,
    entry_called: bool,
    error: Option<String>,
}

impl Bootstrapper {
    /// Create a bootstrapper in `Idle`.
    pub fn new(runtime: Arc<dyn ModuleRuntime>, options: BootOptions) -> Self {
        Self {
            runtime,
            options,
            state: BootStateMachine::new(),
            host: None,
            memory: None,
            handle: None,
            pool: None,
            entry_called: false,
            error: None,
        }
    }

    /// Create a bootstrapper for a validated configuration, picking the
    /// runtime from `registry`.
    ///
    /// # Errors
    /// `BootError::Config` if the runtime is unknown or the symbols are
    /// malformed.
    pub fn from_config(
        config: &BootConfig,
        base_dir: &Path,
        registry: &RuntimeRegistry,
    ) -> BootResult<Self> {
        let runtime = registry.create(&config.module.runtime).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "unknown runtime {:?} (available: {})",
                config.module.runtime,
                registry.names().join(", ")
            ))
        })?;
        let options = BootOptions::from_config(config, base_dir)?;
        Ok(Self::new(runtime, options))
    }

    /// Run every phase in order.
    ///
    /// Stops at the first terminal failure, which has already been logged.
    pub async fn run(&mut self) -> BootResult<()> {
        self.probe()?;
        self.instantiate().await?;
        self.init_pool().await?;
        self.invoke_entry().await
    }

    /// Capability probe. Logs `capability=<bool>` before anything else.
    pub fn probe(&mut self) -> BootResult<HostCapabilities> {
        self.transition(BootEvent::Probe)?;

        let host = HostCapabilities::probe(self.runtime.as_ref());
        info!("capability={}", host.shared_memory);
        debug!(
            runtime = self.runtime.name(),
            parallelism = host.parallelism,
            "host probed"
        );

        self.host = Some(host);
        Ok(host)
    }

    /// Load and instantiate the module.
    ///
    /// A shared memory request on a host without shared memory is
    /// downgraded to private memory with a warning.
    ///
    /// # Errors
    /// `BootError::Instantiation`; terminal, logged once.
    pub async fn instantiate(&mut self) -> BootResult<()> {
        self.transition(BootEvent::Instantiate)?;

        let shared_available = self.host.is_some_and(|host| host.shared_memory);
        self.memory = self.options.memory.map(|memory| {
            if memory.shared && !shared_available {
                warn!("shared memory requested but unavailable on this host; using private memory");
                memory.into_private()
            } else {
                memory
            }
        });
        if let Some(memory) = self.memory {
            debug!(
                initial_bytes = memory.initial_bytes(),
                maximum = ?memory.maximum,
                shared = memory.shared,
                "memory configured"
            );
        }

        let loaded = self.load_module().await;
        match loaded {
            Ok(handle) => {
                info!("module initialized");
                debug!("module capabilities: {:?}", handle.capabilities().names());
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    async fn load_module(&self) -> Result<Box<dyn ModuleHandle>, InstantiationError> {
        let artifact = ModuleArtifact::load(&self.options.base_dir, &self.options.artifact).await?;
        let runtime = Arc::clone(&self.runtime);
        let memory = self.memory;
        let symbols = self.options.symbols.clone();

        tokio::task::spawn_blocking(move || runtime.instantiate(&artifact, memory, &symbols))
            .await
            .map_err(|e| InstantiationError::Aborted(e.to_string()))?
    }

    /// Start the worker pool and call the module's pool-init export.
    ///
    /// Skipped when no pool was requested or the module has no pool-init
    /// export.
    ///
    /// # Errors
    /// `BootError::Pool` under [`PoolFailurePolicy::Abort`]; terminal,
    /// logged once. Under `Degrade` the failure is logged as a warning and
    /// the run continues without a pool.
    pub async fn init_pool(&mut self) -> BootResult<()> {
        let Some(request) = self.options.pool else {
            debug!("no worker pool requested");
            return Ok(());
        };
        if !self.capabilities()?.contains(Capabilities::POOL_INIT) {
            debug!(
                "module exposes no {}; skipping worker pool",
                self.options.symbols.pool_init
            );
            return Ok(());
        }

        self.transition(BootEvent::StartPool)?;

        let started = self.start_pool(request.workers).await;
        match started {
            Ok(pool) => {
                debug!(workers = pool.size(), "worker pool initialized");
                self.pool = Some(pool);
                Ok(())
            }
            Err(e) => match request.on_failure {
                PoolFailurePolicy::Abort => Err(self.fail(e.into())),
                PoolFailurePolicy::Degrade => {
                    warn!("worker pool unavailable, continuing single-threaded: {e}");
                    Ok(())
                }
            },
        }
    }

    async fn start_pool(&mut self, workers: u32) -> Result<WorkerPool, PoolError> {
        let spawner = self
            .handle
            .as_ref()
            .and_then(|handle| handle.worker_spawner())
            .ok_or(PoolError::Unsupported)?;

        let pool = WorkerPool::start(workers as usize, spawner).await?;

        let symbol = self.options.symbols.pool_init.clone();
        let init = self
            .with_handle(move |handle| handle.call_pool_init(workers))
            .await
            .unwrap_or_else(|reason| Err(ModuleError::Trap { symbol, reason }));

        if let Err(e) = init {
            pool.shutdown().await;
            return Err(e.into());
        }
        Ok(pool)
    }

    /// Call the entry point if the module exposes it, then enter `Ready`.
    ///
    /// # Errors
    /// `BootError::Entry` if the entry point traps; terminal, logged once.
    pub async fn invoke_entry(&mut self) -> BootResult<()> {
        self.transition(BootEvent::Invoke)?;

        if self.capabilities()?.contains(Capabilities::ENTRY_POINT) {
            let symbol = self.options.symbols.entry.clone();
            let result = self
                .with_handle(|handle| handle.call_entry())
                .await
                .unwrap_or_else(|reason| Err(ModuleError::Trap { symbol, reason }));

            if let Err(e) = result {
                return Err(self.fail(e.into()));
            }
            info!("entry called");
            self.entry_called = true;
        } else {
            debug!(
                "module exposes no {}; entry point skipped",
                self.options.symbols.entry
            );
        }

        self.transition(BootEvent::Complete)?;
        debug!("bootstrap complete");
        Ok(())
    }

    /// Run a blocking call against the module handle off the executor.
    ///
    /// A panic in `f` is returned as `Err` with the panic message; the
    /// handle is kept either way.
    async fn with_handle<R, F>(&mut self, f: F) -> Result<R, String>
    where
        R: Send + 'static,
        F: FnOnce(&mut Box<dyn ModuleHandle>) -> R + Send + 'static,
    {
        let mut handle = self
            .handle
            .take()
            .ok_or_else(|| "module handle is not available".to_string())?;

        let (handle, result) = tokio::task::spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut handle)));
            (handle, result)
        })
        .await
        .map_err(|e| e.to_string())?;

        self.handle = Some(handle);
        result.map_err(|payload| panic_message(payload.as_ref()))
    }

    fn capabilities(&self) -> BootResult<Capabilities> {
        self.handle
            .as_ref()
            .map(|handle| handle.capabilities())
            .ok_or(BootError::InvalidTransition("module is not instantiated"))
    }

    fn transition(&mut self, event: BootEvent) -> BootResult<BootPhase> {
        match self.state.handle_event(event) {
            TransitionResult::Ok(phase) => {
                debug!(?phase, "entered phase");
                Ok(phase)
            }
            TransitionResult::Rejected(reason) => Err(BootError::InvalidTransition(reason)),
        }
    }

    fn fail(&mut self, err: BootError) -> BootError {
        self.state.handle_event(BootEvent::Fail);
        error!("{err}");
        self.error = Some(err.to_string());
        err
    }

    /// Current phase.
    pub fn phase(&self) -> BootPhase {
        self.state.phase()
    }

    /// Phases entered so far.
    pub fn history(&self) -> &[BootPhase] {
        self.state.history()
    }

    /// The module handle, once instantiated.
    pub fn handle(&self) -> Option<&dyn ModuleHandle> {
        self.handle.as_deref()
    }

    /// The worker pool, if one is running.
    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    /// Summary of the run so far.
    pub fn report(&self) -> BootReport {
        BootReport {
            runtime: self.runtime.name(),
            host: self.host,
            phases: self.state.history().to_vec(),
            outcome: self.state.phase(),
            capabilities: self
                .handle
                .as_ref()
                .map(|handle| handle.capabilities().names())
                .unwrap_or_default(),
            memory: self.memory,
            pool_workers: self.pool.as_ref().map(WorkerPool::size),
            entry_called: self.entry_called,
            error: self.error.clone(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
