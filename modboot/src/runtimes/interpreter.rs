//! `wasmi`-backed module runtime.
//!
//! Compiles the artifact once and instantiates it into a fresh [`Store`]
//! for the main handle and for every pool worker. `wasmi` has no shared
//! linear memory, so each instance owns a private memory built from the
//! same [`MemoryConfig`].

use crate::artifact::ModuleArtifact;
use crate::capability::{Capabilities, ModuleSymbols};
use crate::error::{InstantiationError, ModuleError};
use crate::pool::{PoolWorker, WorkerSpawner};
use crate::runtime::{ModuleHandle, ModuleRuntime};
use modboot_common::memory::MemoryConfig;
use std::sync::Arc;
use tracing::debug;
use wasmi::core::ValType;
use wasmi::{Engine, ExternType, Func, Instance, Linker, Memory, MemoryType, Module, Store};

/// Runtime identifier reported in logs.
pub const RUNTIME_NAME: &str = "wasmi";

/// Module runtime on the `wasmi` interpreter.
#[derive(Clone, Default)]
pub struct WasmiRuntime {
    engine: Engine,
}

impl WasmiRuntime {
    /// Runtime with a default engine configuration.
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(&self, artifact: &ModuleArtifact) -> Result<Module, InstantiationError> {
        Module::new(&self.engine, artifact.bytes())
            .map_err(|e| InstantiationError::Compile(e.to_string()))
    }
}

/// Factory registered under [`RUNTIME_NAME`].
pub fn create_runtime() -> Arc<dyn ModuleRuntime> {
    Arc::new(WasmiRuntime::new())
}

impl ModuleRuntime for WasmiRuntime {
    fn name(&self) -> &'static str {
        RUNTIME_NAME
    }

    fn supports_shared_memory(&self) -> bool {
        false
    }

    fn instantiate(
        &self,
        artifact: &ModuleArtifact,
        memory: Option<MemoryConfig>,
        symbols: &ModuleSymbols,
    ) -> Result<Box<dyn ModuleHandle>, InstantiationError> {
        if let Some(config) = memory.filter(|config| config.shared) {
            return Err(InstantiationError::Memory(format!(
                "{RUNTIME_NAME} cannot create shared memories ({config:?})"
            )));
        }

        let module = self.compile(artifact)?;
        let template = InstanceTemplate::new(self.engine.clone(), module, memory, symbols.clone());
        debug!(
            "Resolved capabilities of {}: {:?}",
            artifact.path().display(),
            template.capabilities.names()
        );

        let (store, instance) = template.instantiate()?;
        Ok(Box::new(WasmiHandle {
            store,
            instance,
            template: Arc::new(template),
        }))
    }
}

/// Everything needed to stamp out another instance of the same module.
struct InstanceTemplate {
    engine: Engine,
    module: Module,
    memory: Option<MemoryConfig>,
    symbols: ModuleSymbols,
    capabilities: Capabilities,
    imported_memory: Option<MemoryType>,
}

impl InstanceTemplate {
    fn new(
        engine: Engine,
        module: Module,
        memory: Option<MemoryConfig>,
        symbols: ModuleSymbols,
    ) -> Self {
        let mut capabilities = Capabilities::empty();
        let mut imported_memory = None;

        for export in module.exports() {
            match export.ty() {
                ExternType::Func(_) if export.name() == symbols.entry => {
                    capabilities |= Capabilities::ENTRY_POINT;
                }
                ExternType::Func(_) if export.name() == symbols.pool_init => {
                    capabilities |= Capabilities::POOL_INIT;
                }
                ExternType::Memory(_) => capabilities |= Capabilities::EXPORTS_MEMORY,
                _ => {}
            }
        }

        for import in module.imports() {
            if let ExternType::Memory(ty) = import.ty() {
                if import.module() == symbols.memory_module && import.name() == symbols.memory_name
                {
                    capabilities |= Capabilities::IMPORTS_MEMORY;
                    imported_memory = Some(*ty);
                }
            }
        }

        Self {
            engine,
            module,
            memory,
            symbols,
            capabilities,
            imported_memory,
        }
    }

    fn memory_type(&self) -> Result<Option<MemoryType>, InstantiationError> {
        match (self.memory, self.imported_memory) {
            (Some(config), Some(_)) => MemoryType::new(config.initial, config.maximum)
                .map(Some)
                .map_err(|e| InstantiationError::Memory(e.to_string())),
            (None, declared) => Ok(declared),
            (Some(_), None) => {
                debug!("Module defines its own memory; configured memory is not used");
                Ok(None)
            }
        }
    }

    fn instantiate(&self) -> Result<(Store<()>, Instance), InstantiationError> {
        let mut store = Store::new(&self.engine, ());
        let mut linker = <Linker<()>>::new(&self.engine);

        if let Some(ty) = self.memory_type()? {
            let memory = Memory::new(&mut store, ty)
                .map_err(|e| InstantiationError::Memory(e.to_string()))?;
            linker
                .define(&self.symbols.memory_module, &self.symbols.memory_name, memory)
                .map_err(|e| InstantiationError::Link(e.to_string()))?;
        }

        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| InstantiationError::Link(e.to_string()))?
            .start(&mut store)
            .map_err(|e| InstantiationError::Start(e.to_string()))?;

        Ok((store, instance))
    }
}

impl WorkerSpawner for InstanceTemplate {
    fn spawn_worker(&self, index: usize) -> Result<Box<dyn PoolWorker>, ModuleError> {
        let (store, instance) = self.instantiate().map_err(|e| ModuleError::Trap {
            symbol: format!("worker {index} instantiation"),
            reason: e.to_string(),
        })?;
        Ok(Box::new(WasmiWorker { store, instance }))
    }
}

/// Main instance of a module loaded by [`WasmiRuntime`].
pub struct WasmiHandle {
    store: Store<()>,
    instance: Instance,
    template: Arc<InstanceTemplate>,
}

impl ModuleHandle for WasmiHandle {
    fn capabilities(&self) -> Capabilities {
        self.template.capabilities
    }

    fn call_entry(&mut self) -> Result<(), ModuleError> {
        let symbol = self.template.symbols.entry.clone();
        call_nullary(&mut self.store, &self.instance, &symbol)
    }

    fn call_pool_init(&mut self, workers: u32) -> Result<(), ModuleError> {
        let symbol = &self.template.symbols.pool_init;
        let func = export_func(&self.store, &self.instance, symbol)?;
        let count = i32::try_from(workers).map_err(|_| ModuleError::Trap {
            symbol: symbol.clone(),
            reason: format!("worker count {workers} does not fit in i32"),
        })?;
        let trap = |e: wasmi::Error| ModuleError::Trap {
            symbol: symbol.clone(),
            reason: e.to_string(),
        };

        let ty = func.ty(&self.store);
        match (ty.params(), ty.results()) {
            ([ValType::I32], []) => func
                .typed::<i32, ()>(&self.store)
                .map_err(trap)?
                .call(&mut self.store, count)
                .map_err(trap),
            ([ValType::I32], [ValType::I32]) => {
                let code = func
                    .typed::<i32, i32>(&self.store)
                    .map_err(trap)?
                    .call(&mut self.store, count)
                    .map_err(trap)?;
                if code == 0 {
                    Ok(())
                } else {
                    Err(ModuleError::ErrorCode {
                        symbol: symbol.clone(),
                        code,
                    })
                }
            }
            _ => Err(ModuleError::SignatureMismatch {
                symbol: symbol.clone(),
                expected: "(i32) -> () or (i32) -> i32",
                found: format!("{ty:?}"),
            }),
        }
    }

    fn worker_spawner(&self) -> Option<Arc<dyn WorkerSpawner>> {
        let template: Arc<dyn WorkerSpawner> = self.template.clone();
        Some(template)
    }
}

/// A pool worker's private instance.
struct WasmiWorker {
    store: Store<()>,
    instance: Instance,
}

impl PoolWorker for WasmiWorker {
    fn call(&mut self, symbol: &str) -> Result<(), ModuleError> {
        call_nullary(&mut self.store, &self.instance, symbol)
    }
}

fn export_func(store: &Store<()>, instance: &Instance, symbol: &str) -> Result<Func, ModuleError> {
    instance
        .get_func(store, symbol)
        .ok_or_else(|| ModuleError::MissingExport(symbol.to_string()))
}

fn call_nullary(store: &mut Store<()>, instance: &Instance, symbol: &str) -> Result<(), ModuleError> {
    let func = export_func(store, instance, symbol)?;
    let typed = func
        .typed::<(), ()>(&*store)
        .map_err(|_| ModuleError::SignatureMismatch {
            symbol: symbol.to_string(),
            expected: "() -> ()",
            found: format!("{:?}", func.ty(&*store)),
        })?;
    typed.call(store, ()).map_err(|e| ModuleError::Trap {
        symbol: symbol.to_string(),
        reason: e.to_string(),
    })
}
