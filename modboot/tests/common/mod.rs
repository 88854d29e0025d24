//! Shared fixtures: a log recorder and a scriptable mock runtime.

#![allow(dead_code)]

use modboot::artifact::ModuleArtifact;
use modboot::capability::{Capabilities, ModuleSymbols};
use modboot::error::{InstantiationError, ModuleError};
use modboot::pool::{PoolWorker, WorkerSpawner};
use modboot::runtime::{ModuleHandle, ModuleRuntime};
use modboot_common::memory::MemoryConfig;
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

// ─── Log recording ──────────────────────────────────────────────────

/// Captures the message of every event at `info` or above.
#[derive(Clone, Default)]
pub struct LogRecorder {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl LogRecorder {
    /// Install as the thread's default subscriber for the guard's lifetime.
    pub fn install() -> (Self, DefaultGuard) {
        let recorder = Self::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (recorder, guard)
    }

    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().clone()
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn info(&self) -> Vec<String> {
        self.messages_at(Level::INFO)
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages_at(Level::ERROR)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages_at(Level::WARN)
    }
}

impl<S: Subscriber> Layer<S> for LogRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::INFO {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.lines.lock().push((level, visitor.0));
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

// ─── Mock runtime ───────────────────────────────────────────────────

/// Ordered record of everything the mock was asked to do.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }
}

/// Runtime whose behavior is set per test.
#[derive(Clone)]
pub struct MockRuntime {
    pub shared_memory: bool,
    pub fail_instantiate: bool,
    pub capabilities: Capabilities,
    pub fail_worker: Option<usize>,
    pub pool_init_code: i32,
    pub entry_traps: bool,
    pub entry_panics: bool,
    pub journal: Journal,
    pub memory_seen: Arc<Mutex<Option<MemoryConfig>>>,
}

impl MockRuntime {
    /// Module with an entry point and a pool-init export that succeeds.
    pub fn new() -> Self {
        Self {
            shared_memory: false,
            fail_instantiate: false,
            capabilities: Capabilities::ENTRY_POINT | Capabilities::POOL_INIT,
            fail_worker: None,
            pool_init_code: 0,
            entry_traps: false,
            entry_panics: false,
            journal: Journal::default(),
            memory_seen: Arc::new(Mutex::new(None)),
        }
    }

    pub fn into_arc(self) -> Arc<dyn ModuleRuntime> {
        Arc::new(self)
    }
}

impl ModuleRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn supports_shared_memory(&self) -> bool {
        self.shared_memory
    }

    fn instantiate(
        &self,
        artifact: &ModuleArtifact,
        memory: Option<MemoryConfig>,
        symbols: &ModuleSymbols,
    ) -> Result<Box<dyn ModuleHandle>, InstantiationError> {
        self.journal.push("instantiate");
        *self.memory_seen.lock() = memory;

        if self.fail_instantiate {
            return Err(InstantiationError::Link(format!(
                "{}: unknown import env.missing",
                artifact.path().display()
            )));
        }

        Ok(Box::new(MockHandle {
            runtime: self.clone(),
            symbols: symbols.clone(),
        }))
    }
}

struct MockHandle {
    runtime: MockRuntime,
    symbols: ModuleSymbols,
}

impl ModuleHandle for MockHandle {
    fn capabilities(&self) -> Capabilities {
        self.runtime.capabilities
    }

    fn call_entry(&mut self) -> Result<(), ModuleError> {
        self.runtime.journal.push("entry");
        if self.runtime.entry_panics {
            panic!("host binding missing");
        }
        if self.runtime.entry_traps {
            return Err(ModuleError::Trap {
                symbol: self.symbols.entry.clone(),
                reason: "unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn call_pool_init(&mut self, workers: u32) -> Result<(), ModuleError> {
        self.runtime.journal.push(format!("pool_init({workers})"));
        match self.runtime.pool_init_code {
            0 => Ok(()),
            code => Err(ModuleError::ErrorCode {
                symbol: self.symbols.pool_init.clone(),
                code,
            }),
        }
    }

    fn worker_spawner(&self) -> Option<Arc<dyn WorkerSpawner>> {
        Some(Arc::new(MockSpawner {
            fail_worker: self.runtime.fail_worker,
            journal: self.runtime.journal.clone(),
        }))
    }
}

struct MockSpawner {
    fail_worker: Option<usize>,
    journal: Journal,
}

impl WorkerSpawner for MockSpawner {
    fn spawn_worker(&self, index: usize) -> Result<Box<dyn PoolWorker>, ModuleError> {
        if self.fail_worker == Some(index) {
            return Err(ModuleError::Trap {
                symbol: "start".to_string(),
                reason: "memory limit exceeded".to_string(),
            });
        }
        self.journal.push(format!("worker {index}"));
        Ok(Box::new(MockWorker))
    }
}

struct MockWorker;

impl PoolWorker for MockWorker {
    fn call(&mut self, _symbol: &str) -> Result<(), ModuleError> {
        Ok(())
    }
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Temp directory holding `name` with `bytes`.
pub fn artifact_dir(name: &str, bytes: &[u8]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(name), bytes).unwrap();
    dir
}

/// Temp directory holding a placeholder `app.wasm` for the mock runtime.
pub fn mock_artifact_dir() -> TempDir {
    artifact_dir("app.wasm", b"\0asm\x01\0\0\0")
}

/// Compile WebAssembly text and write it to `dir/name`.
pub fn write_wat(dir: &Path, name: &str, wat: &str) {
    let bytes = wat::parse_str(wat).unwrap();
    std::fs::write(dir.join(name), bytes).unwrap();
}
