//! Workspace-wide constants.
//!
//! Single source of truth for limits and default symbol names.

/// Size of one WebAssembly linear-memory page in bytes.
pub const WASM_PAGE_SIZE: usize = 65_536;

/// Maximum page count of a 32-bit linear memory (4 GiB).
pub const MAX_MEMORY_PAGES: u32 = 65_536;

/// Upper bound on the worker pool size.
pub const MAX_POOL_WORKERS: u32 = 256;

/// Default service name reported in logs.
pub const DEFAULT_SERVICE_NAME: &str = "modboot";

/// Default export invoked once the module is ready.
pub const DEFAULT_ENTRY_SYMBOL: &str = "wasm_main";

/// Default export that sizes the module's worker pool.
pub const DEFAULT_POOL_INIT_SYMBOL: &str = "initThreadPool";

/// Default `module.name` pair under which a configured memory is imported.
pub const DEFAULT_MEMORY_IMPORT: &str = "env.memory";

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "modboot.toml";
