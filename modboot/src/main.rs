//! # modboot
//!
//! Loads a WebAssembly module, starts its worker pool and calls its entry
//! point.
//!
//! # Usage
//!
//! ```bash
//! # Config file (artifact resolved relative to the file)
//! modboot --config app/modboot.toml
//!
//! # Artifact only, three workers, shared memory if the host has it
//! modboot pkg/app_bg.wasm --workers 3 --initial 18 --maximum 16384 --shared
//!
//! # JSON logs plus a JSON run report on stdout
//! modboot --config app/modboot.toml --json --report
//! ```

use clap::Parser;
use modboot::bootstrap::Bootstrapper;
use modboot::config::{BootConfig, ConfigOverrides, PoolFailurePolicy};
use modboot::runtimes::RuntimeRegistry;
use modboot_common::prelude::{ConfigError, LogLevel};
use std::path::{Path, PathBuf};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// modboot - WebAssembly module bootstrapper
#[derive(Parser, Debug)]
#[command(name = "modboot")]
#[command(version)]
#[command(about = "Instantiate a WebAssembly module, start its worker pool and call its entry point")]
#[command(long_about = None)]
struct Args {
    /// Path to a configuration file. Defaults to ./modboot.toml when no
    /// ARTIFACT is given.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Module artifact. Overrides `module.artifact`.
    #[arg(value_name = "ARTIFACT")]
    artifact: Option<PathBuf>,

    /// Runtime executing the module.
    #[arg(long)]
    runtime: Option<String>,

    /// Start a worker pool of this size.
    #[arg(short, long)]
    workers: Option<u32>,

    /// Entry point export.
    #[arg(short, long, value_name = "SYMBOL")]
    entry: Option<String>,

    /// Initial memory size in pages.
    #[arg(long, value_name = "PAGES")]
    initial: Option<u32>,

    /// Maximum memory size in pages.
    #[arg(long, value_name = "PAGES")]
    maximum: Option<u32>,

    /// Request shared memory.
    #[arg(long)]
    shared: bool,

    /// Reaction to a worker pool failure.
    #[arg(long, value_enum)]
    pool_failure: Option<FailurePolicyArg>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Print a JSON run report on stdout.
    #[arg(long)]
    report: bool,

    /// Keep the module and its pool alive until Ctrl+C.
    #[arg(long)]
    hold: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FailurePolicyArg {
    Abort,
    Degrade,
}

impl From<FailurePolicyArg> for PoolFailurePolicy {
    fn from(arg: FailurePolicyArg) -> Self {
        match arg {
            FailurePolicyArg::Abort => PoolFailurePolicy::Abort,
            FailurePolicyArg::Degrade => PoolFailurePolicy::Degrade,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let loaded = load_config(&args);
    let level = loaded
        .as_ref()
        .map(|(config, _)| config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    let (config, base_dir) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let registry = RuntimeRegistry::with_builtin();
    let mut boot = match Bootstrapper::from_config(&config, &base_dir, &registry) {
        Ok(boot) => boot,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    // Terminal failures are logged by the bootstrapper itself.
    let result = boot.run().await;

    if args.report {
        match serde_json::to_string_pretty(&boot.report()) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("Failed to serialize run report: {e}"),
        }
    }

    if result.is_err() {
        std::process::exit(1);
    }

    if args.hold {
        info!("{} ready, press Ctrl+C to exit", config.shared.service_name);
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
        }
    }
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            artifact: self.artifact.clone(),
            runtime: self.runtime.clone(),
            entry_symbol: self.entry.clone(),
            initial: self.initial,
            maximum: self.maximum,
            shared: self.shared,
            workers: self.workers,
            on_failure: self.pool_failure.map(Into::into),
        }
    }
}

/// Build the effective configuration: file (if any), then CLI overrides.
fn load_config(args: &Args) -> Result<(BootConfig, PathBuf), ConfigError> {
    let (mut config, base_dir) = BootConfig::discover(
        args.config.as_deref(),
        args.artifact.as_deref(),
        Path::new("."),
    )?;
    config.apply_overrides(&args.overrides())?;
    Ok((config, base_dir))
}

/// Log filter: `RUST_LOG` plus the CLI or configured level.
fn env_filter(verbose: bool, level: LogLevel) -> EnvFilter {
    let level = if verbose {
        Level::DEBUG
    } else {
        level
            .as_directive()
            .parse::<Level>()
            .unwrap_or(Level::INFO)
    };

    EnvFilter::from_default_env().add_directive(level.into())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let filter = env_filter(args.verbose, level);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modboot_common::prelude::MemoryConfig;

    const APP_TOML: &str = r#"
[module]
artifact = "pkg/app_bg.wasm"

[module.memory]
initial = 18
maximum = 16384
shared = true

[pool]
workers = 3
"#;

    fn config_file() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.toml"), APP_TOML).unwrap();
        dir
    }

    fn load(dir: &tempfile::TempDir, extra: &[&str]) -> Result<BootConfig, ConfigError> {
        let path = dir.path().join("app.toml");
        let mut argv = vec!["modboot", "--config", path.to_str().unwrap()];
        argv.extend_from_slice(extra);
        load_config(&Args::parse_from(argv)).map(|(config, _)| config)
    }

    #[test]
    fn initial_flag_keeps_file_maximum_and_shared() {
        let dir = config_file();
        let config = load(&dir, &["--initial", "20"]).unwrap();
        assert_eq!(config.module.memory, Some(MemoryConfig::shared(20, 16384)));
    }

    #[test]
    fn cli_values_override_file() {
        let dir = config_file();
        let config = load(
            &dir,
            &["other.wasm", "--workers", "6", "--entry", "start", "--pool-failure", "degrade"],
        )
        .unwrap();
        assert_eq!(config.module.artifact, PathBuf::from("other.wasm"));
        assert_eq!(config.module.entry_symbol, "start");
        let pool = config.pool.unwrap();
        assert_eq!(pool.workers, 6);
        assert_eq!(pool.on_failure, PoolFailurePolicy::Degrade);
    }

    #[test]
    fn unknown_runtime_passes_config_but_not_registry() {
        let dir = config_file();
        let config = load(&dir, &["--runtime", "v8"]).unwrap();
        assert_eq!(config.module.runtime, "v8");
        assert!(RuntimeRegistry::with_builtin().create("v8").is_none());
    }

    #[test]
    fn pool_failure_without_pool_rejected() {
        let args = Args::parse_from(["modboot", "app.wasm", "--pool-failure", "abort"]);
        assert!(matches!(
            load_config(&args),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn artifact_only_uses_defaults() {
        let args = Args::parse_from(["modboot", "app.wasm", "--workers", "3"]);
        let (config, base_dir) = load_config(&args).unwrap();
        assert_eq!(base_dir, PathBuf::from("."));
        assert_eq!(config.pool.map(|pool| pool.workers), Some(3));
        assert_eq!(config.module.memory, None);
    }

    #[test]
    fn verbose_adds_debug_directive() {
        let filter = env_filter(true, LogLevel::Warn).to_string().to_lowercase();
        assert!(filter.contains("debug"), "{filter}");

        let filter = env_filter(false, LogLevel::Warn).to_string().to_lowercase();
        assert!(filter.contains("warn"), "{filter}");
    }
}
