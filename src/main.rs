//! Fee/Fine Engine CLI
//!
//! Command-line interface for applying fee/fine actions from CSV files.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv --actions actions.csv > result.csv
//! cargo run -- --accounts accounts.csv --actions actions.csv --ledger-out ledger.csv
//! cargo run -- --config engine.toml --batch-size 500 --worker-threads 4 \
//!     --accounts accounts.csv --actions actions.csv > result.csv
//! ```
//!
//! Final accounts go to stdout; logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success (individual actions may still have been rejected)
//! - 1: Error (bad configuration, file not found, output not writable, etc.)

use feefine_engine::cli;
use feefine_engine::config::LoggingConfig;
use feefine_engine::{EngineConfig, RunPaths, Runner};
use std::process;
use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(logging: &LoggingConfig, level_from_cli: bool) {
    // RUST_LOG wins over the config file, an explicit --log-level wins over both
    let filter = if level_from_cli {
        EnvFilter::try_new(&logging.level)
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))
    }
    .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn main() {
    let args = cli::parse_args();

    let mut config = match EngineConfig::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    init_tracing(&config.logging, args.log_level.is_some());
    config.batch = config.batch.normalized();

    let paths = RunPaths {
        accounts: &args.accounts,
        actions: &args.actions,
        ledger_out: args.ledger_out.as_deref(),
    };

    // Output goes to stdout
    let mut output = std::io::stdout();
    if let Err(e) = Runner::new(config).run(paths, &mut output) {
        error!(error = %e, "run failed");
        process::exit(1);
    }
}
