use clap::Parser;
use std::path::PathBuf;

/// Apply fee/fine actions from a CSV file to a set of accounts
#[derive(Parser, Debug)]
#[command(name = "feefine-engine")]
#[command(about = "Apply pay, waive, transfer, refund and cancel actions to fee/fine accounts", long_about = None)]
pub struct CliArgs {
    /// CSV file with the starting accounts
    #[arg(long = "accounts", value_name = "FILE")]
    pub accounts: PathBuf,

    /// CSV file with the actions to apply, in order
    #[arg(long = "actions", value_name = "FILE")]
    pub actions: PathBuf,

    /// Where to write every ledger entry recorded during the run
    #[arg(long = "ledger-out", value_name = "FILE")]
    pub ledger_out: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of actions read per batch
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of actions read per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads of the async runtime
    #[arg(
        long = "worker-threads",
        value_name = "COUNT",
        help = "Worker threads of the async runtime (default: CPU cores)"
    )]
    pub worker_threads: Option<usize>,

    /// Log filter, overrides the configuration file and RUST_LOG
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}
