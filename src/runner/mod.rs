//! Command-line batch runner
//!
//! Loads accounts from CSV, applies the actions of a second CSV file and
//! writes the resulting accounts (and optionally the ledger) back out.
//!
//! # Architecture
//!
//! ```text
//! Runner
//!     ├── EngineConfig (currency scale, batch size, worker threads)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (account partitioning + tokio tasks)
//!     └── ActionProcessor
//!         ├── MemoryAccountStore
//!         ├── MemoryLedgerStore
//!         └── LoggingNotificationSink
//! ```
//!
//! Batches are applied one after another, so an account touched in several
//! batches sees its actions in file order. Rejected actions are logged and
//! skipped.

pub mod batch;

pub use batch::{BatchProcessor, ProcessingResult};

use crate::config::EngineConfig;
use crate::core::memory::{LoggingNotificationSink, MemoryAccountStore, MemoryLedgerStore};
use crate::core::ActionProcessor;
use crate::io::csv_format::{
    convert_account_record, convert_action_record, write_accounts_csv, write_ledger_csv,
    AccountRecord, ActionRecord,
};
use crate::io::AsyncReader;
use crate::types::FeeFineError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{info, warn};

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub accounts: usize,
    pub applied: usize,
    pub rejected: usize,
    pub entries: usize,
    pub notices: usize,
}

/// Input and output locations of a run
#[derive(Debug, Clone, Copy)]
pub struct RunPaths<'a> {
    pub accounts: &'a Path,
    pub actions: &'a Path,
    pub ledger_out: Option<&'a Path>,
}

#[derive(Debug, Clone)]
pub struct Runner {
    config: EngineConfig,
}

impl Runner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Run the whole pipeline on a fresh multi-threaded runtime
    ///
    /// # Arguments
    ///
    /// * `paths` - Accounts and actions input, optional ledger output
    /// * `output` - Receives the final accounts as CSV
    ///
    /// # Errors
    ///
    /// Only fatal problems are returned: the runtime cannot start, an input
    /// file cannot be opened or an output cannot be written.
    pub fn run(&self, paths: RunPaths<'_>, output: &mut dyn Write) -> Result<RunSummary, FeeFineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.batch.worker_threads)
            .build()
            .map_err(|e| FeeFineError::Io {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(self.run_async(paths, output))
    }

    async fn run_async(&self, paths: RunPaths<'_>, output: &mut dyn Write) -> Result<RunSummary, FeeFineError> {
        let scale = self.config.scale();
        let batch_size = self.config.batch.batch_size;

        let accounts = Arc::new(MemoryAccountStore::with_accounts(
            open_csv(paths.accounts)
                .await?
                .read_all::<AccountRecord, _, _>(batch_size, |record| {
                    convert_account_record(record, scale)
                })
                .await,
        ));
        let ledger = Arc::new(MemoryLedgerStore::new());
        let notifications = Arc::new(LoggingNotificationSink::new());
        info!(accounts = accounts.len(), currency = %self.config.currency.code, "loaded accounts");

        let processor = BatchProcessor::new(ActionProcessor::new(
            accounts.clone(),
            ledger.clone(),
            notifications.clone(),
            scale,
        ));

        let mut summary = RunSummary {
            accounts: accounts.len(),
            ..RunSummary::default()
        };
        let mut reader = open_csv(paths.actions).await?;
        loop {
            let before = reader.rows_read();
            let batch = reader
                .read_batch::<ActionRecord, _, _>(batch_size, convert_action_record)
                .await;
            if reader.rows_read() == before {
                break;
            }

            // Wait for the whole batch before reading the next one so that
            // actions on one account never overtake each other
            tally(processor.process_batch(batch).await, &mut summary);
        }

        write_accounts_csv(&accounts.all_accounts(), output)?;

        if let Some(path) = paths.ledger_out {
            let mut file = std::fs::File::create(path).map_err(|e| FeeFineError::Io {
                message: format!("Failed to create ledger file '{}': {}", path.display(), e),
            })?;
            write_ledger_csv(&ledger.all_entries(), &mut file)?;
        }

        summary.entries = ledger.len();
        summary.notices = notifications.sent();
        info!(
            applied = summary.applied,
            rejected = summary.rejected,
            entries = summary.entries,
            notices = summary.notices,
            "run complete"
        );

        Ok(summary)
    }
}

async fn open_csv(path: &Path) -> Result<AsyncReader<Compat<tokio::fs::File>>, FeeFineError> {
    let file = tokio::fs::File::open(path).await.map_err(|e| FeeFineError::Io {
        message: format!("Failed to open file '{}': {}", path.display(), e),
    })?;

    // Wrap tokio file in a compatibility layer for csv-async
    Ok(AsyncReader::new(file.compat()))
}

fn tally(results: Vec<ProcessingResult>, summary: &mut RunSummary) {
    for ProcessingResult { request, result } in results {
        match result {
            Ok(_) => summary.applied += 1,
            Err(e) => {
                summary.rejected += 1;
                warn!(
                    action = %request.kind,
                    accounts = %request.account_ids.join(";"),
                    amount = request.amount.as_deref().unwrap_or_default(),
                    status = e.status_code(),
                    error = %e,
                    "action rejected"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ACCOUNTS_HEADER: &str = "id,user_id,fee_fine_type,amount,remaining,status,payment_status,created_at\n";
    const ACTIONS_HEADER: &str =
        "action,accounts,amount,payment_method,transaction_info,comments,notify,service_point,user_name,reason\n";

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(header: &str, rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(header.as_bytes()).expect("Failed to write header");
        file.write_all(rows.as_bytes()).expect("Failed to write rows");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn runner(batch_size: usize) -> Runner {
        Runner::new(EngineConfig {
            batch: BatchConfig::new(batch_size, 2),
            ..EngineConfig::default()
        })
    }

    fn run(runner: &Runner, accounts: &NamedTempFile, actions: &NamedTempFile) -> (RunSummary, String) {
        let mut output = Vec::new();
        let summary = runner
            .run(
                RunPaths {
                    accounts: accounts.path(),
                    actions: actions.path(),
                    ledger_out: None,
                },
                &mut output,
            )
            .unwrap();
        (summary, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_applies_actions_and_writes_accounts() {
        let accounts = create_temp_csv(
            ACCOUNTS_HEADER,
            "a,u-1,Lost item,10.00,,,,2024-01-01T00:00:00Z\n",
        );
        let actions = create_temp_csv(ACTIONS_HEADER, "pay,a,4.00\n");

        let (summary, output) = run(&runner(10), &accounts, &actions);

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.entries, 1);
        assert!(output.contains("a,u-1,Lost item,10.00,6.00,Open,Paid partially,2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_rejected_actions_are_counted_not_fatal() {
        let accounts = create_temp_csv(ACCOUNTS_HEADER, "a,u-1,Lost item,10.00,,,,\n");
        let actions = create_temp_csv(ACTIONS_HEADER, "pay,a,11.00\npay,missing,1.00\nwaive,a,10.00\n");

        let (summary, output) = run(&runner(10), &accounts, &actions);

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.rejected, 2);
        assert!(output.contains("0.00,Closed,Waived fully"));
    }

    #[test]
    fn test_order_kept_across_batches() {
        let accounts = create_temp_csv(ACCOUNTS_HEADER, "a,u-1,Lost item,10.00,,,,\nb,u-1,Lost item,10.00,,,,\n");
        let actions = create_temp_csv(
            ACTIONS_HEADER,
            "pay,a,3.00\nwaive,b,1.00\npay,a,7.00\nrefund,a,10.00\nbogus,a,1\ncancel,b,\n",
        );

        let (summary, output) = run(&runner(2), &accounts, &actions);

        assert_eq!(summary.applied, 5);
        assert!(output.contains("a,u-1,Lost item,10.00,0.00,Closed,Refunded fully"));
        assert!(output.contains("b,u-1,Lost item,10.00,0.00,Closed,Cancelled as error"));
    }

    #[test]
    fn test_writes_ledger_file() {
        let accounts = create_temp_csv(ACCOUNTS_HEADER, "a,u-1,Lost item,10.00,,,,\n");
        let actions = create_temp_csv(ACTIONS_HEADER, "pay,a,4.00\npay,a,6.00\n");
        let ledger = NamedTempFile::new().unwrap();

        let mut output = Vec::new();
        runner(10)
            .run(
                RunPaths {
                    accounts: accounts.path(),
                    actions: actions.path(),
                    ledger_out: Some(ledger.path()),
                },
                &mut output,
            )
            .unwrap();

        let contents = std::fs::read_to_string(ledger.path()).unwrap();
        let rows: Vec<&str> = contents.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("Paid partially,4.00,6.00"));
        assert!(rows[1].contains("Paid fully,6.00,0.00"));
    }

    #[test]
    fn test_missing_input_file() {
        let actions = create_temp_csv(ACTIONS_HEADER, "");
        let mut output = Vec::new();

        let result = runner(10).run(
            RunPaths {
                accounts: Path::new("nonexistent.csv"),
                actions: actions.path(),
                ledger_out: None,
            },
            &mut output,
        );

        match result {
            Err(FeeFineError::Io { message }) => assert!(message.contains("Failed to open file")),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
