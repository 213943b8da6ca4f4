//! Engine configuration
//!
//! Settings come from an optional TOML file and are then overridden by
//! command-line flags. Every section and field has a default, so an empty
//! file (or no file at all) yields a working configuration.
//!
//! ```toml
//! [currency]
//! code = "USD"
//! fraction_digits = 2
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [batch]
//! batch_size = 1000
//! worker_threads = 8
//! ```

use crate::cli::CliArgs;
use crate::types::{FeeFineError, DEFAULT_SCALE, MAX_SCALE};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub currency: CurrencyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CurrencyConfig {
    /// ISO 4217 code, informational only
    #[serde(default = "default_currency_code")]
    pub code: String,

    /// Digits after the decimal point; every amount is rounded to this
    #[serde(default = "default_fraction_digits")]
    pub fraction_digits: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "feefine_engine=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

/// Batch reading and runtime sizing for the command-line runner
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BatchConfig {
    /// Actions read from the file per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Worker threads of the tokio runtime
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

fn default_currency_code() -> String {
    "USD".to_string()
}

fn default_fraction_digits() -> u32 {
    DEFAULT_SCALE
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            code: default_currency_code(),
            fraction_digits: default_fraction_digits(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            worker_threads: default_worker_threads(),
        }
    }
}

impl BatchConfig {
    pub fn new(batch_size: usize, worker_threads: usize) -> Self {
        Self {
            batch_size,
            worker_threads,
        }
        .normalized()
    }

    /// Replace zero values with defaults, with a warning
    pub fn normalized(self) -> Self {
        let default = Self::default();

        let batch_size = if self.batch_size == 0 {
            warn!(
                batch_size = self.batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            self.batch_size
        };

        let worker_threads = if self.worker_threads == 0 {
            warn!(
                worker_threads = self.worker_threads,
                default = default.worker_threads,
                "invalid worker_threads, using default"
            );
            default.worker_threads
        } else {
            self.worker_threads
        };

        Self {
            batch_size,
            worker_threads,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// `Parse` for malformed TOML or more fraction digits than a decimal can
    /// hold.
    pub fn from_toml(contents: &str) -> Result<Self, FeeFineError> {
        let config: Self = toml::from_str(contents).map_err(|e| FeeFineError::Parse {
            line: None,
            message: format!("Invalid configuration: {}", e),
        })?;

        if config.currency.fraction_digits > MAX_SCALE {
            return Err(FeeFineError::Parse {
                line: None,
                message: format!(
                    "Invalid configuration: fraction_digits {} exceeds the maximum of {}",
                    config.currency.fraction_digits, MAX_SCALE
                ),
            });
        }

        Ok(config)
    }

    /// Read a TOML file
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Parse` if it is not valid
    /// configuration.
    pub fn from_file(path: &Path) -> Result<Self, FeeFineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| FeeFineError::Io {
            message: format!("Failed to read config '{}': {}", path.display(), e),
        })?;
        Self::from_toml(&contents)
    }

    /// Configuration for a command-line run: file (if given), then flags
    pub fn load(cli: &CliArgs) -> Result<Self, FeeFineError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        // CLI overrides
        if let Some(batch_size) = cli.batch_size {
            config.batch.batch_size = batch_size;
        }
        if let Some(worker_threads) = cli.worker_threads {
            config.batch.worker_threads = worker_threads;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        Ok(config)
    }

    /// Fraction digits amounts are rounded to
    pub fn scale(&self) -> u32 {
        self.currency.fraction_digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args(extra: &[&str]) -> CliArgs {
        let mut all = vec!["feefine-engine", "--accounts", "a.csv", "--actions", "b.csv"];
        all.extend_from_slice(extra);
        CliArgs::try_parse_from(all).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.currency.code, "USD");
        assert_eq!(config.scale(), 2);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.batch.batch_size, 1000);
        assert_eq!(config.batch.worker_threads, num_cpus::get());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = EngineConfig::from_toml("[currency]\ncode = \"JPY\"\nfraction_digits = 0\n").unwrap();

        assert_eq!(config.currency.code, "JPY");
        assert_eq!(config.scale(), 0);
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.batch.batch_size, 1000);
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let result = EngineConfig::from_toml("[batch]\nbatch_size = \"lots\"\n");
        assert!(matches!(result, Err(FeeFineError::Parse { .. })));
    }

    #[rstest]
    #[case::at_limit(28, true)]
    #[case::beyond_limit(29, false)]
    #[case::far_beyond_limit(255, false)]
    fn test_fraction_digits_limit(#[case] digits: u32, #[case] accepted: bool) {
        let result = EngineConfig::from_toml(&format!("[currency]\nfraction_digits = {}\n", digits));

        match result {
            Ok(config) => {
                assert!(accepted);
                assert_eq!(config.scale(), digits);
            }
            Err(e) => {
                assert!(!accepted);
                assert!(matches!(e, FeeFineError::Parse { .. }));
            }
        }
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"\njson = true\n[batch]\nbatch_size = 50").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = EngineConfig::load(&args(&["--config", &path, "--batch-size", "10", "--log-level", "debug"]))
            .unwrap();

        assert_eq!(config.batch.batch_size, 10);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let result = EngineConfig::load(&args(&["--config", "/definitely/not/here.toml"]));
        assert!(matches!(result, Err(FeeFineError::Io { .. })));
    }

    #[rstest]
    #[case::zero_batch_size(0, 4, 1000, 4)]
    #[case::zero_worker_threads(10, 0, 10, num_cpus::get())]
    #[case::valid(10, 4, 10, 4)]
    fn test_zero_batch_values_fall_back(
        #[case] batch_size: usize,
        #[case] worker_threads: usize,
        #[case] expected_batch_size: usize,
        #[case] expected_worker_threads: usize,
    ) {
        let config = BatchConfig::new(batch_size, worker_threads);

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.worker_threads, expected_worker_threads);
    }
}
