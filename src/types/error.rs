//! Error types for the fee/fine engine
//!
//! This module defines all error types that can occur while validating and
//! applying fee/fine actions. Validation errors are designed to be shown to
//! the person who requested the action, so they carry the rejected amount.
//!
//! # Error Categories
//!
//! - **Validation Errors**: invalid amount, unknown account, closed account,
//!   amount above what is available
//! - **Internal Errors**: allocation invariant violations (always a bug)
//! - **Storage Errors**: failures reported by the persistence collaborator
//! - **File I/O Errors**: CSV input/output for the command-line runner

use thiserror::Error;

/// Failure reported by an account or ledger store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store could not be reached or rejected the operation
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A row conflicts with an existing row
    #[error("conflicting record {id}: {message}")]
    Conflict {
        /// Id of the conflicting record
        id: String,
        /// What conflicted
        message: String,
    },

    /// A batch write was rejected; no row from the batch was written
    #[error("batch of {size} entries rejected: {message}")]
    BatchRejected {
        /// Number of entries in the rejected batch
        size: usize,
        /// Reason reported by the store
        message: String,
    },
}

/// Main error type for the fee/fine engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeeFineError {
    /// Amount could not be parsed or is not positive
    ///
    /// Always user-correctable.
    #[error("Invalid amount entered: '{amount}'")]
    InvalidAmount {
        /// The rejected input, as supplied
        amount: String,
    },

    /// The action kind cannot be requested by callers
    #[error("Action '{action}' cannot be performed directly")]
    UnsupportedAction {
        /// Name of the rejected action kind
        action: String,
    },

    /// Division by an amount that rounds to zero
    #[error("Division by zero")]
    DivisionByZero,

    /// No account exists with the given id
    #[error("Fee/fine {account_id} was not found")]
    AccountNotFound {
        /// The id that was looked up
        account_id: String,
    },

    /// The account is closed and cannot take this action
    #[error("Fee/fine {account_id} is already closed")]
    AlreadyClosed {
        /// Id of the closed account
        account_id: String,
    },

    /// Requested amount exceeds what the action may apply
    #[error("Requested amount {requested} exceeds available amount {available}")]
    AmountExceedsAvailable {
        /// The rejected amount, as supplied
        requested: String,
        /// The ceiling the request was checked against
        available: String,
    },

    /// Allocated shares do not add up to the requested total
    ///
    /// This is a bug in the allocation strategy. Details are kept for logs
    /// only; the message shown to callers is generic.
    #[error("Internal error while distributing the requested amount")]
    AllocationInvariantViolation {
        /// The total that had to be distributed
        expected: String,
        /// What the shares actually summed to
        actual: String,
    },

    /// The persistence collaborator failed
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// I/O error while reading or writing files
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// CSV record could not be read or converted
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

impl From<std::io::Error> for FeeFineError {
    fn from(error: std::io::Error) -> Self {
        FeeFineError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for FeeFineError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        FeeFineError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for FeeFineError {
    fn from(error: csv_async::Error) -> Self {
        FeeFineError::Parse {
            line: None,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl FeeFineError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: impl Into<String>) -> Self {
        FeeFineError::InvalidAmount {
            amount: amount.into(),
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account_id: &str) -> Self {
        FeeFineError::AccountNotFound {
            account_id: account_id.to_string(),
        }
    }

    /// Create an AlreadyClosed error
    pub fn already_closed(account_id: &str) -> Self {
        FeeFineError::AlreadyClosed {
            account_id: account_id.to_string(),
        }
    }

    /// Create an AmountExceedsAvailable error
    pub fn amount_exceeds_available(requested: &str, available: impl ToString) -> Self {
        FeeFineError::AmountExceedsAvailable {
            requested: requested.to_string(),
            available: available.to_string(),
        }
    }

    /// Create an AllocationInvariantViolation error
    pub fn allocation_invariant_violation(expected: impl ToString, actual: impl ToString) -> Self {
        FeeFineError::AllocationInvariantViolation {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// HTTP-equivalent status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            FeeFineError::InvalidAmount { .. }
            | FeeFineError::UnsupportedAction { .. }
            | FeeFineError::Parse { .. } => 400,
            FeeFineError::AccountNotFound { .. } => 404,
            FeeFineError::AlreadyClosed { .. } | FeeFineError::AmountExceedsAvailable { .. } => {
                422
            }
            FeeFineError::DivisionByZero
            | FeeFineError::AllocationInvariantViolation { .. }
            | FeeFineError::Store(_)
            | FeeFineError::Io { .. } => 500,
        }
    }

    /// Whether the requester can fix the request and try again
    pub fn is_recoverable(&self) -> bool {
        self.status_code() < 500
    }
}
