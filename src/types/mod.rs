//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `money`: Fixed-point monetary values and their rounding contract
//! - `account`: Fee/fine accounts and their lifecycle status
//! - `action`: Action kinds, options and ledger entries
//! - `error`: Error types for the engine and its collaborators

pub mod account;
pub mod action;
pub mod error;
pub mod money;

pub use account::{Account, AccountId, AccountStatus, UserId};
pub use action::{ActionKind, ActionOptions, EntryId, LedgerEntry};
pub use error::{FeeFineError, StoreError};
pub use money::{MonetaryValue, DEFAULT_SCALE, MAX_SCALE};
