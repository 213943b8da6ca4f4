//! Fee/Fine Engine Library
//! # Overview
//!
//! This library applies financial actions to fee/fine accounts owed by
//! library patrons and records every change in an append-only ledger.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (MonetaryValue, Account, LedgerEntry, errors)
//! - [`core`] - Business logic components:
//!   - [`core::validator`] - Checks an action before anything is written
//!   - [`core::allocation`] - Splits one amount across several accounts
//!   - [`core::refund`] - Divides refunds between payments and transfers
//!   - [`core::processor`] - Runs the load, validate, allocate, persist pipeline
//! - [`config`] - TOML configuration with CLI overrides
//! - [`cli`] - CLI arguments parsing
//! - [`io`] - CSV input and output
//! - [`runner`] - Batch processing of an actions file
//!
//! # Action Types
//!
//! - **Pay**: Patron pays some or all of the remaining balance
//! - **Waive**: Staff forgives some or all of the remaining balance
//! - **Transfer**: Balance is handed over to the bursar
//! - **Refund**: Paid or transferred money is given back (allowed on closed accounts)
//! - **Cancel**: The account was created in error and is closed as-is
//!
//! Each action records "fully" or "partially" depending on whether it leaves
//! the balance at exactly zero.
//!
//! # Money
//!
//! All amounts are fixed-point decimals rounded half-to-even to the currency's
//! fraction digits. Bulk splits round down and hand the remainder out one
//! minimal unit at a time, so shares always add up to the requested amount.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod runner;
pub mod types;

pub use config::EngineConfig;
pub use core::{ActionProcessor, ActionResult, BulkActionResult};
pub use runner::{RunPaths, RunSummary, Runner};
pub use types::{
    Account, AccountId, AccountStatus, ActionKind, ActionOptions, FeeFineError, LedgerEntry,
    MonetaryValue, StoreError,
};
