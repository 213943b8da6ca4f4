//! Core business logic module
//!
//! This module contains the fee/fine action pipeline:
//! - `traits` - Storage and notification collaborators
//! - `validator` - Pre-flight checks and previews
//! - `allocation` - Splitting one amount across several accounts
//! - `refund` - Refund breakdown and its ledger entries
//! - `comments` - Staff/patron comment encoding
//! - `processor` - Orchestration of the whole pipeline
//! - `memory` - In-memory collaborators

pub mod allocation;
pub mod comments;
pub mod memory;
pub mod processor;
pub mod refund;
pub mod traits;
pub mod validator;

pub use allocation::{split, Allocation, AllocationTarget};
pub use memory::{LoggingNotificationSink, MemoryAccountStore, MemoryLedgerStore};
pub use processor::{ActionProcessor, ActionResult, BulkActionResult};
pub use refund::RefundBreakdown;
pub use traits::{AccountStore, LedgerStore, NotificationSink, NotifyError};
pub use validator::{ActionPreview, Validation};
