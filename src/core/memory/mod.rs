//! In-memory collaborators
//!
//! Concurrent implementations of the storage and notification traits:
//!
//! - **MemoryAccountStore**: accounts in a `DashMap`, keyed by account id
//! - **MemoryLedgerStore**: append-only entries in a `DashMap`, keyed by account id
//! - **LoggingNotificationSink**: patron notices as `tracing` events
//!
//! # Thread Safety
//!
//! Locking is per account shard; there is no global lock.

pub mod account_store;
pub mod ledger_store;
pub mod notification;

pub use account_store::MemoryAccountStore;
pub use ledger_store::MemoryLedgerStore;
pub use notification::LoggingNotificationSink;
