//! Collaborator traits for account storage, ledger storage and notifications
//!
//! The engine only talks to its collaborators through these traits, so an
//! in-memory implementation (used by the command-line runner and tests) and a
//! database-backed one can be used interchangeably.

use crate::types::{Account, AccountId, ActionKind, LedgerEntry, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Storage for fee/fine accounts
///
/// Implementations must offer strongly-consistent single-row reads and writes.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get an account by id
    async fn get_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;

    /// Get several accounts by id
    ///
    /// Ids with no account are absent from the returned map.
    async fn get_by_ids(&self, ids: &[AccountId]) -> Result<HashMap<AccountId, Account>, StoreError>;

    /// Insert or replace an account
    async fn save(&self, account: Account) -> Result<Account, StoreError>;
}

/// Append-only storage for ledger entries
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a single entry
    async fn save(&self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError>;

    /// Persist a group of entries
    ///
    /// Implementations must write either every entry or none of them and
    /// report an error in the latter case.
    async fn save_batch(&self, entries: &[LedgerEntry]) -> Result<(), StoreError>;

    /// All entries of an account, in creation order
    async fn find_by_account_id(&self, id: &str) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Entries of several accounts whose action type belongs to one of `kinds`,
    /// in creation order
    async fn find_by_account_ids(
        &self,
        ids: &[AccountId],
        kinds: &[ActionKind],
    ) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// Failure to deliver a patron notice
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to notify patron {user_id}: {message}")]
pub struct NotifyError {
    /// Patron the notice was meant for
    pub user_id: String,
    /// Reason reported by the sink
    pub message: String,
}

/// Outbound patron notices
///
/// Delivery is best-effort: the engine logs failures and carries on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, entry: &LedgerEntry) -> Result<(), NotifyError>;
}
