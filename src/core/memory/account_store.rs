//! In-memory account storage
//!
//! This module provides the `MemoryAccountStore` struct, which keeps fee/fine
//! accounts in a concurrent map so that several actions can be processed at
//! once.
//!
//! # Thread Safety
//!
//! All operations go through `DashMap`'s sharded locks. Reads and writes of
//! different accounts never block each other, and a single `save` replaces an
//! account atomically.

use crate::core::traits::AccountStore;
use crate::types::{Account, AccountId, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;

/// Thread-safe account store backed by a `DashMap`
///
/// Used by the command-line runner and by tests. Lookups return clones; the
/// caller owns its copy and writes it back with `save`.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<AccountId, Account>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `accounts`
    ///
    /// When an id appears more than once, the last account wins.
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let store = Self::new();
        for account in accounts {
            store.insert(account);
        }
        store
    }

    /// Insert or replace an account without going through the async trait
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Snapshot of every account, sorted by id
    ///
    /// # Thread Safety
    ///
    /// The snapshot is taken shard by shard; accounts saved concurrently may or
    /// may not be reflected.
    pub fn all_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(id).map(|entry| entry.value().clone()))
    }

    async fn get_by_ids(&self, ids: &[AccountId]) -> Result<HashMap<AccountId, Account>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.accounts.get(id).map(|entry| (id.clone(), entry.value().clone())))
            .collect())
    }

    async fn save(&self, account: Account) -> Result<Account, StoreError> {
        self.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }
}
