//! In-memory, append-only ledger
//!
//! This module provides the `MemoryLedgerStore` struct, which keeps ledger
//! entries grouped by account in a concurrent map.
//!
//! # Design
//!
//! Entries are stamped with a global sequence number on insert so that
//! history reads come back in creation order even when several accounts are
//! written at once. Entry ids are indexed separately to reject duplicates.
//!
//! A batch is checked in full before anything is written, so a rejected
//! batch leaves the ledger untouched.

use crate::core::traits::LedgerStore;
use crate::types::{AccountId, ActionKind, EntryId, LedgerEntry, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe ledger backed by a `DashMap`
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    /// Entries per account, tagged with their sequence number
    entries: DashMap<AccountId, Vec<(u64, LedgerEntry)>>,

    /// Every entry id written so far
    ids: DashMap<EntryId, AccountId>,

    sequence: AtomicU64,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry across all accounts, in creation order
    pub fn all_entries(&self) -> Vec<LedgerEntry> {
        let mut all: Vec<(u64, LedgerEntry)> = self
            .entries
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, entry)| entry).collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn conflict(entry: &LedgerEntry) -> StoreError {
        StoreError::Conflict {
            id: entry.id.to_string(),
            message: "ledger entry already exists".to_string(),
        }
    }

    fn append(&self, entry: LedgerEntry) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.ids.insert(entry.id, entry.account_id.clone());
        self.entries
            .entry(entry.account_id.clone())
            .or_default()
            .push((seq, entry));
    }

    fn matching<F>(&self, ids: &[AccountId], keep: F) -> Vec<LedgerEntry>
    where
        F: Fn(&LedgerEntry) -> bool,
    {
        let unique: HashSet<&AccountId> = ids.iter().collect();
        let mut found: Vec<(u64, LedgerEntry)> = unique
            .into_iter()
            .filter_map(|id| self.entries.get(id))
            .flat_map(|entries| {
                entries
                    .value()
                    .iter()
                    .filter(|(_, entry)| keep(entry))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, entry)| entry).collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn save(&self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        if self.ids.contains_key(&entry.id) {
            return Err(Self::conflict(&entry));
        }
        self.append(entry.clone());
        Ok(entry)
    }

    async fn save_batch(&self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.id) || self.ids.contains_key(&entry.id) {
                return Err(StoreError::BatchRejected {
                    size: entries.len(),
                    message: Self::conflict(entry).to_string(),
                });
            }
        }

        for entry in entries {
            self.append(entry.clone());
        }
        Ok(())
    }

    async fn find_by_account_id(&self, id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .entries
            .get(id)
            .map(|entries| entries.value().iter().map(|(_, entry)| entry.clone()).collect())
            .unwrap_or_default())
    }

    /// An empty `kinds` slice matches every entry
    async fn find_by_account_ids(
        &self,
        ids: &[AccountId],
        kinds: &[ActionKind],
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.matching(ids, |entry| {
            kinds.is_empty() || entry.kind().is_some_and(|kind| kinds.contains(&kind))
        }))
    }
}
