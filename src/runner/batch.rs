//! Batch processing with account-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which applies a batch of
//! actions concurrently while keeping the file order for every account.
//!
//! # Design
//!
//! A batch is split into lanes. Two actions share a lane when they touch a
//! common account, directly or through other actions (a bulk action joins the
//! lanes of all its accounts). Lanes run as separate tokio tasks; inside a
//! lane, actions run one after another in file order.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── ActionProcessor  (shared, cloneable action pipeline)
//! ```

use crate::core::ActionProcessor;
use crate::io::ActionRequest;
use crate::types::{AccountId, FeeFineError, LedgerEntry};
use std::collections::HashMap;
use tracing::error;

/// Result of applying a single action
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The action as read from the file
    pub request: ActionRequest,

    /// Entries recorded, or why the action was rejected
    pub result: Result<Vec<LedgerEntry>, FeeFineError>,
}

/// Batch processor with account-based partitioning
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    processor: ActionProcessor,
}

impl BatchProcessor {
    pub fn new(processor: ActionProcessor) -> Self {
        Self { processor }
    }

    /// Partition a batch into lanes of actions that share accounts
    ///
    /// # Guarantees
    ///
    /// - Each action appears in exactly one lane
    /// - Actions touching a common account are in the same lane
    /// - Every lane keeps the original relative order
    pub fn partition_by_accounts(&self, batch: Vec<ActionRequest>) -> Vec<Vec<ActionRequest>> {
        let mut lanes: Vec<Vec<(usize, ActionRequest)>> = Vec::new();
        let mut owner: HashMap<AccountId, usize> = HashMap::new();

        for (position, request) in batch.into_iter().enumerate() {
            let mut touched: Vec<usize> = request
                .account_ids
                .iter()
                .filter_map(|id| owner.get(id).copied())
                .collect();
            touched.sort_unstable();
            touched.dedup();

            let lane = match touched.split_first() {
                None => {
                    lanes.push(Vec::new());
                    lanes.len() - 1
                }
                Some((&first, rest)) => {
                    if !rest.is_empty() {
                        for &other in rest {
                            let merged = std::mem::take(&mut lanes[other]);
                            lanes[first].extend(merged);
                        }
                        lanes[first].sort_by_key(|(position, _)| *position);
                        for lane in owner.values_mut() {
                            if rest.contains(lane) {
                                *lane = first;
                            }
                        }
                    }
                    first
                }
            };

            for id in &request.account_ids {
                owner.insert(id.clone(), lane);
            }
            lanes[lane].push((position, request));
        }

        lanes
            .into_iter()
            .filter(|lane| !lane.is_empty())
            .map(|lane| lane.into_iter().map(|(_, request)| request).collect())
            .collect()
    }

    /// Apply one lane of actions sequentially
    ///
    /// A rejected action is recorded in its result and does not stop the lane.
    pub async fn process_lane(&self, lane: Vec<ActionRequest>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(lane.len());

        for request in lane {
            let amount = request.amount.as_deref();
            let result = match request.account_ids.as_slice() {
                [single] => self
                    .processor
                    .perform_single_action(request.kind, single, amount, &request.options)
                    .await
                    .map(|applied| applied.entries),
                ids => self
                    .processor
                    .perform_bulk_action(request.kind, ids, amount, &request.options)
                    .await
                    .map(|applied| applied.entries),
            };
            results.push(ProcessingResult { request, result });
        }

        results
    }

    /// Apply a batch with one task per lane and wait for all of them
    ///
    /// Results come back grouped by lane, not in file order.
    pub async fn process_batch(&self, batch: Vec<ActionRequest>) -> Vec<ProcessingResult> {
        let lanes = self.partition_by_accounts(batch);

        let mut tasks = Vec::with_capacity(lanes.len());
        for lane in lanes {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move { processor.process_lane(lane).await }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(lane_results) => results.extend(lane_results),
                Err(e) => error!(error = %e, "action lane task failed"),
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::{LoggingNotificationSink, MemoryAccountStore, MemoryLedgerStore};
    use crate::types::{Account, ActionKind, ActionOptions, MonetaryValue};
    use chrono::Utc;
    use std::sync::Arc;

    fn request(kind: ActionKind, ids: &[&str], amount: Option<&str>) -> ActionRequest {
        ActionRequest {
            kind,
            account_ids: ids.iter().map(|id| id.to_string()).collect(),
            amount: amount.map(str::to_string),
            options: ActionOptions::default(),
        }
    }

    fn processor(balances: &[(&str, &str)]) -> (BatchProcessor, Arc<MemoryAccountStore>) {
        let accounts = Arc::new(MemoryAccountStore::with_accounts(balances.iter().map(|(id, amount)| {
            Account::new(*id, "u-1", "Overdue fine", amount.parse().unwrap(), Utc::now())
        })));
        let processor = ActionProcessor::new(
            accounts.clone(),
            Arc::new(MemoryLedgerStore::new()),
            Arc::new(LoggingNotificationSink::new()),
            2,
        );
        (BatchProcessor::new(processor), accounts)
    }

    fn lane_ids(lanes: &[Vec<ActionRequest>]) -> Vec<Vec<String>> {
        lanes
            .iter()
            .map(|lane| lane.iter().map(|r| r.account_ids.join(";")).collect())
            .collect()
    }

    #[test]
    fn test_partition_keeps_accounts_together() {
        let (batch, _) = processor(&[]);

        let lanes = batch.partition_by_accounts(vec![
            request(ActionKind::Pay, &["a"], Some("1")),
            request(ActionKind::Pay, &["b"], Some("1")),
            request(ActionKind::Waive, &["a"], Some("1")),
        ]);

        assert_eq!(lane_ids(&lanes), vec![vec!["a", "a"], vec!["b"]]);
    }

    #[test]
    fn test_bulk_action_merges_lanes_in_order() {
        let (batch, _) = processor(&[]);

        let lanes = batch.partition_by_accounts(vec![
            request(ActionKind::Pay, &["a"], Some("1")),
            request(ActionKind::Pay, &["b"], Some("1")),
            request(ActionKind::Pay, &["c"], Some("1")),
            request(ActionKind::Pay, &["b", "a"], Some("1")),
            request(ActionKind::Pay, &["b"], Some("1")),
        ]);

        assert_eq!(
            lane_ids(&lanes),
            vec![vec!["a", "b", "b;a", "b"], vec!["c"]]
        );
    }

    #[tokio::test]
    async fn test_process_batch_applies_in_file_order_per_account() {
        let (batch, accounts) = processor(&[("a", "10.00"), ("b", "10.00")]);

        let results = batch
            .process_batch(vec![
                request(ActionKind::Pay, &["a"], Some("4.00")),
                request(ActionKind::Pay, &["a"], Some("6.00")),
                // account is closed by now
                request(ActionKind::Pay, &["a"], Some("1.00")),
                request(ActionKind::Waive, &["b"], Some("2.00")),
            ])
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(results.iter().filter(|r| r.result.is_err()).count(), 1);

        let a = accounts.all_accounts().into_iter().find(|acc| acc.id == "a").unwrap();
        assert_eq!(a.payment_status, "Paid fully");
        let b = accounts.all_accounts().into_iter().find(|acc| acc.id == "b").unwrap();
        assert_eq!(b.remaining, "8.00".parse::<MonetaryValue>().unwrap());
    }
}
