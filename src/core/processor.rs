//! Action processing orchestration
//!
//! This module provides the `ActionProcessor` struct, which applies pay, waive,
//! transfer, refund and cancel actions to one or several fee/fine accounts.
//!
//! # Design
//!
//! Every action walks through the same stages:
//!
//! ```text
//! LoadAccounts -> Validate -> Allocate -> PersistEntries -> MutateAccounts -> Notify
//! ```
//!
//! Any failure before `PersistEntries` leaves storage untouched. Single-account
//! actions persist each entry on its own; bulk actions hand all entries to the
//! ledger as one batch. Account writes are not transactional with entry writes:
//! if an account save fails after its entries were stored, the entries stay and
//! the error is returned.
//!
//! Notices are best-effort. A failed notice is logged and never fails the
//! action, and credit entries never produce one.
//!
//! # Architecture
//!
//! ```text
//! ActionProcessor
//!     ├── Arc<dyn AccountStore>      (account reads and writes)
//!     ├── Arc<dyn LedgerStore>       (entry history and appends)
//!     └── Arc<dyn NotificationSink>  (patron notices)
//! ```
//!
//! # Thread Safety
//!
//! The processor is cheap to clone and can be shared across tasks. It holds
//! no state of its own; concurrent actions on the same account are only as
//! safe as the stores make them.

use super::allocation::{self, AllocationTarget};
use super::refund::{self, RefundBreakdown};
use super::traits::{AccountStore, LedgerStore, NotificationSink};
use super::validator::{self, ActionPreview};
use crate::types::{
    Account, AccountId, ActionKind, ActionOptions, FeeFineError, LedgerEntry, MonetaryValue,
    MAX_SCALE,
};
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Entry kinds a refund is measured against
const REFUND_HISTORY: [ActionKind; 3] = [ActionKind::Pay, ActionKind::Transfer, ActionKind::Refund];

/// Outcome of an action on one account
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub account_id: AccountId,

    /// Amount applied
    pub amount: MonetaryValue,

    /// Remaining balance afterwards, or for refunds what is still refundable
    pub remaining_amount: MonetaryValue,

    /// Account as saved
    pub account: Account,

    /// Entries recorded, in order
    pub entries: Vec<LedgerEntry>,
}

/// Outcome of an action spread over several accounts
#[derive(Debug, Clone, PartialEq)]
pub struct BulkActionResult {
    /// Total amount applied
    pub amount: MonetaryValue,

    /// Combined remaining balance afterwards, or for refunds what is still
    /// refundable
    pub remaining_amount: MonetaryValue,

    /// Every requested account, in request order, as it stands afterwards
    pub accounts: Vec<Account>,

    /// Entries recorded, in allocation order
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persistence {
    /// One `save` per entry and per account
    PerEntry,

    /// One `save_batch` for all entries, accounts saved concurrently
    Batch,
}

/// Everything loaded and checked before anything is written
struct Validated {
    ids: Vec<AccountId>,
    accounts: HashMap<AccountId, Account>,
    history: Vec<LedgerEntry>,
    preview: ActionPreview,
}

/// One account's share of an action, ready to persist
struct Outcome {
    account: Account,
    entries: Vec<LedgerEntry>,
}

/// Applies fee/fine actions through the storage and notification traits
///
/// # Example
///
/// ```ignore
/// let processor = ActionProcessor::new(accounts, ledger, notifications, 2);
/// let result = processor
///     .perform_single_action(ActionKind::Pay, "acc-1", Some("5.00"), &ActionOptions::default())
///     .await?;
/// ```
#[derive(Clone)]
pub struct ActionProcessor {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerStore>,
    notifications: Arc<dyn NotificationSink>,

    /// Fraction digits of the currency
    scale: u32,
}

impl fmt::Debug for ActionProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionProcessor")
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

impl ActionProcessor {
    /// Create a new ActionProcessor
    ///
    /// # Arguments
    ///
    /// * `accounts` - Account storage
    /// * `ledger` - Ledger entry storage
    /// * `notifications` - Where patron notices go
    /// * `scale` - Fraction digits of the currency; amounts are rounded to it
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn LedgerStore>,
        notifications: Arc<dyn NotificationSink>,
        scale: u32,
    ) -> Self {
        Self {
            accounts,
            ledger,
            notifications,
            scale: scale.min(MAX_SCALE),
        }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Apply an action to a single account
    ///
    /// # Arguments
    ///
    /// * `kind` - Action to perform; `Credit` is rejected
    /// * `account_id` - Target account
    /// * `raw_amount` - Amount as entered; ignored for cancellations
    /// * `options` - Comments, payment details and the notice flag
    ///
    /// # Returns
    ///
    /// The saved account with the entries recorded against it.
    ///
    /// # Errors
    ///
    /// * `UnsupportedAction` - `kind` is `Credit`
    /// * Any validation error (see `validator::validate`)
    /// * `Store` - A collaborator failed; entries written before the failure
    ///   are not rolled back
    #[instrument(skip(self, options))]
    pub async fn perform_single_action(
        &self,
        kind: ActionKind,
        account_id: &str,
        raw_amount: Option<&str>,
        options: &ActionOptions,
    ) -> Result<ActionResult, FeeFineError> {
        let mut validated = self
            .load_and_validate(kind, &[account_id.to_string()], raw_amount)
            .await?;
        let mut outcomes = self.allocate(kind, &validated, options)?;

        self.persist(&outcomes, Persistence::PerEntry).await?;

        let (account, entries) = match outcomes.pop() {
            Some(outcome) => (outcome.account, outcome.entries),
            None => {
                let account = validated
                    .accounts
                    .remove(account_id)
                    .ok_or_else(|| FeeFineError::account_not_found(account_id))?;
                (account, Vec::new())
            }
        };

        self.notify(&entries).await;

        info!(
            account_id,
            amount = %validated.preview.allowed_amount,
            payment_status = %account.payment_status,
            entries = entries.len(),
            "action applied"
        );

        Ok(ActionResult {
            account_id: account.id.clone(),
            amount: validated.preview.allowed_amount,
            remaining_amount: validated.preview.remaining_amount,
            account,
            entries,
        })
    }

    /// Apply one action across several accounts
    ///
    /// The amount is split with `allocation::split`, smallest balance first.
    /// Duplicate ids are applied once. Accounts whose share is zero are left
    /// untouched but still reported in the result.
    ///
    /// # Errors
    ///
    /// Same as `perform_single_action`. A rejected batch leaves the ledger and
    /// every account untouched.
    #[instrument(skip(self, options))]
    pub async fn perform_bulk_action(
        &self,
        kind: ActionKind,
        account_ids: &[AccountId],
        raw_amount: Option<&str>,
        options: &ActionOptions,
    ) -> Result<BulkActionResult, FeeFineError> {
        let validated = self.load_and_validate(kind, account_ids, raw_amount).await?;
        let outcomes = self.allocate(kind, &validated, options)?;

        self.persist(&outcomes, Persistence::Batch).await?;

        let entries: Vec<LedgerEntry> = outcomes
            .iter()
            .flat_map(|outcome| outcome.entries.iter().cloned())
            .collect();
        self.notify(&entries).await;

        let mut updated: HashMap<AccountId, Account> = outcomes
            .into_iter()
            .map(|outcome| (outcome.account.id.clone(), outcome.account))
            .collect();
        let Validated {
            ids,
            mut accounts,
            preview,
            ..
        } = validated;
        let accounts: Vec<Account> = ids
            .iter()
            .filter_map(|id| updated.remove(id).or_else(|| accounts.remove(id)))
            .collect();

        info!(
            accounts = accounts.len(),
            amount = %preview.allowed_amount,
            entries = entries.len(),
            "bulk action applied"
        );

        Ok(BulkActionResult {
            amount: preview.allowed_amount,
            remaining_amount: preview.remaining_amount,
            accounts,
            entries,
        })
    }

    /// How much of `raw_amount` can be refunded and what would remain refundable
    ///
    /// Nothing is written.
    pub async fn calculate_refund_preview(
        &self,
        account_ids: &[AccountId],
        raw_amount: &str,
    ) -> Result<ActionPreview, FeeFineError> {
        self.check_action(ActionKind::Refund, account_ids, Some(raw_amount))
            .await
    }

    /// Run validation only and report what the action would do
    ///
    /// Nothing is written and no notice is sent.
    #[instrument(skip(self))]
    pub async fn check_action(
        &self,
        kind: ActionKind,
        account_ids: &[AccountId],
        raw_amount: Option<&str>,
    ) -> Result<ActionPreview, FeeFineError> {
        let validated = self.load_and_validate(kind, account_ids, raw_amount).await?;
        Ok(validated.preview)
    }

    async fn load_and_validate(
        &self,
        kind: ActionKind,
        account_ids: &[AccountId],
        raw_amount: Option<&str>,
    ) -> Result<Validated, FeeFineError> {
        if !kind.is_user_invocable() {
            return Err(FeeFineError::UnsupportedAction {
                action: kind.to_string(),
            });
        }

        let ids = unique_ids(account_ids);
        let accounts = self.accounts.get_by_ids(&ids).await?;
        let history = match kind {
            ActionKind::Refund => self.ledger.find_by_account_ids(&ids, &REFUND_HISTORY).await?,
            _ => Vec::new(),
        };
        debug!(requested = ids.len(), loaded = accounts.len(), "loaded accounts");

        let preview =
            validator::validate(kind.into(), &ids, &accounts, &history, raw_amount, self.scale)?;
        debug!(
            allowed = %preview.allowed_amount,
            remaining = %preview.remaining_amount,
            "validated action"
        );

        Ok(Validated {
            ids,
            accounts,
            history,
            preview,
        })
    }

    /// Split the allowed amount and build the entries and updated account for
    /// every account that receives a share
    fn allocate(
        &self,
        kind: ActionKind,
        validated: &Validated,
        options: &ActionOptions,
    ) -> Result<Vec<Outcome>, FeeFineError> {
        let targets: Vec<&Account> = validated
            .ids
            .iter()
            .filter_map(|id| validated.accounts.get(id))
            .collect();

        if kind == ActionKind::Cancel {
            return Ok(targets
                .into_iter()
                .map(|account| self.cancel(account, options))
                .collect());
        }

        let capacities: Vec<AllocationTarget> = targets
            .iter()
            .map(|account| match kind {
                ActionKind::Refund => AllocationTarget::new(
                    account.id.clone(),
                    refund::refundable_amount(&history_of(&validated.history, &account.id), self.scale),
                    account.created_at,
                ),
                _ => AllocationTarget::remaining_of(account),
            })
            .collect();

        let allocation = allocation::split(&validated.preview.allowed_amount, &capacities)?;

        allocation
            .iter()
            .map(|(id, share)| {
                let account = validated
                    .accounts
                    .get(id)
                    .ok_or_else(|| FeeFineError::account_not_found(id))?;
                Ok(match kind {
                    ActionKind::Refund => {
                        self.refund(account, share, &history_of(&validated.history, id), options)
                    }
                    _ => settle(kind, account, share, options),
                })
            })
            .collect()
    }

    /// Close the whole remaining balance as an error
    fn cancel(&self, account: &Account, options: &ActionOptions) -> Outcome {
        let action_type = options
            .reason_for_action
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(ActionKind::Cancel.full_label())
            .to_string();
        let balance = MonetaryValue::zero(self.scale);

        let entry = LedgerEntry::record(account, action_type.as_str(), account.remaining, balance, options);
        let mut account = account.clone();
        account.apply(&action_type, balance);

        Outcome {
            account,
            entries: vec![entry],
        }
    }

    fn refund(
        &self,
        account: &Account,
        share: &MonetaryValue,
        history: &[LedgerEntry],
        options: &ActionOptions,
    ) -> Outcome {
        let breakdown = RefundBreakdown::calculate(history, share);
        debug!(
            account_id = %account.id,
            for_payments = %breakdown.for_payments,
            for_transfers = %breakdown.for_transfers,
            full = breakdown.is_full_refund,
            "refund breakdown"
        );

        let entries = breakdown.entries(account, options);
        let mut account = account.clone();
        if let Some(last) = entries.last() {
            account.apply(&last.action_type, last.balance);
        }

        Outcome { account, entries }
    }

    async fn persist(&self, outcomes: &[Outcome], mode: Persistence) -> Result<(), FeeFineError> {
        let entries = outcomes.iter().flat_map(|outcome| outcome.entries.iter());

        match mode {
            Persistence::PerEntry => {
                for entry in entries {
                    self.ledger.save(entry.clone()).await?;
                }
                for outcome in outcomes {
                    self.accounts.save(outcome.account.clone()).await?;
                }
            }
            Persistence::Batch => {
                let batch: Vec<LedgerEntry> = entries.cloned().collect();
                self.ledger.save_batch(&batch).await?;
                try_join_all(
                    outcomes
                        .iter()
                        .map(|outcome| self.accounts.save(outcome.account.clone())),
                )
                .await?;
            }
        }

        debug!(accounts = outcomes.len(), ?mode, "persisted action");
        Ok(())
    }

    async fn notify(&self, entries: &[LedgerEntry]) {
        for entry in entries.iter().filter(|entry| entry.notify) {
            if let Err(err) = self.notifications.notify(entry).await {
                warn!(entry_id = %entry.id, error = %err, "patron notice not delivered");
            }
        }
    }
}

/// Pay, waive or transfer `share` of the remaining balance
fn settle(kind: ActionKind, account: &Account, share: &MonetaryValue, options: &ActionOptions) -> Outcome {
    let remaining = account.remaining.subtract(share);
    let action_type = kind.label(remaining.is_zero());

    let entry = LedgerEntry::record(account, action_type, *share, remaining, options);
    let mut account = account.clone();
    account.apply(action_type, remaining);

    Outcome {
        account,
        entries: vec![entry],
    }
}

fn history_of(history: &[LedgerEntry], account_id: &str) -> Vec<LedgerEntry> {
    history
        .iter()
        .filter(|entry| entry.account_id == account_id)
        .cloned()
        .collect()
}

/// Ids with duplicates removed, first occurrence kept
fn unique_ids(ids: &[AccountId]) -> Vec<AccountId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}
