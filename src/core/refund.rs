//! Refund breakdown and the entries a refund records
//!
//! A refund first credits the money back to the account and then records the
//! refund itself. Money paid by the patron and money transferred to the
//! bursar are tracked separately, so one refund produces up to four entries:
//!
//! | Kind   | Transaction information | Notice |
//! |--------|-------------------------|--------|
//! | Credit | Refund to patron        | never  |
//! | Credit | Refund to Bursar        | never  |
//! | Refund | Refunded to patron      | opt-in |
//! | Refund | Refunded to Bursar      | opt-in |
//!
//! Payments are refunded before transfers. Entries whose amount is zero are
//! not recorded.

use crate::types::{Account, ActionKind, ActionOptions, LedgerEntry, MonetaryValue};

pub const REFUND_TO_PATRON: &str = "Refund to patron";
pub const REFUND_TO_BURSAR: &str = "Refund to Bursar";
pub const REFUNDED_TO_PATRON: &str = "Refunded to patron";
pub const REFUNDED_TO_BURSAR: &str = "Refunded to Bursar";

fn sum_of(history: &[LedgerEntry], kinds: &[ActionKind], scale: u32) -> MonetaryValue {
    MonetaryValue::sum(
        history
            .iter()
            .filter(|entry| entry.kind().is_some_and(|kind| kinds.contains(&kind)))
            .map(|entry| &entry.amount),
        scale,
    )
}

/// Amount still available for refund: everything paid or transferred, less
/// what has already been refunded
pub fn refundable_amount(history: &[LedgerEntry], scale: u32) -> MonetaryValue {
    sum_of(history, &[ActionKind::Pay, ActionKind::Transfer], scale)
        .subtract(&sum_of(history, &[ActionKind::Refund], scale))
}

/// How a requested refund divides between payments and transfers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefundBreakdown {
    /// Total paid and transferred
    pub refundable_amount: MonetaryValue,

    /// Total paid by the patron
    pub paid_amount: MonetaryValue,

    /// Part of the refund given back to the patron
    pub for_payments: MonetaryValue,

    /// Part of the refund given back to the bursar
    pub for_transfers: MonetaryValue,

    /// Whether the refund returns everything refundable
    pub is_full_refund: bool,
}

impl RefundBreakdown {
    /// Split `requested` between payments and transfers found in `history`
    ///
    /// Only pay and transfer entries are considered; earlier refunds do not
    /// reduce the totals here. After Pay 6, Transfer 4 and a refund of 6, a
    /// further refund of 4 is still credited to the patron, not the bursar.
    /// How much may be refunded at all is capped separately by
    /// `refundable_amount`, which does subtract earlier refunds.
    pub fn calculate(history: &[LedgerEntry], requested: &MonetaryValue) -> Self {
        let scale = requested.scale();
        let paid_amount = sum_of(history, &[ActionKind::Pay], scale);
        let transferred = sum_of(history, &[ActionKind::Transfer], scale);
        let refundable_amount = paid_amount.add(&transferred);

        let for_payments = requested.min(&paid_amount);
        let for_transfers = requested.subtract(&for_payments);

        RefundBreakdown {
            refundable_amount,
            paid_amount,
            for_payments,
            for_transfers,
            is_full_refund: requested.is_greater_than_or_equals(&refundable_amount),
        }
    }

    /// Non-zero steps in the order they are recorded
    fn steps(&self) -> impl Iterator<Item = (ActionKind, MonetaryValue, &'static str)> {
        [
            (ActionKind::Credit, self.for_payments, REFUND_TO_PATRON),
            (ActionKind::Credit, self.for_transfers, REFUND_TO_BURSAR),
            (ActionKind::Refund, self.for_payments, REFUNDED_TO_PATRON),
            (ActionKind::Refund, self.for_transfers, REFUNDED_TO_BURSAR),
        ]
        .into_iter()
        .filter(|(_, amount, _)| !amount.is_zero())
    }

    /// Ledger entries for this refund against `account`
    ///
    /// Balances start from the account's current remaining amount: credits
    /// lower it and refunds raise it back, so the last entry always ends
    /// where the first one started.
    pub fn entries(&self, account: &Account, options: &ActionOptions) -> Vec<LedgerEntry> {
        let mut balance = account.remaining;

        self.steps()
            .map(|(kind, amount, transaction_info)| {
                balance = match kind {
                    ActionKind::Credit => balance.subtract(&amount),
                    _ => balance.add(&amount),
                };

                let mut entry = LedgerEntry::record(
                    account,
                    kind.label(self.is_full_refund),
                    amount,
                    balance,
                    options,
                );
                entry.transaction_information = Some(transaction_info.to_string());
                if kind == ActionKind::Credit {
                    entry.notify = false;
                }
                entry
            })
            .collect()
    }
}
