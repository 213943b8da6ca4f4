//! Pre-flight validation of an action request
//!
//! Validation is pure: it looks at already-loaded accounts and history and
//! either rejects the request or reports how much would be applied and what
//! would be left afterwards. Nothing is persisted, so the same code backs both
//! real actions and previews.
//!
//! # Rules
//!
//! Checks run in this order and the first failure wins:
//!
//! 1. Every requested account must exist.
//! 2. The amount must be a positive decimal (not checked for cancellations,
//!    which always cancel the whole balance).
//! 3. Closed accounts only accept refunds. Cancellation rejects any closed
//!    account; other actions reject closed accounts with nothing remaining.
//! 4. The amount may not exceed the remaining balance, or for refunds the
//!    amount still refundable.

use super::refund;
use crate::types::{Account, AccountId, ActionKind, FeeFineError, LedgerEntry, MonetaryValue};
use std::collections::HashMap;

/// Validation rules that apply to an action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Pay, waive and transfer: bounded by the remaining balance
    Default,

    /// Cancel: no amount, always the whole balance
    Cancel,

    /// Refund: bounded by what was paid or transferred
    Refund,
}

impl From<ActionKind> for Validation {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Cancel => Validation::Cancel,
            ActionKind::Refund => Validation::Refund,
            ActionKind::Pay | ActionKind::Waive | ActionKind::Transfer | ActionKind::Credit => {
                Validation::Default
            }
        }
    }
}

/// Outcome of a successful validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionPreview {
    /// Amount that will be applied
    pub allowed_amount: MonetaryValue,

    /// What is left afterwards: the combined remaining balance, or for refunds
    /// the amount that would still be refundable
    pub remaining_amount: MonetaryValue,
}

/// Validate a request against the accounts it targets
///
/// # Arguments
///
/// * `validation` - Rules to apply
/// * `ids` - Requested account ids, already de-duplicated
/// * `accounts` - Accounts loaded for `ids`; missing ids are reported
/// * `history` - Pay, transfer and refund entries of those accounts (only
///   used for refunds)
/// * `raw_amount` - Amount as entered by the caller
/// * `scale` - Fraction digits of the currency
///
/// # Errors
///
/// * `AccountNotFound` - An id has no account
/// * `InvalidAmount` - The amount is missing, malformed or not positive
/// * `AlreadyClosed` - A non-refund action targets a closed account
/// * `AmountExceedsAvailable` - The amount is above the applicable ceiling
pub fn validate(
    validation: Validation,
    ids: &[AccountId],
    accounts: &HashMap<AccountId, Account>,
    history: &[LedgerEntry],
    raw_amount: Option<&str>,
    scale: u32,
) -> Result<ActionPreview, FeeFineError> {
    let targets = ids
        .iter()
        .map(|id| accounts.get(id).ok_or_else(|| FeeFineError::account_not_found(id)))
        .collect::<Result<Vec<&Account>, _>>()?;

    let remaining = MonetaryValue::sum(targets.iter().map(|account| &account.remaining), scale);

    match validation {
        Validation::Cancel => {
            reject_closed(&targets, |_| true)?;
            Ok(ActionPreview {
                allowed_amount: remaining,
                remaining_amount: MonetaryValue::zero(scale),
            })
        }
        Validation::Default => {
            let requested = parse_positive(raw_amount, scale)?;
            reject_closed(&targets, |account| account.remaining.is_zero())?;
            let remaining_amount = within(&requested, &remaining)?;
            Ok(ActionPreview {
                allowed_amount: requested,
                remaining_amount,
            })
        }
        Validation::Refund => {
            let requested = parse_positive(raw_amount, scale)?;
            let refundable = refund::refundable_amount(history, scale);
            let remaining_amount = within(&requested, &refundable)?;
            Ok(ActionPreview {
                allowed_amount: requested,
                remaining_amount,
            })
        }
    }
}

fn parse_positive(raw_amount: Option<&str>, scale: u32) -> Result<MonetaryValue, FeeFineError> {
    let raw = raw_amount.unwrap_or_default();
    let amount = MonetaryValue::parse(raw, scale)?;
    if !amount.is_positive() {
        return Err(FeeFineError::invalid_amount(raw));
    }
    Ok(amount)
}

/// First closed target for which `blocks` holds is an error
fn reject_closed(
    targets: &[&Account],
    blocks: impl Fn(&Account) -> bool,
) -> Result<(), FeeFineError> {
    match targets
        .iter()
        .find(|account| account.is_closed() && blocks(account))
    {
        Some(closed) => Err(FeeFineError::already_closed(&closed.id)),
        None => Ok(()),
    }
}

/// What is left of `available` after `requested`, if it fits
fn within(
    requested: &MonetaryValue,
    available: &MonetaryValue,
) -> Result<MonetaryValue, FeeFineError> {
    if requested.is_greater_than(available) {
        return Err(FeeFineError::amount_exceeds_available(
            &requested.to_string(),
            available,
        ));
    }
    Ok(available.subtract(requested))
}
