//! CSV format handling for accounts, actions and ledger output
//!
//! This module centralizes all CSV format concerns, providing:
//! - `AccountRecord` / `ActionRecord` structures for deserialization
//! - Conversion from CSV records to domain types
//! - Account and ledger output serialization
//!
//! All functions are pure (no file handling) for easy testing.

use crate::types::{
    Account, AccountId, AccountStatus, ActionKind, ActionOptions, FeeFineError, LedgerEntry,
    MonetaryValue,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Separates account ids in the `accounts` column of an action
pub const ACCOUNT_ID_SEPARATOR: char = ';';

/// Accounts input row
///
/// Columns: id, user_id, fee_fine_type, amount, remaining, status,
/// payment_status, created_at. Everything after `amount` may be left empty.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountRecord {
    pub id: String,
    pub user_id: String,
    pub fee_fine_type: String,
    pub amount: String,
    pub remaining: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub created_at: Option<String>,
}

/// Actions input row
///
/// `accounts` holds one id for a single-account action or several ids
/// separated by `;` for a bulk action.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ActionRecord {
    pub action: String,
    pub accounts: String,
    pub amount: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_info: Option<String>,
    pub comments: Option<String>,
    pub notify: Option<String>,
    pub service_point: Option<String>,
    pub user_name: Option<String>,
    pub reason: Option<String>,
}

/// A parsed action, ready for the processor
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub account_ids: Vec<AccountId>,
    pub amount: Option<String>,
    pub options: ActionOptions,
}

impl ActionRequest {
    /// Whether the action targets several accounts
    pub fn is_bulk(&self) -> bool {
        self.account_ids.len() > 1
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_error(message: String) -> FeeFineError {
    FeeFineError::Parse {
        line: None,
        message,
    }
}

/// Convert an `AccountRecord` to an `Account`
///
/// Missing `remaining` means nothing has been paid yet, missing `status` means
/// open and missing `created_at` sorts the account before all dated ones.
///
/// # Errors
///
/// `InvalidAmount` for malformed amounts, `Parse` for an unknown status, a
/// timestamp that is not RFC 3339, a remaining balance outside `0..=amount`
/// or a closed account that still owes money.
pub fn convert_account_record(record: AccountRecord, scale: u32) -> Result<Account, FeeFineError> {
    let amount = MonetaryValue::parse(&record.amount, scale)?;

    let created_at = match non_empty(record.created_at) {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| parse_error(format!("Invalid created_at '{}' for account {}: {}", raw, record.id, e)))?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };

    let mut account = Account::new(record.id, record.user_id, record.fee_fine_type, amount, created_at);

    if let Some(remaining) = non_empty(record.remaining) {
        account.remaining = MonetaryValue::parse(&remaining, scale)?;
    }
    if let Some(status) = non_empty(record.status) {
        account.status = status.parse::<AccountStatus>()?;
    }
    if let Some(payment_status) = non_empty(record.payment_status) {
        account.payment_status = payment_status;
    }

    check_balance(&account)?;
    Ok(account)
}

/// `0 <= remaining <= amount`, and closed accounts owe nothing
fn check_balance(account: &Account) -> Result<(), FeeFineError> {
    if account.remaining.is_negative() || account.remaining.is_greater_than(&account.amount) {
        return Err(parse_error(format!(
            "Remaining {} of account {} is outside 0..={}",
            account.remaining, account.id, account.amount
        )));
    }
    if account.is_closed() && !account.remaining.is_zero() {
        return Err(parse_error(format!(
            "Account {} is closed but still owes {}",
            account.id, account.remaining
        )));
    }
    Ok(())
}

fn parse_notify(raw: Option<String>) -> Result<bool, FeeFineError> {
    match non_empty(raw).map(|v| v.to_lowercase()).as_deref() {
        None | Some("false") | Some("no") | Some("0") => Ok(false),
        Some("true") | Some("yes") | Some("1") => Ok(true),
        Some(other) => Err(parse_error(format!("Invalid notify flag '{}'", other))),
    }
}

/// Convert an `ActionRecord` to an `ActionRequest`
///
/// Blank optional columns become `None`. Amount validation is left to the
/// processor so that it is reported like any other rejected action.
///
/// # Errors
///
/// `Parse` for an unknown action, an empty account list or a bad notify flag.
pub fn convert_action_record(record: ActionRecord) -> Result<ActionRequest, FeeFineError> {
    let kind = record.action.parse::<ActionKind>()?;

    let account_ids: Vec<AccountId> = record
        .accounts
        .split(ACCOUNT_ID_SEPARATOR)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if account_ids.is_empty() {
        return Err(parse_error(format!("Action '{}' names no accounts", record.action)));
    }

    let options = ActionOptions {
        comments: non_empty(record.comments),
        notify_patron: parse_notify(record.notify)?,
        payment_method: non_empty(record.payment_method),
        transaction_info: non_empty(record.transaction_info),
        service_point: non_empty(record.service_point),
        user_name: non_empty(record.user_name),
        reason_for_action: non_empty(record.reason),
    };

    Ok(ActionRequest {
        kind,
        account_ids,
        amount: non_empty(record.amount),
        options,
    })
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Write accounts in CSV format
///
/// Columns match the accounts input, so the output of one run can be fed to
/// the next. Accounts are sorted by id for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), FeeFineError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "id",
        "user_id",
        "fee_fine_type",
        "amount",
        "remaining",
        "status",
        "payment_status",
        "created_at",
    ])?;

    let mut sorted: Vec<&Account> = accounts.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    for account in sorted {
        writer.write_record(&[
            account.id.clone(),
            account.user_id.clone(),
            account.fee_fine_type.clone(),
            account.amount.to_string(),
            account.remaining.to_string(),
            account.status.to_string(),
            account.payment_status.clone(),
            format_timestamp(&account.created_at),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct LedgerRow<'a> {
    id: String,
    account_id: &'a str,
    user_id: &'a str,
    action_type: &'a str,
    amount: &'a MonetaryValue,
    balance: &'a MonetaryValue,
    payment_method: Option<&'a str>,
    transaction_information: Option<&'a str>,
    service_point: Option<&'a str>,
    source: Option<&'a str>,
    comments: Option<&'a str>,
    notify: bool,
    created_at: String,
}

/// Write ledger entries in CSV format, in the order given
pub fn write_ledger_csv(entries: &[LedgerEntry], output: &mut dyn Write) -> Result<(), FeeFineError> {
    let mut writer = csv::Writer::from_writer(output);

    for entry in entries {
        writer.serialize(LedgerRow {
            id: entry.id.to_string(),
            account_id: &entry.account_id,
            user_id: &entry.user_id,
            action_type: &entry.action_type,
            amount: &entry.amount,
            balance: &entry.balance,
            payment_method: entry.payment_method.as_deref(),
            transaction_information: entry.transaction_information.as_deref(),
            service_point: entry.service_point.as_deref(),
            source: entry.source.as_deref(),
            comments: entry.comments.as_deref(),
            notify: entry.notify,
            created_at: format_timestamp(&entry.created_at),
        })?;
    }

    writer.flush()?;
    Ok(())
}
