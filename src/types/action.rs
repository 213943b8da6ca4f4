//! Action-related types for the fee/fine engine
//!
//! This module defines the closed set of action kinds, the ledger entries
//! recorded for each applied action, and the caller-supplied options that
//! decorate those entries.

use super::account::{Account, AccountId, UserId};
use super::error::FeeFineError;
use super::money::MonetaryValue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Ledger entry identifier
pub type EntryId = Uuid;

/// Kinds of action that can be applied to an account
///
/// `Credit` is internal: the engine records credits while refunding, but
/// callers cannot request one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionKind {
    /// Patron paid some or all of the remaining balance
    Pay,

    /// Staff forgave some or all of the remaining balance
    Waive,

    /// Balance was handed over to an external collector (bursar)
    Transfer,

    /// Money previously paid or transferred is given back
    Refund,

    /// Account was created in error and is closed without payment
    Cancel,

    /// Internal bookkeeping entry that precedes a refund
    Credit,
}

impl ActionKind {
    /// Action type recorded when the action leaves a balance behind
    pub const fn partial_label(self) -> &'static str {
        match self {
            ActionKind::Pay => "Paid partially",
            ActionKind::Waive => "Waived partially",
            ActionKind::Transfer => "Transferred partially",
            ActionKind::Refund => "Refunded partially",
            ActionKind::Cancel => "Cancelled as error",
            ActionKind::Credit => "Credited partially",
        }
    }

    /// Action type recorded when the action resolves the balance
    pub const fn full_label(self) -> &'static str {
        match self {
            ActionKind::Pay => "Paid fully",
            ActionKind::Waive => "Waived fully",
            ActionKind::Transfer => "Transferred fully",
            ActionKind::Refund => "Refunded fully",
            ActionKind::Cancel => "Cancelled as error",
            ActionKind::Credit => "Credited fully",
        }
    }

    pub const fn label(self, full: bool) -> &'static str {
        if full {
            self.full_label()
        } else {
            self.partial_label()
        }
    }

    /// Map a recorded action type back to its kind
    ///
    /// Returns `None` for labels the engine never produces itself, such as a
    /// custom cancellation reason.
    pub fn for_action_type(action_type: &str) -> Option<ActionKind> {
        match action_type {
            "Paid partially" | "Paid fully" => Some(ActionKind::Pay),
            "Waived partially" | "Waived fully" => Some(ActionKind::Waive),
            "Transferred partially" | "Transferred fully" => Some(ActionKind::Transfer),
            "Refunded partially" | "Refunded fully" => Some(ActionKind::Refund),
            "Credited partially" | "Credited fully" => Some(ActionKind::Credit),
            "Cancelled as error" => Some(ActionKind::Cancel),
            _ => None,
        }
    }

    /// Whether callers may request this kind directly
    pub const fn is_user_invocable(self) -> bool {
        !matches!(self, ActionKind::Credit)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ActionKind::Pay => "pay",
            ActionKind::Waive => "waive",
            ActionKind::Transfer => "transfer",
            ActionKind::Refund => "refund",
            ActionKind::Cancel => "cancel",
            ActionKind::Credit => "credit",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses the user-invocable kinds only
impl FromStr for ActionKind {
    type Err = FeeFineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pay" => Ok(ActionKind::Pay),
            "waive" => Ok(ActionKind::Waive),
            "transfer" => Ok(ActionKind::Transfer),
            "refund" => Ok(ActionKind::Refund),
            "cancel" => Ok(ActionKind::Cancel),
            _ => Err(FeeFineError::Parse {
                line: None,
                message: format!("Invalid action '{}'", s),
            }),
        }
    }
}

/// Caller-supplied decorations for an action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOptions {
    /// Free-text comments, conventionally `STAFF : ... \n PATRON : ...`
    pub comments: Option<String>,

    /// Send a patron notice for each entry created
    pub notify_patron: bool,

    /// Payment method or transfer account label
    pub payment_method: Option<String>,

    /// Transaction information (check number, receipt id, ...)
    pub transaction_info: Option<String>,

    /// Service point where the action was performed
    pub service_point: Option<String>,

    /// Staff member or system that performed the action
    pub user_name: Option<String>,

    /// Cancellation reason, recorded as the action type of a cancellation
    pub reason_for_action: Option<String>,
}

/// Immutable record of one action applied to one account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: EntryId,

    pub account_id: AccountId,

    pub user_id: UserId,

    /// Kind and outcome of the action, e.g. "Paid partially"
    pub action_type: String,

    /// Amount applied by this entry
    pub amount: MonetaryValue,

    /// Account balance right after this entry
    pub balance: MonetaryValue,

    pub comments: Option<String>,

    pub payment_method: Option<String>,

    pub transaction_information: Option<String>,

    pub service_point: Option<String>,

    pub source: Option<String>,

    /// Whether a patron notice was requested for this entry
    pub notify: bool,

    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// New entry against `account`, decorated with the caller's options
    ///
    /// The patron notice flag follows `options.notify_patron`; callers that
    /// record internal entries clear it afterwards.
    pub fn record(
        account: &Account,
        action_type: impl Into<String>,
        amount: MonetaryValue,
        balance: MonetaryValue,
        options: &ActionOptions,
    ) -> Self {
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: account.id.clone(),
            user_id: account.user_id.clone(),
            action_type: action_type.into(),
            amount,
            balance,
            comments: options.comments.clone(),
            payment_method: options.payment_method.clone(),
            transaction_information: options.transaction_info.clone(),
            service_point: options.service_point.clone(),
            source: options.user_name.clone(),
            notify: options.notify_patron,
            created_at: Utc::now(),
        }
    }

    /// Kind of the recorded action, if the action type is one the engine produces
    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::for_action_type(&self.action_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ActionKind::Pay)]
    #[case(ActionKind::Waive)]
    #[case(ActionKind::Transfer)]
    #[case(ActionKind::Refund)]
    #[case(ActionKind::Credit)]
    #[case(ActionKind::Cancel)]
    fn test_labels_map_back_to_kind(#[case] kind: ActionKind) {
        assert_eq!(ActionKind::for_action_type(kind.full_label()), Some(kind));
        assert_eq!(ActionKind::for_action_type(kind.partial_label()), Some(kind));
    }

    #[test]
    fn test_label_selection() {
        assert_eq!(ActionKind::Pay.label(true), "Paid fully");
        assert_eq!(ActionKind::Pay.label(false), "Paid partially");
        assert_eq!(ActionKind::Cancel.label(false), "Cancelled as error");
    }

    #[test]
    fn test_unknown_action_type() {
        assert_eq!(ActionKind::for_action_type("Duplicate charge"), None);
        assert_eq!(ActionKind::for_action_type("paid fully"), None);
    }

    #[rstest]
    #[case("pay", ActionKind::Pay)]
    #[case("WAIVE", ActionKind::Waive)]
    #[case(" transfer ", ActionKind::Transfer)]
    #[case("Refund", ActionKind::Refund)]
    #[case("cancel", ActionKind::Cancel)]
    fn test_parse_kind(#[case] input: &str, #[case] expected: ActionKind) {
        assert_eq!(input.parse::<ActionKind>().unwrap(), expected);
    }

    #[test]
    fn test_record_copies_options() {
        let created = Utc::now();
        let account = Account::new("a-1", "u-1", "Lost item", "10.00".parse().unwrap(), created);
        let options = ActionOptions {
            comments: Some("STAFF : ok".to_string()),
            notify_patron: true,
            payment_method: Some("Cash".to_string()),
            transaction_info: Some("r-12".to_string()),
            service_point: Some("desk".to_string()),
            user_name: Some("admin".to_string()),
            reason_for_action: None,
        };

        let entry = LedgerEntry::record(
            &account,
            ActionKind::Pay.full_label(),
            "10.00".parse().unwrap(),
            MonetaryValue::zero(2),
            &options,
        );

        assert_eq!(entry.account_id, "a-1");
        assert_eq!(entry.user_id, "u-1");
        assert_eq!(entry.kind(), Some(ActionKind::Pay));
        assert_eq!(entry.payment_method.as_deref(), Some("Cash"));
        assert_eq!(entry.transaction_information.as_deref(), Some("r-12"));
        assert_eq!(entry.source.as_deref(), Some("admin"));
        assert!(entry.notify);
    }

    #[test]
    fn test_credit_is_not_user_invocable() {
        assert!("credit".parse::<ActionKind>().is_err());
        assert!(!ActionKind::Credit.is_user_invocable());
        assert!(ActionKind::Refund.is_user_invocable());
    }
}
