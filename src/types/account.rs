//! Account-related types for the fee/fine engine
//!
//! This module defines the Account structure: a single fee or fine owed by a
//! patron, with its outstanding balance and lifecycle status.

use super::error::FeeFineError;
use super::money::MonetaryValue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Fee/fine account identifier
pub type AccountId = String;

/// Patron identifier
pub type UserId = String;

/// Payment status of an account that has not been acted on yet
pub const OUTSTANDING: &str = "Outstanding";

/// Lifecycle status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccountStatus {
    /// Something is still owed
    Open,
    /// Fully resolved by payment, waiver, transfer or cancellation
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Open => "Open",
            AccountStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = FeeFineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(AccountStatus::Open),
            "closed" => Ok(AccountStatus::Closed),
            _ => Err(FeeFineError::Parse {
                line: None,
                message: format!("Invalid account status '{}'", s),
            }),
        }
    }
}

/// A single fee/fine owed by a patron
///
/// Invariant: `0 <= remaining <= amount`, and `status` is `Closed` exactly
/// when the account has been fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// Unique account id
    pub id: AccountId,

    /// Patron who owes the fee/fine
    pub user_id: UserId,

    /// Kind of charge, e.g. "Overdue fine" or "Lost item fee"
    pub fee_fine_type: String,

    /// Amount originally owed
    ///
    /// Never changes after the account is created.
    pub amount: MonetaryValue,

    /// Amount still owed
    ///
    /// Only decreases while the account is open.
    pub remaining: MonetaryValue,

    /// Action type of the last action applied, or "Outstanding"
    pub payment_status: String,

    /// Open or closed
    pub status: AccountStatus,

    /// Creation time, used to order allocation ties (oldest first)
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new open account with the whole amount outstanding
    pub fn new(
        id: impl Into<AccountId>,
        user_id: impl Into<UserId>,
        fee_fine_type: impl Into<String>,
        amount: MonetaryValue,
        created_at: DateTime<Utc>,
    ) -> Self {
        Account {
            id: id.into(),
            user_id: user_id.into(),
            fee_fine_type: fee_fine_type.into(),
            amount,
            remaining: amount,
            payment_status: OUTSTANDING.to_string(),
            status: AccountStatus::Open,
            created_at,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AccountStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == AccountStatus::Closed
    }

    /// Record the outcome of an action
    ///
    /// A zero remainder closes the account; anything else leaves it open.
    pub fn apply(&mut self, action_type: &str, remaining: MonetaryValue) {
        self.payment_status = action_type.to_string();
        if remaining.is_zero() {
            self.remaining = MonetaryValue::zero(remaining.scale());
            self.status = AccountStatus::Closed;
        } else {
            self.remaining = remaining;
            self.status = AccountStatus::Open;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn account() -> Account {
        Account::new(
            "a-1",
            "u-1",
            "Overdue fine",
            "10.00".parse().unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_new_account_is_outstanding() {
        let account = account();
        assert_eq!(account.remaining, account.amount);
        assert_eq!(account.payment_status, OUTSTANDING);
        assert!(account.is_open());
    }

    #[test]
    fn test_apply_partial_keeps_account_open() {
        let mut account = account();
        account.apply("Paid partially", "4.00".parse().unwrap());

        assert_eq!(account.remaining.to_string(), "4.00");
        assert_eq!(account.payment_status, "Paid partially");
        assert!(account.is_open());
    }

    #[test]
    fn test_apply_zero_closes_account() {
        let mut account = account();
        account.apply("Paid fully", "0.001".parse().unwrap());

        assert_eq!(account.remaining.to_string(), "0.00");
        assert!(account.is_closed());
        assert_eq!(account.amount.to_string(), "10.00");
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Open".parse::<AccountStatus>().unwrap(), AccountStatus::Open);
        assert_eq!(" closed ".parse::<AccountStatus>().unwrap(), AccountStatus::Closed);
        assert!("pending".parse::<AccountStatus>().is_err());
    }
}
