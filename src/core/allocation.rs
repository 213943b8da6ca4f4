//! Bulk allocation of one requested amount across several accounts
//!
//! This module provides `split`, which distributes a total across targets
//! that each accept at most their own capacity (the remaining balance for
//! payments, the refundable amount for refunds).
//!
//! # Algorithm
//!
//! 1. Targets are sorted by capacity, smallest first; ties go to the oldest
//!    account so that older debts drain first.
//! 2. Every target is offered an even share of what is left, rounded down.
//! 3. A target that cannot absorb the even share takes its whole capacity and
//!    the even share is recomputed for the targets after it.
//! 4. The rounding remainder is handed out one minimal unit at a time, in the
//!    same order, to targets that still have room.
//!
//! The shares always sum exactly to the requested total; anything else is an
//! internal error.

use crate::types::{Account, AccountId, FeeFineError, MonetaryValue};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error};

/// One account taking part in a split
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationTarget {
    pub id: AccountId,

    /// Most this target may receive
    pub capacity: MonetaryValue,

    /// Tie-break ordering key
    pub created_at: DateTime<Utc>,
}

impl AllocationTarget {
    pub fn new(id: impl Into<AccountId>, capacity: MonetaryValue, created_at: DateTime<Utc>) -> Self {
        AllocationTarget {
            id: id.into(),
            capacity,
            created_at,
        }
    }

    /// Target whose capacity is the account's remaining balance
    pub fn remaining_of(account: &Account) -> Self {
        Self::new(account.id.clone(), account.remaining, account.created_at)
    }
}

/// Result of a split: non-zero shares in allocation order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    shares: Vec<(AccountId, MonetaryValue)>,
}

impl Allocation {
    /// Share of the given account, if it received anything
    pub fn get(&self, id: &str) -> Option<MonetaryValue> {
        self.shares
            .iter()
            .find(|(share_id, _)| share_id == id)
            .map(|(_, amount)| *amount)
    }

    /// Shares in allocation order (smallest capacity first)
    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &MonetaryValue)> {
        self.shares.iter().map(|(id, amount)| (id, amount))
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Sum of all shares
    pub fn total(&self, scale: u32) -> MonetaryValue {
        MonetaryValue::sum(self.shares.iter().map(|(_, amount)| amount), scale)
    }
}

/// Distribute `total` across `targets` without exceeding any capacity
///
/// The caller is expected to have checked that `total` does not exceed the
/// sum of capacities. Targets without capacity receive nothing, and zero
/// shares are left out of the result.
///
/// # Errors
///
/// Returns `FeeFineError::AllocationInvariantViolation` if the shares do not
/// sum exactly to `total`, which happens when the total exceeds the combined
/// capacity.
pub fn split(
    total: &MonetaryValue,
    targets: &[AllocationTarget],
) -> Result<Allocation, FeeFineError> {
    if targets.is_empty() {
        return Ok(Allocation::default());
    }

    let scale = total.scale();
    let unit = MonetaryValue::minimal_unit(scale);

    let mut ordered: Vec<&AllocationTarget> = targets
        .iter()
        .filter(|target| target.capacity.is_positive())
        .collect();
    ordered.sort_by(|a, b| {
        a.capacity
            .amount()
            .cmp(&b.capacity.amount())
            .then(a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut shares = vec![MonetaryValue::zero(scale); ordered.len()];
    let mut left = *total;
    let mut pending = ordered.len();
    let mut even_share = even_share_of(&left, pending)?;

    for (share, target) in shares.iter_mut().zip(&ordered) {
        if target.capacity.is_greater_than_or_equals(&even_share) {
            *share = even_share.min(&left);
            left = left.subtract(share);
        } else {
            // Target is satisfied by less than an even share; spread the rest
            // over the targets after it
            *share = target.capacity;
            left = left.subtract(share);
            pending -= 1;
            even_share = even_share_of(&left, pending)?;
        }
    }

    while left.is_positive() {
        let mut progressed = false;
        for (share, target) in shares.iter_mut().zip(&ordered) {
            if !left.is_positive() {
                break;
            }
            let bumped = share.add(&unit);
            if target.capacity.is_greater_than_or_equals(&bumped) {
                *share = bumped;
                left = left.subtract(&unit);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let allocation = Allocation {
        shares: ordered
            .iter()
            .zip(shares)
            .filter(|(_, share)| !share.is_zero())
            .map(|(target, share)| (target.id.clone(), share))
            .collect(),
    };

    let allocated = allocation.total(scale);
    if allocated != *total {
        error!(
            total = %total,
            allocated = %allocated,
            targets = targets.len(),
            "allocation does not add up to the requested total"
        );
        return Err(FeeFineError::allocation_invariant_violation(total, allocated));
    }

    debug!(total = %total, shares = allocation.len(), "split requested amount");
    Ok(allocation)
}

fn even_share_of(left: &MonetaryValue, pending: usize) -> Result<MonetaryValue, FeeFineError> {
    if pending == 0 {
        return Ok(MonetaryValue::zero(left.scale()));
    }
    let divisor = MonetaryValue::new(Decimal::from(pending), left.scale());
    left.divide_down(&divisor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rstest::rstest;

    fn money(s: &str) -> MonetaryValue {
        s.parse().unwrap()
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// Targets named a, b, c, ... created one day apart
    fn targets(capacities: &[&str]) -> Vec<AllocationTarget> {
        capacities
            .iter()
            .enumerate()
            .map(|(i, capacity)| {
                AllocationTarget::new(
                    ((b'a' + i as u8) as char).to_string(),
                    money(capacity),
                    base_time() + Duration::days(i as i64),
                )
            })
            .collect()
    }

    #[test]
    fn test_even_split_gives_remainder_to_oldest() {
        let allocation = split(&money("50.00"), &targets(&["100", "100", "100"])).unwrap();

        assert_eq!(allocation.get("a"), Some(money("16.67")));
        assert_eq!(allocation.get("b"), Some(money("16.67")));
        assert_eq!(allocation.get("c"), Some(money("16.66")));
        assert_eq!(allocation.total(2), money("50.00"));
    }

    #[test]
    fn test_small_capacities_are_filled_first() {
        let allocation = split(&money("30.00"), &targets(&["30", "5", "5"])).unwrap();

        assert_eq!(allocation.get("b"), Some(money("5.00")));
        assert_eq!(allocation.get("c"), Some(money("5.00")));
        assert_eq!(allocation.get("a"), Some(money("20.00")));

        let order: Vec<&str> = allocation.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_full_amount_closes_every_target() {
        let allocation = split(&money("18.50"), &targets(&["10.00", "5.25", "3.25"])).unwrap();

        assert_eq!(allocation.get("a"), Some(money("10.00")));
        assert_eq!(allocation.get("b"), Some(money("5.25")));
        assert_eq!(allocation.get("c"), Some(money("3.25")));
    }

    #[test]
    fn test_remainder_skips_targets_without_room() {
        let allocation = split(&money("1.01"), &targets(&["0.50", "0.51"])).unwrap();

        assert_eq!(allocation.get("a"), Some(money("0.50")));
        assert_eq!(allocation.get("b"), Some(money("0.51")));
    }

    #[test]
    fn test_tiny_total_goes_to_oldest_accounts() {
        let allocation = split(&money("0.02"), &targets(&["5", "5", "5"])).unwrap();

        assert_eq!(allocation.len(), 2);
        assert_eq!(allocation.get("a"), Some(money("0.01")));
        assert_eq!(allocation.get("b"), Some(money("0.01")));
        assert_eq!(allocation.get("c"), None);
    }

    #[rstest]
    #[case("7.35", "10.00")]
    #[case("10.00", "10.00")]
    fn test_single_target_takes_everything(#[case] total: &str, #[case] capacity: &str) {
        let allocation = split(&money(total), &targets(&[capacity])).unwrap();

        assert_eq!(allocation.len(), 1);
        assert_eq!(allocation.get("a"), Some(money(total)));
    }

    #[test]
    fn test_no_targets() {
        let allocation = split(&money("5.00"), &[]).unwrap();
        assert!(allocation.is_empty());
    }

    #[test]
    fn test_zero_capacity_target_is_left_out() {
        let allocation = split(&money("4.00"), &targets(&["0", "10", "10"])).unwrap();

        assert_eq!(allocation.get("a"), None);
        assert_eq!(allocation.get("b"), Some(money("2.00")));
        assert_eq!(allocation.get("c"), Some(money("2.00")));
    }

    #[test]
    fn test_total_above_capacity_is_an_invariant_violation() {
        let result = split(&money("25.00"), &targets(&["10", "10"]));
        assert!(matches!(
            result,
            Err(FeeFineError::AllocationInvariantViolation { .. })
        ));
    }

    #[test]
    fn test_equal_capacity_and_age_ordered_by_id() {
        let mut same = targets(&["10", "10"]);
        same[1].created_at = same[0].created_at;

        let allocation = split(&money("0.01"), &same).unwrap();
        assert_eq!(allocation.get("a"), Some(money("0.01")));
    }

    fn capacities_and_total() -> impl Strategy<Value = (Vec<i64>, i64)> {
        prop::collection::vec(0i64..100_000, 1..8).prop_flat_map(|capacities| {
            let sum: i64 = capacities.iter().sum();
            (Just(capacities), 0..=sum)
        })
    }

    proptest! {
        #[test]
        fn prop_shares_sum_to_total_within_capacity((capacities, total) in capacities_and_total()) {
            let targets: Vec<AllocationTarget> = capacities
                .iter()
                .enumerate()
                .map(|(i, units)| {
                    AllocationTarget::new(
                        format!("t{}", i),
                        MonetaryValue::from_minor_units(*units, 2),
                        base_time(),
                    )
                })
                .collect();
            let total = MonetaryValue::from_minor_units(total, 2);

            let allocation = split(&total, &targets).unwrap();

            prop_assert_eq!(allocation.total(2), total);
            for target in &targets {
                let share = allocation.get(&target.id).unwrap_or_else(|| MonetaryValue::zero(2));
                prop_assert!(target.capacity.is_greater_than_or_equals(&share));
                prop_assert!(!share.is_negative());
            }
        }
    }
}
