//! Fixed-point monetary values
//!
//! This module defines `MonetaryValue`, the amount type used by every other
//! component of the engine. A value is a `Decimal` magnitude bound to a scale
//! (the currency's default fraction digits) and is always rounded half-to-even
//! to that scale at construction.
//!
//! # Rounding Contract
//!
//! - Every constructor and every arithmetic operation rounds the result
//! - Comparisons and zero checks look at the rounded magnitude only
//! - The pre-rounding magnitude is kept for display purposes

use super::error::FeeFineError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Default number of fraction digits (USD, EUR, ...)
pub const DEFAULT_SCALE: u32 = 2;

/// Most fraction digits a `Decimal` can carry; larger scales are clamped
pub const MAX_SCALE: u32 = Decimal::MAX_SCALE;

/// A decimal amount rounded to a fixed number of fraction digits
///
/// Equality and ordering compare the rounded magnitudes, so `0.001` and `0.00`
/// are equal at scale 2.
#[derive(Debug, Clone, Copy)]
pub struct MonetaryValue {
    /// Rounded magnitude, rescaled to exactly `scale` fraction digits
    amount: Decimal,

    /// Magnitude as supplied before rounding
    original: Decimal,

    /// Number of fraction digits
    scale: u32,
}

impl MonetaryValue {
    /// Create a value from a decimal, rounding half-to-even to `scale`
    pub fn new(value: Decimal, scale: u32) -> Self {
        let scale = scale.min(MAX_SCALE);
        MonetaryValue {
            amount: round(value, scale, RoundingStrategy::MidpointNearestEven),
            original: value,
            scale,
        }
    }

    /// The zero value at the given scale
    pub fn zero(scale: u32) -> Self {
        Self::new(Decimal::ZERO, scale)
    }

    /// One smallest currency unit (e.g. `0.01` at scale 2)
    pub fn minimal_unit(scale: u32) -> Self {
        Self::from_minor_units(1, scale)
    }

    /// Parse a decimal string
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns `FeeFineError::InvalidAmount` if the string is not a decimal number.
    pub fn parse(input: &str, scale: u32) -> Result<Self, FeeFineError> {
        let value = Decimal::from_str(input.trim())
            .map_err(|_| FeeFineError::invalid_amount(input))?;
        Ok(Self::new(value, scale))
    }

    /// Create a value from a floating point quantity
    ///
    /// # Errors
    ///
    /// Returns `FeeFineError::InvalidAmount` for NaN, infinities and values
    /// outside the decimal range.
    pub fn from_f64(value: f64, scale: u32) -> Result<Self, FeeFineError> {
        let decimal =
            Decimal::try_from(value).map_err(|_| FeeFineError::invalid_amount(value.to_string()))?;
        Ok(Self::new(decimal, scale))
    }

    /// Create a value from an integer count of minor units (`1050` at scale 2 is `10.50`)
    pub fn from_minor_units(units: i64, scale: u32) -> Self {
        let scale = scale.min(MAX_SCALE);
        Self::new(Decimal::new(units, scale), scale)
    }

    /// The rounded magnitude
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Number of fraction digits
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn add(&self, other: &MonetaryValue) -> MonetaryValue {
        Self::new(self.amount + other.amount, self.scale)
    }

    pub fn subtract(&self, other: &MonetaryValue) -> MonetaryValue {
        Self::new(self.amount - other.amount, self.scale)
    }

    pub fn multiply(&self, other: &MonetaryValue) -> MonetaryValue {
        Self::new(self.amount * other.amount, self.scale)
    }

    /// Divide, rounding the quotient half-to-even
    ///
    /// # Errors
    ///
    /// Returns `FeeFineError::DivisionByZero` if `other` is zero at its scale.
    pub fn divide(&self, other: &MonetaryValue) -> Result<MonetaryValue, FeeFineError> {
        let quotient = self.checked_quotient(other)?;
        Ok(Self::new(quotient, self.scale))
    }

    /// Divide, rounding the quotient down (toward negative infinity)
    ///
    /// Used when splitting amounts so that shares never sum above the dividend.
    ///
    /// # Errors
    ///
    /// Returns `FeeFineError::DivisionByZero` if `other` is zero at its scale.
    pub fn divide_down(&self, other: &MonetaryValue) -> Result<MonetaryValue, FeeFineError> {
        let quotient = self.checked_quotient(other)?;
        Ok(MonetaryValue {
            amount: round(quotient, self.scale, RoundingStrategy::ToNegativeInfinity),
            original: quotient,
            scale: self.scale,
        })
    }

    fn checked_quotient(&self, other: &MonetaryValue) -> Result<Decimal, FeeFineError> {
        if other.is_zero() {
            return Err(FeeFineError::DivisionByZero);
        }
        self.amount
            .checked_div(other.amount)
            .ok_or(FeeFineError::DivisionByZero)
    }

    /// The lesser of two values; ties return `self`
    pub fn min(&self, other: &MonetaryValue) -> MonetaryValue {
        if self.amount <= other.amount {
            *self
        } else {
            *other
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn is_greater_than(&self, other: &MonetaryValue) -> bool {
        self.amount > other.amount
    }

    pub fn is_greater_than_or_equals(&self, other: &MonetaryValue) -> bool {
        self.amount >= other.amount
    }

    /// Sum a sequence of values at the given scale
    pub fn sum<'a, I>(values: I, scale: u32) -> MonetaryValue
    where
        I: IntoIterator<Item = &'a MonetaryValue>,
    {
        values
            .into_iter()
            .fold(Self::zero(scale), |acc, value| acc.add(value))
    }

    /// The value as originally supplied, with trailing zeros stripped
    ///
    /// A bare integer keeps one fraction digit when the scale is non-zero,
    /// so `"10.00"` renders as `"10.0"` and `"10.50"` as `"10.5"`.
    pub fn to_original_string(&self) -> String {
        let mut stripped = self.original.normalize();
        if stripped.scale() == 0 && self.scale > 0 {
            stripped.rescale(1);
        }
        stripped.to_string()
    }
}

fn round(value: Decimal, scale: u32, strategy: RoundingStrategy) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(scale, strategy);
    rounded.rescale(scale);
    if rounded.is_zero() {
        // "-0.00" and "0.00" are the same amount
        rounded.set_sign_positive(true);
    }
    rounded
}

impl PartialEq for MonetaryValue {
    fn eq(&self, other: &Self) -> bool {
        self.amount == other.amount
    }
}

impl Eq for MonetaryValue {}

// No `Ord`: its by-value `min` would shadow `MonetaryValue::min`
impl PartialOrd for MonetaryValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for MonetaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.amount)
    }
}

/// Parses at the default scale
impl FromStr for MonetaryValue {
    type Err = FeeFineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_SCALE)
    }
}

impl Serialize for MonetaryValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn money(s: &str) -> MonetaryValue {
        s.parse().unwrap()
    }

    #[rstest]
    #[case::integer("10", "10.00")]
    #[case::padded("10.5", "10.50")]
    #[case::half_even_down("0.125", "0.12")]
    #[case::half_even_up("0.135", "0.14")]
    #[case::above_half("0.006", "0.01")]
    #[case::negative("-3.333", "-3.33")]
    #[case::negative_zero("-0.001", "0.00")]
    #[case::whitespace("  7.10  ", "7.10")]
    fn test_parse_rounds_half_even(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(money(input).to_string(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::text("ten dollars")]
    #[case::double_dot("1.2.3")]
    fn test_parse_rejects_non_decimal(#[case] input: &str) {
        let result = MonetaryValue::parse(input, DEFAULT_SCALE);
        assert!(matches!(result, Err(FeeFineError::InvalidAmount { .. })));
    }

    #[rstest]
    #[case("0", true)]
    #[case("0.00", true)]
    #[case("0.000000000000001", true)]
    #[case("0.005", true)]
    #[case("0.006", false)]
    #[case("-0.006", false)]
    fn test_zero_equivalence(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(money(input).is_zero(), expected);
    }

    #[test]
    fn test_scale_zero_currency() {
        let value = MonetaryValue::parse("1234.5", 0).unwrap();
        assert_eq!(value.to_string(), "1234");

        let value = MonetaryValue::parse("1235.5", 0).unwrap();
        assert_eq!(value.to_string(), "1236");
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(MonetaryValue::from_minor_units(1050, 2), money("10.50"));
        assert_eq!(MonetaryValue::minimal_unit(2).to_string(), "0.01");
        assert_eq!(MonetaryValue::minimal_unit(3).to_string(), "0.001");
    }

    #[rstest]
    #[case(28)]
    #[case(29)]
    #[case(u32::MAX)]
    fn test_scale_is_clamped_to_decimal_precision(#[case] scale: u32) {
        let unit = MonetaryValue::minimal_unit(scale);
        assert_eq!(unit.scale(), MAX_SCALE);
        assert!(unit.is_positive());

        let value = MonetaryValue::parse("1.5", scale).unwrap();
        assert_eq!(value.scale(), MAX_SCALE);
        assert_eq!(value.add(&unit).subtract(&unit), value);
    }

    #[test]
    fn test_from_f64() {
        assert_eq!(MonetaryValue::from_f64(0.1, 2).unwrap(), money("0.10"));
        assert_eq!(MonetaryValue::from_f64(2.675, 2).unwrap().scale(), 2);
        assert!(MonetaryValue::from_f64(f64::NAN, 2).is_err());
    }

    #[test]
    fn test_arithmetic_rounds_results() {
        let a = money("10.00");
        let b = money("3.00");

        assert_eq!(a.add(&b), money("13.00"));
        assert_eq!(a.subtract(&b), money("7.00"));
        assert_eq!(a.multiply(&money("0.333")), money("3.30"));
        assert_eq!(a.divide(&b).unwrap(), money("3.33"));
        assert_eq!(money("20.00").divide(&b).unwrap(), money("6.67"));
        assert_eq!(money("20.00").divide_down(&b).unwrap(), money("6.66"));
    }

    #[test]
    fn test_divide_by_zero() {
        let a = money("10.00");
        assert_eq!(a.divide(&money("0.001")), Err(FeeFineError::DivisionByZero));
        assert_eq!(a.divide_down(&money("0")), Err(FeeFineError::DivisionByZero));
    }

    #[test]
    fn test_min_prefers_left_on_tie() {
        let left = money("5.001");
        let right = money("5.004");

        let result = left.min(&right);
        assert_eq!(result.to_original_string(), "5.001");

        assert_eq!(money("4").min(&money("5")), money("4"));
        assert_eq!(money("6").min(&money("5")), money("5"));
    }

    #[test]
    fn test_comparisons() {
        let a = money("10.004");
        let b = money("10.00");

        assert!(!a.is_greater_than(&b));
        assert!(a.is_greater_than_or_equals(&b));
        assert!(money("10.01").is_greater_than(&b));
        assert!(money("0.01").is_positive());
        assert!(money("-0.01").is_negative());
        assert!(!money("0.00").is_positive());
        assert!(!money("0.00").is_negative());
    }

    #[rstest]
    #[case("10.00", "10.0")]
    #[case("10.50", "10.5")]
    #[case("10.125", "10.125")]
    #[case("0", "0.0")]
    fn test_original_string(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(money(input).to_original_string(), expected);
    }

    #[test]
    fn test_original_string_without_fraction_digits() {
        let value = MonetaryValue::parse("100.00", 0).unwrap();
        assert_eq!(value.to_original_string(), "100");
    }

    #[test]
    fn test_sum() {
        let values = [money("1.10"), money("2.20"), money("3.30")];
        assert_eq!(MonetaryValue::sum(&values, 2), money("6.60"));
        assert!(MonetaryValue::sum(&Vec::<MonetaryValue>::new(), 2).is_zero());
    }

    proptest! {
        #[test]
        fn prop_rendering_is_a_fixed_point(units in any::<i64>(), extra in 0u32..6) {
            let input = Decimal::new(units, 2 + extra).to_string();
            let first = MonetaryValue::parse(&input, DEFAULT_SCALE).unwrap();
            let second = MonetaryValue::parse(&first.to_string(), DEFAULT_SCALE).unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.to_string(), second.to_string());
        }
    }
}
