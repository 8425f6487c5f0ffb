//! Monetary precision rules.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every amount that reaches storage is a `rust_decimal::Decimal` rounded to
//! [`MONEY_SCALE`] places with banker's rounding.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places used for monetary storage (`NUMERIC(18,4)`).
pub const MONEY_SCALE: u32 = 4;

/// Rounds an amount to the storage precision using banker's rounding
/// (round half to even).
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Rounds to `dp` places with banker's rounding.
#[must_use]
pub fn round_dp(amount: Decimal, dp: u32) -> Decimal {
    amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(10.00005), dec!(10.0000))]
    #[case(dec!(10.00015), dec!(10.0002))]
    #[case(dec!(-10.00015), dec!(-10.0002))]
    #[case(dec!(1.23456), dec!(1.2346))]
    #[case(dec!(50000), dec!(50000))]
    fn test_round_money(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_money(input), expected);
    }

    #[test]
    fn test_round_dp_bankers() {
        assert_eq!(round_dp(dec!(2.5), 0), dec!(2));
        assert_eq!(round_dp(dec!(3.5), 0), dec!(4));
    }
}
