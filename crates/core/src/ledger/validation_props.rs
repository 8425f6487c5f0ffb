//! Property-based tests for the double-entry invariant checker.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::validation::test_support::make_line;
use super::validation::validate_lines;

/// Strategy to generate a positive amount with up to 4 decimal places.
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000_000i64).prop_map(|units| Decimal::new(units, 4))
}

/// Strategy to generate a list of amounts for one side of an entry.
fn amounts(max_len: usize) -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(positive_amount(), 1..=max_len)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: Lines built so that both sides carry the same total pass
    /// and report that total.
    #[test]
    fn prop_balanced_sets_accepted(debits in amounts(10), split in 1usize..5) {
        let total: Decimal = debits.iter().copied().sum();
        let mut lines: Vec<_> = debits
            .iter()
            .map(|d| make_line("101010100", *d, Decimal::ZERO))
            .collect();

        // Spread the same total over `split` credit lines.
        let share = (total / Decimal::from(split as u64)).round_dp(4);
        let mut remaining = total;
        for _ in 1..split {
            lines.push(make_line("401010100", Decimal::ZERO, share));
            remaining -= share;
        }
        lines.push(make_line("401010100", Decimal::ZERO, remaining));

        let totals = validate_lines(&lines);
        prop_assert!(totals.is_ok(), "balanced set rejected: {:?}", totals);
        let totals = totals.unwrap_or_default();
        prop_assert_eq!(totals.debit, totals.credit);
        prop_assert_eq!(totals.debit, total);
    }

    /// Property 2: Any difference at storage precision is rejected, and the
    /// error carries both rounded totals.
    #[test]
    fn prop_unbalanced_sets_rejected(
        debits in amounts(10),
        skew in 1i64..1_000_000i64,
        up in any::<bool>(),
    ) {
        let total: Decimal = debits.iter().copied().sum();
        let delta = Decimal::new(skew, 4);
        let credit = if up { total + delta } else { total - delta };
        prop_assume!(credit > Decimal::ZERO);

        let mut lines: Vec<_> = debits
            .iter()
            .map(|d| make_line("101010100", *d, Decimal::ZERO))
            .collect();
        lines.push(make_line("401010100", Decimal::ZERO, credit));

        match validate_lines(&lines) {
            Err(LedgerError::Unbalanced { debit, credit: c }) => {
                prop_assert_eq!(debit, total);
                prop_assert_eq!(c, credit);
            }
            other => prop_assert!(false, "expected Unbalanced, got {:?}", other),
        }
    }

    /// Property 3: Line order never changes the outcome.
    #[test]
    fn prop_order_independent(debits in amounts(8)) {
        let total: Decimal = debits.iter().copied().sum();
        let mut lines: Vec<_> = debits
            .iter()
            .map(|d| make_line("101010100", *d, Decimal::ZERO))
            .collect();
        lines.push(make_line("401010100", Decimal::ZERO, total));

        let forward = validate_lines(&lines);
        lines.reverse();
        let backward = validate_lines(&lines);
        prop_assert_eq!(forward, backward);
    }
}
