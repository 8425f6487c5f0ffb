//! Property-based tests for the costing fold.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{CompanyId, DocumentId};

use super::chain::CostChain;
use super::layer::RunningPosition;
use super::replay::replay;

#[derive(Debug, Clone)]
enum Op {
    Purchase { day: u32, quantity: i64, unit_cost: i64 },
    Sale { day: u32, quantity: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..=28, 1i64..500, 1i64..100_000).prop_map(|(day, quantity, unit_cost)| Op::Purchase {
            day,
            quantity,
            unit_cost,
        }),
        (1u32..=28, 1i64..300).prop_map(|(day, quantity)| Op::Sale { day, quantity }),
    ]
}

fn build(ops: &[Op]) -> CostChain {
    let mut chain = CostChain::new(CompanyId::new("C01"), "PET001", vec![]);
    for op in ops {
        let result = match *op {
            Op::Purchase {
                day,
                quantity,
                unit_cost,
            } => chain.record_purchase_at(
                DocumentId::new(),
                date(day),
                Decimal::from(quantity),
                Decimal::new(unit_cost, 2),
            ),
            Op::Sale { day, quantity } => {
                chain.record_sale(DocumentId::new(), date(day), Decimal::from(quantity))
            }
        };
        assert!(result.is_ok());
    }
    chain
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Replaying a chain that nothing changed reproduces it exactly.
    #[test]
    fn prop_replay_is_idempotent(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let chain = build(&ops);
        let entries = chain.entries().to_vec();

        let once = replay(RunningPosition::default(), &entries);
        let twice = replay(RunningPosition::default(), &once);
        prop_assert_eq!(&once, &entries);
        prop_assert_eq!(once, twice);
    }

    /// Inserting entries out of date order yields the same chain as a full
    /// replay of the final order.
    #[test]
    fn prop_incremental_matches_full_replay(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let chain = build(&ops);
        let full = replay(RunningPosition::default(), chain.entries());
        prop_assert_eq!(full.as_slice(), chain.entries());
    }

    /// The running balance is always the net of the movements so far.
    #[test]
    fn prop_balance_tracks_quantities(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let chain = build(&ops);
        let mut expected = Decimal::ZERO;
        for entry in chain.entries() {
            if entry.movement.is_purchase() {
                expected += entry.movement.quantity();
            } else {
                expected -= entry.movement.quantity();
            }
            prop_assert_eq!(entry.running.balance, expected);
            prop_assert_eq!(entry.needs_review, expected < Decimal::ZERO);
        }
    }

    /// Revising a purchase then reverting it restores every entry.
    #[test]
    fn prop_revise_and_revert(
        ops in prop::collection::vec(op_strategy(), 1..20),
        new_cost in 1i64..10_000_000,
    ) {
        let mut chain = build(&ops);
        let original = chain.entries().to_vec();
        let Some(purchase) = original.iter().find(|e| e.movement.is_purchase()).cloned() else {
            return Ok(());
        };
        let super::layer::CostMovement::Purchase { total_cost, .. } = purchase.movement else {
            return Ok(());
        };

        chain
            .revise_purchase(purchase.id, Decimal::new(new_cost, 2))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        chain
            .revise_purchase(purchase.id, total_cost)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(chain.entries(), original.as_slice());
    }
}
