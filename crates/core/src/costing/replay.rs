//! The costing fold.
//!
//! - Purchase: balance += qty; total += cost; average = total / balance
//! - Sale: balance -= qty; consumed = total * qty / balance (the whole total
//!   when the sale empties the stock); average unchanged
//!
//! Totals round to storage precision and the average to 4 places, both with
//! banker's rounding.

use rust_decimal::Decimal;
use tally_shared::types::{round_dp, round_money};

use super::layer::{CostLayerEntry, CostMovement, RunningPosition};

/// Decimal places kept on the running average.
pub const AVERAGE_COST_SCALE: u32 = 4;

/// Outcome of one movement applied to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Unit cost applied.
    pub unit_cost: Decimal,
    /// Value moved.
    pub total: Decimal,
    /// Position afterwards.
    pub position: RunningPosition,
    /// The position went negative.
    pub needs_review: bool,
}

/// Applies one movement to `prev`. Voided movements change nothing.
#[must_use]
pub fn step(prev: RunningPosition, movement: &CostMovement, voided: bool) -> Step {
    if voided {
        return Step {
            unit_cost: Decimal::ZERO,
            total: Decimal::ZERO,
            position: prev,
            needs_review: false,
        };
    }

    match *movement {
        CostMovement::Purchase {
            quantity,
            total_cost,
        } => {
            let total_cost = round_money(total_cost);
            let unit_cost = if quantity.is_zero() {
                Decimal::ZERO
            } else {
                round_dp(total_cost / quantity, AVERAGE_COST_SCALE)
            };
            let balance = prev.balance + quantity;
            let total = round_money(prev.total + total_cost);
            let average_cost = if balance > Decimal::ZERO {
                round_dp(total / balance, AVERAGE_COST_SCALE)
            } else {
                unit_cost
            };
            Step {
                unit_cost,
                total: total_cost,
                position: RunningPosition {
                    balance,
                    total,
                    average_cost,
                },
                needs_review: balance < Decimal::ZERO,
            }
        }
        CostMovement::Sale { quantity } => {
            let consumed = if prev.balance <= Decimal::ZERO {
                quantity * prev.average_cost
            } else if quantity <= prev.balance {
                if quantity == prev.balance {
                    prev.total
                } else {
                    prev.total * quantity / prev.balance
                }
            } else {
                // Oversold: everything on hand plus the shortfall at the average.
                prev.total + (quantity - prev.balance) * prev.average_cost
            };
            let consumed = round_money(consumed);
            let balance = prev.balance - quantity;
            Step {
                unit_cost: prev.average_cost,
                total: consumed,
                position: RunningPosition {
                    balance,
                    total: round_money(prev.total - consumed),
                    average_cost: prev.average_cost,
                },
                needs_review: balance < Decimal::ZERO,
            }
        }
    }
}

/// Replays `entries` (already in chain order) starting from `start`, returning
/// the entries with recomputed running figures.
///
/// Replaying an already consistent chain returns it unchanged.
#[must_use]
pub fn replay(start: RunningPosition, entries: &[CostLayerEntry]) -> Vec<CostLayerEntry> {
    entries
        .iter()
        .scan(start, |position, entry| {
            let step = step(*position, &entry.movement, entry.is_voided);
            *position = step.position;
            Some(CostLayerEntry {
                unit_cost: step.unit_cost,
                total: step.total,
                running: step.position,
                needs_review: step.needs_review,
                ..entry.clone()
            })
        })
        .collect()
}
