//! Double-entry invariant checker.
//!
//! Debits and credits are summed independently, each rounded to storage
//! precision with banker's rounding, and compared exactly. The checker never
//! adjusts a line to force a balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::round_money;

use super::error::LedgerError;
use super::line::LedgerLine;

/// Rounded totals of a balanced line set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Total debit.
    pub debit: Decimal,
    /// Total credit.
    pub credit: Decimal,
}

/// Validates that a set of ledger lines is balanced.
///
/// An empty set is balanced: documents such as purchase orders post without
/// touching the ledger.
///
/// # Errors
///
/// Returns `LedgerError::InvalidLine` for a negative or two-sided line and
/// `LedgerError::Unbalanced` when the rounded totals differ.
pub fn validate_lines(lines: &[LedgerLine]) -> Result<LedgerTotals, LedgerError> {
    let mut total_debit = Decimal::ZERO;
    let mut total_credit = Decimal::ZERO;

    for line in lines {
        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
            return Err(LedgerError::InvalidLine {
                account_no: line.account_no.clone(),
                reason: "amounts cannot be negative",
            });
        }
        if !line.debit.is_zero() && !line.credit.is_zero() {
            return Err(LedgerError::InvalidLine {
                account_no: line.account_no.clone(),
                reason: "a line cannot carry both a debit and a credit",
            });
        }
        total_debit += line.debit;
        total_credit += line.credit;
    }

    let debit = round_money(total_debit);
    let credit = round_money(total_credit);
    if debit != credit {
        return Err(LedgerError::Unbalanced { debit, credit });
    }

    Ok(LedgerTotals { debit, credit })
}
