//! Offsetting lines for voided documents.
//!
//! Posted lines are never edited. A void appends a mirror image of every line:
//! debits become credits, credits become debits, all other fields are kept and
//! the date is the void date.

use chrono::NaiveDate;
use tally_shared::types::LedgerLineId;

use super::line::LedgerLine;

/// Creates the offsetting lines for `original`, dated `void_date`.
#[must_use]
pub fn reverse_lines(original: &[LedgerLine], void_date: NaiveDate) -> Vec<LedgerLine> {
    original
        .iter()
        .filter(|line| !line.is_zero())
        .map(|line| LedgerLine {
            id: LedgerLineId::new(),
            date: void_date,
            debit: line.credit,
            credit: line.debit,
            description: format!("Void: {}", line.description),
            ..line.clone()
        })
        .collect()
}
