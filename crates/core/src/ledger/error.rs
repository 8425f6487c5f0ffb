//! Ledger invariant errors.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the double-entry invariant checker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Total debits differ from total credits after rounding.
    #[error("Ledger entry is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Rounded total debit.
        debit: Decimal,
        /// Rounded total credit.
        credit: Decimal,
    },

    /// A single line is malformed.
    #[error("Invalid ledger line for account {account_no}: {reason}")]
    InvalidLine {
        /// The offending account.
        account_no: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unbalanced { .. } => "UNBALANCED_LEDGER",
            Self::InvalidLine { .. } => "INVALID_LEDGER_LINE",
        }
    }
}
