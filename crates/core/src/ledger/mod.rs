//! General-ledger lines and balances.
//!
//! This module implements:
//! - Ledger lines and sub-ledger tags
//! - The double-entry invariant checker
//! - Per-period account and sub-account balance aggregation
//! - Offsetting lines for voids

pub mod balance;
pub mod error;
pub mod line;
pub mod reversal;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use balance::{
    AccountPeriodBalance, BalanceAggregator, BalanceDelta, BalanceError, BalanceKey,
    BalanceUpdate, NormalBalance, PeriodBalanceRow, PeriodTotals, SubAccountPeriodBalance,
};
pub use error::LedgerError;
pub use line::{LedgerLine, SubAccount, SubAccountType};
pub use reversal::reverse_lines;
pub use validation::{validate_lines, LedgerTotals};
