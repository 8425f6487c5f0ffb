//! Period guard errors.

use thiserror::Error;

use super::period::Module;

/// Errors raised by the period-close guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    /// The module (or the general ledger) is closed for the month.
    #[error("{module} period {year}-{month:02} is closed")]
    PeriodClosed {
        /// Module that was checked.
        module: Module,
        /// Fiscal year.
        year: i32,
        /// Month.
        month: u32,
    },

    /// Month outside 1-12 or unrepresentable year.
    #[error("Invalid fiscal period {year}-{month}")]
    InvalidPeriod {
        /// Fiscal year.
        year: i32,
        /// Month.
        month: u32,
    },

    /// Unrecognised module code.
    #[error("Unknown module: {0}")]
    UnknownModule(String),
}

impl PeriodError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::InvalidPeriod { .. } => "INVALID_PERIOD",
            Self::UnknownModule(_) => "UNKNOWN_MODULE",
        }
    }
}
