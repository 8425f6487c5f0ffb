//! Fiscal period types.
//!
//! The fiscal year is the calendar year and every period is one month, so a
//! period is fully described by `(year, month)`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{CompanyId, UserId};

use super::error::PeriodError;
use crate::company::CompanyScoped;

/// A calendar-month fiscal period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FiscalPeriod {
    /// Fiscal year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
}

impl FiscalPeriod {
    /// Creates a period, rejecting months outside 1-12.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::InvalidPeriod` for an out-of-range month.
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(PeriodError::InvalidPeriod { year, month });
        }
        Ok(Self { year, month })
    }

    /// The period a date falls in.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of the period.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the period.
    #[must_use]
    pub fn last_day(self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    /// The following month.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl std::fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Accounting module a document belongs to. Periods are closed per module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Module {
    /// Accounts payable.
    Ap,
    /// Accounts receivable.
    Ar,
    /// General ledger. Closing it locks every module for the month.
    Gl,
    /// Inventory.
    #[serde(rename = "INV")]
    Inventory,
}

impl Module {
    /// All modules.
    pub const ALL: [Self; 4] = [Self::Ap, Self::Ar, Self::Gl, Self::Inventory];

    /// Stored code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ap => "AP",
            Self::Ar => "AR",
            Self::Gl => "GL",
            Self::Inventory => "INV",
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Module {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AP" => Ok(Self::Ap),
            "AR" => Ok(Self::Ar),
            "GL" => Ok(Self::Gl),
            "INV" | "INVENTORY" => Ok(Self::Inventory),
            other => Err(PeriodError::UnknownModule(other.to_string())),
        }
    }
}

/// Close state of one (company, module, month).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedPeriod {
    /// Owning company.
    pub company_id: CompanyId,
    /// Module the close applies to.
    pub module: Module,
    /// The closed month.
    pub period: FiscalPeriod,
    /// True once month-end close ran.
    pub is_posted: bool,
    /// Who closed it.
    pub posted_by: Option<UserId>,
    /// When it was closed.
    pub posted_at: Option<DateTime<Utc>>,
}

impl CompanyScoped for PostedPeriod {
    fn company_id(&self) -> &CompanyId {
        &self.company_id
    }
}
