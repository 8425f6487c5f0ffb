//! Period-close guard.
//!
//! Each (company, module, month) moves one way: Open → Closed. A month is
//! treated as open until a `PostedPeriod` row with `is_posted = true` exists.
//! Closing the general ledger locks every module for that month.

use chrono::{DateTime, NaiveDate, Utc};
use tally_shared::types::{CompanyId, UserId};

use super::error::PeriodError;
use super::period::{FiscalPeriod, Module, PostedPeriod};

/// Snapshot of the closed periods of one company.
#[derive(Debug, Clone, Default)]
pub struct PeriodGuard {
    closed: Vec<(Module, FiscalPeriod)>,
}

impl PeriodGuard {
    /// Builds a guard from the company's period rows. Rows that are not
    /// posted are ignored.
    #[must_use]
    pub fn new<'a>(periods: impl IntoIterator<Item = &'a PostedPeriod>) -> Self {
        let mut closed: Vec<_> = periods
            .into_iter()
            .filter(|p| p.is_posted)
            .map(|p| (p.module, p.period))
            .collect();
        closed.sort();
        closed.dedup();
        Self { closed }
    }

    /// Returns true if the module itself is closed for the period.
    #[must_use]
    pub fn is_module_closed(&self, module: Module, period: FiscalPeriod) -> bool {
        self.closed.binary_search(&(module, period)).is_ok()
    }

    /// Returns true if no document of `module` may be dated `date`, either
    /// because the module or the general ledger is closed for that month.
    #[must_use]
    pub fn is_closed(&self, module: Module, date: NaiveDate) -> bool {
        let period = FiscalPeriod::from_date(date);
        self.is_module_closed(module, period) || self.is_module_closed(Module::Gl, period)
    }

    /// Fails with `PeriodClosed` when `date` is locked for `module`.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::PeriodClosed` naming the month.
    pub fn ensure_open(&self, module: Module, date: NaiveDate) -> Result<(), PeriodError> {
        if self.is_closed(module, date) {
            let period = FiscalPeriod::from_date(date);
            return Err(PeriodError::PeriodClosed {
                module,
                year: period.year,
                month: period.month,
            });
        }
        Ok(())
    }

    /// Fails on the first of `dates` that is locked for `module`.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::PeriodClosed` naming that month.
    pub fn ensure_all_open(
        &self,
        module: Module,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Result<(), PeriodError> {
        dates
            .into_iter()
            .try_for_each(|date| self.ensure_open(module, date))
    }

    /// Most recently closed period for the module, honouring GL closes.
    #[must_use]
    pub fn latest_closed(&self, module: Module) -> Option<FiscalPeriod> {
        self.closed
            .iter()
            .filter(|(m, _)| *m == module || *m == Module::Gl)
            .map(|(_, p)| *p)
            .max()
    }

    /// First day of the month following the most recently closed period, or
    /// `None` if nothing has been closed yet.
    #[must_use]
    pub fn earliest_open_date(&self, module: Module) -> Option<NaiveDate> {
        self.latest_closed(module).map(|p| p.next().first_day())
    }
}

/// What a close request has to do to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseAction {
    /// No row exists yet; insert a closed one.
    Insert(PostedPeriod),
    /// A row exists but is open; flip it.
    Flip(PostedPeriod),
    /// Already closed. Nothing to do.
    AlreadyClosed,
}

/// Plans a close of `(company, module, period)` given the existing row.
///
/// Closing is idempotent and one-way: there is no reopen transition.
#[must_use]
pub fn plan_close(
    existing: Option<&PostedPeriod>,
    company_id: &CompanyId,
    module: Module,
    period: FiscalPeriod,
    closed_by: UserId,
    now: DateTime<Utc>,
) -> CloseAction {
    match existing {
        Some(row) if row.is_posted => CloseAction::AlreadyClosed,
        Some(row) => CloseAction::Flip(PostedPeriod {
            is_posted: true,
            posted_by: Some(closed_by),
            posted_at: Some(now),
            ..row.clone()
        }),
        None => CloseAction::Insert(PostedPeriod {
            company_id: company_id.clone(),
            module,
            period,
            is_posted: true,
            posted_by: Some(closed_by),
            posted_at: Some(now),
        }),
    }
}
