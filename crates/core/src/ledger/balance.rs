//! Per-period account balances.
//!
//! Every posted line updates one `AccountPeriodBalance` row, keyed by
//! (company, account, year, month), and one `SubAccountPeriodBalance` row when
//! it carries a sub-ledger tag.
//!
//! - Debit-normal accounts (classes 1, 5, 6): ending = beginning + debit - credit
//! - Credit-normal accounts (classes 2, 3, 4): ending = beginning + credit - debit
//!
//! A new row starts from the ending balance of the latest earlier row. Posting
//! into a month that already has later rows shifts those rows by the same net
//! change so the chain stays continuous.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tally_shared::types::{round_money, CompanyId};
use thiserror::Error;

use super::line::{LedgerLine, SubAccount, SubAccountType};
use crate::company::CompanyScoped;
use crate::fiscal::FiscalPeriod;

/// Which side increases an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    /// Assets, costs, expenses.
    Debit,
    /// Liabilities, equity, revenue.
    Credit,
}

impl NormalBalance {
    /// Derives the normal balance from the account class (first digit).
    #[must_use]
    pub fn for_account(account_no: &str) -> Self {
        match account_no.trim_start().chars().next() {
            Some('2' | '3' | '4') => Self::Credit,
            _ => Self::Debit,
        }
    }

    /// Calculates the balance change for a debit/credit pair.
    #[must_use]
    pub fn net_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }

    /// Stored code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }

    /// Parses a stored code.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(Self::Debit),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }
}

/// Running totals of one period row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    /// Normal balance of the account.
    pub normal_balance: NormalBalance,
    /// Carried in from the previous row.
    pub beginning_balance: Decimal,
    /// Debits posted in the period.
    pub debit_total: Decimal,
    /// Credits posted in the period.
    pub credit_total: Decimal,
    /// Beginning plus the period's net change.
    pub ending_balance: Decimal,
    /// Set by month-end close; closed rows reject writes.
    pub is_closed: bool,
}

impl PeriodTotals {
    /// An empty row opening at `beginning`.
    #[must_use]
    pub fn opening(normal_balance: NormalBalance, beginning: Decimal) -> Self {
        Self {
            normal_balance,
            beginning_balance: beginning,
            debit_total: Decimal::ZERO,
            credit_total: Decimal::ZERO,
            ending_balance: beginning,
            is_closed: false,
        }
    }

    /// Adds a debit/credit pair and returns the net change to the ending
    /// balance.
    pub fn post(&mut self, debit: Decimal, credit: Decimal) -> Decimal {
        let change = round_money(self.normal_balance.net_change(debit, credit));
        self.debit_total = round_money(self.debit_total + debit);
        self.credit_total = round_money(self.credit_total + credit);
        self.ending_balance += change;
        change
    }

    /// Moves beginning and ending by `delta`.
    pub fn shift(&mut self, delta: Decimal) {
        self.beginning_balance += delta;
        self.ending_balance += delta;
    }

    /// Returns true if `ending = beginning + net(debit, credit)`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.ending_balance
            == self.beginning_balance
                + self
                    .normal_balance
                    .net_change(self.debit_total, self.credit_total)
    }
}

/// Balance of an account for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPeriodBalance {
    /// Owning company.
    pub company_id: CompanyId,
    /// Account number.
    pub account_no: String,
    /// Account title.
    pub account_title: String,
    /// The month.
    pub period: FiscalPeriod,
    /// Totals.
    #[serde(flatten)]
    pub totals: PeriodTotals,
}

/// Balance of one sub-ledger entity under an account for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAccountPeriodBalance {
    /// Owning company.
    pub company_id: CompanyId,
    /// Account number.
    pub account_no: String,
    /// Account title.
    pub account_title: String,
    /// Sub-ledger entity.
    pub sub_account: SubAccount,
    /// The month.
    pub period: FiscalPeriod,
    /// Totals.
    #[serde(flatten)]
    pub totals: PeriodTotals,
}

/// Shared access to the two balance row kinds.
pub trait PeriodBalanceRow {
    /// Account number.
    fn account_no(&self) -> &str;
    /// The month.
    fn period(&self) -> FiscalPeriod;
    /// Totals.
    fn totals(&self) -> &PeriodTotals;
    /// Mutable totals.
    fn totals_mut(&mut self) -> &mut PeriodTotals;
}

impl PeriodBalanceRow for AccountPeriodBalance {
    fn account_no(&self) -> &str {
        &self.account_no
    }
    fn period(&self) -> FiscalPeriod {
        self.period
    }
    fn totals(&self) -> &PeriodTotals {
        &self.totals
    }
    fn totals_mut(&mut self) -> &mut PeriodTotals {
        &mut self.totals
    }
}

impl PeriodBalanceRow for SubAccountPeriodBalance {
    fn account_no(&self) -> &str {
        &self.account_no
    }
    fn period(&self) -> FiscalPeriod {
        self.period
    }
    fn totals(&self) -> &PeriodTotals {
        &self.totals
    }
    fn totals_mut(&mut self) -> &mut PeriodTotals {
        &mut self.totals
    }
}

impl CompanyScoped for AccountPeriodBalance {
    fn company_id(&self) -> &CompanyId {
        &self.company_id
    }
}

impl CompanyScoped for SubAccountPeriodBalance {
    fn company_id(&self) -> &CompanyId {
        &self.company_id
    }
}

/// Identifies the row a delta lands on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BalanceKey {
    /// Owning company.
    pub company_id: CompanyId,
    /// Account number.
    pub account_no: String,
    /// Sub-ledger `(kind, id)`, `None` for the account-level row.
    pub sub_account: Option<(SubAccountType, String)>,
    /// The month.
    pub period: FiscalPeriod,
}

/// Summed debits and credits for one balance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Owning company.
    pub company_id: CompanyId,
    /// Account number.
    pub account_no: String,
    /// Account title.
    pub account_title: String,
    /// Sub-ledger entity, `None` for the account-level row.
    pub sub_account: Option<SubAccount>,
    /// The month.
    pub period: FiscalPeriod,
    /// Debit to add.
    pub debit: Decimal,
    /// Credit to add.
    pub credit: Decimal,
}

impl BalanceDelta {
    /// Normal balance of the target account.
    #[must_use]
    pub fn normal_balance(&self) -> NormalBalance {
        NormalBalance::for_account(&self.account_no)
    }

    /// A fresh account-level row for this delta, opening at `beginning`.
    #[must_use]
    pub fn open_account_row(&self, beginning: Decimal) -> AccountPeriodBalance {
        AccountPeriodBalance {
            company_id: self.company_id.clone(),
            account_no: self.account_no.clone(),
            account_title: self.account_title.clone(),
            period: self.period,
            totals: PeriodTotals::opening(self.normal_balance(), beginning),
        }
    }

    /// A fresh sub-account row for this delta, or `None` for account-level
    /// deltas.
    #[must_use]
    pub fn open_sub_account_row(&self, beginning: Decimal) -> Option<SubAccountPeriodBalance> {
        let sub_account = self.sub_account.clone()?;
        Some(SubAccountPeriodBalance {
            company_id: self.company_id.clone(),
            account_no: self.account_no.clone(),
            account_title: self.account_title.clone(),
            sub_account,
            period: self.period,
            totals: PeriodTotals::opening(self.normal_balance(), beginning),
        })
    }
}

/// Result of applying a delta: the updated row plus any later rows that were
/// rolled forward.
#[derive(Debug, Clone)]
pub struct BalanceUpdate<R> {
    /// The row the delta landed on.
    pub target: R,
    /// Later rows shifted by the net change.
    pub rolled_forward: Vec<R>,
}

/// Errors raised while updating balances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    /// The row (or a later row that would roll forward) is closed.
    #[error("Balance of account {account_no} for {period} is closed")]
    PeriodClosed {
        /// Account number.
        account_no: String,
        /// The closed month.
        period: FiscalPeriod,
    },
}

impl BalanceError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PeriodClosed { .. } => "BALANCE_PERIOD_CLOSED",
        }
    }
}

/// Stateless balance aggregation.
pub struct BalanceAggregator;

impl BalanceAggregator {
    /// Groups lines into one delta per balance row: one per (account, month)
    /// and one per (account, sub-account, month) for tagged lines.
    #[must_use]
    pub fn deltas(lines: &[LedgerLine]) -> Vec<BalanceDelta> {
        let mut grouped: BTreeMap<BalanceKey, BalanceDelta> = BTreeMap::new();

        for line in lines.iter().filter(|l| !l.is_zero()) {
            let period = FiscalPeriod::from_date(line.date);
            let mut targets = vec![None];
            if let Some(sub) = &line.sub_account {
                targets.push(Some(sub.clone()));
            }

            for sub_account in targets {
                let key = BalanceKey {
                    company_id: line.company_id.clone(),
                    account_no: line.account_no.clone(),
                    sub_account: sub_account.as_ref().map(|s| (s.kind, s.id.clone())),
                    period,
                };
                let delta = grouped.entry(key).or_insert_with(|| BalanceDelta {
                    company_id: line.company_id.clone(),
                    account_no: line.account_no.clone(),
                    account_title: line.account_title.clone(),
                    sub_account,
                    period,
                    debit: Decimal::ZERO,
                    credit: Decimal::ZERO,
                });
                delta.debit += line.debit;
                delta.credit += line.credit;
            }
        }

        grouped.into_values().collect()
    }

    /// Applies a delta.
    ///
    /// `target` is the existing row for the delta's month, or `None` to open
    /// one from `open` (which receives the prior ending balance). `later` are
    /// the existing rows after that month, in any order.
    ///
    /// # Errors
    ///
    /// Returns `BalanceError::PeriodClosed` if the target or any later row is
    /// closed. Nothing is modified in that case.
    pub fn apply<R, F>(
        target: Option<R>,
        open: F,
        later: Vec<R>,
        delta: &BalanceDelta,
    ) -> Result<BalanceUpdate<R>, BalanceError>
    where
        R: PeriodBalanceRow,
        F: FnOnce() -> R,
    {
        if let Some(row) = target.as_ref().filter(|r| r.totals().is_closed) {
            return Err(closed(row));
        }
        if let Some(row) = later.iter().find(|r| r.totals().is_closed) {
            return Err(closed(row));
        }

        let mut target = target.unwrap_or_else(open);
        let change = target.totals_mut().post(delta.debit, delta.credit);

        let mut rolled_forward = later;
        if change.is_zero() {
            rolled_forward.clear();
        } else {
            for row in &mut rolled_forward {
                row.totals_mut().shift(change);
            }
        }

        Ok(BalanceUpdate {
            target,
            rolled_forward,
        })
    }
}

fn closed<R: PeriodBalanceRow>(row: &R) -> BalanceError {
    BalanceError::PeriodClosed {
        account_no: row.account_no().to_string(),
        period: row.period(),
    }
}
