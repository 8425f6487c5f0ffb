//! Period balance maintenance on top of the balance store.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use tally_core::fiscal::FiscalPeriod;
use tally_core::ledger::{
    AccountPeriodBalance, BalanceAggregator, BalanceDelta, LedgerLine, NormalBalance,
    PeriodBalanceRow, PeriodTotals, SubAccount, SubAccountPeriodBalance,
};
use tally_core::posting::PostingError;
use tally_shared::types::CompanyId;

use crate::store::UnitOfWork;

/// Folds `lines` into the account and sub-account balance rows.
pub(crate) async fn apply_lines<U: UnitOfWork>(
    unit: &mut U,
    lines: &[LedgerLine],
) -> Result<(), PostingError> {
    for delta in BalanceAggregator::deltas(lines) {
        match &delta.sub_account {
            None => {
                let rows = unit
                    .account_rows(&delta.company_id, &delta.account_no)
                    .await?;
                let changed = apply_delta(rows, &delta, |beginning| {
                    delta.open_account_row(beginning)
                })?;
                unit.save_account_rows(&changed).await?;
            }
            Some(sub_account) => {
                let rows = unit
                    .sub_account_rows(&delta.company_id, &delta.account_no, sub_account)
                    .await?;
                let changed = apply_delta(rows, &delta, |beginning| SubAccountPeriodBalance {
                    company_id: delta.company_id.clone(),
                    account_no: delta.account_no.clone(),
                    account_title: delta.account_title.clone(),
                    sub_account: sub_account.clone(),
                    period: delta.period,
                    totals: PeriodTotals::opening(delta.normal_balance(), beginning),
                })?;
                unit.save_sub_account_rows(&changed).await?;
            }
        }
    }
    Ok(())
}

/// Splits `rows` around the delta's month and applies it. Returns every row
/// that changed.
fn apply_delta<R, F>(mut rows: Vec<R>, delta: &BalanceDelta, open: F) -> Result<Vec<R>, PostingError>
where
    R: PeriodBalanceRow,
    F: FnOnce(Decimal) -> R,
{
    rows.sort_by_key(|r| r.period());
    let mut target = None;
    let mut prior_ending = Decimal::ZERO;
    let mut later = Vec::new();
    for row in rows {
        match row.period().cmp(&delta.period) {
            Ordering::Less => prior_ending = row.totals().ending_balance,
            Ordering::Equal => target = Some(row),
            Ordering::Greater => later.push(row),
        }
    }

    let update = BalanceAggregator::apply(target, || open(prior_ending), later, delta)?;
    let mut changed = vec![update.target];
    changed.extend(update.rolled_forward);
    Ok(changed)
}

enum AsOf<R> {
    Stored(R),
    Carried { beginning: Decimal, prior: Option<R> },
}

/// The stored row for `period`, or the latest earlier row whose ending
/// balance carries forward.
fn as_of<R: PeriodBalanceRow>(rows: Vec<R>, period: FiscalPeriod) -> AsOf<R> {
    let mut prior = None;
    for row in rows {
        match row.period().cmp(&period) {
            Ordering::Less => prior = Some(row),
            Ordering::Equal => return AsOf::Stored(row),
            Ordering::Greater => break,
        }
    }
    AsOf::Carried {
        beginning: prior.as_ref().map_or(Decimal::ZERO, |r| r.totals().ending_balance),
        prior,
    }
}

pub(crate) async fn account_balance<U: UnitOfWork>(
    unit: &mut U,
    company_id: &CompanyId,
    account_no: &str,
    period: FiscalPeriod,
) -> Result<AccountPeriodBalance, PostingError> {
    let mut rows = unit.account_rows(company_id, account_no).await?;
    rows.sort_by_key(|r| r.period);
    Ok(match as_of(rows, period) {
        AsOf::Stored(row) => row,
        AsOf::Carried { beginning, prior } => AccountPeriodBalance {
            company_id: company_id.clone(),
            account_no: account_no.to_string(),
            account_title: prior.map(|r| r.account_title).unwrap_or_default(),
            period,
            totals: PeriodTotals::opening(NormalBalance::for_account(account_no), beginning),
        },
    })
}

pub(crate) async fn sub_account_balance<U: UnitOfWork>(
    unit: &mut U,
    company_id: &CompanyId,
    account_no: &str,
    sub_account: &SubAccount,
    period: FiscalPeriod,
) -> Result<SubAccountPeriodBalance, PostingError> {
    let mut rows = unit
        .sub_account_rows(company_id, account_no, sub_account)
        .await?;
    rows.sort_by_key(|r| r.period);
    Ok(match as_of(rows, period) {
        AsOf::Stored(row) => row,
        AsOf::Carried { beginning, prior } => SubAccountPeriodBalance {
            company_id: company_id.clone(),
            account_no: account_no.to_string(),
            account_title: prior.map(|r| r.account_title).unwrap_or_default(),
            sub_account: sub_account.clone(),
            period,
            totals: PeriodTotals::opening(NormalBalance::for_account(account_no), beginning),
        },
    })
}
