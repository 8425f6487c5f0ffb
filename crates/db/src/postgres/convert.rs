//! Row <-> domain conversions.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::ActiveValue::Set;
use tally_core::costing::{CostLayerEntry, CostMovement, RunningPosition};
use tally_core::document::{Document, DocumentBody, DocumentStatus, DocumentType};
use tally_core::fiscal::{FiscalPeriod, Module, PostedPeriod};
use tally_core::ledger::{
    AccountPeriodBalance, LedgerLine, NormalBalance, PeriodTotals, SubAccount,
    SubAccountPeriodBalance, SubAccountType,
};
use tally_shared::types::{CompanyId, CostLayerId, DocumentId, LedgerLineId, UserId};

use crate::entities::{
    account_period_balances, audit_trails, cost_layers, documents, ledger_lines, posted_periods,
    sub_account_period_balances,
};
use crate::store::{AuditEntry, StoreError};

fn corrupt(column: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{column} = {value}"))
}

fn utc(at: DateTime<FixedOffset>) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

fn stored(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.fixed_offset()
}

fn period(year: i32, month: i32) -> Result<FiscalPeriod, StoreError> {
    let month = u32::try_from(month).map_err(|_| corrupt("fiscal_month", month))?;
    FiscalPeriod::new(year, month).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn stored_month(period: FiscalPeriod) -> i32 {
    // Months are 1-12, so this never saturates.
    i32::try_from(period.month).unwrap_or(i32::MAX)
}

fn document_type(code: &str) -> Result<DocumentType, StoreError> {
    code.parse().map_err(|_| corrupt("document_type", code))
}

fn normal_balance(code: &str) -> Result<NormalBalance, StoreError> {
    NormalBalance::parse(code).ok_or_else(|| corrupt("normal_balance", code))
}

pub(crate) fn document(model: documents::Model) -> Result<Document, StoreError> {
    let status = DocumentStatus::parse(&model.status).ok_or_else(|| corrupt("status", &model.status))?;
    let body: DocumentBody = serde_json::from_value(model.body)
        .map_err(|e| StoreError::Corrupt(format!("documents.body: {e}")))?;
    Ok(Document {
        id: DocumentId::from_uuid(model.id),
        company_id: CompanyId::new(&model.company_id),
        document_no: model.document_no,
        transaction_date: model.transaction_date,
        status,
        body,
        amount_paid: model.amount_paid,
        created_by: UserId::from_uuid(model.created_by),
        created_at: utc(model.created_at),
        posted_by: model.posted_by.map(UserId::from_uuid),
        posted_at: model.posted_at.map(utc),
        voided_by: model.voided_by.map(UserId::from_uuid),
        voided_at: model.voided_at.map(utc),
        canceled_by: model.canceled_by.map(UserId::from_uuid),
        canceled_at: model.canceled_at.map(utc),
    })
}

pub(crate) fn document_row(document: &Document) -> Result<documents::ActiveModel, StoreError> {
    let body = serde_json::to_value(&document.body)
        .map_err(|e| StoreError::Database(format!("serializing document body: {e}")))?;
    Ok(documents::ActiveModel {
        id: Set(document.id.into_inner()),
        company_id: Set(document.company_id.to_string()),
        document_type: Set(document.document_type().code().to_string()),
        document_no: Set(document.document_no.clone()),
        transaction_date: Set(document.transaction_date),
        status: Set(document.status.as_str().to_string()),
        body: Set(body),
        amount_paid: Set(document.amount_paid),
        created_by: Set(document.created_by.into_inner()),
        created_at: Set(stored(document.created_at)),
        posted_by: Set(document.posted_by.map(UserId::into_inner)),
        posted_at: Set(document.posted_at.map(stored)),
        voided_by: Set(document.voided_by.map(UserId::into_inner)),
        voided_at: Set(document.voided_at.map(stored)),
        canceled_by: Set(document.canceled_by.map(UserId::into_inner)),
        canceled_at: Set(document.canceled_at.map(stored)),
    })
}

pub(crate) fn ledger_line(model: ledger_lines::Model) -> Result<LedgerLine, StoreError> {
    let sub_account = match (model.sub_account_type, model.sub_account_id) {
        (Some(kind), Some(id)) => Some(SubAccount {
            kind: SubAccountType::parse(&kind).ok_or_else(|| corrupt("sub_account_type", &kind))?,
            id,
            name: model.sub_account_name.unwrap_or_default(),
        }),
        _ => None,
    };
    Ok(LedgerLine {
        id: LedgerLineId::from_uuid(model.id),
        company_id: CompanyId::new(&model.company_id),
        date: model.line_date,
        account_no: model.account_no,
        account_title: model.account_title,
        debit: model.debit,
        credit: model.credit,
        reference_document_id: DocumentId::from_uuid(model.reference_document_id),
        reference_no: model.reference_no,
        document_type: document_type(&model.document_type)?,
        description: model.description,
        sub_account,
    })
}

pub(crate) fn ledger_line_row(line: &LedgerLine, now: DateTime<Utc>) -> ledger_lines::ActiveModel {
    ledger_lines::ActiveModel {
        id: Set(line.id.into_inner()),
        company_id: Set(line.company_id.to_string()),
        line_date: Set(line.date),
        account_no: Set(line.account_no.clone()),
        account_title: Set(line.account_title.clone()),
        debit: Set(line.debit),
        credit: Set(line.credit),
        reference_document_id: Set(line.reference_document_id.into_inner()),
        reference_no: Set(line.reference_no.clone()),
        document_type: Set(line.document_type.code().to_string()),
        description: Set(line.description.clone()),
        sub_account_type: Set(line.sub_account.as_ref().map(|s| s.kind.code().to_string())),
        sub_account_id: Set(line.sub_account.as_ref().map(|s| s.id.clone())),
        sub_account_name: Set(line.sub_account.as_ref().map(|s| s.name.clone())),
        created_at: Set(stored(now)),
    }
}

pub(crate) fn posted_period(model: posted_periods::Model) -> Result<PostedPeriod, StoreError> {
    let module: Module = model.module.parse().map_err(|_| corrupt("module", &model.module))?;
    Ok(PostedPeriod {
        company_id: CompanyId::new(&model.company_id),
        module,
        period: period(model.fiscal_year, model.fiscal_month)?,
        is_posted: model.is_posted,
        posted_by: model.posted_by.map(UserId::from_uuid),
        posted_at: model.posted_at.map(utc),
    })
}

pub(crate) fn posted_period_row(row: &PostedPeriod) -> posted_periods::ActiveModel {
    posted_periods::ActiveModel {
        company_id: Set(row.company_id.to_string()),
        module: Set(row.module.code().to_string()),
        fiscal_year: Set(row.period.year),
        fiscal_month: Set(stored_month(row.period)),
        is_posted: Set(row.is_posted),
        posted_by: Set(row.posted_by.map(UserId::into_inner)),
        posted_at: Set(row.posted_at.map(stored)),
    }
}

pub(crate) fn cost_layer(model: cost_layers::Model) -> Result<CostLayerEntry, StoreError> {
    let movement = match (model.movement_kind.as_str(), model.purchase_cost) {
        ("purchase", Some(total_cost)) => CostMovement::Purchase {
            quantity: model.quantity,
            total_cost,
        },
        ("sale", _) => CostMovement::Sale {
            quantity: model.quantity,
        },
        (kind, _) => return Err(corrupt("movement_kind", kind)),
    };
    Ok(CostLayerEntry {
        id: CostLayerId::from_uuid(model.id),
        company_id: CompanyId::new(&model.company_id),
        product_code: model.product_code,
        date: model.entry_date,
        sequence: model.sequence,
        movement,
        source_document_id: DocumentId::from_uuid(model.source_document_id),
        is_voided: model.is_voided,
        unit_cost: model.unit_cost,
        total: model.total,
        running: RunningPosition {
            balance: model.running_balance,
            total: model.running_total,
            average_cost: model.running_average_cost,
        },
        needs_review: model.needs_review,
    })
}

pub(crate) fn cost_layer_row(entry: &CostLayerEntry) -> cost_layers::ActiveModel {
    let purchase_cost = match entry.movement {
        CostMovement::Purchase { total_cost, .. } => Some(total_cost),
        CostMovement::Sale { .. } => None,
    };
    cost_layers::ActiveModel {
        id: Set(entry.id.into_inner()),
        company_id: Set(entry.company_id.to_string()),
        product_code: Set(entry.product_code.clone()),
        entry_date: Set(entry.date),
        sequence: Set(entry.sequence),
        movement_kind: Set(entry.movement.kind().to_string()),
        quantity: Set(entry.movement.quantity()),
        purchase_cost: Set(purchase_cost),
        source_document_id: Set(entry.source_document_id.into_inner()),
        is_voided: Set(entry.is_voided),
        unit_cost: Set(entry.unit_cost),
        total: Set(entry.total),
        running_balance: Set(entry.running.balance),
        running_total: Set(entry.running.total),
        running_average_cost: Set(entry.running.average_cost),
        needs_review: Set(entry.needs_review),
    }
}

pub(crate) fn account_balance(
    model: account_period_balances::Model,
) -> Result<AccountPeriodBalance, StoreError> {
    Ok(AccountPeriodBalance {
        company_id: CompanyId::new(&model.company_id),
        account_no: model.account_no,
        account_title: model.account_title,
        period: period(model.fiscal_year, model.fiscal_month)?,
        totals: PeriodTotals {
            normal_balance: normal_balance(&model.normal_balance)?,
            beginning_balance: model.beginning_balance,
            debit_total: model.debit_total,
            credit_total: model.credit_total,
            ending_balance: model.ending_balance,
            is_closed: model.is_closed,
        },
    })
}

pub(crate) fn account_balance_row(row: &AccountPeriodBalance) -> account_period_balances::ActiveModel {
    account_period_balances::ActiveModel {
        company_id: Set(row.company_id.to_string()),
        account_no: Set(row.account_no.clone()),
        fiscal_year: Set(row.period.year),
        fiscal_month: Set(stored_month(row.period)),
        account_title: Set(row.account_title.clone()),
        normal_balance: Set(row.totals.normal_balance.as_str().to_string()),
        beginning_balance: Set(row.totals.beginning_balance),
        debit_total: Set(row.totals.debit_total),
        credit_total: Set(row.totals.credit_total),
        ending_balance: Set(row.totals.ending_balance),
        is_closed: Set(row.totals.is_closed),
    }
}

pub(crate) fn sub_account_balance(
    model: sub_account_period_balances::Model,
) -> Result<SubAccountPeriodBalance, StoreError> {
    let kind = SubAccountType::parse(&model.sub_account_type)
        .ok_or_else(|| corrupt("sub_account_type", &model.sub_account_type))?;
    Ok(SubAccountPeriodBalance {
        company_id: CompanyId::new(&model.company_id),
        account_no: model.account_no,
        account_title: model.account_title,
        sub_account: SubAccount {
            kind,
            id: model.sub_account_id,
            name: model.sub_account_name,
        },
        period: period(model.fiscal_year, model.fiscal_month)?,
        totals: PeriodTotals {
            normal_balance: normal_balance(&model.normal_balance)?,
            beginning_balance: model.beginning_balance,
            debit_total: model.debit_total,
            credit_total: model.credit_total,
            ending_balance: model.ending_balance,
            is_closed: model.is_closed,
        },
    })
}

pub(crate) fn sub_account_balance_row(
    row: &SubAccountPeriodBalance,
) -> sub_account_period_balances::ActiveModel {
    sub_account_period_balances::ActiveModel {
        company_id: Set(row.company_id.to_string()),
        account_no: Set(row.account_no.clone()),
        sub_account_type: Set(row.sub_account.kind.code().to_string()),
        sub_account_id: Set(row.sub_account.id.clone()),
        fiscal_year: Set(row.period.year),
        fiscal_month: Set(stored_month(row.period)),
        sub_account_name: Set(row.sub_account.name.clone()),
        account_title: Set(row.account_title.clone()),
        normal_balance: Set(row.totals.normal_balance.as_str().to_string()),
        beginning_balance: Set(row.totals.beginning_balance),
        debit_total: Set(row.totals.debit_total),
        credit_total: Set(row.totals.credit_total),
        ending_balance: Set(row.totals.ending_balance),
        is_closed: Set(row.totals.is_closed),
    }
}

pub(crate) fn audit_row(entry: &AuditEntry) -> audit_trails::ActiveModel {
    audit_trails::ActiveModel {
        id: Set(entry.id.into_inner()),
        company_id: Set(entry.company_id.to_string()),
        user_id: Set(entry.user_id.into_inner()),
        activity: Set(entry.activity.clone()),
        document_type: Set(entry.document_type.map(|t| t.code().to_string())),
        created_at: Set(stored(entry.created_at)),
    }
}
