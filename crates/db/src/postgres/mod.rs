//! PostgreSQL store over `SeaORM`.
//!
//! Each unit of work is one database transaction. Counter, chain and balance
//! rows are serialized with `SELECT ... FOR UPDATE` plus a transaction-scoped
//! advisory lock, so rows that do not exist yet are covered as well. Reading
//! a company's periods takes its period lock in shared mode and a close takes
//! it exclusively, so a posting that saw a month open commits before the
//! month can close.

mod convert;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RuntimeErr, SqlErr,
    Statement, TransactionTrait,
};
use tally_core::costing::CostLayerEntry;
use tally_core::document::{Document, DocumentType};
use tally_core::fiscal::{FiscalPeriod, PostedPeriod};
use tally_core::ledger::{AccountPeriodBalance, LedgerLine, SubAccount, SubAccountPeriodBalance};
use tally_shared::types::{CompanyId, DocumentId};
use tracing::debug;

use crate::entities::{
    account_period_balances, audit_trails, cost_layers, document_sequences, documents,
    ledger_lines, posted_periods, sub_account_period_balances,
};
use crate::store::{
    AuditEntry, AuditSink, BalanceStore, CostLayerStore, DocumentStore, LedgerStore, PeriodStore,
    SequenceStore, Store, StoreError, UnitOfWork,
};

/// SQLSTATEs worth retrying: serialization failure and deadlock.
const TRANSIENT_SQLSTATES: [&str; 2] = ["40001", "40P01"];

/// Classifies a `SeaORM` error.
#[must_use]
pub fn classify(err: DbErr) -> StoreError {
    if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
        return StoreError::UniqueViolation(message);
    }
    match &err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => StoreError::Transient(err.to_string()),
        DbErr::Exec(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx_err)) => match sqlx_err {
            sqlx::Error::Database(db_err)
                if db_err
                    .code()
                    .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref())) =>
            {
                StoreError::Transient(err.to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Transient(err.to_string()),
            _ => StoreError::Database(err.to_string()),
        },
        _ => StoreError::Database(err.to_string()),
    }
}

/// Store backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    /// Creates a store over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl Store for PgStore {
    type Unit = PgUnit;

    async fn begin(&self) -> Result<PgUnit, StoreError> {
        let txn = self.db.begin().await.map_err(classify)?;
        Ok(PgUnit { txn })
    }
}

/// One PostgreSQL transaction. Rolls back on drop.
pub struct PgUnit {
    txn: DatabaseTransaction,
}

impl PgUnit {
    /// Takes a transaction-scoped advisory lock on `key`.
    async fn advisory_lock(&self, key: String) -> Result<(), StoreError> {
        debug!(lock = %key, "Taking advisory lock");
        self.advisory("SELECT pg_advisory_xact_lock(hashtext($1))", key).await
    }

    /// Takes a transaction-scoped advisory lock on `key` in shared mode.
    async fn advisory_lock_shared(&self, key: String) -> Result<(), StoreError> {
        debug!(lock = %key, "Taking shared advisory lock");
        self.advisory("SELECT pg_advisory_xact_lock_shared(hashtext($1))", key)
            .await
    }

    async fn advisory(&self, sql: &str, key: String) -> Result<(), StoreError> {
        self.txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                [key.into()],
            ))
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnit {
    async fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().await.map_err(classify)
    }
}

#[async_trait]
impl DocumentStore for PgUnit {
    async fn get_document(
        &mut self,
        company_id: &CompanyId,
        id: DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        documents::Entity::find_by_id(id.into_inner())
            .filter(documents::Column::CompanyId.eq(company_id.as_str()))
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(classify)?
            .map(convert::document)
            .transpose()
    }

    async fn insert_document(&mut self, document: &Document) -> Result<(), StoreError> {
        documents::Entity::insert(convert::document_row(document)?)
            .exec_without_returning(&self.txn)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update_document(&mut self, document: &Document) -> Result<(), StoreError> {
        documents::Entity::update(convert::document_row(document)?)
            .exec(&self.txn)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn document_no_exists(
        &mut self,
        company_id: &CompanyId,
        document_type: DocumentType,
        document_no: &str,
    ) -> Result<bool, StoreError> {
        let count = documents::Entity::find()
            .filter(documents::Column::CompanyId.eq(company_id.as_str()))
            .filter(documents::Column::DocumentType.eq(document_type.code()))
            .filter(documents::Column::DocumentNo.eq(document_no))
            .count(&self.txn)
            .await
            .map_err(classify)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl SequenceStore for PgUnit {
    async fn lock_sequence(
        &mut self,
        company_id: &CompanyId,
        document_type: DocumentType,
    ) -> Result<Option<String>, StoreError> {
        document_sequences::Entity::insert(document_sequences::ActiveModel {
            company_id: sea_orm::Set(company_id.to_string()),
            document_type: sea_orm::Set(document_type.code().to_string()),
            last_number: sea_orm::Set(None),
            updated_at: sea_orm::Set(Utc::now().fixed_offset()),
        })
        .on_conflict(
            OnConflict::columns([
                document_sequences::Column::CompanyId,
                document_sequences::Column::DocumentType,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.txn)
        .await
        .map_err(classify)?;

        let row = document_sequences::Entity::find_by_id((
            company_id.to_string(),
            document_type.code().to_string(),
        ))
        .lock_exclusive()
        .one(&self.txn)
        .await
        .map_err(classify)?;
        Ok(row.and_then(|r| r.last_number))
    }

    async fn set_last_number(
        &mut self,
        company_id: &CompanyId,
        document_type: DocumentType,
        document_no: &str,
    ) -> Result<(), StoreError> {
        document_sequences::Entity::update_many()
            .col_expr(document_sequences::Column::LastNumber, Expr::value(document_no))
            .col_expr(
                document_sequences::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(document_sequences::Column::CompanyId.eq(company_id.as_str()))
            .filter(document_sequences::Column::DocumentType.eq(document_type.code()))
            .exec(&self.txn)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgUnit {
    async fn append_lines(&mut self, lines: &[LedgerLine]) -> Result<(), StoreError> {
        if lines.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        ledger_lines::Entity::insert_many(lines.iter().map(|l| convert::ledger_line_row(l, now)))
            .exec_without_returning(&self.txn)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn lines_for_document(
        &mut self,
        company_id: &CompanyId,
        document_id: DocumentId,
    ) -> Result<Vec<LedgerLine>, StoreError> {
        ledger_lines::Entity::find()
            .filter(ledger_lines::Column::CompanyId.eq(company_id.as_str()))
            .filter(ledger_lines::Column::ReferenceDocumentId.eq(document_id.into_inner()))
            .order_by_asc(ledger_lines::Column::Id)
            .all(&self.txn)
            .await
            .map_err(classify)?
            .into_iter()
            .map(convert::ledger_line)
            .collect()
    }
}

#[async_trait]
impl PeriodStore for PgUnit {
    async fn posted_periods(
        &mut self,
        company_id: &CompanyId,
    ) -> Result<Vec<PostedPeriod>, StoreError> {
        self.advisory_lock_shared(format!("period:{company_id}")).await?;
        posted_periods::Entity::find()
            .filter(posted_periods::Column::CompanyId.eq(company_id.as_str()))
            .all(&self.txn)
            .await
            .map_err(classify)?
            .into_iter()
            .map(convert::posted_period)
            .collect()
    }

    async fn lock_periods(&mut self, company_id: &CompanyId) -> Result<(), StoreError> {
        self.advisory_lock(format!("period:{company_id}")).await
    }

    async fn save_period(&mut self, period: &PostedPeriod) -> Result<(), StoreError> {
        posted_periods::Entity::insert(convert::posted_period_row(period))
            .on_conflict(
                OnConflict::columns([
                    posted_periods::Column::CompanyId,
                    posted_periods::Column::Module,
                    posted_periods::Column::FiscalYear,
                    posted_periods::Column::FiscalMonth,
                ])
                .update_columns([
                    posted_periods::Column::IsPosted,
                    posted_periods::Column::PostedBy,
                    posted_periods::Column::PostedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.txn)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl CostLayerStore for PgUnit {
    async fn lock_chain(
        &mut self,
        company_id: &CompanyId,
        product_code: &str,
    ) -> Result<Vec<CostLayerEntry>, StoreError> {
        self.advisory_lock(format!("cost:{company_id}:{product_code}"))
            .await?;
        cost_layers::Entity::find()
            .filter(cost_layers::Column::CompanyId.eq(company_id.as_str()))
            .filter(cost_layers::Column::ProductCode.eq(product_code))
            .order_by_asc(cost_layers::Column::EntryDate)
            .order_by_asc(cost_layers::Column::Sequence)
            .lock_exclusive()
            .all(&self.txn)
            .await
            .map_err(classify)?
            .into_iter()
            .map(convert::cost_layer)
            .collect()
    }

    async fn save_entries(&mut self, entries: &[CostLayerEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        cost_layers::Entity::insert_many(entries.iter().map(convert::cost_layer_row))
            .on_conflict(
                OnConflict::column(cost_layers::Column::Id)
                    .update_columns([
                        cost_layers::Column::PurchaseCost,
                        cost_layers::Column::IsVoided,
                        cost_layers::Column::UnitCost,
                        cost_layers::Column::Total,
                        cost_layers::Column::RunningBalance,
                        cost_layers::Column::RunningTotal,
                        cost_layers::Column::RunningAverageCost,
                        cost_layers::Column::NeedsReview,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.txn)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

const BALANCE_TOTAL_COLUMNS: [account_period_balances::Column; 6] = [
    account_period_balances::Column::AccountTitle,
    account_period_balances::Column::BeginningBalance,
    account_period_balances::Column::DebitTotal,
    account_period_balances::Column::CreditTotal,
    account_period_balances::Column::EndingBalance,
    account_period_balances::Column::IsClosed,
];

const SUB_BALANCE_TOTAL_COLUMNS: [sub_account_period_balances::Column; 7] = [
    sub_account_period_balances::Column::SubAccountName,
    sub_account_period_balances::Column::AccountTitle,
    sub_account_period_balances::Column::BeginningBalance,
    sub_account_period_balances::Column::DebitTotal,
    sub_account_period_balances::Column::CreditTotal,
    sub_account_period_balances::Column::EndingBalance,
    sub_account_period_balances::Column::IsClosed,
];

#[async_trait]
impl BalanceStore for PgUnit {
    async fn account_rows(
        &mut self,
        company_id: &CompanyId,
        account_no: &str,
    ) -> Result<Vec<AccountPeriodBalance>, StoreError> {
        self.advisory_lock(format!("balance:{company_id}:{account_no}"))
            .await?;
        account_period_balances::Entity::find()
            .filter(account_period_balances::Column::CompanyId.eq(company_id.as_str()))
            .filter(account_period_balances::Column::AccountNo.eq(account_no))
            .order_by_asc(account_period_balances::Column::FiscalYear)
            .order_by_asc(account_period_balances::Column::FiscalMonth)
            .lock_exclusive()
            .all(&self.txn)
            .await
            .map_err(classify)?
            .into_iter()
            .map(convert::account_balance)
            .collect()
    }

    async fn sub_account_rows(
        &mut self,
        company_id: &CompanyId,
        account_no: &str,
        sub_account: &SubAccount,
    ) -> Result<Vec<SubAccountPeriodBalance>, StoreError> {
        self.advisory_lock(format!(
            "balance:{company_id}:{account_no}:{}:{}",
            sub_account.kind.code(),
            sub_account.id
        ))
        .await?;
        sub_account_period_balances::Entity::find()
            .filter(sub_account_period_balances::Column::CompanyId.eq(company_id.as_str()))
            .filter(sub_account_period_balances::Column::AccountNo.eq(account_no))
            .filter(sub_account_period_balances::Column::SubAccountType.eq(sub_account.kind.code()))
            .filter(sub_account_period_balances::Column::SubAccountId.eq(sub_account.id.as_str()))
            .order_by_asc(sub_account_period_balances::Column::FiscalYear)
            .order_by_asc(sub_account_period_balances::Column::FiscalMonth)
            .lock_exclusive()
            .all(&self.txn)
            .await
            .map_err(classify)?
            .into_iter()
            .map(convert::sub_account_balance)
            .collect()
    }

    async fn save_account_rows(&mut self, rows: &[AccountPeriodBalance]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        account_period_balances::Entity::insert_many(rows.iter().map(convert::account_balance_row))
            .on_conflict(
                OnConflict::columns([
                    account_period_balances::Column::CompanyId,
                    account_period_balances::Column::AccountNo,
                    account_period_balances::Column::FiscalYear,
                    account_period_balances::Column::FiscalMonth,
                ])
                .update_columns(BALANCE_TOTAL_COLUMNS)
                .to_owned(),
            )
            .exec_without_returning(&self.txn)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn save_sub_account_rows(
        &mut self,
        rows: &[SubAccountPeriodBalance],
    ) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        sub_account_period_balances::Entity::insert_many(
            rows.iter().map(convert::sub_account_balance_row),
        )
        .on_conflict(
            OnConflict::columns([
                sub_account_period_balances::Column::CompanyId,
                sub_account_period_balances::Column::AccountNo,
                sub_account_period_balances::Column::SubAccountType,
                sub_account_period_balances::Column::SubAccountId,
                sub_account_period_balances::Column::FiscalYear,
                sub_account_period_balances::Column::FiscalMonth,
            ])
            .update_columns(SUB_BALANCE_TOTAL_COLUMNS)
            .to_owned(),
        )
        .exec_without_returning(&self.txn)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn close_balance_rows(
        &mut self,
        company_id: &CompanyId,
        period: FiscalPeriod,
    ) -> Result<u64, StoreError> {
        let month = i32::try_from(period.month).unwrap_or(i32::MAX);
        let accounts = account_period_balances::Entity::update_many()
            .col_expr(account_period_balances::Column::IsClosed, Expr::value(true))
            .filter(account_period_balances::Column::CompanyId.eq(company_id.as_str()))
            .filter(account_period_balances::Column::FiscalYear.eq(period.year))
            .filter(account_period_balances::Column::FiscalMonth.eq(month))
            .filter(account_period_balances::Column::IsClosed.eq(false))
            .exec(&self.txn)
            .await
            .map_err(classify)?;
        let subs = sub_account_period_balances::Entity::update_many()
            .col_expr(sub_account_period_balances::Column::IsClosed, Expr::value(true))
            .filter(sub_account_period_balances::Column::CompanyId.eq(company_id.as_str()))
            .filter(sub_account_period_balances::Column::FiscalYear.eq(period.year))
            .filter(sub_account_period_balances::Column::FiscalMonth.eq(month))
            .filter(sub_account_period_balances::Column::IsClosed.eq(false))
            .exec(&self.txn)
            .await
            .map_err(classify)?;
        Ok(accounts.rows_affected + subs.rows_affected)
    }
}

#[async_trait]
impl AuditSink for PgUnit {
    async fn record_activity(&mut self, entry: &AuditEntry) -> Result<(), StoreError> {
        audit_trails::Entity::insert(convert::audit_row(entry))
            .exec_without_returning(&self.txn)
            .await
            .map_err(classify)?;
        Ok(())
    }
}
