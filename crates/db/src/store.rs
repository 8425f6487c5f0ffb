//! Capability traits over the transactional store.
//!
//! The engine talks to storage only through a [`UnitOfWork`]: one
//! transaction exposing narrow per-aggregate capabilities. Dropping a unit
//! without calling [`UnitOfWork::commit`] rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::costing::CostLayerEntry;
use tally_core::document::{Document, DocumentType};
use tally_core::fiscal::{FiscalPeriod, PostedPeriod};
use tally_core::ledger::{AccountPeriodBalance, LedgerLine, SubAccount, SubAccountPeriodBalance};
use tally_core::posting::PostingError;
use tally_shared::types::{AuditEntryId, CompanyId, DocumentId, UserId};
use thiserror::Error;

/// Store-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Serialization conflict, deadlock or lost connection. Safe to retry.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// A unique constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored row could not be decoded.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Transient(_) => "STORE_TRANSIENT",
            Self::UniqueViolation(_) => "STORE_UNIQUE_VIOLATION",
            Self::Corrupt(_) => "STORE_CORRUPT_ROW",
            Self::Database(_) => "STORE_ERROR",
        }
    }
}

impl From<StoreError> for PostingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(message) => Self::TransientStore(message),
            other => Self::Store(other.to_string()),
        }
    }
}

/// One audit-trail record, written once per successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Record id.
    pub id: AuditEntryId,
    /// Company.
    pub company_id: CompanyId,
    /// Acting user.
    pub user_id: UserId,
    /// Human-readable activity.
    pub activity: String,
    /// Document type involved, if any.
    pub document_type: Option<DocumentType>,
    /// When.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates a record stamped `now`.
    #[must_use]
    pub fn new(
        company_id: &CompanyId,
        user_id: UserId,
        activity: impl Into<String>,
        document_type: Option<DocumentType>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            company_id: company_id.clone(),
            user_id,
            activity: activity.into(),
            document_type,
            created_at: now,
        }
    }
}

/// Documents and their headers.
#[async_trait]
pub trait DocumentStore: Send {
    /// Loads a document of the company, locking it for the transaction.
    async fn get_document(
        &mut self,
        company_id: &CompanyId,
        id: DocumentId,
    ) -> Result<Option<Document>, StoreError>;

    /// Inserts a new document.
    async fn insert_document(&mut self, document: &Document) -> Result<(), StoreError>;

    /// Overwrites an existing document.
    async fn update_document(&mut self, document: &Document) -> Result<(), StoreError>;

    /// Whether a document of the type already carries `document_no`.
    async fn document_no_exists(
        &mut self,
        company_id: &CompanyId,
        document_type: DocumentType,
        document_no: &str,
    ) -> Result<bool, StoreError>;
}

/// Per-(company, type) number counters.
#[async_trait]
pub trait SequenceStore: Send {
    /// Locks the counter row (creating it when absent) and returns the last
    /// number issued.
    async fn lock_sequence(
        &mut self,
        company_id: &CompanyId,
        document_type: DocumentType,
    ) -> Result<Option<String>, StoreError>;

    /// Records the number just issued.
    async fn set_last_number(
        &mut self,
        company_id: &CompanyId,
        document_type: DocumentType,
        document_no: &str,
    ) -> Result<(), StoreError>;
}

/// The append-only general ledger.
#[async_trait]
pub trait LedgerStore: Send {
    /// Appends lines.
    async fn append_lines(&mut self, lines: &[LedgerLine]) -> Result<(), StoreError>;

    /// Every line referencing a document, oldest first.
    async fn lines_for_document(
        &mut self,
        company_id: &CompanyId,
        document_id: DocumentId,
    ) -> Result<Vec<LedgerLine>, StoreError>;
}

/// Month-end close flags.
#[async_trait]
pub trait PeriodStore: Send {
    /// Every period row of the company. A close of the same company waits
    /// until this unit ends.
    async fn posted_periods(&mut self, company_id: &CompanyId)
    -> Result<Vec<PostedPeriod>, StoreError>;

    /// Takes the company's period lock exclusively, waiting out units that
    /// have read its periods.
    async fn lock_periods(&mut self, company_id: &CompanyId) -> Result<(), StoreError>;

    /// Inserts or replaces a period row.
    async fn save_period(&mut self, period: &PostedPeriod) -> Result<(), StoreError>;
}

/// Per-product cost chains.
#[async_trait]
pub trait CostLayerStore: Send {
    /// Locks and loads the whole chain of a product.
    async fn lock_chain(
        &mut self,
        company_id: &CompanyId,
        product_code: &str,
    ) -> Result<Vec<CostLayerEntry>, StoreError>;

    /// Inserts or replaces entries.
    async fn save_entries(&mut self, entries: &[CostLayerEntry]) -> Result<(), StoreError>;
}

/// Period balance rows.
#[async_trait]
pub trait BalanceStore: Send {
    /// Locks and loads every account-level row of an account, by period.
    async fn account_rows(
        &mut self,
        company_id: &CompanyId,
        account_no: &str,
    ) -> Result<Vec<AccountPeriodBalance>, StoreError>;

    /// Locks and loads every row of a sub-account under an account, by period.
    async fn sub_account_rows(
        &mut self,
        company_id: &CompanyId,
        account_no: &str,
        sub_account: &SubAccount,
    ) -> Result<Vec<SubAccountPeriodBalance>, StoreError>;

    /// Inserts or replaces account-level rows.
    async fn save_account_rows(&mut self, rows: &[AccountPeriodBalance]) -> Result<(), StoreError>;

    /// Inserts or replaces sub-account rows.
    async fn save_sub_account_rows(
        &mut self,
        rows: &[SubAccountPeriodBalance],
    ) -> Result<(), StoreError>;

    /// Closes every balance row of the company for the month. Returns how
    /// many rows changed.
    async fn close_balance_rows(
        &mut self,
        company_id: &CompanyId,
        period: FiscalPeriod,
    ) -> Result<u64, StoreError>;
}

/// Audit trail.
#[async_trait]
pub trait AuditSink: Send {
    /// Records one activity.
    async fn record_activity(&mut self, entry: &AuditEntry) -> Result<(), StoreError>;
}

/// One transaction over every capability.
#[async_trait]
pub trait UnitOfWork:
    DocumentStore + SequenceStore + LedgerStore + PeriodStore + CostLayerStore + BalanceStore + AuditSink
{
    /// Makes every write visible atomically.
    async fn commit(self) -> Result<(), StoreError>;
}

/// Opens units of work.
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction type.
    type Unit: UnitOfWork;

    /// Begins a transaction.
    async fn begin(&self) -> Result<Self::Unit, StoreError>;
}
