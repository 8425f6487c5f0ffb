//! The document aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{CompanyId, DocumentId, UserId};

use super::body::DocumentBody;
use super::kind::DocumentType;
use super::status::{DocumentStatus, StatusError};
use crate::company::CompanyScoped;
use crate::fiscal::Module;

/// Input for drafting a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    /// Owning company.
    pub company_id: CompanyId,
    /// Accounting date.
    pub transaction_date: NaiveDate,
    /// Content.
    pub body: DocumentBody,
    /// Author.
    pub created_by: UserId,
}

/// A business document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier.
    pub id: DocumentId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Assigned on first post unless supplied by the caller.
    pub document_no: Option<String>,
    /// Accounting date.
    pub transaction_date: NaiveDate,
    /// Lifecycle status.
    pub status: DocumentStatus,
    /// Type-specific content.
    pub body: DocumentBody,
    /// Gross amount settled by collections or check vouchers.
    pub amount_paid: Decimal,
    /// Author.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Who posted it.
    pub posted_by: Option<UserId>,
    /// When it was posted.
    pub posted_at: Option<DateTime<Utc>>,
    /// Who voided it.
    pub voided_by: Option<UserId>,
    /// When it was voided.
    pub voided_at: Option<DateTime<Utc>>,
    /// Who canceled it.
    pub canceled_by: Option<UserId>,
    /// When it was canceled.
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Drafts a pending document.
    #[must_use]
    pub fn new(input: NewDocument, now: DateTime<Utc>) -> Self {
        Self {
            id: DocumentId::new(),
            company_id: input.company_id,
            document_no: None,
            transaction_date: input.transaction_date,
            status: DocumentStatus::Pending,
            body: input.body,
            amount_paid: Decimal::ZERO,
            created_by: input.created_by,
            created_at: now,
            posted_by: None,
            posted_at: None,
            voided_by: None,
            voided_at: None,
            canceled_by: None,
            canceled_at: None,
        }
    }

    /// Document type, derived from the body.
    #[must_use]
    pub const fn document_type(&self) -> DocumentType {
        self.body.document_type()
    }

    /// Module whose period lock applies.
    #[must_use]
    pub const fn module(&self) -> Module {
        self.document_type().module()
    }

    /// Reference shown on ledger lines: the number, or the id while unnumbered.
    #[must_use]
    pub fn reference(&self) -> String {
        self.document_no
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Gross amount still unpaid.
    #[must_use]
    pub fn outstanding_amount(&self) -> Decimal {
        self.body.gross_amount() - self.amount_paid
    }

    /// Marks the document posted.
    ///
    /// # Errors
    ///
    /// Returns `StatusError` unless the document is pending.
    pub fn mark_posted(&mut self, by: UserId, at: DateTime<Utc>) -> Result<(), StatusError> {
        self.status = self.status.transition(DocumentStatus::Posted)?;
        self.posted_by = Some(by);
        self.posted_at = Some(at);
        Ok(())
    }

    /// Marks the document voided.
    ///
    /// # Errors
    ///
    /// Returns `StatusError` unless the document is posted.
    pub fn mark_voided(&mut self, by: UserId, at: DateTime<Utc>) -> Result<(), StatusError> {
        self.status = self.status.transition(DocumentStatus::Voided)?;
        self.voided_by = Some(by);
        self.voided_at = Some(at);
        Ok(())
    }

    /// Marks the document canceled.
    ///
    /// # Errors
    ///
    /// Returns `StatusError` unless the document is pending.
    pub fn mark_canceled(&mut self, by: UserId, at: DateTime<Utc>) -> Result<(), StatusError> {
        self.status = self.status.transition(DocumentStatus::Canceled)?;
        self.canceled_by = Some(by);
        self.canceled_at = Some(at);
        Ok(())
    }
}

impl CompanyScoped for Document {
    fn company_id(&self) -> &CompanyId {
        &self.company_id
    }
}
