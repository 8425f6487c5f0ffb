//! Posting error taxonomy.
//!
//! Domain errors are permanent and surface immediately. Only
//! `TransientStore` is retried by the execution strategy.

use rust_decimal::Decimal;
use tally_shared::types::DocumentId;
use tally_shared::AppError;
use thiserror::Error;

use crate::costing::CostingError;
use crate::document::{DocumentStatus, DocumentType, StatusError};
use crate::fiscal::{Module, PeriodError};
use crate::ledger::{BalanceError, LedgerError};
use crate::sequence::SequenceError;

/// Errors that can occur while posting, voiding or correcting documents.
#[derive(Debug, Error)]
pub enum PostingError {
    // ========== Invariant Errors ==========
    /// Debits and credits differ after rounding.
    #[error("Ledger entry is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedLedger {
        /// Rounded total debit.
        debit: Decimal,
        /// Rounded total credit.
        credit: Decimal,
    },

    /// A built line is malformed.
    #[error("Invalid ledger line for account {account_no}: {reason}")]
    InvalidLine {
        /// The offending account.
        account_no: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    // ========== Period Errors ==========
    /// The module or the general ledger is closed for the date.
    #[error("{module} period {year}-{month:02} is closed")]
    PeriodClosed {
        /// Module checked.
        module: Module,
        /// Fiscal year.
        year: i32,
        /// Month.
        month: u32,
    },

    /// Malformed period or module.
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    // ========== Document State Errors ==========
    /// The document is already in the ledger.
    #[error("Document {document_id} is already posted")]
    AlreadyPosted {
        /// The document.
        document_id: DocumentId,
        /// Its number.
        document_no: Option<String>,
    },

    /// The document's status does not allow the operation.
    #[error("Cannot {action} document {document_id} in status {status}")]
    InvalidStatus {
        /// The document.
        document_id: DocumentId,
        /// Its current status.
        status: DocumentStatus,
        /// What was attempted.
        action: &'static str,
    },

    /// No such document in the company.
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// Document content or cross-document references are invalid.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Product has no account mapping.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    // ========== Numbering Errors ==========
    /// Every attempt at a unique number collided.
    #[error("Could not issue a unique {document_type} number after {attempts} attempts")]
    SequenceExhausted {
        /// Document type.
        document_type: DocumentType,
        /// Attempts made.
        attempts: u32,
    },

    /// Number arithmetic failed.
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    // ========== Aggregate Errors ==========
    /// Balance row update rejected.
    #[error(transparent)]
    Balance(#[from] BalanceError),

    /// Cost chain update rejected.
    #[error(transparent)]
    Costing(#[from] CostingError),

    // ========== Infrastructure Errors ==========
    /// Temporary store failure (serialization conflict, lost connection).
    #[error("Transient store failure: {0}")]
    TransientStore(String),

    /// Permanent store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// The caller cancelled before commit.
    #[error("Operation cancelled")]
    Cancelled,
}

impl PostingError {
    /// Maps a status transition failure for a specific document.
    #[must_use]
    pub fn from_status(
        err: StatusError,
        document_id: DocumentId,
        document_no: Option<String>,
        status: DocumentStatus,
        action: &'static str,
    ) -> Self {
        match err {
            StatusError::AlreadyPosted => Self::AlreadyPosted {
                document_id,
                document_no,
            },
            StatusError::InvalidTransition { .. } => Self::InvalidStatus {
                document_id,
                status,
                action,
            },
        }
    }

    /// Returns true if retrying the whole transaction may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnbalancedLedger { .. } => "UNBALANCED_LEDGER",
            Self::InvalidLine { .. } => "INVALID_LEDGER_LINE",
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::InvalidPeriod(_) => "INVALID_PERIOD",
            Self::AlreadyPosted { .. } => "ALREADY_POSTED",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            Self::InvalidDocument(_) => "INVALID_DOCUMENT",
            Self::UnknownProduct(_) => "UNKNOWN_PRODUCT",
            Self::SequenceExhausted { .. } => "SEQUENCE_EXHAUSTED",
            Self::Sequence(e) => e.error_code(),
            Self::Balance(e) => e.error_code(),
            Self::Costing(e) => e.error_code(),
            Self::TransientStore(_) => "TRANSIENT_STORE_FAILURE",
            Self::Store(_) => "STORE_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::DocumentNotFound(_) => 404,
            Self::InvalidDocument(_) | Self::InvalidPeriod(_) | Self::InvalidLine { .. } => 400,
            Self::AlreadyPosted { .. } | Self::InvalidStatus { .. } => 409,
            Self::UnbalancedLedger { .. }
            | Self::PeriodClosed { .. }
            | Self::UnknownProduct(_)
            | Self::Balance(_)
            | Self::Costing(_) => 422,
            Self::TransientStore(_) | Self::SequenceExhausted { .. } => 503,
            Self::Cancelled => 499,
            Self::Sequence(_) | Self::Store(_) => 500,
        }
    }
}

impl From<LedgerError> for PostingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unbalanced { debit, credit } => Self::UnbalancedLedger { debit, credit },
            LedgerError::InvalidLine { account_no, reason } => {
                Self::InvalidLine { account_no, reason }
            }
        }
    }
}

impl From<PeriodError> for PostingError {
    fn from(err: PeriodError) -> Self {
        match err {
            PeriodError::PeriodClosed {
                module,
                year,
                month,
            } => Self::PeriodClosed {
                module,
                year,
                month,
            },
            other => Self::InvalidPeriod(other.to_string()),
        }
    }
}

impl From<PostingError> for AppError {
    fn from(err: PostingError) -> Self {
        let message = err.to_string();
        match err {
            PostingError::DocumentNotFound(_) => Self::NotFound(message),
            PostingError::InvalidDocument(_)
            | PostingError::InvalidPeriod(_)
            | PostingError::InvalidLine { .. } => Self::Validation(message),
            PostingError::AlreadyPosted { .. } | PostingError::InvalidStatus { .. } => {
                Self::Conflict(message)
            }
            PostingError::UnbalancedLedger { .. }
            | PostingError::PeriodClosed { .. }
            | PostingError::UnknownProduct(_)
            | PostingError::Balance(_)
            | PostingError::Costing(_)
            | PostingError::Cancelled => Self::BusinessRule(message),
            PostingError::TransientStore(_) | PostingError::SequenceExhausted { .. } => {
                Self::Unavailable(message)
            }
            PostingError::Store(_) => Self::Database(message),
            PostingError::Sequence(_) => Self::Internal(message),
        }
    }
}
