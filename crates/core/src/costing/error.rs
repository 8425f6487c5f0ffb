//! Costing errors.

use rust_decimal::Decimal;
use tally_shared::types::{CostLayerId, DocumentId};
use thiserror::Error;

/// Errors raised by the costing engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostingError {
    /// Quantities must be positive.
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    /// Costs cannot be negative.
    #[error("Cost cannot be negative, got {0}")]
    InvalidCost(Decimal),

    /// No entry with that id in the chain.
    #[error("Cost layer entry {0} not found")]
    EntryNotFound(CostLayerId),

    /// Only purchases carry a revisable cost.
    #[error("Cost layer entry {0} is not a purchase")]
    NotAPurchase(CostLayerId),

    /// Voided entries cannot be revised.
    #[error("Cost layer entry {0} is voided")]
    EntryVoided(CostLayerId),

    /// The document has no active entry in the chain.
    #[error("No cost layer entry for document {0}")]
    NoEntryForDocument(DocumentId),
}

impl CostingError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::InvalidCost(_) => "INVALID_COST",
            Self::EntryNotFound(_) => "COST_ENTRY_NOT_FOUND",
            Self::NotAPurchase(_) => "COST_ENTRY_NOT_A_PURCHASE",
            Self::EntryVoided(_) => "COST_ENTRY_VOIDED",
            Self::NoEntryForDocument(_) => "NO_COST_ENTRY_FOR_DOCUMENT",
        }
    }
}
