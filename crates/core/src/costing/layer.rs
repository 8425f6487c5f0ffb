//! Cost-layer entry types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{CompanyId, CostLayerId, DocumentId};

use crate::company::CompanyScoped;

/// Stock movement recorded by an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CostMovement {
    /// Stock in at a known total cost.
    Purchase {
        /// Quantity received.
        quantity: Decimal,
        /// Total cost of the quantity received.
        total_cost: Decimal,
    },
    /// Stock out at the running average.
    Sale {
        /// Quantity sold.
        quantity: Decimal,
    },
}

impl CostMovement {
    /// Moved quantity (always positive).
    #[must_use]
    pub const fn quantity(&self) -> Decimal {
        match self {
            Self::Purchase { quantity, .. } | Self::Sale { quantity } => *quantity,
        }
    }

    /// Returns true for purchases.
    #[must_use]
    pub const fn is_purchase(&self) -> bool {
        matches!(self, Self::Purchase { .. })
    }

    /// Stored kind code.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Purchase { .. } => "purchase",
            Self::Sale { .. } => "sale",
        }
    }
}

/// Running stock position after an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunningPosition {
    /// Quantity on hand. Negative when oversold.
    pub balance: Decimal,
    /// Total cost on hand.
    pub total: Decimal,
    /// Moving average unit cost.
    pub average_cost: Decimal,
}

/// One entry of a (company, product) cost chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLayerEntry {
    /// Unique identifier.
    pub id: CostLayerId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Product.
    pub product_code: String,
    /// Movement date.
    pub date: NaiveDate,
    /// Tie-breaker among entries of the same date, in insertion order.
    pub sequence: i64,
    /// What moved.
    pub movement: CostMovement,
    /// Receiving report or sales invoice that caused the movement.
    pub source_document_id: DocumentId,
    /// Voided entries replay as zero movements.
    pub is_voided: bool,
    /// Unit cost applied: purchase cost, or the average consumed at.
    pub unit_cost: Decimal,
    /// Value moved: purchase cost, or consumed cost for a sale.
    pub total: Decimal,
    /// Position after this entry.
    pub running: RunningPosition,
    /// Set when the entry drove the balance negative.
    pub needs_review: bool,
}

impl CostLayerEntry {
    /// Chain ordering key.
    #[must_use]
    pub const fn order_key(&self) -> (NaiveDate, i64) {
        (self.date, self.sequence)
    }
}

impl CompanyScoped for CostLayerEntry {
    fn company_id(&self) -> &CompanyId {
        &self.company_id
    }
}

/// An entry left the stock balance negative.
///
/// Non-fatal: the movement is recorded and flagged for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeInventoryWarning {
    /// Owning company.
    pub company_id: CompanyId,
    /// Product.
    pub product_code: String,
    /// Entry that went negative.
    pub entry_id: CostLayerId,
    /// Its source document.
    pub source_document_id: DocumentId,
    /// Movement date.
    pub date: NaiveDate,
    /// Balance after the entry.
    pub resulting_balance: Decimal,
}
