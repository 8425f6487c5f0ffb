//! What the engine hands back after a successful operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{CompanyId, DocumentId, UserId};

use crate::costing::{CostLayerEntry, NegativeInventoryWarning};
use crate::document::DocumentType;
use crate::ledger::{LedgerLine, LedgerTotals};

/// Result of posting a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedReceipt {
    /// The document.
    pub document_id: DocumentId,
    /// Company.
    pub company_id: CompanyId,
    /// Type.
    pub document_type: DocumentType,
    /// Number, assigned now or earlier.
    pub document_no: String,
    /// Who posted.
    pub posted_by: UserId,
    /// When.
    pub posted_at: DateTime<Utc>,
    /// Lines appended to the ledger.
    pub lines: Vec<LedgerLine>,
    /// Their totals.
    pub totals: LedgerTotals,
    /// Cost-layer entry recorded for inventory documents.
    pub cost_entry: Option<CostLayerEntry>,
    /// Non-fatal costing warnings.
    pub warnings: Vec<NegativeInventoryWarning>,
    /// Transaction attempts used, including the successful one.
    pub attempts: u32,
}

/// Result of voiding a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoidReceipt {
    /// The document.
    pub document_id: DocumentId,
    /// Its number.
    pub document_no: String,
    /// Offsetting lines, including cost adjustments for downstream sales.
    pub lines: Vec<LedgerLine>,
    /// Cost-layer entries rewritten by the replay.
    pub cost_entries: Vec<CostLayerEntry>,
    /// Non-fatal costing warnings.
    pub warnings: Vec<NegativeInventoryWarning>,
}

/// Result of a cost correction or recalculation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostCorrection {
    /// Correcting lines appended to the ledger.
    pub lines: Vec<LedgerLine>,
    /// Cost-layer entries rewritten by the replay.
    pub cost_entries: Vec<CostLayerEntry>,
    /// Non-fatal costing warnings.
    pub warnings: Vec<NegativeInventoryWarning>,
}
