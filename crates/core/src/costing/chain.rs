//! Operations on one (company, product) cost chain.
//!
//! The caller loads the whole chain (locked for the duration of the
//! transaction), applies one operation and persists every entry reported in
//! the outcome.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tally_shared::types::{round_money, CompanyId, CostLayerId, DocumentId};

use super::error::CostingError;
use super::layer::{CostLayerEntry, CostMovement, NegativeInventoryWarning, RunningPosition};
use super::replay::replay;

/// An existing entry whose computed figures changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange {
    /// Entry before the operation.
    pub before: CostLayerEntry,
    /// Entry after the operation.
    pub after: CostLayerEntry,
}

impl EntryChange {
    /// Change in the value moved by the entry (purchase cost or consumed
    /// cost).
    #[must_use]
    pub fn total_delta(&self) -> Decimal {
        self.after.total - self.before.total
    }
}

/// Everything an operation did to the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostingOutcome {
    /// The inserted, revised or voided entry, as it now stands.
    pub entry: Option<CostLayerEntry>,
    /// Pre-existing entries whose figures changed, in chain order. Includes
    /// the target entry when it already existed.
    pub changes: Vec<EntryChange>,
    /// Entries left with a negative balance.
    pub warnings: Vec<NegativeInventoryWarning>,
}

impl CostingOutcome {
    /// Value moved by the target entry (consumed cost for a sale).
    #[must_use]
    pub fn consumed_cost(&self) -> Decimal {
        self.entry.as_ref().map_or(Decimal::ZERO, |e| e.total)
    }

    /// Running average after the target entry.
    #[must_use]
    pub fn average_cost(&self) -> Decimal {
        self.entry
            .as_ref()
            .map_or(Decimal::ZERO, |e| e.running.average_cost)
    }

    /// Every entry that must be written back: changed entries plus a newly
    /// inserted one.
    #[must_use]
    pub fn entries_to_persist(&self) -> Vec<CostLayerEntry> {
        let mut out: Vec<_> = self.changes.iter().map(|c| c.after.clone()).collect();
        if let Some(entry) = &self.entry {
            if !out.iter().any(|e| e.id == entry.id) {
                out.push(entry.clone());
            }
        }
        out
    }
}

/// Reports entries (matched by id) whose computed figures differ between two
/// versions of a chain.
#[must_use]
pub fn diff(before: &[CostLayerEntry], after: &[CostLayerEntry]) -> Vec<EntryChange> {
    let index: HashMap<CostLayerId, &CostLayerEntry> = before.iter().map(|e| (e.id, e)).collect();
    after
        .iter()
        .filter_map(|new| {
            let old = index.get(&new.id)?;
            (*old != new).then(|| EntryChange {
                before: (*old).clone(),
                after: new.clone(),
            })
        })
        .collect()
}

/// The ordered cost chain of one product in one company.
#[derive(Debug, Clone)]
pub struct CostChain {
    company_id: CompanyId,
    product_code: String,
    entries: Vec<CostLayerEntry>,
}

impl CostChain {
    /// Wraps loaded entries, sorting them into chain order.
    #[must_use]
    pub fn new(
        company_id: CompanyId,
        product_code: impl Into<String>,
        mut entries: Vec<CostLayerEntry>,
    ) -> Self {
        entries.sort_by_key(CostLayerEntry::order_key);
        Self {
            company_id,
            product_code: product_code.into(),
            entries,
        }
    }

    /// Entries in chain order.
    #[must_use]
    pub fn entries(&self) -> &[CostLayerEntry] {
        &self.entries
    }

    /// Consumes the chain.
    #[must_use]
    pub fn into_entries(self) -> Vec<CostLayerEntry> {
        self.entries
    }

    /// Current position (after the last entry).
    #[must_use]
    pub fn position(&self) -> RunningPosition {
        self.entries.last().map(|e| e.running).unwrap_or_default()
    }

    /// Position just before the entry at `index`.
    #[must_use]
    pub fn position_before(&self, index: usize) -> RunningPosition {
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|e| e.running)
            .unwrap_or_default()
    }

    /// Records a receipt of `quantity` costing `total_cost` in total.
    ///
    /// # Errors
    ///
    /// Rejects non-positive quantities and negative costs.
    pub fn record_purchase(
        &mut self,
        source_document_id: DocumentId,
        date: NaiveDate,
        quantity: Decimal,
        total_cost: Decimal,
    ) -> Result<CostingOutcome, CostingError> {
        if total_cost < Decimal::ZERO {
            return Err(CostingError::InvalidCost(total_cost));
        }
        self.insert(
            source_document_id,
            date,
            CostMovement::Purchase {
                quantity,
                total_cost: round_money(total_cost),
            },
        )
    }

    /// Records a receipt priced per unit.
    ///
    /// # Errors
    ///
    /// Rejects non-positive quantities and negative costs.
    pub fn record_purchase_at(
        &mut self,
        source_document_id: DocumentId,
        date: NaiveDate,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> Result<CostingOutcome, CostingError> {
        if unit_cost < Decimal::ZERO {
            return Err(CostingError::InvalidCost(unit_cost));
        }
        self.record_purchase(source_document_id, date, quantity, quantity * unit_cost)
    }

    /// Records a sale of `quantity` at the running average. The consumed cost
    /// and the new average are on the outcome.
    ///
    /// # Errors
    ///
    /// Rejects non-positive quantities.
    pub fn record_sale(
        &mut self,
        source_document_id: DocumentId,
        date: NaiveDate,
        quantity: Decimal,
    ) -> Result<CostingOutcome, CostingError> {
        self.insert(source_document_id, date, CostMovement::Sale { quantity })
    }

    /// Replaces the total cost of a purchase and replays the chain forward.
    ///
    /// # Errors
    ///
    /// Fails if the entry is missing, voided or not a purchase.
    pub fn revise_purchase(
        &mut self,
        entry_id: CostLayerId,
        new_total_cost: Decimal,
    ) -> Result<CostingOutcome, CostingError> {
        if new_total_cost < Decimal::ZERO {
            return Err(CostingError::InvalidCost(new_total_cost));
        }
        let index = self.index_of(entry_id)?;
        let entry = &self.entries[index];
        if entry.is_voided {
            return Err(CostingError::EntryVoided(entry_id));
        }
        let CostMovement::Purchase { quantity, .. } = entry.movement else {
            return Err(CostingError::NotAPurchase(entry_id));
        };

        let before = self.entries.clone();
        self.entries[index].movement = CostMovement::Purchase {
            quantity,
            total_cost: round_money(new_total_cost),
        };
        Ok(self.replay_from(index, &before, Some(entry_id)))
    }

    /// Voids every active entry caused by `source_document_id` and replays.
    ///
    /// # Errors
    ///
    /// Returns `NoEntryForDocument` when the document has no active entry.
    pub fn void_document(
        &mut self,
        source_document_id: DocumentId,
    ) -> Result<CostingOutcome, CostingError> {
        let before = self.entries.clone();
        let mut first = None;
        let mut target = None;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if entry.source_document_id == source_document_id && !entry.is_voided {
                entry.is_voided = true;
                first.get_or_insert(i);
                target.get_or_insert(entry.id);
            }
        }
        let Some(index) = first else {
            return Err(CostingError::NoEntryForDocument(source_document_id));
        };
        Ok(self.replay_from(index, &before, target))
    }

    /// Replays the chain from `entry_id` forward.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the id is not in the chain.
    pub fn recalculate(&mut self, from_entry_id: CostLayerId) -> Result<CostingOutcome, CostingError> {
        let index = self.index_of(from_entry_id)?;
        let before = self.entries.clone();
        Ok(self.replay_from(index, &before, Some(from_entry_id)))
    }

    /// Replays the chain from the first entry dated on or after `from`.
    #[must_use]
    pub fn recalculate_from_date(&mut self, from: NaiveDate) -> CostingOutcome {
        let index = self.entries.partition_point(|e| e.date < from);
        let before = self.entries.clone();
        self.replay_from(index, &before, None)
    }

    fn index_of(&self, id: CostLayerId) -> Result<usize, CostingError> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(CostingError::EntryNotFound(id))
    }

    fn insert(
        &mut self,
        source_document_id: DocumentId,
        date: NaiveDate,
        movement: CostMovement,
    ) -> Result<CostingOutcome, CostingError> {
        let quantity = movement.quantity();
        if quantity <= Decimal::ZERO {
            return Err(CostingError::InvalidQuantity(quantity));
        }

        let sequence = self.entries.iter().map(|e| e.sequence).max().unwrap_or(0) + 1;
        let entry = CostLayerEntry {
            id: CostLayerId::new(),
            company_id: self.company_id.clone(),
            product_code: self.product_code.clone(),
            date,
            sequence,
            movement,
            source_document_id,
            is_voided: false,
            unit_cost: Decimal::ZERO,
            total: Decimal::ZERO,
            running: RunningPosition::default(),
            needs_review: false,
        };
        let id = entry.id;

        let before = self.entries.clone();
        let index = self
            .entries
            .partition_point(|e| e.order_key() <= entry.order_key());
        self.entries.insert(index, entry);
        Ok(self.replay_from(index, &before, Some(id)))
    }

    fn replay_from(
        &mut self,
        index: usize,
        before: &[CostLayerEntry],
        target: Option<CostLayerId>,
    ) -> CostingOutcome {
        let start = self.position_before(index);
        let replayed = replay(start, &self.entries[index..]);

        let warnings = replayed
            .iter()
            .filter(|e| e.needs_review)
            .map(|e| NegativeInventoryWarning {
                company_id: e.company_id.clone(),
                product_code: e.product_code.clone(),
                entry_id: e.id,
                source_document_id: e.source_document_id,
                date: e.date,
                resulting_balance: e.running.balance,
            })
            .collect();

        self.entries.truncate(index);
        self.entries.extend(replayed);

        let changes = diff(before, &self.entries[index..]);
        let entry = target.and_then(|id| self.entries.iter().find(|e| e.id == id).cloned());

        CostingOutcome {
            entry,
            changes,
            warnings,
        }
    }
}
