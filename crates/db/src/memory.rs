//! In-memory store.
//!
//! A unit of work holds the store's async mutex for its whole lifetime and
//! writes to a private copy of the state, so transactions are serial. The
//! copy replaces the shared state on commit and is discarded on drop.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tally_core::company::CompanyScope;
use tally_core::costing::CostLayerEntry;
use tally_core::document::{Document, DocumentType};
use tally_core::fiscal::{FiscalPeriod, Module, PostedPeriod};
use tally_core::ledger::{
    AccountPeriodBalance, LedgerLine, SubAccount, SubAccountPeriodBalance, SubAccountType,
};
use tally_shared::types::{CompanyId, CostLayerId, DocumentId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{
    AuditEntry, AuditSink, BalanceStore, CostLayerStore, DocumentStore, LedgerStore, PeriodStore,
    SequenceStore, Store, StoreError, UnitOfWork,
};

type AccountKey = (CompanyId, String, FiscalPeriod);
type SubAccountKey = (CompanyId, String, SubAccountType, String, FiscalPeriod);

#[derive(Debug, Default, Clone)]
struct State {
    documents: HashMap<DocumentId, Document>,
    sequences: HashMap<(CompanyId, DocumentType), String>,
    lines: Vec<LedgerLine>,
    periods: BTreeMap<(CompanyId, Module, FiscalPeriod), PostedPeriod>,
    cost_layers: HashMap<CostLayerId, CostLayerEntry>,
    account_balances: BTreeMap<AccountKey, AccountPeriodBalance>,
    sub_account_balances: BTreeMap<SubAccountKey, SubAccountPeriodBalance>,
    audit: Vec<AuditEntry>,
}

/// Shared in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    failing_commits: Arc<AtomicU32>,
    failing_number_writes: Arc<AtomicU32>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with a transient error.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` writes of a numbered document fail with a
    /// unique violation, as when a concurrent writer took the number first.
    pub fn fail_next_number_writes(&self, count: u32) {
        self.failing_number_writes.store(count, Ordering::SeqCst);
    }

    /// Every committed audit record.
    pub async fn audit_trail(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }

    /// Every committed ledger line.
    pub async fn ledger(&self) -> Vec<LedgerLine> {
        self.state.lock().await.lines.clone()
    }

    fn take_commit_failure(&self) -> bool {
        take_one(&self.failing_commits)
    }

    fn take_number_write_failure(&self) -> bool {
        take_one(&self.failing_number_writes)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Store for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(MemoryUnit {
            guard,
            work,
            store: self.clone(),
        })
    }
}

/// A serial transaction over [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryUnit {
    guard: OwnedMutexGuard<State>,
    work: State,
    store: MemoryStore,
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn commit(mut self) -> Result<(), StoreError> {
        if self.store.take_commit_failure() {
            return Err(StoreError::Transient(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }
        *self.guard = self.work;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryUnit {
    async fn get_document(
        &mut self,
        company_id: &CompanyId,
        id: DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let scope = CompanyScope::from(company_id.clone());
        let in_company = scope.filter::<Document>();
        Ok(self
            .work
            .documents
            .get(&id)
            .filter(|d| in_company(*d))
            .cloned())
    }

    async fn insert_document(&mut self, document: &Document) -> Result<(), StoreError> {
        if self.work.documents.contains_key(&document.id) {
            return Err(StoreError::UniqueViolation(format!(
                "documents_pkey ({})",
                document.id
            )));
        }
        self.ensure_unique_number(document)?;
        self.work.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn update_document(&mut self, document: &Document) -> Result<(), StoreError> {
        if !self.work.documents.contains_key(&document.id) {
            return Err(StoreError::Database(format!(
                "document {} does not exist",
                document.id
            )));
        }
        self.ensure_unique_number(document)?;
        self.work.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn document_no_exists(
        &mut self,
        company_id: &CompanyId,
        document_type: DocumentType,
        document_no: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.work.documents.values().any(|d| {
            &d.company_id == company_id
                && d.document_type() == document_type
                && d.document_no.as_deref() == Some(document_no)
        }))
    }
}

impl MemoryUnit {
    fn ensure_unique_number(&self, document: &Document) -> Result<(), StoreError> {
        let Some(number) = document.document_no.as_deref() else {
            return Ok(());
        };
        let taken = self.store.take_number_write_failure()
            || self.work.documents.values().any(|d| {
                d.id != document.id
                    && d.company_id == document.company_id
                    && d.document_type() == document.document_type()
                    && d.document_no.as_deref() == Some(number)
            });
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "documents_company_type_no_key ({number})"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SequenceStore for MemoryUnit {
    async fn lock_sequence(
        &mut self,
        company_id: &CompanyId,
        document_type: DocumentType,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .work
            .sequences
            .get(&(company_id.clone(), document_type))
            .cloned())
    }

    async fn set_last_number(
        &mut self,
        company_id: &CompanyId,
        document_type: DocumentType,
        document_no: &str,
    ) -> Result<(), StoreError> {
        self.work
            .sequences
            .insert((company_id.clone(), document_type), document_no.to_string());
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryUnit {
    async fn append_lines(&mut self, lines: &[LedgerLine]) -> Result<(), StoreError> {
        self.work.lines.extend_from_slice(lines);
        Ok(())
    }

    async fn lines_for_document(
        &mut self,
        company_id: &CompanyId,
        document_id: DocumentId,
    ) -> Result<Vec<LedgerLine>, StoreError> {
        let scope = CompanyScope::from(company_id.clone());
        let in_company = scope.filter::<LedgerLine>();
        Ok(self
            .work
            .lines
            .iter()
            .filter(|l| in_company(*l) && l.reference_document_id == document_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PeriodStore for MemoryUnit {
    async fn posted_periods(
        &mut self,
        company_id: &CompanyId,
    ) -> Result<Vec<PostedPeriod>, StoreError> {
        let scope = CompanyScope::from(company_id.clone());
        let in_company = scope.filter::<PostedPeriod>();
        Ok(self
            .work
            .periods
            .values()
            .filter(|p| in_company(*p))
            .cloned()
            .collect())
    }

    async fn lock_periods(&mut self, _company_id: &CompanyId) -> Result<(), StoreError> {
        // The unit already holds the whole store.
        Ok(())
    }

    async fn save_period(&mut self, period: &PostedPeriod) -> Result<(), StoreError> {
        self.work.periods.insert(
            (period.company_id.clone(), period.module, period.period),
            period.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl CostLayerStore for MemoryUnit {
    async fn lock_chain(
        &mut self,
        company_id: &CompanyId,
        product_code: &str,
    ) -> Result<Vec<CostLayerEntry>, StoreError> {
        let scope = CompanyScope::from(company_id.clone());
        let mut chain: Vec<_> = self
            .work
            .cost_layers
            .values()
            .filter(|e| scope.includes(&e.company_id) && e.product_code == product_code)
            .cloned()
            .collect();
        chain.sort_by_key(CostLayerEntry::order_key);
        Ok(chain)
    }

    async fn save_entries(&mut self, entries: &[CostLayerEntry]) -> Result<(), StoreError> {
        for entry in entries {
            self.work.cost_layers.insert(entry.id, entry.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for MemoryUnit {
    async fn account_rows(
        &mut self,
        company_id: &CompanyId,
        account_no: &str,
    ) -> Result<Vec<AccountPeriodBalance>, StoreError> {
        Ok(self
            .work
            .account_balances
            .values()
            .filter(|r| &r.company_id == company_id && r.account_no == account_no)
            .cloned()
            .collect())
    }

    async fn sub_account_rows(
        &mut self,
        company_id: &CompanyId,
        account_no: &str,
        sub_account: &SubAccount,
    ) -> Result<Vec<SubAccountPeriodBalance>, StoreError> {
        Ok(self
            .work
            .sub_account_balances
            .values()
            .filter(|r| {
                &r.company_id == company_id
                    && r.account_no == account_no
                    && r.sub_account.kind == sub_account.kind
                    && r.sub_account.id == sub_account.id
            })
            .cloned()
            .collect())
    }

    async fn save_account_rows(&mut self, rows: &[AccountPeriodBalance]) -> Result<(), StoreError> {
        for row in rows {
            self.work.account_balances.insert(
                (row.company_id.clone(), row.account_no.clone(), row.period),
                row.clone(),
            );
        }
        Ok(())
    }

    async fn save_sub_account_rows(
        &mut self,
        rows: &[SubAccountPeriodBalance],
    ) -> Result<(), StoreError> {
        for row in rows {
            self.work.sub_account_balances.insert(
                (
                    row.company_id.clone(),
                    row.account_no.clone(),
                    row.sub_account.kind,
                    row.sub_account.id.clone(),
                    row.period,
                ),
                row.clone(),
            );
        }
        Ok(())
    }

    async fn close_balance_rows(
        &mut self,
        company_id: &CompanyId,
        period: FiscalPeriod,
    ) -> Result<u64, StoreError> {
        let mut closed = 0;
        for row in self.work.account_balances.values_mut() {
            if &row.company_id == company_id && row.period == period && !row.totals.is_closed {
                row.totals.is_closed = true;
                closed += 1;
            }
        }
        for row in self.work.sub_account_balances.values_mut() {
            if &row.company_id == company_id && row.period == period && !row.totals.is_closed {
                row.totals.is_closed = true;
                closed += 1;
            }
        }
        Ok(closed)
    }
}

#[async_trait]
impl AuditSink for MemoryUnit {
    async fn record_activity(&mut self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.work.audit.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uncommitted_unit_rolls_back() {
        let store = MemoryStore::new();
        let company = CompanyId::new("C01");

        let mut unit = store.begin().await.unwrap();
        unit.set_last_number(&company, DocumentType::SalesInvoice, "SI-000001")
            .await
            .unwrap();
        drop(unit);

        let mut unit = store.begin().await.unwrap();
        let last = unit
            .lock_sequence(&company, DocumentType::SalesInvoice)
            .await
            .unwrap();
        assert_eq!(last, None);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let company = CompanyId::new("C01");

        let mut unit = store.begin().await.unwrap();
        unit.set_last_number(&company, DocumentType::SalesInvoice, "SI-000001")
            .await
            .unwrap();
        unit.commit().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        let last = unit
            .lock_sequence(&company, DocumentType::SalesInvoice)
            .await
            .unwrap();
        assert_eq!(last.as_deref(), Some("SI-000001"));
    }

    #[tokio::test]
    async fn test_injected_commit_failure_is_transient() {
        let store = MemoryStore::new();
        store.fail_next_commits(1);

        let unit = store.begin().await.unwrap();
        assert!(matches!(unit.commit().await, Err(StoreError::Transient(_))));

        let unit = store.begin().await.unwrap();
        assert!(unit.commit().await.is_ok());
    }
}
