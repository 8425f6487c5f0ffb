//! The posting engine.
//!
//! Every write operation is one unit of work run by the
//! [`ExecutionStrategy`]: a transient store failure rolls the whole unit
//! back and reruns it, anything else surfaces immediately. Cancelling the
//! token before commit rolls back and returns `PostingError::Cancelled`.

mod balances;
mod numbering;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tally_core::costing::{
    CostChain, CostLayerEntry, CostMovement, CostingError, EntryChange, NegativeInventoryWarning,
};
use tally_core::document::{Document, DocumentBody, DocumentStatus, DocumentType, NewDocument};
use tally_core::fiscal::{
    plan_close, CloseAction, FiscalPeriod, Module, PeriodGuard, PostedPeriod,
};
use tally_core::ledger::{
    reverse_lines, validate_lines, AccountPeriodBalance, LedgerLine, SubAccount,
    SubAccountPeriodBalance,
};
use tally_core::posting::{
    split_vat, CostCorrection, PostedReceipt, PostingContext, PostingError, PostingRules,
    VoidReceipt,
};
use tally_shared::config::{PostingConfig, SequenceConfig};
use tally_shared::types::{CompanyId, DocumentId, UserId};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::store::{
    AuditEntry, AuditSink, BalanceStore, CostLayerStore, DocumentStore, LedgerStore, PeriodStore,
    Store, StoreError, UnitOfWork,
};
use crate::strategy::ExecutionStrategy;

/// Orchestrates posting, voiding, corrections and month-end close over a
/// transactional store.
#[derive(Debug, Clone)]
pub struct PostingEngine<S> {
    store: S,
    rules: PostingRules,
    strategy: ExecutionStrategy,
    sequence_attempts: u32,
}

impl<S: Store> PostingEngine<S> {
    /// Creates an engine with default retry settings and the standard
    /// account table.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, &PostingConfig::default(), &SequenceConfig::default())
    }

    /// Creates an engine from configuration.
    #[must_use]
    pub fn with_config(store: S, posting: &PostingConfig, sequence: &SequenceConfig) -> Self {
        Self {
            store,
            rules: PostingRules::default(),
            strategy: ExecutionStrategy::from_config(posting),
            sequence_attempts: sequence.max_attempts.max(1),
        }
    }

    /// Replaces the posting rules.
    #[must_use]
    pub fn with_rules(mut self, rules: PostingRules) -> Self {
        self.rules = rules;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    // ========== Document lifecycle ==========

    /// Drafts a pending document after checking its content and that its
    /// period is open.
    ///
    /// # Errors
    ///
    /// `InvalidDocument` for malformed content, `PeriodClosed` for a closed
    /// month, or a store error.
    pub async fn create_document(
        &self,
        input: NewDocument,
        cancel: &CancellationToken,
    ) -> Result<Document, PostingError> {
        input.body.validate().map_err(PostingError::InvalidDocument)?;
        let input = &input;
        let (document, _) = self
            .strategy
            .run("create_document", cancel, |_| self.create_once(input, cancel))
            .await?;
        info!(
            document_id = %document.id,
            company_id = %document.company_id,
            document_type = %document.document_type(),
            "Document created"
        );
        Ok(document)
    }

    async fn create_once(
        &self,
        input: &NewDocument,
        cancel: &CancellationToken,
    ) -> Result<Document, PostingError> {
        let mut unit = self.store.begin().await?;
        let guard = period_guard(&mut unit, &input.company_id).await?;
        guard.ensure_open(
            input.body.document_type().module(),
            input.transaction_date,
        )?;

        let now = Utc::now();
        let document = Document::new(input.clone(), now);
        unit.insert_document(&document).await?;
        unit.record_activity(&AuditEntry::new(
            &document.company_id,
            document.created_by,
            format!("Created {}", document.document_type()),
            Some(document.document_type()),
            now,
        ))
        .await?;
        finish(unit, cancel, document).await
    }

    /// Replaces the date and content of a pending document. The type cannot
    /// change, and both the old and the new month must be open.
    ///
    /// # Errors
    ///
    /// `InvalidStatus` unless pending, `InvalidDocument`, `PeriodClosed`.
    pub async fn update_document(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
        transaction_date: NaiveDate,
        body: DocumentBody,
        updated_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<Document, PostingError> {
        body.validate().map_err(PostingError::InvalidDocument)?;
        let body = &body;
        let (document, _) = self
            .strategy
            .run("update_document", cancel, |_| {
                self.update_once(company_id, document_id, transaction_date, body, updated_by, cancel)
            })
            .await?;
        Ok(document)
    }

    async fn update_once(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
        transaction_date: NaiveDate,
        body: &DocumentBody,
        updated_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<Document, PostingError> {
        let mut unit = self.store.begin().await?;
        let mut document = load(&mut unit, company_id, document_id).await?;
        if !document.status.is_editable() {
            return Err(PostingError::InvalidStatus {
                document_id,
                status: document.status,
                action: "update",
            });
        }
        if body.document_type() != document.document_type() {
            return Err(PostingError::InvalidDocument(format!(
                "cannot change a {} into a {}",
                document.document_type(),
                body.document_type()
            )));
        }

        let guard = period_guard(&mut unit, company_id).await?;
        guard.ensure_open(document.module(), document.transaction_date)?;
        guard.ensure_open(document.module(), transaction_date)?;

        document.transaction_date = transaction_date;
        document.body = body.clone();
        unit.update_document(&document).await?;
        unit.record_activity(&AuditEntry::new(
            company_id,
            updated_by,
            format!("Updated {} {}", document.document_type(), document.reference()),
            Some(document.document_type()),
            Utc::now(),
        ))
        .await?;
        finish(unit, cancel, document).await
    }

    /// Cancels a pending document.
    ///
    /// # Errors
    ///
    /// `InvalidStatus` unless the document is pending.
    pub async fn cancel_document(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
        canceled_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<Document, PostingError> {
        let (document, _) = self
            .strategy
            .run("cancel_document", cancel, |_| {
                self.cancel_once(company_id, document_id, canceled_by, cancel)
            })
            .await?;
        info!(document_id = %document_id, company_id = %company_id, "Document canceled");
        Ok(document)
    }

    async fn cancel_once(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
        canceled_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<Document, PostingError> {
        let mut unit = self.store.begin().await?;
        let mut document = load(&mut unit, company_id, document_id).await?;
        let status = document.status;
        let now = Utc::now();
        document.mark_canceled(canceled_by, now).map_err(|e| {
            PostingError::from_status(e, document_id, document.document_no.clone(), status, "cancel")
        })?;
        unit.update_document(&document).await?;
        unit.record_activity(&AuditEntry::new(
            company_id,
            canceled_by,
            format!("Canceled {} {}", document.document_type(), document.reference()),
            Some(document.document_type()),
            now,
        ))
        .await?;
        finish(unit, cancel, document).await
    }

    // ========== Posting ==========

    /// Posts a pending document: assigns its number, builds and checks its
    /// ledger lines, updates inventory cost, payment applications and
    /// balances, and records an audit entry, all in one transaction.
    ///
    /// # Errors
    ///
    /// `AlreadyPosted` if posted, `InvalidStatus` if voided or canceled,
    /// `PeriodClosed`, `UnbalancedLedger`, `SequenceExhausted`,
    /// `InvalidDocument`, `UnknownProduct`, `Cancelled` or a store error.
    pub async fn post_document(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
        posted_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<PostedReceipt, PostingError> {
        let (mut receipt, attempts) = self
            .strategy
            .run("post_document", cancel, |_| {
                self.post_once(company_id, document_id, posted_by, cancel)
            })
            .await?;
        receipt.attempts = attempts;

        log_warnings(&receipt.warnings);
        info!(
            document_id = %document_id,
            company_id = %company_id,
            document_no = %receipt.document_no,
            document_type = %receipt.document_type,
            lines = receipt.lines.len(),
            total = %receipt.totals.debit,
            attempts,
            "Document posted"
        );
        Ok(receipt)
    }

    async fn post_once(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
        posted_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<PostedReceipt, PostingError> {
        let mut unit = self.store.begin().await?;
        let mut document = load(&mut unit, company_id, document_id).await?;
        document
            .status
            .transition(DocumentStatus::Posted)
            .map_err(|e| {
                PostingError::from_status(
                    e,
                    document_id,
                    document.document_no.clone(),
                    document.status,
                    "post",
                )
            })?;

        let guard = period_guard(&mut unit, company_id).await?;
        guard.ensure_open(document.module(), document.transaction_date)?;
        document.body.validate().map_err(PostingError::InvalidDocument)?;

        let document_type = document.document_type();
        let issued = document.document_no.is_none();
        let document_no = match document.document_no.clone() {
            Some(number) => number,
            None => {
                numbering::issue_number(&mut unit, company_id, document_type, self.sequence_attempts)
                    .await?
            }
        };

        // Inventory cost.
        let mut consumed_cost = Decimal::ZERO;
        let mut cost_entry = None;
        let mut cost_entries = Vec::new();
        let mut warnings = Vec::new();
        let mut adjustments = Vec::new();
        if let Some((product_code, movement)) = self.rules.cost_movement(&document)? {
            let loaded = unit.lock_chain(company_id, &product_code).await?;
            let mut chain = CostChain::new(company_id.clone(), product_code, loaded);
            let date = document.transaction_date;
            let outcome = match movement {
                CostMovement::Purchase {
                    quantity,
                    total_cost,
                } => chain.record_purchase(document_id, date, quantity, total_cost)?,
                CostMovement::Sale { quantity } => {
                    let outcome = chain.record_sale(document_id, date, quantity)?;
                    consumed_cost = outcome.consumed_cost();
                    outcome
                }
            };
            guard.ensure_all_open(
                Module::Inventory,
                std::iter::once(date).chain(changed_dates(&outcome.changes)),
            )?;
            adjustments = self
                .sale_adjustments(&mut unit, &guard, company_id, Some(document_id), &outcome.changes)
                .await?;
            cost_entries = outcome.entries_to_persist();
            cost_entry = outcome.entry;
            warnings = outcome.warnings;
        }

        // Credit memos reduce what the invoice still owes.
        let mut touched = Vec::new();
        if let DocumentBody::CreditMemo(memo) | DocumentBody::DebitMemo(memo) = &document.body {
            let mut invoice = load(&mut unit, company_id, memo.sales_invoice_id).await?;
            PostingRules::check_memo_target(&document, &invoice)?;
            if document_type == DocumentType::CreditMemo {
                invoice.amount_paid += document.body.gross_amount();
                touched.push(invoice);
            }
        }

        // Settlements.
        let mut settlements = Vec::new();
        for application in document.body.payment_applications() {
            let mut target = load(&mut unit, company_id, application.document_id).await?;
            let settled = self.rules.settle(&document, &target, application.amount)?;
            target.amount_paid += settled.amount;
            settlements.push(settled);
            touched.push(target);
        }

        let lines = self.rules.build_lines(&PostingContext {
            document: &document,
            document_no: &document_no,
            consumed_cost,
            settlements: &settlements,
        })?;
        let totals = validate_lines(&lines)?;
        validate_lines(&adjustments)?;

        let mut all_lines = lines;
        all_lines.extend(adjustments);
        balances::apply_lines(&mut unit, &all_lines).await?;
        unit.append_lines(&all_lines).await?;
        unit.save_entries(&cost_entries).await?;
        for target in &touched {
            unit.update_document(target).await?;
        }

        let posted_at = Utc::now();
        document.document_no = Some(document_no.clone());
        let status = document.status;
        document.mark_posted(posted_by, posted_at).map_err(|e| {
            PostingError::from_status(e, document_id, Some(document_no.clone()), status, "post")
        })?;
        match unit.update_document(&document).await {
            // Lost a race for the issued number.
            Err(StoreError::UniqueViolation(message)) if issued => {
                warn!(
                    document_id = %document_id,
                    document_no = %document_no,
                    "Issued number already written, re-issuing"
                );
                return Err(PostingError::TransientStore(message));
            }
            result => result?,
        }
        unit.record_activity(&AuditEntry::new(
            company_id,
            posted_by,
            format!("Posted {document_type} {document_no}"),
            Some(document_type),
            posted_at,
        ))
        .await?;

        let receipt = PostedReceipt {
            document_id,
            company_id: company_id.clone(),
            document_type,
            document_no,
            posted_by,
            posted_at,
            lines: all_lines,
            totals,
            cost_entry,
            warnings,
            attempts: 0,
        };
        finish(unit, cancel, receipt).await
    }

    // ========== Voids and corrections ==========

    /// Voids a posted document: appends offsetting lines dated `void_date`,
    /// voids its cost-layer entry and replays the chain, and unwinds its
    /// payment applications.
    ///
    /// # Errors
    ///
    /// `InvalidStatus` unless posted, `InvalidDocument` if payments were
    /// applied to it, `PeriodClosed` for the void month, a replayed cost
    /// entry's inventory month or a downstream sale's month.
    pub async fn void_document(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
        voided_by: UserId,
        void_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<VoidReceipt, PostingError> {
        let (receipt, _) = self
            .strategy
            .run("void_document", cancel, |_| {
                self.void_once(company_id, document_id, voided_by, void_date, cancel)
            })
            .await?;
        log_warnings(&receipt.warnings);
        info!(
            document_id = %document_id,
            company_id = %company_id,
            document_no = %receipt.document_no,
            lines = receipt.lines.len(),
            "Document voided"
        );
        Ok(receipt)
    }

    async fn void_once(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
        voided_by: UserId,
        void_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<VoidReceipt, PostingError> {
        let mut unit = self.store.begin().await?;
        let mut document = load(&mut unit, company_id, document_id).await?;
        document
            .status
            .transition(DocumentStatus::Voided)
            .map_err(|e| {
                PostingError::from_status(
                    e,
                    document_id,
                    document.document_no.clone(),
                    document.status,
                    "void",
                )
            })?;
        if document.amount_paid > Decimal::ZERO {
            return Err(PostingError::InvalidDocument(format!(
                "{} has {} applied against it; void the settling documents first",
                document.reference(),
                document.amount_paid
            )));
        }

        let guard = period_guard(&mut unit, company_id).await?;
        guard.ensure_open(document.module(), void_date)?;

        let original = unit.lines_for_document(company_id, document_id).await?;
        let mut lines = reverse_lines(&original, void_date);

        let mut cost_entries = Vec::new();
        let mut warnings = Vec::new();
        if document.document_type().affects_inventory_cost() {
            if let Some(product_code) = document.body.product_code() {
                let loaded = unit.lock_chain(company_id, product_code).await?;
                let mut chain = CostChain::new(company_id.clone(), product_code, loaded);
                let outcome = chain.void_document(document_id)?;
                guard.ensure_all_open(Module::Inventory, changed_dates(&outcome.changes))?;
                lines.extend(
                    self.sale_adjustments(&mut unit, &guard, company_id, Some(document_id), &outcome.changes)
                        .await?,
                );
                cost_entries = outcome.entries_to_persist();
                warnings = outcome.warnings;
            }
        }

        let mut touched = Vec::new();
        for application in document.body.payment_applications() {
            let mut target = load(&mut unit, company_id, application.document_id).await?;
            target.amount_paid = (target.amount_paid - application.amount).max(Decimal::ZERO);
            touched.push(target);
        }
        if let DocumentBody::CreditMemo(memo) = &document.body {
            let mut invoice = load(&mut unit, company_id, memo.sales_invoice_id).await?;
            invoice.amount_paid =
                (invoice.amount_paid - document.body.gross_amount()).max(Decimal::ZERO);
            touched.push(invoice);
        }

        validate_lines(&lines)?;
        balances::apply_lines(&mut unit, &lines).await?;
        unit.append_lines(&lines).await?;
        unit.save_entries(&cost_entries).await?;
        for target in &touched {
            unit.update_document(target).await?;
        }

        let now = Utc::now();
        let status = document.status;
        document.mark_voided(voided_by, now).map_err(|e| {
            PostingError::from_status(e, document_id, document.document_no.clone(), status, "void")
        })?;
        unit.update_document(&document).await?;
        let document_no = document.reference();
        unit.record_activity(&AuditEntry::new(
            company_id,
            voided_by,
            format!("Voided {} {document_no}", document.document_type()),
            Some(document.document_type()),
            now,
        ))
        .await?;

        let receipt = VoidReceipt {
            document_id,
            document_no,
            lines,
            cost_entries,
            warnings,
        };
        finish(unit, cancel, receipt).await
    }

    /// Revises the unit cost of a posted receiving report. The purchase's
    /// cost layer is corrected, the chain replayed forward, and a balanced
    /// correction is posted: inventory, input VAT and payables for the
    /// purchase on its own date, and cost of sales against inventory for
    /// every later sale whose consumed cost changed, each on the sale's date.
    ///
    /// # Errors
    ///
    /// `InvalidStatus` unless posted, `InvalidDocument` for other types or
    /// when more has been paid than the revised total, `PeriodClosed` if any
    /// affected month is closed, inventory included.
    pub async fn revise_purchase_cost(
        &self,
        company_id: &CompanyId,
        receiving_report_id: DocumentId,
        new_unit_cost: Decimal,
        revised_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<CostCorrection, PostingError> {
        if new_unit_cost < Decimal::ZERO {
            return Err(CostingError::InvalidCost(new_unit_cost).into());
        }
        let (correction, _) = self
            .strategy
            .run("revise_purchase_cost", cancel, |_| {
                self.revise_once(company_id, receiving_report_id, new_unit_cost, revised_by, cancel)
            })
            .await?;
        log_warnings(&correction.warnings);
        info!(
            document_id = %receiving_report_id,
            company_id = %company_id,
            new_unit_cost = %new_unit_cost,
            lines = correction.lines.len(),
            entries = correction.cost_entries.len(),
            "Purchase cost revised"
        );
        Ok(correction)
    }

    async fn revise_once(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
        new_unit_cost: Decimal,
        revised_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<CostCorrection, PostingError> {
        let mut unit = self.store.begin().await?;
        let mut document = load(&mut unit, company_id, document_id).await?;
        if document.status != DocumentStatus::Posted {
            return Err(PostingError::InvalidStatus {
                document_id,
                status: document.status,
                action: "revise cost of",
            });
        }
        let document_type = document.document_type();
        let DocumentBody::ReceivingReport(receipt) = &mut document.body else {
            return Err(PostingError::InvalidDocument(format!(
                "only receiving reports carry a purchase cost, got {document_type}"
            )));
        };
        let old_unit_cost = receipt.unit_cost;
        if old_unit_cost == new_unit_cost {
            return Ok(CostCorrection::default());
        }
        receipt.unit_cost = new_unit_cost;
        let product_code = receipt.product_code.clone();
        let new_total = split_vat(receipt.quantity * new_unit_cost, receipt.vat).net;
        if document.outstanding_amount() < Decimal::ZERO {
            return Err(PostingError::InvalidDocument(format!(
                "{} has {} paid against it, more than its revised total {}",
                document.reference(),
                document.amount_paid,
                document.body.gross_amount()
            )));
        }

        let guard = period_guard(&mut unit, company_id).await?;
        guard.ensure_open(document.module(), document.transaction_date)?;

        let loaded = unit.lock_chain(company_id, &product_code).await?;
        let mut chain = CostChain::new(company_id.clone(), product_code, loaded);
        let entry_id = chain
            .entries()
            .iter()
            .find(|e| e.source_document_id == document_id && !e.is_voided)
            .map(|e| e.id)
            .ok_or(CostingError::NoEntryForDocument(document_id))?;
        let outcome = chain.revise_purchase(entry_id, new_total)?;
        guard.ensure_all_open(Module::Inventory, changed_dates(&outcome.changes))?;

        let mut lines =
            self.rules
                .purchase_revision_lines(&document, old_unit_cost, document.transaction_date)?;
        lines.extend(
            self.sale_adjustments(&mut unit, &guard, company_id, Some(document_id), &outcome.changes)
                .await?,
        );
        validate_lines(&lines)?;

        let cost_entries = outcome.entries_to_persist();
        balances::apply_lines(&mut unit, &lines).await?;
        unit.append_lines(&lines).await?;
        unit.save_entries(&cost_entries).await?;
        unit.update_document(&document).await?;
        unit.record_activity(&AuditEntry::new(
            company_id,
            revised_by,
            format!(
                "Revised cost of {} from {old_unit_cost} to {new_unit_cost}",
                document.reference()
            ),
            Some(document_type),
            Utc::now(),
        ))
        .await?;

        let correction = CostCorrection {
            lines,
            cost_entries,
            warnings: outcome.warnings,
        };
        finish(unit, cancel, correction).await
    }

    /// Replays a product's cost chain from `from_date` and posts cost of
    /// sales adjustments for any sale whose consumed cost differs from what
    /// was stored.
    ///
    /// # Errors
    ///
    /// `UnknownProduct`, `PeriodClosed` when `from_date` or a replayed
    /// entry falls in a closed inventory month or an affected sale's month is
    /// closed.
    pub async fn recalculate_inventory_cost(
        &self,
        company_id: &CompanyId,
        product_code: &str,
        from_date: NaiveDate,
        requested_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<CostCorrection, PostingError> {
        self.rules.accounts().product(product_code)?;
        let (correction, _) = self
            .strategy
            .run("recalculate_inventory_cost", cancel, |_| {
                self.recalculate_once(company_id, product_code, from_date, requested_by, cancel)
            })
            .await?;
        log_warnings(&correction.warnings);
        info!(
            company_id = %company_id,
            product_code,
            from_date = %from_date,
            entries = correction.cost_entries.len(),
            lines = correction.lines.len(),
            "Inventory cost recalculated"
        );
        Ok(correction)
    }

    async fn recalculate_once(
        &self,
        company_id: &CompanyId,
        product_code: &str,
        from_date: NaiveDate,
        requested_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<CostCorrection, PostingError> {
        let mut unit = self.store.begin().await?;
        let guard = period_guard(&mut unit, company_id).await?;
        guard.ensure_open(Module::Inventory, from_date)?;
        let loaded = unit.lock_chain(company_id, product_code).await?;
        let mut chain = CostChain::new(company_id.clone(), product_code, loaded);
        let outcome = chain.recalculate_from_date(from_date);
        guard.ensure_all_open(Module::Inventory, changed_dates(&outcome.changes))?;

        let lines = self
            .sale_adjustments(&mut unit, &guard, company_id, None, &outcome.changes)
            .await?;
        validate_lines(&lines)?;

        let cost_entries = outcome.entries_to_persist();
        if !cost_entries.is_empty() {
            balances::apply_lines(&mut unit, &lines).await?;
            unit.append_lines(&lines).await?;
            unit.save_entries(&cost_entries).await?;
            unit.record_activity(&AuditEntry::new(
                company_id,
                requested_by,
                format!("Recalculated {product_code} cost from {from_date}"),
                None,
                Utc::now(),
            ))
            .await?;
        }

        let correction = CostCorrection {
            lines,
            cost_entries,
            warnings: outcome.warnings,
        };
        finish(unit, cancel, correction).await
    }

    /// Cost of sales adjustments for replayed sales whose consumed cost
    /// changed. Entries of `origin` and voided entries are skipped: their
    /// lines are handled by the caller.
    async fn sale_adjustments(
        &self,
        unit: &mut S::Unit,
        guard: &PeriodGuard,
        company_id: &CompanyId,
        origin: Option<DocumentId>,
        changes: &[EntryChange],
    ) -> Result<Vec<LedgerLine>, PostingError> {
        let mut lines = Vec::new();
        for change in changes {
            let entry = &change.after;
            if entry.movement.is_purchase()
                || entry.is_voided
                || change.before.is_voided
                || Some(entry.source_document_id) == origin
                || change.total_delta().is_zero()
            {
                continue;
            }
            guard.ensure_open(DocumentType::SalesInvoice.module(), entry.date)?;
            let sale = load(unit, company_id, entry.source_document_id).await?;
            lines.extend(self.rules.cost_adjustment_lines(change, &sale.reference())?);
        }
        Ok(lines)
    }

    // ========== Numbering & periods ==========

    /// Issues the next document number for `(company, type)` on its own.
    /// The number is consumed even if no document ever carries it.
    ///
    /// # Errors
    ///
    /// `SequenceExhausted` or a store error.
    pub async fn generate_document_number(
        &self,
        company_id: &CompanyId,
        document_type: DocumentType,
        cancel: &CancellationToken,
    ) -> Result<String, PostingError> {
        let (number, _) = self
            .strategy
            .run("generate_document_number", cancel, |_| async move {
                let mut unit = self.store.begin().await?;
                let number = numbering::issue_number(
                    &mut unit,
                    company_id,
                    document_type,
                    self.sequence_attempts,
                )
                .await?;
                finish(unit, cancel, number).await
            })
            .await?;
        Ok(number)
    }

    /// Whether `module` (or the general ledger) is closed for `date`.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub async fn is_period_closed(
        &self,
        company_id: &CompanyId,
        module: Module,
        date: NaiveDate,
    ) -> Result<bool, PostingError> {
        let mut unit = self.store.begin().await?;
        Ok(period_guard(&mut unit, company_id)
            .await?
            .is_closed(module, date))
    }

    /// Closes `(module, year, month)`. Closing is idempotent. Closing the
    /// general ledger also closes that month's balance rows.
    ///
    /// # Errors
    ///
    /// `InvalidPeriod` for a bad month, or a store error.
    pub async fn close_period(
        &self,
        company_id: &CompanyId,
        module: Module,
        year: i32,
        month: u32,
        closed_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<PostedPeriod, PostingError> {
        let period = FiscalPeriod::new(year, month)?;
        let (row, _) = self
            .strategy
            .run("close_period", cancel, |_| {
                self.close_once(company_id, module, period, closed_by, cancel)
            })
            .await?;
        Ok(row)
    }

    async fn close_once(
        &self,
        company_id: &CompanyId,
        module: Module,
        period: FiscalPeriod,
        closed_by: UserId,
        cancel: &CancellationToken,
    ) -> Result<PostedPeriod, PostingError> {
        let mut unit = self.store.begin().await?;
        unit.lock_periods(company_id).await?;
        let periods = unit.posted_periods(company_id).await?;
        let existing = periods
            .iter()
            .find(|p| p.module == module && p.period == period);
        let now = Utc::now();

        let row = match plan_close(existing, company_id, module, period, closed_by, now) {
            CloseAction::Insert(row) | CloseAction::Flip(row) => row,
            CloseAction::AlreadyClosed => {
                info!(company_id = %company_id, module = %module, period = %period, "Period already closed");
                return Ok(existing.cloned().unwrap_or_else(|| PostedPeriod {
                    company_id: company_id.clone(),
                    module,
                    period,
                    is_posted: true,
                    posted_by: None,
                    posted_at: None,
                }));
            }
        };

        unit.save_period(&row).await?;
        let mut closed_rows = 0;
        if module == Module::Gl {
            closed_rows = unit.close_balance_rows(company_id, period).await?;
        }
        unit.record_activity(&AuditEntry::new(
            company_id,
            closed_by,
            format!("Closed {module} {period}"),
            None,
            now,
        ))
        .await?;
        let row = finish(unit, cancel, row).await?;
        info!(
            company_id = %company_id,
            module = %module,
            period = %period,
            balance_rows_closed = closed_rows,
            "Period closed"
        );
        Ok(row)
    }

    // ========== Queries ==========

    /// Loads a document.
    ///
    /// # Errors
    ///
    /// `DocumentNotFound` if absent from the company.
    pub async fn get_document(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
    ) -> Result<Document, PostingError> {
        let mut unit = self.store.begin().await?;
        load(&mut unit, company_id, document_id).await
    }

    /// Account-level balance for a month. A month without activity carries
    /// the latest earlier ending balance.
    ///
    /// # Errors
    ///
    /// `InvalidPeriod` for a bad month, or a store error.
    pub async fn get_account_balance(
        &self,
        company_id: &CompanyId,
        account_no: &str,
        year: i32,
        month: u32,
    ) -> Result<AccountPeriodBalance, PostingError> {
        let period = FiscalPeriod::new(year, month)?;
        let mut unit = self.store.begin().await?;
        balances::account_balance(&mut unit, company_id, account_no, period).await
    }

    /// Sub-account balance for a month.
    ///
    /// # Errors
    ///
    /// `InvalidPeriod` for a bad month, or a store error.
    pub async fn get_sub_account_balance(
        &self,
        company_id: &CompanyId,
        account_no: &str,
        sub_account: &SubAccount,
        year: i32,
        month: u32,
    ) -> Result<SubAccountPeriodBalance, PostingError> {
        let period = FiscalPeriod::new(year, month)?;
        let mut unit = self.store.begin().await?;
        balances::sub_account_balance(&mut unit, company_id, account_no, sub_account, period).await
    }

    /// Every ledger line referencing a document.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub async fn ledger_lines_for(
        &self,
        company_id: &CompanyId,
        document_id: DocumentId,
    ) -> Result<Vec<LedgerLine>, PostingError> {
        let mut unit = self.store.begin().await?;
        Ok(unit.lines_for_document(company_id, document_id).await?)
    }

    /// A product's cost chain in order.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub async fn cost_layer(
        &self,
        company_id: &CompanyId,
        product_code: &str,
    ) -> Result<Vec<CostLayerEntry>, PostingError> {
        let mut unit = self.store.begin().await?;
        let loaded = unit.lock_chain(company_id, product_code).await?;
        Ok(CostChain::new(company_id.clone(), product_code, loaded).into_entries())
    }
}

async fn load<U: UnitOfWork>(
    unit: &mut U,
    company_id: &CompanyId,
    document_id: DocumentId,
) -> Result<Document, PostingError> {
    unit.get_document(company_id, document_id)
        .await?
        .ok_or(PostingError::DocumentNotFound(document_id))
}

async fn period_guard<U: UnitOfWork>(
    unit: &mut U,
    company_id: &CompanyId,
) -> Result<PeriodGuard, PostingError> {
    let periods = unit.posted_periods(company_id).await?;
    Ok(PeriodGuard::new(&periods))
}

/// Dates of the cost-layer entries an operation rewrites.
fn changed_dates(changes: &[EntryChange]) -> impl Iterator<Item = NaiveDate> + '_ {
    changes.iter().map(|change| change.after.date)
}

/// Commits unless cancelled. Dropping the unit rolls it back.
async fn finish<U: UnitOfWork, T>(
    unit: U,
    cancel: &CancellationToken,
    value: T,
) -> Result<T, PostingError> {
    if cancel.is_cancelled() {
        return Err(PostingError::Cancelled);
    }
    unit.commit().await?;
    Ok(value)
}

fn log_warnings(warnings: &[NegativeInventoryWarning]) {
    for warning in warnings {
        warn!(
            company_id = %warning.company_id,
            product_code = %warning.product_code,
            document_id = %warning.source_document_id,
            date = %warning.date,
            resulting_balance = %warning.resulting_balance,
            "Inventory balance went negative"
        );
    }
}
