//! Per-document posting rules.
//!
//! | Document | Lines |
//! |---|---|
//! | Receiving report | Dr Inventory (net), Dr Input VAT / Cr AP-Trade (gross) |
//! | Sales invoice | Dr AR-Trade (gross) / Cr Sales (net), Cr Output VAT; Dr COGS / Cr Inventory |
//! | Service invoice | Dr AR-Non Trade (gross) / Cr Service Income (net), Cr Output VAT |
//! | Collection receipt | Dr Cash, Dr CWT / Cr AR per settled invoice |
//! | Check voucher | Dr AP-Trade / Cr Cash, Cr EWT; or the voucher's own lines |
//! | Journal voucher | The voucher's own lines |
//! | Credit memo | Dr Sales, Dr Output VAT / Cr AR-Trade |
//! | Debit memo | Dr AR-Trade / Cr Sales, Cr Output VAT |
//! | Bienes placement | Dr Short-term Placements / Cr Cash |
//!
//! Purchase orders, customer order slips, delivery receipts and authorities to
//! load produce no lines.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::types::{round_money, CompanyId, DocumentId, LedgerLineId};

use super::accounts::{
    Account, AccountTable, AP_TRADE, AR_NON_TRADE, AR_TRADE, CASH_IN_BANK,
    CREDITABLE_WITHHOLDING_TAX, EWT_PAYABLE, INPUT_VAT, OUTPUT_VAT, SERVICE_INCOME,
    SHORT_TERM_PLACEMENTS,
};
use super::error::PostingError;
use super::tax::{split_vat, withholding_tax, WithholdingKind};
use crate::costing::{CostMovement, EntryChange};
use crate::document::{
    CheckVoucherKind, Document, DocumentBody, DocumentStatus, DocumentType, ManualEntry, Party,
    VatTreatment,
};
use crate::ledger::{LedgerLine, SubAccount, SubAccountType};

/// A posted document being settled by a collection or check voucher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledDocument {
    /// The settled document.
    pub document_id: DocumentId,
    /// Its type.
    pub document_type: DocumentType,
    /// Its number.
    pub reference_no: String,
    /// VAT treatment of the settled amount.
    pub vat: VatTreatment,
    /// Gross amount settled.
    pub amount: Decimal,
}

impl SettledDocument {
    fn withholding_kind(&self) -> WithholdingKind {
        if self.document_type == DocumentType::ServiceInvoice {
            WithholdingKind::Services
        } else {
            WithholdingKind::Goods
        }
    }
}

/// Everything the rules need besides the document itself.
#[derive(Debug, Clone, Copy)]
pub struct PostingContext<'a> {
    /// The document being posted.
    pub document: &'a Document,
    /// Its (possibly just assigned) number.
    pub document_no: &'a str,
    /// Cost consumed by a sales invoice, from the cost chain.
    pub consumed_cost: Decimal,
    /// Documents settled by a collection or trade check voucher.
    pub settlements: &'a [SettledDocument],
}

/// Stateless rule set over an account table.
#[derive(Debug, Clone, Default)]
pub struct PostingRules {
    accounts: AccountTable,
}

impl PostingRules {
    /// Creates rules over an account table.
    #[must_use]
    pub const fn new(accounts: AccountTable) -> Self {
        Self { accounts }
    }

    /// The account table.
    #[must_use]
    pub const fn accounts(&self) -> &AccountTable {
        &self.accounts
    }

    /// Cost movement a document causes when posted, as `(product, movement)`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProduct` if the product has no account mapping.
    pub fn cost_movement(
        &self,
        document: &Document,
    ) -> Result<Option<(String, CostMovement)>, PostingError> {
        match &document.body {
            DocumentBody::ReceivingReport(rr) => {
                self.accounts.product(&rr.product_code)?;
                let split = split_vat(rr.quantity * rr.unit_cost, rr.vat);
                Ok(Some((
                    rr.product_code.clone(),
                    CostMovement::Purchase {
                        quantity: rr.quantity,
                        total_cost: split.net,
                    },
                )))
            }
            DocumentBody::SalesInvoice(si) => {
                self.accounts.product(&si.product_code)?;
                Ok(Some((
                    si.product_code.clone(),
                    CostMovement::Sale {
                        quantity: si.quantity,
                    },
                )))
            }
            _ => Ok(None),
        }
    }

    /// Builds the lines for a document.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProduct` for unmapped products and `InvalidDocument`
    /// when a settlement does not match the document.
    pub fn build_lines(&self, ctx: &PostingContext<'_>) -> Result<Vec<LedgerLine>, PostingError> {
        let doc = ctx.document;
        let mut lines = LineBuilder::for_document(doc, ctx.document_no);

        match &doc.body {
            DocumentBody::PurchaseOrder(_)
            | DocumentBody::CustomerOrderSlip(_)
            | DocumentBody::DeliveryReceipt(_)
            | DocumentBody::AuthorityToLoad(_) => {}

            DocumentBody::ReceivingReport(rr) => {
                let product = self.accounts.product(&rr.product_code)?;
                let split = split_vat(rr.quantity * rr.unit_cost, rr.vat);
                let supplier = supplier(&rr.supplier);
                lines.describe(format!(
                    "Receipt of {} {} from {}",
                    rr.quantity, product.name, rr.supplier.name
                ));
                lines
                    .debit(product.inventory, split.net, None)
                    .debit(INPUT_VAT, split.vat, None)
                    .credit(AP_TRADE, split.gross, Some(supplier));
            }

            DocumentBody::SalesInvoice(si) => {
                let product = self.accounts.product(&si.product_code)?;
                let split = split_vat(si.quantity * si.unit_price, si.vat);
                lines.describe(format!(
                    "Sale of {} {} to {}",
                    si.quantity, product.name, si.customer.name
                ));
                lines
                    .debit(AR_TRADE, split.gross, Some(customer(&si.customer)))
                    .credit(product.sales, split.net, None)
                    .credit(OUTPUT_VAT, split.vat, None)
                    .debit(product.cogs, ctx.consumed_cost, None)
                    .credit(product.inventory, ctx.consumed_cost, None);
            }

            DocumentBody::ServiceInvoice(sv) => {
                let split = split_vat(sv.amount, sv.vat);
                lines.describe(format!("{} - {}", sv.description, sv.customer.name));
                lines
                    .debit(AR_NON_TRADE, split.gross, Some(customer(&sv.customer)))
                    .credit(SERVICE_INCOME, split.net, None)
                    .credit(OUTPUT_VAT, split.vat, None);
            }

            DocumentBody::CollectionReceipt(cr) => {
                check_settlements(doc, ctx.settlements)?;
                lines.describe(format!("Collection from {}", cr.customer.name));
                let mut cash = Decimal::ZERO;
                let mut withheld = Decimal::ZERO;
                for settled in ctx.settlements {
                    let cwt = if cr.withholding {
                        withholding_tax(
                            split_vat(settled.amount, settled.vat).net,
                            settled.withholding_kind(),
                        )
                    } else {
                        Decimal::ZERO
                    };
                    cash += settled.amount - cwt;
                    withheld += cwt;
                }
                lines
                    .debit(CASH_IN_BANK, cash, Some(bank(&cr.bank)))
                    .debit(CREDITABLE_WITHHOLDING_TAX, withheld, None);
                for settled in ctx.settlements {
                    let receivable = if settled.document_type == DocumentType::ServiceInvoice {
                        AR_NON_TRADE
                    } else {
                        AR_TRADE
                    };
                    lines.credit(receivable, settled.amount, Some(customer(&cr.customer)));
                }
            }

            DocumentBody::CheckVoucher(cv) => match &cv.kind {
                CheckVoucherKind::Trade { withholding, .. } => {
                    check_settlements(doc, ctx.settlements)?;
                    lines.describe(format!("Payment to {}", cv.payee.name));
                    let mut paid = Decimal::ZERO;
                    let mut withheld = Decimal::ZERO;
                    for settled in ctx.settlements {
                        let ewt = if *withholding {
                            withholding_tax(
                                split_vat(settled.amount, settled.vat).net,
                                settled.withholding_kind(),
                            )
                        } else {
                            Decimal::ZERO
                        };
                        lines.debit(AP_TRADE, settled.amount, Some(supplier(&cv.payee)));
                        paid += settled.amount - ewt;
                        withheld += ewt;
                    }
                    lines
                        .credit(CASH_IN_BANK, paid, Some(bank(&cv.bank)))
                        .credit(EWT_PAYABLE, withheld, None);
                }
                CheckVoucherKind::NonTrade { entries } => {
                    lines.describe(format!("Payment to {}", cv.payee.name));
                    for entry in entries {
                        lines.manual(entry);
                    }
                }
            },

            DocumentBody::JournalVoucher(jv) => {
                lines.describe(jv.particulars.clone());
                for entry in &jv.entries {
                    lines.manual(entry);
                }
            }

            DocumentBody::CreditMemo(memo) => {
                let product = self.accounts.product(&memo.product_code)?;
                let split = split_vat(memo.amount, memo.vat);
                lines.describe(format!("Credit memo to {}", memo.customer.name));
                lines
                    .debit(product.sales, split.net, None)
                    .debit(OUTPUT_VAT, split.vat, None)
                    .credit(AR_TRADE, split.gross, Some(customer(&memo.customer)));
            }

            DocumentBody::DebitMemo(memo) => {
                let product = self.accounts.product(&memo.product_code)?;
                let split = split_vat(memo.amount, memo.vat);
                lines.describe(format!("Debit memo to {}", memo.customer.name));
                lines
                    .debit(AR_TRADE, split.gross, Some(customer(&memo.customer)))
                    .credit(product.sales, split.net, None)
                    .credit(OUTPUT_VAT, split.vat, None);
            }

            DocumentBody::BienesPlacement(bp) => {
                lines.describe(format!("Placement with {} until {}", bp.bank.name, bp.maturity_date));
                lines
                    .debit(SHORT_TERM_PLACEMENTS, bp.amount, Some(bank(&bp.bank)))
                    .credit(CASH_IN_BANK, bp.amount, Some(bank(&bp.bank)));
            }
        }

        Ok(lines.finish())
    }

    /// Checks that `target` can be settled by `payment` for `amount`.
    ///
    /// Collections settle posted sales invoices, service invoices and debit
    /// memos of the same customer; trade check vouchers settle posted
    /// receiving reports of the same supplier. Overpayment is rejected.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` describing the mismatch.
    pub fn settle(
        &self,
        payment: &Document,
        target: &Document,
        amount: Decimal,
    ) -> Result<SettledDocument, PostingError> {
        let allowed: &[DocumentType] = match &payment.body {
            DocumentBody::CollectionReceipt(_) => &[
                DocumentType::SalesInvoice,
                DocumentType::ServiceInvoice,
                DocumentType::DebitMemo,
            ],
            DocumentBody::CheckVoucher(_) => &[DocumentType::ReceivingReport],
            _ => &[],
        };
        let target_type = target.document_type();
        if !allowed.contains(&target_type) {
            return Err(PostingError::InvalidDocument(format!(
                "{} cannot settle a {target_type}",
                payment.document_type()
            )));
        }
        ensure_posted_sibling(payment, target)?;

        if counterparty(&payment.body) != counterparty(&target.body) {
            return Err(PostingError::InvalidDocument(format!(
                "{} {} belongs to another counterparty",
                target_type,
                target.reference()
            )));
        }

        let outstanding = target.outstanding_amount();
        if amount > outstanding {
            return Err(PostingError::InvalidDocument(format!(
                "applying {amount} to {} exceeds its outstanding balance of {outstanding}",
                target.reference()
            )));
        }

        Ok(SettledDocument {
            document_id: target.id,
            document_type: target_type,
            reference_no: target.reference(),
            vat: vat_treatment(&target.body),
            amount: round_money(amount),
        })
    }

    /// Checks a credit or debit memo against the invoice it adjusts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` when the invoice is not a posted sales
    /// invoice of the same customer, or a credit exceeds what is still owed.
    pub fn check_memo_target(memo: &Document, invoice: &Document) -> Result<(), PostingError> {
        let (DocumentBody::CreditMemo(adjustment) | DocumentBody::DebitMemo(adjustment)) =
            &memo.body
        else {
            return Ok(());
        };
        if invoice.document_type() != DocumentType::SalesInvoice {
            return Err(PostingError::InvalidDocument(format!(
                "{} can only adjust a sales invoice",
                memo.document_type()
            )));
        }
        ensure_posted_sibling(memo, invoice)?;
        if counterparty(&invoice.body) != Some(adjustment.customer.code.as_str()) {
            return Err(PostingError::InvalidDocument(format!(
                "sales invoice {} belongs to another customer",
                invoice.reference()
            )));
        }
        if memo.document_type() == DocumentType::CreditMemo
            && adjustment.amount > invoice.outstanding_amount()
        {
            return Err(PostingError::InvalidDocument(format!(
                "credit of {} exceeds sales invoice {}",
                adjustment.amount,
                invoice.reference()
            )));
        }
        Ok(())
    }

    /// Correction lines for a receiving report whose unit cost is revised
    /// from `old_unit_cost` to the one now on the document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` for non-receiving reports and
    /// `UnknownProduct` for unmapped products.
    pub fn purchase_revision_lines(
        &self,
        revised: &Document,
        old_unit_cost: Decimal,
        date: NaiveDate,
    ) -> Result<Vec<LedgerLine>, PostingError> {
        let DocumentBody::ReceivingReport(rr) = &revised.body else {
            return Err(PostingError::InvalidDocument(format!(
                "only receiving reports carry a purchase cost, got {}",
                revised.document_type()
            )));
        };
        let product = self.accounts.product(&rr.product_code)?;
        let old = split_vat(rr.quantity * old_unit_cost, rr.vat);
        let new = split_vat(rr.quantity * rr.unit_cost, rr.vat);

        let mut lines = LineBuilder::for_document(revised, &revised.reference());
        lines.date = date;
        lines.describe(format!(
            "Cost revision {} -> {} on {}",
            old_unit_cost,
            rr.unit_cost,
            revised.reference()
        ));
        lines
            .signed(product.inventory, new.net - old.net, None)
            .signed(INPUT_VAT, new.vat - old.vat, None)
            .signed(AP_TRADE, old.gross - new.gross, Some(supplier(&rr.supplier)));
        Ok(lines.finish())
    }

    /// COGS adjustment for a sale whose consumed cost changed in a replay,
    /// dated at the sale.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProduct` for unmapped products.
    pub fn cost_adjustment_lines(
        &self,
        change: &EntryChange,
        sale_reference_no: &str,
    ) -> Result<Vec<LedgerLine>, PostingError> {
        let entry = &change.after;
        let product = self.accounts.product(&entry.product_code)?;
        let delta = change.total_delta();

        let mut lines = LineBuilder::new(LineReference {
            company_id: entry.company_id.clone(),
            document_id: entry.source_document_id,
            reference_no: sale_reference_no.to_string(),
            document_type: DocumentType::SalesInvoice,
            date: entry.date,
        });
        lines.describe(format!(
            "Cost of sales adjustment {} -> {}",
            change.before.total, entry.total
        ));
        lines
            .signed(product.cogs, delta, None)
            .signed(product.inventory, -delta, None);
        Ok(lines.finish())
    }
}

fn check_settlements(doc: &Document, settlements: &[SettledDocument]) -> Result<(), PostingError> {
    let applications = doc.body.payment_applications();
    if applications.len() != settlements.len()
        || applications
            .iter()
            .any(|a| !settlements.iter().any(|s| s.document_id == a.document_id))
    {
        return Err(PostingError::InvalidDocument(format!(
            "settlements of {} do not match its payment applications",
            doc.reference()
        )));
    }
    Ok(())
}

fn ensure_posted_sibling(doc: &Document, target: &Document) -> Result<(), PostingError> {
    if target.company_id != doc.company_id {
        return Err(PostingError::DocumentNotFound(target.id));
    }
    if target.status != DocumentStatus::Posted {
        return Err(PostingError::InvalidDocument(format!(
            "{} {} is {}, not posted",
            target.document_type(),
            target.reference(),
            target.status
        )));
    }
    Ok(())
}

fn counterparty(body: &DocumentBody) -> Option<&str> {
    match body {
        DocumentBody::ReceivingReport(b) => Some(&b.supplier.code),
        DocumentBody::SalesInvoice(b) => Some(&b.customer.code),
        DocumentBody::ServiceInvoice(b) => Some(&b.customer.code),
        DocumentBody::CollectionReceipt(b) => Some(&b.customer.code),
        DocumentBody::CheckVoucher(b) => Some(&b.payee.code),
        DocumentBody::CreditMemo(b) | DocumentBody::DebitMemo(b) => Some(&b.customer.code),
        _ => None,
    }
}

fn vat_treatment(body: &DocumentBody) -> VatTreatment {
    match body {
        DocumentBody::ReceivingReport(b) => b.vat,
        DocumentBody::SalesInvoice(b) => b.vat,
        DocumentBody::ServiceInvoice(b) => b.vat,
        DocumentBody::CreditMemo(b) | DocumentBody::DebitMemo(b) => b.vat,
        _ => VatTreatment::Exempt,
    }
}

fn customer(party: &Party) -> SubAccount {
    SubAccount::new(SubAccountType::Customer, &party.code, &party.name)
}

fn supplier(party: &Party) -> SubAccount {
    SubAccount::new(SubAccountType::Supplier, &party.code, &party.name)
}

fn bank(party: &Party) -> SubAccount {
    SubAccount::new(SubAccountType::BankAccount, &party.code, &party.name)
}

struct LineReference {
    company_id: CompanyId,
    document_id: DocumentId,
    reference_no: String,
    document_type: DocumentType,
    date: NaiveDate,
}

/// Collects lines for one document, dropping zero amounts.
struct LineBuilder {
    reference: LineReference,
    date: NaiveDate,
    description: String,
    lines: Vec<LedgerLine>,
}

impl LineBuilder {
    fn new(reference: LineReference) -> Self {
        Self {
            date: reference.date,
            reference,
            description: String::new(),
            lines: Vec::new(),
        }
    }

    fn for_document(document: &Document, document_no: &str) -> Self {
        Self::new(LineReference {
            company_id: document.company_id.clone(),
            document_id: document.id,
            reference_no: document_no.to_string(),
            document_type: document.document_type(),
            date: document.transaction_date,
        })
    }

    fn describe(&mut self, description: String) {
        self.description = description;
    }

    fn debit(&mut self, account: Account, amount: Decimal, sub: Option<SubAccount>) -> &mut Self {
        self.push(account.account_no, account.title, amount, Decimal::ZERO, sub);
        self
    }

    fn credit(&mut self, account: Account, amount: Decimal, sub: Option<SubAccount>) -> &mut Self {
        self.push(account.account_no, account.title, Decimal::ZERO, amount, sub);
        self
    }

    /// Debits a positive amount, credits the absolute value of a negative one.
    fn signed(&mut self, account: Account, amount: Decimal, sub: Option<SubAccount>) -> &mut Self {
        if amount >= Decimal::ZERO {
            self.debit(account, amount, sub)
        } else {
            self.credit(account, -amount, sub)
        }
    }

    fn manual(&mut self, entry: &ManualEntry) -> &mut Self {
        self.push(
            &entry.account_no,
            &entry.account_title,
            entry.debit,
            entry.credit,
            entry.sub_account.clone(),
        );
        self
    }

    fn push(
        &mut self,
        account_no: &str,
        title: &str,
        debit: Decimal,
        credit: Decimal,
        sub_account: Option<SubAccount>,
    ) {
        let debit = round_money(debit);
        let credit = round_money(credit);
        if debit.is_zero() && credit.is_zero() {
            return;
        }
        self.lines.push(LedgerLine {
            id: LedgerLineId::new(),
            company_id: self.reference.company_id.clone(),
            date: self.date,
            account_no: account_no.to_string(),
            account_title: title.to_string(),
            debit,
            credit,
            reference_document_id: self.reference.document_id,
            reference_no: self.reference.reference_no.clone(),
            document_type: self.reference.document_type,
            description: self.description.clone(),
            sub_account,
        });
    }

    fn finish(self) -> Vec<LedgerLine> {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        CheckVoucher, CollectionReceipt, JournalVoucher, MemoAdjustment, NewDocument,
        PaymentApplication, ReceivingReport, SalesInvoice, ServiceInvoice,
    };
    use crate::ledger::validate_lines;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tally_shared::types::UserId;

    fn draft(body: DocumentBody) -> Document {
        Document::new(
            NewDocument {
                company_id: CompanyId::new("C01"),
                transaction_date: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
                body,
                created_by: UserId::new(),
            },
            Utc::now(),
        )
    }

    fn posted(body: DocumentBody, number: &str) -> Document {
        let mut doc = draft(body);
        doc.document_no = Some(number.to_string());
        doc.mark_posted(UserId::new(), Utc::now()).unwrap();
        doc
    }

    fn receiving_report(quantity: Decimal, unit_cost: Decimal, vat: VatTreatment) -> DocumentBody {
        DocumentBody::ReceivingReport(ReceivingReport {
            supplier: Party::new("SUP-001", "Petron Corporation"),
            product_code: "PET001".to_string(),
            quantity,
            unit_cost,
            vat,
            purchase_order_id: None,
        })
    }

    fn sales_invoice(quantity: Decimal, unit_price: Decimal) -> DocumentBody {
        DocumentBody::SalesInvoice(SalesInvoice {
            customer: Party::new("CUST-001", "Acme Trading"),
            product_code: "PET001".to_string(),
            quantity,
            unit_price,
            vat: VatTreatment::Vatable,
            delivery_receipt_id: None,
        })
    }

    fn build(doc: &Document, consumed: Decimal, settlements: &[SettledDocument]) -> Vec<LedgerLine> {
        PostingRules::default()
            .build_lines(&PostingContext {
                document: doc,
                document_no: "XX-000001",
                consumed_cost: consumed,
                settlements,
            })
            .unwrap()
    }

    fn amount_on(lines: &[LedgerLine], account_no: &str) -> (Decimal, Decimal) {
        lines
            .iter()
            .filter(|l| l.account_no == account_no)
            .fold((Decimal::ZERO, Decimal::ZERO), |(d, c), l| (d + l.debit, c + l.credit))
    }

    #[test]
    fn test_exempt_receiving_report_two_lines() {
        let doc = draft(receiving_report(dec!(1000), dec!(50.00), VatTreatment::Exempt));
        let lines = build(&doc, Decimal::ZERO, &[]);

        assert_eq!(lines.len(), 2);
        assert_eq!(amount_on(&lines, "101040100"), (dec!(50000), Decimal::ZERO));
        assert_eq!(amount_on(&lines, "202010100"), (Decimal::ZERO, dec!(50000)));
        let ap = lines.iter().find(|l| l.account_no == "202010100").unwrap();
        assert_eq!(ap.sub_account.as_ref().unwrap().kind, SubAccountType::Supplier);
    }

    #[test]
    fn test_vatable_receiving_report_splits_input_vat() {
        let doc = draft(receiving_report(dec!(1000), dec!(56), VatTreatment::Vatable));
        let lines = build(&doc, Decimal::ZERO, &[]);
        assert_eq!(amount_on(&lines, "101040100").0, dec!(50000));
        assert_eq!(amount_on(&lines, "101060200").0, dec!(6000));
        assert_eq!(amount_on(&lines, "202010100").1, dec!(56000));
        assert!(validate_lines(&lines).is_ok());

        let (product, movement) = PostingRules::default().cost_movement(&doc).unwrap().unwrap();
        assert_eq!(product, "PET001");
        assert_eq!(
            movement,
            CostMovement::Purchase {
                quantity: dec!(1000),
                total_cost: dec!(50000)
            }
        );
    }

    #[test]
    fn test_sales_invoice_with_cogs() {
        let doc = draft(sales_invoice(dec!(100), dec!(67.20)));
        let lines = build(&doc, dec!(5000), &[]);
        assert_eq!(amount_on(&lines, "101020100").0, dec!(6720));
        assert_eq!(amount_on(&lines, "401010100").1, dec!(6000));
        assert_eq!(amount_on(&lines, "201030100").1, dec!(720));
        assert_eq!(amount_on(&lines, "501010100").0, dec!(5000));
        assert_eq!(amount_on(&lines, "101040100").1, dec!(5000));
        assert!(validate_lines(&lines).is_ok());
    }

    #[test]
    fn test_sales_invoice_without_stock_cost_skips_zero_lines() {
        let doc = draft(sales_invoice(dec!(1), dec!(112)));
        let lines = build(&doc, Decimal::ZERO, &[]);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_unknown_product() {
        let mut body = sales_invoice(dec!(1), dec!(1));
        if let DocumentBody::SalesInvoice(si) = &mut body {
            si.product_code = "PET999".to_string();
        }
        let doc = draft(body);
        let result = PostingRules::default().build_lines(&PostingContext {
            document: &doc,
            document_no: "SI-000001",
            consumed_cost: Decimal::ZERO,
            settlements: &[],
        });
        assert!(matches!(result, Err(PostingError::UnknownProduct(_))));
    }

    #[test]
    fn test_collection_with_withholding() {
        let invoice = posted(sales_invoice(dec!(100), dec!(67.20)), "SI-000001");
        let service = posted(
            DocumentBody::ServiceInvoice(ServiceInvoice {
                customer: Party::new("CUST-001", "Acme Trading"),
                description: "Hauling".to_string(),
                amount: dec!(1120),
                vat: VatTreatment::Vatable,
            }),
            "SV-000001",
        );
        let receipt = draft(DocumentBody::CollectionReceipt(CollectionReceipt {
            customer: Party::new("CUST-001", "Acme Trading"),
            bank: Party::new("BDO-01", "BDO Checking"),
            applications: vec![
                PaymentApplication {
                    document_id: invoice.id,
                    amount: dec!(6720),
                },
                PaymentApplication {
                    document_id: service.id,
                    amount: dec!(1120),
                },
            ],
            withholding: true,
        }));

        let rules = PostingRules::default();
        let settlements = vec![
            rules.settle(&receipt, &invoice, dec!(6720)).unwrap(),
            rules.settle(&receipt, &service, dec!(1120)).unwrap(),
        ];
        let lines = build(&receipt, Decimal::ZERO, &settlements);

        // 1% of 6000 for goods, 2% of 1000 for services.
        assert_eq!(amount_on(&lines, "101060400").0, dec!(80));
        assert_eq!(amount_on(&lines, "101010100").0, dec!(7760));
        assert_eq!(amount_on(&lines, "101020100").1, dec!(6720));
        assert_eq!(amount_on(&lines, "101020500").1, dec!(1120));
        assert!(validate_lines(&lines).is_ok());
    }

    #[test]
    fn test_settle_rejects_overpayment_and_wrong_customer() {
        let invoice = posted(sales_invoice(dec!(10), dec!(112)), "SI-000001");
        let receipt = draft(DocumentBody::CollectionReceipt(CollectionReceipt {
            customer: Party::new("CUST-001", "Acme Trading"),
            bank: Party::new("BDO-01", "BDO Checking"),
            applications: vec![PaymentApplication {
                document_id: invoice.id,
                amount: dec!(2000),
            }],
            withholding: false,
        }));
        let rules = PostingRules::default();
        assert!(matches!(
            rules.settle(&receipt, &invoice, dec!(2000)),
            Err(PostingError::InvalidDocument(_))
        ));

        let other = draft(DocumentBody::CollectionReceipt(CollectionReceipt {
            customer: Party::new("CUST-002", "Other"),
            bank: Party::new("BDO-01", "BDO Checking"),
            applications: vec![],
            withholding: false,
        }));
        assert!(rules.settle(&other, &invoice, dec!(10)).is_err());
    }

    #[test]
    fn test_settle_rejects_pending_target() {
        let pending = draft(sales_invoice(dec!(10), dec!(112)));
        let receipt = draft(DocumentBody::CollectionReceipt(CollectionReceipt {
            customer: Party::new("CUST-001", "Acme Trading"),
            bank: Party::new("BDO-01", "BDO Checking"),
            applications: vec![],
            withholding: false,
        }));
        assert!(PostingRules::default()
            .settle(&receipt, &pending, dec!(10))
            .is_err());
    }

    #[test]
    fn test_trade_check_voucher_withholds_ewt() {
        let rr = posted(
            receiving_report(dec!(1000), dec!(56), VatTreatment::Vatable),
            "RR-000001",
        );
        let cv = draft(DocumentBody::CheckVoucher(CheckVoucher {
            bank: Party::new("BDO-01", "BDO Checking"),
            payee: Party::new("SUP-001", "Petron Corporation"),
            kind: CheckVoucherKind::Trade {
                applications: vec![PaymentApplication {
                    document_id: rr.id,
                    amount: dec!(56000),
                }],
                withholding: true,
            },
        }));
        let settled = PostingRules::default().settle(&cv, &rr, dec!(56000)).unwrap();
        let lines = build(&cv, Decimal::ZERO, &[settled]);

        assert_eq!(amount_on(&lines, "202010100").0, dec!(56000));
        assert_eq!(amount_on(&lines, "201030200").1, dec!(500));
        assert_eq!(amount_on(&lines, "101010100").1, dec!(55500));
        assert!(validate_lines(&lines).is_ok());
    }

    #[test]
    fn test_mismatched_settlements_rejected() {
        let cv = draft(DocumentBody::CheckVoucher(CheckVoucher {
            bank: Party::new("BDO-01", "BDO Checking"),
            payee: Party::new("SUP-001", "Petron Corporation"),
            kind: CheckVoucherKind::Trade {
                applications: vec![PaymentApplication {
                    document_id: DocumentId::new(),
                    amount: dec!(100),
                }],
                withholding: false,
            },
        }));
        let result = PostingRules::default().build_lines(&PostingContext {
            document: &cv,
            document_no: "CV-000001",
            consumed_cost: Decimal::ZERO,
            settlements: &[],
        });
        assert!(matches!(result, Err(PostingError::InvalidDocument(_))));
    }

    #[test]
    fn test_unbalanced_journal_voucher_is_caught_by_checker() {
        let jv = draft(DocumentBody::JournalVoucher(JournalVoucher {
            particulars: "Accrual".to_string(),
            entries: vec![
                ManualEntry {
                    account_no: "601010100".to_string(),
                    account_title: "Rent Expense".to_string(),
                    debit: dec!(100),
                    credit: Decimal::ZERO,
                    sub_account: None,
                },
                ManualEntry {
                    account_no: "202010100".to_string(),
                    account_title: "AP-Trade Payable".to_string(),
                    debit: Decimal::ZERO,
                    credit: dec!(99.99),
                    sub_account: None,
                },
            ],
        }));
        let lines = build(&jv, Decimal::ZERO, &[]);
        assert_eq!(lines.len(), 2);
        assert!(validate_lines(&lines).is_err());
    }

    #[test]
    fn test_memo_lines_and_target_check() {
        let invoice = posted(sales_invoice(dec!(10), dec!(112)), "SI-000001");
        let memo = draft(DocumentBody::CreditMemo(MemoAdjustment {
            customer: Party::new("CUST-001", "Acme Trading"),
            sales_invoice_id: invoice.id,
            product_code: "PET001".to_string(),
            amount: dec!(112),
            vat: VatTreatment::Vatable,
            reason: Some("Short delivery".to_string()),
        }));
        assert!(PostingRules::check_memo_target(&memo, &invoice).is_ok());

        let lines = build(&memo, Decimal::ZERO, &[]);
        assert_eq!(amount_on(&lines, "401010100").0, dec!(100));
        assert_eq!(amount_on(&lines, "201030100").0, dec!(12));
        assert_eq!(amount_on(&lines, "101020100").1, dec!(112));

        let too_big = draft(DocumentBody::CreditMemo(MemoAdjustment {
            customer: Party::new("CUST-001", "Acme Trading"),
            sales_invoice_id: invoice.id,
            product_code: "PET001".to_string(),
            amount: dec!(5000),
            vat: VatTreatment::Vatable,
            reason: None,
        }));
        assert!(PostingRules::check_memo_target(&too_big, &invoice).is_err());
    }

    #[test]
    fn test_purchase_revision_lines() {
        let mut rr = posted(
            receiving_report(dec!(100), dec!(10), VatTreatment::Exempt),
            "RR-000001",
        );
        if let DocumentBody::ReceivingReport(body) = &mut rr.body {
            body.unit_cost = dec!(11);
        }
        let date = NaiveDate::from_ymd_opt(2024, 4, 20).unwrap();
        let lines = PostingRules::default()
            .purchase_revision_lines(&rr, dec!(10), date)
            .unwrap();
        assert_eq!(amount_on(&lines, "101040100"), (dec!(100), Decimal::ZERO));
        assert_eq!(amount_on(&lines, "202010100"), (Decimal::ZERO, dec!(100)));
        assert!(lines.iter().all(|l| l.date == date));
        assert!(validate_lines(&lines).is_ok());
    }
}
