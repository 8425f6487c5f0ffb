//! Type-specific document content.
//!
//! The body is what the posting rules read. It is stored as JSON next to the
//! document header, tagged with the document type.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tally_shared::types::{round_money, DocumentId};

use super::kind::DocumentType;
use crate::ledger::SubAccount;

/// VAT treatment of a gross amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatTreatment {
    /// Gross amount includes 12% VAT.
    #[default]
    Vatable,
    /// No VAT.
    Exempt,
    /// VAT at 0%.
    ZeroRated,
}

/// A counterparty or bank referenced by a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Master-data code.
    pub code: String,
    /// Display name.
    pub name: String,
}

impl Party {
    /// Creates a party.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// A user-entered ledger line (journal vouchers, non-trade check vouchers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualEntry {
    /// Account number.
    pub account_no: String,
    /// Account title.
    pub account_title: String,
    /// Debit amount (zero when crediting).
    #[serde(default)]
    pub debit: Decimal,
    /// Credit amount (zero when debiting).
    #[serde(default)]
    pub credit: Decimal,
    /// Optional sub-ledger tag.
    #[serde(default)]
    pub sub_account: Option<SubAccount>,
}

/// Settlement of part of a posted invoice or receiving report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentApplication {
    /// The document being settled.
    pub document_id: DocumentId,
    /// Gross amount settled, withholding included.
    pub amount: Decimal,
}

/// Purchase order. Posting only assigns a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// Supplier.
    pub supplier: Party,
    /// Product ordered.
    pub product_code: String,
    /// Quantity ordered.
    pub quantity: Decimal,
    /// Agreed unit cost, VAT-inclusive.
    pub unit_cost: Decimal,
    /// Payment terms.
    #[serde(default)]
    pub terms: Option<String>,
}

/// Goods received from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingReport {
    /// Supplier.
    pub supplier: Party,
    /// Product received.
    pub product_code: String,
    /// Quantity received.
    pub quantity: Decimal,
    /// Unit cost as invoiced, VAT-inclusive when vatable.
    pub unit_cost: Decimal,
    /// VAT treatment of the purchase.
    #[serde(default)]
    pub vat: VatTreatment,
    /// Originating purchase order.
    #[serde(default)]
    pub purchase_order_id: Option<DocumentId>,
}

/// Sale of goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesInvoice {
    /// Customer.
    pub customer: Party,
    /// Product sold.
    pub product_code: String,
    /// Quantity sold.
    pub quantity: Decimal,
    /// Unit price, VAT-inclusive when vatable.
    pub unit_price: Decimal,
    /// VAT treatment of the sale.
    #[serde(default)]
    pub vat: VatTreatment,
    /// Delivery receipt the invoice bills.
    #[serde(default)]
    pub delivery_receipt_id: Option<DocumentId>,
}

/// Sale of services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInvoice {
    /// Customer.
    pub customer: Party,
    /// What was rendered.
    pub description: String,
    /// Gross amount.
    pub amount: Decimal,
    /// VAT treatment.
    #[serde(default)]
    pub vat: VatTreatment,
}

/// Money received against posted invoices and debit memos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReceipt {
    /// Customer paying.
    pub customer: Party,
    /// Bank account deposited to.
    pub bank: Party,
    /// Invoices settled.
    pub applications: Vec<PaymentApplication>,
    /// Customer withholds creditable tax.
    #[serde(default)]
    pub withholding: bool,
}

/// Disbursement kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckVoucherKind {
    /// Payment of posted receiving reports.
    Trade {
        /// Receiving reports settled.
        applications: Vec<PaymentApplication>,
        /// Withhold expanded withholding tax.
        #[serde(default)]
        withholding: bool,
    },
    /// Any other payment, entered line by line.
    NonTrade {
        /// The voucher lines.
        entries: Vec<ManualEntry>,
    },
}

/// Check disbursement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckVoucher {
    /// Bank account drawn on.
    pub bank: Party,
    /// Payee.
    pub payee: Party,
    /// Trade or non-trade content.
    #[serde(flatten)]
    pub kind: CheckVoucherKind,
}

/// Manual journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalVoucher {
    /// Narrative.
    pub particulars: String,
    /// The journal lines.
    pub entries: Vec<ManualEntry>,
}

/// Credit or debit memo adjusting a posted sales invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoAdjustment {
    /// Customer.
    pub customer: Party,
    /// Invoice adjusted.
    pub sales_invoice_id: DocumentId,
    /// Product whose sales account is adjusted.
    pub product_code: String,
    /// Gross adjustment.
    pub amount: Decimal,
    /// VAT treatment of the adjustment.
    #[serde(default)]
    pub vat: VatTreatment,
    /// Why.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Goods released to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Customer.
    pub customer: Party,
    /// Product delivered.
    pub product_code: String,
    /// Quantity delivered.
    pub quantity: Decimal,
    /// Order slip being fulfilled.
    #[serde(default)]
    pub customer_order_slip_id: Option<DocumentId>,
}

/// Customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrderSlip {
    /// Customer.
    pub customer: Party,
    /// Product ordered.
    pub product_code: String,
    /// Quantity ordered.
    pub quantity: Decimal,
    /// Quoted unit price.
    pub unit_price: Decimal,
}

/// Authority to load product at a supplier depot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityToLoad {
    /// Supplier.
    pub supplier: Party,
    /// Product to load.
    pub product_code: String,
    /// Quantity to load.
    pub quantity: Decimal,
    /// Depot.
    pub loading_point: String,
    /// Purchase order covered.
    #[serde(default)]
    pub purchase_order_id: Option<DocumentId>,
}

/// Short-term placement of cash with a bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BienesPlacement {
    /// Bank holding the placement.
    pub bank: Party,
    /// Principal.
    pub amount: Decimal,
    /// Maturity.
    pub maturity_date: NaiveDate,
}

/// Type-specific document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentBody {
    /// Purchase order.
    PurchaseOrder(PurchaseOrder),
    /// Receiving report.
    ReceivingReport(ReceivingReport),
    /// Sales invoice.
    SalesInvoice(SalesInvoice),
    /// Service invoice.
    ServiceInvoice(ServiceInvoice),
    /// Check voucher.
    CheckVoucher(CheckVoucher),
    /// Journal voucher.
    JournalVoucher(JournalVoucher),
    /// Collection receipt.
    CollectionReceipt(CollectionReceipt),
    /// Credit memo.
    CreditMemo(MemoAdjustment),
    /// Debit memo.
    DebitMemo(MemoAdjustment),
    /// Delivery receipt.
    DeliveryReceipt(DeliveryReceipt),
    /// Customer order slip.
    CustomerOrderSlip(CustomerOrderSlip),
    /// Authority to load.
    AuthorityToLoad(AuthorityToLoad),
    /// Bienes placement.
    BienesPlacement(BienesPlacement),
}

impl DocumentBody {
    /// The document type this body belongs to.
    #[must_use]
    pub const fn document_type(&self) -> DocumentType {
        match self {
            Self::PurchaseOrder(_) => DocumentType::PurchaseOrder,
            Self::ReceivingReport(_) => DocumentType::ReceivingReport,
            Self::SalesInvoice(_) => DocumentType::SalesInvoice,
            Self::ServiceInvoice(_) => DocumentType::ServiceInvoice,
            Self::CheckVoucher(_) => DocumentType::CheckVoucher,
            Self::JournalVoucher(_) => DocumentType::JournalVoucher,
            Self::CollectionReceipt(_) => DocumentType::CollectionReceipt,
            Self::CreditMemo(_) => DocumentType::CreditMemo,
            Self::DebitMemo(_) => DocumentType::DebitMemo,
            Self::DeliveryReceipt(_) => DocumentType::DeliveryReceipt,
            Self::CustomerOrderSlip(_) => DocumentType::CustomerOrderSlip,
            Self::AuthorityToLoad(_) => DocumentType::AuthorityToLoad,
            Self::BienesPlacement(_) => DocumentType::BienesPlacement,
        }
    }

    /// Product the document moves or prices, if any.
    #[must_use]
    pub fn product_code(&self) -> Option<&str> {
        match self {
            Self::PurchaseOrder(b) => Some(&b.product_code),
            Self::ReceivingReport(b) => Some(&b.product_code),
            Self::SalesInvoice(b) => Some(&b.product_code),
            Self::CreditMemo(b) | Self::DebitMemo(b) => Some(&b.product_code),
            Self::DeliveryReceipt(b) => Some(&b.product_code),
            Self::CustomerOrderSlip(b) => Some(&b.product_code),
            Self::AuthorityToLoad(b) => Some(&b.product_code),
            Self::ServiceInvoice(_)
            | Self::CheckVoucher(_)
            | Self::JournalVoucher(_)
            | Self::CollectionReceipt(_)
            | Self::BienesPlacement(_) => None,
        }
    }

    /// Gross amount of the document, rounded to storage precision.
    ///
    /// For invoices, receiving reports and debit memos this is the amount that
    /// payments are applied against.
    #[must_use]
    pub fn gross_amount(&self) -> Decimal {
        let amount = match self {
            Self::PurchaseOrder(b) => b.quantity * b.unit_cost,
            Self::ReceivingReport(b) => b.quantity * b.unit_cost,
            Self::SalesInvoice(b) => b.quantity * b.unit_price,
            Self::CustomerOrderSlip(b) => b.quantity * b.unit_price,
            Self::ServiceInvoice(b) => b.amount,
            Self::CreditMemo(b) | Self::DebitMemo(b) => b.amount,
            Self::BienesPlacement(b) => b.amount,
            Self::CollectionReceipt(b) => b.applications.iter().map(|a| a.amount).sum(),
            Self::CheckVoucher(b) => match &b.kind {
                CheckVoucherKind::Trade { applications, .. } => {
                    applications.iter().map(|a| a.amount).sum()
                }
                CheckVoucherKind::NonTrade { entries } => entries.iter().map(|e| e.debit).sum(),
            },
            Self::JournalVoucher(b) => b.entries.iter().map(|e| e.debit).sum(),
            Self::DeliveryReceipt(_) | Self::AuthorityToLoad(_) => Decimal::ZERO,
        };
        round_money(amount)
    }

    /// Payment applications carried by collections and trade check vouchers.
    #[must_use]
    pub fn payment_applications(&self) -> &[PaymentApplication] {
        match self {
            Self::CollectionReceipt(b) => &b.applications,
            Self::CheckVoucher(CheckVoucher {
                kind: CheckVoucherKind::Trade { applications, .. },
                ..
            }) => applications,
            _ => &[],
        }
    }

    /// Validates the body's own content. Cross-document checks (referenced
    /// invoices exist, product is known) happen when posting.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the body is malformed.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::PurchaseOrder(b) => {
                require_party(&b.supplier, "supplier")?;
                require_product(&b.product_code)?;
                require_positive(b.quantity, "quantity")?;
                require_non_negative(b.unit_cost, "unit_cost")
            }
            Self::ReceivingReport(b) => {
                require_party(&b.supplier, "supplier")?;
                require_product(&b.product_code)?;
                require_positive(b.quantity, "quantity")?;
                require_non_negative(b.unit_cost, "unit_cost")
            }
            Self::SalesInvoice(b) => {
                require_party(&b.customer, "customer")?;
                require_product(&b.product_code)?;
                require_positive(b.quantity, "quantity")?;
                require_non_negative(b.unit_price, "unit_price")
            }
            Self::ServiceInvoice(b) => {
                require_party(&b.customer, "customer")?;
                require_positive(b.amount, "amount")
            }
            Self::CollectionReceipt(b) => {
                require_party(&b.customer, "customer")?;
                require_party(&b.bank, "bank")?;
                validate_applications(&b.applications)
            }
            Self::CheckVoucher(b) => {
                require_party(&b.bank, "bank")?;
                require_party(&b.payee, "payee")?;
                match &b.kind {
                    CheckVoucherKind::Trade { applications, .. } => {
                        validate_applications(applications)
                    }
                    CheckVoucherKind::NonTrade { entries } => validate_entries(entries),
                }
            }
            Self::JournalVoucher(b) => validate_entries(&b.entries),
            Self::CreditMemo(b) | Self::DebitMemo(b) => {
                require_party(&b.customer, "customer")?;
                require_product(&b.product_code)?;
                require_positive(b.amount, "amount")
            }
            Self::DeliveryReceipt(b) => {
                require_party(&b.customer, "customer")?;
                require_product(&b.product_code)?;
                require_positive(b.quantity, "quantity")
            }
            Self::CustomerOrderSlip(b) => {
                require_party(&b.customer, "customer")?;
                require_product(&b.product_code)?;
                require_positive(b.quantity, "quantity")?;
                require_non_negative(b.unit_price, "unit_price")
            }
            Self::AuthorityToLoad(b) => {
                require_party(&b.supplier, "supplier")?;
                require_product(&b.product_code)?;
                require_positive(b.quantity, "quantity")
            }
            Self::BienesPlacement(b) => {
                require_party(&b.bank, "bank")?;
                require_positive(b.amount, "amount")
            }
        }
    }
}

fn require_party(party: &Party, field: &str) -> Result<(), String> {
    if party.code.trim().is_empty() {
        return Err(format!("{field} code is required"));
    }
    Ok(())
}

fn require_product(code: &str) -> Result<(), String> {
    if code.trim().is_empty() {
        return Err("product_code is required".to_string());
    }
    Ok(())
}

fn require_positive(value: Decimal, field: &str) -> Result<(), String> {
    if value <= Decimal::ZERO {
        return Err(format!("{field} must be positive, got {value}"));
    }
    Ok(())
}

fn require_non_negative(value: Decimal, field: &str) -> Result<(), String> {
    if value < Decimal::ZERO {
        return Err(format!("{field} cannot be negative, got {value}"));
    }
    Ok(())
}

fn validate_applications(applications: &[PaymentApplication]) -> Result<(), String> {
    if applications.is_empty() {
        return Err("at least one payment application is required".to_string());
    }
    let mut seen = HashSet::new();
    for application in applications {
        require_positive(application.amount, "applied amount")?;
        if !seen.insert(application.document_id) {
            return Err(format!(
                "document {} is applied more than once",
                application.document_id
            ));
        }
    }
    Ok(())
}

fn validate_entries(entries: &[ManualEntry]) -> Result<(), String> {
    if entries.is_empty() {
        return Err("at least one entry is required".to_string());
    }
    for entry in entries {
        if entry.account_no.trim().is_empty() {
            return Err("account_no is required on every entry".to_string());
        }
        if entry.debit < Decimal::ZERO || entry.credit < Decimal::ZERO {
            return Err(format!("account {} has a negative amount", entry.account_no));
        }
        if entry.debit.is_zero() == entry.credit.is_zero() {
            return Err(format!(
                "account {} must have exactly one of debit or credit",
                entry.account_no
            ));
        }
    }
    Ok(())
}
