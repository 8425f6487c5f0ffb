//! Ledger line domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{CompanyId, DocumentId, LedgerLineId};

use crate::company::CompanyScoped;
use crate::document::DocumentType;

/// Kind of sub-ledger a line is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAccountType {
    /// Customer sub-ledger (receivables).
    Customer,
    /// Supplier sub-ledger (payables).
    Supplier,
    /// Bank account.
    BankAccount,
    /// Employee.
    Employee,
    /// Intercompany.
    Company,
}

impl SubAccountType {
    /// Stored code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Supplier => "supplier",
            Self::BankAccount => "bank_account",
            Self::Employee => "employee",
            Self::Company => "company",
        }
    }

    /// Parses a stored code.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "supplier" => Some(Self::Supplier),
            "bank_account" => Some(Self::BankAccount),
            "employee" => Some(Self::Employee),
            "company" => Some(Self::Company),
            _ => None,
        }
    }
}

/// Sub-ledger tag on a line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubAccount {
    /// Sub-ledger kind.
    pub kind: SubAccountType,
    /// Master-data code of the counterparty.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl SubAccount {
    /// Creates a tag.
    #[must_use]
    pub fn new(kind: SubAccountType, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One debit or credit in the general ledger.
///
/// Lines are append-only: corrections and voids add new lines that reference
/// the same document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    /// Unique identifier.
    pub id: LedgerLineId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Accounting date.
    pub date: NaiveDate,
    /// Account number (chart of accounts code).
    pub account_no: String,
    /// Account title.
    pub account_title: String,
    /// Debit amount, zero when this is a credit.
    pub debit: Decimal,
    /// Credit amount, zero when this is a debit.
    pub credit: Decimal,
    /// Document the line was posted from.
    pub reference_document_id: DocumentId,
    /// Number of that document.
    pub reference_no: String,
    /// Type of that document.
    pub document_type: DocumentType,
    /// Narrative.
    pub description: String,
    /// Optional sub-ledger tag.
    pub sub_account: Option<SubAccount>,
}

impl LedgerLine {
    /// Returns the signed amount (positive for debit, negative for credit).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Returns true if the line carries no amount on either side.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.debit.is_zero() && self.credit.is_zero()
    }
}

impl CompanyScoped for LedgerLine {
    fn company_id(&self) -> &CompanyId {
        &self.company_id
    }
}
