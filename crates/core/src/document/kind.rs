//! Document types, their number prefixes and owning modules.

use serde::{Deserialize, Serialize};

use crate::fiscal::Module;

/// Every document type the engine posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Purchase order.
    PurchaseOrder,
    /// Receiving report (goods received from a supplier).
    ReceivingReport,
    /// Sales invoice for goods.
    SalesInvoice,
    /// Service invoice.
    ServiceInvoice,
    /// Check voucher (disbursement).
    CheckVoucher,
    /// Journal voucher (manual entries).
    JournalVoucher,
    /// Collection receipt.
    CollectionReceipt,
    /// Credit memo against a sales invoice.
    CreditMemo,
    /// Debit memo against a sales invoice.
    DebitMemo,
    /// Delivery receipt.
    DeliveryReceipt,
    /// Customer order slip.
    CustomerOrderSlip,
    /// Authority to load.
    AuthorityToLoad,
    /// Bienes (short-term) placement.
    BienesPlacement,
}

impl DocumentType {
    /// All document types.
    pub const ALL: [Self; 13] = [
        Self::PurchaseOrder,
        Self::ReceivingReport,
        Self::SalesInvoice,
        Self::ServiceInvoice,
        Self::CheckVoucher,
        Self::JournalVoucher,
        Self::CollectionReceipt,
        Self::CreditMemo,
        Self::DebitMemo,
        Self::DeliveryReceipt,
        Self::CustomerOrderSlip,
        Self::AuthorityToLoad,
        Self::BienesPlacement,
    ];

    /// Document number prefix.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::PurchaseOrder => "PO",
            Self::ReceivingReport => "RR",
            Self::SalesInvoice => "SI",
            Self::ServiceInvoice => "SV",
            Self::CheckVoucher => "CV",
            Self::JournalVoucher => "JV",
            Self::CollectionReceipt => "CR",
            Self::CreditMemo => "CM",
            Self::DebitMemo => "DM",
            Self::DeliveryReceipt => "DR",
            Self::CustomerOrderSlip => "COS",
            Self::AuthorityToLoad => "ATL",
            Self::BienesPlacement => "BP",
        }
    }

    /// Stored code (snake_case).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PurchaseOrder => "purchase_order",
            Self::ReceivingReport => "receiving_report",
            Self::SalesInvoice => "sales_invoice",
            Self::ServiceInvoice => "service_invoice",
            Self::CheckVoucher => "check_voucher",
            Self::JournalVoucher => "journal_voucher",
            Self::CollectionReceipt => "collection_receipt",
            Self::CreditMemo => "credit_memo",
            Self::DebitMemo => "debit_memo",
            Self::DeliveryReceipt => "delivery_receipt",
            Self::CustomerOrderSlip => "customer_order_slip",
            Self::AuthorityToLoad => "authority_to_load",
            Self::BienesPlacement => "bienes_placement",
        }
    }

    /// Module whose period lock applies to this type.
    #[must_use]
    pub const fn module(self) -> Module {
        match self {
            Self::PurchaseOrder | Self::ReceivingReport | Self::CheckVoucher => Module::Ap,
            Self::SalesInvoice
            | Self::ServiceInvoice
            | Self::CollectionReceipt
            | Self::CreditMemo
            | Self::DebitMemo
            | Self::CustomerOrderSlip => Module::Ar,
            Self::JournalVoucher | Self::BienesPlacement => Module::Gl,
            Self::DeliveryReceipt | Self::AuthorityToLoad => Module::Inventory,
        }
    }

    /// Returns true if posting produces general-ledger lines.
    #[must_use]
    pub const fn produces_ledger_lines(self) -> bool {
        !matches!(
            self,
            Self::PurchaseOrder
                | Self::CustomerOrderSlip
                | Self::DeliveryReceipt
                | Self::AuthorityToLoad
        )
    }

    /// Returns true if posting moves inventory cost.
    #[must_use]
    pub const fn affects_inventory_cost(self) -> bool {
        matches!(self, Self::ReceivingReport | Self::SalesInvoice)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Unrecognised document type code or prefix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown document type: {0}")]
pub struct UnknownDocumentType(pub String);

impl std::str::FromStr for DocumentType {
    type Err = UnknownDocumentType;

    /// Accepts either the stored code (`sales_invoice`) or the prefix (`SI`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.code() == needle || t.prefix().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownDocumentType(needle.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DocumentType::PurchaseOrder, "PO", Module::Ap)]
    #[case(DocumentType::ReceivingReport, "RR", Module::Ap)]
    #[case(DocumentType::CheckVoucher, "CV", Module::Ap)]
    #[case(DocumentType::SalesInvoice, "SI", Module::Ar)]
    #[case(DocumentType::ServiceInvoice, "SV", Module::Ar)]
    #[case(DocumentType::CollectionReceipt, "CR", Module::Ar)]
    #[case(DocumentType::CreditMemo, "CM", Module::Ar)]
    #[case(DocumentType::DebitMemo, "DM", Module::Ar)]
    #[case(DocumentType::CustomerOrderSlip, "COS", Module::Ar)]
    #[case(DocumentType::JournalVoucher, "JV", Module::Gl)]
    #[case(DocumentType::BienesPlacement, "BP", Module::Gl)]
    #[case(DocumentType::DeliveryReceipt, "DR", Module::Inventory)]
    #[case(DocumentType::AuthorityToLoad, "ATL", Module::Inventory)]
    fn test_prefix_and_module(
        #[case] doc_type: DocumentType,
        #[case] prefix: &str,
        #[case] module: Module,
    ) {
        assert_eq!(doc_type.prefix(), prefix);
        assert_eq!(doc_type.module(), module);
    }

    #[test]
    fn test_parse_code_and_prefix() {
        for doc_type in DocumentType::ALL {
            assert_eq!(doc_type.code().parse::<DocumentType>().unwrap(), doc_type);
            assert_eq!(doc_type.prefix().parse::<DocumentType>().unwrap(), doc_type);
        }
        assert!("XYZ".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_prefixes_are_unique() {
        let mut prefixes: Vec<_> = DocumentType::ALL.iter().map(|t| t.prefix()).collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        assert_eq!(prefixes.len(), DocumentType::ALL.len());
    }

    #[test]
    fn test_non_ledger_documents() {
        assert!(!DocumentType::PurchaseOrder.produces_ledger_lines());
        assert!(!DocumentType::DeliveryReceipt.produces_ledger_lines());
        assert!(DocumentType::SalesInvoice.produces_ledger_lines());
        assert!(DocumentType::SalesInvoice.affects_inventory_cost());
        assert!(!DocumentType::ServiceInvoice.affects_inventory_cost());
    }
}
