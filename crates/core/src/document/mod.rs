//! Business documents.
//!
//! A document is drafted as `Pending`, assigned a number and ledger lines when
//! posted, and from then on only changes through append-only corrections.

pub mod body;
pub mod kind;
pub mod model;
pub mod status;

pub use body::{
    AuthorityToLoad, BienesPlacement, CheckVoucher, CheckVoucherKind, CollectionReceipt,
    CustomerOrderSlip, DeliveryReceipt, DocumentBody, JournalVoucher, ManualEntry, MemoAdjustment,
    Party, PaymentApplication, PurchaseOrder, ReceivingReport, SalesInvoice, ServiceInvoice,
    VatTreatment,
};
pub use kind::DocumentType;
pub use model::{Document, NewDocument};
pub use status::{DocumentStatus, StatusError};
