//! Posting rules.
//!
//! Turns a document into ledger lines using fixed account tables, and defines
//! the error taxonomy and receipts of the posting engine.

pub mod accounts;
pub mod error;
pub mod receipt;
pub mod rules;
pub mod tax;

pub use accounts::{Account, AccountTable, ProductAccounts};
pub use error::PostingError;
pub use receipt::{CostCorrection, PostedReceipt, VoidReceipt};
pub use rules::{PostingContext, PostingRules, SettledDocument};
pub use tax::{split_vat, withholding_tax, VatSplit, WithholdingKind};
