//! `SeaORM` entities for the posting tables.

pub mod account_period_balances;
pub mod audit_trails;
pub mod cost_layers;
pub mod document_sequences;
pub mod documents;
pub mod ledger_lines;
pub mod posted_periods;
pub mod sub_account_period_balances;
