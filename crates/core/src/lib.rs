//! Core business logic for Tally.
//!
//! This crate contains pure posting-engine logic with ZERO web or database
//! dependencies. All domain types, validation rules, and calculations live here;
//! the `tally-db` crate wires them into transactions.
//!
//! # Modules
//!
//! - `company` - Company scoping filters
//! - `document` - Business documents and their lifecycle
//! - `sequence` - Document number parsing and generation
//! - `ledger` - Ledger lines, the double-entry invariant, period balances
//! - `fiscal` - Fiscal periods and the period-close guard
//! - `costing` - Moving weighted-average inventory costing
//! - `posting` - Account tables and per-document posting rules

pub mod company;
pub mod costing;
pub mod document;
pub mod fiscal;
pub mod ledger;
pub mod posting;
pub mod sequence;
