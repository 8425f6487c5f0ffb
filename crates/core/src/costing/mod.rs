//! Moving weighted-average inventory costing.
//!
//! Each (company, product) has an ordered chain of cost-layer entries. Every
//! entry's running figures are a function of the previous entry's, so the
//! chain is recomputed with a pure fold ([`replay`]) whenever an entry is
//! inserted, revised or voided. Nothing here mutates running figures in place
//! outside that fold.

pub mod chain;
pub mod error;
pub mod layer;
pub mod replay;

#[cfg(test)]
mod props;

pub use chain::{diff, CostChain, CostingOutcome, EntryChange};
pub use error::CostingError;
pub use layer::{CostLayerEntry, CostMovement, NegativeInventoryWarning, RunningPosition};
pub use replay::{replay, step, Step};
