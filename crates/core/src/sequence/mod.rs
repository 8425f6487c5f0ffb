//! Document number generation.
//!
//! Numbers look like `SI-000042`: the type prefix, a dash and a fixed-width
//! zero-padded counter. The counter is per (company, document type) and the
//! store serialises access to it; this module only does the arithmetic.

pub mod error;
pub mod number;

pub use error::SequenceError;
pub use number::{format_number, next_number, parse_number, SUFFIX_WIDTH, MAX_SUFFIX};
