//! Sequence errors.

use thiserror::Error;

/// Errors raised while computing a document number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// The last issued number has no parsable numeric suffix.
    #[error("Malformed document number: {0}")]
    Malformed(String),

    /// The last issued number belongs to another prefix.
    #[error("Document number {number} does not start with prefix {prefix}")]
    PrefixMismatch {
        /// Expected prefix.
        prefix: String,
        /// The offending number.
        number: String,
    },

    /// Every suffix for the prefix has been used.
    #[error("Document numbers for prefix {prefix} are exhausted")]
    Overflow {
        /// The prefix that ran out.
        prefix: String,
    },
}

impl SequenceError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "MALFORMED_DOCUMENT_NUMBER",
            Self::PrefixMismatch { .. } => "DOCUMENT_NUMBER_PREFIX_MISMATCH",
            Self::Overflow { .. } => "SEQUENCE_OVERFLOW",
        }
    }
}
