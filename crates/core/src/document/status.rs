//! Document lifecycle.
//!
//! Valid transitions:
//! - Pending → Posted (post)
//! - Pending → Canceled (cancel)
//! - Posted → Voided (void)
//!
//! Posted, Voided and Canceled documents are immutable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Document status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Drafted, editable, not yet in the ledger.
    Pending,
    /// In the ledger. Immutable.
    Posted,
    /// Posted and then reversed by offsetting lines.
    Voided,
    /// Abandoned before posting.
    Canceled,
}

impl DocumentStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Posted => "posted",
            Self::Voided => "voided",
            Self::Canceled => "canceled",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "posted" => Some(Self::Posted),
            "voided" => Some(Self::Voided),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Returns true if the document can still be edited.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Checks that `self → to` is an allowed transition.
    ///
    /// # Errors
    ///
    /// Returns `StatusError::AlreadyPosted` when posting a posted document and
    /// `StatusError::InvalidTransition` for every other illegal move.
    pub fn transition(self, to: Self) -> Result<Self, StatusError> {
        match (self, to) {
            (Self::Pending, Self::Posted | Self::Canceled) | (Self::Posted, Self::Voided) => Ok(to),
            (Self::Posted, Self::Posted) => Err(StatusError::AlreadyPosted),
            (from, to) => Err(StatusError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusError {
    /// The document is already in the ledger.
    #[error("Document is already posted")]
    AlreadyPosted,

    /// Any other disallowed transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: DocumentStatus,
        /// The attempted target status.
        to: DocumentStatus,
    },
}
