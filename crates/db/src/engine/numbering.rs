//! Document number issue under the counter row lock.
//!
//! The unique constraint on `(company, type, number)` stays the backstop: if the
//! posted document's write still hits it, the engine fails the unit as
//! transient and the strategy reruns it with a fresh number, bounded by the
//! retry policy.

use tally_core::document::DocumentType;
use tally_core::posting::PostingError;
use tally_core::sequence::next_number;
use tally_shared::types::CompanyId;
use tracing::{debug, warn};

use crate::store::UnitOfWork;

/// Issues the next free number for `(company, type)`.
///
/// The counter row stays locked until the unit commits, so concurrent issues
/// queue behind each other. A candidate already carried by a document (for
/// example one imported with its own number) is skipped; after
/// `max_attempts` collisions the issue fails.
pub(crate) async fn issue_number<U: UnitOfWork>(
    unit: &mut U,
    company_id: &CompanyId,
    document_type: DocumentType,
    max_attempts: u32,
) -> Result<String, PostingError> {
    let prefix = document_type.prefix();
    let mut last = unit.lock_sequence(company_id, document_type).await?;

    for attempt in 1..=max_attempts {
        let candidate = next_number(prefix, last.as_deref())?;
        if !unit
            .document_no_exists(company_id, document_type, &candidate)
            .await?
        {
            unit.set_last_number(company_id, document_type, &candidate)
                .await?;
            debug!(company_id = %company_id, document_no = %candidate, attempt, "Issued document number");
            return Ok(candidate);
        }
        warn!(
            company_id = %company_id,
            document_no = %candidate,
            attempt,
            "Document number already taken, advancing"
        );
        last = Some(candidate);
    }

    Err(PostingError::SequenceExhausted {
        document_type,
        attempts: max_attempts,
    })
}
