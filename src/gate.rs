//! Submission gate
//!
//! Client-side guard that keeps batches with no usable signal from reaching the
//! prediction endpoint. This is a cost/UX guard only: the service handles empty
//! rows on its own.

use crate::coerce::CanonicalRow;

/// Message shown to the user when the gate rejects a batch
pub const REJECTION_MESSAGE: &str =
    "Please enter at least one numeric attribute (non-zero) before submitting.";

/// Debug note recorded in place of a server response when the gate rejects a batch
pub const SKIPPED_RESPONSE: &str = "skipped - all values missing or zero";

/// True if every value in the row is absent or exactly zero
#[must_use]
pub fn row_is_empty(row: &CanonicalRow) -> bool {
    row.values().all(|v| v.map_or(true, |x| x == 0.0))
}

/// Whether the batch carries enough signal to submit
///
/// Rejects only when every row is empty. An empty batch has no rows with
/// signal and is rejected as well.
#[must_use]
pub fn should_submit(rows: &[CanonicalRow]) -> bool {
    !rows.iter().all(row_is_empty)
}
