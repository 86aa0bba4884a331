//! Per-attempt evidence retained for one `generate` call.

use crate::validate::ValidationOutcome;

/// Everything observed during one draft→generate→locate→validate cycle.
///
/// Records are kept in order for the duration of a single `generate` call
/// and surfaced on the final result or inside
/// [`ForgeError::Exhausted`](crate::error::ForgeError::Exhausted). Never
/// persisted. When a `Success` outcome appears it is always the last record.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// 1-based attempt index.
    pub attempt: u32,
    /// Raw model reply for this attempt.
    pub raw: String,
    /// Candidate payload strings located in the reply, in the order tried.
    pub candidates: Vec<String>,
    /// How decoding/validation went. Decode failures appear here as
    /// synthetic failure entries, never as raised errors.
    pub outcome: ValidationOutcome,
}
