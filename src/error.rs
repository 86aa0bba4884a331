use thiserror::Error;

use crate::attempt::AttemptRecord;

/// Errors produced by the forge and its components.
///
/// Only three conditions ever cross the crate boundary: configuration
/// problems, provider/transport failures, and retry exhaustion. Decode and
/// validation noise from intermediate attempts stays internal to the retry
/// loop (it is recorded in [`AttemptRecord`]s instead).
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Invalid configuration detected before any model call is made:
    /// an unresolved template placeholder or an unsupported response spec.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-success status code.
    #[error("provider returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The provider reply was unusable at the protocol level
    /// (missing content, truncated output, injected test failure).
    #[error("provider error: {0}")]
    Provider(String),

    /// No valid response could be derived within the attempt budget.
    /// Carries the full attempt history for diagnostics.
    #[error("no valid response derived after {} attempt(s)", attempts.len())]
    Exhausted {
        /// One record per attempt, in order. Never empty.
        attempts: Vec<AttemptRecord>,
    },

    /// JSON serialization failed at the serde level (e.g. rendering the
    /// schema document). Decode failures of model output never surface here.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForgeError>;
