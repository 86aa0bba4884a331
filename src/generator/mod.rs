//! The text-generation capability consumed by the forge.
//!
//! [`TextGenerator`] is the single seam between the extraction engine and
//! an LLM provider: one method, prompt in, text out. Implementations only
//! shape a request and pull the reply text back out — all structure
//! handling lives on this side of the trait.
//!
//! Built-in implementations: [`HttpGenerator`] (OpenAI-compatible APIs) and
//! [`MockGenerator`] (canned responses for tests).

pub mod http;
pub mod mock;

pub use http::HttpGenerator;
pub use mock::MockGenerator;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Per-call provider options (temperature, max tokens, ...), passed through
/// to the provider untouched.
pub type GenerationSettings = HashMap<String, Value>;

/// Abstraction over text-generation providers.
///
/// Implementations fail with a provider/transport error
/// ([`ForgeError::Request`](crate::error::ForgeError::Request),
/// [`Http`](crate::error::ForgeError::Http), or
/// [`Provider`](crate::error::ForgeError::Provider)) and must not silently
/// truncate replies.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as
/// `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text from a prompt and per-call settings.
    async fn generate_text(&self, prompt: &str, settings: &GenerationSettings)
        -> Result<String>;

    /// Human-readable name for events and diagnostics.
    fn name(&self) -> &'static str;
}
