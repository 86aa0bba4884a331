//! Mock generator for testing without a live LLM.
//!
//! [`MockGenerator`] returns pre-configured responses in order, and records
//! every prompt it receives, allowing deterministic tests of the retry
//! loop.
//!
//! # Example
//!
//! ```
//! use structforge::generator::MockGenerator;
//!
//! let mock = MockGenerator::new(vec![r#"{"name": "Terry"}"#.to_string()]);
//! ```

use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerationSettings, TextGenerator};
use crate::error::{ForgeError, Result};

/// A test generator that returns canned responses in order.
///
/// Cycles back to the beginning when all responses have been consumed.
/// Prompts are recorded for later assertions.
pub struct MockGenerator {
    responses: Vec<String>,
    prompts: Mutex<Vec<String>>,
    fail_with: Option<String>,
}

impl MockGenerator {
    /// Create a mock with the given canned responses.
    ///
    /// Responses are returned in order. When exhausted, cycles from the
    /// beginning.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(
            !responses.is_empty(),
            "MockGenerator requires at least one response"
        );
        Self {
            responses,
            prompts: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock that fails every call with a provider error.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            responses: Vec::new(),
            prompts: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Copies of every prompt received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate_text(
        &self,
        prompt: &str,
        _settings: &GenerationSettings,
    ) -> Result<String> {
        let call_index = {
            let mut prompts = self
                .prompts
                .lock()
                .map_err(|_| ForgeError::Provider("mock prompt log poisoned".to_string()))?;
            prompts.push(prompt.to_string());
            prompts.len() - 1
        };
        if let Some(ref reason) = self.fail_with {
            return Err(ForgeError::Provider(reason.clone()));
        }
        Ok(self.responses[call_index % self.responses.len()].clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
