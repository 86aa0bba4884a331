//! Generator for OpenAI-compatible APIs.
//!
//! [`HttpGenerator`] covers any provider exposing the
//! `/v1/chat/completions` shape: OpenAI, vLLM, llama.cpp server, LM Studio,
//! Together AI, Groq, Mistral, and Ollama's `/v1/` endpoint.

use reqwest::Client;
use serde_json::{json, Value};

use super::{GenerationSettings, TextGenerator};
use crate::error::{ForgeError, Result};

/// Generator backed by an OpenAI-compatible chat-completions endpoint.
///
/// # Example
///
/// ```
/// use structforge::generator::HttpGenerator;
///
/// let generator = HttpGenerator::new("https://api.openai.com", "gpt-4o-mini")
///     .with_api_key("sk-...");
/// ```
#[derive(Clone)]
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl HttpGenerator {
    /// Create a generator for the given endpoint and model, without
    /// authentication.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
        }
    }

    /// Set the API key, sent as `Authorization: Bearer {key}`.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Use a pre-configured HTTP client (custom timeout, proxy, ...).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Build the `/v1/chat/completions` body, merging per-call settings
    /// into the request root.
    fn build_body(&self, prompt: &str, settings: &GenerationSettings) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });
        if let Some(map) = body.as_object_mut() {
            for (key, value) in settings {
                map.insert(key.clone(), value.clone());
            }
        }
        body
    }
}

#[async_trait::async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate_text(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(prompt, settings);

        let mut request = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForgeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        let choice = &payload["choices"][0];

        // A length-capped reply is a truncated payload; surface it rather
        // than handing garbage to the extraction pipeline.
        if choice["finish_reason"] == "length" {
            return Err(ForgeError::Provider(
                "response truncated by the provider's token limit".to_string(),
            ));
        }

        match choice["message"]["content"].as_str() {
            Some(text) => Ok(text.to_string()),
            None => Err(ForgeError::Provider(
                "response contained no message content".to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_body_merges_settings() {
        let generator = HttpGenerator::new("http://localhost:8080/", "test-model");
        let mut settings = GenerationSettings::new();
        settings.insert("temperature".to_string(), json!(0.0));
        settings.insert("max_tokens".to_string(), json!(512));

        let body = generator.build_body("hello", &settings);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn base_url_trailing_slash_stripped() {
        let generator = HttpGenerator::new("http://localhost:8080/", "m");
        assert_eq!(generator.base_url, "http://localhost:8080");
    }

    #[test]
    fn debug_hides_api_key() {
        let generator = HttpGenerator::new("http://x", "m").with_api_key("sk-secret");
        let debug = format!("{:?}", generator);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("has_api_key: true"));
    }
}
