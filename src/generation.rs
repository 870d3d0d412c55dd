//! OpenAI-compatible chat completion provider.
//!
//! Calls `POST {api_base}/chat/completions` with the assembled prompt as a
//! single user message and returns the first choice's content. Unlike the
//! embedding provider there is no retry loop here: the pipeline's own
//! quality gate already retries failed generations with a widened
//! retrieval plan, so a second retry layer would only multiply latency.
//!
//! Timeouts and transport errors surface as [`EngineError::Generation`],
//! which the pipeline records as a confidence-1 attempt rather than
//! failing the query.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use claimsight_core::error::EngineError;
use claimsight_core::pipeline::Generator;

use crate::config::GenerationConfig;

/// Completion client over an OpenAI-compatible `/chat/completions`
/// endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiGenerator {
    /// Create a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key environment variable named by
    /// `generation.api_key_env` is not set, or the HTTP client cannot be
    /// built.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, EngineError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Generation("completion request timed out".into())
                } else {
                    EngineError::Generation(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EngineError::Generation(format!(
                "completion API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Generation(e.to_string()))?;

        parse_completion_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat completion body.
fn parse_completion_response(json: &serde_json::Value) -> Result<String, EngineError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            EngineError::Generation("invalid completion response: missing choices[0].message.content".into())
        })
}
