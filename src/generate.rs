//! Generation gateway.
//!
//! Builds the retrieval-augmented prompt and sends it to an Ollama server as
//! a single non-streaming `POST /api/generate` call. The call has one
//! timeout and is never retried; every failure comes back as a
//! [`GenerateError`] for the caller to report.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;

#[derive(Debug, Error)]
pub enum GenerateError {
    /// The model server answered with a non-success status.
    #[error("generation backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection failure or timeout.
    #[error("generation backend unreachable at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response whose body is not the expected JSON object.
    #[error("malformed generation response: {detail}")]
    MalformedResponse { detail: String, body: String },
}

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Assembles the generation prompt: persona, retrieved context, instruction.
pub fn build_prompt(persona: &str, contexts: &[String], instruction: &str) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nInstruction:\n{}\n",
        persona,
        contexts.join("\n\n"),
        instruction
    )
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(cfg: &GenerationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: cfg.ollama_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let url = format!("{}/api/generate", self.base_url);
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "generating");

        let transport = |source: reqwest::Error| GenerateError::Transport {
            url: url.clone(),
            source,
        };

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(GenerateError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| GenerateError::MalformedResponse {
                detail: e.to_string(),
                body: body.clone(),
            })?;
        Ok(parsed.response.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_layout() {
        let prompt = build_prompt(
            "You are a supervisor.",
            &["Alpha deployment readiness: green.".to_string(), "Second.".to_string()],
            "deployment readiness",
        );
        assert_eq!(
            prompt,
            "You are a supervisor.\n\nContext:\nAlpha deployment readiness: green.\n\nSecond.\n\nInstruction:\ndeployment readiness\n"
        );
    }

    #[test]
    fn missing_response_field_is_empty() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert_eq!(parsed.response.unwrap_or_default(), "");
    }

    #[test]
    fn request_is_non_streaming() {
        let body = serde_json::to_value(GenerateRequest {
            model: "mistral",
            prompt: "p",
            stream: false,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"model": "mistral", "prompt": "p", "stream": false}));
    }
}
