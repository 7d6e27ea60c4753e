//! Local (Ollama) backend adapter.
//!
//! # Responsibilities
//! - Call a local Ollama server's generate endpoint; no credential, no cost
//! - Recover structured output through the repair pipeline, since small
//!   local models routinely emit near-valid JSON
//!
//! # Design Decisions
//! - Non-streaming generate call; the client has no use for partial text
//! - Ollama reports no usage, so tokens are always estimated

use crate::backend::adapter::{
    estimate_tokens, AdapterCore, BackendStatsSnapshot, GenOptions, GenerationBackend,
    GenerationResult,
};
use crate::backend::BackendId;
use crate::config::{LocalBackendConfig, TransportConfig};
use crate::error::GenError;
use crate::repair;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// The free local generation backend.
pub struct LocalBackend {
    core: AdapterCore,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl LocalBackend {
    pub fn new(config: &LocalBackendConfig, transport: &TransportConfig) -> Self {
        Self {
            core: AdapterCore::new(BackendId::Ollama, config.requests_per_minute),
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/generate", config.endpoint.trim_end_matches('/')),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| BackendId::Ollama.default_model().to_string()),
            timeout: Duration::from_secs(transport.request_timeout_secs),
        }
    }
}

#[async_trait]
impl GenerationBackend for LocalBackend {
    fn id(&self) -> BackendId {
        BackendId::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn circuit_open(&self) -> bool {
        self.core.circuit_open()
    }

    fn stats(&self) -> BackendStatsSnapshot {
        self.core.snapshot()
    }

    fn reset_stats(&self) {
        self.core.reset();
    }

    /// Local models emit near-valid JSON; run the repair pipeline.
    fn parse_structured(&self, raw: &str) -> Result<Value, GenError> {
        repair::parse_with_repair(raw)
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenOptions,
    ) -> Result<GenerationResult, GenError> {
        self.core.admit().await?;

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            system: options.system_prompt.as_deref(),
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let outcome = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.core.record_failure();
                return Err(GenError::Transport {
                    backend: BackendId::Ollama,
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.core.record_failure();
            return Err(GenError::BackendStatus {
                backend: BackendId::Ollama,
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: OllamaResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                self.core.record_failure();
                return Err(GenError::Transport {
                    backend: BackendId::Ollama,
                    message: format!("malformed generate response: {e}"),
                });
            }
        };

        let tokens = estimate_tokens(&parsed.response);
        self.core.record_success(tokens);
        debug!(tokens, "local generation succeeded");

        Ok(GenerationResult {
            text: parsed.response,
            backend: BackendId::Ollama,
            model: self.model.clone(),
            tokens,
            cost: 0.0,
        })
    }
}
