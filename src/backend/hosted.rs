//! Hosted backend adapters.
//!
//! # Responsibilities
//! - Speak the OpenAI-compatible chat-completions shape all three hosted
//!   providers accept (bearer auth, messages array, usage block)
//! - Enforce a per-request timeout independent of the rate limiter
//! - Feed every outcome into the shared `AdapterCore`
//!
//! # Design Decisions
//! - One `HostedBackend` type parameterized by `BackendId` instead of one
//!   type per provider; the wire shape is identical, only endpoint,
//!   credential and pricing differ
//! - Token counts come from the provider's reported usage, with a
//!   chars/4 estimate as fallback

use crate::backend::adapter::{
    estimate_tokens, AdapterCore, BackendStatsSnapshot, GenOptions, GenerationBackend,
    GenerationResult,
};
use crate::backend::BackendId;
use crate::config::{HostedBackendConfig, TransportConfig};
use crate::error::GenError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default chat-completions endpoint per hosted provider.
fn default_endpoint(id: BackendId) -> &'static str {
    match id {
        BackendId::DeepSeek => "https://api.deepseek.com/chat/completions",
        BackendId::Glm => "https://open.bigmodel.cn/api/paas/v4/chat/completions",
        BackendId::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions",
        BackendId::Ollama => unreachable!("ollama is not a hosted backend"),
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

/// A hosted, paid generation backend behind an OpenAI-compatible API.
pub struct HostedBackend {
    core: AdapterCore,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HostedBackend {
    pub fn new(id: BackendId, config: &HostedBackendConfig, transport: &TransportConfig) -> Self {
        Self {
            core: AdapterCore::new(id, config.requests_per_minute),
            client: reqwest::Client::new(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| default_endpoint(id).to_string()),
            api_key: config.api_key.clone(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| id.default_model().to_string()),
            timeout: Duration::from_secs(transport.request_timeout_secs),
        }
    }

    async fn call_transport(&self, prompt: &str, options: &GenOptions) -> Result<String, GenError> {
        let id = self.core.id();
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenError::Transport {
                backend: id,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenError::BackendStatus {
                backend: id,
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        response.text().await.map_err(|e| GenError::Transport {
            backend: id,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl GenerationBackend for HostedBackend {
    fn id(&self) -> BackendId {
        self.core.id()
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

    async fn generate(
        &self,
        prompt: &str,
        options: &GenOptions,
    ) -> Result<GenerationResult, GenError> {
        let id = self.core.id();
        self.core.admit().await?;

        let body = match self.call_transport(prompt, options).await {
            Ok(body) => body,
            Err(e) => {
                self.core.record_failure();
                return Err(e);
            }
        };

        let parsed: ChatResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                // A provider answering 200 with an unreadable body is a
                // transport-level problem, not a structured-output one.
                self.core.record_failure();
                return Err(GenError::Transport {
                    backend: id,
                    message: format!("malformed completion response: {e}"),
                });
            }
        };

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let tokens = parsed
            .usage
            .map(|u| u.total_tokens)
            .unwrap_or_else(|| estimate_tokens(&text));
        let cost = self.core.record_success(tokens);
        debug!(backend = %id, tokens, "hosted generation succeeded");

        Ok(GenerationResult {
            text,
            backend: id,
            model: self.model.clone(),
            tokens,
            cost,
        })
    }
}
