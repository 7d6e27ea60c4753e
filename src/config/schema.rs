//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the generation
//! client. All types derive Serde traits for deserialization from config
//! files; every field has a default so minimal configs work.

use crate::backend::BackendId;
use serde::{Deserialize, Serialize};

/// Root configuration for the generation client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Per-backend credentials and endpoints. A backend with no entry is
    /// excluded from the orchestrator's candidate set entirely.
    pub backends: BackendsConfig,

    /// Orchestrator retry settings.
    pub orchestrator: OrchestratorConfig,

    /// Transport settings applied to every backend call.
    pub transport: TransportConfig,
}

/// One optional entry per backend.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BackendsConfig {
    pub deepseek: Option<HostedBackendConfig>,
    pub glm: Option<HostedBackendConfig>,
    pub qwen: Option<HostedBackendConfig>,
    pub ollama: Option<LocalBackendConfig>,
}

impl BackendsConfig {
    /// Whether any backend is configured at all.
    pub fn any_configured(&self) -> bool {
        self.deepseek.is_some()
            || self.glm.is_some()
            || self.qwen.is_some()
            || self.ollama.is_some()
    }

    /// Backends present in this config, in declaration order.
    pub fn configured_ids(&self) -> Vec<BackendId> {
        let mut ids = Vec::new();
        if self.deepseek.is_some() {
            ids.push(BackendId::DeepSeek);
        }
        if self.glm.is_some() {
            ids.push(BackendId::Glm);
        }
        if self.qwen.is_some() {
            ids.push(BackendId::Qwen);
        }
        if self.ollama.is_some() {
            ids.push(BackendId::Ollama);
        }
        ids
    }
}

/// Hosted backend entry: a credential plus optional overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostedBackendConfig {
    /// API key sent as a bearer token.
    pub api_key: String,

    /// Override the provider's default chat-completions endpoint.
    pub endpoint: Option<String>,

    /// Override the default model identifier.
    pub model: Option<String>,

    /// Override the declared requests-per-minute ceiling.
    pub requests_per_minute: Option<u32>,
}

impl HostedBackendConfig {
    pub fn with_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: None,
            model: None,
            requests_per_minute: None,
        }
    }
}

/// Local backend entry: an endpoint, no credential.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalBackendConfig {
    /// Base URL of the local generation server.
    pub endpoint: String,

    /// Override the default model identifier.
    pub model: Option<String>,

    /// Override the declared requests-per-minute ceiling.
    pub requests_per_minute: Option<u32>,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: None,
            requests_per_minute: None,
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum backend attempts per logical call before surfacing failure.
    pub retry_budget: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { retry_budget: 3 }
    }
}

/// Transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound on a single backend call, independent of rate limiting.
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
        }
    }
}

impl RelayConfig {
    /// Build a config from conventional environment variables:
    /// `DEEPSEEK_API_KEY`, `GLM_API_KEY`, `QWEN_API_KEY`,
    /// `OLLAMA_ENDPOINT`. Unset variables leave the backend unconfigured.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
            if !key.is_empty() {
                config.backends.deepseek = Some(HostedBackendConfig::with_key(key));
            }
        }
        if let Ok(key) = std::env::var("GLM_API_KEY") {
            if !key.is_empty() {
                config.backends.glm = Some(HostedBackendConfig::with_key(key));
            }
        }
        if let Ok(key) = std::env::var("QWEN_API_KEY") {
            if !key.is_empty() {
                config.backends.qwen = Some(HostedBackendConfig::with_key(key));
            }
        }
        if let Ok(endpoint) = std::env::var("OLLAMA_ENDPOINT") {
            if !endpoint.is_empty() {
                config.backends.ollama = Some(LocalBackendConfig {
                    endpoint,
                    ..LocalBackendConfig::default()
                });
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_parses_with_defaults() {
        let toml = r#"
            [backends.deepseek]
            api_key = "sk-test"
        "#;
        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.orchestrator.retry_budget, 3);
        assert_eq!(config.transport.request_timeout_secs, 60);
        assert_eq!(config.backends.configured_ids(), vec![BackendId::DeepSeek]);
    }

    #[test]
    fn test_empty_config_has_no_backends() {
        let config = RelayConfig::default();
        assert!(!config.backends.any_configured());
    }

    #[test]
    fn test_local_backend_default_endpoint() {
        let toml = r#"
            [backends.ollama]
        "#;
        let config: RelayConfig = toml::from_str(toml).unwrap();
        let ollama = config.backends.ollama.unwrap();
        assert_eq!(ollama.endpoint, "http://localhost:11434");
    }
}
