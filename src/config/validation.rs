//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (retry budget > 0, timeouts > 0)
//! - Reject malformed endpoint URLs before an adapter trips over them
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before a config is accepted into the orchestrator

use crate::config::schema::RelayConfig;
use std::fmt;
use url::Url;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.orchestrator.retry_budget == 0 {
        errors.push(ValidationError {
            field: "orchestrator.retry_budget".into(),
            message: "must be at least 1".into(),
        });
    }

    if config.transport.request_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "transport.request_timeout_secs".into(),
            message: "must be at least 1".into(),
        });
    }

    let hosted_endpoints = [
        ("backends.deepseek.endpoint", config.backends.deepseek.as_ref().and_then(|b| b.endpoint.as_deref())),
        ("backends.glm.endpoint", config.backends.glm.as_ref().and_then(|b| b.endpoint.as_deref())),
        ("backends.qwen.endpoint", config.backends.qwen.as_ref().and_then(|b| b.endpoint.as_deref())),
        ("backends.ollama.endpoint", config.backends.ollama.as_ref().map(|b| b.endpoint.as_str())),
    ];
    for (field, endpoint) in hosted_endpoints {
        if let Some(endpoint) = endpoint {
            if let Err(e) = Url::parse(endpoint) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("invalid URL: {e}"),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LocalBackendConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_retry_budget_rejected() {
        let mut config = RelayConfig::default();
        config.orchestrator.retry_budget = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field.contains("retry_budget")));
    }

    #[test]
    fn test_malformed_endpoint_rejected() {
        let mut config = RelayConfig::default();
        config.backends.ollama = Some(LocalBackendConfig {
            endpoint: "not a url".into(),
            ..LocalBackendConfig::default()
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field.contains("ollama")));
    }
}
