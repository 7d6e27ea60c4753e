//! Backend identity and capability profiles.
//!
//! # Responsibilities
//! - Name each interchangeable generation backend
//! - Carry the static priority used for default candidate ordering
//! - Declare per-backend rate ceilings and pricing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One of the interchangeable generation backends.
///
/// Three hosted providers plus a free local Ollama endpoint. Lower
/// priority rank is tried first when no caller preference applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    DeepSeek,
    Glm,
    Qwen,
    Ollama,
}

impl BackendId {
    /// All backends, in priority order.
    pub const ALL: [BackendId; 4] = [
        BackendId::DeepSeek,
        BackendId::Glm,
        BackendId::Qwen,
        BackendId::Ollama,
    ];

    /// Static priority rank; lower is tried first by default.
    pub fn priority(self) -> u8 {
        match self {
            BackendId::DeepSeek => 0,
            BackendId::Glm => 1,
            BackendId::Qwen => 2,
            BackendId::Ollama => 3,
        }
    }

    /// Requests-per-minute ceiling for the shared rate limiter.
    pub fn requests_per_minute(self) -> u32 {
        match self {
            BackendId::DeepSeek => 60,
            BackendId::Glm => 30,
            BackendId::Qwen => 30,
            // Local model is compute-bound, not quota-bound; keep
            // concurrency down so the host machine stays responsive.
            BackendId::Ollama => 10,
        }
    }

    /// Minimum gap enforced between consecutive admissions.
    pub fn min_request_gap(self) -> Duration {
        match self {
            BackendId::DeepSeek => Duration::from_millis(200),
            BackendId::Glm => Duration::from_millis(500),
            BackendId::Qwen => Duration::from_millis(500),
            BackendId::Ollama => Duration::from_secs(1),
        }
    }

    /// Approximate cost per 1,000 tokens, in USD. Zero for the local backend.
    pub fn cost_per_1k_tokens(self) -> f64 {
        match self {
            BackendId::DeepSeek => 0.0014,
            BackendId::Glm => 0.0010,
            BackendId::Qwen => 0.0008,
            BackendId::Ollama => 0.0,
        }
    }

    /// Default model identifier sent to the backend.
    pub fn default_model(self) -> &'static str {
        match self {
            BackendId::DeepSeek => "deepseek-chat",
            BackendId::Glm => "glm-4-flash",
            BackendId::Qwen => "qwen-turbo",
            BackendId::Ollama => "qwen2.5:7b",
        }
    }

    /// True for backends that cost nothing to call.
    pub fn is_free(self) -> bool {
        self.cost_per_1k_tokens() == 0.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendId::DeepSeek => "deepseek",
            BackendId::Glm => "glm",
            BackendId::Qwen => "qwen",
            BackendId::Ollama => "ollama",
        };
        f.write_str(s)
    }
}

impl FromStr for BackendId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deepseek" => Ok(BackendId::DeepSeek),
            "glm" => Ok(BackendId::Glm),
            "qwen" => Ok(BackendId::Qwen),
            "ollama" => Ok(BackendId::Ollama),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_matches_all() {
        let mut sorted = BackendId::ALL;
        sorted.sort_by_key(|b| b.priority());
        assert_eq!(sorted, BackendId::ALL);
    }

    #[test]
    fn test_local_backend_is_free() {
        assert!(BackendId::Ollama.is_free());
        assert!(!BackendId::DeepSeek.is_free());
    }

    #[test]
    fn test_display_from_str_round_trip() {
        for id in BackendId::ALL {
            assert_eq!(id.to_string().parse::<BackendId>().unwrap(), id);
        }
    }
}
