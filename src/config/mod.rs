//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or environment
//!     → loader.rs (parse & deserialize) / RelayConfig::from_env
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → consumed once by Orchestrator::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the orchestrator never reloads it
//! - All fields have defaults to allow minimal configs
//! - A backend with no entry is excluded, not errored on; zero entries
//!   is the orchestrator's fatal construction case

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendsConfig, HostedBackendConfig, LocalBackendConfig, OrchestratorConfig, RelayConfig,
    TransportConfig,
};
