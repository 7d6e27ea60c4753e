//! Aggregate statistics exposed to callers.

use crate::backend::BackendStatsSnapshot;
use serde::Serialize;

/// Point-in-time view of orchestrator and per-backend counters.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStats {
    /// Top-level calls received.
    pub total_calls: u64,
    /// Calls that returned a result.
    pub succeeded: u64,
    /// Calls that exhausted their retry budget.
    pub failed: u64,
    /// Individual backend attempts that failed (a call may contribute
    /// several before succeeding on a later candidate).
    pub failed_attempts: u64,
    /// Estimated spend summed across all backends, in USD.
    pub total_cost: f64,
    /// Per-backend usage counters.
    #[serde(serialize_with = "serialize_backends")]
    pub backends: Vec<BackendStatsSnapshot>,
}

fn serialize_backends<S>(
    backends: &[BackendStatsSnapshot],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(backends.len()))?;
    for snap in backends {
        map.serialize_entry(
            &snap.backend.to_string(),
            &serde_json::json!({
                "requests": snap.requests,
                "failures": snap.failures,
                "tokens": snap.tokens,
                "cost": snap.cost,
            }),
        )?;
    }
    map.end()
}
