//! Canonical artifact paths under the SSOT root.
//!
//! Every inter-service artifact has exactly one relative path listed here;
//! services never invent their own locations.

/// Registry of relative artifact paths
pub struct ArtifactPaths;

impl ArtifactPaths {
    /// Primary data-bus snapshot, written by the feeder
    pub const DATABUS_SNAPSHOT: &'static str = "databus_snapshot.json";

    /// Positions snapshot, written by the position recorder
    pub const POSITIONS_SNAPSHOT: &'static str = "positions.json";

    /// Append-only signal candidates log, written by the signal service
    pub const CANDIDATES_LOG: &'static str = "signals/candidates.ndjson";

    /// Canonical environment snapshot (env hash + mode)
    pub const ENV_SNAPSHOT: &'static str = "env/env_snapshot.json";

    /// Persisted auto-trading gate state
    pub const AUTO_TRADING_STATE: &'static str = "ops/auto_trading_state.json";

    /// Heartbeat artifact for a service
    pub fn heartbeat(service: &str) -> String {
        format!("health/{service}.json")
    }
}

/// Known heartbeat producers, one artifact each
pub const KNOWN_SERVICES: [&str; 5] = ["feeder", "trader", "ares", "positions", "autoheal"];

/// Artifacts with a single expected writer, enforced by the
/// writer-role-uniqueness contract.
pub const WRITER_ROLES: [(&str, &str); 3] = [
    (ArtifactPaths::DATABUS_SNAPSHOT, "feeder"),
    (ArtifactPaths::POSITIONS_SNAPSHOT, "positions"),
    (ArtifactPaths::CANDIDATES_LOG, "ares"),
];
