//! Auto-Trading Control Gate
//!
//! A small persisted state machine with two states, DISABLED (initial) and
//! ENABLED. Enabling requires a fresh GREEN verdict from the probe engine;
//! disabling and emergency stop bypass the health check by design. The
//! state is a singleton artifact written atomically, so no reader ever
//! observes a half-written transition.

use crate::error::{QuantGateError, Result};
use crate::health::{GlobalStatus, HealthStatus, HealthValidator};
use crate::store::{ArtifactPaths, ArtifactStore, SCHEMA_VERSION};
use crate::timeutil::unix_now;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Producer tag stamped into the persisted state artifact
const GATE_PRODUCER: &str = "gate";

/// Persisted gate state. Only the last transition's metadata is retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTradingState {
    pub enabled: bool,
    #[serde(default)]
    pub last_enabled_ts: f64,
    #[serde(default)]
    pub last_disabled_ts: f64,
    #[serde(default)]
    pub enabled_by: String,
    #[serde(default)]
    pub disabled_by: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub health_status: String,
    #[serde(default)]
    pub green_count: u32,
    #[serde(default)]
    pub timestamp: f64,
}

impl Default for AutoTradingState {
    fn default() -> Self {
        Self {
            enabled: false,
            last_enabled_ts: 0.0,
            last_disabled_ts: 0.0,
            enabled_by: String::new(),
            disabled_by: String::new(),
            reason: String::new(),
            health_status: "UNKNOWN".to_string(),
            green_count: 0,
            timestamp: 0.0,
        }
    }
}

/// Outcome of an `enable` attempt
#[derive(Debug, Clone, Serialize)]
pub struct EnableOutcome {
    pub success: bool,
    pub reason: String,
    pub health_status: GlobalStatus,
    pub green_count: u32,
    pub failed_probes: Vec<String>,
}

/// Gate status for display: persisted state plus a fresh health
/// recomputation (the persisted snapshot is never ground truth).
#[derive(Debug, Clone, Serialize)]
pub struct GateStatus {
    pub state: AutoTradingState,
    pub health: HealthStatus,
}

/// The auto-trading control gate
pub struct AutoTradingGate {
    store: Arc<dyn ArtifactStore>,
    validator: HealthValidator,
}

impl AutoTradingGate {
    pub fn new(store: Arc<dyn ArtifactStore>, validator: HealthValidator) -> Self {
        Self { store, validator }
    }

    /// Load the persisted state; absent means never-enabled (the initial
    /// DISABLED state). A corrupt state artifact is treated as DISABLED
    /// rather than trusted.
    pub fn load_state(&self) -> Result<AutoTradingState> {
        match self.store.read_json(ArtifactPaths::AUTO_TRADING_STATE) {
            Ok(Some(value)) => Ok(serde_json::from_value(value)?),
            Ok(None) => Ok(AutoTradingState::default()),
            Err(QuantGateError::SchemaViolation { artifact, detail }) => {
                warn!("unreadable gate state {artifact} ({detail}); treating as disabled");
                Ok(AutoTradingState::default())
            }
            Err(e) => Err(e),
        }
    }

    fn save_state(&self, state: &AutoTradingState) -> Result<()> {
        let payload = serde_json::to_value(state)?;
        self.store.write_json(
            ArtifactPaths::AUTO_TRADING_STATE,
            &payload,
            GATE_PRODUCER,
            SCHEMA_VERSION,
        )
    }

    /// Enable auto trading. Recomputes health first; a RED verdict rejects
    /// the transition with the failing probe names and leaves the persisted
    /// state untouched.
    pub fn enable(&self, actor: &str) -> Result<EnableOutcome> {
        self.enable_at(actor, unix_now())
    }

    /// Enable with an explicit observation instant
    pub fn enable_at(&self, actor: &str, now: f64) -> Result<EnableOutcome> {
        let health = self.validator.validate_at(now);

        if !health.is_green() {
            let failed = health.failed_probes();
            warn!(
                "auto trading enable rejected for {actor}: {}",
                failed.join(", ")
            );
            return Ok(EnableOutcome {
                success: false,
                reason: "system not ready for auto trading".to_string(),
                health_status: health.global_status,
                green_count: health.green_count,
                failed_probes: failed,
            });
        }

        let mut state = self.load_state()?;
        state.enabled = true;
        state.last_enabled_ts = now;
        state.enabled_by = actor.to_string();
        state.reason = "system ready for auto trading".to_string();
        state.health_status = health.global_status.to_string();
        state.green_count = health.green_count;
        state.timestamp = now;
        self.save_state(&state)?;

        info!("auto trading enabled by {actor}");
        Ok(EnableOutcome {
            success: true,
            reason: "auto trading enabled".to_string(),
            health_status: health.global_status,
            green_count: health.green_count,
            failed_probes: Vec::new(),
        })
    }

    /// Disable auto trading unconditionally; only a storage failure can
    /// reject this transition.
    pub fn disable(&self, actor: &str, reason: &str) -> Result<AutoTradingState> {
        self.disable_at(actor, reason, unix_now())
    }

    /// Disable with an explicit observation instant
    pub fn disable_at(&self, actor: &str, reason: &str, now: f64) -> Result<AutoTradingState> {
        let mut state = self.load_state()?;
        state.enabled = false;
        state.last_disabled_ts = now;
        state.disabled_by = actor.to_string();
        state.reason = reason.to_string();
        state.timestamp = now;
        self.save_state(&state)?;

        info!("auto trading disabled by {actor}: {reason}");
        Ok(state)
    }

    /// Halt regardless of system state; bypasses all health checks by
    /// design.
    pub fn emergency_stop(&self, reason: &str) -> Result<AutoTradingState> {
        warn!("EMERGENCY STOP: {reason}");
        self.disable("emergency", reason)
    }

    /// Persisted state merged with a fresh health recomputation
    pub fn status(&self) -> Result<GateStatus> {
        self.status_at(unix_now())
    }

    /// Status with an explicit observation instant
    pub fn status_at(&self, now: f64) -> Result<GateStatus> {
        Ok(GateStatus {
            state: self.load_state()?,
            health: self.validator.validate_at(now),
        })
    }

    /// Preflight check for live order submission: gate enabled and the
    /// current verdict GREEN.
    pub fn can_trade(&self) -> Result<bool> {
        let status = self.status()?;
        Ok(status.state.enabled && status.health.safe_to_trade)
    }
}
