//! Health Probe Engine
//!
//! Seven independent probes over the current SSOT artifacts, aggregated to
//! a single GREEN/RED verdict. Stateless per invocation: `validate()`
//! always recomputes from the artifacts, nothing is cached across calls.
//! Every probe fails closed — an unexpected error becomes a failed
//! `ProbeResult` carrying the error text, never a panic or a propagated
//! error.

use crate::config::{AppConfig, ProbeConfig};
use crate::contracts::artifact_producer;
use crate::environment::{short_hash, EnvSnapshot};
use crate::error::Result;
use crate::heartbeat;
use crate::store::{ArtifactPaths, ArtifactStore};
use crate::timeutil::unix_now;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Aggregate verdict; GREEN only when every probe passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GlobalStatus {
    Green,
    Red,
}

impl std::fmt::Display for GlobalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlobalStatus::Green => write!(f, "GREEN"),
            GlobalStatus::Red => write!(f, "RED"),
        }
    }
}

/// One probe outcome. Ephemeral: produced fresh on every validation, never
/// persisted standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe_name: String,
    pub passed: bool,
    pub message: String,
    pub age_seconds: f64,
    pub threshold_seconds: f64,
    pub timestamp: f64,
}

impl ProbeResult {
    fn pass(name: &str, message: String, age: f64, threshold: f64, now: f64) -> Self {
        Self {
            probe_name: name.to_string(),
            passed: true,
            message,
            age_seconds: age,
            threshold_seconds: threshold,
            timestamp: now,
        }
    }

    fn fail(name: &str, message: String, age: f64, threshold: f64, now: f64) -> Self {
        Self {
            probe_name: name.to_string(),
            passed: false,
            message,
            age_seconds: age,
            threshold_seconds: threshold,
            timestamp: now,
        }
    }
}

/// Aggregated health verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ws_stream_databus: bool,
    pub positions_snapshot: bool,
    pub ares_signal_flow: bool,
    pub trader_readiness: bool,
    pub env_drift: bool,
    pub integration_contracts: bool,
    pub autoheal_recovery: bool,
    pub probe_results: Vec<ProbeResult>,
    pub green_count: u32,
    pub global_status: GlobalStatus,
    pub safe_to_trade: bool,
    pub timestamp: f64,
}

impl HealthStatus {
    pub const TOTAL_PROBES: u32 = 7;

    pub fn is_green(&self) -> bool {
        self.global_status == GlobalStatus::Green
    }

    /// Names of the probes that failed this pass
    pub fn failed_probes(&self) -> Vec<String> {
        self.probe_results
            .iter()
            .filter(|p| !p.passed)
            .map(|p| p.probe_name.clone())
            .collect()
    }

    /// One-line operator summary
    pub fn summary(&self) -> String {
        if self.is_green() {
            format!("GREEN ({}/7) - safe to trade", self.green_count)
        } else {
            format!(
                "RED ({}/7) - failed: {}",
                self.green_count,
                self.failed_probes().join(", ")
            )
        }
    }
}

/// Seven-probe validator over one artifact store
#[derive(Clone)]
pub struct HealthValidator {
    store: Arc<dyn ArtifactStore>,
    probes: ProbeConfig,
    supervisor_enabled: bool,
    allow_signal_less_ticks: bool,
    env_hash: String,
}

impl HealthValidator {
    pub fn new(store: Arc<dyn ArtifactStore>, config: &AppConfig, env_hash: &str) -> Self {
        Self {
            store,
            probes: config.probes.clone(),
            supervisor_enabled: config.supervisor.enabled,
            allow_signal_less_ticks: config.signals.allow_signal_less_ticks,
            env_hash: env_hash.to_string(),
        }
    }

    pub fn probes(&self) -> &ProbeConfig {
        &self.probes
    }

    pub fn env_hash(&self) -> &str {
        &self.env_hash
    }

    /// Recompute the full verdict from current artifacts
    pub fn validate(&self) -> HealthStatus {
        self.validate_at(unix_now())
    }

    /// Recompute at an explicit observation instant
    pub fn validate_at(&self, now: f64) -> HealthStatus {
        let mut results = Vec::with_capacity(HealthStatus::TOTAL_PROBES as usize);

        let ws_stream_databus = self.run_probe(
            &mut results,
            "ws_stream_databus",
            self.probes.databus_max_age_secs,
            now,
            |v| v.probe_ws_stream_databus(now),
        );
        let positions_snapshot = self.run_probe(
            &mut results,
            "positions_snapshot",
            self.probes.positions_max_age_secs,
            now,
            |v| v.probe_positions_snapshot(now),
        );
        let ares_signal_flow = self.run_probe(
            &mut results,
            "ares_signal_flow",
            self.probes.candidates_idle_max_age_secs,
            now,
            |v| v.probe_ares_signal_flow(now),
        );
        let trader_readiness = self.run_probe(
            &mut results,
            "trader_readiness",
            self.probes.trader_max_age_secs,
            now,
            |v| v.probe_trader_readiness(now),
        );
        let env_drift = self.run_probe(
            &mut results,
            "env_drift",
            self.probes.env_snapshot_max_age_secs,
            now,
            |v| v.probe_env_drift(now),
        );
        let integration_contracts = self.run_probe(
            &mut results,
            "integration_contracts",
            self.probes.contract_artifact_max_age_secs,
            now,
            |v| v.probe_integration_contracts(now),
        );
        let autoheal_recovery = self.run_probe(
            &mut results,
            "autoheal_recovery",
            self.probes.autoheal_max_age_secs,
            now,
            |v| v.probe_autoheal_recovery(now),
        );

        let green_count = results.iter().filter(|r| r.passed).count() as u32;
        let global_status = if green_count == HealthStatus::TOTAL_PROBES {
            GlobalStatus::Green
        } else {
            GlobalStatus::Red
        };

        HealthStatus {
            ws_stream_databus,
            positions_snapshot,
            ares_signal_flow,
            trader_readiness,
            env_drift,
            integration_contracts,
            autoheal_recovery,
            probe_results: results,
            green_count,
            global_status,
            safe_to_trade: global_status == GlobalStatus::Green,
            timestamp: now,
        }
    }

    /// Run one probe, folding any error into a failed result
    fn run_probe<F>(
        &self,
        results: &mut Vec<ProbeResult>,
        name: &str,
        threshold: f64,
        now: f64,
        probe: F,
    ) -> bool
    where
        F: FnOnce(&Self) -> Result<ProbeResult>,
    {
        let result = match probe(self) {
            Ok(result) => result,
            Err(e) => ProbeResult::fail(
                name,
                format!("validation error: {e}"),
                f64::INFINITY,
                threshold,
                now,
            ),
        };
        let passed = result.passed;
        results.push(result);
        passed
    }

    fn probe_ws_stream_databus(&self, now: f64) -> Result<ProbeResult> {
        const NAME: &str = "ws_stream_databus";
        let threshold = self.probes.databus_max_age_secs;

        let age = self
            .store
            .modified_age(ArtifactPaths::DATABUS_SNAPSHOT, now)?;
        if age.is_infinite() {
            return Ok(ProbeResult::fail(
                NAME,
                "data-bus snapshot missing".to_string(),
                age,
                threshold,
                now,
            ));
        }
        if age > threshold {
            return Ok(ProbeResult::fail(
                NAME,
                format!("data-bus snapshot stale: {age:.1}s > {threshold}s"),
                age,
                threshold,
                now,
            ));
        }

        let Some(doc) = self.store.read_json(ArtifactPaths::DATABUS_SNAPSHOT)? else {
            return Ok(ProbeResult::fail(
                NAME,
                "data-bus snapshot missing".to_string(),
                f64::INFINITY,
                threshold,
                now,
            ));
        };

        let symbols = databus_symbols(&doc);
        if symbols.is_empty() {
            return Ok(ProbeResult::fail(
                NAME,
                "data-bus symbol list empty".to_string(),
                age,
                threshold,
                now,
            ));
        }
        for symbol in &symbols {
            if *symbol != symbol.to_uppercase() {
                return Ok(ProbeResult::fail(
                    NAME,
                    format!("symbol not uppercase: {symbol}"),
                    age,
                    threshold,
                    now,
                ));
            }
        }
        if !symbols.contains(&self.probes.anchor_symbol) {
            return Ok(ProbeResult::fail(
                NAME,
                format!("{} not in data-bus symbols", self.probes.anchor_symbol),
                age,
                threshold,
                now,
            ));
        }

        Ok(ProbeResult::pass(
            NAME,
            format!("data-bus healthy ({} symbols)", symbols.len()),
            age,
            threshold,
            now,
        ))
    }

    fn probe_positions_snapshot(&self, now: f64) -> Result<ProbeResult> {
        const NAME: &str = "positions_snapshot";
        let threshold = self.probes.positions_max_age_secs;

        let age = self
            .store
            .modified_age(ArtifactPaths::POSITIONS_SNAPSHOT, now)?;
        if age.is_infinite() {
            return Ok(ProbeResult::fail(
                NAME,
                "positions snapshot missing".to_string(),
                age,
                threshold,
                now,
            ));
        }
        if age > threshold {
            return Ok(ProbeResult::fail(
                NAME,
                format!("positions snapshot stale: {age:.1}s > {threshold}s"),
                age,
                threshold,
                now,
            ));
        }

        let Some(doc) = self.store.read_json(ArtifactPaths::POSITIONS_SNAPSHOT)? else {
            return Ok(ProbeResult::fail(
                NAME,
                "positions snapshot missing".to_string(),
                f64::INFINITY,
                threshold,
                now,
            ));
        };

        let entries = doc
            .get("positions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for entry in &entries {
            for field in ["symbol", "side", "quantity"] {
                if entry.get(field).is_none() {
                    return Ok(ProbeResult::fail(
                        NAME,
                        format!("position missing field {field}"),
                        age,
                        threshold,
                        now,
                    ));
                }
            }
            if let Some(symbol) = entry.get("symbol").and_then(Value::as_str) {
                if symbol != symbol.to_uppercase() {
                    return Ok(ProbeResult::fail(
                        NAME,
                        format!("position symbol not uppercase: {symbol}"),
                        age,
                        threshold,
                        now,
                    ));
                }
            }
        }

        Ok(ProbeResult::pass(
            NAME,
            format!("positions snapshot healthy ({} entries)", entries.len()),
            age,
            threshold,
            now,
        ))
    }

    fn probe_ares_signal_flow(&self, now: f64) -> Result<ProbeResult> {
        const NAME: &str = "ares_signal_flow";

        let Some(record) = heartbeat::load(self.store.as_ref(), "ares")? else {
            return Ok(ProbeResult::fail(
                NAME,
                "signal heartbeat missing".to_string(),
                f64::INFINITY,
                self.probes.candidates_idle_max_age_secs,
                now,
            ));
        };

        let age = now - record.timestamp;
        let is_real_signal = record.payload_bool("is_real_signal");
        // Heartbeat-only ticks get a shorter grace period than genuine
        // signal emissions.
        let threshold = if is_real_signal {
            self.probes.candidates_real_max_age_secs
        } else {
            self.probes.candidates_idle_max_age_secs
        };

        if age > threshold {
            return Ok(ProbeResult::fail(
                NAME,
                format!("signal heartbeat stale: {age:.1}s > {threshold}s"),
                age,
                threshold,
                now,
            ));
        }

        let candidates = record
            .payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if candidates.is_empty() && !is_real_signal {
            if self.allow_signal_less_ticks {
                return Ok(ProbeResult::pass(
                    NAME,
                    "signal service running (no candidates this tick)".to_string(),
                    age,
                    threshold,
                    now,
                ));
            }
            return Ok(ProbeResult::fail(
                NAME,
                "no signal candidates produced".to_string(),
                age,
                threshold,
                now,
            ));
        }

        for candidate in &candidates {
            if let Some(symbol) = candidate.get("symbol").and_then(Value::as_str) {
                if symbol != symbol.to_uppercase() {
                    return Ok(ProbeResult::fail(
                        NAME,
                        format!("candidate symbol not uppercase: {symbol}"),
                        age,
                        threshold,
                        now,
                    ));
                }
            }
        }

        Ok(ProbeResult::pass(
            NAME,
            format!("signal flow healthy ({} candidates)", candidates.len()),
            age,
            threshold,
            now,
        ))
    }

    fn probe_trader_readiness(&self, now: f64) -> Result<ProbeResult> {
        const NAME: &str = "trader_readiness";
        let threshold = self.probes.trader_max_age_secs;

        let Some(record) = heartbeat::load(self.store.as_ref(), "trader")? else {
            return Ok(ProbeResult::fail(
                NAME,
                "trader heartbeat missing".to_string(),
                f64::INFINITY,
                threshold,
                now,
            ));
        };

        let age = now - record.timestamp;
        if age > threshold {
            return Ok(ProbeResult::fail(
                NAME,
                format!("trader heartbeat stale: {age:.1}s > {threshold}s"),
                age,
                threshold,
                now,
            ));
        }

        if !record.payload_bool("exchange_info_loaded") {
            return Ok(ProbeResult::fail(
                NAME,
                "trader exchange info not loaded".to_string(),
                age,
                threshold,
                now,
            ));
        }

        let rest_age = now - record.payload_f64("last_rest_ok_ts").unwrap_or(0.0);
        if rest_age > self.probes.rest_ok_max_age_secs {
            return Ok(ProbeResult::fail(
                NAME,
                format!(
                    "trader REST connection stale: {rest_age:.1}s > {}s",
                    self.probes.rest_ok_max_age_secs
                ),
                age,
                threshold,
                now,
            ));
        }

        let balances_age = now - record.payload_f64("balances_fresh_ts").unwrap_or(0.0);
        if balances_age > self.probes.balances_max_age_secs {
            return Ok(ProbeResult::fail(
                NAME,
                format!(
                    "trader balances stale: {balances_age:.1}s > {}s",
                    self.probes.balances_max_age_secs
                ),
                age,
                threshold,
                now,
            ));
        }

        if record.payload_bool("circuit_breaker_active") {
            return Ok(ProbeResult::fail(
                NAME,
                "trader circuit breaker active".to_string(),
                age,
                threshold,
                now,
            ));
        }

        Ok(ProbeResult::pass(
            NAME,
            "trader ready".to_string(),
            age,
            threshold,
            now,
        ))
    }

    fn probe_env_drift(&self, now: f64) -> Result<ProbeResult> {
        const NAME: &str = "env_drift";
        let threshold = self.probes.env_snapshot_max_age_secs;

        let Some(snapshot) = EnvSnapshot::read(self.store.as_ref())? else {
            return Ok(ProbeResult::fail(
                NAME,
                "environment snapshot missing".to_string(),
                f64::INFINITY,
                threshold,
                now,
            ));
        };

        if snapshot.env_hash != self.env_hash {
            return Ok(ProbeResult::fail(
                NAME,
                format!(
                    "ENV_HASH mismatch: local={} snapshot={}",
                    short_hash(&self.env_hash),
                    short_hash(&snapshot.env_hash)
                ),
                0.0,
                threshold,
                now,
            ));
        }

        let age = now - snapshot.written_at;
        if age > threshold {
            return Ok(ProbeResult::fail(
                NAME,
                format!("environment snapshot stale: {age:.1}s > {threshold}s"),
                age,
                threshold,
                now,
            ));
        }

        Ok(ProbeResult::pass(
            NAME,
            format!(
                "environment consistent (hash {})",
                short_hash(&self.env_hash)
            ),
            age,
            threshold,
            now,
        ))
    }

    /// Narrow, probe-scoped re-check of the candidates and positions
    /// artifacts: existence, freshness, and producer tag. The broader
    /// five-check validator is a separate consumer-facing surface.
    fn probe_integration_contracts(&self, now: f64) -> Result<ProbeResult> {
        const NAME: &str = "integration_contracts";
        let threshold = self.probes.contract_artifact_max_age_secs;

        let checks = [
            (ArtifactPaths::CANDIDATES_LOG, "ares"),
            (ArtifactPaths::POSITIONS_SNAPSHOT, "positions"),
        ];

        let mut issues = Vec::new();
        let mut worst_age: f64 = 0.0;

        for (artifact, expected) in checks {
            let age = self.store.modified_age(artifact, now)?;
            if age.is_infinite() {
                issues.push(format!("missing: {artifact}"));
                worst_age = f64::INFINITY;
                continue;
            }
            worst_age = worst_age.max(age);
            if age > threshold {
                issues.push(format!("stale: {artifact} ({age:.1}s > {threshold}s)"));
                continue;
            }
            match artifact_producer(self.store.as_ref(), artifact) {
                Ok(Some(found)) if found != expected => {
                    issues.push(format!("wrong writer for {artifact}: {found}"));
                }
                Ok(_) => {}
                Err(e) => issues.push(format!("unreadable {artifact}: {e}")),
            }
        }

        if issues.is_empty() {
            Ok(ProbeResult::pass(
                NAME,
                "integration contracts healthy (artifacts fresh)".to_string(),
                worst_age,
                threshold,
                now,
            ))
        } else {
            Ok(ProbeResult::fail(
                NAME,
                format!("integration contracts failed: {}", issues.join("; ")),
                worst_age,
                threshold,
                now,
            ))
        }
    }

    fn probe_autoheal_recovery(&self, now: f64) -> Result<ProbeResult> {
        const NAME: &str = "autoheal_recovery";
        let threshold = self.probes.autoheal_max_age_secs;

        // Disabled supervision is not itself a fault
        if !self.supervisor_enabled {
            return Ok(ProbeResult::pass(
                NAME,
                "skipped (supervisor disabled)".to_string(),
                0.0,
                threshold,
                now,
            ));
        }

        let Some(record) = heartbeat::load(self.store.as_ref(), "autoheal")? else {
            return Ok(ProbeResult::fail(
                NAME,
                "supervisor heartbeat missing".to_string(),
                f64::INFINITY,
                threshold,
                now,
            ));
        };

        let age = now - record.timestamp;
        if age > threshold {
            return Ok(ProbeResult::fail(
                NAME,
                format!("supervisor heartbeat stale: {age:.1}s > {threshold}s"),
                age,
                threshold,
                now,
            ));
        }

        let failure_count = record.payload_f64("failure_count").unwrap_or(0.0) as u64;
        if failure_count > self.probes.autoheal_max_failures {
            return Ok(ProbeResult::fail(
                NAME,
                format!(
                    "supervisor repeated failures: {failure_count} > {}",
                    self.probes.autoheal_max_failures
                ),
                age,
                threshold,
                now,
            ));
        }

        Ok(ProbeResult::pass(
            NAME,
            format!("supervisor healthy ({age:.1}s)"),
            age,
            threshold,
            now,
        ))
    }
}

/// Symbols list from a data-bus document; supports both the current shape
/// (`symbols` at the root) and the legacy shape nested under `prices`.
fn databus_symbols(doc: &Value) -> Vec<String> {
    let direct = doc.get("symbols").and_then(Value::as_array);
    let nested = doc
        .get("prices")
        .and_then(|p| p.get("symbols"))
        .and_then(Value::as_array);
    direct
        .or(nested)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::{FsStore, SCHEMA_VERSION};
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<FsStore>, AppConfig) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FsStore::new(dir.path()).unwrap());
        let config = AppConfig::default_config(dir.path());
        (dir, store, config)
    }

    fn validator(store: &Arc<FsStore>, config: &AppConfig) -> HealthValidator {
        HealthValidator::new(store.clone(), config, "localhash")
    }

    fn write_heartbeat(store: &FsStore, service: &str, now: f64, extra: serde_json::Value) {
        let mut payload = json!({
            "timestamp": now,
            "service": service,
            "env_hash": "localhash",
            "entrypoint_ok": true,
            "uptime_seconds": 60,
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut payload, extra) {
            base.extend(extra);
        }
        store
            .write_json(
                &ArtifactPaths::heartbeat(service),
                &payload,
                service,
                SCHEMA_VERSION,
            )
            .unwrap();
    }

    fn write_green_system(store: &FsStore, now: f64) {
        write_heartbeat(
            store,
            "feeder",
            now,
            json!({"symbols": ["BTCUSDT", "ETHUSDT"]}),
        );
        write_heartbeat(
            store,
            "ares",
            now,
            json!({
                "candidates": [{"symbol": "BTCUSDT", "side": "BUY", "score": 0.9}],
                "is_real_signal": true,
                "last_signal_update": now,
            }),
        );
        write_heartbeat(
            store,
            "trader",
            now,
            json!({
                "exchange_info_loaded": true,
                "last_rest_ok_ts": now,
                "balances_fresh_ts": now,
                "circuit_breaker_active": false,
            }),
        );
        write_heartbeat(
            store,
            "positions",
            now,
            json!({"positions": [{"symbol": "BTCUSDT", "side": "BUY", "quantity": "0.001"}]}),
        );

        store
            .write_json(
                ArtifactPaths::DATABUS_SNAPSHOT,
                &json!({"timestamp": now, "symbols": ["BTCUSDT", "ETHUSDT"], "prices": {}}),
                "feeder",
                SCHEMA_VERSION,
            )
            .unwrap();
        store
            .write_json(
                ArtifactPaths::POSITIONS_SNAPSHOT,
                &json!({
                    "timestamp": now,
                    "positions": [{"symbol": "BTCUSDT", "side": "BUY", "quantity": "0.001"}],
                    "position_count": 1,
                }),
                "positions",
                SCHEMA_VERSION,
            )
            .unwrap();
        store
            .append_line(
                ArtifactPaths::CANDIDATES_LOG,
                &json!({"timestamp": now, "candidate": {"symbol": "BTCUSDT"}}),
                "ares",
                SCHEMA_VERSION,
            )
            .unwrap();

        EnvSnapshot::new("localhash", "testnet").write(store).unwrap();
    }

    #[test]
    fn test_all_green_when_system_fresh() {
        let (_dir, store, config) = setup();
        let now = unix_now();
        write_green_system(&store, now);

        let status = validator(&store, &config).validate_at(now);
        assert_eq!(status.green_count, 7, "probes: {:?}", status.probe_results);
        assert_eq!(status.global_status, GlobalStatus::Green);
        assert!(status.safe_to_trade);
    }

    #[test]
    fn test_empty_root_is_all_red_except_autoheal() {
        let (_dir, store, config) = setup();
        let status = validator(&store, &config).validate_at(unix_now());

        // Supervisor disabled in default config counts as a pass
        assert!(status.autoheal_recovery);
        assert_eq!(status.green_count, 1);
        assert_eq!(status.global_status, GlobalStatus::Red);
        assert!(!status.safe_to_trade);

        let missing = status
            .probe_results
            .iter()
            .find(|p| p.probe_name == "ws_stream_databus")
            .unwrap();
        assert!(missing.message.contains("missing"));
        assert!(missing.age_seconds.is_infinite());
    }

    #[test]
    fn test_single_failure_forces_red() {
        let (_dir, store, config) = setup();
        let now = unix_now();
        write_green_system(&store, now);
        // Trip only the trader circuit breaker
        write_heartbeat(
            &store,
            "trader",
            now,
            json!({
                "exchange_info_loaded": true,
                "last_rest_ok_ts": now,
                "balances_fresh_ts": now,
                "circuit_breaker_active": true,
            }),
        );

        let status = validator(&store, &config).validate_at(now);
        assert_eq!(status.green_count, 6);
        assert_eq!(status.global_status, GlobalStatus::Red);
        assert!(!status.safe_to_trade);
        assert_eq!(status.failed_probes(), vec!["trader_readiness"]);
    }

    #[test]
    fn test_trader_fresh_heartbeat_passes_at_5s() {
        let (_dir, store, config) = setup();
        let t0 = unix_now();
        write_heartbeat(
            &store,
            "trader",
            t0,
            json!({
                "exchange_info_loaded": true,
                "last_rest_ok_ts": t0,
                "balances_fresh_ts": t0,
                "circuit_breaker_active": false,
            }),
        );

        let status = validator(&store, &config).validate_at(t0 + 5.0);
        assert!(status.trader_readiness);
    }

    #[test]
    fn test_trader_stale_heartbeat_fails_at_20s() {
        let (_dir, store, config) = setup();
        let t0 = unix_now();
        write_heartbeat(
            &store,
            "trader",
            t0,
            json!({
                "exchange_info_loaded": true,
                "last_rest_ok_ts": t0,
                "balances_fresh_ts": t0,
                "circuit_breaker_active": false,
            }),
        );

        let status = validator(&store, &config).validate_at(t0 + 20.0);
        assert!(!status.trader_readiness);
        let probe = status
            .probe_results
            .iter()
            .find(|p| p.probe_name == "trader_readiness")
            .unwrap();
        assert!(probe.message.contains("20.0s > 15s"), "{}", probe.message);
    }

    #[test]
    fn test_env_drift_mismatch_names_both_prefixes() {
        let (_dir, store, config) = setup();
        let now = unix_now();
        EnvSnapshot::new("abc12345", "testnet").write(store.as_ref()).unwrap();

        let validator = HealthValidator::new(store.clone(), &config, "def67890");
        let status = validator.validate_at(now);
        assert!(!status.env_drift);
        let probe = status
            .probe_results
            .iter()
            .find(|p| p.probe_name == "env_drift")
            .unwrap();
        assert!(probe.message.contains("abc12345"));
        assert!(probe.message.contains("def67890"));
    }

    #[test]
    fn test_signal_flow_stale_real_signal_bound() {
        let (_dir, store, config) = setup();
        let now = unix_now();
        write_green_system(&store, now);
        // Real signal, 200s old: over the 150s bound
        write_heartbeat(
            &store,
            "ares",
            now - 200.0,
            json!({
                "candidates": [{"symbol": "BTCUSDT", "side": "BUY", "score": 0.9}],
                "is_real_signal": true,
                "last_signal_update": now - 200.0,
            }),
        );

        let status = validator(&store, &config).validate_at(now);
        assert!(!status.ares_signal_flow);
        assert_eq!(status.green_count, 6);
        assert_eq!(status.failed_probes(), vec!["ares_signal_flow"]);
        let probe = status
            .probe_results
            .iter()
            .find(|p| p.probe_name == "ares_signal_flow")
            .unwrap();
        assert_eq!(probe.threshold_seconds, 150.0);
        assert!(probe.message.contains("200.0s > 150s"), "{}", probe.message);
    }

    #[test]
    fn test_signal_flow_idle_tick_uses_shorter_bound() {
        let (_dir, store, config) = setup();
        let now = unix_now();
        write_green_system(&store, now);
        // Heartbeat-only tick, 100s old: within 150s but over the 75s idle bound
        write_heartbeat(
            &store,
            "ares",
            now - 100.0,
            json!({
                "candidates": [],
                "is_real_signal": false,
                "last_signal_update": now - 100.0,
            }),
        );

        let status = validator(&store, &config).validate_at(now);
        assert!(!status.ares_signal_flow);
    }

    #[test]
    fn test_signal_less_tick_rejected_when_flag_off() {
        let (_dir, store, mut config) = setup();
        config.signals.allow_signal_less_ticks = false;
        let now = unix_now();
        write_green_system(&store, now);
        write_heartbeat(
            &store,
            "ares",
            now,
            json!({
                "candidates": [],
                "is_real_signal": false,
                "last_signal_update": now,
            }),
        );

        let status = validator(&store, &config).validate_at(now);
        assert!(!status.ares_signal_flow);
    }

    #[test]
    fn test_autoheal_disabled_counts_as_pass() {
        let (_dir, store, config) = setup();
        // Supervisor disabled, no heartbeat at all
        let status = validator(&store, &config).validate_at(unix_now());
        let probe = status
            .probe_results
            .iter()
            .find(|p| p.probe_name == "autoheal_recovery")
            .unwrap();
        assert!(probe.passed);
        assert!(probe.message.contains("skipped"));
    }

    #[test]
    fn test_autoheal_enabled_requires_heartbeat() {
        let (_dir, store, mut config) = setup();
        config.supervisor.enabled = true;
        let now = unix_now();

        let status = validator(&store, &config).validate_at(now);
        assert!(!status.autoheal_recovery);

        write_heartbeat(
            &store,
            "autoheal",
            now,
            json!({"failure_count": 0, "status": "MONITORING"}),
        );
        let status = validator(&store, &config).validate_at(now);
        assert!(status.autoheal_recovery);
    }

    #[test]
    fn test_autoheal_failure_counter_bound() {
        let (_dir, store, mut config) = setup();
        config.supervisor.enabled = true;
        let now = unix_now();
        write_heartbeat(
            &store,
            "autoheal",
            now,
            json!({"failure_count": 5, "status": "RECOVERING"}),
        );

        let status = validator(&store, &config).validate_at(now);
        assert!(!status.autoheal_recovery);
        let probe = status
            .probe_results
            .iter()
            .find(|p| p.probe_name == "autoheal_recovery")
            .unwrap();
        assert!(probe.message.contains("5 > 3"));
    }

    #[test]
    fn test_corrupt_heartbeat_fails_closed() {
        let (dir, store, config) = setup();
        let now = unix_now();
        write_green_system(&store, now);
        std::fs::write(dir.path().join("health/trader.json"), b"{broken").unwrap();

        let status = validator(&store, &config).validate_at(now);
        assert!(!status.trader_readiness);
        let probe = status
            .probe_results
            .iter()
            .find(|p| p.probe_name == "trader_readiness")
            .unwrap();
        assert!(probe.message.contains("validation error"));
    }

    #[test]
    fn test_integration_contracts_probe_flags_wrong_writer() {
        let (_dir, store, config) = setup();
        let now = unix_now();
        write_green_system(&store, now);
        store
            .write_json(
                ArtifactPaths::POSITIONS_SNAPSHOT,
                &json!({"timestamp": now, "positions": [], "position_count": 0}),
                "trader",
                SCHEMA_VERSION,
            )
            .unwrap();

        let status = validator(&store, &config).validate_at(now);
        assert!(!status.integration_contracts);
        let probe = status
            .probe_results
            .iter()
            .find(|p| p.probe_name == "integration_contracts")
            .unwrap();
        assert!(probe.message.contains("wrong writer"));
    }
}
