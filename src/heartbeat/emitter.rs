//! Heartbeat producer side.
//!
//! An emitter binds to a service name at construction and rewrites that
//! service's heartbeat artifact on every `emit`. Emission runs on its own
//! periodic task so it never blocks on, or is blocked by, consumers of the
//! health verdict. There is no protocol-level retry: a failed write is
//! logged and the next tick tries again.

use crate::domain::{DatabusSnapshot, PositionEntry, PositionsSnapshot, SignalCandidate};
use crate::error::Result;
use crate::heartbeat::JsonMap;
use crate::store::{ArtifactPaths, ArtifactStore, SCHEMA_VERSION};
use crate::timeutil::unix_now;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Periodic heartbeat writer for one service
pub struct HeartbeatEmitter {
    store: Arc<dyn ArtifactStore>,
    service: String,
    env_hash: String,
    started_at: f64,
    entrypoint_ok: AtomicBool,
    running: Arc<AtomicBool>,
}

impl HeartbeatEmitter {
    /// Bind an emitter to a service name
    pub fn new(store: Arc<dyn ArtifactStore>, service: &str, env_hash: &str) -> Self {
        Self {
            store,
            service: service.to_string(),
            env_hash: env_hash.to_string(),
            started_at: unix_now(),
            entrypoint_ok: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Record that startup probing succeeded; stamped into every heartbeat
    pub fn mark_entrypoint_ok(&self) {
        self.entrypoint_ok.store(true, Ordering::SeqCst);
        info!("ENTRYPOINT_OK service={}", self.service);
    }

    /// Merge the standard envelope fields with `payload` and rewrite the
    /// heartbeat artifact atomically.
    pub fn emit(&self, payload: JsonMap) -> Result<()> {
        let now = unix_now();
        let mut doc = payload;
        doc.insert("timestamp".to_string(), json!(now));
        doc.insert("service".to_string(), json!(self.service));
        doc.insert("env_hash".to_string(), json!(self.env_hash));
        doc.insert(
            "entrypoint_ok".to_string(),
            json!(self.entrypoint_ok.load(Ordering::SeqCst)),
        );
        doc.insert(
            "uptime_seconds".to_string(),
            json!((now - self.started_at).max(0.0) as u64),
        );

        self.store.write_json(
            &ArtifactPaths::heartbeat(&self.service),
            &Value::Object(doc),
            &self.service,
            SCHEMA_VERSION,
        )?;
        debug!("heartbeat emitted for {}", self.service);
        Ok(())
    }

    /// Start the periodic emission task. `payload_fn` is polled on every
    /// tick; write failures are logged and the next tick retries.
    pub fn start<F>(self: Arc<Self>, interval: Duration, payload_fn: F)
    where
        F: Fn() -> JsonMap + Send + Sync + 'static,
    {
        self.running.store(true, Ordering::SeqCst);
        let emitter = self;
        info!(
            "heartbeat emitter started for {} (interval: {:?})",
            emitter.service, interval
        );

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);

            while emitter.running.load(Ordering::SeqCst) {
                timer.tick().await;
                if let Err(e) = emitter.emit(payload_fn()) {
                    warn!("heartbeat write failed for {}: {}", emitter.service, e);
                }
            }

            info!("heartbeat emitter stopped for {}", emitter.service);
        });
    }

    /// Stop the periodic emission task
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Feeder tick: heartbeat plus the data-bus snapshot artifact
    pub fn emit_feeder(
        &self,
        symbols: &[String],
        prices: &BTreeMap<String, Decimal>,
    ) -> Result<()> {
        let uppercase: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();

        let snapshot = DatabusSnapshot {
            timestamp: unix_now(),
            symbols: uppercase.clone(),
            prices: prices.clone(),
        };
        self.store.write_json(
            ArtifactPaths::DATABUS_SNAPSHOT,
            &serde_json::to_value(&snapshot)?,
            &self.service,
            SCHEMA_VERSION,
        )?;

        self.emit(payload_map(json!({
            "symbols": uppercase,
            "symbol_count": snapshot.symbols.len(),
            "last_price_update": snapshot.timestamp,
        })))
    }

    /// Trader tick with the readiness fields the probes consume
    pub fn emit_trader(
        &self,
        exchange_info_loaded: bool,
        last_rest_ok_ts: f64,
        balances_fresh_ts: f64,
        circuit_breaker_active: bool,
    ) -> Result<()> {
        self.emit(payload_map(json!({
            "exchange_info_loaded": exchange_info_loaded,
            "last_rest_ok_ts": last_rest_ok_ts,
            "balances_fresh_ts": balances_fresh_ts,
            "circuit_breaker_active": circuit_breaker_active,
        })))
    }

    /// Signal-service tick: heartbeat plus one appended log line per
    /// candidate.
    pub fn emit_signals(
        &self,
        candidates: &[SignalCandidate],
        is_real_signal: bool,
    ) -> Result<()> {
        let now = unix_now();
        for candidate in candidates {
            let line = json!({
                "timestamp": now,
                "service": self.service,
                "env_hash": self.env_hash,
                "is_real_signal": is_real_signal,
                "candidate": candidate,
            });
            self.store.append_line(
                ArtifactPaths::CANDIDATES_LOG,
                &line,
                &self.service,
                SCHEMA_VERSION,
            )?;
        }

        self.emit(payload_map(json!({
            "candidates": candidates,
            "candidate_count": candidates.len(),
            "is_real_signal": is_real_signal,
            "last_signal_update": now,
        })))
    }

    /// Position-recorder tick: heartbeat plus the positions snapshot
    pub fn emit_positions(&self, entries: &[PositionEntry]) -> Result<()> {
        let snapshot = PositionsSnapshot {
            timestamp: unix_now(),
            positions: entries.to_vec(),
            position_count: entries.len(),
        };
        self.store.write_json(
            ArtifactPaths::POSITIONS_SNAPSHOT,
            &serde_json::to_value(&snapshot)?,
            &self.service,
            SCHEMA_VERSION,
        )?;

        self.emit(payload_map(json!({
            "positions": snapshot.positions,
            "position_count": snapshot.position_count,
            "last_position_update": snapshot.timestamp,
        })))
    }

    /// Supervisor tick with the recovery counters the probes consume
    pub fn emit_autoheal(&self, failure_count: u64, status: &str) -> Result<()> {
        self.emit(payload_map(json!({
            "failure_count": failure_count,
            "status": status,
        })))
    }
}

fn payload_map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}
