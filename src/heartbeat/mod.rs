//! Heartbeat Protocol
//!
//! Each service periodically rewrites `health/<service>.json` asserting "I
//! am alive, here is my state". Liveness is consumed via staleness (age),
//! never event delivery: any reader computes `now - timestamp` and applies
//! its own threshold. There is no history and no explicit deletion; a
//! heartbeat goes stale the instant its process stops emitting.

pub mod emitter;

pub use emitter::HeartbeatEmitter;

use crate::error::{QuantGateError, Result};
use crate::store::{ArtifactPaths, ArtifactStore, META_KEY};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON object payload attached to a heartbeat
pub type JsonMap = serde_json::Map<String, Value>;

/// Standardized heartbeat record. The envelope fields are strict; anything
/// service-specific rides in the flattened payload map, since different
/// producers legitimately attach different shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    /// Unix seconds at emission
    pub timestamp: f64,
    #[serde(default)]
    pub service: String,
    #[serde(default = "default_env_hash")]
    pub env_hash: String,
    #[serde(default = "default_true")]
    pub entrypoint_ok: bool,
    #[serde(default)]
    pub uptime_seconds: u64,
    #[serde(flatten)]
    pub payload: JsonMap,
}

fn default_env_hash() -> String {
    "unknown".to_string()
}

fn default_true() -> bool {
    true
}

impl HeartbeatRecord {
    /// Payload field as f64, if present
    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(Value::as_f64)
    }

    /// Payload field as bool, defaulting to false
    pub fn payload_bool(&self, key: &str) -> bool {
        self.payload
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Load a service heartbeat. Legacy records keyed by `pid`/`started_at`/
/// `status` are up-converted transparently; a record with a missing or
/// non-positive `timestamp` is a schema violation, never silently defaulted.
pub fn load(store: &dyn ArtifactStore, service: &str) -> Result<Option<HeartbeatRecord>> {
    let rel = ArtifactPaths::heartbeat(service);
    let value = match store.read_json(&rel)? {
        Some(value) => value,
        None => return Ok(None),
    };

    let mut map = match value {
        Value::Object(map) => map,
        _ => {
            return Err(QuantGateError::SchemaViolation {
                artifact: rel,
                detail: "heartbeat is not a JSON object".to_string(),
            })
        }
    };
    map.remove(META_KEY);

    if map.contains_key("pid") && !map.contains_key("service") {
        return Ok(Some(upconvert_legacy(map, service, &rel)?));
    }

    match map.get("timestamp").and_then(Value::as_f64) {
        Some(ts) if ts > 0.0 => {}
        _ => {
            return Err(QuantGateError::SchemaViolation {
                artifact: rel,
                detail: "field timestamp missing or non-positive".to_string(),
            })
        }
    }

    let mut record: HeartbeatRecord = serde_json::from_value(Value::Object(map))?;
    if record.service.is_empty() {
        record.service = service.to_string();
    }
    Ok(Some(record))
}

/// Older producers wrote `{pid, started_at, status, ...}`; map that onto
/// the standard record so every reader sees one shape.
fn upconvert_legacy(map: JsonMap, service: &str, rel: &str) -> Result<HeartbeatRecord> {
    let started_at = map.get("started_at").and_then(Value::as_f64);
    let timestamp = map
        .get("timestamp")
        .and_then(Value::as_f64)
        .filter(|t| *t > 0.0)
        .or(started_at)
        .filter(|t| *t > 0.0)
        .ok_or_else(|| QuantGateError::SchemaViolation {
            artifact: rel.to_string(),
            detail: "field timestamp missing or non-positive".to_string(),
        })?;

    let entrypoint_ok = map.get("status").and_then(Value::as_str) == Some("running");

    Ok(HeartbeatRecord {
        timestamp,
        service: service.to_string(),
        env_hash: default_env_hash(),
        entrypoint_ok,
        uptime_seconds: 0,
        payload: map,
    })
}

/// Heartbeat age in seconds; +inf when the artifact is absent
pub fn age(store: &dyn ArtifactStore, service: &str, now: f64) -> Result<f64> {
    match load(store, service)? {
        Some(record) => Ok(now - record.timestamp),
        None => Ok(f64::INFINITY),
    }
}
