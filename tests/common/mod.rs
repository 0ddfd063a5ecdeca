#![allow(dead_code)]

use quantgate::config::AppConfig;
use quantgate::environment::EnvSnapshot;
use quantgate::store::{ArtifactPaths, ArtifactStore, FsStore, SCHEMA_VERSION};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// Environment hash used for every fixture heartbeat
pub const ENV_HASH: &str = "localhash";

pub fn fixture() -> (TempDir, Arc<FsStore>, AppConfig) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsStore::new(dir.path()).unwrap());
    let config = AppConfig::default_config(dir.path());
    (dir, store, config)
}

pub fn write_heartbeat(store: &FsStore, service: &str, timestamp: f64, extra: Value) {
    let mut payload = json!({
        "timestamp": timestamp,
        "service": service,
        "env_hash": ENV_HASH,
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

pub fn write_trader_heartbeat(
    store: &FsStore,
    timestamp: f64,
    exchange_info_loaded: bool,
    last_rest_ok_ts: f64,
    balances_fresh_ts: f64,
    circuit_breaker_active: bool,
) {
    write_heartbeat(
        store,
        "trader",
        timestamp,
        json!({
            "exchange_info_loaded": exchange_info_loaded,
            "last_rest_ok_ts": last_rest_ok_ts,
            "balances_fresh_ts": balances_fresh_ts,
            "circuit_breaker_active": circuit_breaker_active,
        }),
    );
}

/// Write every artifact a GREEN verdict needs, all stamped at `now`
pub fn write_green_system(store: &FsStore, now: f64) {
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
    write_trader_heartbeat(store, now, true, now, now, false);
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

    EnvSnapshot::new(ENV_HASH, "testnet").write(store).unwrap();
}
