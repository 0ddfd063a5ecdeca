//! End-to-end gating behaviour: the probe verdict drives the auto-trading
//! gate, disable and emergency stop bypass it.

mod common;

use common::{fixture, write_green_system, write_heartbeat, write_trader_heartbeat, ENV_HASH};
use quantgate::gate::AutoTradingGate;
use quantgate::health::{GlobalStatus, HealthValidator};
use quantgate::heartbeat;
use quantgate::timeutil::unix_now;
use serde_json::json;

#[test]
fn all_probes_green_enables_and_persists() {
    let (_dir, store, config) = fixture();
    let now = unix_now();
    write_green_system(&store, now);

    let validator = HealthValidator::new(store.clone(), &config, ENV_HASH);
    let status = validator.validate_at(now);
    assert_eq!(status.global_status, GlobalStatus::Green);
    assert_eq!(status.green_count, 7);

    let gate = AutoTradingGate::new(store.clone(), validator);
    let outcome = gate.enable_at("ops", now).unwrap();
    assert!(outcome.success);

    let persisted = gate.load_state().unwrap();
    assert!(persisted.enabled);
    assert_eq!(persisted.enabled_by, "ops");
}

#[test]
fn single_failing_probe_rejects_enable_with_names() {
    let (_dir, store, config) = fixture();
    let now = unix_now();
    write_green_system(&store, now);
    // Candidate age 200s exceeds the 150s real-signal bound
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

    let validator = HealthValidator::new(store.clone(), &config, ENV_HASH);
    let status = validator.validate_at(now);
    assert_eq!(status.green_count, 6);
    assert_eq!(status.global_status, GlobalStatus::Red);

    let gate = AutoTradingGate::new(store.clone(), validator);
    let outcome = gate.enable_at("ops", now).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.failed_probes, vec!["ares_signal_flow"]);
    assert!(!gate.load_state().unwrap().enabled);
}

#[test]
fn flipping_any_probe_forces_red() {
    let (_dir, store, config) = fixture();
    let now = unix_now();
    write_green_system(&store, now);
    let validator = HealthValidator::new(store.clone(), &config, ENV_HASH);
    assert!(validator.validate_at(now).safe_to_trade);

    // Trader circuit breaker trips; everything else untouched
    write_trader_heartbeat(&store, now, true, now, now, true);

    let status = validator.validate_at(now);
    assert_eq!(status.green_count, 6);
    assert_eq!(status.global_status, GlobalStatus::Red);
    assert!(!status.safe_to_trade);
}

#[test]
fn trader_readiness_scenario_boundaries() {
    let (_dir, store, config) = fixture();
    let t0 = unix_now();
    write_trader_heartbeat(&store, t0, true, t0, t0, false);

    let validator = HealthValidator::new(store.clone(), &config, ENV_HASH);

    // 5s after emission: within the 15s bound
    let status = validator.validate_at(t0 + 5.0);
    assert!(status.trader_readiness);

    // 20s after emission: stale, message cites both ages
    let status = validator.validate_at(t0 + 20.0);
    assert!(!status.trader_readiness);
    let probe = status
        .probe_results
        .iter()
        .find(|p| p.probe_name == "trader_readiness")
        .unwrap();
    assert!(probe.message.contains("20.0s > 15s"), "{}", probe.message);
}

#[test]
fn env_hash_mismatch_cites_both_prefixes() {
    let (_dir, store, config) = fixture();
    let now = unix_now();
    quantgate::environment::EnvSnapshot::new("abc12345", "testnet")
        .write(store.as_ref())
        .unwrap();

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
fn emergency_stop_forces_disabled_under_green_health() {
    let (_dir, store, config) = fixture();
    let now = unix_now();
    write_green_system(&store, now);

    let validator = HealthValidator::new(store.clone(), &config, ENV_HASH);
    let gate = AutoTradingGate::new(store.clone(), validator.clone());
    assert!(gate.enable_at("ops", now).unwrap().success);
    assert!(validator.validate_at(now).safe_to_trade);

    let state = gate.emergency_stop("manual halt").unwrap();
    assert!(!state.enabled);
    assert_eq!(state.disabled_by, "emergency");
    assert_eq!(state.reason, "manual halt");
}

#[test]
fn missing_heartbeats_read_as_infinite_age_and_fail_probes() {
    let (_dir, store, config) = fixture();
    let now = unix_now();

    for service in ["feeder", "trader", "ares", "positions"] {
        let age = heartbeat::age(store.as_ref(), service, now).unwrap();
        assert!(age.is_infinite(), "{service} should have infinite age");
    }

    let validator = HealthValidator::new(store.clone(), &config, ENV_HASH);
    let status = validator.validate_at(now);
    for name in ["ares_signal_flow", "trader_readiness"] {
        let probe = status
            .probe_results
            .iter()
            .find(|p| p.probe_name == name)
            .unwrap();
        assert!(!probe.passed);
        assert!(probe.message.contains("missing"), "{}", probe.message);
    }
}

#[test]
fn disabled_supervisor_counts_toward_quorum() {
    let (_dir, store, config) = fixture();
    let now = unix_now();
    write_green_system(&store, now);
    // No autoheal heartbeat exists; supervisor disabled in default config

    let validator = HealthValidator::new(store.clone(), &config, ENV_HASH);
    let status = validator.validate_at(now);
    assert!(status.autoheal_recovery);
    assert_eq!(status.green_count, 7);
    assert!(status.safe_to_trade);
}

#[test]
fn enabled_supervisor_requires_fresh_heartbeat() {
    let (_dir, store, mut config) = fixture();
    config.supervisor.enabled = true;
    let now = unix_now();
    write_green_system(&store, now);

    let validator = HealthValidator::new(store.clone(), &config, ENV_HASH);
    assert!(!validator.validate_at(now).autoheal_recovery);

    write_heartbeat(
        &store,
        "autoheal",
        now,
        json!({"failure_count": 1, "status": "MONITORING"}),
    );
    assert!(validator.validate_at(now).autoheal_recovery);
}
