//! Inter-service integration contracts.
//!
//! Five independent cross-artifact checks: symbol-set handshake, freshness
//! chain, dependency readiness, environment consistency, and writer-role
//! uniqueness. Each check catches its own failures and reports them as
//! violations; the validator as a whole never throws.

use crate::config::ProbeConfig;
use crate::environment::short_hash;
use crate::error::Result;
use crate::heartbeat::{self, HeartbeatRecord};
use crate::store::{
    read_last_ndjson_line, ArtifactPaths, ArtifactStore, KNOWN_SERVICES, META_KEY, WRITER_ROLES,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One contract violation found during a validation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractViolation {
    pub contract_name: String,
    pub violation_type: String,
    pub message: String,
    pub severity: Severity,
}

impl ContractViolation {
    fn error(contract: &str, violation_type: &str, message: String) -> Self {
        Self {
            contract_name: contract.to_string(),
            violation_type: violation_type.to_string(),
            message,
            severity: Severity::Error,
        }
    }
}

/// Result of one full validation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationContracts {
    pub symbol_set_handshake: bool,
    pub freshness_chain: bool,
    pub dependency_readiness: bool,
    pub environment_consistency: bool,
    pub writer_roles: bool,
    pub violations: Vec<ContractViolation>,
    pub timestamp: f64,
}

impl IntegrationContracts {
    pub fn all_contracts_pass(&self) -> bool {
        self.symbol_set_handshake
            && self.freshness_chain
            && self.dependency_readiness
            && self.environment_consistency
            && self.writer_roles
    }
}

/// Validator for one pass over the current artifacts
pub struct ContractValidator<'a> {
    store: &'a dyn ArtifactStore,
    probes: &'a ProbeConfig,
    env_hash: &'a str,
    now: f64,
}

impl<'a> ContractValidator<'a> {
    pub fn new(
        store: &'a dyn ArtifactStore,
        probes: &'a ProbeConfig,
        env_hash: &'a str,
        now: f64,
    ) -> Self {
        Self {
            store,
            probes,
            env_hash,
            now,
        }
    }

    /// Run all five checks; overall pass requires every check true
    pub fn validate_all(&self) -> IntegrationContracts {
        let mut violations = Vec::new();

        let symbol_set_handshake =
            self.guarded("symbol_set_handshake", &mut violations, |v| {
                self.check_symbol_set_handshake(v)
            });
        let freshness_chain = self.guarded("freshness_chain", &mut violations, |v| {
            self.check_freshness_chain(v)
        });
        let dependency_readiness =
            self.guarded("dependency_readiness", &mut violations, |v| {
                self.check_dependency_readiness(v)
            });
        let environment_consistency =
            self.guarded("environment_consistency", &mut violations, |v| {
                self.check_environment_consistency(v)
            });
        let writer_roles = self.guarded("writer_roles", &mut violations, |v| {
            self.check_writer_roles(v)
        });

        IntegrationContracts {
            symbol_set_handshake,
            freshness_chain,
            dependency_readiness,
            environment_consistency,
            writer_roles,
            violations,
            timestamp: self.now,
        }
    }

    /// Fold check errors into a violation so one broken artifact can never
    /// abort the pass.
    fn guarded<F>(
        &self,
        contract: &str,
        violations: &mut Vec<ContractViolation>,
        check: F,
    ) -> bool
    where
        F: FnOnce(&mut Vec<ContractViolation>) -> Result<bool>,
    {
        match check(violations) {
            Ok(ok) => ok,
            Err(e) => {
                violations.push(ContractViolation::error(
                    contract,
                    "validation_error",
                    format!("{contract} validation failed: {e}"),
                ));
                false
            }
        }
    }

    fn load_required(
        &self,
        contract: &str,
        service: &str,
        violations: &mut Vec<ContractViolation>,
    ) -> Result<Option<HeartbeatRecord>> {
        match heartbeat::load(self.store, service)? {
            Some(record) => Ok(Some(record)),
            None => {
                violations.push(ContractViolation::error(
                    contract,
                    "missing_heartbeat",
                    format!("{service} heartbeat missing"),
                ));
                Ok(None)
            }
        }
    }

    fn check_symbol_set_handshake(
        &self,
        violations: &mut Vec<ContractViolation>,
    ) -> Result<bool> {
        const CONTRACT: &str = "symbol_set_handshake";

        let feeder = self.load_required(CONTRACT, "feeder", violations)?;
        let ares = self.load_required(CONTRACT, "ares", violations)?;
        let positions = self.load_required(CONTRACT, "positions", violations)?;
        let (Some(feeder), Some(ares), Some(positions)) = (feeder, ares, positions) else {
            return Ok(false);
        };

        let feeder_symbols: BTreeSet<String> = feeder
            .payload
            .get("symbols")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let ares_symbols = nested_symbols(&ares, "candidates");
        let positions_symbols = nested_symbols(&positions, "positions");

        let mut ok = true;

        for symbol in feeder_symbols
            .iter()
            .chain(ares_symbols.iter())
            .chain(positions_symbols.iter())
        {
            if *symbol != symbol.to_uppercase() {
                violations.push(ContractViolation::error(
                    CONTRACT,
                    "casing_violation",
                    format!("symbol not uppercase: {symbol}"),
                ));
                ok = false;
            }
        }

        for (consumer, symbols) in [("ares", &ares_symbols), ("positions", &positions_symbols)] {
            let missing: Vec<&String> = symbols.difference(&feeder_symbols).collect();
            if !missing.is_empty() {
                violations.push(ContractViolation::error(
                    CONTRACT,
                    "symbol_mismatch",
                    format!("{consumer} symbols not subset of feeder: {missing:?}"),
                ));
                ok = false;
            }
        }

        if !feeder_symbols.contains(&self.probes.anchor_symbol) {
            violations.push(ContractViolation::error(
                CONTRACT,
                "anchor_missing",
                format!("{} not in feeder symbols", self.probes.anchor_symbol),
            ));
            ok = false;
        }

        Ok(ok)
    }

    fn check_freshness_chain(&self, violations: &mut Vec<ContractViolation>) -> Result<bool> {
        const CONTRACT: &str = "freshness_chain";
        let mut ok = true;

        for (artifact, bound) in [
            (
                ArtifactPaths::DATABUS_SNAPSHOT,
                self.probes.databus_max_age_secs,
            ),
            (
                ArtifactPaths::POSITIONS_SNAPSHOT,
                self.probes.positions_max_age_secs,
            ),
        ] {
            let age = self.store.modified_age(artifact, self.now)?;
            if age.is_infinite() {
                violations.push(ContractViolation::error(
                    CONTRACT,
                    "missing_artifact",
                    format!("{artifact} missing (bound {bound}s)"),
                ));
                ok = false;
            } else if age > bound {
                violations.push(ContractViolation::error(
                    CONTRACT,
                    "stale_artifact",
                    format!("{artifact} stale: {age:.1}s > {bound}s"),
                ));
                ok = false;
            }
        }

        match self.load_required(CONTRACT, "ares", violations)? {
            Some(ares) => {
                let last_update = ares.payload_f64("last_signal_update").unwrap_or(0.0);
                let candidates_age = self.now - last_update;
                let bound = if ares.payload_bool("is_real_signal") {
                    self.probes.candidates_real_max_age_secs
                } else {
                    self.probes.candidates_idle_max_age_secs
                };
                if candidates_age > bound {
                    violations.push(ContractViolation::error(
                        CONTRACT,
                        "stale_candidates",
                        format!("signal candidates stale: {candidates_age:.1}s > {bound}s"),
                    ));
                    ok = false;
                }
            }
            None => ok = false,
        }

        match self.load_required(CONTRACT, "trader", violations)? {
            Some(trader) => {
                let age = self.now - trader.timestamp;
                if age > self.probes.trader_max_age_secs {
                    violations.push(ContractViolation::error(
                        CONTRACT,
                        "stale_trader",
                        format!(
                            "trader heartbeat stale: {age:.1}s > {}s",
                            self.probes.trader_max_age_secs
                        ),
                    ));
                    ok = false;
                }
            }
            None => ok = false,
        }

        Ok(ok)
    }

    fn check_dependency_readiness(
        &self,
        violations: &mut Vec<ContractViolation>,
    ) -> Result<bool> {
        const CONTRACT: &str = "dependency_readiness";

        let Some(trader) = self.load_required(CONTRACT, "trader", violations)? else {
            return Ok(false);
        };

        let mut ok = true;

        if !trader.payload_bool("exchange_info_loaded") {
            violations.push(ContractViolation::error(
                CONTRACT,
                "exchange_info_not_loaded",
                "trader exchange info not loaded".to_string(),
            ));
            ok = false;
        }

        let rest_age = self.now - trader.payload_f64("last_rest_ok_ts").unwrap_or(0.0);
        if rest_age > self.probes.rest_ok_max_age_secs {
            violations.push(ContractViolation::error(
                CONTRACT,
                "stale_rest_connection",
                format!(
                    "trader REST connection stale: {rest_age:.1}s > {}s",
                    self.probes.rest_ok_max_age_secs
                ),
            ));
            ok = false;
        }

        let balances_age = self.now - trader.payload_f64("balances_fresh_ts").unwrap_or(0.0);
        if balances_age > self.probes.balances_max_age_secs {
            violations.push(ContractViolation::error(
                CONTRACT,
                "stale_balances",
                format!(
                    "trader balances stale: {balances_age:.1}s > {}s",
                    self.probes.balances_max_age_secs
                ),
            ));
            ok = false;
        }

        if trader.payload_bool("circuit_breaker_active") {
            violations.push(ContractViolation::error(
                CONTRACT,
                "circuit_breaker_active",
                "trader circuit breaker is active".to_string(),
            ));
            ok = false;
        }

        Ok(ok)
    }

    fn check_environment_consistency(
        &self,
        violations: &mut Vec<ContractViolation>,
    ) -> Result<bool> {
        const CONTRACT: &str = "environment_consistency";
        let mut ok = true;

        for service in KNOWN_SERVICES {
            let Some(record) = heartbeat::load(self.store, service)? else {
                continue;
            };
            if record.env_hash != self.env_hash {
                violations.push(ContractViolation::error(
                    CONTRACT,
                    "env_hash_mismatch",
                    format!(
                        "ENV_HASH mismatch for {service}: local={} heartbeat={}",
                        short_hash(self.env_hash),
                        short_hash(&record.env_hash)
                    ),
                ));
                ok = false;
            }
        }

        Ok(ok)
    }

    fn check_writer_roles(&self, violations: &mut Vec<ContractViolation>) -> Result<bool> {
        const CONTRACT: &str = "writer_roles";
        let bound = self.probes.writer_artifact_max_age_secs;
        let mut ok = true;

        for (artifact, expected) in WRITER_ROLES {
            let age = self.store.modified_age(artifact, self.now)?;
            if age.is_infinite() {
                violations.push(ContractViolation::error(
                    CONTRACT,
                    "missing_file",
                    format!("{artifact} missing (expected writer: {expected})"),
                ));
                ok = false;
                continue;
            }
            if age > bound {
                violations.push(ContractViolation::error(
                    CONTRACT,
                    "stale_file",
                    format!("{artifact} stale: {age:.1}s > {bound}s"),
                ));
                ok = false;
                continue;
            }

            if let Some(found) = artifact_producer(self.store, artifact)? {
                if found != expected {
                    violations.push(ContractViolation::error(
                        CONTRACT,
                        "producer_mismatch",
                        format!("{artifact} written by {found}, expected {expected}"),
                    ));
                    ok = false;
                }
            }
        }

        Ok(ok)
    }
}

/// Symbols declared inside a heartbeat payload array of objects
fn nested_symbols(record: &HeartbeatRecord, key: &str) -> BTreeSet<String> {
    record
        .payload
        .get(key)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("symbol"))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Producer tag of an artifact's metadata envelope; for NDJSON logs the
/// last record's tag. `None` for an empty log (empty but fresh is allowed).
pub fn artifact_producer(store: &dyn ArtifactStore, artifact: &str) -> Result<Option<String>> {
    let value = if artifact.ends_with(".ndjson") {
        read_last_ndjson_line(store, artifact)?
    } else {
        store.read_json(artifact)?
    };

    Ok(value
        .as_ref()
        .and_then(|v| v.get(META_KEY))
        .and_then(|m| m.get("producer"))
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Human-readable one-line summary of a validation pass
pub fn contract_summary(contracts: &IntegrationContracts) -> String {
    if contracts.all_contracts_pass() {
        "all integration contracts pass".to_string()
    } else {
        let errors = contracts
            .violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count();
        let warnings = contracts.violations.len() - errors;
        format!("{errors} errors, {warnings} warnings")
    }
}
