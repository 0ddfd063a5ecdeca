use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ssot: SsotConfig,
    /// Effective mode (testnet or mainnet); part of the environment hash
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub probes: ProbeConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Health server port (default: 8080)
    #[serde(default)]
    pub health_port: Option<u16>,
}

fn default_mode() -> String {
    "testnet".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SsotConfig {
    /// Root directory all artifacts live under; writes outside it are rejected
    #[serde(default = "default_ssot_root")]
    pub root: PathBuf,
}

fn default_ssot_root() -> PathBuf {
    PathBuf::from("shared_data")
}

impl Default for SsotConfig {
    fn default() -> Self {
        Self {
            root: default_ssot_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    /// Interval between heartbeat emissions (producers tick every 3-5s)
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    4
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
        }
    }
}

/// Freshness thresholds and symbol rules for the probe engine and the
/// integration contract validator.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Data-bus snapshot max age (seconds)
    #[serde(default = "d_databus")]
    pub databus_max_age_secs: f64,
    /// Positions snapshot max age (seconds)
    #[serde(default = "d_positions")]
    pub positions_max_age_secs: f64,
    /// Candidate freshness bound when a real signal was produced
    #[serde(default = "d_candidates_real")]
    pub candidates_real_max_age_secs: f64,
    /// Candidate freshness bound for heartbeat-only ticks
    #[serde(default = "d_candidates_idle")]
    pub candidates_idle_max_age_secs: f64,
    /// Trader heartbeat max age (seconds)
    #[serde(default = "d_trader")]
    pub trader_max_age_secs: f64,
    /// Last successful REST check max age (seconds)
    #[serde(default = "d_rest_ok")]
    pub rest_ok_max_age_secs: f64,
    /// Account balance snapshot max age (seconds)
    #[serde(default = "d_balances")]
    pub balances_max_age_secs: f64,
    /// Environment snapshot max age (seconds)
    #[serde(default = "d_env_snapshot")]
    pub env_snapshot_max_age_secs: f64,
    /// Probe-scoped artifact freshness bound for the integration_contracts probe
    #[serde(default = "d_contract_artifact")]
    pub contract_artifact_max_age_secs: f64,
    /// Writer-role artifact freshness bound (seconds)
    #[serde(default = "d_writer_artifact")]
    pub writer_artifact_max_age_secs: f64,
    /// Supervisor heartbeat max age (seconds)
    #[serde(default = "d_autoheal")]
    pub autoheal_max_age_secs: f64,
    /// Supervisor recent-failure counter bound
    #[serde(default = "d_autoheal_failures")]
    pub autoheal_max_failures: u64,
    /// Symbol that must always be present in the feeder's set
    #[serde(default = "d_anchor")]
    pub anchor_symbol: String,
}

fn d_databus() -> f64 {
    30.0
}
fn d_positions() -> f64 {
    60.0
}
fn d_candidates_real() -> f64 {
    150.0
}
fn d_candidates_idle() -> f64 {
    75.0
}
fn d_trader() -> f64 {
    15.0
}
fn d_rest_ok() -> f64 {
    60.0
}
fn d_balances() -> f64 {
    300.0
}
fn d_env_snapshot() -> f64 {
    300.0
}
fn d_contract_artifact() -> f64 {
    120.0
}
fn d_writer_artifact() -> f64 {
    300.0
}
fn d_autoheal() -> f64 {
    30.0
}
fn d_autoheal_failures() -> u64 {
    3
}
fn d_anchor() -> String {
    "BTCUSDT".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            databus_max_age_secs: d_databus(),
            positions_max_age_secs: d_positions(),
            candidates_real_max_age_secs: d_candidates_real(),
            candidates_idle_max_age_secs: d_candidates_idle(),
            trader_max_age_secs: d_trader(),
            rest_ok_max_age_secs: d_rest_ok(),
            balances_max_age_secs: d_balances(),
            env_snapshot_max_age_secs: d_env_snapshot(),
            contract_artifact_max_age_secs: d_contract_artifact(),
            writer_artifact_max_age_secs: d_writer_artifact(),
            autoheal_max_age_secs: d_autoheal(),
            autoheal_max_failures: d_autoheal_failures(),
            anchor_symbol: d_anchor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SupervisorConfig {
    /// Whether the self-healing supervisor is running. When disabled, the
    /// autoheal_recovery probe passes with a "skipped" message.
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    /// Accept heartbeat-only ticks from the signal service (no candidates)
    #[serde(default = "default_allow_signal_less")]
    pub allow_signal_less_ticks: bool,
}

fn default_allow_signal_less() -> bool {
    true
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            allow_signal_less_ticks: default_allow_signal_less(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rotated log files (console only when unset)
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("QUANTGATE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (QUANTGATE_SSOT__ROOT, etc.)
            .add_source(
                Environment::with_prefix("QUANTGATE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration rooted at the given SSOT directory
    pub fn default_config<P: Into<PathBuf>>(ssot_root: P) -> Self {
        Self {
            ssot: SsotConfig {
                root: ssot_root.into(),
            },
            mode: default_mode(),
            heartbeat: HeartbeatConfig::default(),
            probes: ProbeConfig::default(),
            supervisor: SupervisorConfig::default(),
            signals: SignalConfig::default(),
            logging: LoggingConfig::default(),
            health_port: Some(8080),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.heartbeat.interval_secs == 0 {
            errors.push("heartbeat.interval_secs must be positive".to_string());
        }

        if !(3..=5).contains(&self.heartbeat.interval_secs) {
            errors.push(format!(
                "heartbeat.interval_secs should be within 3-5s, got {}",
                self.heartbeat.interval_secs
            ));
        }

        if self.probes.anchor_symbol != self.probes.anchor_symbol.to_uppercase() {
            errors.push(format!(
                "probes.anchor_symbol must be uppercase: {}",
                self.probes.anchor_symbol
            ));
        }

        if self.probes.candidates_idle_max_age_secs > self.probes.candidates_real_max_age_secs {
            errors.push(
                "candidates_idle_max_age_secs must not exceed candidates_real_max_age_secs"
                    .to_string(),
            );
        }

        if self.mode != "testnet" && self.mode != "mainnet" {
            errors.push(format!("mode must be testnet or mainnet: {}", self.mode));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::default_config("shared_data");
        assert!(config.validate().is_ok());
        assert_eq!(config.probes.trader_max_age_secs, 15.0);
        assert_eq!(config.probes.anchor_symbol, "BTCUSDT");
    }

    #[test]
    fn test_validate_rejects_lowercase_anchor() {
        let mut config = AppConfig::default_config("shared_data");
        config.probes.anchor_symbol = "btcusdt".to_string();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("anchor_symbol")));
    }

    #[test]
    fn test_validate_rejects_bad_mode() {
        let mut config = AppConfig::default_config("shared_data");
        config.mode = "paper".to_string();
        assert!(config.validate().is_err());
    }
}
