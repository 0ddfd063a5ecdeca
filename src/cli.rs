use clap::{Parser, Subcommand};

use crate::contracts::{contract_summary, IntegrationContracts};
use crate::gate::GateStatus;
use crate::health::HealthStatus;

#[derive(Parser)]
#[command(name = "quantgate")]
#[command(version = "0.1.0")]
#[command(about = "Health and readiness control plane for automated trading", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory path
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Override the SSOT root directory
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the 7 health probes once; exit 0 on GREEN, 1 on RED
    Check,
    /// Run the five integration-contract checks and print violations
    Contracts,
    /// Show gate state merged with a fresh health verdict
    Status,
    /// Enable auto trading (requires a GREEN verdict)
    Enable {
        /// Actor recorded on the transition
        #[arg(long, default_value = "manual")]
        by: String,
    },
    /// Disable auto trading
    Disable {
        /// Actor recorded on the transition
        #[arg(long, default_value = "manual")]
        by: String,
        /// Reason recorded on the transition
        #[arg(long, default_value = "manual stop")]
        reason: String,
    },
    /// Halt trading regardless of system state
    EmergencyStop {
        /// Reason recorded on the transition
        #[arg(long)]
        reason: String,
    },
    /// Run a demo heartbeat emitter for a named service
    Heartbeat {
        /// Service to emit for (feeder, trader, ares, positions, autoheal)
        #[arg(short, long)]
        service: String,
    },
    /// Run the read-only health server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Print the probe verdict for operators
pub fn print_health(status: &HealthStatus) {
    println!("{}", status.summary());
    for probe in &status.probe_results {
        let mark = if probe.passed { "PASS" } else { "FAIL" };
        println!("  [{mark}] {:<24} {}", probe.probe_name, probe.message);
        if probe.age_seconds.is_finite() && probe.age_seconds > 0.0 {
            println!(
                "         age {:.1}s (threshold {:.0}s)",
                probe.age_seconds, probe.threshold_seconds
            );
        }
    }
}

/// Print a contract validation pass
pub fn print_contracts(contracts: &IntegrationContracts) {
    println!("integration contracts: {}", contract_summary(contracts));
    for (name, passed) in [
        ("symbol_set_handshake", contracts.symbol_set_handshake),
        ("freshness_chain", contracts.freshness_chain),
        ("dependency_readiness", contracts.dependency_readiness),
        (
            "environment_consistency",
            contracts.environment_consistency,
        ),
        ("writer_roles", contracts.writer_roles),
    ] {
        let mark = if passed { "PASS" } else { "FAIL" };
        println!("  [{mark}] {name}");
    }
    for violation in &contracts.violations {
        println!(
            "  {:?}: {} - {}",
            violation.severity, violation.contract_name, violation.message
        );
    }
}

/// Print gate state plus the fresh verdict behind it
pub fn print_status(status: &GateStatus) {
    let gate = if status.state.enabled {
        "ENABLED"
    } else {
        "DISABLED"
    };
    println!("auto trading: {gate}");
    if !status.state.enabled_by.is_empty() {
        println!("  last enabled by {}", status.state.enabled_by);
    }
    if !status.state.disabled_by.is_empty() {
        println!(
            "  last disabled by {} ({})",
            status.state.disabled_by, status.state.reason
        );
    }
    print_health(&status.health);
}
