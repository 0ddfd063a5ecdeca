use clap::Parser;
use quantgate::cli::{self, Cli, Commands};
use quantgate::config::{AppConfig, LoggingConfig};
use quantgate::contracts::ContractValidator;
use quantgate::environment::{process_env_hash, EnvSnapshot};
use quantgate::error::Result;
use quantgate::gate::AutoTradingGate;
use quantgate::health::HealthValidator;
use quantgate::heartbeat::HeartbeatEmitter;
use quantgate::services::{HealthServer, ServerState};
use quantgate::store::{FsStore, KNOWN_SERVICES};
use quantgate::timeutil::unix_now;
use quantgate::QuantGateError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config)?;
    if let Some(root) = &cli.root {
        config.ssot.root = PathBuf::from(root);
    }
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("config error: {e}");
        }
        std::process::exit(2);
    }

    match &cli.command {
        Commands::Check => {
            init_logging_simple();
            let (_, validator, _) = build_components(&config)?;
            let status = validator.validate();
            cli::print_health(&status);
            if !status.is_green() {
                std::process::exit(1);
            }
        }
        Commands::Contracts => {
            init_logging_simple();
            let (store, validator, _) = build_components(&config)?;
            let contracts = ContractValidator::new(
                store.as_ref(),
                validator.probes(),
                validator.env_hash(),
                unix_now(),
            )
            .validate_all();
            cli::print_contracts(&contracts);
            if !contracts.all_contracts_pass() {
                std::process::exit(1);
            }
        }
        Commands::Status => {
            init_logging_simple();
            let (_, _, gate) = build_components(&config)?;
            cli::print_status(&gate.status()?);
        }
        Commands::Enable { by } => {
            init_logging_simple();
            let (_, _, gate) = build_components(&config)?;
            let outcome = gate.enable(by)?;
            if outcome.success {
                println!("auto trading enabled by {by}");
            } else {
                println!(
                    "enable rejected ({}/7 green), failing probes: {}",
                    outcome.green_count,
                    outcome.failed_probes.join(", ")
                );
                std::process::exit(1);
            }
        }
        Commands::Disable { by, reason } => {
            init_logging_simple();
            let (_, _, gate) = build_components(&config)?;
            gate.disable(by, reason)?;
            println!("auto trading disabled by {by}: {reason}");
        }
        Commands::EmergencyStop { reason } => {
            init_logging_simple();
            let (_, _, gate) = build_components(&config)?;
            gate.emergency_stop(reason)?;
            println!("EMERGENCY STOP: {reason}");
        }
        Commands::Heartbeat { service } => {
            init_logging(&config.logging);
            run_heartbeat_mode(&config, service).await?;
        }
        Commands::Serve { port } => {
            init_logging(&config.logging);
            let (_, validator, gate) = build_components(&config)?;
            let port = (*port).or(config.health_port).unwrap_or(8080);
            let state = Arc::new(ServerState::new(validator, gate));
            HealthServer::new(state, port).run().await?;
        }
    }

    Ok(())
}

fn build_components(
    config: &AppConfig,
) -> Result<(Arc<FsStore>, HealthValidator, AutoTradingGate)> {
    let store = Arc::new(FsStore::new(config.ssot.root.clone())?);
    let env_hash = process_env_hash(config);
    let validator = HealthValidator::new(store.clone(), config, &env_hash);
    let gate = AutoTradingGate::new(store.clone(), validator.clone());
    Ok((store, validator, gate))
}

/// Demo emitter loop for a named service. Real producers embed
/// `HeartbeatEmitter` in their own process instead.
async fn run_heartbeat_mode(config: &AppConfig, service: &str) -> Result<()> {
    if !KNOWN_SERVICES.contains(&service) {
        return Err(QuantGateError::Validation(format!(
            "unknown service: {service} (known: {})",
            KNOWN_SERVICES.join(", ")
        )));
    }

    let store = Arc::new(FsStore::new(config.ssot.root.clone())?);
    let env_hash = process_env_hash(config);

    // First writer up seeds the canonical environment snapshot
    if EnvSnapshot::read(store.as_ref())?.is_none() {
        EnvSnapshot::new(&env_hash, &config.mode).write(store.as_ref())?;
        info!("environment snapshot seeded (hash {})", &env_hash[..8]);
    }

    let emitter = Arc::new(HeartbeatEmitter::new(store, service, &env_hash));
    emitter.mark_entrypoint_ok();

    let interval = Duration::from_secs(config.heartbeat.interval_secs);
    info!("emitting {service} heartbeat every {interval:?}, ctrl-c to stop");

    let mut timer = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = timer.tick() => {
                if let Err(e) = demo_tick(&emitter, config) {
                    warn!("heartbeat write failed for {service}: {e}");
                }
            }
            _ = shutdown_signal() => {
                info!("shutting down {service} emitter");
                break;
            }
        }
    }

    Ok(())
}

fn demo_tick(emitter: &HeartbeatEmitter, config: &AppConfig) -> Result<()> {
    let now = unix_now();
    match emitter.service() {
        "feeder" => {
            let symbols = vec![config.probes.anchor_symbol.clone()];
            emitter.emit_feeder(&symbols, &BTreeMap::new())
        }
        "trader" => emitter.emit_trader(true, now, now, false),
        "ares" => emitter.emit_signals(&[], false),
        "positions" => emitter.emit_positions(&[]),
        "autoheal" => emitter.emit_autoheal(0, "MONITORING"),
        other => Err(QuantGateError::Validation(format!(
            "unknown service: {other}"
        ))),
    }
}

fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},quantgate=debug", logging.level)));

    // `rolling::daily` panics if it cannot create the initial log file, so
    // preflight writability first.
    let file_layer = logging.file_dir.as_ref().and_then(|dir| {
        if std::fs::create_dir_all(dir).is_err() {
            eprintln!(
                "Warning: could not create log directory {}, file logging disabled",
                dir.display()
            );
            return None;
        }
        let test_path = dir.join(".quantgate_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let appender = tracing_appender::rolling::daily(dir, "quantgate.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                // Keep the guard alive for the process lifetime
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: could not write to log directory {} ({e}), file logging disabled",
                    dir.display()
                );
                None
            }
        }
    });

    if logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().with_target(true).json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

fn init_logging_simple() {
    // Minimal logging for one-shot CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
