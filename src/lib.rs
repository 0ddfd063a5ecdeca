pub mod cli;
pub mod config;
pub mod contracts;
pub mod domain;
pub mod environment;
pub mod error;
pub mod gate;
pub mod health;
pub mod heartbeat;
pub mod services;
pub mod store;
pub mod timeutil;

pub use config::AppConfig;
pub use contracts::{ContractValidator, ContractViolation, IntegrationContracts, Severity};
pub use environment::{compute_env_hash, process_env_hash, EnvSnapshot};
pub use error::{QuantGateError, Result};
pub use gate::{AutoTradingGate, AutoTradingState, EnableOutcome, GateStatus};
pub use health::{GlobalStatus, HealthStatus, HealthValidator, ProbeResult};
pub use heartbeat::{HeartbeatEmitter, HeartbeatRecord};
pub use services::{HealthServer, ServerState};
pub use store::{ArtifactMeta, ArtifactPaths, ArtifactStore, FsStore};
