use thiserror::Error;

/// Main error type for the control plane
#[derive(Error, Debug)]
pub enum QuantGateError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // SSOT policy errors
    #[error("Path outside SSOT root: {path}")]
    PathOutsideRoot { path: String },

    // Artifact errors
    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    #[error("Schema violation in {artifact}: {detail}")]
    SchemaViolation { artifact: String, detail: String },

    // Integration contract errors
    #[error("Producer mismatch for {artifact}: expected {expected}, found {found}")]
    ProducerMismatch {
        artifact: String,
        expected: String,
        found: String,
    },

    #[error("Symbol casing violation: {0}")]
    CasingViolation(String),

    #[error("ENV_HASH mismatch: local={local} snapshot={snapshot}")]
    EnvHashMismatch { local: String, snapshot: String },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl QuantGateError {
    /// True for errors that indicate a caller bug rather than a runtime
    /// health condition. These are the only errors the probe engine lets
    /// escape.
    pub fn is_fatal(&self) -> bool {
        matches!(self, QuantGateError::PathOutsideRoot { .. })
    }
}

/// Result type alias for QuantGateError
pub type Result<T> = std::result::Result<T, QuantGateError>;
