//! Environment fingerprinting and the shared environment snapshot.
//!
//! Every process computes a stable hash of its resolved runtime
//! configuration at startup and stamps it into each heartbeat. The canonical
//! hash lives in the env snapshot artifact; the env_drift probe and the
//! environment-consistency contract compare against it to detect processes
//! started with diverging configuration.

use crate::config::AppConfig;
use crate::error::Result;
use crate::store::{ArtifactStore, ArtifactPaths, SCHEMA_VERSION};
use crate::timeutil::unix_now;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Environment variable prefix included in the fingerprint
const ENV_PREFIX: &str = "QUANTGATE";

/// Canonical environment snapshot artifact payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvSnapshot {
    pub env_hash: String,
    /// Effective mode, testnet or mainnet
    pub mode: String,
    pub written_at: f64,
}

impl EnvSnapshot {
    pub fn new(env_hash: &str, mode: &str) -> Self {
        Self {
            env_hash: env_hash.to_string(),
            mode: mode.to_string(),
            written_at: unix_now(),
        }
    }

    /// Persist this snapshot as the canonical fingerprint
    pub fn write(&self, store: &dyn ArtifactStore) -> Result<()> {
        let payload = serde_json::to_value(self)?;
        store.write_json(
            ArtifactPaths::ENV_SNAPSHOT,
            &payload,
            "launcher",
            SCHEMA_VERSION,
        )
    }

    /// Load the canonical snapshot, `None` when never written
    pub fn read(store: &dyn ArtifactStore) -> Result<Option<EnvSnapshot>> {
        match store.read_json(ArtifactPaths::ENV_SNAPSHOT)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

/// Deterministic hash over sorted KEY=VALUE lines
pub fn compute_env_hash<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut lines: Vec<String> = pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Fingerprint for the current process: effective mode plus all
/// QUANTGATE-prefixed environment variables.
pub fn process_env_hash(config: &AppConfig) -> String {
    let mut pairs: Vec<(String, String)> = std::env::vars()
        .filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .collect();
    pairs.push(("MODE".to_string(), config.mode.clone()));
    pairs.push((
        "SSOT_ROOT".to_string(),
        config.ssot.root.to_string_lossy().into_owned(),
    ));
    compute_env_hash(pairs)
}

/// First 8 characters of a hash, for log and violation messages
pub fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsStore;
    use tempfile::TempDir;

    #[test]
    fn test_hash_is_order_insensitive() {
        let a = compute_env_hash([("A", "1"), ("B", "2")]);
        let b = compute_env_hash([("B", "2"), ("A", "1")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_changes_with_value() {
        let a = compute_env_hash([("A", "1")]);
        let b = compute_env_hash([("A", "2")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("abc12345deadbeef"), "abc12345");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path()).unwrap();

        let snapshot = EnvSnapshot::new("abc12345", "testnet");
        snapshot.write(&store).unwrap();

        let back = EnvSnapshot::read(&store).unwrap().unwrap();
        assert_eq!(back.env_hash, "abc12345");
        assert_eq!(back.mode, "testnet");
        assert!(back.written_at > 0.0);
    }

    #[test]
    fn test_snapshot_absent_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path()).unwrap();
        assert!(EnvSnapshot::read(&store).unwrap().is_none());
    }
}
