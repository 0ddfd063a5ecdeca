//! SSOT Artifact Store
//!
//! All inter-process state exchange goes through this module: path
//! resolution confined to a single root, atomic write-with-metadata, and
//! BOM-tolerant reads. The atomic temp-file + rename pattern is the sole
//! concurrency mechanism in the system; readers never observe a partial
//! artifact and the last full write wins.

pub mod paths;

pub use paths::{ArtifactPaths, KNOWN_SERVICES, WRITER_ROLES};

use crate::error::{QuantGateError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Schema version stamped into every metadata envelope
pub const SCHEMA_VERSION: &str = "1.0";

/// Key the metadata envelope is merged under
pub const META_KEY: &str = "_meta";

/// Metadata envelope injected into every artifact written through the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub producer: String,
    /// ISO-8601 UTC write time
    pub updated_at: String,
    pub schema_version: String,
}

impl ArtifactMeta {
    pub fn new(producer: &str, schema_version: &str) -> Self {
        Self {
            producer: producer.to_string(),
            updated_at: Utc::now().to_rfc3339(),
            schema_version: schema_version.to_string(),
        }
    }
}

/// Seam between probe logic and the backing storage. Probes and the gate
/// depend on this trait, never on the filesystem directly.
pub trait ArtifactStore: Send + Sync {
    /// Resolve a relative artifact path to an absolute path under the root
    fn resolve(&self, rel: &str) -> Result<PathBuf>;

    /// Serialize `payload` with an injected metadata envelope and write it
    /// atomically (temp file in the destination directory, flush, rename).
    fn write_json(
        &self,
        rel: &str,
        payload: &Value,
        producer: &str,
        schema_version: &str,
    ) -> Result<()>;

    /// Append one newline-delimited record, rewriting the whole file
    /// atomically. O(file size) by design; safety over true append.
    fn append_line(
        &self,
        rel: &str,
        record: &Value,
        producer: &str,
        schema_version: &str,
    ) -> Result<()>;

    /// Read and parse an artifact. `Ok(None)` when absent; a present but
    /// unparseable file is a `SchemaViolation`, never silently empty.
    fn read_json(&self, rel: &str) -> Result<Option<Value>>;

    /// Seconds since the artifact was last modified, +inf when absent
    fn modified_age(&self, rel: &str, now: f64) -> Result<f64>;
}

/// Filesystem-backed store carrying the resolved SSOT root. Constructed
/// once at process start and passed to every component; there is no
/// process-wide singleton.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`, creating the directory as needed
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        debug!("SSOT root resolved: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write_bytes_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let parent = path.parent().ok_or_else(|| QuantGateError::Internal(format!(
            "artifact path has no parent: {}",
            path.display()
        )))?;
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        // Atomic rename over the destination; a crash before this point
        // leaves the destination untouched.
        tmp.persist(path).map_err(|e| QuantGateError::Io(e.error))?;
        Ok(())
    }

    fn envelope(payload: &Value, producer: &str, schema_version: &str) -> Value {
        let meta = serde_json::to_value(ArtifactMeta::new(producer, schema_version))
            .unwrap_or(Value::Null);
        match payload {
            Value::Object(map) => {
                let mut merged = map.clone();
                merged.insert(META_KEY.to_string(), meta);
                Value::Object(merged)
            }
            other => {
                // Non-object payloads are wrapped so the envelope has a home
                serde_json::json!({ META_KEY: meta, "_data": other })
            }
        }
    }
}

impl ArtifactStore for FsStore {
    fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        if rel_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(QuantGateError::PathOutsideRoot {
                path: rel.to_string(),
            });
        }

        let joined = if rel_path.is_absolute() {
            rel_path.to_path_buf()
        } else {
            self.root.join(rel_path)
        };

        if !joined.starts_with(&self.root) {
            return Err(QuantGateError::PathOutsideRoot {
                path: rel.to_string(),
            });
        }

        Ok(joined)
    }

    fn write_json(
        &self,
        rel: &str,
        payload: &Value,
        producer: &str,
        schema_version: &str,
    ) -> Result<()> {
        let path = self.resolve(rel)?;
        let doc = Self::envelope(payload, producer, schema_version);
        let data = serde_json::to_string_pretty(&doc)?;
        self.write_bytes_atomic(&path, data.as_bytes())
    }

    fn append_line(
        &self,
        rel: &str,
        record: &Value,
        producer: &str,
        schema_version: &str,
    ) -> Result<()> {
        let path = self.resolve(rel)?;
        let doc = Self::envelope(record, producer, schema_version);
        let line = serde_json::to_string(&doc)?;

        let mut content = match fs::read(&path) {
            Ok(bytes) => decode_artifact_text(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&line);
        content.push('\n');

        self.write_bytes_atomic(&path, content.as_bytes())
    }

    fn read_json(&self, rel: &str) -> Result<Option<Value>> {
        let path = self.resolve(rel)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let text = decode_artifact_text(&bytes);
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("unparseable artifact {}: {}", rel, e);
                Err(QuantGateError::SchemaViolation {
                    artifact: rel.to_string(),
                    detail: e.to_string(),
                })
            }
        }
    }

    fn modified_age(&self, rel: &str, now: f64) -> Result<f64> {
        let path = self.resolve(rel)?;
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(f64::INFINITY),
            Err(e) => return Err(e.into()),
        };
        let mtime = metadata
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Ok(now - mtime)
    }
}

/// Last record of a newline-delimited log, `None` when the log is absent or
/// empty. An unparseable final line is a schema violation.
pub fn read_last_ndjson_line(store: &dyn ArtifactStore, rel: &str) -> Result<Option<Value>> {
    let path = store.resolve(rel)?;
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let text = decode_artifact_text(&bytes);
    for line in text.lines().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        return serde_json::from_str(line)
            .map(Some)
            .map_err(|e| QuantGateError::SchemaViolation {
                artifact: rel.to_string(),
                detail: e.to_string(),
            });
    }
    Ok(None)
}

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Decode artifact bytes, tolerating a UTF-8 BOM and falling back through
/// UTF-16 (by BOM) and lossy UTF-8. Writers always produce BOM-less UTF-8;
/// readers must interoperate with producers that do not.
fn decode_artifact_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => {
            if let Some(text) = decode_utf16(rest, true) {
                return text;
            }
        }
        [0xFE, 0xFF, rest @ ..] => {
            if let Some(text) = decode_utf16(rest, false) {
                return text;
            }
        }
        _ => {}
    }

    let body = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}
