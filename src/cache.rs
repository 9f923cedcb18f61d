//! Content-addressed response cache.
//!
//! One JSON file per entry, named after the SHA3-256 of the cache key.
//! Corrupt entries read as misses and write failures are dropped; neither
//! ever reaches the caller. There is no eviction.

use crate::tools::ToolSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha3::{Digest, Sha3_256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Deterministic fingerprint of `(query, schema set)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint a query and the schemas offered with it.
    ///
    /// Object keys are sorted and the schemas are ordered canonically, so
    /// neither key order nor offering order changes the fingerprint.
    pub fn derive(query: &str, schemas: &[ToolSchema]) -> Self {
        let mut canonical: Vec<String> = schemas
            .iter()
            .map(|schema| canonical_json(&schema.to_value()))
            .collect();
        canonical.sort();
        Self::from_material(&format!("{}:[{}]", query, canonical.join(",")))
    }

    /// Fingerprint arbitrary key material.
    pub fn from_material(material: &str) -> Self {
        Self(hex::encode(Sha3_256::digest(material.as_bytes())))
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// Durable memo of model responses. Without a directory it is disabled and
/// every lookup misses.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    dir: Option<PathBuf>,
}

impl CacheStore {
    /// Cache rooted at `dir`, created if needed. If the directory cannot be
    /// created the cache stays disabled.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match fs::create_dir_all(&dir) {
            Ok(()) => Self { dir: Some(dir) },
            Err(e) => {
                warn!("Cache disabled, cannot create {}: {}", dir.display(), e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// `Some(dir)` enables the cache, `None` disables it.
    pub fn from_option(dir: Option<PathBuf>) -> Self {
        dir.map(Self::open).unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn path_for(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(key.file_name()))
    }

    /// Stored record for `key`; absent, unreadable or malformed entries miss.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let path = self.path_for(key)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cache entry unreadable ({}): {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(record) => {
                debug!("Loaded from cache: {}", path.display());
                Some(record)
            }
            Err(e) => {
                warn!("Cache entry corrupted ({}): {}", path.display(), e);
                None
            }
        }
    }

    /// Store `record` under `key`, replacing any previous entry wholesale.
    ///
    /// The file is written beside its final name and renamed into place, so
    /// concurrent writers of one key leave exactly one complete record.
    pub fn set<T: Serialize>(&self, key: &CacheKey, record: &T) {
        let Some(path) = self.path_for(key) else {
            return;
        };

        let body = match serde_json::to_string_pretty(record) {
            Ok(body) => body,
            Err(e) => {
                warn!("Cache serialization failed, entry not saved: {}", e);
                return;
            }
        };

        let tmp = path.with_extension(format!("{}.tmp", ulid::Ulid::new()));
        let written = fs::write(&tmp, body).and_then(|()| fs::rename(&tmp, &path));
        match written {
            Ok(()) => debug!("Saved to cache: {}", path.display()),
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                warn!("Cache write failed ({}): {}", path.display(), e);
            }
        }
    }

    /// Number of stored entries.
    pub fn entry_count(&self) -> usize {
        let Some(dir) = &self.dir else {
            return 0;
        };
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                    .count()
            })
            .unwrap_or(0)
    }
}
