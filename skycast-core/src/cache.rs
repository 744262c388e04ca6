//! Key/value persistence for snapshots and location state.
//!
//! Stores are synchronous and infallible from the caller's point of view:
//! a malformed or unreadable value reads as absent, and a failed write is
//! returned as a [`CacheError`] for the caller to log.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{collections::HashMap, fmt, fs, path::PathBuf, sync::Arc};

use crate::{
    error::CacheError,
    model::{Coordinates, Units, WeatherSnapshot},
};

/// Raw string key/value store.
pub trait CacheStore: Send + Sync + fmt::Debug {
    fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set_raw(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// Read and decode a JSON value. Any failure reads as a miss.
pub fn read_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = match store.get_raw(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::debug!(key, "Cache miss");
            return None;
        }
        Err(e) => {
            tracing::debug!(key, error = %e, "Cache read failed, treating as miss");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(key, error = %e, "Malformed cache entry, treating as miss");
            None
        }
    }
}

/// Encode a value as JSON and store it.
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
) -> Result<(), CacheError> {
    let json = serde_json::to_string(value).map_err(|e| CacheError::Write {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.set_raw(key, &json)
}

/// One `<key>.json` file per entry.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store in the platform cache directory.
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform cache directory"))?;
        Ok(Self::with_dir(dirs.cache_dir().to_path_buf()))
    }

    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CacheStore for FileStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }

        fs::read_to_string(&path).map(Some).map_err(|e| CacheError::Read {
            key: key.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let write_err = |e: std::io::Error| CacheError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;
        fs::write(self.path(key), value).map_err(write_err)
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Snapshot cache key. Built from the exact float values, so two readings of
/// the "same" place with different precision are different keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheKey {
    pub coords: Coordinates,
    pub units: Units,
}

impl CacheKey {
    pub fn new(coords: Coordinates, units: Units) -> Self {
        Self { coords, units }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "weather_cache_{}_{}_{}",
            self.coords.lat, self.coords.lon, self.units
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Epoch milliseconds.
    pub fetched_at: i64,
    pub data: WeatherSnapshot,
}

impl CacheEntry {
    pub fn new(data: WeatherSnapshot) -> Self {
        Self {
            fetched_at: Utc::now().timestamp_millis(),
            data,
        }
    }

    /// Freshness annotation only. Entries never expire.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        Duration::milliseconds(now.timestamp_millis() - self.fetched_at)
    }
}

/// Typed snapshot access on top of a [`CacheStore`].
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    store: Arc<dyn CacheStore>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        read_json(self.store.as_ref(), &key.to_string())
    }

    /// Overwrites any previous entry for the key.
    pub fn set(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
        write_json(self.store.as_ref(), &key.to_string(), entry)
    }
}
