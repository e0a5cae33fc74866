//! Last-used container storage.
//!
//! Reads/writes ~/.config/nbdash/container.json. The file holds one entry
//! under a fixed key; a missing or unreadable file means nothing is cached.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the cached container URL.
pub const CONTAINER_CACHE_KEY: &str = "urth_container_url";

/// A container URL remembered from an earlier run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedContainer {
    pub url: String,
    pub saved_at: DateTime<Utc>,
}

/// Where the viewer remembers its last container.
pub trait ContainerCache {
    fn load(&self) -> Option<CachedContainer>;

    fn store(&mut self, url: &str);

    fn clear(&mut self);
}

/// Returns the path to the container cache file.
pub fn cache_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("nbdash/container.json"))
}

/// Cache backed by a JSON file. Write failures are logged and otherwise
/// ignored: losing the cache only costs a spawn.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Cache at the default config location.
    pub fn default_location() -> Option<Self> {
        cache_file_path().map(Self::new)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_entries(&self) -> BTreeMap<String, CachedContainer> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    fn write_entries(&self, entries: &BTreeMap<String, CachedContainer>) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| format!("Failed to serialize container cache: {}", e))?;
        std::fs::write(&self.path, contents)
            .map_err(|e| format!("Failed to write container cache: {}", e))
    }
}

impl ContainerCache for FileCache {
    fn load(&self) -> Option<CachedContainer> {
        self.read_entries().remove(CONTAINER_CACHE_KEY)
    }

    fn store(&mut self, url: &str) {
        let mut entries = self.read_entries();
        entries.insert(
            CONTAINER_CACHE_KEY.to_string(),
            CachedContainer { url: url.to_string(), saved_at: Utc::now() },
        );
        if let Err(e) = self.write_entries(&entries) {
            log::warn!("{}", e);
        }
    }

    fn clear(&mut self) {
        let mut entries = self.read_entries();
        if entries.remove(CONTAINER_CACHE_KEY).is_none() {
            return;
        }
        if let Err(e) = self.write_entries(&entries) {
            log::warn!("{}", e);
        }
    }
}

/// In-process cache, for embedders without a config directory and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entry: Option<CachedContainer>,
}

impl MemoryCache {
    pub fn with_url(url: &str) -> Self {
        Self {
            entry: Some(CachedContainer { url: url.to_string(), saved_at: Utc::now() }),
        }
    }
}

impl ContainerCache for MemoryCache {
    fn load(&self) -> Option<CachedContainer> {
        self.entry.clone()
    }

    fn store(&mut self, url: &str) {
        self.entry = Some(CachedContainer { url: url.to_string(), saved_at: Utc::now() });
    }

    fn clear(&mut self) {
        self.entry = None;
    }
}
