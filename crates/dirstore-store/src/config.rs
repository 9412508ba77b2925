use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dirstore_cache::DEFAULT_MAX_SIZE;

use crate::error::{StoreError, StoreResult};

/// Configuration for an [`ObjectStore`](crate::ObjectStore).
///
/// Loadable from TOML; missing keys take their defaults:
///
/// ```toml
/// root = "/var/lib/dirstore"
/// cache_size = 100
/// sync_writes = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the namespace.
    pub root: PathBuf,
    /// Capacity of each entry cache (objects and attributes).
    pub cache_size: usize,
    /// `fsync` every unit before it replaces the previous one.
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            cache_size: DEFAULT_MAX_SIZE,
            sync_writes: true,
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read a TOML file. A relative `root` is resolved against the file's
    /// directory.
    pub fn from_toml_file(path: &Path) -> StoreResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::storage(path, e))?;
        let mut config = Self::from_toml_str(&text)?;
        if config.root.is_relative() {
            if let Some(dir) = path.parent() {
                config.root = dir.join(&config.root);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.root, PathBuf::from("."));
        assert_eq!(c.cache_size, 100);
        assert!(c.sync_writes);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let c = StoreConfig::from_toml_str("root = \"/srv/ns\"\ncache_size = 8\n").unwrap();
        assert_eq!(c.root, PathBuf::from("/srv/ns"));
        assert_eq!(c.cache_size, 8);
        assert!(c.sync_writes);
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = StoreConfig::from_toml_str("cache_size = \"many\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn file_root_resolved_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dirstore.toml");
        fs::write(&path, "root = \"data\"\nsync_writes = false\n").unwrap();

        let c = StoreConfig::from_toml_file(&path).unwrap();
        assert_eq!(c.root, dir.path().join("data"));
        assert!(!c.sync_writes);
    }
}
