//! The on-disk plugin cache: avoids re-opening every `cdylib` on every
//! startup by remembering each plugin's advertised modules keyed by its
//! relative path, modification time and size.
//!
//! Serialized with `rmp-serde` (MessagePack) rather than `serde_json` —
//! an opaque binary format matches the cache's description in the data
//! model better than a human-editable one, and `rmp-serde` is already
//! part of the dependency stack this crate was grown from.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::descriptor::Module;
use crate::error::{BankError, Result};

/// One plugin's cached identity and advertised modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub rel_path: String,
    pub mtime: i64,
    pub size: u64,
    pub primary: Module,
    pub submodules: Vec<Module>,
}

/// The cache file's whole contents: every plugin this host has ever
/// discovered, keyed by relative path.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PluginCache {
    entries: HashMap<String, CacheEntry>,
}

impl PluginCache {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| BankError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        rmp_serde::from_slice(&bytes).map_err(|source| BankError::CacheCorrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the cache, falling back to an empty one (and logging at
    /// `debug`) if the file is missing or corrupt — a stale or absent
    /// cache is never fatal, it just means every plugin gets reloaded.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(cache) => cache,
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "ignoring plugins cache file");
                Self::default()
            }
        }
    }

    /// Returns the cached entry for `rel_path` only if its filesystem
    /// identity still matches — a plugin rebuilt since the cache was
    /// written must never be served from stale data.
    pub fn lookup(&self, rel_path: &str, mtime: i64, size: u64) -> Option<&CacheEntry> {
        self.entries
            .get(rel_path)
            .filter(|entry| entry.mtime == mtime && entry.size == size)
    }

    pub fn insert(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.rel_path.clone(), entry);
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = rmp_serde::to_vec(self).map_err(|source| BankError::CacheWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::write(path, bytes).map_err(|source| BankError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Capability;

    fn entry(rel_path: &str, mtime: i64, size: u64) -> CacheEntry {
        CacheEntry {
            rel_path: rel_path.to_string(),
            mtime,
            size,
            primary: Module::new("demux", Capability::new("demux"), 10),
            submodules: Vec::new(),
        }
    }

    #[test]
    fn lookup_misses_on_mtime_or_size_mismatch() {
        let mut cache = PluginCache::default();
        cache.insert(entry("codec/foo.so", 100, 4096));

        assert!(cache.lookup("codec/foo.so", 100, 4096).is_some());
        assert!(cache.lookup("codec/foo.so", 101, 4096).is_none());
        assert!(cache.lookup("codec/foo.so", 100, 4097).is_none());
        assert!(cache.lookup("codec/bar.so", 100, 4096).is_none());
    }

    #[test]
    fn round_trips_through_messagepack() {
        let mut cache = PluginCache::default();
        cache.insert(entry("codec/foo.so", 100, 4096));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins.cache");
        cache.save(&path).unwrap();

        let loaded = PluginCache::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.lookup("codec/foo.so", 100, 4096).is_some());
    }

    #[test]
    fn load_or_empty_tolerates_missing_file() {
        let cache = PluginCache::load_or_empty(Path::new("/nonexistent/plugins.cache"));
        assert!(cache.is_empty());
    }

    #[test]
    fn load_or_empty_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins.cache");
        std::fs::write(&path, b"not valid messagepack").unwrap();
        let cache = PluginCache::load_or_empty(&path);
        assert!(cache.is_empty());
    }
}
