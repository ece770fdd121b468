//! Host-supplied configuration: the two cache-behavior flags from the
//! external interface table, plus where the bank should look for plugins.
//!
//! Nothing in this crate reads environment variables or process-wide state
//! directly except [`StaticHostConfig::from_env`], which is an opt-in
//! convenience constructor. The bank itself only ever consults a
//! `&dyn HostConfig`, so an embedder that already owns a configuration
//! layer (a TOML file, a `clap`-parsed CLI) implements the trait over it
//! instead of adopting this crate's idea of configuration.

use std::path::{Path, PathBuf};

/// Name of the environment variable listing additional plugin search
/// roots, platform-path-separator-joined, appended after the host's own
/// plugin directory. Renamed from the upstream `VLC_PLUGIN_PATH`; the
/// semantics are unchanged.
pub const PLUGIN_PATH_ENV: &str = "MODBANK_PLUGIN_PATH";

/// Host-level policy the bank consults while building and refreshing
/// itself. See `spec.md` §6 for the two flags' original names and meaning.
pub trait HostConfig: Send + Sync {
    /// Root directory the host ships its own plugins under. Always
    /// searched first, regardless of `MODBANK_PLUGIN_PATH`.
    fn plugin_dir(&self) -> &Path;

    /// Where the on-disk plugin cache is read from and written to.
    fn cache_path(&self) -> &Path;

    /// `plugins-cache`: whether a cache may be read or written at all.
    fn cache_enabled(&self) -> bool;

    /// `reset-plugins-cache`: ignore any existing cache and rebuild it
    /// from a full directory walk, then overwrite it on success.
    fn reset_cache(&self) -> bool;

    /// Maximum recursion depth for the directory walker (spec.md §4.5).
    fn max_scan_depth(&self) -> u32 {
        5
    }

    /// Additional search roots beyond `plugin_dir()`, in search order.
    /// The default implementation reads [`PLUGIN_PATH_ENV`].
    fn extra_search_paths(&self) -> Vec<PathBuf> {
        std::env::var_os(PLUGIN_PATH_ENV)
            .map(|val| std::env::split_paths(&val).collect())
            .unwrap_or_default()
    }
}

/// A plain-data [`HostConfig`] for embedders and tests that don't need a
/// richer configuration layer.
#[derive(Debug, Clone)]
pub struct StaticHostConfig {
    pub plugin_dir: PathBuf,
    pub cache_path: PathBuf,
    pub cache_enabled: bool,
    pub reset_cache: bool,
    pub max_scan_depth: u32,
    pub extra_search_paths: Vec<PathBuf>,
}

impl StaticHostConfig {
    pub fn new(plugin_dir: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            cache_path: cache_path.into(),
            cache_enabled: true,
            reset_cache: false,
            max_scan_depth: 5,
            extra_search_paths: Vec::new(),
        }
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_reset_cache(mut self, reset: bool) -> Self {
        self.reset_cache = reset;
        self
    }

    pub fn with_extra_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.extra_search_paths = paths;
        self
    }

    /// Build from `plugin_dir`/`cache_path` plus whatever
    /// [`PLUGIN_PATH_ENV`] currently holds in the process environment.
    pub fn from_env(plugin_dir: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        let extra = std::env::var_os(PLUGIN_PATH_ENV)
            .map(|val| std::env::split_paths(&val).collect())
            .unwrap_or_default();
        Self::new(plugin_dir, cache_path).with_extra_search_paths(extra)
    }
}

impl HostConfig for StaticHostConfig {
    fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    fn reset_cache(&self) -> bool {
        self.reset_cache
    }

    fn max_scan_depth(&self) -> u32 {
        self.max_scan_depth
    }

    fn extra_search_paths(&self) -> Vec<PathBuf> {
        self.extra_search_paths.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_config_defaults_to_cache_enabled_and_not_reset() {
        let cfg = StaticHostConfig::new("/plugins", "/plugins/cache.dat");
        assert!(cfg.cache_enabled());
        assert!(!cfg.reset_cache());
        assert_eq!(cfg.max_scan_depth(), 5);
        assert!(cfg.extra_search_paths().is_empty());
    }

    #[test]
    fn builder_methods_override_defaults() {
        let cfg = StaticHostConfig::new("/plugins", "/plugins/cache.dat")
            .with_cache_enabled(false)
            .with_reset_cache(true)
            .with_extra_search_paths(vec![PathBuf::from("/extra")]);
        assert!(!cfg.cache_enabled());
        assert!(cfg.reset_cache());
        assert_eq!(cfg.extra_search_paths(), vec![PathBuf::from("/extra")]);
    }
}
