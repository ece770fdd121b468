//! The in-memory record for one plugin and the modules it advertises.

use std::fmt;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A role string used by the rest of the host to select a module for a
/// task ("decoder", "access", "demux", ...). Wrapped rather than a bare
/// `String` so capability comparisons can't be confused with description
/// text at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability(String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The type of value a [`ConfigOption`] holds. Sorting and UI presentation
/// of options (the "configuration-option sorting" collaborator named in
/// `spec.md` §1) consume this but are not implemented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigKind {
    Bool,
    Int,
    Float,
    String,
}

/// One configuration option advertised by a module.
///
/// `has_enum_callback` stands in for the upstream `psz_cb`/`i_cb` function
/// pointers: a plugin's describe call can declare that a given option's
/// valid values are produced by a callback living in the plugin's own
/// code. Because that callback is a function pointer, not data, a plugin
/// with any such option can never be served from an unloaded (cache-only)
/// descriptor — see [`PluginDescriptor::requires_eager_load`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption {
    pub name: String,
    pub kind: ConfigKind,
    pub default: serde_json::Value,
    pub description: Option<String>,
    #[serde(default)]
    pub has_enum_callback: bool,
}

impl ConfigOption {
    pub fn new(name: impl Into<String>, kind: ConfigKind, default: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            description: None,
            has_enum_callback: false,
        }
    }

    pub fn with_enum_callback(mut self) -> Self {
        self.has_enum_callback = true;
        self
    }
}

/// A named entry point within a plugin advertising a capability and a score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub capability: Capability,
    pub score: i32,
    pub description: String,
    #[serde(default)]
    pub config: Vec<ConfigOption>,
}

impl Module {
    pub fn new(name: impl Into<String>, capability: Capability, score: i32) -> Self {
        Self {
            name: name.into(),
            capability,
            score,
            description: String::new(),
            config: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_config(mut self, config: Vec<ConfigOption>) -> Self {
        self.config = config;
        self
    }

    pub fn provides(&self, capability: &Capability) -> bool {
        &self.capability == capability
    }
}

/// What a plugin's entry point actually hands back across the FFI
/// boundary: just the modules it advertises. The host — not the plugin —
/// holds the [`libloading::Library`] handle, so the full [`PluginDescriptor`]
/// (which carries that handle) can only be assembled on the host side,
/// after the entry call returns.
#[derive(Debug)]
pub struct RawDescriptor {
    pub primary: Module,
    pub submodules: Vec<Module>,
}

impl RawDescriptor {
    pub fn new(primary: Module) -> Self {
        Self {
            primary,
            submodules: Vec::new(),
        }
    }

    pub fn with_submodules(mut self, submodules: Vec<Module>) -> Self {
        self.submodules = submodules;
        self
    }
}

/// True if any module in `primary`/`submodules` carries a config option
/// with an enumeration callback — used before a cache hit is accepted, so
/// a callback-bearing plugin is re-loaded eagerly instead of served
/// unloaded (see `spec.md` §4.5 step 4).
pub fn any_requires_eager_load(primary: &Module, submodules: &[Module]) -> bool {
    std::iter::once(primary)
        .chain(submodules.iter())
        .any(|m| m.config.iter().any(|c| c.has_enum_callback))
}

/// Anything that must be kept alive for as long as code or data loaded
/// from it might still be reachable, and dropped to release it. The real
/// implementation is `libloading::Library` (dropping it calls `dlclose`);
/// tests substitute a handle that does nothing on drop, so `map()` and the
/// directory walker can be exercised without a real `cdylib` on disk.
pub trait LibraryHandle: Send {}

impl LibraryHandle for libloading::Library {}

/// Runtime-only fields that change as a descriptor moves between the
/// unloaded (cache-resurrected) and loaded states. Kept separate from the
/// rest of [`PluginDescriptor`] so `map()` can mutate them under its own
/// lock without touching anything the bank lock protects.
struct LoadState {
    loaded: bool,
    handle: Option<Box<dyn LibraryHandle>>,
}

impl fmt::Debug for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadState")
            .field("loaded", &self.loaded)
            .field("handle", &self.handle.is_some())
            .finish()
    }
}

/// One shared object (or statically linked unit) and the modules it hosts.
///
/// `spec.md`'s `modules` field (one primary module plus an ordered list of
/// submodules) is represented directly as `primary` + `submodules` rather
/// than a linked list threaded through `Module::submodule`; the stored
/// `submodule_count` field from the data model is likewise dropped in
/// favor of `submodules.len()`, which cannot drift out of sync with the
/// vector it describes.
#[derive(Debug)]
pub struct PluginDescriptor {
    pub primary: Module,
    pub submodules: Vec<Module>,
    /// Canonical path relative to the containing search root. Empty for
    /// static plugins.
    pub path: Option<String>,
    pub abs_path: Option<PathBuf>,
    /// Filesystem identity at load time, used to validate cache entries.
    pub mtime: Option<i64>,
    pub size: Option<u64>,
    /// May the loader release the OS handle at shutdown?
    pub unloadable: bool,
    state: Mutex<LoadState>,
}

impl PluginDescriptor {
    /// Build a descriptor for a statically linked plugin: loaded, not
    /// unloadable, no filesystem identity.
    pub fn new_static(primary: Module, submodules: Vec<Module>) -> Self {
        Self {
            primary,
            submodules,
            path: None,
            abs_path: None,
            mtime: None,
            size: None,
            unloadable: false,
            state: Mutex::new(LoadState {
                loaded: true,
                handle: None,
            }),
        }
    }

    /// Build a descriptor for a plugin discovered on disk: known
    /// filesystem identity (used later to validate cache entries), plus
    /// whatever load state it starts in — `Some(handle)` for a plugin just
    /// produced by a real dynamic load, `None` for one resurrected from
    /// the on-disk cache without being opened.
    ///
    /// A plugin with any callback-bearing config option must never be
    /// released at shutdown: the callback is a live code pointer, not
    /// data, so `unloadable` is forced to false whenever
    /// `any_requires_eager_load` holds, regardless of what the caller
    /// would otherwise pass.
    pub fn new_from_file(
        primary: Module,
        submodules: Vec<Module>,
        rel_path: String,
        abs_path: PathBuf,
        mtime: i64,
        size: u64,
        handle: Option<Box<dyn LibraryHandle>>,
    ) -> Self {
        let loaded = handle.is_some();
        let unloadable = !any_requires_eager_load(&primary, &submodules);
        Self {
            primary,
            submodules,
            path: Some(rel_path),
            abs_path: Some(abs_path),
            mtime: Some(mtime),
            size: Some(size),
            unloadable,
            state: Mutex::new(LoadState { loaded, handle }),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    /// 1 (primary) + the number of submodules, i.e. `list_all`'s per-plugin
    /// contribution.
    pub fn module_count(&self) -> usize {
        1 + self.submodules.len()
    }

    pub fn all_modules(&self) -> impl Iterator<Item = &Module> {
        std::iter::once(&self.primary).chain(self.submodules.iter())
    }

    /// True when any config option on this plugin carries an enumeration
    /// callback — such a plugin cannot remain unloaded (the callback lives
    /// in code, not data).
    pub fn requires_eager_load(&self) -> bool {
        any_requires_eager_load(&self.primary, &self.submodules)
    }

    /// Promote an unloaded descriptor in place, transferring the OS handle
    /// from a freshly loaded scratch descriptor. Cached strings and module
    /// metadata stay put; only runtime-only state moves.
    pub(crate) fn adopt_loaded_state(&self, handle: Box<dyn LibraryHandle>) {
        let mut state = self.state.lock();
        state.handle = Some(handle);
        state.loaded = true;
    }

    /// Release the OS handle at shutdown, if any, and mark unloaded. Used
    /// only by `EndBank` on plugins where `unloadable` is true.
    pub(crate) fn unload(&self) {
        let mut state = self.state.lock();
        state.loaded = false;
        state.handle = None; // dropping Library triggers dlclose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_module(name: &str, cap: &str, score: i32) -> Module {
        Module::new(name, Capability::new(cap), score)
    }

    #[test]
    fn static_descriptor_is_loaded_and_not_unloadable() {
        let d = PluginDescriptor::new_static(sample_module("core", "core", 0), Vec::new());
        assert!(d.is_loaded());
        assert!(!d.unloadable);
    }

    #[test]
    fn module_count_includes_submodules() {
        let d = PluginDescriptor::new_static(
            sample_module("demux", "demux", 10),
            vec![sample_module("demux-sub", "demux", 5)],
        );
        assert_eq!(d.module_count(), 2);
    }

    #[test]
    fn requires_eager_load_detects_callback_anywhere() {
        let opt = ConfigOption::new("codec", ConfigKind::String, serde_json::json!("auto"))
            .with_enum_callback();
        let primary = sample_module("access", "access", 1).with_config(vec![opt]);
        let d = PluginDescriptor::new_from_file(
            primary,
            Vec::new(),
            "a.so".into(),
            PathBuf::from("/plugins/a.so"),
            1,
            1,
            None,
        );
        assert!(d.requires_eager_load());
    }

    #[test]
    fn callback_bearing_file_descriptor_is_not_unloadable() {
        let opt = ConfigOption::new("codec", ConfigKind::String, serde_json::json!("auto"))
            .with_enum_callback();
        let primary = sample_module("access", "access", 1).with_config(vec![opt]);
        let d = PluginDescriptor::new_from_file(
            primary,
            Vec::new(),
            "a.so".into(),
            PathBuf::from("/plugins/a.so"),
            1,
            1,
            None,
        );
        assert!(!d.unloadable);
    }

    #[test]
    fn file_descriptor_without_handle_is_not_loaded() {
        let d = PluginDescriptor::new_from_file(
            sample_module("access", "access", 1),
            Vec::new(),
            "a.so".into(),
            PathBuf::from("/plugins/a.so"),
            1,
            1,
            None,
        );
        assert!(!d.is_loaded());
    }
}
