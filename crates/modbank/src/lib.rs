//! Process-wide bank of plugin modules: static enrollment, recursive
//! filesystem discovery of dynamically loaded plugins, a persistent
//! on-disk cache keyed by path identity, lazy promotion of
//! cache-resurrected descriptors into fully loaded ones, and
//! capability-filtered, score-sorted enumeration.
//!
//! Grounded on the grounding crate's plugin infrastructure
//! (`streamlib-core::registry`, `streamlib-cli::plugin_loader`,
//! `streamlib::core::clap::scanner`) generalized from a single-kind
//! processor registry into the bank lifecycle this crate implements. See
//! `DESIGN.md` at the repository root for the full grounding ledger.

pub mod bank;
pub mod cache;
pub mod config;
pub mod descriptor;
pub mod enumerate;
pub mod error;
pub mod loader;
pub mod static_enroll;
mod walker;

pub use bank::{end_bank, init_bank, load_plugins, map, with_plugins, BankHandle};
pub use cache::{CacheEntry, PluginCache};
pub use config::{HostConfig, StaticHostConfig, PLUGIN_PATH_ENV};
pub use descriptor::{
    Capability, ConfigKind, ConfigOption, LibraryHandle, Module, PluginDescriptor, RawDescriptor,
};
pub use enumerate::{list_all, list_by_capability, sort_by_score, ModuleEntry};
pub use error::{BankError, Result};
pub use loader::{DylibLoader, EntryLoader};
pub use static_enroll::StaticPlugin;
pub use walker::{discover as discover_plugins, search_roots};

/// Re-exported so the `static_plugin!`/`static_core_plugin!` macros can
/// reference `$crate::inventory` without requiring downstream plugin
/// crates to depend on `inventory` directly.
pub use inventory;
