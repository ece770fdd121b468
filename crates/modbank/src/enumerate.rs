//! Capability-filtered, score-sorted enumeration of everything the bank
//! currently holds.
//!
//! `Vec::sort_by` is stable, so plugins that tie on score keep the
//! relative order they were enrolled in (static plugins first, then
//! directory-discovered ones in walk order) without needing the original
//! implementation's separate tie-break comparison — `sort_by`'s stability
//! guarantee gives that for free, unlike the `qsort` it replaces.

use std::sync::Arc;

use crate::descriptor::{Capability, Module, PluginDescriptor};

/// One module together with the plugin that hosts it, as handed back by
/// enumeration. Cloning a result is cheap: it only clones the `Arc` and
/// the small [`Module`] value, never the plugin's OS handle.
#[derive(Clone)]
pub struct ModuleEntry {
    pub plugin: Arc<PluginDescriptor>,
    pub module: Module,
}

/// Sorts plugins by their primary module's score, descending, in place.
/// Called once after enrollment completes (see the design note on why
/// this crate sorts only once, unlike the sort/unsort/sort call sequence
/// in the implementation this was grown from).
pub fn sort_by_score(plugins: &mut [Arc<PluginDescriptor>]) {
    plugins.sort_by(|a, b| b.primary.score.cmp(&a.primary.score));
}

/// Every module hosted by every plugin, primary first within each plugin,
/// in the bank's current order.
pub fn list_all(plugins: &[Arc<PluginDescriptor>]) -> Vec<ModuleEntry> {
    plugins
        .iter()
        .flat_map(|plugin| {
            plugin.all_modules().map({
                let plugin = plugin.clone();
                move |module| ModuleEntry {
                    plugin: plugin.clone(),
                    module: module.clone(),
                }
            })
        })
        .collect()
}

/// Every module advertising `capability`, sorted by score descending
/// (ties broken by enrollment order, via [`sort_by_score`] having already
/// run over `plugins`).
pub fn list_by_capability(
    plugins: &[Arc<PluginDescriptor>],
    capability: &Capability,
) -> Vec<ModuleEntry> {
    let mut matches: Vec<ModuleEntry> = plugins
        .iter()
        .flat_map(|plugin| {
            plugin.all_modules().filter_map({
                let plugin = plugin.clone();
                let capability = capability.clone();
                move |module| {
                    module.provides(&capability).then(|| ModuleEntry {
                        plugin: plugin.clone(),
                        module: module.clone(),
                    })
                }
            })
        })
        .collect();
    matches.sort_by(|a, b| b.module.score.cmp(&a.module.score));
    matches
}
