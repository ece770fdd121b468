//! Compile-time enrollment of plugins linked directly into the host
//! binary — the "weakly linked static plugin table" from the original
//! implementation, reimagined as explicit `inventory::submit!` registration
//! rather than linker-section magic, the same choice the grounding crate
//! made for its processor registry (`ProcessorInstanceFactory`).

use crate::descriptor::Module;

/// One statically linked plugin's describe function, submitted at compile
/// time. `describe` returns `None` if the plugin declines to enroll on
/// this build (an unsupported platform feature, say); `is_core` marks the
/// one plugin `init_bank` requires to successfully describe itself.
pub struct StaticPlugin {
    pub name: &'static str,
    pub is_core: bool,
    pub describe: fn() -> Option<(Module, Vec<Module>)>,
}

inventory::collect!(StaticPlugin);

/// Enrolls a statically linked plugin. Call from a module's own code, not
/// from inside a function body — `inventory::submit!` expects item
/// position.
#[macro_export]
macro_rules! static_plugin {
    ($name:expr, $describe:expr) => {
        $crate::inventory::submit! {
            $crate::static_enroll::StaticPlugin {
                name: $name,
                is_core: false,
                describe: $describe,
            }
        }
    };
}

/// Enrolls the one static plugin `init_bank` treats as mandatory. A host
/// binary must submit exactly one of these.
#[macro_export]
macro_rules! static_core_plugin {
    ($name:expr, $describe:expr) => {
        $crate::inventory::submit! {
            $crate::static_enroll::StaticPlugin {
                name: $name,
                is_core: true,
                describe: $describe,
            }
        }
    };
}

pub fn enrolled() -> impl Iterator<Item = &'static StaticPlugin> {
    inventory::iter::<StaticPlugin>()
}

pub fn core_plugin() -> Option<&'static StaticPlugin> {
    enrolled().find(|p| p.is_core)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Capability;

    fn describe_test_core() -> Option<(Module, Vec<Module>)> {
        Some((Module::new("core", Capability::new("core"), 0), Vec::new()))
    }

    inventory::submit! {
        StaticPlugin { name: "test-core", is_core: true, describe: describe_test_core }
    }

    #[test]
    fn core_plugin_is_discoverable_via_inventory() {
        let core = core_plugin().expect("test-core should be enrolled");
        assert_eq!(core.name, "test-core");
        assert!((core.describe)().is_some());
    }
}
