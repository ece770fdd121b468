//! ABI-stable entry point contract for dynamically loaded modbank plugins.
//!
//! This crate is deliberately tiny: it only fixes the *name* and *version*
//! of the symbol a plugin `cdylib` must export, plus the macro that emits it.
//! Everything past that boundary — the shape of the descriptor the entry
//! point returns, the describe protocol that builds it — is the host
//! crate's concern. Plugin authors link only this crate, not the (much
//! heavier) host library, so the dependency graph of a plugin stays small.
//!
//! # Example plugin
//!
//! ```ignore
//! use modbank::{Capability, Module, RawDescriptor};
//! use modbank_abi::export_entry;
//!
//! fn describe() -> RawDescriptor {
//!     RawDescriptor::new(Module::new("my_decoder", Capability::new("decoder"), 100))
//! }
//!
//! export_entry!(RawDescriptor, describe);
//! ```
//!
//! # Plugin `Cargo.toml`
//!
//! ```toml
//! [lib]
//! crate-type = ["cdylib"]
//!
//! [dependencies]
//! modbank = "0.1"
//! modbank-abi = "0.1"
//! ```

/// Fixed prefix of the entry symbol name, disambiguated by [`ABI_VERSION`].
///
/// A real deployment would bump this suffix on breaking ABI changes and
/// refuse to load a plugin compiled against a mismatched version; this
/// crate intentionally does not attempt that negotiation (see the host
/// crate's module-level docs for why).
pub const ENTRY_SYMBOL_PREFIX: &str = "modbank_entry";

/// Current ABI revision. Baked into the entry symbol name at link time.
pub const ABI_VERSION: u32 = 1;

/// Exact symbol name the dynamic loader looks up in a plugin binary,
/// including the trailing NUL `dlsym`-style lookups require.
///
/// Some platforms additionally prepend an underscore to all exported C
/// symbols; the loader tries both spellings.
pub const ENTRY_SYMBOL: &str = concat!("modbank_entry_", "1", "\0");

/// Emits the `#[no_mangle]` entry point a plugin `cdylib` must export.
///
/// `$descriptor_ty` is the concrete descriptor type the host expects back
/// (normally `modbank::PluginDescriptor`); `$describe` is a `fn() -> $descriptor_ty`
/// implementing the describe protocol for this plugin.
///
/// Ownership of the returned descriptor transfers to the host, which
/// reconstructs it with `Box::from_raw` immediately after the call.
#[macro_export]
macro_rules! export_entry {
    ($descriptor_ty:ty, $describe:expr) => {
        #[no_mangle]
        pub unsafe extern "C" fn modbank_entry_1() -> *mut $descriptor_ty {
            let f: fn() -> $descriptor_ty = $describe;
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(f()))
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_symbol_matches_prefix_and_version() {
        assert_eq!(
            ENTRY_SYMBOL,
            format!("{}_{}\0", ENTRY_SYMBOL_PREFIX, ABI_VERSION)
        );
    }
}
