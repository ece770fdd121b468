//! Dynamic loading seam: turns a path into a loaded plugin, or a
//! [`BankError`] that the caller is expected to log and skip.
//!
//! Grounded directly on the grounding crate's `PluginLoader`: open the
//! library, look up the fixed entry symbol, call it, reconstruct the boxed
//! descriptor. The difference from that crate is that here the seam is a
//! trait (`EntryLoader`) rather than a concrete struct, so the directory
//! walker and `map()` can be exercised in tests without linking a real
//! `cdylib`.

use std::path::Path;

use libloading::{Library, Symbol};

use crate::descriptor::{LibraryHandle, RawDescriptor};
use crate::error::{BankError, Result};

type EntryFn = unsafe extern "C" fn() -> *mut RawDescriptor;

/// Loads one plugin binary, returning the modules it describes plus a
/// handle that must be kept alive for as long as any pointer derived from
/// it might still be used.
///
/// `fast` is the probing hint from `spec.md` §4.3/§4.5: `true` while a
/// directory scan is only probing for a cache entry, `false` when the
/// result will actually be used (`map()`, and the callback-forced reload
/// of a cached descriptor). It may let an implementation skip constructor
/// execution or symbol binding where the platform supports it.
pub trait EntryLoader: Send + Sync {
    fn load(&self, path: &Path, fast: bool) -> Result<(RawDescriptor, Box<dyn LibraryHandle>)>;
}

/// The real loader: opens the binary with `libloading` and calls its
/// exported entry point.
///
/// `fast` is accepted and logged but does not currently change which
/// `dlopen` flags are used — doing so would mean reaching past
/// `libloading`'s portable API into per-platform `RTLD_*` constants, which
/// this crate does not do. See `DESIGN.md` for the tradeoff.
#[derive(Debug, Default)]
pub struct DylibLoader;

impl EntryLoader for DylibLoader {
    fn load(&self, path: &Path, fast: bool) -> Result<(RawDescriptor, Box<dyn LibraryHandle>)> {
        tracing::debug!(path = %path.display(), fast, "loading plugin binary");
        let lib = unsafe { Library::new(path) }.map_err(|source| BankError::LoadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let entry = unsafe { lookup_entry(&lib, path)? };
        let raw_ptr = unsafe { entry() };
        if raw_ptr.is_null() {
            return Err(BankError::DescribeFailed {
                path: path.to_path_buf(),
            });
        }
        let raw = *unsafe { Box::from_raw(raw_ptr) };
        Ok((raw, Box::new(lib)))
    }
}

/// Looks up the entry symbol, trying the bare name first and then the
/// platform's underscore-prefixed alias (see `modbank_abi::ENTRY_SYMBOL`'s
/// docs).
unsafe fn lookup_entry<'lib>(lib: &'lib Library, path: &Path) -> Result<Symbol<'lib, EntryFn>> {
    let bare = lib.get::<EntryFn>(modbank_abi::ENTRY_SYMBOL.as_bytes());
    if let Ok(sym) = bare {
        return Ok(sym);
    }
    let mut aliased = String::from("_");
    aliased.push_str(modbank_abi::ENTRY_SYMBOL);
    lib.get::<EntryFn>(aliased.as_bytes())
        .map_err(|_| BankError::NoEntry {
            path: path.to_path_buf(),
        })
}


#[cfg(test)]
mod tests {
    use super::fake::FakeLoader;
    use super::EntryLoader;
    use std::path::Path;

    #[test]
    fn fake_loader_records_calls_and_returns_registered_fixtures() {
        let loader = FakeLoader::new();
        loader.register("/plugins/a.so", "decoder", 50);
        let (raw, _handle) = loader.load(Path::new("/plugins/a.so"), true).unwrap();
        assert_eq!(raw.primary.capability.as_str(), "decoder");
        assert!(loader.load(Path::new("/plugins/missing.so"), true).is_err());
        assert_eq!(loader.call_count(), 2);
    }
}
