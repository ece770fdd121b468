//! Recursive filesystem discovery of candidate plugin files.
//!
//! Grounded on `ClapScanner::scan_directory`/`is_clap_bundle`: walk each
//! search root depth-first, skip anything past the configured recursion
//! cap, and collect files matching the platform's plugin filename
//! convention. Unreadable directories are logged and skipped rather than
//! aborting the whole walk, mirroring that scanner's per-entry `continue`
//! on error.

use std::path::{Path, PathBuf};

use crate::config::HostConfig;

/// Platform shared-library extension modbank candidate files must have.
#[cfg(target_os = "windows")]
const PLUGIN_EXTENSION: &str = "dll";
#[cfg(target_os = "macos")]
const PLUGIN_EXTENSION: &str = "dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const PLUGIN_EXTENSION: &str = "so";

const PLUGIN_PREFIX: &str = "lib";
const PLUGIN_INFIX: &str = "_plugin";

/// True for `lib<name>_plugin<ext>`, the general-case candidate naming
/// convention. A bare `<name><ext>` or a prefix/infix mismatch is not
/// considered a plugin candidate, even if the extension matches.
pub fn is_plugin_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let ext_suffix = format!(".{PLUGIN_EXTENSION}");
    let Some(stem) = name.strip_suffix(ext_suffix.as_str()) else {
        return false;
    };
    stem.starts_with(PLUGIN_PREFIX) && stem.ends_with(PLUGIN_INFIX)
}

/// The host's own plugin directory followed by `MODBANK_PLUGIN_PATH`'s
/// entries, in search order.
pub fn search_roots(config: &dyn HostConfig) -> Vec<PathBuf> {
    let mut roots = vec![config.plugin_dir().to_path_buf()];
    roots.extend(config.extra_search_paths());
    roots
}

/// Walks `root` up to `max_depth` levels deep, collecting candidate plugin
/// files. A depth of 0 scans only `root` itself, matching the original
/// implementation's refusal to recurse past its configured cap.
pub fn discover(root: &Path, max_depth: u32) -> Vec<PathBuf> {
    let mut found = Vec::new();
    walk(root, max_depth, &mut found);
    found
}

fn walk(dir: &Path, depth_remaining: u32, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::debug!(dir = %dir.display(), %error, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::debug!(dir = %dir.display(), %error, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "skipping entry of unknown type");
                continue;
            }
        };

        if file_type.is_dir() {
            if depth_remaining == 0 {
                tracing::debug!(path = %path.display(), "max scan depth reached, not recursing");
                continue;
            }
            walk(&path, depth_remaining - 1, out);
        } else if file_type.is_file() && is_plugin_file(&path) {
            out.push(path);
        }
    }
}

/// Path of `path` relative to `root`, used as the plugin cache key. Falls
/// back to the full path if `path` is not actually under `root`.
pub fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn is_plugin_file_requires_lib_prefix_and_plugin_infix() {
        assert!(is_plugin_file(Path::new(&format!(
            "libfoo_plugin.{PLUGIN_EXTENSION}"
        ))));
        assert!(!is_plugin_file(Path::new(&format!(
            "foo_plugin.{PLUGIN_EXTENSION}"
        ))));
        assert!(!is_plugin_file(Path::new(&format!(
            "libfoo.{PLUGIN_EXTENSION}"
        ))));
        assert!(!is_plugin_file(Path::new("libfoo_plugin.txt")));
    }

    #[test]
    fn discover_finds_nested_plugins_within_depth() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let plugin = nested.join(format!("libthing_plugin.{PLUGIN_EXTENSION}"));
        fs::write(&plugin, b"").unwrap();
        fs::write(dir.path().join("noise.txt"), b"").unwrap();

        let found = discover(dir.path(), 5);
        assert_eq!(found, vec![plugin]);
    }

    #[test]
    fn discover_respects_depth_cap() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            nested.join(format!("libthing_plugin.{PLUGIN_EXTENSION}")),
            b"",
        )
        .unwrap();

        let found = discover(dir.path(), 1);
        assert!(found.is_empty());
    }

    #[test]
    fn relative_to_strips_root_prefix() {
        let root = Path::new("/plugins");
        let path = Path::new("/plugins/codec/libfoo_plugin.so");
        assert_eq!(relative_to(root, path), "codec/libfoo_plugin.so");
    }
}
