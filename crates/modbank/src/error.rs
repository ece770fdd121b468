use std::path::PathBuf;

use thiserror::Error;

/// Failures the bank can recover from by skipping the offending plugin or
/// cache entry. Only the static core's describe call is allowed to be
/// fatal, and that is expressed as a panic, not a variant here.
#[derive(Debug, Error)]
pub enum BankError {
    #[error("failed to load dynamic library {path}: {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("no entry symbol in {path}")]
    NoEntry { path: PathBuf },

    #[error("plugin entry point in {path} returned no descriptor")]
    DescribeFailed { path: PathBuf },

    #[error("plugins cache at {path} is corrupt: {source}")]
    CacheCorrupt {
        path: PathBuf,
        #[source]
        source: rmp_serde::decode::Error,
    },

    #[error("failed to persist plugins cache at {path}: {source}")]
    CacheWriteFailed {
        path: PathBuf,
        #[source]
        source: rmp_serde::encode::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("module is corrupt and cannot be remapped: {path}")]
    CorruptModule { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, BankError>;
