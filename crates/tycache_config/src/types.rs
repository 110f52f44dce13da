//! Configuration types deserialized from `tycache.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default size budget of the artifact cache: 4 GiB.
pub const DEFAULT_MAX_CACHE_SIZE_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Default sub-store name inside the cache directory.
pub const DEFAULT_CACHE_FLAVOR: &str = "fastpath";

/// The top-level configuration parsed from `tycache.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectConfig {
    /// Artifact cache settings.
    #[serde(default)]
    pub cache: CacheOptions,
}

/// Settings for the on-disk artifact cache.
///
/// An absent or empty `dir` disables caching entirely.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheOptions {
    /// Directory holding the cache.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Maximum number of bytes the cache may hold.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// Name of the sub-store used inside `dir`.
    #[serde(default = "default_flavor")]
    pub flavor: String,
}

fn default_max_size_bytes() -> u64 {
    DEFAULT_MAX_CACHE_SIZE_BYTES
}

fn default_flavor() -> String {
    DEFAULT_CACHE_FLAVOR.to_string()
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            dir: None,
            max_size_bytes: DEFAULT_MAX_CACHE_SIZE_BYTES,
            flavor: default_flavor(),
        }
    }
}

impl CacheOptions {
    /// Returns the cache directory if caching is enabled.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// Returns `true` if a non-empty cache directory is configured.
    pub fn is_enabled(&self) -> bool {
        self.cache_dir().is_some()
    }
}
