//! Per-process registry of open store locations.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::error::KvStoreError;

static OPEN_LOCATIONS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn open_locations() -> MutexGuard<'static, HashSet<PathBuf>> {
    OPEN_LOCATIONS
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive claim on a location, released on drop.
#[derive(Debug)]
pub(crate) struct Registration {
    location: PathBuf,
}

impl Registration {
    /// Claims `location`, which must already be canonical.
    pub(crate) fn claim(location: &Path) -> Result<Self, KvStoreError> {
        if !open_locations().insert(location.to_path_buf()) {
            return Err(KvStoreError::AlreadyOpen {
                path: location.to_path_buf(),
            });
        }
        Ok(Self {
            location: location.to_path_buf(),
        })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        open_locations().remove(&self.location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_rejected_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let first = Registration::claim(dir.path()).unwrap();
        assert!(matches!(
            Registration::claim(dir.path()),
            Err(KvStoreError::AlreadyOpen { .. })
        ));
        drop(first);
        assert!(Registration::claim(dir.path()).is_ok());
    }

    #[test]
    fn distinct_locations_are_independent() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let _ra = Registration::claim(a.path()).unwrap();
        assert!(Registration::claim(b.path()).is_ok());
    }
}
