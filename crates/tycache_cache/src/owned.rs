//! Single-owner wrapper around a store handle.
//!
//! An [`OwnedKeyValueStore`] moves through `Created → Validated → Populated`
//! and ends either committed ([`best_effort_commit`](OwnedKeyValueStore::best_effort_commit))
//! or discarded (a stale validation, [`abort`](OwnedKeyValueStore::abort), or
//! simply being dropped). Both endings consume the wrapper, so a finished
//! wrapper cannot be used again. Dropping a wrapper never touches disk: its
//! pending writes are lost and the last committed image stays intact.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use tycache_common::FULL_VERSION;
use tycache_config::CacheOptions;
use tycache_kvstore::{KeyValueStore, KvStoreError, StoreConfig};

use crate::artifact::{decode_artifact, ArtifactEntry};
use crate::fingerprint::{Fingerprint, GLOBAL_STATE_FINGERPRINT_KEY};
use crate::staleness::Staleness;

/// Lifecycle position of a live wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipState {
    /// Freshly wrapped; contents not yet checked.
    Created,
    /// Checked against the current fingerprint and found usable.
    Validated,
    /// A fingerprint and entries have been written but not committed.
    Populated,
}

/// Exclusive owner of a [`KeyValueStore`] for the duration of one protocol pass.
#[derive(Debug)]
pub struct OwnedKeyValueStore {
    store: KeyValueStore,
    state: OwnershipState,
    validated: bool,
}

impl OwnedKeyValueStore {
    /// Takes ownership of an open store.
    pub fn new(store: KeyValueStore) -> Self {
        Self {
            store,
            state: OwnershipState::Created,
            validated: false,
        }
    }

    /// Opens the store described by `config` and takes ownership of it.
    ///
    /// Returns `None` when `config.location` is empty (caching disabled) or
    /// the store cannot be opened.
    pub fn acquire(config: StoreConfig) -> Option<Self> {
        open_store(config).map(Self::new)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OwnershipState {
        self.state
    }

    /// Returns `true` once the contents have been validated for reads.
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Configuration of the underlying store.
    pub fn config(&self) -> &StoreConfig {
        self.store.config()
    }

    /// The fingerprint currently recorded in the store, pending writes included.
    pub fn stored_fingerprint(&self) -> Option<&[u8]> {
        self.store.read_meta(GLOBAL_STATE_FINGERPRINT_KEY)
    }

    /// Keeps ownership only if the store describes `current`.
    ///
    /// A stale store is dropped without committing, which leaves the on-disk
    /// image untouched for other readers.
    pub fn validate(mut self, current: &Fingerprint) -> Option<Self> {
        match Staleness::check(self.stored_fingerprint(), current) {
            Staleness::Usable => {
                self.validated = true;
                if self.state == OwnershipState::Created {
                    self.state = OwnershipState::Validated;
                }
                Some(self)
            }
            Staleness::Stale => {
                debug!(
                    path = %self.store.image_path().display(),
                    current = %current,
                    "cache is stale, discarding"
                );
                None
            }
        }
    }

    /// Reads a cached value.
    ///
    /// Only a validated store is trusted; otherwise every read misses.
    pub fn read(&self, key: &str) -> Option<&[u8]> {
        if !self.validated {
            return None;
        }
        self.store.read(key)
    }

    /// Reads and decodes a cached artifact. Decode failures are misses.
    pub fn read_artifact<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.read(key)?;
        match decode_artifact(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "ignoring undecodable cache entry");
                None
            }
        }
    }

    /// Writes `fingerprint` and every entry.
    ///
    /// The fingerprint is recorded first. When it differs from the one already
    /// stored, the store is starting a new generation and the previous
    /// generation's entries are cleared so they cannot be read back under the
    /// new fingerprint. Writing a key twice overwrites it.
    pub fn populate(
        &mut self,
        fingerprint: &Fingerprint,
        entries: impl IntoIterator<Item = ArtifactEntry>,
    ) {
        if !Staleness::check(self.stored_fingerprint(), fingerprint).is_usable() {
            self.store.clear();
            self.validated = false;
        }
        self.store
            .write_meta(GLOBAL_STATE_FINGERPRINT_KEY, fingerprint.as_bytes().to_vec());
        for entry in entries {
            self.store.write(entry.key, entry.bytes);
        }
        self.state = OwnershipState::Populated;
    }

    /// Writes `fingerprint` and makes `entries` the complete data table.
    ///
    /// Unlike [`populate`](Self::populate), entries from earlier passes are
    /// dropped even when the fingerprint is unchanged, so keys superseded by
    /// this pass's artifacts do not accumulate against the size budget.
    pub fn replace(
        &mut self,
        fingerprint: &Fingerprint,
        entries: impl IntoIterator<Item = ArtifactEntry>,
    ) {
        self.store.clear_data();
        self.populate(fingerprint, entries);
    }

    /// Total data bytes, pending writes included.
    pub fn cache_size(&self) -> u64 {
        self.store.cache_size()
    }

    /// Gives up ownership, dropping pending writes, and returns the handle.
    pub fn abort(mut self) -> KeyValueStore {
        self.store.rollback();
        self.store
    }

    /// Commits pending writes, returning the reusable handle.
    pub fn commit(self) -> Result<KeyValueStore, KvStoreError> {
        self.store.commit()
    }

    /// Commits pending writes; any failure becomes an abort.
    pub fn best_effort_commit(self) -> Option<KeyValueStore> {
        match self.commit() {
            Ok(store) => Some(store),
            Err(e) => {
                debug!(error = %e, "cache commit failed, discarding pending writes");
                None
            }
        }
    }
}

/// Opens a store, mapping "disabled" and open failures to `None`.
fn open_store(config: StoreConfig) -> Option<KeyValueStore> {
    if config.location.as_os_str().is_empty() {
        return None;
    }
    match KeyValueStore::open(config) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "failed to open cache, continuing without it");
            None
        }
    }
}

/// Opens the cache configured by `options`, tagged with this build's version.
///
/// Returns `None` when caching is disabled or the store cannot be opened.
pub fn maybe_create_key_value_store(options: &CacheOptions) -> Option<KeyValueStore> {
    let dir = options.cache_dir()?;
    open_store(StoreConfig::new(
        dir,
        FULL_VERSION,
        options.flavor.clone(),
        options.max_size_bytes,
    ))
}

/// Takes ownership of `store` if it describes `current`.
pub fn own_if_unchanged(
    store: Option<KeyValueStore>,
    current: &Fingerprint,
) -> Option<OwnedKeyValueStore> {
    OwnedKeyValueStore::new(store?).validate(current)
}

/// Writes `fingerprint` and `entries` into `owned`. No-op when disabled.
pub fn populate(
    owned: Option<&mut OwnedKeyValueStore>,
    fingerprint: &Fingerprint,
    entries: impl IntoIterator<Item = ArtifactEntry>,
) {
    if let Some(owned) = owned {
        owned.populate(fingerprint, entries);
    }
}

/// Commits `owned` on a best-effort basis. No-op when disabled.
pub fn best_effort_commit(owned: Option<OwnedKeyValueStore>) -> Option<KeyValueStore> {
    owned?.best_effort_commit()
}

/// Data bytes held by `owned`; 0 when disabled.
pub fn cache_size_bytes(owned: Option<&OwnedKeyValueStore>) -> u64 {
    owned.map_or(0, OwnedKeyValueStore::cache_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config(dir: &Path, max: u64) -> StoreConfig {
        StoreConfig::new(dir, "tag", "fastpath", max)
    }

    fn entry(key: &str, value: &str) -> ArtifactEntry {
        ArtifactEntry::new(key, value.as_bytes().to_vec())
    }

    fn committed_store(dir: &Path, fingerprint: &str, entries: Vec<ArtifactEntry>) {
        let mut owned = OwnedKeyValueStore::acquire(config(dir, 1000)).unwrap();
        owned.populate(&Fingerprint::from(fingerprint), entries);
        assert!(owned.best_effort_commit().is_some());
    }

    #[test]
    fn acquire_with_empty_location_is_disabled() {
        assert!(OwnedKeyValueStore::acquire(StoreConfig::new("", "tag", "fastpath", 1000)).is_none());
    }

    #[test]
    fn acquire_starts_created() {
        let dir = tempfile::tempdir().unwrap();
        let owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000)).unwrap();
        assert_eq!(owned.state(), OwnershipState::Created);
        assert!(!owned.is_validated());
    }

    #[test]
    fn acquire_of_contended_location_is_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let _first = OwnedKeyValueStore::acquire(config(dir.path(), 1000)).unwrap();
        assert!(OwnedKeyValueStore::acquire(config(dir.path(), 1000)).is_none());
    }

    #[test]
    fn disabled_operations_are_noops() {
        let fp = Fingerprint::from("v1");
        assert!(own_if_unchanged(None, &fp).is_none());
        populate(None, &fp, vec![ArtifactEntry::new("fileA", b"123".to_vec())]);
        assert!(best_effort_commit(None).is_none());
        assert_eq!(cache_size_bytes(None), 0);
    }

    #[test]
    fn disabled_options_create_no_store() {
        assert!(maybe_create_key_value_store(&CacheOptions::default()).is_none());
    }

    #[test]
    fn options_open_store_with_build_tag() {
        let dir = tempfile::tempdir().unwrap();
        let options = CacheOptions {
            dir: Some(dir.path().to_path_buf()),
            max_size_bytes: 1000,
            flavor: "typed".to_string(),
        };
        let store = maybe_create_key_value_store(&options).unwrap();
        assert_eq!(store.config().compatibility_tag, FULL_VERSION);
        assert_eq!(store.config().max_size_bytes, 1000);
        assert!(store.image_path().ends_with("typed.kv"));
    }

    #[test]
    fn matching_fingerprint_validates() {
        let dir = tempfile::tempdir().unwrap();
        committed_store(dir.path(), "v1", vec![entry("fileA", "123")]);

        let owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000))
            .unwrap()
            .validate(&Fingerprint::from("v1"))
            .unwrap();
        assert_eq!(owned.state(), OwnershipState::Validated);
        assert_eq!(owned.read("fileA"), Some(&b"123"[..]));
    }

    #[test]
    fn fresh_store_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000)).unwrap();
        assert!(owned.validate(&Fingerprint::from("v1")).is_none());
    }

    #[test]
    fn stale_validation_releases_location() {
        let dir = tempfile::tempdir().unwrap();
        committed_store(dir.path(), "v1", vec![entry("fileA", "123")]);

        let owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000)).unwrap();
        assert!(owned.validate(&Fingerprint::from("v2")).is_none());
        assert!(OwnedKeyValueStore::acquire(config(dir.path(), 1000)).is_some());
    }

    #[test]
    fn unvalidated_reads_miss() {
        let dir = tempfile::tempdir().unwrap();
        committed_store(dir.path(), "v1", vec![entry("fileA", "123")]);

        let owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000)).unwrap();
        assert!(owned.read("fileA").is_none());
    }

    #[test]
    fn populate_new_generation_clears_old_entries() {
        let dir = tempfile::tempdir().unwrap();
        committed_store(dir.path(), "v1", vec![entry("fileA", "123"), entry("fileB", "456")]);

        let mut owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000)).unwrap();
        owned.populate(
            &Fingerprint::from("v2"),
            vec![ArtifactEntry::new("fileA", b"789".to_vec())],
        );
        assert_eq!(owned.state(), OwnershipState::Populated);
        assert_eq!(owned.cache_size(), 3);
        let store = owned.best_effort_commit().unwrap();
        assert!(store.read("fileB").is_none());
        assert_eq!(store.read("fileA"), Some(&b"789"[..]));
    }

    #[test]
    fn populate_same_generation_appends() {
        let dir = tempfile::tempdir().unwrap();
        committed_store(dir.path(), "v1", vec![entry("fileA", "123")]);

        let mut owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000))
            .unwrap()
            .validate(&Fingerprint::from("v1"))
            .unwrap();
        owned.populate(
            &Fingerprint::from("v1"),
            vec![ArtifactEntry::new("fileB", b"456".to_vec())],
        );
        assert!(owned.is_validated());
        assert_eq!(owned.read("fileA"), Some(&b"123"[..]));
        assert_eq!(owned.read("fileB"), Some(&b"456"[..]));
        assert_eq!(owned.cache_size(), 6);
    }

    #[test]
    fn replace_same_generation_drops_superseded_entries() {
        let dir = tempfile::tempdir().unwrap();
        committed_store(dir.path(), "v1", vec![entry("a/old", "123"), entry("b", "45")]);

        let mut owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000))
            .unwrap()
            .validate(&Fingerprint::from("v1"))
            .unwrap();
        owned.replace(
            &Fingerprint::from("v1"),
            vec![entry("a/new", "678"), entry("b", "45")],
        );
        assert!(owned.is_validated());
        assert!(owned.read("a/old").is_none());
        assert_eq!(owned.read("a/new"), Some(&b"678"[..]));
        assert_eq!(owned.cache_size(), 5);
        assert_eq!(owned.stored_fingerprint(), Some(&b"v1"[..]));
    }

    #[test]
    fn duplicate_keys_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000)).unwrap();
        owned.populate(
            &Fingerprint::from("v1"),
            vec![
                ArtifactEntry::new("fileA", b"1".to_vec()),
                ArtifactEntry::new("fileA", b"22".to_vec()),
            ],
        );
        let store = owned.best_effort_commit().unwrap();
        assert_eq!(store.read("fileA"), Some(&b"22"[..]));
        assert_eq!(store.cache_size(), 2);
    }

    #[test]
    fn abort_drops_pending_writes_and_returns_handle() {
        let dir = tempfile::tempdir().unwrap();
        committed_store(dir.path(), "v1", vec![entry("fileA", "123")]);

        let mut owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000)).unwrap();
        owned.populate(
            &Fingerprint::from("v2"),
            vec![ArtifactEntry::new("fileB", b"456".to_vec())],
        );
        let store = owned.abort();
        assert_eq!(store.read("fileA"), Some(&b"123"[..]));
        assert!(store.read("fileB").is_none());
        assert!(!store.has_pending_writes());
    }

    #[test]
    fn failed_commit_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let mut owned = OwnedKeyValueStore::acquire(config(dir.path(), 2)).unwrap();
        owned.populate(
            &Fingerprint::from("v1"),
            vec![ArtifactEntry::new("fileA", b"123".to_vec())],
        );
        assert!(owned.best_effort_commit().is_none());
        assert!(!dir.path().join("fastpath.kv").exists());
    }

    #[test]
    fn read_artifact_decodes_or_misses() {
        let dir = tempfile::tempdir().unwrap();
        let good = crate::artifact::encode_artifact("good", &vec![1u32, 2, 3]).unwrap();
        committed_store(
            dir.path(),
            "v1",
            vec![good, ArtifactEntry::new("bad", vec![0xff, 0xff])],
        );

        let owned = OwnedKeyValueStore::acquire(config(dir.path(), 1000))
            .unwrap()
            .validate(&Fingerprint::from("v1"))
            .unwrap();
        assert_eq!(owned.read_artifact::<Vec<u32>>("good"), Some(vec![1, 2, 3]));
        assert_eq!(owned.read_artifact::<Vec<u32>>("bad"), None);
        assert_eq!(owned.read_artifact::<Vec<u32>>("missing"), None);
    }
}
