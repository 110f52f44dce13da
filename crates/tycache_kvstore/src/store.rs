//! The store handle.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::KvStoreError;
use crate::image::{self, StoreImage};
use crate::registry::Registration;

/// File extension of store images.
const IMAGE_EXT: &str = "kv";

/// Parameters for opening a store. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the store. Created on open if missing.
    pub location: PathBuf,

    /// Opaque build identifier. Images written under another tag are ignored.
    pub compatibility_tag: String,

    /// Name of the sub-store within `location`.
    pub flavor: String,

    /// Upper bound on committed data bytes.
    pub max_size_bytes: u64,
}

impl StoreConfig {
    /// Creates a store configuration.
    pub fn new(
        location: impl Into<PathBuf>,
        compatibility_tag: impl Into<String>,
        flavor: impl Into<String>,
        max_size_bytes: u64,
    ) -> Self {
        Self {
            location: location.into(),
            compatibility_tag: compatibility_tag.into(),
            flavor: flavor.into(),
            max_size_bytes,
        }
    }
}

/// An open connection to an on-disk store.
///
/// Reads see the committed image plus this handle's own pending writes.
/// Pending writes reach disk only through [`commit`](Self::commit); dropping
/// the handle discards them and leaves the file untouched. At most one handle
/// per location exists in a process at a time.
#[derive(Debug)]
pub struct KeyValueStore {
    config: StoreConfig,
    image_path: PathBuf,
    image: StoreImage,
    dirty: bool,
    _registration: Registration,
}

impl KeyValueStore {
    /// Opens or creates the store described by `config`.
    ///
    /// A missing, corrupt or incompatible image yields an empty store; only
    /// an invalid flavor, directory creation and location contention are
    /// reported as errors.
    pub fn open(config: StoreConfig) -> Result<Self, KvStoreError> {
        if !is_valid_flavor(&config.flavor) {
            return Err(KvStoreError::InvalidFlavor {
                flavor: config.flavor,
            });
        }
        std::fs::create_dir_all(&config.location).map_err(|e| KvStoreError::Io {
            path: config.location.clone(),
            source: e,
        })?;
        let location = std::fs::canonicalize(&config.location).map_err(|e| KvStoreError::Io {
            path: config.location.clone(),
            source: e,
        })?;
        let registration = Registration::claim(&location)?;

        let image_path = location.join(format!("{}.{IMAGE_EXT}", config.flavor));
        let image = load_image(&image_path, &config.compatibility_tag);
        debug!(
            path = %image_path.display(),
            entries = image.data.len(),
            "opened store"
        );

        Ok(Self {
            config: StoreConfig { location, ..config },
            image_path,
            image,
            dirty: false,
            _registration: registration,
        })
    }

    /// Returns the configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the path of the image file.
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Reads a data value.
    pub fn read(&self, key: &str) -> Option<&[u8]> {
        self.image.data.get(key).map(Vec::as_slice)
    }

    /// Writes a data value, replacing any previous value for `key`.
    pub fn write(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.image.data.insert(key.into(), value);
        self.dirty = true;
    }

    /// Reads a metadata value.
    pub fn read_meta(&self, key: &str) -> Option<&[u8]> {
        self.image.meta.get(key).map(Vec::as_slice)
    }

    /// Writes a metadata value.
    pub fn write_meta(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.image.meta.insert(key.into(), value);
        self.dirty = true;
    }

    /// Removes every entry from both tables.
    pub fn clear(&mut self) {
        self.image = StoreImage::default();
        self.dirty = true;
    }

    /// Removes every data entry, keeping the metadata table.
    pub fn clear_data(&mut self) {
        if !self.image.data.is_empty() {
            self.image.data.clear();
            self.dirty = true;
        }
    }

    /// Number of data entries.
    pub fn len(&self) -> usize {
        self.image.data.len()
    }

    /// Returns `true` if there are no data entries.
    pub fn is_empty(&self) -> bool {
        self.image.data.is_empty()
    }

    /// Returns `true` if there are writes not yet committed.
    pub fn has_pending_writes(&self) -> bool {
        self.dirty
    }

    /// Total data bytes, pending writes included.
    pub fn cache_size(&self) -> u64 {
        self.image.data_size()
    }

    /// Drops pending writes and reloads the committed image.
    pub fn rollback(&mut self) {
        if self.dirty {
            self.image = load_image(&self.image_path, &self.config.compatibility_tag);
            self.dirty = false;
        }
    }

    /// Makes all pending writes durable.
    ///
    /// The image is written to a temporary file next to the target and
    /// renamed into place, so a failure at any point leaves the previously
    /// committed image intact. On failure the handle is consumed.
    pub fn commit(mut self) -> Result<Self, KvStoreError> {
        let size = self.cache_size();
        if size > self.config.max_size_bytes {
            return Err(KvStoreError::MapFull {
                size,
                max: self.config.max_size_bytes,
            });
        }

        let bytes = image::encode_image(&self.image, &self.config.compatibility_tag)?;
        let io_err = |path: &Path, source: std::io::Error| KvStoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.config.location)
            .map_err(|e| io_err(&self.config.location, e))?;
        tmp.write_all(&bytes).map_err(|e| io_err(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| io_err(tmp.path(), e))?;
        tmp.persist(&self.image_path)
            .map_err(|e| io_err(&self.image_path, e.error))?;

        self.dirty = false;
        debug!(
            path = %self.image_path.display(),
            entries = self.image.data.len(),
            size,
            "committed store"
        );
        Ok(self)
    }
}

/// Returns `true` if `flavor` can name an image file inside the location.
///
/// The flavor becomes `<location>/<flavor>.kv`, so it must not be empty,
/// contain a path separator, or contain `..`.
pub fn is_valid_flavor(flavor: &str) -> bool {
    !flavor.is_empty() && !flavor.contains(&['/', '\\'][..]) && !flavor.contains("..")
}

/// Loads the image at `path`, falling back to an empty image on any problem.
fn load_image(path: &Path, compatibility_tag: &str) -> StoreImage {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoreImage::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read store, starting empty");
            return StoreImage::default();
        }
    };
    match image::decode_image(&raw, path, compatibility_tag) {
        Ok(image) => image,
        Err(e) => {
            debug!(error = %e, "ignoring unusable store image");
            StoreImage::default()
        }
    }
}
