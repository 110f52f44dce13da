//! Error types for storage engine operations.

use std::path::PathBuf;

/// Errors that can occur while opening, loading or committing a store.
///
/// Loading is fail-safe: image errors make [`open`](crate::KeyValueStore::open)
/// start from an empty store rather than fail. Open and commit surface the
/// remaining variants to the caller.
#[derive(Debug, thiserror::Error)]
pub enum KvStoreError {
    /// An I/O error occurred while reading or writing store files.
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The store image has an invalid or truncated header.
    #[error("invalid store header in {path}: {reason}")]
    InvalidHeader {
        /// The image file path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The image was written with a different on-disk format version.
    #[error("format version mismatch in {path}: expected {expected}, got {actual}")]
    FormatVersion {
        /// The image file path.
        path: PathBuf,
        /// The format version this build writes.
        expected: u32,
        /// The format version found in the file.
        actual: u32,
    },

    /// The image was written under a different compatibility tag.
    #[error("incompatible store in {path}: expected tag {expected}, got {actual}")]
    IncompatibleTag {
        /// The image file path.
        path: PathBuf,
        /// The tag requested by the opener.
        expected: String,
        /// The tag recorded in the image.
        actual: String,
    },

    /// The stored checksum does not match the checksum of the payload.
    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The image file path.
        path: PathBuf,
        /// The checksum recorded in the header.
        expected: String,
        /// The checksum computed from the payload.
        actual: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// Committing would exceed the configured size budget.
    #[error("store is full: {size} bytes exceeds budget of {max} bytes")]
    MapFull {
        /// Size of the data that was about to be committed.
        size: u64,
        /// The configured maximum size.
        max: u64,
    },

    /// Another handle for the same location is already open in this process.
    #[error("store at {path} is already open in this process")]
    AlreadyOpen {
        /// The contended location.
        path: PathBuf,
    },

    /// The flavor is not a plain file name.
    #[error("invalid store flavor {flavor:?}: must be a non-empty name without path separators or '..'")]
    InvalidFlavor {
        /// The rejected flavor.
        flavor: String,
    },
}
