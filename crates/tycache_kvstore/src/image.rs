//! On-disk image format.
//!
//! An image is a 4-byte little-endian header length, a bincode-encoded
//! [`ImageHeader`], and a bincode-encoded [`StoreImage`] payload. The header
//! carries magic bytes, the format version, the compatibility tag the image
//! was written under, and a checksum of the payload.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tycache_common::ContentHash;

use crate::error::KvStoreError;

/// Magic bytes identifying a store image.
const IMAGE_MAGIC: [u8; 4] = *b"TYKV";

/// Current image format version. Increment on breaking changes to the
/// header or payload layout.
const IMAGE_FORMAT_VERSION: u32 = 1;

/// Header prepended to every store image for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHeader {
    /// Magic bytes: must be `b"TYKV"`.
    pub magic: [u8; 4],

    /// Image format version.
    pub format_version: u32,

    /// Compatibility tag of the build that wrote the image.
    pub compatibility_tag: String,

    /// Content hash of the payload bytes.
    pub checksum: ContentHash,
}

/// The full contents of a store: a metadata table and a data table.
///
/// Metadata holds protocol bookkeeping such as the snapshot fingerprint and
/// does not count against the size budget. Data holds cached artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreImage {
    /// Protocol bookkeeping keyed by well-known names.
    pub meta: BTreeMap<String, Vec<u8>>,

    /// Artifact payloads keyed by cache key.
    pub data: BTreeMap<String, Vec<u8>>,
}

impl StoreImage {
    /// Sum of the byte lengths of all data values.
    pub fn data_size(&self) -> u64 {
        self.data.values().map(|v| v.len() as u64).sum()
    }
}

fn serialization_error(e: impl std::fmt::Display) -> KvStoreError {
    KvStoreError::Serialization {
        reason: e.to_string(),
    }
}

/// Encodes an image, stamping it with `compatibility_tag`.
pub fn encode_image(image: &StoreImage, compatibility_tag: &str) -> Result<Vec<u8>, KvStoreError> {
    let payload = bincode::serde::encode_to_vec(image, bincode::config::standard())
        .map_err(serialization_error)?;

    let header = ImageHeader {
        magic: IMAGE_MAGIC,
        format_version: IMAGE_FORMAT_VERSION,
        compatibility_tag: compatibility_tag.to_string(),
        checksum: ContentHash::from_bytes(&payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(serialization_error)?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

/// Decodes and validates an image read from `path`.
///
/// Rejects images with a truncated or foreign header, a different format
/// version, a different compatibility tag, or a payload that fails its
/// checksum.
pub fn decode_image(
    raw: &[u8],
    path: &Path,
    compatibility_tag: &str,
) -> Result<StoreImage, KvStoreError> {
    let invalid = |reason: &str| KvStoreError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if raw.len() < 4 {
        return Err(invalid("missing header length"));
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    if raw.len() < 4 + header_len {
        return Err(invalid("truncated header"));
    }

    let (header, _): (ImageHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?;

    if header.magic != IMAGE_MAGIC {
        return Err(invalid("bad magic bytes"));
    }
    if header.format_version != IMAGE_FORMAT_VERSION {
        return Err(KvStoreError::FormatVersion {
            path: path.to_path_buf(),
            expected: IMAGE_FORMAT_VERSION,
            actual: header.format_version,
        });
    }
    if header.compatibility_tag != compatibility_tag {
        return Err(KvStoreError::IncompatibleTag {
            path: path.to_path_buf(),
            expected: compatibility_tag.to_string(),
            actual: header.compatibility_tag,
        });
    }

    let payload = &raw[4 + header_len..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(KvStoreError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }

    let (image, _): (StoreImage, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(serialization_error)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> StoreImage {
        let mut image = StoreImage::default();
        image
            .meta
            .insert("global_state_fingerprint".to_string(), b"v1".to_vec());
        image.data.insert("fileA".to_string(), b"123".to_vec());
        image
    }

    fn raw_with_header(header: &ImageHeader, payload: &[u8]) -> Vec<u8> {
        let header_bytes =
            bincode::serde::encode_to_vec(header, bincode::config::standard()).unwrap();
        let mut output = Vec::new();
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(payload);
        output
    }

    #[test]
    fn encode_then_decode_preserves_tables() {
        let image = sample_image();
        let raw = encode_image(&image, "tag-1").unwrap();
        let back = decode_image(&raw, Path::new("s.kv"), "tag-1").unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn data_size_ignores_meta_and_keys() {
        let image = sample_image();
        assert_eq!(image.data_size(), 3);
    }

    #[test]
    fn truncated_length_is_rejected() {
        let err = decode_image(b"AB", Path::new("s.kv"), "tag-1").unwrap_err();
        assert!(matches!(err, KvStoreError::InvalidHeader { .. }));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let raw = [200u8, 0, 0, 0, 1, 2, 3];
        let err = decode_image(&raw, Path::new("s.kv"), "tag-1").unwrap_err();
        assert!(matches!(err, KvStoreError::InvalidHeader { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let header = ImageHeader {
            magic: *b"BAAD",
            format_version: IMAGE_FORMAT_VERSION,
            compatibility_tag: "tag-1".to_string(),
            checksum: ContentHash::from_bytes(b""),
        };
        let raw = raw_with_header(&header, b"");
        let err = decode_image(&raw, Path::new("s.kv"), "tag-1").unwrap_err();
        assert!(matches!(err, KvStoreError::InvalidHeader { .. }));
    }

    #[test]
    fn wrong_format_version_is_rejected() {
        let header = ImageHeader {
            magic: IMAGE_MAGIC,
            format_version: 999,
            compatibility_tag: "tag-1".to_string(),
            checksum: ContentHash::from_bytes(b""),
        };
        let raw = raw_with_header(&header, b"");
        let err = decode_image(&raw, Path::new("s.kv"), "tag-1").unwrap_err();
        assert!(matches!(
            err,
            KvStoreError::FormatVersion { actual: 999, .. }
        ));
    }

    #[test]
    fn foreign_tag_is_rejected() {
        let raw = encode_image(&sample_image(), "tag-1").unwrap();
        let err = decode_image(&raw, Path::new("s.kv"), "tag-2").unwrap_err();
        assert!(matches!(err, KvStoreError::IncompatibleTag { .. }));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let mut raw = encode_image(&sample_image(), "tag-1").unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let err = decode_image(&raw, Path::new("s.kv"), "tag-1").unwrap_err();
        assert!(matches!(err, KvStoreError::ChecksumMismatch { .. }));
    }
}
