//! Artifact entries and their byte encoding.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheError;

/// One cached unit of pipeline output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Content- or path-addressed cache key.
    pub key: String,
    /// Serialized artifact.
    pub bytes: Vec<u8>,
}

impl ArtifactEntry {
    /// Creates an entry from a key and already-serialized bytes.
    pub fn new(key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            bytes: bytes.into(),
        }
    }
}

/// Pipeline output that knows how to store itself in the cache.
///
/// Serialization runs on worker threads, hence `Sync` on callers' slices.
pub trait CacheableArtifact {
    /// Key under which this artifact is stored.
    fn cache_key(&self) -> String;

    /// Serializes the artifact.
    fn to_cache_bytes(&self) -> Result<Vec<u8>, CacheError>;

    /// Serializes the artifact into an entry ready for writing.
    fn to_entry(&self) -> Result<ArtifactEntry, CacheError> {
        Ok(ArtifactEntry::new(self.cache_key(), self.to_cache_bytes()?))
    }
}

impl CacheableArtifact for ArtifactEntry {
    fn cache_key(&self) -> String {
        self.key.clone()
    }

    fn to_cache_bytes(&self) -> Result<Vec<u8>, CacheError> {
        Ok(self.bytes.clone())
    }
}

/// Encodes a serde value as an entry under `key`.
pub fn encode_artifact<T: Serialize>(key: &str, value: &T) -> Result<ArtifactEntry, CacheError> {
    let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(|e| {
        CacheError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(ArtifactEntry::new(key, bytes))
}

/// Decodes bytes previously produced by [`encode_artifact`].
pub fn decode_artifact<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| CacheError::Decode {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Tree {
        path: String,
        defs: Vec<String>,
    }

    #[test]
    fn encoded_artifact_decodes() {
        let tree = Tree {
            path: "lib/a.rb".to_string(),
            defs: vec!["A".to_string(), "A#run".to_string()],
        };
        let entry = encode_artifact("lib/a.rb", &tree).unwrap();
        assert_eq!(entry.key, "lib/a.rb");
        let back: Tree = decode_artifact(&entry.bytes).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn decode_garbage_fails() {
        let err = decode_artifact::<Tree>(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }

    #[test]
    fn entry_is_its_own_artifact() {
        let entry = ArtifactEntry::new("fileA", b"123".to_vec());
        assert_eq!(entry.to_entry().unwrap(), entry);
    }
}
