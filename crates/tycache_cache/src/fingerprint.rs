//! Snapshot fingerprints.

use std::fmt;

/// Metadata key under which a store records the fingerprint of the state
/// its contents describe.
pub const GLOBAL_STATE_FINGERPRINT_KEY: &str = "global_state_fingerprint";

/// Identifies which generation of in-memory state a cache describes.
///
/// Compared by exact byte equality. Use [`for_snapshot`](Self::for_snapshot)
/// to fold the compatibility tag into the fingerprint so that two builds never
/// agree by accident.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    /// Wraps raw fingerprint bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Builds a fingerprint from a compatibility tag and a snapshot identifier.
    pub fn for_snapshot(compatibility_tag: &str, snapshot: impl fmt::Display) -> Self {
        Self(format!("{compatibility_tag}/{snapshot}").into_bytes())
    }

    /// Returns the fingerprint bytes as stored on disk.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// In-memory state whose contents a cache generation describes.
pub trait StateSnapshot {
    /// Fingerprint of the state as it currently is.
    fn fingerprint(&self) -> Fingerprint;
}

impl StateSnapshot for Fingerprint {
    fn fingerprint(&self) -> Fingerprint {
        self.clone()
    }
}
