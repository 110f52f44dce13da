//! Staleness validation.

use crate::fingerprint::Fingerprint;

/// Whether a store's contents may be trusted for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// The store describes exactly the current state.
    Usable,
    /// The store describes some other state, or none at all. It may still
    /// serve as a write target.
    Stale,
}

impl Staleness {
    /// Compares the fingerprint recorded in a store with the current one.
    ///
    /// A store with no recorded fingerprint is stale.
    pub fn check(stored: Option<&[u8]>, current: &Fingerprint) -> Self {
        match stored {
            Some(stored) if stored == current.as_bytes() => Staleness::Usable,
            _ => Staleness::Stale,
        }
    }

    /// Returns `true` for [`Staleness::Usable`].
    pub fn is_usable(self) -> bool {
        self == Staleness::Usable
    }
}
