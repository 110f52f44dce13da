//! Software version tag.

/// The full version string of this build.
///
/// Used as the default compatibility tag for on-disk stores, so that a cache
/// written by one release is never trusted by another.
pub const FULL_VERSION: &str = concat!("tycache-", env!("CARGO_PKG_VERSION"));
