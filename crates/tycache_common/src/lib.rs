//! Shared foundational types used across the tycache workspace.
//!
//! This crate provides content hashing for checksums and snapshot
//! fingerprints, and the software version tag stamped into every store.

#![warn(missing_docs)]

pub mod hash;
pub mod version;

pub use hash::ContentHash;
pub use version::FULL_VERSION;
