//! Ownership and lifecycle protocol for the on-disk artifact cache.
//!
//! A [`KeyValueStore`] handle is wrapped in an [`OwnedKeyValueStore`], checked
//! against the fingerprint of the in-memory state that would use it, and,
//! when the caller has new work to persist, populated and committed on a
//! best-effort basis. Every failure inside this crate degrades to "no cache":
//! nothing here ever aborts the compilation pipeline.
//!
//! Throughout, `None` stands for "caching disabled" and every protocol
//! function accepts it as an inert value.

#![warn(missing_docs)]

pub mod artifact;
pub mod driver;
pub mod error;
pub mod fingerprint;
pub mod owned;
pub mod staleness;
pub mod stats;
pub mod telemetry;

pub use artifact::{decode_artifact, encode_artifact, ArtifactEntry, CacheableArtifact};
pub use driver::{maybe_cache_state_and_files, CacheOutcome};
pub use error::CacheError;
pub use fingerprint::{Fingerprint, StateSnapshot, GLOBAL_STATE_FINGERPRINT_KEY};
pub use owned::{
    best_effort_commit, cache_size_bytes, maybe_create_key_value_store, own_if_unchanged,
    populate, OwnedKeyValueStore, OwnershipState,
};
pub use staleness::Staleness;
pub use stats::UsageStats;
pub use telemetry::{InMemoryMetrics, MetricsSink, NoopMetrics};
pub use tycache_kvstore::{KeyValueStore, StoreConfig};
