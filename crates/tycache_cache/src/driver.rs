//! Population and commit of a cache generation.

use rayon::prelude::*;
use tracing::debug;
use tycache_common::FULL_VERSION;
use tycache_config::CacheOptions;
use tycache_kvstore::KeyValueStore;

use crate::artifact::{ArtifactEntry, CacheableArtifact};
use crate::fingerprint::StateSnapshot;
use crate::owned::OwnedKeyValueStore;
use crate::stats::UsageStats;
use crate::telemetry::{MetricsSink, CACHE_COMMITTED, CACHE_USED_BYTES, CACHE_USED_PERCENT};

/// Result of a population pass.
#[derive(Debug)]
pub struct CacheOutcome {
    /// The committed handle, reusable for later passes. `None` when caching
    /// is disabled or the commit failed.
    pub store: Option<KeyValueStore>,
    /// Usage after a successful commit.
    pub stats: Option<UsageStats>,
}

impl CacheOutcome {
    fn disabled() -> Self {
        Self {
            store: None,
            stats: None,
        }
    }

    /// Returns `true` if the pass ended in a successful commit.
    pub fn committed(&self) -> bool {
        self.stats.is_some()
    }
}

/// Writes `state`'s fingerprint and `artifacts` into `store` and commits.
///
/// `artifacts` is the complete set for `state`: the committed data table holds
/// exactly these entries, and whatever a previous pass left behind is dropped.
/// Artifacts are serialized on the rayon pool; writes into the store happen
/// on the calling thread in slice order, so for duplicate keys the last
/// artifact wins. An artifact that fails to serialize is left out. A failed
/// commit is absorbed and nothing is reported. On success, `cache.committed`
/// is incremented, the usage gauges are set against `options.max_size_bytes`,
/// and a debug event records the usage.
pub fn maybe_cache_state_and_files<S, A>(
    store: Option<KeyValueStore>,
    options: &CacheOptions,
    state: &S,
    artifacts: &[A],
    metrics: &dyn MetricsSink,
) -> CacheOutcome
where
    S: StateSnapshot + ?Sized,
    A: CacheableArtifact + Sync,
{
    let Some(store) = store else {
        return CacheOutcome::disabled();
    };

    let entries = serialize_artifacts(artifacts);
    let mut owned = OwnedKeyValueStore::new(store);
    owned.replace(&state.fingerprint(), entries);

    let Some(store) = owned.best_effort_commit() else {
        return CacheOutcome::disabled();
    };

    let stats = UsageStats::compute(store.cache_size(), options.max_size_bytes);
    metrics.counter_inc(CACHE_COMMITTED);
    metrics.gauge_set(CACHE_USED_BYTES, stats.committed_size_bytes);
    metrics.gauge_set(CACHE_USED_PERCENT, stats.used_percent);
    debug!(
        version = FULL_VERSION,
        cache_used_bytes = stats.committed_size_bytes,
        cache_used_percent = stats.used_percent,
        "cache committed"
    );

    CacheOutcome {
        store: Some(store),
        stats: Some(stats),
    }
}

fn serialize_artifacts<A: CacheableArtifact + Sync>(artifacts: &[A]) -> Vec<ArtifactEntry> {
    artifacts
        .par_iter()
        .filter_map(|artifact| match artifact.to_entry() {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "skipping artifact that failed to serialize");
                None
            }
        })
        .collect()
}
