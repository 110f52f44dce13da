//! Cache usage statistics.

/// Usage of the cache's size budget after a commit. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageStats {
    /// Committed data bytes.
    pub committed_size_bytes: u64,
    /// `round(100 * committed_size_bytes / max_size_bytes)`, halves rounding up.
    pub used_percent: u64,
}

impl UsageStats {
    /// Computes usage against the configured budget.
    ///
    /// A zero budget reports 0%.
    pub fn compute(committed_size_bytes: u64, max_size_bytes: u64) -> Self {
        let used_percent = if max_size_bytes == 0 {
            0
        } else {
            let size = u128::from(committed_size_bytes);
            let max = u128::from(max_size_bytes);
            ((size * 200 + max) / (max * 2)) as u64
        };
        Self {
            committed_size_bytes,
            used_percent,
        }
    }
}
