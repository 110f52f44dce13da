//! `tycache warm`: parse a source tree, reusing cached parses where the
//! cache is still valid, and commit the results.

use std::collections::HashMap;
use std::error::Error;

use rayon::prelude::*;
use tracing::debug;
use tycache_cache::{
    maybe_cache_state_and_files, maybe_create_key_value_store, own_if_unchanged, InMemoryMetrics,
    StateSnapshot, UsageStats,
};

use crate::pipeline::{discover_source_files, parse_file, resolve_cache_options, ParsedFile, SourceSet};
use crate::{GlobalArgs, WarmArgs};

/// Counts from one warm run.
#[derive(Debug, Clone, Copy)]
pub struct WarmSummary {
    /// Files in the source set.
    pub files: usize,
    /// Files whose parse came from the cache.
    pub cached: usize,
    /// Usage after the commit; `None` when nothing was written.
    pub stats: Option<UsageStats>,
}

/// Runs the warm command and returns the process exit code.
pub fn run(args: &WarmArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let summary = warm(args, global)?;
    if !global.quiet {
        println!(
            "{} files: {} cached, {} parsed",
            summary.files,
            summary.cached,
            summary.files - summary.cached
        );
        match summary.stats {
            Some(stats) => println!(
                "cache: {} bytes ({}% of budget)",
                stats.committed_size_bytes, stats.used_percent
            ),
            None => println!("cache: not written"),
        }
    }
    Ok(0)
}

/// Performs a warm pass without printing anything.
pub fn warm(args: &WarmArgs, global: &GlobalArgs) -> Result<WarmSummary, Box<dyn Error>> {
    let root = &args.source.src;
    let options = resolve_cache_options(global, root)?;
    let paths = discover_source_files(root, &args.source.extensions)?;
    let sources = SourceSet::load(root, &paths)?;
    let fingerprint = sources.fingerprint();

    // Read pass: only a store that validates against this tree is consulted.
    let mut hits: HashMap<String, ParsedFile> = HashMap::new();
    let store = match own_if_unchanged(maybe_create_key_value_store(&options), &fingerprint) {
        Some(owned) => {
            for file in sources.files() {
                let key = ParsedFile::key_for(&file.relative, &file.hash);
                if let Some(parsed) = owned.read_artifact::<ParsedFile>(&key) {
                    hits.insert(key, parsed);
                }
            }
            Some(owned.abort())
        }
        None => maybe_create_key_value_store(&options),
    };

    debug!(
        files = sources.files().len(),
        hits = hits.len(),
        "cache read pass complete"
    );

    let parsed: Vec<ParsedFile> = sources
        .files()
        .par_iter()
        .map(|file| {
            let key = ParsedFile::key_for(&file.relative, &file.hash);
            hits.get(&key).cloned().unwrap_or_else(|| parse_file(file))
        })
        .collect();

    let metrics = InMemoryMetrics::new();
    let outcome = maybe_cache_state_and_files(store, &options, &sources, &parsed, &metrics);
    if global.verbose {
        for (name, value) in metrics.snapshot() {
            eprintln!("metric {name} = {value}");
        }
    }

    Ok(WarmSummary {
        files: parsed.len(),
        cached: hits.len(),
        stats: outcome.stats,
    })
}
