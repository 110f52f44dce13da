//! `tycache status`: report whether the cache on disk is usable for the
//! source tree as it is now.

use std::error::Error;
use std::fmt;

use serde::Serialize;
use tycache_cache::{
    maybe_create_key_value_store, own_if_unchanged, StateSnapshot, UsageStats,
};

use crate::pipeline::{discover_source_files, resolve_cache_options, ParsedFile, SourceSet};
use crate::{GlobalArgs, ReportFormat, StatusArgs};

/// Whether the cache can serve the current tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// No cache directory configured, or the store could not be opened.
    Disabled,
    /// A cache directory is configured but does not exist yet.
    Missing,
    /// A store exists but was written for a different tree or build.
    Stale,
    /// The store matches the current tree.
    Usable,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheState::Disabled => write!(f, "disabled"),
            CacheState::Missing => write!(f, "missing"),
            CacheState::Stale => write!(f, "stale"),
            CacheState::Usable => write!(f, "usable"),
        }
    }
}

/// Status report for one source tree.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Cache state.
    pub state: CacheState,
    /// Configured cache directory, if any.
    pub cache_dir: Option<String>,
    /// Fingerprint of the current tree.
    pub fingerprint: String,
    /// Files in the source set.
    pub files: usize,
    /// Files with a usable cached parse.
    pub cached_files: usize,
    /// Data bytes held by the store on disk, whether or not it is usable.
    pub used_bytes: u64,
    /// Percentage of `max_size_bytes` used.
    pub used_percent: u64,
    /// Configured budget.
    pub max_size_bytes: u64,
}

/// Runs the status command and returns the process exit code.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let report = status(args, global)?;
    if global.quiet {
        return Ok(0);
    }
    match args.format {
        ReportFormat::Text => print_text(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

/// Builds the status report without printing it.
pub fn status(args: &StatusArgs, global: &GlobalArgs) -> Result<StatusReport, Box<dyn Error>> {
    let root = &args.source.src;
    let options = resolve_cache_options(global, root)?;
    let paths = discover_source_files(root, &args.source.extensions)?;
    let sources = SourceSet::load(root, &paths)?;
    let fingerprint = sources.fingerprint();

    let mut state = CacheState::Disabled;
    let mut used_bytes = 0;
    let mut cached_files = 0;
    match options.cache_dir() {
        None => {}
        // Opening would create the directory.
        Some(dir) if !dir.is_dir() => state = CacheState::Missing,
        Some(_) => {
            if let Some(store) = maybe_create_key_value_store(&options) {
                used_bytes = store.cache_size();
                state = match own_if_unchanged(Some(store), &fingerprint) {
                    Some(owned) => {
                        cached_files = sources
                            .files()
                            .iter()
                            .filter(|f| {
                                owned
                                    .read(&ParsedFile::key_for(&f.relative, &f.hash))
                                    .is_some()
                            })
                            .count();
                        CacheState::Usable
                    }
                    None => CacheState::Stale,
                };
            }
        }
    }

    Ok(StatusReport {
        state,
        cache_dir: options.cache_dir().map(|d| d.display().to_string()),
        fingerprint: fingerprint.to_string(),
        files: sources.files().len(),
        cached_files,
        used_bytes,
        used_percent: UsageStats::compute(used_bytes, options.max_size_bytes).used_percent,
        max_size_bytes: options.max_size_bytes,
    })
}

fn print_text(report: &StatusReport) {
    println!("cache: {}", report.state);
    if let Some(ref dir) = report.cache_dir {
        println!("  dir:         {dir}");
    }
    println!("  fingerprint: {}", report.fingerprint);
    println!("  files:       {} ({} cached)", report.files, report.cached_files);
    println!(
        "  used:        {} of {} bytes ({}%)",
        report.used_bytes, report.max_size_bytes, report.used_percent
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SourceArgs, WarmArgs};
    use std::path::Path;

    fn source(src: &Path) -> SourceArgs {
        SourceArgs {
            src: src.to_path_buf(),
            extensions: vec!["rb".to_string()],
        }
    }

    fn args(src: &Path) -> StatusArgs {
        StatusArgs {
            source: source(src),
            format: ReportFormat::Json,
        }
    }

    fn global(cache: Option<&Path>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            config: None,
            cache_dir: cache.map(Path::to_path_buf),
            max_cache_size_bytes: None,
        }
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rb"), "class A\nend\n").unwrap();
        dir
    }

    #[test]
    fn no_cache_dir_is_disabled() {
        let src = tree();
        let report = status(&args(src.path()), &global(None)).unwrap();
        assert_eq!(report.state, CacheState::Disabled);
        assert_eq!(report.files, 1);
        assert_eq!(report.used_bytes, 0);
    }

    #[test]
    fn status_does_not_create_the_cache_directory() {
        let src = tree();
        let parent = tempfile::tempdir().unwrap();
        let cache = parent.path().join("not-yet");

        let report = status(&args(src.path()), &global(Some(&cache))).unwrap();
        assert_eq!(report.state, CacheState::Missing);
        assert_eq!(report.used_bytes, 0);
        assert!(!cache.exists());
    }

    #[test]
    fn warmed_tree_is_usable() {
        let src = tree();
        let cache = tempfile::tempdir().unwrap();
        let g = global(Some(cache.path()));
        crate::warm::warm(&WarmArgs { source: source(src.path()) }, &g).unwrap();

        let report = status(&args(src.path()), &g).unwrap();
        assert_eq!(report.state, CacheState::Usable);
        assert_eq!(report.cached_files, 1);
        assert!(report.used_bytes > 0);
    }

    #[test]
    fn added_file_makes_cache_stale() {
        let src = tree();
        let cache = tempfile::tempdir().unwrap();
        let g = global(Some(cache.path()));
        crate::warm::warm(&WarmArgs { source: source(src.path()) }, &g).unwrap();

        std::fs::write(src.path().join("b.rb"), "class B\nend\n").unwrap();
        let report = status(&args(src.path()), &g).unwrap();
        assert_eq!(report.state, CacheState::Stale);
        assert_eq!(report.cached_files, 0);
        assert!(report.used_bytes > 0);
    }

    #[test]
    fn report_serializes_lowercase_state() {
        let src = tree();
        let report = status(&args(src.path()), &global(None)).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "disabled");
        assert_eq!(json["files"], 1);
    }
}
