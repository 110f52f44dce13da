//! tycache CLI, driving the on-disk artifact cache over a source tree.
//!
//! Provides `tycache warm` to parse a tree and persist the results for the
//! next run, and `tycache status` to report whether the cache on disk is
//! usable for the tree as it is now.

#![warn(missing_docs)]

mod pipeline;
mod status;
mod warm;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// tycache: a persistent cache for type-checker artifacts.
#[derive(Parser, Debug)]
#[command(name = "tycache", version, about = "Artifact cache for incremental type checking")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `tycache.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache directory; overrides `cache.dir` from the config file.
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Cache size budget in bytes; overrides `cache.max_size_bytes`.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_cache_size_bytes: Option<u64>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse the source tree and commit the results to the cache.
    Warm(WarmArgs),
    /// Report the state of the cache for the source tree.
    Status(StatusArgs),
}

/// Source tree selection shared by every command.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Root of the source tree.
    #[arg(default_value = ".")]
    pub src: PathBuf,

    /// File extensions to include.
    #[arg(long = "ext", value_delimiter = ',', default_values_t = ["rb".to_string(), "rbi".to_string()])]
    pub extensions: Vec<String>,
}

/// Arguments for the `tycache warm` subcommand.
#[derive(Args, Debug)]
pub struct WarmArgs {
    /// Source tree to parse.
    #[command(flatten)]
    pub source: SourceArgs,
}

/// Arguments for the `tycache status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Source tree to check the cache against.
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output format for the report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
#[derive(Debug)]
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<PathBuf>,
    /// Cache directory override.
    pub cache_dir: Option<PathBuf>,
    /// Cache budget override.
    pub max_cache_size_bytes: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
        cache_dir: cli.cache_dir,
        max_cache_size_bytes: cli.max_cache_size_bytes,
    };

    let result = match cli.command {
        Command::Warm(ref args) => warm::run(args, &global),
        Command::Status(ref args) => status::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
