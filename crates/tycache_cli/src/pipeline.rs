//! Shared pipeline helpers for CLI commands.
//!
//! Contains source discovery, cache option resolution, the snapshot
//! fingerprint of a source tree, and the toy parse step whose output is
//! cached between runs.

use std::error::Error;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tycache_cache::{encode_artifact, CacheError, CacheableArtifact, Fingerprint, StateSnapshot};
use tycache_common::{ContentHash, FULL_VERSION};
use tycache_config::{load_config, load_config_from_str, CacheOptions};

use crate::GlobalArgs;

/// Resolves cache options from the config file and CLI overrides.
///
/// Uses `--config` when given, otherwise `tycache.toml` in `project_dir`.
/// A relative `cache.dir` from a file is taken relative to that file's
/// directory; `--cache-dir` is taken as given.
pub fn resolve_cache_options(
    global: &GlobalArgs,
    project_dir: &Path,
) -> Result<CacheOptions, Box<dyn Error>> {
    let (config, base) = match global.config {
        Some(ref path) => {
            let content = std::fs::read_to_string(path)?;
            let base = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (load_config_from_str(&content)?, base)
        }
        None => (load_config(project_dir)?, project_dir.to_path_buf()),
    };

    let mut options = config.cache;
    if let Some(dir) = options.dir.take() {
        options.dir = Some(if dir.is_relative() && !dir.as_os_str().is_empty() {
            base.join(dir)
        } else {
            dir
        });
    }
    if let Some(ref dir) = global.cache_dir {
        options.dir = Some(dir.clone());
    }
    if let Some(max) = global.max_cache_size_bytes {
        options.max_size_bytes = max;
    }
    Ok(options)
}

/// Recursively discovers files with one of `extensions` under `dir`.
///
/// Hidden files and directories (names starting with `.`) are skipped, which
/// also keeps the default `.tycache` directory out of the source set.
pub fn discover_source_files(
    dir: &Path,
    extensions: &[String],
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut files = Vec::new();
    walk_dir(dir, extensions, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, extensions: &[String], files: &mut Vec<PathBuf>) -> Result<(), Box<dyn Error>> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            walk_dir(&path, extensions, files)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want == ext))
        {
            files.push(path);
        }
    }
    Ok(())
}

/// A source file loaded into memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the source root, with `/` separators.
    pub relative: String,
    /// File contents.
    pub content: String,
    /// Content hash of `content`.
    pub hash: ContentHash,
}

/// The set of source files one run type-checks.
#[derive(Debug)]
pub struct SourceSet {
    files: Vec<SourceFile>,
}

impl SourceSet {
    /// Reads every path, in parallel, relative to `root`.
    pub fn load(root: &Path, paths: &[PathBuf]) -> std::io::Result<Self> {
        let files = paths
            .par_iter()
            .map(|path| -> std::io::Result<SourceFile> {
                let content = std::fs::read_to_string(path)?;
                let relative = path
                    .strip_prefix(root)
                    .unwrap_or(path)
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                Ok(SourceFile {
                    relative,
                    hash: ContentHash::from_bytes(content.as_bytes()),
                    content,
                })
            })
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self { files })
    }

    /// Builds a set from already-loaded files.
    pub fn from_files(files: Vec<SourceFile>) -> Self {
        Self { files }
    }

    /// The files, in discovery order.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }
}

impl StateSnapshot for SourceSet {
    /// Fingerprints the file table: which files exist, not what they contain.
    /// Edits to a file only invalidate that file's cache entry; adding or
    /// removing a file starts a new cache generation.
    fn fingerprint(&self) -> Fingerprint {
        let mut names: Vec<ContentHash> = self
            .files
            .iter()
            .map(|f| ContentHash::from_bytes(f.relative.as_bytes()))
            .collect();
        names.sort();
        Fingerprint::for_snapshot(FULL_VERSION, ContentHash::combine(&names))
    }
}

/// Kind of a definition found by the parse step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefinitionKind {
    /// `class Name`
    Class,
    /// `module Name`
    Module,
    /// `def name`
    Method,
}

/// One definition found in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    /// What was defined.
    pub kind: DefinitionKind,
    /// Defined name.
    pub name: String,
    /// 1-based line number.
    pub line: u32,
}

/// Parse output for one file; the artifact that gets cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Path relative to the source root.
    pub path: String,
    /// Hash of the contents that were parsed.
    pub content_hash: ContentHash,
    /// Number of lines.
    pub line_count: u32,
    /// Definitions in source order.
    pub definitions: Vec<Definition>,
}

impl ParsedFile {
    /// Cache key for the parse of `path` with contents hashing to `hash`.
    pub fn key_for(path: &str, hash: &ContentHash) -> String {
        format!("parsed/{path}/{hash}")
    }
}

impl CacheableArtifact for ParsedFile {
    fn cache_key(&self) -> String {
        Self::key_for(&self.path, &self.content_hash)
    }

    fn to_cache_bytes(&self) -> Result<Vec<u8>, CacheError> {
        encode_artifact(&self.cache_key(), self).map(|entry| entry.bytes)
    }
}

/// Parses a file, collecting `class`, `module` and `def` definitions.
pub fn parse_file(file: &SourceFile) -> ParsedFile {
    let mut definitions = Vec::new();
    let mut line_count = 0u32;
    for (idx, line) in file.content.lines().enumerate() {
        line_count += 1;
        let mut words = line.split_whitespace();
        let kind = match words.next() {
            Some("class") => DefinitionKind::Class,
            Some("module") => DefinitionKind::Module,
            Some("def") => DefinitionKind::Method,
            _ => continue,
        };
        let Some(name) = words.next() else { continue };
        let name: String = name
            .chars()
            .take_while(|c| !matches!(c, '(' | '<' | ';'))
            .collect();
        if name.is_empty() {
            continue;
        }
        definitions.push(Definition {
            kind,
            name,
            line: idx as u32 + 1,
        });
    }
    ParsedFile {
        path: file.relative.clone(),
        content_hash: file.hash,
        line_count,
        definitions,
    }
}
