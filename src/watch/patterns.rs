// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;
use crate::registry::RelPath;
use crate::registry::path::CASE_INSENSITIVE;

/// Which files under a root count as style sources.
///
/// A file matches when its extension equals `extension` (compared
/// case-insensitively) and its root-relative path matches none of the
/// `exclude` globs.
#[derive(Clone)]
pub struct SourceFilter {
    extension: String,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFilter")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl SourceFilter {
    /// Build a filter for `extension` (with or without the leading dot).
    pub fn new(extension: &str, exclude: &[String]) -> Result<Self> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };
        Ok(Self {
            extension,
            exclude_set,
        })
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns true if the root-relative path is a source file.
    pub fn matches(&self, rel: &RelPath) -> bool {
        let has_ext = Path::new(rel.file_name())
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        if !has_ext {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns. Matching ignores case where
/// path identity does.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .case_insensitive(CASE_INSENSITIVE)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect every source file under `root`, descending into subdirectories
/// only when `recursive` is set. Returned paths are absolute and sorted.
pub fn collect_source_files(
    fs: &dyn FileSystem,
    root: &Path,
    filter: &SourceFilter,
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = fs
            .read_dir(&dir)
            .with_context(|| format!("reading dir {:?}", dir))?;
        for path in entries {
            if fs.is_dir(&path) {
                if recursive {
                    stack.push(path);
                }
            } else if fs.is_file(&path) {
                if let Some(rel) = RelPath::from_absolute(root, &path) {
                    if filter.matches(&rel) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
