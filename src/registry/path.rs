// src/registry/path.rs

//! Root-relative path identity for tracked files.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// Path of a tracked file relative to its watched root.
///
/// Always `/`-separated with `.` and `..` resolved. On platforms whose
/// default filesystems are case-insensitive (Windows, macOS) equality,
/// hashing and ordering ignore case, so `Base.scss` and `base.scss` name the
/// same entry; the spelling first seen is kept for I/O and display.
///
/// A `RelPath` can only be obtained through [`RelPath::from_absolute`] (which
/// refuses paths outside the root) or [`RelPath::parse`] (which refuses paths
/// that climb above the root), so no caller ever strips prefixes by hand.
#[derive(Debug, Clone)]
pub struct RelPath {
    path: String,
    key: String,
}

impl PartialEq for RelPath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RelPath {}

impl Hash for RelPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for RelPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl RelPath {
    /// Relativize `path` against `root`.
    ///
    /// Both are normalized lexically first. Returns `None` if `path` is not
    /// strictly below `root`.
    pub fn from_absolute(root: &Path, path: &Path) -> Option<Self> {
        let root_parts = components(root)?;
        let path_parts = components(path)?;

        if path_parts.len() <= root_parts.len() {
            return None;
        }
        if root_parts
            .iter()
            .zip(path_parts.iter())
            .any(|(r, p)| fold_case(r) != fold_case(p))
        {
            return None;
        }

        Some(Self::from_parts(&path_parts[root_parts.len()..]))
    }

    /// Parse an already relative path such as `"partials/_base.scss"`.
    ///
    /// Backslashes are accepted as separators. Returns `None` for empty or
    /// absolute input, or input that climbs above the root with `..`.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.replace('\\', "/");
        if normalized.starts_with('/') {
            return None;
        }
        let mut parts: Vec<String> = Vec::new();
        for part in normalized.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop()?;
                }
                other => parts.push(other.to_string()),
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self::from_parts(&parts))
    }

    fn from_parts(parts: &[String]) -> Self {
        let path = parts.join("/");
        let key = fold_case(&path);
        RelPath { path, key }
    }

    /// The path as spelled on disk.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The comparison key: `as_str` case-folded where the platform folds.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Final path component, e.g. `_base.scss`.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Absolute location of this path under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in self.path.split('/') {
            path.push(part);
        }
        path
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Lexically normalized components of an absolute path, as strings.
///
/// The prefix / root marker is kept as the first element so that paths on
/// different drives never compare equal.
fn components(path: &Path) -> Option<Vec<String>> {
    let mut parts: Vec<String> = Vec::new();
    let mut anchored = 0;
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                parts.push(prefix.as_os_str().to_string_lossy().replace('\\', "/"));
                anchored = parts.len();
            }
            Component::RootDir => {
                parts.push("/".to_string());
                anchored = parts.len();
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.len() > anchored {
                    parts.pop();
                }
            }
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
        }
    }
    if anchored == 0 {
        // Relative input; callers always pass absolute paths.
        return None;
    }
    Some(parts)
}

/// Whether path identity ignores case on this platform.
pub const CASE_INSENSITIVE: bool = cfg!(any(windows, target_os = "macos"));

#[cfg(any(windows, target_os = "macos"))]
fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

#[cfg(not(any(windows, target_os = "macos")))]
fn fold_case(s: &str) -> String {
    s.to_string()
}
