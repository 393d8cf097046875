// src/registry/mod.rs

//! In-memory registry of tracked source files for one watched root.
//!
//! Each entry remembers the fingerprint of the bytes it was last compiled
//! from and the set of other files that compile was seen to read. The
//! registry is rebuilt from empty every time a session starts.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::checksum::Fingerprint;

pub mod path;

pub use path::RelPath;

/// A source file known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    rel: RelPath,
    fingerprint: Option<Fingerprint>,
    imports: BTreeSet<RelPath>,
}

impl TrackedFile {
    fn new(rel: RelPath) -> Self {
        Self {
            rel,
            fingerprint: None,
            imports: BTreeSet::new(),
        }
    }

    pub fn rel(&self) -> &RelPath {
        &self.rel
    }

    /// Fingerprint of the last content seen, `None` until first checked.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }

    /// Files the last successful compile read.
    pub fn imports(&self) -> &BTreeSet<RelPath> {
        &self.imports
    }

    pub fn absolute_path(&self, root: &Path) -> PathBuf {
        self.rel.to_path(root)
    }
}

#[derive(Debug)]
pub struct FileRegistry {
    root: PathBuf,
    files: HashMap<RelPath, TrackedFile>,
}

impl FileRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, rel: &RelPath) -> bool {
        self.files.contains_key(rel)
    }

    pub fn get(&self, rel: &RelPath) -> Option<&TrackedFile> {
        self.files.get(rel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedFile> {
        self.files.values()
    }

    /// Relativize an absolute path against this registry's root.
    pub fn rel_path_of(&self, path: &Path) -> Option<RelPath> {
        RelPath::from_absolute(&self.root, path)
    }

    pub fn absolute_path(&self, rel: &RelPath) -> PathBuf {
        rel.to_path(&self.root)
    }

    /// Return the entry for `rel`, creating it with an unset fingerprint if
    /// it is not tracked yet.
    pub fn get_or_create(&mut self, rel: &RelPath) -> &TrackedFile {
        self.files.entry(rel.clone()).or_insert_with(|| {
            debug!(file = %rel, "tracking new file");
            TrackedFile::new(rel.clone())
        })
    }

    /// Replace the import set of `rel`.
    pub fn record_import_set(&mut self, rel: &RelPath, imports: BTreeSet<RelPath>) {
        self.entry_mut(rel).imports = imports;
    }

    /// Record the outcome of one compile attempt.
    ///
    /// The fingerprint always advances. The import set is replaced only when
    /// `imports` is `Some`; a failed compile passes `None` so the last
    /// known-good set keeps resolving dependents.
    pub fn record_compile(
        &mut self,
        rel: &RelPath,
        fingerprint: Fingerprint,
        imports: Option<BTreeSet<RelPath>>,
    ) {
        let entry = self.entry_mut(rel);
        entry.fingerprint = Some(fingerprint);
        if let Some(imports) = imports {
            entry.imports = imports;
        }
    }

    /// Every tracked file whose import set names `rel`, sorted.
    ///
    /// Never includes `rel` itself, even if it was recorded importing
    /// itself.
    pub fn dependents_of(&self, rel: &RelPath) -> Vec<RelPath> {
        let mut dependents: Vec<RelPath> = self
            .files
            .values()
            .filter(|f| &f.rel != rel && f.imports.contains(rel))
            .map(|f| f.rel.clone())
            .collect();
        dependents.sort();
        dependents
    }

    fn entry_mut(&mut self, rel: &RelPath) -> &mut TrackedFile {
        self.files
            .entry(rel.clone())
            .or_insert_with(|| TrackedFile::new(rel.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(s: &str) -> RelPath {
        RelPath::parse(s).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<RelPath> {
        items.iter().map(|s| rel(s)).collect()
    }

    #[test]
    fn get_or_create_starts_unset_and_is_idempotent() {
        let mut registry = FileRegistry::new("/proj");
        let file = registry.get_or_create(&rel("a.scss"));
        assert_eq!(file.fingerprint(), None);
        assert!(file.imports().is_empty());

        registry.record_compile(&rel("a.scss"), Fingerprint::Crc32(7), Some(set(&["b.scss"])));
        let again = registry.get_or_create(&rel("a.scss"));
        assert_eq!(again.fingerprint(), Some(Fingerprint::Crc32(7)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_compile_keeps_previous_imports() {
        let mut registry = FileRegistry::new("/proj");
        registry.record_compile(&rel("a.scss"), Fingerprint::Crc32(1), Some(set(&["_d.scss"])));
        registry.record_compile(&rel("a.scss"), Fingerprint::Crc32(2), None);

        let file = registry.get(&rel("a.scss")).unwrap();
        assert_eq!(file.fingerprint(), Some(Fingerprint::Crc32(2)));
        assert_eq!(file.imports(), &set(&["_d.scss"]));
    }

    #[test]
    fn dependents_are_sorted_and_exclude_self() {
        let mut registry = FileRegistry::new("/proj");
        registry.record_import_set(&rel("z.scss"), set(&["_base.scss"]));
        registry.record_import_set(&rel("a.scss"), set(&["_base.scss", "_other.scss"]));
        registry.record_import_set(&rel("_base.scss"), set(&["_base.scss"]));
        registry.record_import_set(&rel("m.scss"), set(&["_other.scss"]));

        assert_eq!(
            registry.dependents_of(&rel("_base.scss")),
            vec![rel("a.scss"), rel("z.scss")]
        );
    }

    #[test]
    fn absolute_path_is_derived_from_root() {
        let registry = FileRegistry::new("/proj/styles");
        assert_eq!(
            registry.absolute_path(&rel("sub/a.scss")),
            PathBuf::from("/proj/styles/sub/a.scss")
        );
    }
}
