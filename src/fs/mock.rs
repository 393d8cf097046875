// src/fs/mock.rs

use super::FileSystem;
use std::collections::HashMap;
use std::io::{self, Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Remaining number of opens that fail with `WouldBlock`, per path.
    busy: HashMap<PathBuf, usize>,
    /// Paths whose opens fail with `PermissionDenied`.
    denied: Vec<PathBuf>,
    opens: HashMap<PathBuf, usize>,
}

/// In-memory filesystem for tests.
///
/// Besides plain files and directories it can simulate a file that is still
/// being written (`set_busy`) and a file that cannot be read at all
/// (`deny`).
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.lock()
            .entries
            .insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));
        fs
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add or overwrite a file, creating parent directories implicitly.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        state
            .entries
            .insert(path.clone(), MockEntry::File(content.into()));

        if let Some(parent) = non_empty_parent(&path) {
            ensure_dir_entry(&mut state.entries, &parent);
            link_child(&mut state.entries, &parent, &path);
        }
    }

    /// Add an empty directory (and its parents).
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        ensure_dir_entry(&mut state.entries, path.as_ref());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.lock();
        state.entries.remove(path);
        if let Some(parent) = non_empty_parent(path) {
            if let (Some(MockEntry::Dir(children)), Some(name)) = (
                state.entries.get_mut(&parent),
                path.file_name().and_then(|n| n.to_str()),
            ) {
                children.retain(|c| c != name);
            }
        }
    }

    /// Make the next `times` opens of `path` fail with a transient error.
    pub fn set_busy(&self, path: impl AsRef<Path>, times: usize) {
        self.lock().busy.insert(path.as_ref().to_path_buf(), times);
    }

    /// Make every open of `path` fail with `PermissionDenied`.
    pub fn deny(&self, path: impl AsRef<Path>) {
        self.lock().denied.push(path.as_ref().to_path_buf());
    }

    /// Number of `open_read` calls made for `path`, successful or not.
    pub fn open_count(&self, path: impl AsRef<Path>) -> usize {
        self.lock().opens.get(path.as_ref()).copied().unwrap_or(0)
    }

    /// Current contents of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }
}

fn non_empty_parent(path: &Path) -> Option<PathBuf> {
    path.parent().map(|parent| {
        if parent.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            parent.to_path_buf()
        }
    })
}

fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if entries.contains_key(path) {
        return;
    }
    entries.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = non_empty_parent(path) {
        if parent != path {
            ensure_dir_entry(entries, &parent);
            link_child(entries, &parent, path);
        }
    }
}

fn link_child(entries: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
    if let (Some(MockEntry::Dir(children)), Some(name)) = (
        entries.get_mut(parent),
        child.file_name().and_then(|n| n.to_str()),
    ) {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(ErrorKind::NotFound, format!("not found: {:?}", path))
}

impl FileSystem for MockFileSystem {
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let mut state = self.lock();
        *state.opens.entry(path.to_path_buf()).or_insert(0) += 1;

        if state.denied.iter().any(|p| p == path) {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", path),
            ));
        }

        if let Some(remaining) = state.busy.get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(io::Error::new(
                    ErrorKind::WouldBlock,
                    format!("file is locked by another writer: {:?}", path),
                ));
            }
        }

        match state.entries.get(path) {
            Some(MockEntry::File(content)) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir(_)) => Err(io::Error::new(
                ErrorKind::Other,
                format!("is a directory: {:?}", path),
            )),
            None => Err(not_found(path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        // Tests use absolute, already-normal paths.
        if self.exists(path) {
            Ok(path.to_path_buf())
        } else {
            Err(not_found(path))
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        match self.lock().entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            Some(MockEntry::File(_)) => Err(io::Error::new(
                ErrorKind::Other,
                format!("not a directory: {:?}", path),
            )),
            None => Err(not_found(path)),
        }
    }
}
