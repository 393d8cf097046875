use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use stylewatch::compiler::{CompilerError, StyleCompiler};

/// A scripted compiler that:
/// - reports the compiled file plus the imports scripted for it as reads
/// - fails with a compile or a system error for files marked so
/// - records every call, relative to its root, in order.
///
/// File names are relative to `root`.
#[derive(Debug)]
pub struct FakeCompiler {
    root: PathBuf,
    imports: Mutex<HashMap<String, Vec<String>>>,
    compile_errors: Mutex<HashSet<String>>,
    system_errors: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCompiler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            imports: Mutex::new(HashMap::new()),
            compile_errors: Mutex::new(HashSet::new()),
            system_errors: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replace the files `file` reads while compiling. Paths may leave the
    /// root (`../shared/_x.scss`).
    pub fn set_imports(&self, file: &str, imports: &[&str]) {
        self.imports.lock().unwrap().insert(
            file.to_string(),
            imports.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn fail_compile(&self, file: &str) {
        self.compile_errors.lock().unwrap().insert(file.to_string());
    }

    pub fn fail_system(&self, file: &str) {
        self.system_errors.lock().unwrap().insert(file.to_string());
    }

    /// Stop failing `file`.
    pub fn heal(&self, file: &str) {
        self.compile_errors.lock().unwrap().remove(file);
        self.system_errors.lock().unwrap().remove(file);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, file: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == file).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

impl StyleCompiler for FakeCompiler {
    fn compile_file(
        &self,
        path: &Path,
        on_read: &mut dyn FnMut(&Path),
    ) -> Result<String, CompilerError> {
        let rel = self.relative(path);
        self.calls.lock().unwrap().push(rel.clone());

        if self.system_errors.lock().unwrap().contains(&rel) {
            return Err(CompilerError::System(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{rel}: import not found on disk"),
            )));
        }

        on_read(path);
        let imports = self.imports.lock().unwrap().get(&rel).cloned();
        for import in imports.unwrap_or_default() {
            on_read(&self.root.join(import));
        }

        if self.compile_errors.lock().unwrap().contains(&rel) {
            return Err(CompilerError::Compile {
                message: format!("{rel}: expected \"}}\""),
            });
        }

        Ok(format!("/* {rel} */\n"))
    }
}
