// src/compiler/adapter.rs

//! Import capture around a single compile call.
//!
//! The adapter owns one capture slot. A [`CaptureSession`] borrows that
//! slot mutably for exactly one `compile_file` call and clears it when
//! dropped, whether the compile returned, failed or unwound. Because the
//! session borrows the adapter through `&mut self`, two captures can never
//! overlap; the engine mutex is what serializes callers on top of that.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::compiler::{CompilerError, StyleCompiler};
use crate::registry::RelPath;

/// Successful compile of one file.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub css: String,
    /// Files under the root that the compile read, excluding the file itself.
    pub imports: BTreeSet<RelPath>,
    pub elapsed: Duration,
}

/// Failed compile of one file.
#[derive(Debug)]
pub struct CompileFailure {
    pub error: CompilerError,
    /// What was read before the compiler gave up. Not trusted as an import
    /// set; kept for diagnostics.
    pub partial_imports: BTreeSet<RelPath>,
}

impl CompileFailure {
    /// True for invalid sources, false for I/O failures.
    pub fn is_compile_error(&self) -> bool {
        matches!(self.error, CompilerError::Compile { .. })
    }
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

pub struct CompilerAdapter {
    compiler: Arc<dyn StyleCompiler>,
    root: PathBuf,
    slot: Vec<PathBuf>,
}

impl fmt::Debug for CompilerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerAdapter")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Exclusive use of the adapter's capture slot for one compile.
struct CaptureSession<'a> {
    slot: &'a mut Vec<PathBuf>,
}

impl<'a> CaptureSession<'a> {
    fn acquire(slot: &'a mut Vec<PathBuf>) -> Self {
        slot.clear();
        Self { slot }
    }

    fn record(&mut self, path: &Path) {
        trace!(?path, "compiler read file");
        self.slot.push(path.to_path_buf());
    }

    fn take(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.slot)
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        self.slot.clear();
    }
}

impl CompilerAdapter {
    pub fn new(compiler: Arc<dyn StyleCompiler>, root: impl Into<PathBuf>) -> Self {
        Self {
            compiler,
            root: root.into(),
            slot: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compile `path` and capture the files it read.
    pub fn compile(&mut self, path: &Path) -> Result<CompileOutput, CompileFailure> {
        let started = Instant::now();
        let compiler = Arc::clone(&self.compiler);

        let mut capture = CaptureSession::acquire(&mut self.slot);
        let result = compiler.compile_file(path, &mut |read: &Path| capture.record(read));
        let touched = capture.take();
        drop(capture);

        let imports = self.relevant_imports(path, touched);
        let elapsed = started.elapsed();

        match result {
            Ok(css) => {
                debug!(?path, imports = imports.len(), ?elapsed, "compiled");
                Ok(CompileOutput {
                    css,
                    imports,
                    elapsed,
                })
            }
            Err(error) => Err(CompileFailure {
                error,
                partial_imports: imports,
            }),
        }
    }

    /// Keep reads that fall under the root, relative to it, minus the file
    /// being compiled.
    fn relevant_imports(&self, compiled: &Path, touched: Vec<PathBuf>) -> BTreeSet<RelPath> {
        let own = RelPath::from_absolute(&self.root, compiled);
        touched
            .iter()
            .filter_map(|p| {
                let rel = RelPath::from_absolute(&self.root, p);
                if rel.is_none() {
                    trace!(path = ?p, "read outside watched root; not tracked");
                }
                rel
            })
            .filter(|rel| Some(rel) != own.as_ref())
            .collect()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Reads a fixed list of files, then succeeds or fails.
    struct ScriptedCompiler {
        reads: Vec<&'static str>,
        fail: Option<&'static str>,
    }

    impl StyleCompiler for ScriptedCompiler {
        fn compile_file(
            &self,
            path: &Path,
            on_read: &mut dyn FnMut(&Path),
        ) -> Result<String, CompilerError> {
            on_read(path);
            for r in &self.reads {
                on_read(Path::new(r));
            }
            match self.fail {
                Some(message) => Err(CompilerError::Compile {
                    message: message.to_string(),
                }),
                None => Ok(format!("/* {} */", path.display())),
            }
        }
    }

    fn rel(s: &str) -> RelPath {
        RelPath::parse(s).unwrap()
    }

    #[test]
    fn captures_reads_under_root_only() {
        let compiler = ScriptedCompiler {
            reads: vec![
                "/proj/styles/_base.scss",
                "/proj/styles/lib/../_vars.scss",
                "/usr/share/sass/_reset.scss",
            ],
            fail: None,
        };
        let mut adapter = CompilerAdapter::new(Arc::new(compiler), "/proj/styles");

        let out = adapter.compile(Path::new("/proj/styles/main.scss")).unwrap();

        assert_eq!(out.css, "/* /proj/styles/main.scss */");
        assert_eq!(
            out.imports.into_iter().collect::<Vec<_>>(),
            vec![rel("_base.scss"), rel("_vars.scss")]
        );
    }

    #[test]
    fn failure_reports_message_and_releases_slot() {
        let compiler = ScriptedCompiler {
            reads: vec!["/proj/styles/_base.scss"],
            fail: Some("expected \"}\""),
        };
        let mut adapter = CompilerAdapter::new(Arc::new(compiler), "/proj/styles");

        let failure = adapter.compile(Path::new("/proj/styles/main.scss")).unwrap_err();

        assert!(failure.is_compile_error());
        assert_eq!(failure.to_string(), "expected \"}\"");
        assert!(failure.partial_imports.contains(&rel("_base.scss")));
        assert!(adapter.slot.is_empty());
    }
}
