// src/compiler/sass_cli.rs

//! [`StyleCompiler`] backed by the Dart Sass command line.
//!
//! The CLI has no callback for file reads, so the read set is recovered by
//! following `@use`, `@forward` and `@import` directives with Sass's own
//! lookup rules (partial `_` prefix, `.scss`/`.sass`/`.css` extensions,
//! `_index` files), relative to the importing file first and then to each
//! load path. Only files that actually exist are reported.

use std::borrow::Cow;
use std::collections::{HashSet, VecDeque};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use regex::{Captures, Regex};
use tracing::{debug, trace};

use crate::compiler::{CompilerError, StyleCompiler};
use crate::fs::{FileSystem, RealFileSystem};

const EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

/// A single- or double-quoted string on one line.
const QUOTED: &str = r#""(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'"#;

#[derive(Debug, Clone)]
pub struct SassCliCompiler {
    program: String,
    load_paths: Vec<PathBuf>,
    fs: Arc<dyn FileSystem>,
    /// Strings and comments; strings are kept, comments dropped.
    string_or_comment: Regex,
    /// Keyword and body of one `@use` / `@forward` / `@import`.
    directive: Regex,
    /// Quoted string at the start of the remaining body.
    leading: Regex,
    /// Comma continuing an `@import` list.
    list_separator: Regex,
}

impl SassCliCompiler {
    pub fn new(program: impl Into<String>, load_paths: Vec<PathBuf>) -> Self {
        Self::with_fs(program, load_paths, Arc::new(RealFileSystem))
    }

    pub fn with_fs(
        program: impl Into<String>,
        load_paths: Vec<PathBuf>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            program: program.into(),
            load_paths,
            fs,
            string_or_comment: Regex::new(&format!(r"(?s){QUOTED}|/\*.*?\*/|//[^\n]*"))
                .expect("static regex"),
            directive: Regex::new(&format!(
                r#"@(use|forward|import)\b((?:{QUOTED}|[^;"'])*)"#
            ))
            .expect("static regex"),
            leading: Regex::new(&format!(r"^\s*({QUOTED})")).expect("static regex"),
            list_separator: Regex::new(r"^\s*,").expect("static regex"),
        }
    }

    /// Every file `path` pulls in, transitively, in discovery order.
    /// The first element is `path` itself.
    pub fn resolve_reads(&self, path: &Path) -> Result<Vec<PathBuf>, CompilerError> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([path.to_path_buf()]);

        while let Some(file) = queue.pop_front() {
            if !seen.insert(file.clone()) {
                continue;
            }
            let source = self.read_source(&file)?;
            order.push(file.clone());

            let base = file.parent().map(Path::to_path_buf).unwrap_or_default();
            for spec in self.import_specs(&source) {
                match self.resolve(&base, &spec) {
                    Some(found) => queue.push_back(found),
                    None => trace!(file = ?file, import = %spec, "import not resolved on disk"),
                }
            }
        }

        Ok(order)
    }

    fn read_source(&self, path: &Path) -> Result<String, CompilerError> {
        let mut reader = self.fs.open_read(path)?;
        let mut source = String::new();
        reader.read_to_string(&mut source)?;
        Ok(source)
    }

    /// Source with comments removed. `//` inside a string (URLs) survives.
    fn strip_comments<'s>(&self, source: &'s str) -> Cow<'s, str> {
        self.string_or_comment
            .replace_all(source, |caps: &Captures<'_>| {
                let text = &caps[0];
                if text.starts_with('"') || text.starts_with('\'') {
                    text.to_string()
                } else if text.starts_with("/*") {
                    " ".to_string()
                } else {
                    String::new()
                }
            })
    }

    /// Import targets named by the directives in `source`.
    ///
    /// `@use` and `@forward` name one module, before any `as`, `with`,
    /// `show` or `hide` clause. `@import` names a comma-separated list; a
    /// media query or `url(...)` ends it.
    fn import_specs(&self, source: &str) -> Vec<String> {
        let stripped = self.strip_comments(source);
        let mut specs = Vec::new();
        for directive in self.directive.captures_iter(&stripped) {
            let is_import = &directive[1] == "import";
            let mut rest = directive.get(2).map_or("", |m| m.as_str());

            while let Some(caps) = self.leading.captures(rest) {
                let (Some(whole), Some(quoted)) = (caps.get(0), caps.get(1)) else {
                    break;
                };
                let quoted = quoted.as_str();
                let target = &quoted[1..quoted.len() - 1];
                if !is_external(target) {
                    specs.push(target.to_string());
                }
                if !is_import {
                    break;
                }
                rest = &rest[whole.end()..];
                match self.list_separator.find(rest) {
                    Some(sep) => rest = &rest[sep.end()..],
                    None => break,
                }
            }
        }
        specs
    }

    fn resolve(&self, base: &Path, spec: &str) -> Option<PathBuf> {
        std::iter::once(base)
            .chain(self.load_paths.iter().map(PathBuf::as_path))
            .flat_map(|dir| candidates(&dir.join(spec)))
            .find(|candidate| self.fs.is_file(candidate))
    }
}

/// Built-in modules, URLs and plain CSS imports are not files we track.
fn is_external(spec: &str) -> bool {
    spec.starts_with("sass:")
        || spec.starts_with("http://")
        || spec.starts_with("https://")
        || spec.starts_with("//")
        || spec.starts_with("url(")
}

/// Lookup order for one import target, mirroring Sass's resolution.
fn candidates(target: &Path) -> Vec<PathBuf> {
    let Some(name) = target.file_name().and_then(|n| n.to_str()) else {
        return Vec::new();
    };
    let dir = target.parent().map(Path::to_path_buf).unwrap_or_default();

    let has_ext = target
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext));
    if has_ext {
        return vec![target.to_path_buf(), dir.join(format!("_{name}"))];
    }

    let mut out = Vec::new();
    for ext in EXTENSIONS {
        out.push(dir.join(format!("{name}.{ext}")));
        out.push(dir.join(format!("_{name}.{ext}")));
    }
    for ext in EXTENSIONS {
        out.push(target.join(format!("index.{ext}")));
        out.push(target.join(format!("_index.{ext}")));
    }
    out
}

impl StyleCompiler for SassCliCompiler {
    fn compile_file(
        &self,
        path: &Path,
        on_read: &mut dyn FnMut(&Path),
    ) -> Result<String, CompilerError> {
        for read in self.resolve_reads(path)? {
            on_read(&read);
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-source-map");
        for load_path in &self.load_paths {
            cmd.arg(format!("--load-path={}", load_path.display()));
        }
        cmd.arg(path);

        debug!(program = %self.program, ?path, "running sass");
        let output = cmd.output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(CompilerError::Compile { message });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn compiler(fs: &MockFileSystem, load_paths: Vec<PathBuf>) -> SassCliCompiler {
        SassCliCompiler::with_fs("sass", load_paths, Arc::new(fs.clone()))
    }

    #[test]
    fn follows_partials_and_index_files() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/s/main.scss",
            "@use 'base';\n@import \"theme/colors\", 'grid';\n@use \"sass:math\";",
        );
        fs.add_file("/s/_base.scss", "@forward 'mixins/index';");
        fs.add_file("/s/mixins/_index.scss", "");
        fs.add_file("/s/theme/_colors.scss", "$red: #f00;");
        fs.add_file("/s/grid/_index.scss", "// @import 'ignored';");

        let reads = compiler(&fs, Vec::new())
            .resolve_reads(Path::new("/s/main.scss"))
            .unwrap();

        assert_eq!(
            reads,
            vec![
                PathBuf::from("/s/main.scss"),
                PathBuf::from("/s/_base.scss"),
                PathBuf::from("/s/theme/_colors.scss"),
                PathBuf::from("/s/grid/_index.scss"),
                PathBuf::from("/s/mixins/_index.scss"),
            ]
        );
    }

    #[test]
    fn falls_back_to_load_paths_and_tolerates_cycles() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/a.scss", "@import 'b'; @use 'vendor/reset';");
        fs.add_file("/s/_b.scss", "@import 'a.scss';");
        fs.add_file("/lib/vendor/_reset.scss", "");

        let reads = compiler(&fs, vec![PathBuf::from("/lib")])
            .resolve_reads(Path::new("/s/a.scss"))
            .unwrap();

        assert_eq!(
            reads,
            vec![
                PathBuf::from("/s/a.scss"),
                PathBuf::from("/s/_b.scss"),
                PathBuf::from("/lib/vendor/_reset.scss"),
            ]
        );
    }

    #[test]
    fn url_import_does_not_swallow_following_directives() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/s/main.scss",
            "@import \"https://fonts.googleapis.com/css?family=Roboto\";\n@use 'base';\n// @use 'ignored';\n/* @import 'also-ignored'; */",
        );
        fs.add_file("/s/_base.scss", "");
        fs.add_file("/s/_ignored.scss", "");
        fs.add_file("/s/_also-ignored.scss", "");

        let reads = compiler(&fs, Vec::new())
            .resolve_reads(Path::new("/s/main.scss"))
            .unwrap();

        assert_eq!(
            reads,
            vec![PathBuf::from("/s/main.scss"), PathBuf::from("/s/_base.scss")]
        );
    }

    #[test]
    fn only_module_targets_count_as_imports() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/s/main.scss",
            "@use 'theme' with ($font: 'base');\n@forward 'grid' show 'cols';\n@import 'reset', \"print.css\" print;",
        );
        fs.add_file("/s/_theme.scss", "");
        fs.add_file("/s/_grid.scss", "");
        fs.add_file("/s/_reset.scss", "");
        fs.add_file("/s/print.css", "");
        fs.add_file("/s/_base.scss", "");
        fs.add_file("/s/_cols.scss", "");

        let reads = compiler(&fs, Vec::new())
            .resolve_reads(Path::new("/s/main.scss"))
            .unwrap();

        assert_eq!(
            reads,
            vec![
                PathBuf::from("/s/main.scss"),
                PathBuf::from("/s/_theme.scss"),
                PathBuf::from("/s/_grid.scss"),
                PathBuf::from("/s/_reset.scss"),
                PathBuf::from("/s/print.css"),
            ]
        );
    }

    #[test]
    fn unreadable_source_is_a_system_error() {
        let fs = MockFileSystem::new();
        let err = compiler(&fs, Vec::new())
            .resolve_reads(Path::new("/s/missing.scss"))
            .unwrap_err();
        assert!(matches!(err, CompilerError::System(_)));
    }
}
