// src/compiler/mod.rs

//! Boundary to the style-language compiler.
//!
//! - [`StyleCompiler`] is the external collaborator: source file in, CSS
//!   text out, with a callback invoked once per file it reads.
//! - [`adapter::CompilerAdapter`] wraps one compiler and turns that callback
//!   into an import set relative to the watched root.
//! - [`sass_cli::SassCliCompiler`] is the production implementation that
//!   drives the Dart Sass command line.

use std::io;
use std::path::Path;

use thiserror::Error;

pub mod adapter;
pub mod sass_cli;

pub use adapter::{CompileFailure, CompileOutput, CompilerAdapter};
pub use sass_cli::SassCliCompiler;

/// Failure reported by a [`StyleCompiler`].
#[derive(Error, Debug)]
pub enum CompilerError {
    /// The source (or one of its imports) is not valid.
    #[error("{message}")]
    Compile { message: String },

    /// The compiler could not reach the source or its imports.
    #[error("system error: {0}")]
    System(#[from] io::Error),
}

/// An external compiler for one style language.
pub trait StyleCompiler: Send + Sync {
    /// Compile the file at `path` and return the compiled text.
    ///
    /// `on_read` must be called synchronously, once per file read during
    /// this call (including `path` itself), with that file's absolute path.
    fn compile_file(
        &self,
        path: &Path,
        on_read: &mut dyn FnMut(&Path),
    ) -> Result<String, CompilerError>;
}
