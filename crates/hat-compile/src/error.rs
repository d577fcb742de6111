//! Compiler errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type for compilation operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors that can occur while compiling or writing an artifact
#[derive(Debug, Error)]
pub enum CompileError {
    /// The dissection pass driving the compiler failed
    #[error(transparent)]
    Dissect(#[from] hat_dissect::DissectError),

    /// A section was never closed before finishing the script
    #[error("section '{0}' was never closed")]
    OpenSection(&'static str),

    /// The artifact could not be written to disk
    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
