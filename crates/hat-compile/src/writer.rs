//! Artifact file writer
//!
//! The only part of the compiler that touches disk: puts a compiled
//! artifact under the scripts directory as `<automation_id>.py`.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CompileError, CompileResult};
use crate::Artifact;

/// Write the artifact source to `<dir>/<automation_id>.py`
pub fn write_artifact(dir: impl AsRef<Path>, artifact: &Artifact) -> CompileResult<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| CompileError::Write {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let path = dir.join(format!("{}.py", artifact.automation_id));
    fs::write(&path, &artifact.source).map_err(|e| CompileError::Write {
        path: path.clone(),
        source: e,
    })?;

    info!(?path, "wrote artifact");
    Ok(path)
}
