//! Saving a chosen variant next to its source.
//!
//! Selections go to `<source dir>/selection/<stem><suffix><ext>`. The
//! original is copied with its own extension; processed variants are PNG.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pipeline::TransformKind;

/// Name of the folder selections are written to.
pub const SELECTION_DIR: &str = "selection";

/// Errors writing a selection.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Source path has no file name: {0}")]
    InvalidSource(PathBuf),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a variant of `source` is saved.
pub fn selection_path(source: &Path, kind: &TransformKind) -> Result<PathBuf, OutputError> {
    let stem = source
        .file_stem()
        .ok_or_else(|| OutputError::InvalidSource(source.to_path_buf()))?;
    let dir = source.parent().unwrap_or_else(|| Path::new(""));

    let mut name = stem.to_os_string();
    name.push(kind.file_suffix());
    if kind.is_original() {
        if let Some(ext) = source.extension() {
            name.push(".");
            name.push(ext);
        }
    } else {
        name.push(".png");
    }

    Ok(dir.join(SELECTION_DIR).join(name))
}

/// Write the encoded bytes of a variant to its selection path.
///
/// Creates the selection folder when needed and overwrites an earlier save
/// of the same variant. Returns the written path.
pub fn save_selection(
    source: &Path,
    kind: &TransformKind,
    bytes: &[u8],
) -> Result<PathBuf, OutputError> {
    let target = selection_path(source, kind)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| OutputError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&target, bytes).map_err(|source| OutputError::Io {
        path: target.clone(),
        source,
    })?;

    tracing::info!(path = %target.display(), kind = %kind, "Selection saved");
    Ok(target)
}
