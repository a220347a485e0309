//! Folder scanning for supported image files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use walkdir::WalkDir;

/// Extensions shown in a folder listing, lowercase.
///
/// HEIC/HEIF files are listed so the user sees them, but decoding them
/// fails with `DecodeError::UnsupportedFormat`.
pub const SUPPORTED_EXTENSIONS: [&str; 10] = [
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif", "heic", "heif",
];

/// Errors scanning a folder.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// One image file in a scanned folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub modified: SystemTime,
    pub size_bytes: u64,
}

/// Whether a path has a supported image extension (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// List the supported images directly inside `dir`, sorted by file name.
///
/// Subfolders are not descended into. A folder that doesn't exist yields
/// an empty list. Entries whose metadata can't be read are skipped with a
/// warning.
pub fn scan_folder(dir: &Path) -> Result<Vec<ImageEntry>, ScanError> {
    if !dir.exists() {
        tracing::debug!(dir = %dir.display(), "Folder does not exist");
        return Ok(Vec::new());
    }
    if !dir.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    let mut entries = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(ScanError::Unreadable {
                    path: dir.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "Skipping unreadable folder entry");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !is_supported_image(path) {
            continue;
        }

        let (size_bytes, modified) = match size_and_mtime(path) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Skipping image without metadata"
                );
                continue;
            }
        };

        entries.push(ImageEntry {
            path: path.to_path_buf(),
            file_name: entry.file_name().to_string_lossy().into_owned(),
            modified,
            size_bytes,
        });
    }

    tracing::debug!(dir = %dir.display(), count = entries.len(), "Folder scanned");
    Ok(entries)
}

fn size_and_mtime(path: &Path) -> std::io::Result<(u64, SystemTime)> {
    let metadata = fs::metadata(path)?;
    Ok((metadata.len(), metadata.modified()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, len: usize) {
        fs::write(dir.join(name), vec![0u8; len]).unwrap();
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_image(Path::new("a.jpg")));
        assert!(is_supported_image(Path::new("a.JPEG")));
        assert!(is_supported_image(Path::new("dir/b.Tif")));
        assert!(is_supported_image(Path::new("c.heic")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("no_extension")));
    }

    #[test]
    fn test_missing_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let result = scan_folder(&dir.path().join("nope")).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.jpg", 1);
        let result = scan_folder(&dir.path().join("a.jpg"));
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn test_lists_supported_images_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.png", 10);
        touch(dir.path(), "a.JPG", 20);
        touch(dir.path(), "c.heic", 30);
        touch(dir.path(), "readme.txt", 5);

        let entries = scan_folder(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.file_name.as_str()).collect();

        assert_eq!(names, vec!["a.JPG", "b.png", "c.heic"]);
        assert_eq!(entries[0].size_bytes, 20);
        assert_eq!(entries[0].path, dir.path().join("a.JPG"));
    }

    #[test]
    fn test_does_not_descend_into_subfolders() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("selection");
        fs::create_dir(&sub).unwrap();
        touch(&sub, "saved.png", 1);
        touch(dir.path(), "top.png", 1);

        let entries = scan_folder(dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "top.png");
    }
}
