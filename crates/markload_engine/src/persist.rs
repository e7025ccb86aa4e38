use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::StoreError;

/// Ensure a directory exists and is writable; create it if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
        if !meta.is_dir() {
            return Err(StoreError::Directory(format!("{} is not a directory", dir.display())));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
    }
    // Fails early when the directory is read-only.
    NamedTempFile::new_in(dir).map_err(|e| StoreError::Directory(e.to_string()))?;
    Ok(())
}

/// Replace `path` with `content`: write a sibling temp file, fsync it, then rename.
/// Readers see either the old file or the new one, never a partial write.
pub fn write_atomically(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Writes delivered artifacts into one output directory.
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `{dir}/{filename}` atomically, replacing an existing file of that name.
    /// The filename is sanitized first; the final path is returned.
    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, StoreError> {
        let target = self.dir.join(markload_core::safe_filename(filename));
        write_atomically(&target, content.as_bytes())?;
        Ok(target)
    }
}
