//! Byte storage behind the pipeline.
//!
//! Every file the pipeline touches (the client's temp upload, staged copies,
//! the processing file, originals and versions) goes through a [`BlobStore`].
//! Paths are plain filesystem paths; the store decides what they mean.
//!
//! [`FsStore`] is the production implementation. Writes go to a sibling temp
//! file that is renamed into place, so a reader never sees a half-written
//! image and an overwrite (crop in place, version regeneration) is atomic.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Read/write/delete of whole files by path.
///
/// Implementations must be `Sync`: one store serves every file of a batch.
pub trait BlobStore: Sync {
    fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError>;

    /// Create or replace `path`, creating parent directories as needed.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError>;

    /// Remove `path`. Removing a missing file is an error.
    fn delete(&self, path: &Path) -> Result<(), StoreError>;

    fn exists(&self, path: &Path) -> bool;
}

/// Local filesystem store.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }
}

/// `dir/.name.tmp` next to the target, on the same filesystem.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

impl BlobStore for FsStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        fs::read(path).map_err(|e| StoreError::io(path, e))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = temp_sibling(path);
        if let Err(e) = fs::write(&tmp, bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(path, e));
        }
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::io(path, e)
        })
    }

    fn delete(&self, path: &Path) -> Result<(), StoreError> {
        fs::remove_file(path).map_err(|e| StoreError::io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
