//! Staged write-then-verify validation of uploads.
//!
//! ```text
//! READ ─▶ STAGED ─▶ CLASSIFIED ─┬─▶ PROMOTED ─▶ (original preserved) ─┐
//!                               └─▶ REJECTED ─────────────────────────┴─▶ CLEANED
//! ```
//!
//! Nothing reaches the processing directory until its bytes have been
//! sniffed and found to be an allowed image. The declared name only ever
//! contributes a sanitized stem; the extension is corrected to match the
//! detected content. Every staged path is removed before [`Pipeline::validate`]
//! returns, whichever branch was taken.

use crate::error::UploadError;
use crate::imaging::{Codec, Dimensions};
use crate::mime::{self, ImageKind, MimeError};
use crate::naming;
use crate::pipeline::Pipeline;
use crate::store::BlobStore;
use crate::types::{Artifact, CleanupFailure, ProcessingFile, UploadedFile, Validated};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

impl<S: BlobStore, C: Codec> Pipeline<'_, S, C> {
    /// Turn an untrusted upload into a [`ProcessingFile`].
    pub fn validate(&self, upload: &UploadedFile) -> Result<Validated, UploadError> {
        let declared = naming::declared_file_name(&upload.declared_name);
        let limit = self.config.max_size_bytes();
        check_size(declared, upload.declared_size, limit)?;

        let bytes = self
            .store
            .read(&upload.temp_path)
            .map_err(|source| UploadError::Read {
                name: declared.to_string(),
                source,
            })?;
        check_size(declared, bytes.len() as u64, limit)?;
        debug!(name = declared, size = bytes.len(), "Upload read");

        let millis = self.clock.now_millis();
        let mut staged = Vec::new();
        let result = self.stage_and_promote(declared, &bytes, millis, &mut staged);
        let cleanup = self.clean_staged(&staged);

        let (file, original) = result?;
        Ok(Validated {
            file,
            original,
            cleanup,
        })
    }

    fn stage_and_promote(
        &self,
        declared: &str,
        bytes: &[u8],
        millis: u64,
        staged: &mut Vec<PathBuf>,
    ) -> Result<(ProcessingFile, Option<Artifact>), UploadError> {
        let declared_ext = naming::file_ext(declared);
        let staged_name = naming::staging_name(declared, &declared_ext, millis);
        let staged_path = self.config.staging_dir.join(&staged_name);
        self.write_staged(&staged_path, bytes, staged)?;
        debug!(path = %staged_path.display(), "Staged");

        let staged_bytes = self
            .store
            .read(&staged_path)
            .map_err(|source| UploadError::Read {
                name: declared.to_string(),
                source,
            })?;
        let kind = match mime::classify(&staged_bytes) {
            Ok(kind) => kind,
            Err(e) => {
                warn!(name = declared, reason = %e, "Upload rejected");
                return Err(UploadError::NotAnImage {
                    name: declared.to_string(),
                    detected: match e {
                        MimeError::Disallowed { mime } => Some(mime),
                        MimeError::Unrecognized => None,
                    },
                });
            }
        };
        debug!(name = declared, mime = kind.mime(), "Classified");

        let name = if kind.extension_matches(&declared_ext) {
            staged_name
        } else {
            let corrected = naming::staging_name(declared, kind.canonical_extension(), millis);
            debug!(from = %staged_name, to = %corrected, "Correcting extension");
            // A failed delete here is retried by the final cleanup
            let _ = self.store.delete(&staged_path);
            self.write_staged(
                &self.config.staging_dir.join(&corrected),
                &staged_bytes,
                staged,
            )?;
            corrected
        };

        let file = self.promote(declared, &name, &staged_bytes, kind)?;
        let original = if self.config.originals.preserve {
            match self.preserve_original(declared, bytes, &file, millis) {
                Ok(artifact) => Some(artifact),
                Err(e) => {
                    self.remove_logged(&file.path);
                    return Err(e);
                }
            }
        } else {
            None
        };
        Ok((file, original))
    }

    /// Record `path` before writing so a partial write is still cleaned up.
    fn write_staged(
        &self,
        path: &Path,
        bytes: &[u8],
        staged: &mut Vec<PathBuf>,
    ) -> Result<(), UploadError> {
        staged.push(path.to_path_buf());
        self.store
            .write(path, bytes)
            .map_err(|source| UploadError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Copy classified bytes into the processing directory and measure them.
    fn promote(
        &self,
        declared: &str,
        name: &str,
        bytes: &[u8],
        kind: ImageKind,
    ) -> Result<ProcessingFile, UploadError> {
        let path = self.config.processing_path().join(name);
        self.store
            .write(&path, bytes)
            .map_err(|source| UploadError::Write {
                path: path.clone(),
                source,
            })?;

        let Dimensions { width, height } = match self.codec.identify(bytes, kind) {
            Ok(dims) => dims,
            Err(source) => {
                self.remove_logged(&path);
                return Err(UploadError::Decode { path, source });
            }
        };

        info!(path = %path.display(), mime = kind.mime(), width, height, "Promoted");
        Ok(ProcessingFile {
            name: name.to_string(),
            url: self.config.url_for(&self.config.processing_dir, name),
            path,
            kind,
            width,
            height,
            declared_name: declared.to_string(),
        })
    }

    fn preserve_original(
        &self,
        declared: &str,
        bytes: &[u8],
        file: &ProcessingFile,
        millis: u64,
    ) -> Result<Artifact, UploadError> {
        let originals = &self.config.originals;
        let name = naming::original_name(
            declared,
            originals.rename,
            originals.convention,
            &originals.separator,
            millis,
        );
        if !naming::is_plain_file_name(&name) {
            return Err(UploadError::InvalidName {
                name,
                reason: "original name must be a single path component",
            });
        }

        let path = self.config.originals_path().join(&name);
        self.store
            .write(&path, bytes)
            .map_err(|source| UploadError::Write {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "Original preserved");

        Ok(Artifact {
            url: self.config.url_for(&originals.dir, &name),
            name,
            path,
            width: file.width,
            height: file.height,
            mime: file.mime().to_string(),
            version: None,
        })
    }

    fn clean_staged(&self, staged: &[PathBuf]) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        for (i, path) in staged.iter().enumerate() {
            if staged[..i].contains(path) || !self.store.exists(path) {
                continue;
            }
            failures.extend(self.remove_logged(path));
        }
        failures
    }
}

fn check_size(name: &str, size: u64, limit: u64) -> Result<(), UploadError> {
    if size > limit {
        warn!(name, size, limit, "Upload rejected: too large");
        return Err(UploadError::TooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}
