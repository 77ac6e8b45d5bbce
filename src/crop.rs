//! Cropping a processing file in place.
//!
//! A crop rewrites the processing file with the chosen rectangle, clipped to
//! the image; the result feeds version processing like any other
//! processing file. The cropper UI usually asks for the crop in a second
//! request, so [`Pipeline::open_processing`] can re-open a processing file by
//! name.

use crate::error::UploadError;
use crate::imaging::{Codec, CropParams, CropRect, Dimensions};
use crate::mime::{self, MimeError};
use crate::naming;
use crate::pipeline::Pipeline;
use crate::store::BlobStore;
use crate::types::ProcessingFile;
use tracing::{debug, info};

impl<S: BlobStore, C: Codec> Pipeline<'_, S, C> {
    /// Crop `file` to `rect`, overwriting it.
    ///
    /// An absent or zero-sized rectangle returns `file` untouched. A
    /// rectangle running past the image is clipped to it; one that starts
    /// outside it is [`UploadError::InvalidCrop`]. On any failure the
    /// processing file is deleted.
    pub fn crop(
        &self,
        file: ProcessingFile,
        rect: Option<CropRect>,
    ) -> Result<ProcessingFile, UploadError> {
        let Some(requested) = rect.filter(|r| !r.is_empty()) else {
            debug!(name = %file.name, "No crop requested");
            return Ok(file);
        };
        let Some(rect) = requested.clamp_to(file.width, file.height) else {
            self.remove_logged(&file.path);
            return Err(UploadError::InvalidCrop {
                path: file.path,
                rect: requested,
                width: file.width,
                height: file.height,
            });
        };
        if rect != requested {
            debug!(name = %file.name, %requested, clipped = %rect, "Crop clipped to source");
        }

        let bytes = match self.store.read(&file.path) {
            Ok(bytes) => bytes,
            Err(source) => {
                self.remove_logged(&file.path);
                return Err(UploadError::Read {
                    name: file.name,
                    source,
                });
            }
        };

        let params = CropParams {
            rect,
            encode: self.config.encode_settings(file.kind),
        };
        let cropped = match self.codec.crop(&bytes, file.kind, &params) {
            Ok(cropped) => cropped,
            Err(source) => {
                self.remove_logged(&file.path);
                return Err(UploadError::Encode {
                    path: file.path,
                    source,
                });
            }
        };
        if let Err(source) = self.store.write(&file.path, &cropped) {
            self.remove_logged(&file.path);
            return Err(UploadError::Write {
                path: file.path,
                source,
            });
        }

        info!(path = %file.path.display(), %rect, "Cropped");
        Ok(ProcessingFile {
            width: rect.w,
            height: rect.h,
            ..file
        })
    }

    /// Re-open a processing file by its plain file name.
    ///
    /// The type is sniffed again and the dimensions re-measured; nothing
    /// recorded at upload time is trusted.
    pub fn open_processing(&self, name: &str) -> Result<ProcessingFile, UploadError> {
        if !naming::is_plain_file_name(name) {
            return Err(UploadError::InvalidName {
                name: name.to_string(),
                reason: "must be a single path component",
            });
        }

        let path = self.config.processing_path().join(name);
        let bytes = self.store.read(&path).map_err(|source| UploadError::Read {
            name: name.to_string(),
            source,
        })?;
        let kind = mime::classify(&bytes).map_err(|e| UploadError::NotAnImage {
            name: name.to_string(),
            detected: match e {
                MimeError::Disallowed { mime } => Some(mime),
                MimeError::Unrecognized => None,
            },
        })?;
        let Dimensions { width, height } =
            self.codec
                .identify(&bytes, kind)
                .map_err(|source| UploadError::Decode {
                    path: path.clone(),
                    source,
                })?;

        Ok(ProcessingFile {
            name: name.to_string(),
            url: self.config.url_for(&self.config.processing_dir, name),
            path,
            kind,
            width,
            height,
            declared_name: name.to_string(),
        })
    }
}
