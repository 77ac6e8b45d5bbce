//! Content-based image type detection.
//!
//! The type of an upload is decided by its leading magic bytes, never by its
//! file name or the `Content-Type` the client sent. Detection is delegated to
//! [`image::guess_format`]; this module narrows the result to the three
//! formats the pipeline can crop and resize.
//!
//! | Signature | Kind | Mime | Extension |
//! |---|---|---|---|
//! | `GIF8` | [`ImageKind::Gif`] | `image/gif` | `gif` |
//! | `FF D8 FF` | [`ImageKind::Jpeg`] | `image/jpeg` | `jpg` |
//! | `89 50 4E 47 0D 0A 1A 0A` | [`ImageKind::Png`] | `image/png` | `png` |
//!
//! Anything else is either [`MimeError::Unrecognized`] (no image signature at
//! all, the normal outcome for a PDF or a text file) or
//! [`MimeError::Disallowed`] (a real image in a format we don't process, such
//! as WebP or BMP).

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Mime types accepted by the pipeline.
pub const ALLOWED_MIMES: &[&str] = &["image/gif", "image/jpeg", "image/png"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MimeError {
    #[error("No known image signature")]
    Unrecognized,
    #[error("Image type not allowed: {mime}")]
    Disallowed { mime: String },
}

/// One of the supported raster formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Gif,
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn mime(self) -> &'static str {
        match self {
            ImageKind::Gif => "image/gif",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }

    /// Extension used when the pipeline names a file of this kind.
    pub fn canonical_extension(self) -> &'static str {
        match self {
            ImageKind::Gif => "gif",
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }

    /// True if `ext` (any case) is a conventional extension for this kind.
    pub fn extension_matches(self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            ImageKind::Gif => ext == "gif",
            ImageKind::Jpeg => matches!(ext.as_str(), "jpg" | "jpeg" | "jpe"),
            ImageKind::Png => ext == "png",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/gif" => Some(ImageKind::Gif),
            "image/jpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    pub fn format(self) -> ImageFormat {
        match self {
            ImageKind::Gif => ImageFormat::Gif,
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Classify bytes by their content signature.
///
/// Only formats listed in [`ALLOWED_MIMES`] are accepted.
pub fn classify(bytes: &[u8]) -> Result<ImageKind, MimeError> {
    let format = image::guess_format(bytes).map_err(|_| MimeError::Unrecognized)?;
    let mime = format.to_mime_type();
    let disallowed = || MimeError::Disallowed {
        mime: mime.to_string(),
    };
    if !ALLOWED_MIMES.contains(&mime) {
        return Err(disallowed());
    }
    ImageKind::from_mime(mime).ok_or_else(disallowed)
}
