//! Records passed between pipeline stages.
//!
//! An [`UploadedFile`] comes in from whoever decoded the request. Validation
//! turns it into a [`ProcessingFile`] (plus an optional preserved original),
//! and version processing turns that into [`Artifact`]s. Artifacts are plain
//! serializable data so callers can hand them straight to a JSON response.

use crate::imaging::CropRect;
use crate::mime::ImageKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file from an upload request, as handed over by the request decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Form field the file arrived in.
    pub field_name: String,
    /// Where the decoder left the payload.
    pub temp_path: PathBuf,
    /// Client-supplied file name. Untrusted.
    pub declared_name: String,
    /// Client-supplied size in bytes. Untrusted, but checked before any read.
    pub declared_size: u64,
}

/// A format-confirmed copy of an upload, waiting to be cropped and versioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingFile {
    pub name: String,
    pub path: PathBuf,
    pub url: String,
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub declared_name: String,
}

impl ProcessingFile {
    pub fn mime(&self) -> &'static str {
        self.kind.mime()
    }
}

/// A file the pipeline produced and left in place: a version or an original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub mime: String,
    /// Version name; `None` for a preserved original.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A cleanup step that failed without affecting the result it followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Result of validating one upload.
#[derive(Debug, Clone, Serialize)]
pub struct Validated {
    pub file: ProcessingFile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<Artifact>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<CleanupFailure>,
}

/// Per-call choices for cropping and naming versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    pub crop: Option<CropRect>,
    /// Base name under the `custom` convention.
    pub custom_name: Option<String>,
    /// Stored name of the preserved original, when it was renamed.
    pub original_name: Option<String>,
}

/// Everything one upload produced.
#[derive(Debug, Clone, Serialize)]
pub struct Processed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<Artifact>,
    pub versions: Vec<Artifact>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<CleanupFailure>,
}
