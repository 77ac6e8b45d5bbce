//! Errors surfaced by pipeline operations.
//!
//! Lower layers keep their own enums ([`StoreError`], [`BackendError`], ...);
//! [`UploadError`] wraps them with the path or declared name the user needs to
//! see.
//!
//! A failed removal during cleanup is not an error here: it is logged and
//! reported as a [`CleanupFailure`](crate::types::CleanupFailure) on the
//! result it followed.

use crate::imaging::{BackendError, CropRect};
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to read upload {name:?}: {source}")]
    Read {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("{name:?} is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
    #[error("{name:?} is not an allowed image ({})", .detected.as_deref().unwrap_or("unrecognized content"))]
    NotAnImage {
        name: String,
        /// Detected mime when the content is a real but disallowed image.
        detected: Option<String>,
    },
    #[error("Invalid source dimensions {width}x{height} in {}", path.display())]
    InvalidSourceDimensions {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("Failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("Crop {rect} lies outside the {width}x{height} image {}", path.display())]
    InvalidCrop {
        path: PathBuf,
        rect: CropRect,
        width: u32,
        height: u32,
    },
    #[error("Invalid file name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl UploadError {
    /// True for expected outcomes of untrusted input, as opposed to faults.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            UploadError::TooLarge { .. }
                | UploadError::NotAnImage { .. }
                | UploadError::InvalidCrop { .. }
        )
    }
}
