//! Codec trait and shared types.
//!
//! The [`Codec`] trait defines the three pixel-level operations the pipeline
//! needs: identify, crop, and resize. Each works on encoded bytes in memory
//! and returns encoded bytes, so a failed encode never leaves a partial file
//! behind. Where the bytes come from and go to is the
//! [`BlobStore`](crate::store::BlobStore)'s business.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{CropParams, CropRect, ResizeParams};
use crate::mime::ImageKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to decode {kind}: {message}")]
    Decode { kind: ImageKind, message: String },
    #[error("Failed to encode {kind}: {message}")]
    Encode { kind: ImageKind, message: String },
    #[error("Crop {rect} lies outside the {width}x{height} source")]
    CropOutOfBounds {
        rect: CropRect,
        width: u32,
        height: u32,
    },
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image codecs.
///
/// Implementations must be `Sync`: a single codec is shared by every file of
/// a batch, possibly across rayon workers.
pub trait Codec: Sync {
    /// Decode just enough of `bytes` to report pixel dimensions.
    fn identify(&self, bytes: &[u8], kind: ImageKind) -> Result<Dimensions, BackendError>;

    /// Copy a sub-rectangle into a new canvas.
    ///
    /// The rectangle is clipped to the decoded source first; the canvas has
    /// exactly the clipped size.
    fn crop(
        &self,
        bytes: &[u8],
        kind: ImageKind,
        params: &CropParams,
    ) -> Result<Vec<u8>, BackendError>;

    /// Resample to the planned size.
    fn resize(
        &self,
        bytes: &[u8],
        kind: ImageKind,
        params: &ResizeParams,
    ) -> Result<Vec<u8>, BackendError>;
}
