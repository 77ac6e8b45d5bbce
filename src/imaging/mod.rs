//! Image processing: pure Rust, on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Crop** | `crop_imm` onto an exact-size canvas |
//! | **Resize** | Lanczos3 `resize_exact` / `resize_to_fill` |
//! | **Encode** | JPEG / PNG / GIF encoders from `image::codecs` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`Codec`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Codec, Dimensions};
pub use calculations::{PlanError, plan_dimensions};
pub use params::{
    CropParams, CropRect, CropRectError, EncodeSettings, Fit, PngCompression, Quality,
    ResizeParams,
};
pub use rust_backend::RustBackend;
