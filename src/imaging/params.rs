//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline stages (which decide what images to create)
//! and the [`backend`](super::backend) (which does the actual pixel work). This
//! separation allows swapping codecs (e.g. for testing with a mock) without
//! changing stage logic.
//!
//! ## Types
//!
//! - [`Quality`] — JPEG quality (1–100, default 80). Clamped on construction.
//! - [`PngCompression`] — PNG compression level (0–9, default 9). Clamped on construction.
//! - [`EncodeSettings`] — Output format plus its per-format knobs.
//! - [`Fit`] — How a version fills its planned size.
//! - [`CropRect`] — User-chosen crop rectangle, parsed from the cropper UI.
//! - [`CropParams`] / [`ResizeParams`] — Full specification of one codec call.

use crate::mime::ImageKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// PNG compression level (0 = fastest, 9 = smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngCompression(pub u32);

impl PngCompression {
    pub fn new(level: u32) -> Self {
        Self(level.min(9))
    }

    pub fn level(self) -> u32 {
        self.0
    }
}

impl Default for PngCompression {
    fn default() -> Self {
        Self(9)
    }
}

/// Output format and the settings that apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub kind: ImageKind,
    pub jpeg_quality: Quality,
    pub png_compression: PngCompression,
    /// Composite GIF output onto a transparent canvas instead of flattening it.
    pub gif_transparent: bool,
}

impl EncodeSettings {
    pub fn for_kind(kind: ImageKind) -> Self {
        Self {
            kind,
            jpeg_quality: Quality::default(),
            png_compression: PngCompression::default(),
            gif_transparent: true,
        }
    }

    /// Whether the output canvas must start transparent and keep source alpha.
    pub fn keeps_transparency(&self) -> bool {
        match self.kind {
            ImageKind::Png => true,
            ImageKind::Gif => self.gif_transparent,
            ImageKind::Jpeg => false,
        }
    }
}

/// How a version is fitted to its planned size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    /// Resample the whole image to exactly the planned size.
    #[default]
    Stretch,
    /// Resize to cover the planned size, then center-crop the overflow.
    Fill,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropRectError {
    #[error("Crop rectangle needs 4 values (x1,y1,w,h), got {0}")]
    WrongArity(usize),
    #[error("Crop field {field} is not a non-negative integer: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// Crop rectangle in source pixels. `w` or `h` of 0 means "no crop".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x1: u32,
    pub y1: u32,
    pub w: u32,
    pub h: u32,
}

impl CropRect {
    pub fn new(x1: u32, y1: u32, w: u32, h: u32) -> Self {
        Self { x1, y1, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Clip the rectangle to a `width × height` source.
    ///
    /// Returns `None` when nothing of the rectangle lies inside the source.
    /// A rectangle running past the right or bottom edge is shortened to end
    /// there, so the result never asks for more pixels than the source has.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<CropRect> {
        if self.is_empty() || self.x1 >= width || self.y1 >= height {
            return None;
        }
        Some(CropRect {
            x1: self.x1,
            y1: self.y1,
            w: self.w.min(width - self.x1),
            h: self.h.min(height - self.y1),
        })
    }

    /// Build a rectangle from the cropper's form fields.
    ///
    /// Reads `coordx1`, `coordy1`, `w` and `h`; a missing field counts as 0,
    /// anything that is not a non-negative integer is rejected.
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self, CropRectError> {
        let get = |field: &'static str| -> Result<u32, CropRectError> {
            match fields.get(field).map(|v| v.trim()) {
                None | Some("") => Ok(0),
                Some(v) => parse_field(field, v),
            }
        };
        Ok(Self {
            x1: get("coordx1")?,
            y1: get("coordy1")?,
            w: get("w")?,
            h: get("h")?,
        })
    }
}

fn parse_field(field: &'static str, value: &str) -> Result<u32, CropRectError> {
    value.parse().map_err(|_| CropRectError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

impl FromStr for CropRect {
    type Err = CropRectError;

    /// Parse `"x1,y1,w,h"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const FIELDS: [&str; 4] = ["x1", "y1", "w", "h"];
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != FIELDS.len() {
            return Err(CropRectError::WrongArity(parts.len()));
        }
        let mut values = [0u32; 4];
        for (i, part) in parts.iter().enumerate() {
            values[i] = parse_field(FIELDS[i], part)?;
        }
        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.w, self.h, self.x1, self.y1)
    }
}

/// Parameters for a crop-to-exact-size operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub rect: CropRect,
    pub encode: EncodeSettings,
}

/// Parameters for a resize operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    pub fit: Fit,
    pub encode: EncodeSettings,
}
