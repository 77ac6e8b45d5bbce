//! Shared test utilities for the imgstage test suite.
//!
//! Synthetic images are encoded with the `image` crate itself, so every
//! helper returns real, decodable bytes of the requested size.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let config = test_config(Path::new("/site"));
//! let (store, upload) = seed_upload(MemoryStore::new(), "cat.jpg", &jpeg_bytes(40, 30));
//! ```

use crate::config::UploadConfig;
use crate::store::tests::MemoryStore;
use crate::types::UploadedFile;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Timestamp pinned by tests that use a `FixedClock`.
pub const TS: u64 = 1377287616449;

// =========================================================================
// Synthetic images
// =========================================================================

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

/// Opaque gradient with some high-frequency detail so JPEG quality matters.
fn pattern(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x * 7 + y * 13) % 256) as u8,
        ])
    })
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(pattern(width, height)), ImageFormat::Jpeg)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(pattern(width, height)), ImageFormat::Png)
}

/// PNG whose left half is fully transparent and right half opaque red.
pub fn png_with_alpha_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([255, 0, 0, 255])
        }
    });
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

/// GIF whose left half is the transparent index and right half opaque red.
pub fn gif_with_alpha_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([255, 0, 0, 255])
        }
    });
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Gif)
}

pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 40 % 256) as u8, (y * 40 % 256) as u8, 128, 255])
    });
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Gif)
}

// =========================================================================
// Pipeline fixtures
// =========================================================================

/// Default config with every directory rooted at `root`.
pub fn test_config(root: &Path) -> UploadConfig {
    UploadConfig {
        doc_root: root.join("public"),
        staging_dir: root.join("tmp/staging"),
        ..UploadConfig::default()
    }
}

/// Put `bytes` where a request decoder would leave them and describe the upload.
pub fn seed_upload(store: MemoryStore, name: &str, bytes: &[u8]) -> (MemoryStore, UploadedFile) {
    let temp_path = PathBuf::from("/upload").join(name);
    let upload = UploadedFile {
        field_name: "photo".to_string(),
        temp_path: temp_path.clone(),
        declared_name: name.to_string(),
        declared_size: bytes.len() as u64,
    };
    (store.with_file(temp_path, bytes), upload)
}
