//! Pure Rust codec built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (GIF, JPEG, PNG) | `image::load_from_memory_with_format` |
//! | Crop | clip to source, `DynamicImage::crop_imm` + `imageops::replace` onto a fresh canvas |
//! | Resize (stretch) | `DynamicImage::resize_exact`, `Lanczos3` |
//! | Resize (fill) | `DynamicImage::resize_to_fill`, `Lanczos3` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG | `PngEncoder::new_with_quality`, adaptive filtering |
//! | Encode → GIF | `GifEncoder::encode_frame` |
//!
//! ## Transparency
//!
//! PNG output, and GIF output unless disabled, is built on a canvas that
//! starts fully transparent. Pixels are copied onto it with
//! [`copy_unblended`], which writes source alpha through instead of blending
//! it against whatever was underneath. GIF output with transparency disabled
//! is flattened onto white; JPEG output drops alpha.
//!
//! Crop rectangles are clipped to the source before anything is allocated,
//! so the canvas is never larger than the decoded image.

use super::backend::{BackendError, Codec, Dimensions};
use super::params::{CropParams, EncodeSettings, Fit, ResizeParams};
use crate::mime::ImageKind;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Frame, ImageReader, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

/// Background used when a GIF is flattened instead of kept transparent.
const FLATTEN_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Pure Rust codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// A `width × height` canvas where every pixel is fully transparent.
pub fn transparent_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]))
}

/// Copy `src` onto `canvas` at `(x, y)`, replacing pixels rather than
/// alpha-blending them.
pub fn copy_unblended(canvas: &mut RgbaImage, src: &RgbaImage, x: u32, y: u32) {
    imageops::replace(canvas, src, i64::from(x), i64::from(y));
}

/// Composite onto an opaque background, dropping the alpha channel.
fn flatten(img: &DynamicImage, background: Rgb<u8>) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::from_pixel(rgba.width(), rgba.height(), background);
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = px[3] as u32;
        let blend = |fg: u8, bg: u8| ((fg as u32 * alpha + bg as u32 * (255 - alpha)) / 255) as u8;
        out.put_pixel(
            x,
            y,
            Rgb([
                blend(px[0], background[0]),
                blend(px[1], background[1]),
                blend(px[2], background[2]),
            ]),
        );
    }
    out
}

fn decode(bytes: &[u8], kind: ImageKind) -> Result<DynamicImage, BackendError> {
    image::load_from_memory_with_format(bytes, kind.format()).map_err(|e| BackendError::Decode {
        kind,
        message: e.to_string(),
    })
}

/// Apply the output format's canvas rule to a finished image.
fn prepare_canvas(img: DynamicImage, settings: &EncodeSettings) -> DynamicImage {
    if settings.keeps_transparency() {
        let mut canvas = transparent_canvas(img.width(), img.height());
        copy_unblended(&mut canvas, &img.to_rgba8(), 0, 0);
        DynamicImage::ImageRgba8(canvas)
    } else if settings.kind == ImageKind::Gif {
        DynamicImage::ImageRgb8(flatten(&img, FLATTEN_BACKGROUND))
    } else {
        img
    }
}

fn png_compression(level: u32) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Encode into memory with the settings' format and quality.
fn encode(img: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>, BackendError> {
    let kind = settings.kind;
    let encode_err = |e: image::ImageError| BackendError::Encode {
        kind,
        message: e.to_string(),
    };

    let mut buf = Vec::new();
    match kind {
        ImageKind::Jpeg => {
            let quality = settings.jpeg_quality.value() as u8;
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
                .map_err(encode_err)?;
        }
        ImageKind::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut buf,
                png_compression(settings.png_compression.level()),
                PngFilter::Adaptive,
            );
            img.write_with_encoder(encoder).map_err(encode_err)?;
        }
        ImageKind::Gif => {
            // The encoder writes the GIF trailer when dropped
            let mut encoder = GifEncoder::new(&mut buf);
            encoder
                .encode_frame(Frame::new(img.to_rgba8()))
                .map_err(encode_err)?;
        }
    }
    Ok(buf)
}

impl Codec for RustBackend {
    fn identify(&self, bytes: &[u8], kind: ImageKind) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::with_format(Cursor::new(bytes), kind.format())
            .into_dimensions()
            .map_err(|e| BackendError::Decode {
                kind,
                message: e.to_string(),
            })?;
        Ok(Dimensions { width, height })
    }

    fn crop(
        &self,
        bytes: &[u8],
        kind: ImageKind,
        params: &CropParams,
    ) -> Result<Vec<u8>, BackendError> {
        let img = decode(bytes, kind)?;
        let rect = params
            .rect
            .clamp_to(img.width(), img.height())
            .ok_or(BackendError::CropOutOfBounds {
                rect: params.rect,
                width: img.width(),
                height: img.height(),
            })?;
        let region = img.crop_imm(rect.x1, rect.y1, rect.w, rect.h);
        encode(&prepare_canvas(region, &params.encode), &params.encode)
    }

    fn resize(
        &self,
        bytes: &[u8],
        kind: ImageKind,
        params: &ResizeParams,
    ) -> Result<Vec<u8>, BackendError> {
        let img = decode(bytes, kind)?;
        let resized = match params.fit {
            Fit::Stretch => img.resize_exact(params.width, params.height, FilterType::Lanczos3),
            Fit::Fill => img.resize_to_fill(params.width, params.height, FilterType::Lanczos3),
        };
        encode(&prepare_canvas(resized, &params.encode), &params.encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{CropRect, Quality};
    use crate::test_helpers::{
        gif_bytes, gif_with_alpha_bytes, jpeg_bytes, png_bytes, png_with_alpha_bytes,
    };

    fn decode_for_test(bytes: &[u8], kind: ImageKind) -> DynamicImage {
        image::load_from_memory_with_format(bytes, kind.format()).unwrap()
    }

    fn resize_params(kind: ImageKind, width: u32, height: u32, fit: Fit) -> ResizeParams {
        ResizeParams {
            width,
            height,
            fit,
            encode: EncodeSettings::for_kind(kind),
        }
    }

    #[test]
    fn identify_synthetic_images() {
        let backend = RustBackend::new();
        let dims = backend.identify(&jpeg_bytes(200, 150), ImageKind::Jpeg).unwrap();
        assert_eq!((dims.width, dims.height), (200, 150));

        let dims = backend.identify(&png_bytes(10, 12), ImageKind::Png).unwrap();
        assert_eq!((dims.width, dims.height), (10, 12));

        let dims = backend.identify(&gif_bytes(7, 3), ImageKind::Gif).unwrap();
        assert_eq!((dims.width, dims.height), (7, 3));
    }

    #[test]
    fn identify_garbage_errors() {
        let backend = RustBackend::new();
        let result = backend.identify(b"not an image", ImageKind::Png);
        assert!(matches!(result, Err(BackendError::Decode { .. })));
    }

    #[test]
    fn identify_with_wrong_kind_errors() {
        let backend = RustBackend::new();
        assert!(backend.identify(&png_bytes(4, 4), ImageKind::Jpeg).is_err());
    }

    #[test]
    fn resize_stretch_exact_dimensions() {
        let backend = RustBackend::new();
        let out = backend
            .resize(
                &jpeg_bytes(800, 600),
                ImageKind::Jpeg,
                &resize_params(ImageKind::Jpeg, 64, 64, Fit::Stretch),
            )
            .unwrap();

        assert_eq!(crate::mime::classify(&out), Ok(ImageKind::Jpeg));
        let img = decode_for_test(&out, ImageKind::Jpeg);
        assert_eq!((img.width(), img.height()), (64, 64));
    }

    #[test]
    fn resize_fill_exact_dimensions() {
        let backend = RustBackend::new();
        let out = backend
            .resize(
                &png_bytes(800, 600),
                ImageKind::Png,
                &resize_params(ImageKind::Png, 100, 200, Fit::Fill),
            )
            .unwrap();

        let img = decode_for_test(&out, ImageKind::Png);
        assert_eq!((img.width(), img.height()), (100, 200));
    }

    #[test]
    fn resize_png_keeps_alpha() {
        let backend = RustBackend::new();
        let out = backend
            .resize(
                &png_with_alpha_bytes(20, 20),
                ImageKind::Png,
                &resize_params(ImageKind::Png, 10, 10, Fit::Stretch),
            )
            .unwrap();

        let img = decode_for_test(&out, ImageKind::Png).to_rgba8();
        // Left half of the source is fully transparent
        assert_eq!(img.get_pixel(0, 5)[3], 0);
        assert_eq!(img.get_pixel(9, 5)[3], 255);
    }

    #[test]
    fn resize_gif_output_is_gif() {
        let backend = RustBackend::new();
        let out = backend
            .resize(
                &gif_bytes(40, 30),
                ImageKind::Gif,
                &resize_params(ImageKind::Gif, 20, 15, Fit::Stretch),
            )
            .unwrap();

        assert_eq!(crate::mime::classify(&out), Ok(ImageKind::Gif));
        let img = decode_for_test(&out, ImageKind::Gif);
        assert_eq!((img.width(), img.height()), (20, 15));
    }

    #[test]
    fn lower_jpeg_quality_is_smaller() {
        let backend = RustBackend::new();
        let source = jpeg_bytes(300, 300);
        let mut params = resize_params(ImageKind::Jpeg, 300, 300, Fit::Stretch);

        params.encode.jpeg_quality = Quality::new(95);
        let high = backend.resize(&source, ImageKind::Jpeg, &params).unwrap();
        params.encode.jpeg_quality = Quality::new(10);
        let low = backend.resize(&source, ImageKind::Jpeg, &params).unwrap();

        assert!(low.len() < high.len());
    }

    #[test]
    fn crop_jpeg_to_exact_rect() {
        let backend = RustBackend::new();
        let params = CropParams {
            rect: CropRect::new(100, 50, 300, 200),
            encode: EncodeSettings::for_kind(ImageKind::Jpeg),
        };
        let out = backend
            .crop(&jpeg_bytes(800, 600), ImageKind::Jpeg, &params)
            .unwrap();

        let img = decode_for_test(&out, ImageKind::Jpeg);
        assert_eq!((img.width(), img.height()), (300, 200));
    }

    #[test]
    fn crop_past_the_edge_is_clipped() {
        let backend = RustBackend::new();
        // Rect runs 5px past the right and bottom edges
        let params = CropParams {
            rect: CropRect::new(10, 10, 15, 15),
            encode: EncodeSettings::for_kind(ImageKind::Png),
        };
        let out = backend.crop(&png_bytes(20, 20), ImageKind::Png, &params).unwrap();

        let img = decode_for_test(&out, ImageKind::Png).to_rgba8();
        assert_eq!(img.dimensions(), (10, 10));
        assert_eq!(img.get_pixel(9, 9)[3], 255);
    }

    #[test]
    fn crop_with_huge_rect_never_allocates_past_the_source() {
        let backend = RustBackend::new();
        for kind in [ImageKind::Png, ImageKind::Jpeg, ImageKind::Gif] {
            let params = CropParams {
                rect: "0,0,4294967295,4294967295".parse().unwrap(),
                encode: EncodeSettings::for_kind(kind),
            };
            let source = match kind {
                ImageKind::Png => png_bytes(10, 10),
                ImageKind::Jpeg => jpeg_bytes(10, 10),
                ImageKind::Gif => gif_bytes(10, 10),
            };
            let out = backend.crop(&source, kind, &params).unwrap();
            let img = decode_for_test(&out, kind);
            assert_eq!((img.width(), img.height()), (10, 10), "{kind}");
        }
    }

    #[test]
    fn crop_starting_outside_the_source_errors() {
        let backend = RustBackend::new();
        let params = CropParams {
            rect: CropRect::new(10, 0, 5, 5),
            encode: EncodeSettings::for_kind(ImageKind::Png),
        };
        let err = backend
            .crop(&png_bytes(10, 10), ImageKind::Png, &params)
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::CropOutOfBounds {
                width: 10,
                height: 10,
                ..
            }
        ));
    }

    #[test]
    fn crop_png_writes_source_alpha_through() {
        let backend = RustBackend::new();
        let params = CropParams {
            rect: CropRect::new(0, 0, 20, 20),
            encode: EncodeSettings::for_kind(ImageKind::Png),
        };
        let out = backend
            .crop(&png_with_alpha_bytes(20, 20), ImageKind::Png, &params)
            .unwrap();

        let img = decode_for_test(&out, ImageKind::Png).to_rgba8();
        assert_eq!(img.get_pixel(2, 2)[3], 0);
        assert_eq!(img.get_pixel(17, 2)[3], 255);
    }

    #[test]
    fn crop_gif_to_exact_rect() {
        let backend = RustBackend::new();
        let params = CropParams {
            rect: CropRect::new(0, 0, 5, 4),
            encode: EncodeSettings::for_kind(ImageKind::Gif),
        };
        let out = backend.crop(&gif_bytes(10, 10), ImageKind::Gif, &params).unwrap();

        let img = decode_for_test(&out, ImageKind::Gif);
        assert_eq!((img.width(), img.height()), (5, 4));
    }

    #[test]
    fn crop_gif_writes_source_alpha_through() {
        let backend = RustBackend::new();
        let params = CropParams {
            rect: CropRect::new(4, 0, 12, 10),
            encode: EncodeSettings::for_kind(ImageKind::Gif),
        };
        let out = backend
            .crop(&gif_with_alpha_bytes(20, 10), ImageKind::Gif, &params)
            .unwrap();

        let img = decode_for_test(&out, ImageKind::Gif).to_rgba8();
        assert_eq!(img.dimensions(), (12, 10));
        // Source columns 4..10 are transparent, 10..16 opaque
        assert_eq!(img.get_pixel(0, 5)[3], 0);
        assert_eq!(img.get_pixel(5, 5)[3], 0);
        assert_eq!(img.get_pixel(6, 5)[3], 255);
        assert_eq!(img.get_pixel(11, 5)[3], 255);
    }

    #[test]
    fn crop_gif_without_transparency_is_flattened() {
        let backend = RustBackend::new();
        let params = CropParams {
            rect: CropRect::new(0, 0, 20, 10),
            encode: EncodeSettings {
                gif_transparent: false,
                ..EncodeSettings::for_kind(ImageKind::Gif)
            },
        };
        let out = backend
            .crop(&gif_with_alpha_bytes(20, 10), ImageKind::Gif, &params)
            .unwrap();

        let img = decode_for_test(&out, ImageKind::Gif).to_rgba8();
        assert!(img.pixels().all(|px| px[3] == 255));
        // Transparent half lands on the white background
        assert_eq!(img.get_pixel(2, 5), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn resize_gif_keeps_or_flattens_alpha() {
        let backend = RustBackend::new();
        let source = gif_with_alpha_bytes(40, 20);
        let mut params = resize_params(ImageKind::Gif, 20, 10, Fit::Stretch);

        let out = backend.resize(&source, ImageKind::Gif, &params).unwrap();
        let img = decode_for_test(&out, ImageKind::Gif).to_rgba8();
        assert_eq!(img.get_pixel(0, 5)[3], 0);
        assert_eq!(img.get_pixel(19, 5)[3], 255);

        params.encode.gif_transparent = false;
        let out = backend.resize(&source, ImageKind::Gif, &params).unwrap();
        let img = decode_for_test(&out, ImageKind::Gif).to_rgba8();
        assert!(img.pixels().all(|px| px[3] == 255));
    }

    #[test]
    fn flatten_blends_against_background() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let flat = flatten(&DynamicImage::ImageRgba8(rgba), FLATTEN_BACKGROUND);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn png_compression_levels() {
        assert!(matches!(png_compression(0), CompressionType::Fast));
        assert!(matches!(png_compression(5), CompressionType::Default));
        assert!(matches!(png_compression(9), CompressionType::Best));
    }
}
