//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("Invalid source dimensions: {width}x{height}")]
    InvalidSourceDimensions { width: u32, height: u32 },
}

/// Plan the output size of a resize.
///
/// Rules, in priority order:
/// 1. Neither target given → source size (no-op resize).
/// 2. Both given → exactly `(target_w, target_h)`; aspect ratio is the caller's business.
/// 3. Width only → height scaled by `target_w / source_w`, rounded.
/// 4. Height only → width scaled by `target_h / source_h`, rounded.
///
/// A target of `Some(0)` counts as "not given". Derived edges never drop
/// below 1 pixel.
///
/// # Examples
/// ```
/// # use imgstage::imaging::plan_dimensions;
/// assert_eq!(plan_dimensions(Some(400), None, 800, 600), Ok((400, 300)));
/// assert_eq!(plan_dimensions(None, Some(300), 800, 600), Ok((400, 300)));
/// ```
pub fn plan_dimensions(
    target_w: Option<u32>,
    target_h: Option<u32>,
    source_w: u32,
    source_h: u32,
) -> Result<(u32, u32), PlanError> {
    if source_w == 0 || source_h == 0 {
        return Err(PlanError::InvalidSourceDimensions {
            width: source_w,
            height: source_h,
        });
    }

    let target_w = target_w.filter(|&w| w > 0);
    let target_h = target_h.filter(|&h| h > 0);

    let planned = match (target_w, target_h) {
        (None, None) => (source_w, source_h),
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale(source_h, w, source_w)),
        (None, Some(h)) => (scale(source_w, h, source_h), h),
    };
    Ok(planned)
}

/// `round(edge * numerator / denominator)`, at least 1.
fn scale(edge: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = (edge as f64 * numerator as f64 / denominator as f64).round();
    (scaled as u32).max(1)
}
