use std::path::Path;

use crate::aruco::{MarkerDetection, MarkerDetector};
use crate::core;
use crate::frame::{FrameAnalysis, FrameAnalyzer, PoseError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Pose(#[from] PoseError),

    #[error(transparent)]
    Image(#[from] ::image::ImageError),
}

/// Convert an `image::GrayImage` into the lightweight core view type.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Validate a raw row-major 8-bit buffer and wrap it in a view.
pub fn gray_view_from_raw(
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<core::GrayImageView<'_>, DetectError> {
    if width == 0 || height == 0 {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    }
    let expected = (width as usize)
        .checked_mul(height as usize)
        .ok_or(DetectError::InvalidGrayDimensions { width, height })?;
    if data.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: data.len(),
        });
    }
    Ok(core::GrayImageView {
        width: width as usize,
        height: height as usize,
        data,
    })
}

/// Reduce an RGB frame to gray by the integer mean of its three channels.
///
/// This is not a luma transform: the marker detector was tuned on
/// channel-mean frames and all three channels weigh the same.
pub fn rgb_to_gray_mean(img: &::image::RgbImage) -> ::image::GrayImage {
    ::image::GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        ::image::Luma([((r as u16 + g as u16 + b as u16) / 3) as u8])
    })
}

/// Load a frame from disk; colour images go through [`rgb_to_gray_mean`].
pub fn load_frame(path: impl AsRef<Path>) -> Result<::image::GrayImage, DetectError> {
    let img = ::image::open(path)?;
    Ok(if img.color().has_color() {
        rgb_to_gray_mean(&img.to_rgb8())
    } else {
        img.to_luma8()
    })
}

/// Detect markers in an `image::GrayImage`.
pub fn detect_markers(
    img: &::image::GrayImage,
    detector: &MarkerDetector,
) -> Vec<MarkerDetection> {
    detector.detect(&gray_view(img))
}

/// Run the full per-frame pipeline: markers, pose, occlusion polygons.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, analyzer), fields(width = img.width(), height = img.height()))
)]
pub fn analyze_frame(
    img: &::image::GrayImage,
    analyzer: &FrameAnalyzer,
) -> Result<FrameAnalysis, DetectError> {
    Ok(analyzer.analyze(&gray_view(img))?)
}

/// [`analyze_frame`] for an RGB frame.
pub fn analyze_rgb_frame(
    img: &::image::RgbImage,
    analyzer: &FrameAnalyzer,
) -> Result<FrameAnalysis, DetectError> {
    analyze_frame(&rgb_to_gray_mean(img), analyzer)
}
