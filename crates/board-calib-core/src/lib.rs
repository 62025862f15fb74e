//! Core types and geometry for board calibration.
//!
//! This crate is intentionally small and purely geometric. It knows nothing
//! about marker dictionaries or the robot arm; it provides:
//! - lightweight grayscale image views and sampling helpers,
//! - homography estimation (4-point exact and normalized DLT),
//! - the pinhole + Brown–Conrady camera model and board-to-pixel projection,
//! - convex polygon clipping used to build occlusion regions.

mod camera;
mod homography;
mod image;
mod logger;
mod polygon;
mod projection;

pub use camera::{CameraIntrinsics, Distortion, Pose};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{sample_bilinear, sample_mean_3x3, GrayImage, GrayImageView};
pub use polygon::{convex_intersection, signed_area, Polygon};
pub use projection::{project_point, project_points, BoardPoint, BoardProjector};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
