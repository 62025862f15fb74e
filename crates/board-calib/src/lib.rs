//! Vision and calibration for a chess-playing robot arm.
//!
//! This crate re-exports the workspace crates under short names and, with the
//! `image` feature, adds helpers that run the per-frame pipeline on
//! `image::GrayImage` / `image::RgbImage` buffers.
//!
//! ## Quickstart
//!
//! ```no_run
//! use board_calib::{detect, frame::FrameConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let frame = detect::load_frame("frame.png")?;
//! let analyzer = FrameConfig::default().build_analyzer();
//! let analysis = detect::analyze_frame(&frame, &analyzer)?;
//! for square in &analysis.squares {
//!     println!("{}{}: {} px²", square.rank, square.file, square.polygon.area());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `board_calib::core`: image views, camera model, projection, polygon clipping.
//! - `board_calib::aruco`: marker dictionary, detector and tracker.
//! - `board_calib::frame`: board pose estimation and occlusion polygons.
//! - `board_calib::arm`: arm kinematic calibration.
//! - `board_calib::detect` (feature `image`): helpers over `image` buffers.

pub use board_calib_arm as arm;
pub use board_calib_aruco as aruco;
pub use board_calib_core as core;
pub use board_calib_frame as frame;

pub use board_calib_arm::{KinematicCalibrator, KinematicParams, SampleTable};
pub use board_calib_core::{BoardProjector, CameraIntrinsics, Polygon, Pose};
pub use board_calib_frame::{
    FrameAnalysis, FrameAnalyzer, FrameConfig, MarkerPoseEstimator, OcclusionPolygonBuilder,
    PoseError,
};

#[cfg(feature = "image")]
pub mod detect;
