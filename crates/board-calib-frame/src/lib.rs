//! Board pose and occlusion regions for a single camera frame.
//!
//! [`MarkerPoseEstimator`] finds the known fiducial markers, pairs them with
//! their board coordinates and solves the camera pose with a planar PnP.
//! [`OcclusionPolygonBuilder`] then projects a floor quad and a piece-height
//! quad for every square and keeps their overlap, the pixels a piece on that
//! square is certain to cover.
//!
//! ```no_run
//! use board_calib_core::GrayImage;
//! use board_calib_frame::FrameConfig;
//!
//! let analyzer = FrameConfig::default().build_analyzer();
//! let frame = GrayImage::filled(640, 480, 0);
//! match analyzer.analyze(&frame.view()) {
//!     Ok(analysis) => println!("{} squares visible", analysis.visible_squares()),
//!     Err(e) => eprintln!("no pose: {e}"),
//! }
//! ```

mod analyzer;
mod board;
mod estimator;
mod io;
mod occlusion;
mod pnp;

pub use analyzer::{FrameAnalysis, FrameAnalyzer};
pub use board::MarkerBoardMap;
pub use estimator::{MarkerPoseEstimator, PoseError, PoseEstimate, MIN_MARKERS};
pub use io::{ConfigIoError, FrameConfig};
pub use occlusion::{OcclusionParams, OcclusionPolygonBuilder, SquareOcclusion, BOARD_SQUARES};
pub use pnp::{
    reprojection_rms, solve_planar_pnp, PnpError, PnpParams, PnpSolution, MIN_PNP_POINTS,
};
