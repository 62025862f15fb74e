//! One-call frame analysis: pose plus the 64 occlusion polygons.

use board_calib_core::GrayImageView;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::estimator::{MarkerPoseEstimator, PoseError, PoseEstimate};
use crate::occlusion::{OcclusionPolygonBuilder, SquareOcclusion};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Result of analysing a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub estimate: PoseEstimate,
    /// Rank-major; polygons may be empty.
    pub squares: Vec<SquareOcclusion>,
}

impl FrameAnalysis {
    pub fn square(&self, rank: u8, file: u8) -> Option<&SquareOcclusion> {
        self.squares
            .iter()
            .find(|s| s.rank == rank && s.file == file)
    }

    /// Number of squares whose occlusion region is non-empty.
    pub fn visible_squares(&self) -> usize {
        self.squares.iter().filter(|s| !s.polygon.is_empty()).count()
    }
}

#[derive(Clone, Debug)]
pub struct FrameAnalyzer {
    estimator: MarkerPoseEstimator,
    occlusion: OcclusionPolygonBuilder,
}

impl FrameAnalyzer {
    pub fn new(estimator: MarkerPoseEstimator, occlusion: OcclusionPolygonBuilder) -> Self {
        Self {
            estimator,
            occlusion,
        }
    }

    pub fn estimator(&self) -> &MarkerPoseEstimator {
        &self.estimator
    }

    pub fn occlusion(&self) -> &OcclusionPolygonBuilder {
        &self.occlusion
    }

    /// Estimate the board pose in `img` and build every square's region.
    ///
    /// Nothing is cached: a frame where the pose fails yields the error and
    /// no polygons, even if the previous frame succeeded.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn analyze(&self, img: &GrayImageView<'_>) -> Result<FrameAnalysis, PoseError> {
        let estimate = self.estimator.estimate(img)?;
        let squares = self
            .occlusion
            .build_board(&estimate.pose, self.estimator.intrinsics());
        let analysis = FrameAnalysis { estimate, squares };
        debug!(
            "frame analysed: {} of {} squares visible",
            analysis.visible_squares(),
            analysis.squares.len()
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::MarkerBoardMap;
    use board_calib_core::{CameraIntrinsics, GrayImage};

    #[test]
    fn blank_frame_reports_missing_markers() {
        let analyzer = FrameAnalyzer::new(
            MarkerPoseEstimator::new(CameraIntrinsics::default(), MarkerBoardMap::default()),
            OcclusionPolygonBuilder::default(),
        );
        let img = GrayImage::filled(64, 48, 200);
        let err = analyzer.analyze(&img.view()).unwrap_err();
        assert_eq!(
            err,
            PoseError::InsufficientMarkers {
                found: 0,
                required: 4
            }
        );
    }
}
