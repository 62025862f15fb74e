//! Per-square occlusion regions.
//!
//! A piece standing on a square covers, in the image, at least the region
//! that every plausible piece covers: the overlap between the projection of
//! a small quad on the square's floor and a larger quad at piece height.
//! Pixels inside that overlap are what piece-presence logic inspects.

use board_calib_core::{
    convex_intersection, BoardPoint, BoardProjector, CameraIntrinsics, Polygon, Pose,
};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Squares per board side.
pub const BOARD_SQUARES: u8 = 8;

/// Geometry of the occlusion prism, in board units relative to the square's
/// `(rank, file)` corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionParams {
    /// Floor quad spans `[bottom_min, bottom_max]` on both axes.
    pub bottom_min: f64,
    pub bottom_max: f64,
    pub bottom_height: f64,
    /// Top quad spans `[top_min, top_max]` on both axes.
    pub top_min: f64,
    pub top_max: f64,
    pub top_height: f64,
}

impl Default for OcclusionParams {
    fn default() -> Self {
        Self {
            bottom_min: 0.1,
            bottom_max: 0.9,
            bottom_height: 0.0,
            top_min: -0.2,
            top_max: 1.2,
            top_height: 1.4,
        }
    }
}

/// Occlusion region of one square.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SquareOcclusion {
    pub rank: u8,
    pub file: u8,
    pub polygon: Polygon,
}

#[derive(Clone, Debug, Default)]
pub struct OcclusionPolygonBuilder {
    params: OcclusionParams,
}

impl OcclusionPolygonBuilder {
    pub fn new(params: OcclusionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &OcclusionParams {
        &self.params
    }

    fn quad(rank: u8, file: u8, lo: f64, hi: f64, height: f64) -> [BoardPoint; 4] {
        let (r, f) = (rank as f64, file as f64);
        [
            BoardPoint::new(r + lo, f + lo, height),
            BoardPoint::new(r + lo, f + hi, height),
            BoardPoint::new(r + hi, f + hi, height),
            BoardPoint::new(r + hi, f + lo, height),
        ]
    }

    /// Floor quad of square `(rank, file)`.
    pub fn bottom_quad(&self, rank: u8, file: u8) -> [BoardPoint; 4] {
        let p = &self.params;
        Self::quad(rank, file, p.bottom_min, p.bottom_max, p.bottom_height)
    }

    /// Piece-height quad of square `(rank, file)`.
    pub fn top_quad(&self, rank: u8, file: u8) -> [BoardPoint; 4] {
        let p = &self.params;
        Self::quad(rank, file, p.top_min, p.top_max, p.top_height)
    }

    /// Occlusion polygon of one square in pixel coordinates.
    ///
    /// The ring has positive signed area; it is empty when the two projected
    /// quads do not overlap.
    pub fn build(
        &self,
        rank: u8,
        file: u8,
        pose: &Pose,
        intrinsics: &CameraIntrinsics,
    ) -> Polygon {
        let projector = BoardProjector::new(pose, intrinsics);
        self.build_with(&projector, rank, file)
    }

    fn build_with(&self, projector: &BoardProjector<'_>, rank: u8, file: u8) -> Polygon {
        let bottom: Vec<Point2<f64>> = self
            .bottom_quad(rank, file)
            .iter()
            .map(|&p| projector.project_board(p))
            .collect();
        let top: Vec<Point2<f64>> = self
            .top_quad(rank, file)
            .iter()
            .map(|&p| projector.project_board(p))
            .collect();
        convex_intersection(&bottom, &top)
    }

    /// All 64 squares, rank-major (`rank 0, file 0..8`, then rank 1, ...).
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn build_board(&self, pose: &Pose, intrinsics: &CameraIntrinsics) -> Vec<SquareOcclusion> {
        let projector = BoardProjector::new(pose, intrinsics);
        let mut out = Vec::with_capacity((BOARD_SQUARES as usize).pow(2));
        for rank in 0..BOARD_SQUARES {
            for file in 0..BOARD_SQUARES {
                out.push(SquareOcclusion {
                    rank,
                    file,
                    polygon: self.build_with(&projector, rank, file),
                });
            }
        }
        out
    }
}
