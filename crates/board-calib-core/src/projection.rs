//! Board-frame → pixel projection.
//!
//! Board units are chess squares: the 9x9 grid of square corners spans
//! `rank, file ∈ [0, 8]`, with height measured in the same unit above the
//! board plane. The board frame uses `x = file`, `y = rank`, `z = height`.

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraIntrinsics, Pose};

/// A point on (or above) the board in board units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardPoint {
    pub rank: f64,
    pub file: f64,
    pub height: f64,
}

impl BoardPoint {
    pub const fn new(rank: f64, file: f64, height: f64) -> Self {
        Self { rank, file, height }
    }

    /// Board-frame coordinates `(file, rank, height)`.
    #[inline]
    pub fn to_board_frame(self) -> Point3<f64> {
        Point3::new(self.file, self.rank, self.height)
    }
}

impl From<BoardPoint> for Point3<f64> {
    fn from(p: BoardPoint) -> Self {
        p.to_board_frame()
    }
}

/// Project one board-frame point into pixels.
///
/// Same model as OpenCV `projectPoints`: rigid transform, perspective divide,
/// radial + tangential distortion, then the intrinsic matrix. Points behind
/// the camera are projected without complaint.
#[inline]
pub fn project_point(p: Point3<f64>, pose: &Pose, intrinsics: &CameraIntrinsics) -> Point2<f64> {
    intrinsics.project_camera_point(pose.transform(p))
}

pub fn project_points(
    points: &[Point3<f64>],
    pose: &Pose,
    intrinsics: &CameraIntrinsics,
) -> Vec<Point2<f64>> {
    let rot = pose.rotation();
    points
        .iter()
        .map(|&p| intrinsics.project_camera_point(rot * p + pose.tvec))
        .collect()
}

/// A pose paired with the camera it was estimated for.
///
/// Built fresh for every frame; it is a view over one pose, not a cache.
#[derive(Clone, Copy, Debug)]
pub struct BoardProjector<'a> {
    pose: &'a Pose,
    intrinsics: &'a CameraIntrinsics,
}

impl<'a> BoardProjector<'a> {
    pub fn new(pose: &'a Pose, intrinsics: &'a CameraIntrinsics) -> Self {
        Self { pose, intrinsics }
    }

    pub fn pose(&self) -> &Pose {
        self.pose
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        self.intrinsics
    }

    #[inline]
    pub fn project(&self, p: Point3<f64>) -> Point2<f64> {
        project_point(p, self.pose, self.intrinsics)
    }

    #[inline]
    pub fn project_board(&self, p: BoardPoint) -> Point2<f64> {
        self.project(p.to_board_frame())
    }

    pub fn project_many(&self, points: &[Point3<f64>]) -> Vec<Point2<f64>> {
        project_points(points, self.pose, self.intrinsics)
    }
}
