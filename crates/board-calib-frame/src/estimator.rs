//! Board pose from the fiducial markers visible in one frame.

use std::collections::BTreeMap;

use board_calib_aruco::{MarkerDetection, MarkerDetector, MarkerDetectorParams};
use board_calib_core::{BoardProjector, CameraIntrinsics, GrayImageView, Pose};
use log::{debug, warn};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::board::MarkerBoardMap;
use crate::pnp::{solve_planar_pnp, PnpError, PnpParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Known markers required before a pose is attempted.
pub const MIN_MARKERS: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("found {found} known markers, need {required}")]
    InsufficientMarkers { found: usize, required: usize },
    #[error("pose solve failed: {0}")]
    PoseSolve(#[from] PnpError),
}

/// A solved board pose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    pub pose: Pose,
    /// RMS distance between projected marker centres and detected
    /// midpoints, in pixels.
    pub rms_px: f64,
    /// Ids of the markers used, ascending.
    pub marker_ids: Vec<u32>,
}

/// Stateless per-frame pose estimator.
///
/// Each call detects markers, pairs the known ones with their board
/// positions in ascending id order, and solves the camera pose. Nothing is
/// carried over between frames.
#[derive(Clone, Debug)]
pub struct MarkerPoseEstimator {
    intrinsics: CameraIntrinsics,
    markers: MarkerBoardMap,
    detector: MarkerDetector,
    pnp: PnpParams,
}

impl MarkerPoseEstimator {
    pub fn new(intrinsics: CameraIntrinsics, markers: MarkerBoardMap) -> Self {
        Self {
            intrinsics,
            markers,
            detector: MarkerDetector::default(),
            pnp: PnpParams::default(),
        }
    }

    pub fn with_detector_params(mut self, params: MarkerDetectorParams) -> Self {
        self.detector = MarkerDetector::new(params);
        self
    }

    pub fn with_pnp_params(mut self, params: PnpParams) -> Self {
        self.pnp = params;
        self
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn markers(&self) -> &MarkerBoardMap {
        &self.markers
    }

    pub fn detector(&self) -> &MarkerDetector {
        &self.detector
    }

    /// Detect markers in `img` and solve the board pose.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn estimate(&self, img: &GrayImageView<'_>) -> Result<PoseEstimate, PoseError> {
        let detections = self.detector.detect(img);
        debug!(
            "detected markers: {:?}",
            detections.iter().map(|d| d.id).collect::<Vec<_>>()
        );
        self.estimate_from_detections(&detections)
    }

    /// Solve the pose from detections produced elsewhere.
    ///
    /// Unknown ids are ignored; for duplicated ids the highest score wins.
    pub fn estimate_from_detections(
        &self,
        detections: &[MarkerDetection],
    ) -> Result<PoseEstimate, PoseError> {
        let mut best: BTreeMap<u32, &MarkerDetection> = BTreeMap::new();
        for det in detections.iter().filter(|d| self.markers.contains(d.id)) {
            match best.get(&det.id) {
                Some(prev) if prev.score >= det.score => {}
                _ => {
                    best.insert(det.id, det);
                }
            }
        }

        let mut marker_ids = Vec::with_capacity(best.len());
        let mut object: Vec<Point3<f64>> = Vec::with_capacity(best.len());
        let mut image: Vec<Point2<f64>> = Vec::with_capacity(best.len());
        for (id, position) in self.markers.iter() {
            if let Some(det) = best.get(&id) {
                marker_ids.push(id);
                object.push(position);
                image.push(det.midpoint());
            }
        }

        if marker_ids.len() < MIN_MARKERS {
            warn!(
                "pose skipped: {} of {} known markers visible",
                marker_ids.len(),
                self.markers.len()
            );
            return Err(PoseError::InsufficientMarkers {
                found: marker_ids.len(),
                required: MIN_MARKERS,
            });
        }

        let solution = solve_planar_pnp(&object, &image, &self.intrinsics, &self.pnp)
            .inspect_err(|e| warn!("pose solve failed: {e}"))?;
        debug!("pose from markers {marker_ids:?}: rms {:.3}px", solution.rms_px);

        Ok(PoseEstimate {
            pose: solution.pose,
            rms_px: solution.rms_px,
            marker_ids,
        })
    }

    /// Projector bound to `pose` and this estimator's camera.
    pub fn projector<'a>(&'a self, pose: &'a Pose) -> BoardProjector<'a> {
        BoardProjector::new(pose, &self.intrinsics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_calib_core::project_point;
    use nalgebra::Vector3;

    fn fake_detection(id: u32, center: Point2<f64>, score: f32) -> MarkerDetection {
        let h = 8.0;
        MarkerDetection {
            id,
            corners: [
                Point2::new(center.x - h, center.y - h),
                Point2::new(center.x + h, center.y - h),
                Point2::new(center.x + h, center.y + h),
                Point2::new(center.x - h, center.y + h),
            ],
            rotation: 0,
            hamming: 0,
            score,
            border_score: score,
            code: 0,
        }
    }

    fn overhead_pose() -> Pose {
        Pose::new(Vector3::new(0.05, -0.03, 0.02), Vector3::new(-4.0, -4.0, 13.0))
    }

    fn detections_for(est: &MarkerPoseEstimator, pose: &Pose) -> Vec<MarkerDetection> {
        est.markers()
            .iter()
            .map(|(id, p)| fake_detection(id, project_point(p, pose, est.intrinsics()), 1.0))
            .collect()
    }

    #[test]
    fn detection_order_does_not_matter() {
        let est = MarkerPoseEstimator::new(CameraIntrinsics::default(), MarkerBoardMap::default());
        let gt = overhead_pose();
        let mut dets = detections_for(&est, &gt);
        let a = est.estimate_from_detections(&dets).expect("pose");
        dets.reverse();
        let b = est.estimate_from_detections(&dets).expect("pose");

        assert_eq!(a.marker_ids, vec![6, 9, 12, 15]);
        assert_eq!(a, b);
        assert!((a.pose.tvec - gt.tvec).norm() < 1e-6);
    }

    #[test]
    fn unknown_markers_do_not_count() {
        let est = MarkerPoseEstimator::new(CameraIntrinsics::default(), MarkerBoardMap::default());
        let gt = overhead_pose();
        let mut dets: Vec<MarkerDetection> = detections_for(&est, &gt)
            .into_iter()
            .filter(|d| d.id != 9)
            .collect();
        for id in [1, 2, 3, 40] {
            dets.push(fake_detection(id, Point2::new(100.0, 100.0), 1.0));
        }
        assert_eq!(
            est.estimate_from_detections(&dets),
            Err(PoseError::InsufficientMarkers {
                found: 3,
                required: 4
            })
        );
    }

    #[test]
    fn duplicate_ids_keep_best_score() {
        let est = MarkerPoseEstimator::new(CameraIntrinsics::default(), MarkerBoardMap::default());
        let gt = overhead_pose();
        let mut dets = detections_for(&est, &gt);
        dets.push(fake_detection(12, Point2::new(5.0, 5.0), 0.4));
        let estimate = est.estimate_from_detections(&dets).expect("pose");
        assert!(estimate.rms_px < 1e-6);
    }

    #[test]
    fn collinear_marker_map_fails_the_solve() {
        let markers: MarkerBoardMap = (0..4)
            .map(|i| (10 + i, Point3::new(1.0 + 2.0 * i as f64, 4.0, 0.0)))
            .collect();
        let est = MarkerPoseEstimator::new(CameraIntrinsics::default(), markers);
        let dets: Vec<MarkerDetection> = (0..4)
            .map(|i| fake_detection(10 + i, Point2::new(200.0 + 60.0 * i as f64, 240.0), 1.0))
            .collect();
        assert_eq!(
            est.estimate_from_detections(&dets),
            Err(PoseError::PoseSolve(PnpError::CollinearPoints))
        );
    }

    #[test]
    fn closed_loop_reprojection() {
        let est = MarkerPoseEstimator::new(CameraIntrinsics::default(), MarkerBoardMap::default());
        let gt = Pose::new(Vector3::new(-0.3, 0.1, 0.03), Vector3::new(-4.2, -4.5, 12.0));
        let dets = detections_for(&est, &gt);
        let estimate = est.estimate_from_detections(&dets).expect("pose");
        let projector = est.projector(&estimate.pose);
        for det in &dets {
            let p = est.markers().get(det.id).expect("known id");
            assert!((projector.project(p) - det.midpoint()).norm() < 1e-3);
        }
    }
}
