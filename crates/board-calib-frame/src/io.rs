//! JSON configuration for the per-frame pipeline.

use std::{fs, path::Path};

use board_calib_aruco::MarkerDetectorParams;
use board_calib_core::CameraIntrinsics;
use serde::{Deserialize, Serialize};

use crate::analyzer::FrameAnalyzer;
use crate::board::MarkerBoardMap;
use crate::estimator::MarkerPoseEstimator;
use crate::occlusion::{OcclusionParams, OcclusionPolygonBuilder};
use crate::pnp::PnpParams;

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Everything the frame pipeline needs besides the image.
///
/// Every field is optional in JSON; missing ones take the deployed camera
/// and board defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub intrinsics: CameraIntrinsics,
    pub markers: MarkerBoardMap,
    pub detector: MarkerDetectorParams,
    pub pnp: PnpParams,
    pub occlusion: OcclusionParams,
}

impl FrameConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn build_estimator(&self) -> MarkerPoseEstimator {
        MarkerPoseEstimator::new(self.intrinsics, self.markers.clone())
            .with_detector_params(self.detector.clone())
            .with_pnp_params(self.pnp.clone())
    }

    pub fn build_analyzer(&self) -> FrameAnalyzer {
        FrameAnalyzer::new(
            self.build_estimator(),
            OcclusionPolygonBuilder::new(self.occlusion),
        )
    }
}
