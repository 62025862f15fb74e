//! Square fiducial markers for the board: the embedded `DICT_4X4_50`
//! dictionary, full-frame detection, and a temporal tracker.
//!
//! Detection runs in three stages:
//! - binarize the frame (global Otsu or adaptive mean),
//! - turn dark connected components into quadrilateral candidates,
//! - sample each candidate's bit grid through a homography and match it
//!   against the dictionary in all four rotations.
//!
//! [`synthetic`] renders markers into frames for tests and demos.

mod decode;
mod detector;
mod dictionary;
mod matcher;
mod quads;
pub mod synthetic;
mod threshold;
mod tracker;

pub use decode::{decode_quad, dedup_by_id_keep_best, MarkerDetection};
pub use detector::{MarkerDetector, MarkerDetectorParams};
pub use dictionary::{builtin_dictionary, Dictionary, DICT_4X4_50};
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use quads::{find_quads, QuadCandidate};
pub use threshold::{binarize, ThresholdMode};
pub use tracker::{MarkerTracker, CONFIDENCE_GAIN, CONFIDENCE_MAX, REPORT_THRESHOLD};
