//! Temporal smoothing of marker detections across frames.
//!
//! A marker has to be seen in a few consecutive frames before it is trusted,
//! and survives a few missed frames before it is forgotten. The caller owns
//! the tracker; pose estimation never uses one implicitly.

use std::collections::BTreeMap;

use crate::MarkerDetection;

/// Confidence added when a marker is detected in a frame.
pub const CONFIDENCE_GAIN: u8 = 5;
/// Confidence ceiling.
pub const CONFIDENCE_MAX: u8 = 20;
/// Markers strictly above this confidence are reported.
pub const REPORT_THRESHOLD: u8 = 10;

#[derive(Clone, Debug)]
struct Track {
    confidence: u8,
    last: MarkerDetection,
}

#[derive(Clone, Debug, Default)]
pub struct MarkerTracker {
    tracks: BTreeMap<u32, Track>,
}

impl MarkerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame of detections and return the trusted markers in
    /// ascending id order, each with its most recent corners.
    ///
    /// Every track loses one confidence point per frame; detected ones first
    /// gain [`CONFIDENCE_GAIN`] (capped at [`CONFIDENCE_MAX`]). Tracks that
    /// reach zero are dropped.
    pub fn update(&mut self, detections: &[MarkerDetection]) -> Vec<MarkerDetection> {
        for det in detections {
            let track = self.tracks.entry(det.id).or_insert_with(|| Track {
                confidence: 0,
                last: det.clone(),
            });
            track.last = det.clone();
            track.confidence = (track.confidence + CONFIDENCE_GAIN).min(CONFIDENCE_MAX);
        }
        for track in self.tracks.values_mut() {
            track.confidence = track.confidence.saturating_sub(1);
        }
        self.tracks.retain(|_, t| t.confidence > 0);

        self.tracks
            .values()
            .filter(|t| t.confidence > REPORT_THRESHOLD)
            .map(|t| t.last.clone())
            .collect()
    }

    pub fn confidence(&self, id: u32) -> Option<u8> {
        self.tracks.get(&id).map(|t| t.confidence)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}
