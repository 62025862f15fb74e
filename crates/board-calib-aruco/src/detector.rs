//! Full-frame marker detection: threshold → quads → decode.

use board_calib_core::GrayImageView;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::decode::{decode_quad, dedup_by_id_keep_best, MarkerDetection};
use crate::quads::find_quads;
use crate::threshold::{binarize, ThresholdMode};
use crate::{Dictionary, Matcher, DICT_4X4_50};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Tunables for [`MarkerDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerDetectorParams {
    pub threshold: ThresholdMode,
    /// Smallest accepted bounding-box side of a dark component, in pixels.
    pub min_side_px: f64,
    /// Smallest accepted `quad area / hull area`.
    pub min_quad_fill: f64,
    /// Black border width in bit cells.
    pub border_bits: usize,
    /// Fraction of border cells that must read black.
    pub min_border_score: f32,
    /// Hamming tolerance, clamped to the dictionary's correction capacity.
    pub max_hamming: u8,
}

impl Default for MarkerDetectorParams {
    fn default() -> Self {
        Self {
            threshold: ThresholdMode::Otsu,
            min_side_px: 12.0,
            min_quad_fill: 0.85,
            border_bits: 1,
            min_border_score: 0.9,
            max_hamming: DICT_4X4_50.max_correction_bits,
        }
    }
}

/// Square fiducial detector over one fixed dictionary.
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    params: MarkerDetectorParams,
    matcher: Matcher,
}

impl Default for MarkerDetector {
    fn default() -> Self {
        Self::new(MarkerDetectorParams::default())
    }
}

impl MarkerDetector {
    /// Detector for the board's `DICT_4X4_50` markers.
    pub fn new(params: MarkerDetectorParams) -> Self {
        Self::with_dictionary(DICT_4X4_50, params)
    }

    pub fn with_dictionary(dict: Dictionary, params: MarkerDetectorParams) -> Self {
        let matcher = Matcher::new(dict, params.max_hamming);
        Self { params, matcher }
    }

    pub fn params(&self) -> &MarkerDetectorParams {
        &self.params
    }

    pub fn dictionary(&self) -> Dictionary {
        self.matcher.dictionary()
    }

    /// Detect markers, one per id (best score wins), sorted by id.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect(&self, img: &GrayImageView<'_>) -> Vec<MarkerDetection> {
        if !img.is_consistent() || img.width < 3 || img.height < 3 {
            return Vec::new();
        }

        let mask = binarize(img, self.params.threshold);
        let quads = find_quads(
            &mask,
            img.width,
            img.height,
            self.params.min_side_px,
            self.params.min_quad_fill,
        );

        let decoded: Vec<MarkerDetection> = quads
            .iter()
            .filter_map(|q| {
                decode_quad(
                    img,
                    &q.corners,
                    self.params.border_bits,
                    self.params.min_border_score,
                    &self.matcher,
                )
            })
            .collect();
        debug!("{} quad candidates, {} decoded", quads.len(), decoded.len());

        dedup_by_id_keep_best(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{draw_marker, render_marker_upright};
    use board_calib_core::GrayImage;
    use nalgebra::Point2;

    #[test]
    fn finds_single_upright_marker() {
        let img = render_marker_upright(&DICT_4X4_50, 15, 10, 12).expect("render");
        let dets = MarkerDetector::default().detect(&img.view());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].id, 15);
        let mid = dets[0].midpoint();
        assert!((mid.x - 41.5).abs() < 1e-9 && (mid.y - 41.5).abs() < 1e-9);
    }

    #[test]
    fn finds_several_rotated_markers_in_one_frame() {
        let mut img = GrayImage::filled(320, 240, 235);
        let placements: [(u32, [Point2<f64>; 4]); 3] = [
            (
                6,
                [
                    Point2::new(30.0, 40.0),
                    Point2::new(95.0, 30.0),
                    Point2::new(102.0, 98.0),
                    Point2::new(36.0, 104.0),
                ],
            ),
            (
                12,
                [
                    Point2::new(260.0, 60.0),
                    Point2::new(262.0, 125.0),
                    Point2::new(196.0, 122.0),
                    Point2::new(195.0, 58.0),
                ],
            ),
            (
                9,
                [
                    Point2::new(150.0, 150.0),
                    Point2::new(205.0, 160.0),
                    Point2::new(198.0, 220.0),
                    Point2::new(140.0, 212.0),
                ],
            ),
        ];
        for (id, quad) in &placements {
            assert!(draw_marker(&mut img, &DICT_4X4_50, *id, quad));
        }

        let dets = MarkerDetector::default().detect(&img.view());
        let ids: Vec<u32> = dets.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![6, 9, 12]);

        for (id, quad) in &placements {
            let det = dets.iter().find(|d| d.id == *id).expect("detected");
            for (got, want) in det.corners.iter().zip(quad) {
                assert!(
                    (got - want).norm() < 2.0,
                    "marker {id}: corner {got:?} vs {want:?}"
                );
            }
        }
    }

    #[test]
    fn empty_frame_yields_nothing() {
        let img = GrayImage::filled(64, 48, 128);
        assert!(MarkerDetector::default().detect(&img.view()).is_empty());
    }
}
