//! Marker decoding from image quads.

use std::collections::HashMap;

use board_calib_core::{homography_from_4pt, sample_bilinear, GrayImageView, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::threshold::otsu_threshold_from_samples;
use crate::Matcher;

/// Sub-sample offsets inside one bit cell, as a fraction of the cell side.
const CELL_TAPS: [f64; 3] = [0.3, 0.5, 0.7];

/// One decoded marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub id: u32,
    /// Image corners in marker order: the dictionary's top-left corner first,
    /// then clockwise on screen.
    pub corners: [Point2<f64>; 4],
    /// Quarter turns between the observed quad order and marker order.
    pub rotation: u8,
    pub hamming: u8,
    /// `border_score * (1 - hamming / bits)`, in `[0, 1]`.
    pub score: f32,
    pub border_score: f32,
    /// Observed inner bits as read from the quad (row-major, white = 1).
    pub code: u64,
}

impl MarkerDetection {
    /// Mean of the four corners; used as the marker's image position.
    pub fn midpoint(&self) -> Point2<f64> {
        let sum = self
            .corners
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, c| acc + c.coords);
        Point2::from(sum / 4.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct MarkerObservation {
    code: u64,
    border_score: f32,
}

/// Canonical marker square, `cells` units per side, corners clockwise on
/// screen starting top-left.
pub(crate) fn canonical_corners(cells: usize) -> [Point2<f64>; 4] {
    let s = cells as f64;
    [
        Point2::new(0.0, 0.0),
        Point2::new(s, 0.0),
        Point2::new(s, s),
        Point2::new(0.0, s),
    ]
}

/// Mean intensity of every bit cell (border included), row-major.
fn sample_cells(img: &GrayImageView<'_>, h: &Homography, cells: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(cells * cells);
    for cy in 0..cells {
        for cx in 0..cells {
            let mut acc = 0.0f32;
            for ty in CELL_TAPS {
                for tx in CELL_TAPS {
                    let q = h.apply(Point2::new(cx as f64 + tx, cy as f64 + ty));
                    if q.x < 0.0
                        || q.y < 0.0
                        || q.x > (img.width - 1) as f64
                        || q.y > (img.height - 1) as f64
                    {
                        return None;
                    }
                    acc += sample_bilinear(img, q.x as f32, q.y as f32);
                }
            }
            let n = (CELL_TAPS.len() * CELL_TAPS.len()) as f32;
            out.push((acc / n).round().clamp(0.0, 255.0) as u8);
        }
    }
    Some(out)
}

fn decode_samples(
    samples: &[u8],
    cells: usize,
    bits: usize,
    border: usize,
    min_border_score: f32,
) -> Option<MarkerObservation> {
    if samples.len() != cells * cells {
        return None;
    }
    let thr = otsu_threshold_from_samples(samples);

    let mut border_black = 0u32;
    let mut border_total = 0u32;
    let mut code = 0u64;
    for cy in 0..cells {
        for cx in 0..cells {
            let is_black = samples[cy * cells + cx] <= thr;
            let is_border = cx < border || cy < border || cx + border >= cells || cy + border >= cells;
            if is_border {
                border_total += 1;
                if is_black {
                    border_black += 1;
                }
            } else if !is_black {
                code |= 1u64 << ((cy - border) * bits + (cx - border));
            }
        }
    }

    let border_score = if border_total > 0 {
        border_black as f32 / border_total as f32
    } else {
        1.0
    };
    (border_score >= min_border_score).then_some(MarkerObservation { code, border_score })
}

/// Decode one candidate quad.
///
/// `quad` must be clockwise on screen; the returned corners are re-ordered
/// so that the first one is the marker's own top-left corner.
pub fn decode_quad(
    img: &GrayImageView<'_>,
    quad: &[Point2<f64>; 4],
    border_bits: usize,
    min_border_score: f32,
    matcher: &Matcher,
) -> Option<MarkerDetection> {
    let bits = matcher.dictionary().marker_size;
    let cells = bits + 2 * border_bits;
    if bits * bits > 64 || cells == 0 || img.width < 2 || img.height < 2 {
        return None;
    }

    let h = homography_from_4pt(&canonical_corners(cells), quad)?;
    let samples = sample_cells(img, &h, cells)?;
    let obs = decode_samples(&samples, cells, bits, border_bits, min_border_score)?;
    let m = matcher.match_code(obs.code)?;

    let bit_count = matcher.dictionary().bit_count().max(1) as f32;
    let score = (obs.border_score * (1.0 - m.hamming as f32 / bit_count)).clamp(0.0, 1.0);
    let rot = m.rotation as usize;
    let corners = std::array::from_fn(|i| quad[(i + rot) % 4]);

    Some(MarkerDetection {
        id: m.id,
        corners,
        rotation: m.rotation,
        hamming: m.hamming,
        score,
        border_score: obs.border_score,
        code: obs.code,
    })
}

/// Keep the best-scoring detection per id, sorted by ascending id.
pub fn dedup_by_id_keep_best(dets: Vec<MarkerDetection>) -> Vec<MarkerDetection> {
    let mut best: HashMap<u32, MarkerDetection> = HashMap::new();
    for d in dets {
        match best.get(&d.id) {
            Some(prev) if prev.score >= d.score => {}
            _ => {
                best.insert(d.id, d);
            }
        }
    }
    let mut out: Vec<MarkerDetection> = best.into_values().collect();
    out.sort_by_key(|d| d.id);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::render_marker_upright;
    use crate::{rotate_code_u64, DICT_4X4_50};

    fn upright_quad(offset: f64, side: f64) -> [Point2<f64>; 4] {
        [
            Point2::new(offset, offset),
            Point2::new(offset + side, offset),
            Point2::new(offset + side, offset + side),
            Point2::new(offset, offset + side),
        ]
    }

    #[test]
    fn decodes_upright_marker() {
        let matcher = Matcher::new(DICT_4X4_50, 1);
        let img = render_marker_upright(&DICT_4X4_50, 7, 8, 10).expect("render");
        // marker spans pixel centres 10..=57, edges at 9.5 and 57.5
        let quad = upright_quad(9.5, 48.0);
        let det = decode_quad(&img.view(), &quad, 1, 0.9, &matcher).expect("decode");
        assert_eq!(det.id, 7);
        assert_eq!(det.rotation, 0);
        assert_eq!(det.hamming, 0);
        assert_eq!(det.code, DICT_4X4_50.codes[7]);
        assert!((det.midpoint() - Point2::new(33.5, 33.5)).norm() < 1e-9);
    }

    #[test]
    fn quad_starting_elsewhere_is_reordered() {
        let matcher = Matcher::new(DICT_4X4_50, 1);
        let img = render_marker_upright(&DICT_4X4_50, 3, 8, 10).expect("render");
        let upright = upright_quad(9.5, 48.0);
        // same square, listed from the top-right corner
        let shifted = [upright[1], upright[2], upright[3], upright[0]];
        let det = decode_quad(&img.view(), &shifted, 1, 0.9, &matcher).expect("decode");
        assert_eq!(det.id, 3);
        assert_eq!(det.corners, upright);
        assert_eq!(
            rotate_code_u64(DICT_4X4_50.codes[3], 4, det.rotation),
            det.code
        );
    }

    #[test]
    fn blank_square_does_not_decode() {
        let matcher = Matcher::new(DICT_4X4_50, 1);
        let mut img = board_calib_core::GrayImage::filled(60, 60, 255);
        for y in 10..50 {
            for x in 10..50 {
                img.put(x, y, 0);
            }
        }
        let quad = upright_quad(9.5, 40.0);
        assert!(decode_quad(&img.view(), &quad, 1, 0.9, &matcher).is_none());
    }

    #[test]
    fn dedup_keeps_best_score() {
        let mk = |id, score| MarkerDetection {
            id,
            corners: upright_quad(0.0, 1.0),
            rotation: 0,
            hamming: 0,
            score,
            border_score: score,
            code: 0,
        };
        let out = dedup_by_id_keep_best(vec![mk(9, 0.5), mk(6, 0.9), mk(9, 0.8)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, 6);
        assert_eq!((out[1].id, out[1].score), (9, 0.8));
    }
}
