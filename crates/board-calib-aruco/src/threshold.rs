//! Image binarization for marker candidate search and bit decoding.

use board_calib_core::GrayImageView;
use serde::{Deserialize, Serialize};

/// How the frame is split into dark and light pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdMode {
    /// One Otsu threshold for the whole frame.
    Otsu,
    /// Pixel is dark when below the mean of its `window x window`
    /// neighbourhood minus `offset`.
    Adaptive { window: usize, offset: f32 },
}

impl Default for ThresholdMode {
    fn default() -> Self {
        Self::Otsu
    }
}

fn otsu_from_histogram(hist: &[u32; 256], total: u64) -> u8 {
    let mut sum_total = 0f64;
    for (i, &h) in hist.iter().enumerate() {
        sum_total += (i as f64) * (h as f64);
    }

    let total = total as f64;
    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += (t as f64) * (h as f64);
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

/// Otsu threshold of a sample set. Values `<= t` belong to the dark class.
///
/// Constant input returns its value; two-level input returns the midpoint.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let mut hist = [0u32; 256];
    let mut min_v = 255u8;
    let mut max_v = 0u8;
    for &v in samples {
        hist[v as usize] += 1;
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    if min_v == max_v {
        return min_v;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    otsu_from_histogram(&hist, samples.len() as u64)
}

/// Dark-pixel mask of a frame, row-major, `true` = dark.
pub fn binarize(img: &GrayImageView<'_>, mode: ThresholdMode) -> Vec<bool> {
    match mode {
        ThresholdMode::Otsu => {
            let t = otsu_threshold_from_samples(img.data);
            img.data.iter().map(|&v| v <= t).collect()
        }
        ThresholdMode::Adaptive { window, offset } => adaptive_mask(img, window, offset),
    }
}

fn adaptive_mask(img: &GrayImageView<'_>, window: usize, offset: f32) -> Vec<bool> {
    let (w, h) = (img.width, img.height);
    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row = 0u64;
        for x in 0..w {
            row += img.data[y * w + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    let r = (window.max(3) / 2) as isize;
    let mut out = vec![false; w * h];
    for y in 0..h {
        let y0 = (y as isize - r).max(0) as usize;
        let y1 = ((y as isize + r + 1) as usize).min(h);
        for x in 0..w {
            let x0 = (x as isize - r).max(0) as usize;
            let x1 = ((x as isize + r + 1) as usize).min(w);
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let area = ((x1 - x0) * (y1 - y0)) as f32;
            let mean = sum as f32 / area;
            out[y * w + x] = (img.data[y * w + x] as f32) < mean - offset;
        }
    }
    out
}
