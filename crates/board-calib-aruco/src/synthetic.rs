//! Rendering dictionary markers into synthetic frames.
//!
//! Used by tests and demos to produce frames with known ground truth. Pixel
//! centres sit on integer coordinates, matching the detector and the camera
//! projection.

use board_calib_core::{homography_from_4pt, GrayImage};
use nalgebra::Point2;

use crate::decode::canonical_corners;
use crate::Dictionary;

const BORDER_BITS: usize = 1;

/// Colour of one cell of the bordered marker grid, `None` if `id` is not in
/// the dictionary. Cells are indexed including the one-cell black border.
pub fn marker_cell_is_white(dict: &Dictionary, id: u32, cx: usize, cy: usize) -> Option<bool> {
    let code = dict.code(id)?;
    let cells = dict.marker_size + 2 * BORDER_BITS;
    if cx >= cells || cy >= cells {
        return Some(true);
    }
    let border = cx < BORDER_BITS
        || cy < BORDER_BITS
        || cx + BORDER_BITS >= cells
        || cy + BORDER_BITS >= cells;
    if border {
        return Some(false);
    }
    Some(dict.bit(code, cx - BORDER_BITS, cy - BORDER_BITS))
}

/// Axis-aligned marker on a white background, `cell_px` pixels per bit cell
/// and `margin` white pixels on every side.
pub fn render_marker_upright(
    dict: &Dictionary,
    id: u32,
    cell_px: usize,
    margin: usize,
) -> Option<GrayImage> {
    dict.code(id)?;
    let cells = dict.marker_size + 2 * BORDER_BITS;
    let side = cells * cell_px + 2 * margin;
    let mut img = GrayImage::filled(side, side, 255);
    for cy in 0..cells {
        for cx in 0..cells {
            let value = if marker_cell_is_white(dict, id, cx, cy)? {
                255
            } else {
                0
            };
            for yy in 0..cell_px {
                for xx in 0..cell_px {
                    let x = margin + cx * cell_px + xx;
                    let y = margin + cy * cell_px + yy;
                    img.put(x as i64, y as i64, value);
                }
            }
        }
    }
    Some(img)
}

/// Paint a marker onto `img` so that its top-left corner lands on
/// `corners[0]` and the rest follow clockwise on screen.
///
/// Returns `false` when the id is unknown or the corners are degenerate.
pub fn draw_marker(
    img: &mut GrayImage,
    dict: &Dictionary,
    id: u32,
    corners: &[Point2<f64>; 4],
) -> bool {
    if dict.code(id).is_none() {
        return false;
    }
    let cells = dict.marker_size + 2 * BORDER_BITS;
    let Some(to_marker) = homography_from_4pt(corners, &canonical_corners(cells)) else {
        return false;
    };

    let (mut lo_x, mut lo_y) = (f64::INFINITY, f64::INFINITY);
    let (mut hi_x, mut hi_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for c in corners {
        lo_x = lo_x.min(c.x);
        lo_y = lo_y.min(c.y);
        hi_x = hi_x.max(c.x);
        hi_y = hi_y.max(c.y);
    }
    let x0 = lo_x.floor().max(0.0) as i64;
    let y0 = lo_y.floor().max(0.0) as i64;
    let x1 = hi_x.ceil().min(img.width as f64) as i64;
    let y1 = hi_y.ceil().min(img.height as f64) as i64;

    let s = cells as f64;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let q = to_marker.apply(Point2::new(x as f64, y as f64));
            if !(0.0..s).contains(&q.x) || !(0.0..s).contains(&q.y) {
                continue;
            }
            let white = marker_cell_is_white(dict, id, q.x as usize, q.y as usize).unwrap_or(true);
            img.put(x, y, if white { 255 } else { 0 });
        }
    }
    true
}
