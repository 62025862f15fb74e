//! Quadrilateral marker candidates from a dark-pixel mask.
//!
//! Each 4-connected dark component is reduced to the convex hull of its
//! pixel squares, and the hull to four corners. Components touching the
//! frame border or smaller than the minimum side are skipped, as are hulls a
//! quadrilateral does not fill well (blobs, pieces, shadows).

use board_calib_core::signed_area;
use nalgebra::Point2;

/// A candidate quad, corners clockwise on screen (positive signed area in
/// y-down image coordinates).
#[derive(Clone, Debug)]
pub struct QuadCandidate {
    pub corners: [Point2<f64>; 4],
    /// Quad area divided by hull area, in `(0, 1]`.
    pub fill: f64,
    pub pixel_count: usize,
}

/// Bounding box and row extents of one component.
struct Component {
    touches_border: bool,
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
    pixel_count: usize,
    /// Per row: (y, leftmost x, rightmost x).
    rows: Vec<(usize, usize, usize)>,
}

fn label_components(mask: &[bool], width: usize, height: usize) -> Vec<Component> {
    let mut visited = vec![false; mask.len()];
    let mut stack = Vec::new();
    let mut out = Vec::new();
    let mut row_ext: Vec<(usize, usize)> = vec![(usize::MAX, 0); height];

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);

        let mut comp = Component {
            touches_border: false,
            min_x: usize::MAX,
            max_x: 0,
            min_y: usize::MAX,
            max_y: 0,
            pixel_count: 0,
            rows: Vec::new(),
        };

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % width, idx / width);
            comp.pixel_count += 1;
            comp.min_x = comp.min_x.min(x);
            comp.max_x = comp.max_x.max(x);
            comp.min_y = comp.min_y.min(y);
            comp.max_y = comp.max_y.max(y);
            if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                comp.touches_border = true;
            }
            let ext = &mut row_ext[y];
            ext.0 = ext.0.min(x);
            ext.1 = ext.1.max(x);

            let mut visit = |n: usize| {
                if mask[n] && !visited[n] {
                    visited[n] = true;
                    stack.push(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < width {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - width);
            }
            if y + 1 < height {
                visit(idx + width);
            }
        }

        for (y, ext) in row_ext
            .iter_mut()
            .enumerate()
            .take(comp.max_y + 1)
            .skip(comp.min_y)
        {
            if ext.0 != usize::MAX {
                comp.rows.push((y, ext.0, ext.1));
            }
            *ext = (usize::MAX, 0);
        }
        out.push(comp);
    }
    out
}

#[inline]
fn cross(o: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Andrew's monotone chain. Collinear points are dropped.
pub(crate) fn convex_hull(mut pts: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Point2<f64>> = Vec::with_capacity(2 * pts.len());
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Four hull vertices spanning the largest quad found by a farthest-point
/// construction: the farthest pair is taken as one diagonal, the two other
/// corners are the vertices farthest from it on either side.
pub(crate) fn quad_from_hull(hull: &[Point2<f64>]) -> Option<[Point2<f64>; 4]> {
    if hull.len() < 4 {
        return None;
    }

    let mut best = (0usize, 0usize, -1.0f64);
    for i in 0..hull.len() {
        for j in (i + 1)..hull.len() {
            let d = (hull[i] - hull[j]).norm_squared();
            if d > best.2 {
                best = (i, j, d);
            }
        }
    }
    let (a, b) = (hull[best.0], hull[best.1]);

    let mut left: Option<(Point2<f64>, f64)> = None;
    let mut right: Option<(Point2<f64>, f64)> = None;
    for &p in hull {
        let s = cross(a, b, p);
        if s > 0.0 && left.map_or(true, |(_, v)| s > v) {
            left = Some((p, s));
        } else if s < 0.0 && right.map_or(true, |(_, v)| -s > v) {
            right = Some((p, -s));
        }
    }
    let (c, _) = left?;
    let (d, _) = right?;

    let mut quad = [a, c, b, d];
    if signed_area(&quad) < 0.0 {
        quad.swap(1, 3);
    }
    Some(quad)
}

/// Extract quad candidates from a dark mask of a `width x height` frame.
pub fn find_quads(
    mask: &[bool],
    width: usize,
    height: usize,
    min_side_px: f64,
    min_quad_fill: f64,
) -> Vec<QuadCandidate> {
    if mask.len() != width * height || width == 0 || height == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for comp in label_components(mask, width, height) {
        if comp.touches_border {
            continue;
        }
        let w = (comp.max_x - comp.min_x + 1) as f64;
        let h = (comp.max_y - comp.min_y + 1) as f64;
        if w.min(h) < min_side_px {
            continue;
        }

        // Outer corners of the extreme pixel squares on every row. Pixel
        // centres sit on integer coordinates, so pixel (x, y) spans
        // [x - 0.5, x + 0.5] x [y - 0.5, y + 0.5].
        let mut pts = Vec::with_capacity(comp.rows.len() * 4);
        for &(y, x0, x1) in &comp.rows {
            let (top, bottom) = (y as f64 - 0.5, y as f64 + 0.5);
            let (left, right) = (x0 as f64 - 0.5, x1 as f64 + 0.5);
            pts.extend([
                Point2::new(left, top),
                Point2::new(left, bottom),
                Point2::new(right, top),
                Point2::new(right, bottom),
            ]);
        }
        let hull = convex_hull(pts);
        let hull_area = signed_area(&hull).abs();
        if hull_area <= 0.0 {
            continue;
        }
        let Some(corners) = quad_from_hull(&hull) else {
            continue;
        };
        let fill = signed_area(&corners) / hull_area;
        if fill < min_quad_fill {
            continue;
        }
        out.push(QuadCandidate {
            corners,
            fill,
            pixel_count: comp.pixel_count,
        });
    }
    out
}
