//! Convex polygon clipping in pixel space.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Tolerance, in squared pixels, for "on the clip edge".
const EDGE_EPS: f64 = 1e-9;

/// Ordered vertex ring in pixel coordinates.
///
/// Rings produced by [`convex_intersection`] have positive signed area
/// (counter-clockwise in a y-up frame). An empty ring means "no region".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    pub vertices: Vec<Point2<f64>>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point2<f64>>) -> Self {
        Self { vertices }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Unsigned enclosed area in square pixels.
    pub fn area(&self) -> f64 {
        signed_area(&self.vertices).abs()
    }

    /// Axis-aligned `(min, max)` corners, `None` for an empty ring.
    pub fn bounding_box(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let first = self.vertices.first()?;
        let mut lo = *first;
        let mut hi = *first;
        for p in &self.vertices[1..] {
            lo.x = lo.x.min(p.x);
            lo.y = lo.y.min(p.y);
            hi.x = hi.x.max(p.x);
            hi.y = hi.y.max(p.y);
        }
        Some((lo, hi))
    }

    /// Even-odd point-in-polygon test. Works for any simple ring.
    pub fn contains(&self, p: Point2<f64>) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Number of pixels of a `width x height` image whose centres fall
    /// inside the ring. Pixel `(x, y)` is centred on integer coordinates.
    pub fn pixel_count(&self, width: usize, height: usize) -> usize {
        let Some((lo, hi)) = self.bounding_box() else {
            return 0;
        };
        if width == 0 || height == 0 || hi.x < 0.0 || hi.y < 0.0 {
            return 0;
        }
        let x0 = lo.x.ceil().max(0.0) as usize;
        let y0 = lo.y.ceil().max(0.0) as usize;
        let x1 = (hi.x.floor() as usize).min(width - 1);
        let y1 = (hi.y.floor() as usize).min(height - 1);

        let mut count = 0;
        for y in y0..=y1 {
            for x in x0..=x1 {
                if self.contains(Point2::new(x as f64, y as f64)) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Intersection with another convex ring.
    pub fn intersect(&self, other: &Polygon) -> Polygon {
        convex_intersection(&self.vertices, &other.vertices)
    }
}

/// Shoelace signed area; positive for counter-clockwise rings (y-up).
pub fn signed_area(ring: &[Point2<f64>]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

#[inline]
fn cross(a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn positively_oriented(ring: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut out = ring.to_vec();
    if signed_area(&out) < 0.0 {
        out.reverse();
    }
    out
}

/// Intersection of two convex rings (Sutherland–Hodgman).
///
/// Either input may be wound either way. The result has positive signed area,
/// or is empty when the rings are disjoint, touch only along an edge or
/// vertex, or either input is degenerate.
pub fn convex_intersection(subject: &[Point2<f64>], clip: &[Point2<f64>]) -> Polygon {
    if subject.len() < 3 || clip.len() < 3 {
        return Polygon::empty();
    }
    if signed_area(subject).abs() <= EDGE_EPS || signed_area(clip).abs() <= EDGE_EPS {
        return Polygon::empty();
    }

    let clip = positively_oriented(clip);
    let mut output = positively_oriented(subject);

    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let a = clip[i];
        let edge = clip[(i + 1) % clip.len()] - a;
        let side = |p: Point2<f64>| cross(edge, p - a);

        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        let mut prev_side = side(prev);
        for &cur in &input {
            let cur_side = side(cur);
            let cur_in = cur_side >= -EDGE_EPS;
            let prev_in = prev_side >= -EDGE_EPS;
            if cur_in != prev_in {
                let t = prev_side / (prev_side - cur_side);
                output.push(prev + (cur - prev) * t);
            }
            if cur_in {
                output.push(cur);
            }
            prev = cur;
            prev_side = cur_side;
        }
    }

    output.dedup_by(|a, b| (*a - *b).norm_squared() <= EDGE_EPS);
    while output.len() > 1 {
        let (first, last) = (output[0], output[output.len() - 1]);
        if (first - last).norm_squared() <= EDGE_EPS {
            output.pop();
        } else {
            break;
        }
    }

    if output.len() < 3 || signed_area(&output) <= EDGE_EPS {
        return Polygon::empty();
    }
    Polygon::new(output)
}
