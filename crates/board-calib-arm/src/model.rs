//! Planar forward kinematics of the two-link arm.
//!
//! Both links point along the negative local x axis when their joint angle
//! is zero, and each joint rotates its link by `-θ`:
//!
//! ```text
//! claw = R(-θ1) · (link1 + R(-θ2) · link2),   link_i = (-L_i, 0)
//! ```
//!
//! With `v = link1 + R(-θ2)·link2 = (-L1 - L2·cos θ2, L2·sin θ2)` the claw is
//! `(cos θ1·vx + sin θ1·vy, -sin θ1·vx + cos θ1·vy)`, which gives the closed
//! form partial derivatives used by [`ArmModel::claw_jacobian`].

use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Length of each arm link, in board-frame metres.
pub const LINK_LENGTH: f64 = 0.29;

/// Weight of the `‖(tx, ty)‖` penalty in the calibration loss.
pub const REGULARIZATION: f64 = 0.01;

/// Link lengths and loss weighting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmModel {
    pub link_lengths: [f64; 2],
    pub regularization: f64,
}

impl Default for ArmModel {
    fn default() -> Self {
        Self {
            link_lengths: [LINK_LENGTH, LINK_LENGTH],
            regularization: REGULARIZATION,
        }
    }
}

/// `R(-θ)` applied to `v`.
#[inline]
fn rotate_neg(theta: f64, v: Vector2<f64>) -> Vector2<f64> {
    let (s, c) = theta.sin_cos();
    Vector2::new(c * v.x + s * v.y, -s * v.x + c * v.y)
}

impl ArmModel {
    /// Claw position relative to the shoulder for joint angles in radians.
    pub fn claw(&self, theta1: f64, theta2: f64) -> Point2<f64> {
        let [l1, l2] = self.link_lengths;
        let elbow = rotate_neg(theta2, Vector2::new(-l2, 0.0));
        Point2::from(rotate_neg(theta1, Vector2::new(-l1, 0.0) + elbow))
    }

    /// Claw position and its Jacobian with respect to `(θ1, θ2)`; column `i`
    /// is `∂claw/∂θi`.
    pub fn claw_jacobian(&self, theta1: f64, theta2: f64) -> (Point2<f64>, Matrix2<f64>) {
        let [l1, l2] = self.link_lengths;
        let (sb, cb) = theta2.sin_cos();
        let v = Vector2::new(-l1 - l2 * cb, l2 * sb);
        let dv_db = Vector2::new(l2 * sb, l2 * cb);

        let (sa, ca) = theta1.sin_cos();
        let claw = Vector2::new(ca * v.x + sa * v.y, -sa * v.x + ca * v.y);
        let d_da = Vector2::new(-sa * v.x + ca * v.y, -ca * v.x - sa * v.y);
        let d_db = rotate_neg(theta1, dv_db);

        (Point2::from(claw), Matrix2::from_columns(&[d_da, d_db]))
    }

    /// Sum of both link lengths.
    pub fn reach(&self) -> f64 {
        self.link_lengths[0] + self.link_lengths[1]
    }
}
