//! Pinhole camera with Brown–Conrady distortion, and the board pose.

use nalgebra::{Point2, Point3, Rotation3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Fixed-point iterations used to invert the distortion model.
const UNDISTORT_ITERS: usize = 20;

/// Five-term lens distortion in OpenCV order `[k1, k2, p1, p2, k3]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub const fn none() -> Self {
        Self {
            k1: 0.0,
            k2: 0.0,
            p1: 0.0,
            p2: 0.0,
            k3: 0.0,
        }
    }

    /// Build from the OpenCV coefficient array `[k1, k2, p1, p2, k3]`.
    pub const fn from_opencv(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub const fn to_opencv(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.to_opencv().iter().all(|c| *c == 0.0)
    }

    /// Apply distortion to an ideal normalized image point.
    pub fn distort(&self, n: Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xy = x * y;
        let x_tan = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;

        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    ///
    /// Converges for the mild distortion of ordinary webcam/Kinect lenses;
    /// strongly distorted fisheye models are not supported.
    pub fn undistort(&self, d: Vector2<f64>) -> Vector2<f64> {
        if self.is_zero() {
            return d;
        }
        let mut n = d;
        for _ in 0..UNDISTORT_ITERS {
            let err = self.distort(n) - d;
            n -= err;
        }
        n
    }
}

/// Camera intrinsics: focal lengths and principal point in pixels plus lens
/// distortion.
///
/// `Default` carries the factory calibration of the deployed board camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub distortion: Distortion,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self {
            fx: 540.39224345,
            fy: 541.2481217,
            cx: 289.60021054,
            cy: 249.74312654,
            distortion: Distortion::from_opencv([
                -0.06999264,
                0.05139885,
                -0.00407623,
                -0.00333564,
                0.10434826,
            ]),
        }
    }
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, distortion: Distortion) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            distortion,
        }
    }

    /// Same camera with the lens distortion removed.
    pub fn without_distortion(&self) -> Self {
        Self {
            distortion: Distortion::none(),
            ..*self
        }
    }

    /// Distorted normalized coordinates → pixels.
    #[inline]
    pub fn normalized_to_pixel(&self, d: Vector2<f64>) -> Point2<f64> {
        Point2::new(self.fx * d.x + self.cx, self.fy * d.y + self.cy)
    }

    /// Pixel → ideal (undistorted) normalized coordinates.
    pub fn pixel_to_normalized(&self, px: Point2<f64>) -> Vector2<f64> {
        let d = Vector2::new((px.x - self.cx) / self.fx, (px.y - self.cy) / self.fy);
        self.distortion.undistort(d)
    }

    /// Project a point already expressed in the camera frame.
    ///
    /// No check is made for points at or behind the image plane; their
    /// output is finite garbage (or non-finite for `z == 0`).
    pub fn project_camera_point(&self, pc: Point3<f64>) -> Point2<f64> {
        let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
        self.normalized_to_pixel(self.distortion.distort(n))
    }
}

/// Rigid transform from board frame to camera frame.
///
/// `p_cam = R(rvec) * p_board + tvec`, with `rvec` an axis-angle rotation
/// vector in radians (the OpenCV `rvec`/`tvec` convention).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl Pose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn from_rotation(rotation: &Rotation3<f64>, tvec: Vector3<f64>) -> Self {
        Self {
            rvec: rotation.scaled_axis(),
            tvec,
        }
    }

    #[inline]
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }

    #[inline]
    pub fn transform(&self, p: Point3<f64>) -> Point3<f64> {
        self.rotation() * p + self.tvec
    }

    /// Camera centre expressed in the board frame.
    pub fn camera_center(&self) -> Point3<f64> {
        Point3::from(-(self.rotation().inverse() * self.tvec))
    }

    pub fn is_finite(&self) -> bool {
        self.rvec.iter().chain(self.tvec.iter()).all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn undistort_inverts_deployed_lens() {
        let d = CameraIntrinsics::default().distortion;
        for (x, y) in [(0.0, 0.0), (0.3, -0.2), (-0.5, 0.45), (0.55, 0.4)] {
            let n = Vector2::new(x, y);
            let back = d.undistort(d.distort(n));
            assert_relative_eq!(back, n, epsilon = 1e-8);
        }
    }

    #[test]
    fn principal_point_maps_to_optical_axis() {
        let k = CameraIntrinsics::default();
        let n = k.pixel_to_normalized(Point2::new(k.cx, k.cy));
        assert_relative_eq!(n, Vector2::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn camera_center_is_inverse_translation() {
        let rot = Rotation3::from_euler_angles(0.2, -0.4, 1.1);
        let center = Point3::new(1.0, -2.0, 7.5);
        let pose = Pose::from_rotation(&rot, -(rot * center.coords));
        assert_relative_eq!(pose.camera_center(), center, epsilon = 1e-10);
        assert_relative_eq!(pose.transform(center), Point3::origin(), epsilon = 1e-10);
    }

    #[test]
    fn intrinsics_json_defaults_to_no_distortion() {
        let json = r#"{"fx":500.0,"fy":500.0,"cx":320.0,"cy":240.0}"#;
        let k: CameraIntrinsics = serde_json::from_str(json).expect("parse");
        assert!(k.distortion.is_zero());
    }
}
