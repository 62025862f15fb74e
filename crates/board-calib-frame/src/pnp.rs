//! Camera pose from board-point ↔ pixel correspondences.
//!
//! The board points are (near-)coplanar, so the pose is initialised from a
//! plane-to-image homography and then refined with Levenberg–Marquardt on
//! the distorted pixel reprojection error.

use board_calib_core::{estimate_homography, project_point, CameraIntrinsics, Pose};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Point3, Rotation3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Fewest correspondences the solver accepts.
pub const MIN_PNP_POINTS: usize = 4;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PnpParams {
    /// Levenberg–Marquardt iteration cap (0 keeps the homography pose).
    pub max_iterations: usize,
    /// Stop once the parameter update norm falls below this.
    pub step_tolerance: f64,
    /// Reject solutions whose RMS reprojection error (pixels) exceeds this.
    pub max_rms_px: Option<f64>,
}

impl Default for PnpParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            step_tolerance: 1e-10,
            max_rms_px: None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PnpError {
    #[error("need at least {required} correspondences, got {found}")]
    TooFewPoints { found: usize, required: usize },
    #[error("{object} board points but {image} image points")]
    LengthMismatch { object: usize, image: usize },
    #[error("board points are collinear")]
    CollinearPoints,
    #[error("plane-to-image homography is degenerate")]
    DegenerateHomography,
    #[error("pose solve produced non-finite values")]
    NonFinite,
    #[error("board lies behind the camera")]
    BehindCamera,
    #[error("reprojection RMS {rms:.3}px exceeds limit {limit:.3}px")]
    ReprojectionTooLarge { rms: f64, limit: f64 },
}

/// Solved pose plus its RMS pixel reprojection error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PnpSolution {
    pub pose: Pose,
    pub rms_px: f64,
}

/// Orthonormal frame of the best-fit plane through `points`.
struct PlaneFrame {
    origin: Point3<f64>,
    /// Rows: in-plane axes `e1`, `e2` and the normal `e1 × e2`.
    to_local: Matrix3<f64>,
}

impl PlaneFrame {
    fn fit(points: &[Point3<f64>]) -> Result<Self, PnpError> {
        let n = points.len() as f64;
        let origin = Point3::from(points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n);

        let mut cov = Matrix3::<f64>::zeros();
        for p in points {
            let d = p - origin;
            cov += d * d.transpose();
        }
        let eig = cov.symmetric_eigen();
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| {
            eig.eigenvalues[b]
                .partial_cmp(&eig.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let largest = eig.eigenvalues[order[0]];
        let middle = eig.eigenvalues[order[1]];
        if !largest.is_finite() || largest <= 0.0 || middle <= 1e-9 * largest {
            return Err(PnpError::CollinearPoints);
        }

        let e1: Vector3<f64> = eig.eigenvectors.column(order[0]).into_owned();
        let e2: Vector3<f64> = eig.eigenvectors.column(order[1]).into_owned();
        let e3 = e1.cross(&e2);
        Ok(Self {
            origin,
            to_local: Matrix3::from_rows(&[e1.transpose(), e2.transpose(), e3.transpose()]),
        })
    }

    fn local_2d(&self, p: &Point3<f64>) -> Point2<f64> {
        let l = self.to_local * (p - self.origin);
        Point2::new(l.x, l.y)
    }
}

/// Pose of the `z = 0` plane from a plane → normalized-image homography.
///
/// Returns the plane-to-camera rotation matrix (orthonormalised) and
/// translation, with the sign chosen so the plane is in front of the camera.
fn decompose_homography(h: &Matrix3<f64>) -> Option<(Matrix3<f64>, Vector3<f64>)> {
    let h1: Vector3<f64> = h.column(0).into_owned();
    let h2: Vector3<f64> = h.column(1).into_owned();
    let h3: Vector3<f64> = h.column(2).into_owned();

    let scale = 0.5 * (h1.norm() + h2.norm());
    if scale <= f64::EPSILON {
        return None;
    }
    let mut lambda = 1.0 / scale;
    if (lambda * h3).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * h1;
    let r2 = lambda * h2;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    // nearest rotation (polar decomposition)
    let svd = r.svd(true, true);
    let (mut u, v_t) = (svd.u?, svd.v_t?);
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    Some((u * v_t, lambda * h3))
}

fn initial_pose(object: &[Point3<f64>], normalized: &[Point2<f64>]) -> Result<Pose, PnpError> {
    let frame = PlaneFrame::fit(object)?;
    let local: Vec<Point2<f64>> = object.iter().map(|p| frame.local_2d(p)).collect();
    let h = estimate_homography(&local, normalized).ok_or(PnpError::DegenerateHomography)?;
    let (r_local, t_local) = decompose_homography(&h.h).ok_or(PnpError::DegenerateHomography)?;

    // p_cam = R_l * E * (p - o) + t_l
    let r = r_local * frame.to_local;
    let t = t_local - r * frame.origin.coords;
    let rotation = Rotation3::from_matrix(&r);
    Ok(Pose::from_rotation(&rotation, t))
}

fn residuals(
    x: &SVector<f64, 6>,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    intrinsics: &CameraIntrinsics,
) -> DVector<f64> {
    let pose = pose_from_params(x);
    let mut r = DVector::zeros(2 * object.len());
    for (i, (p, uv)) in object.iter().zip(image).enumerate() {
        let q = project_point(*p, &pose, intrinsics);
        r[2 * i] = q.x - uv.x;
        r[2 * i + 1] = q.y - uv.y;
    }
    r
}

#[inline]
fn pose_from_params(x: &SVector<f64, 6>) -> Pose {
    Pose::new(x.fixed_rows::<3>(0).into_owned(), x.fixed_rows::<3>(3).into_owned())
}

/// Central-difference Jacobian of the reprojection residuals.
fn numeric_jacobian(
    x: &SVector<f64, 6>,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    intrinsics: &CameraIntrinsics,
) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(2 * object.len(), 6);
    for k in 0..6 {
        let step = 1e-6 * x[k].abs().max(1.0);
        let mut xp = *x;
        let mut xm = *x;
        xp[k] += step;
        xm[k] -= step;
        let diff = (residuals(&xp, object, image, intrinsics)
            - residuals(&xm, object, image, intrinsics))
            / (2.0 * step);
        jac.set_column(k, &diff);
    }
    jac
}

fn refine_lm(
    pose: Pose,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    intrinsics: &CameraIntrinsics,
    params: &PnpParams,
) -> Pose {
    let mut x = SVector::<f64, 6>::zeros();
    x.fixed_rows_mut::<3>(0).copy_from(&pose.rvec);
    x.fixed_rows_mut::<3>(3).copy_from(&pose.tvec);

    let mut r = residuals(&x, object, image, intrinsics);
    let mut cost = r.norm_squared();
    let mut mu = 1e-3;

    for _ in 0..params.max_iterations {
        let jac = numeric_jacobian(&x, object, image, intrinsics);
        let jtj: SMatrix<f64, 6, 6> =
            (jac.transpose() * &jac).fixed_view::<6, 6>(0, 0).into_owned();
        let jtr: SVector<f64, 6> = (jac.transpose() * &r).fixed_rows::<6>(0).into_owned();

        let mut improved = false;
        while mu < 1e12 {
            let mut a = jtj;
            for i in 0..6 {
                a[(i, i)] += mu * jtj[(i, i)].max(1e-12);
            }
            let Some(delta) = a.lu().solve(&(-jtr)) else {
                mu *= 10.0;
                continue;
            };
            let candidate = x + delta;
            let r_new = residuals(&candidate, object, image, intrinsics);
            let cost_new = r_new.norm_squared();
            if cost_new.is_finite() && cost_new < cost {
                x = candidate;
                r = r_new;
                cost = cost_new;
                mu = (mu * 0.1).max(1e-12);
                improved = true;
                if delta.norm() < params.step_tolerance {
                    return pose_from_params(&x);
                }
                break;
            }
            mu *= 10.0;
        }
        if !improved {
            break;
        }
    }
    pose_from_params(&x)
}

/// RMS pixel distance between projected board points and observations.
pub fn reprojection_rms(
    pose: &Pose,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    intrinsics: &CameraIntrinsics,
) -> f64 {
    if object.is_empty() {
        return 0.0;
    }
    let sum: f64 = object
        .iter()
        .zip(image)
        .map(|(p, uv)| (project_point(*p, pose, intrinsics) - uv).norm_squared())
        .sum();
    (sum / object.len() as f64).sqrt()
}

/// Solve the board pose from coplanar board points and their pixels.
pub fn solve_planar_pnp(
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    intrinsics: &CameraIntrinsics,
    params: &PnpParams,
) -> Result<PnpSolution, PnpError> {
    if object.len() != image.len() {
        return Err(PnpError::LengthMismatch {
            object: object.len(),
            image: image.len(),
        });
    }
    if object.len() < MIN_PNP_POINTS {
        return Err(PnpError::TooFewPoints {
            found: object.len(),
            required: MIN_PNP_POINTS,
        });
    }
    if object
        .iter()
        .map(|p| p.coords.norm_squared())
        .chain(image.iter().map(|p| p.coords.norm_squared()))
        .any(|v| !v.is_finite())
    {
        return Err(PnpError::NonFinite);
    }

    let normalized: Vec<Point2<f64>> = image
        .iter()
        .map(|&px| Point2::from(intrinsics.pixel_to_normalized(px)))
        .collect();

    let init = initial_pose(object, &normalized)?;
    if !init.is_finite() {
        return Err(PnpError::NonFinite);
    }
    let pose = refine_lm(init, object, image, intrinsics, params);
    if !pose.is_finite() {
        return Err(PnpError::NonFinite);
    }
    if object.iter().any(|p| pose.transform(*p).z <= 0.0) {
        return Err(PnpError::BehindCamera);
    }

    let rms_px = reprojection_rms(&pose, object, image, intrinsics);
    if !rms_px.is_finite() {
        return Err(PnpError::NonFinite);
    }
    if let Some(limit) = params.max_rms_px {
        if rms_px > limit {
            return Err(PnpError::ReprojectionTooLarge { rms: rms_px, limit });
        }
    }
    Ok(PnpSolution { pose, rms_px })
}
