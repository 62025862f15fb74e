//! Fitting the arm's mounting offsets from observed claw positions.

use std::fmt;

use log::{info, warn};
use nalgebra::{SVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::model::ArmModel;
use crate::optimizer::{GradientDescent, Objective};
use crate::samples::{any_height, distinct_angle_pairs, CalibrationSample};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameter vector layout: `[tx, ty, tz, θ1_offset, θ2_offset]`.
pub type ParamVector = SVector<f64, 5>;

/// Starting value of every free parameter. Rotation derivatives vanish at
/// exactly zero offsets for some tables, so the descent starts just off it.
pub const INITIAL_PARAM: f64 = 1e-4;

/// Which loss terms take part in the fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossMode {
    /// Claw position only; `tz` is held at zero.
    Planar,
    /// Adds `(h + tz)²` for every sample with a height channel.
    HeightAware,
}

impl LossMode {
    pub fn free_parameters(self) -> usize {
        match self {
            LossMode::Planar => 4,
            LossMode::HeightAware => 5,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("samples give {constraints} independent constraints for {parameters} free parameters")]
    DegenerateCorrespondences { constraints: usize, parameters: usize },
}

/// Fitted arm offsets. Angles are radians; [`fmt::Display`] shows degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicParams {
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,
    pub theta1_offset: f64,
    pub theta2_offset: f64,
}

impl KinematicParams {
    pub fn from_vector(v: &ParamVector) -> Self {
        Self {
            tx: v[0],
            ty: v[1],
            tz: v[2],
            theta1_offset: v[3],
            theta2_offset: v[4],
        }
    }

    pub fn to_vector(&self) -> ParamVector {
        ParamVector::new(
            self.tx,
            self.ty,
            self.tz,
            self.theta1_offset,
            self.theta2_offset,
        )
    }

    /// Translation in the arm controller's axis order `(tx, tz, ty)`.
    pub fn arm_frame_translation(&self) -> Vector3<f64> {
        Vector3::new(self.tx, self.tz, self.ty)
    }

    pub fn offsets_degrees(&self) -> (f64, f64) {
        (
            self.theta1_offset.to_degrees(),
            self.theta2_offset.to_degrees(),
        )
    }
}

impl fmt::Display for KinematicParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (d1, d2) = self.offsets_degrees();
        let t = self.arm_frame_translation();
        write!(
            f,
            "theta1 offset {d1:.4} deg, theta2 offset {d2:.4} deg, translation ({:.5}, {:.5}, {:.5})",
            t.x, t.y, t.z
        )
    }
}

/// The calibration loss over a fixed sample table, with its analytic
/// gradient.
///
/// ```text
/// loss = Σ ‖claw(θ1 + o1, θ2 + o2) + (tx, ty) - (x, y)‖²
///      + Σ (h + tz)²                      (height-aware, samples with h)
///      + λ·‖(tx, ty)‖
/// ```
///
/// The regularizer is a norm, not a squared norm; its gradient `λ·t/‖t‖` is
/// taken as zero at `t = 0`.
#[derive(Clone, Copy, Debug)]
pub struct KinematicLoss<'a> {
    model: &'a ArmModel,
    samples: &'a [CalibrationSample],
    mode: LossMode,
}

impl<'a> KinematicLoss<'a> {
    pub fn new(model: &'a ArmModel, samples: &'a [CalibrationSample], mode: LossMode) -> Self {
        Self {
            model,
            samples,
            mode,
        }
    }

    fn height_term(&self, sample: &CalibrationSample) -> Option<f64> {
        match self.mode {
            LossMode::HeightAware => sample.height,
            LossMode::Planar => None,
        }
    }
}

impl Objective<5> for KinematicLoss<'_> {
    fn value(&self, x: &ParamVector) -> f64 {
        let p = KinematicParams::from_vector(x);
        let t = Vector2::new(p.tx, p.ty);
        let mut sum = 0.0;
        for s in self.samples {
            let claw = self
                .model
                .claw(s.theta1 + p.theta1_offset, s.theta2 + p.theta2_offset);
            let e = claw.coords + t - s.position.xy().coords;
            let mut term = e.norm_squared();
            if let Some(h) = self.height_term(s) {
                term += (h + p.tz).powi(2);
            }
            sum += term;
        }
        sum + self.model.regularization * t.norm()
    }

    fn gradient(&self, x: &ParamVector) -> ParamVector {
        let p = KinematicParams::from_vector(x);
        let t = Vector2::new(p.tx, p.ty);
        let mut g = ParamVector::zeros();
        for s in self.samples {
            let (claw, jac) = self
                .model
                .claw_jacobian(s.theta1 + p.theta1_offset, s.theta2 + p.theta2_offset);
            let e = claw.coords + t - s.position.xy().coords;
            g[0] += 2.0 * e.x;
            g[1] += 2.0 * e.y;
            if let Some(h) = self.height_term(s) {
                g[2] += 2.0 * (h + p.tz);
            }
            g[3] += 2.0 * e.dot(&jac.column(0));
            g[4] += 2.0 * e.dot(&jac.column(1));
        }
        let norm = t.norm();
        if norm > 0.0 {
            let r = t * (self.model.regularization / norm);
            g[0] += r.x;
            g[1] += r.y;
        }
        g
    }
}

/// Fits [`KinematicParams`] to a sample table by momentum gradient descent.
#[derive(Clone, Debug, Default)]
pub struct KinematicCalibrator {
    model: ArmModel,
    mode: Option<LossMode>,
    optimizer: GradientDescent,
}

impl KinematicCalibrator {
    pub fn new(model: ArmModel, optimizer: GradientDescent) -> Self {
        Self {
            model,
            mode: None,
            optimizer,
        }
    }

    /// Force a loss mode instead of inferring it from the samples.
    pub fn with_mode(mut self, mode: LossMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn model(&self) -> &ArmModel {
        &self.model
    }

    pub fn optimizer(&self) -> &GradientDescent {
        &self.optimizer
    }

    /// The configured mode, or `HeightAware` when any sample has a height.
    pub fn mode_for(&self, samples: &[CalibrationSample]) -> LossMode {
        self.mode.unwrap_or_else(|| {
            if any_height(samples) {
                LossMode::HeightAware
            } else {
                LossMode::Planar
            }
        })
    }

    pub fn objective<'a>(&'a self, samples: &'a [CalibrationSample]) -> KinematicLoss<'a> {
        KinematicLoss::new(&self.model, samples, self.mode_for(samples))
    }

    /// Loss of `params` over `samples` in the mode this calibrator would fit.
    pub fn loss(&self, params: &KinematicParams, samples: &[CalibrationSample]) -> f64 {
        self.objective(samples).value(&params.to_vector())
    }

    /// Reject tables with fewer independent constraints than free
    /// parameters: two per distinct `(θ1, θ2)` pair, plus one when a height
    /// term takes part.
    pub fn check(&self, samples: &[CalibrationSample]) -> Result<LossMode, CalibrationError> {
        let mode = self.mode_for(samples);
        let uses_height = mode == LossMode::HeightAware && any_height(samples);
        let constraints = 2 * distinct_angle_pairs(samples) + usize::from(uses_height);
        let parameters = mode.free_parameters();
        if constraints < parameters {
            return Err(CalibrationError::DegenerateCorrespondences {
                constraints,
                parameters,
            });
        }
        Ok(mode)
    }

    /// Fit the offsets. In planar mode `tz` stays exactly zero.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(samples = samples.len()))
    )]
    pub fn fit(&self, samples: &[CalibrationSample]) -> Result<KinematicParams, CalibrationError> {
        let mode = self
            .check(samples)
            .inspect_err(|e| warn!("calibration refused: {e}"))?;
        let objective = KinematicLoss::new(&self.model, samples, mode);

        let mut start = ParamVector::repeat(INITIAL_PARAM);
        if mode == LossMode::Planar {
            start[2] = 0.0;
        }
        let x = self.optimizer.minimize(&objective, start);
        let params = KinematicParams::from_vector(&x);
        info!(
            "calibrated {} samples ({mode:?}): loss {:.6e} -> {:.6e}",
            samples.len(),
            objective.value(&start),
            objective.value(&x)
        );
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::FiniteDifference;
    use crate::samples::SampleTable;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn zero_params_on_reference_table() {
        let table = SampleTable::reference();
        let cal = KinematicCalibrator::default();
        let loss = cal.loss(&KinematicParams::default(), table.samples());
        assert_relative_eq!(loss, 1.5225458768246245, epsilon = 1e-12);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let table = SampleTable::reference();
        let model = ArmModel::default();
        for mode in [LossMode::Planar, LossMode::HeightAware] {
            let loss = KinematicLoss::new(&model, table.samples(), mode);
            let fd = FiniteDifference::new(|x: &ParamVector| loss.value(x));
            for x in [
                ParamVector::repeat(INITIAL_PARAM),
                ParamVector::new(-0.12, 0.03, -0.05, 0.8, 0.5),
                ParamVector::new(0.02, -0.01, 0.1, -0.2, 0.3),
            ] {
                assert_relative_eq!(loss.gradient(&x), fd.gradient(&x), epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn planar_gradient_ignores_tz() {
        let table = SampleTable::reference();
        let model = ArmModel::default();
        let loss = KinematicLoss::new(&model, table.samples(), LossMode::Planar);
        let g = loss.gradient(&ParamVector::new(0.1, 0.1, 0.7, 0.2, 0.2));
        assert_eq!(g[2], 0.0);
    }

    #[test]
    fn regularizer_gradient_is_zero_at_origin() {
        let samples = [CalibrationSample::new(0.0, 0.0, Point3::new(-0.58, 0.0, 0.0))];
        let model = ArmModel::default();
        let loss = KinematicLoss::new(&model, &samples, LossMode::Planar);
        let g = loss.gradient(&ParamVector::zeros());
        assert!(g.iter().all(|v| v.is_finite()));
        assert_relative_eq!(g, ParamVector::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn mode_follows_height_channel() {
        let cal = KinematicCalibrator::default();
        let planar = [CalibrationSample::new(0.1, 0.2, Point3::origin())];
        assert_eq!(cal.mode_for(&planar), LossMode::Planar);
        assert_eq!(
            cal.mode_for(SampleTable::reference().samples()),
            LossMode::HeightAware
        );
        let forced = KinematicCalibrator::default().with_mode(LossMode::Planar);
        assert_eq!(
            forced.mode_for(SampleTable::reference().samples()),
            LossMode::Planar
        );
    }

    #[test]
    fn degenerate_tables_are_rejected() {
        let cal = KinematicCalibrator::default();
        assert_eq!(
            cal.fit(&[]),
            Err(CalibrationError::DegenerateCorrespondences {
                constraints: 0,
                parameters: 4
            })
        );

        // one joint configuration observed twice, with height: 2 + 1 < 5
        let s = CalibrationSample::new(1.0, 1.5, Point3::new(0.1, 0.0, 0.0)).with_height(0.09);
        assert_eq!(
            cal.check(&[s, s]),
            Err(CalibrationError::DegenerateCorrespondences {
                constraints: 3,
                parameters: 5
            })
        );

        // two planar configurations suffice for four parameters
        let a = CalibrationSample::new(1.0, 1.5, Point3::new(0.1, 0.0, 0.0));
        let b = CalibrationSample::new(1.2, 1.3, Point3::new(0.15, 0.0, 0.0));
        assert_eq!(cal.check(&[a, b]), Ok(LossMode::Planar));
    }

    #[test]
    fn constraint_count_follows_the_sample_table() {
        // -0.0 and 0.0 differ bitwise and count as two configurations
        let base = CalibrationSample::new(0.0, 1.5, Point3::new(0.1, 0.0, 0.0));
        let table: SampleTable = [base, base, CalibrationSample { theta1: -0.0, ..base }]
            .into_iter()
            .collect();
        let cal = KinematicCalibrator::default().with_mode(LossMode::HeightAware);
        assert_eq!(
            cal.check(table.samples()),
            Err(CalibrationError::DegenerateCorrespondences {
                constraints: 2 * table.distinct_angle_pairs(),
                parameters: 5
            })
        );
        assert_eq!(table.distinct_angle_pairs(), 2);

        let inferred = KinematicCalibrator::default();
        assert!(!table.has_height());
        assert_eq!(inferred.mode_for(table.samples()), LossMode::Planar);
        let with_height: SampleTable = table.samples()[..1]
            .iter()
            .map(|s| s.with_height(0.09))
            .chain(table.samples()[1..].iter().copied())
            .collect();
        assert!(with_height.has_height());
        assert_eq!(inferred.mode_for(with_height.samples()), LossMode::HeightAware);
    }

    #[test]
    fn display_uses_degrees_and_arm_axis_order() {
        let p = KinematicParams {
            tx: 0.1,
            ty: 0.2,
            tz: -0.3,
            theta1_offset: std::f64::consts::FRAC_PI_4,
            theta2_offset: -std::f64::consts::FRAC_PI_2,
        };
        assert_eq!(
            p.to_string(),
            "theta1 offset 45.0000 deg, theta2 offset -90.0000 deg, \
             translation (0.10000, -0.30000, 0.20000)"
        );
    }
}
