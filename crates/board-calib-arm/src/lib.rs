//! Geometric calibration of the two-link arm.
//!
//! The arm's shoulder sits at an unknown offset from the board origin and
//! both joint encoders have unknown zero offsets. Given claw positions
//! observed at known commanded joint angles, [`KinematicCalibrator`] fits
//! `[tx, ty, tz, θ1_offset, θ2_offset]` by minimizing a least-squares loss
//! with fixed-step momentum [`GradientDescent`].
//!
//! ```
//! use board_calib_arm::{KinematicCalibrator, SampleTable};
//!
//! let table = SampleTable::reference();
//! let params = KinematicCalibrator::default().fit(table.samples()).unwrap();
//! println!("{params}");
//! ```

mod calibrator;
mod model;
mod optimizer;
mod samples;

pub use calibrator::{
    CalibrationError, KinematicCalibrator, KinematicLoss, KinematicParams, LossMode, ParamVector,
    INITIAL_PARAM,
};
pub use model::{ArmModel, LINK_LENGTH, REGULARIZATION};
pub use optimizer::{FiniteDifference, GradientDescent, Objective};
pub use samples::{CalibrationSample, SampleIoError, SampleTable, REFERENCE_HEIGHT};
