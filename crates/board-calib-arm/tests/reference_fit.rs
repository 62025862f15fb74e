use approx::assert_relative_eq;
use board_calib_arm::{
    ArmModel, CalibrationSample, GradientDescent, KinematicCalibrator, KinematicParams, LossMode,
    Objective, ParamVector, SampleTable, INITIAL_PARAM,
};
use nalgebra::Point3;
use tempfile::tempdir;

#[test]
fn descent_improves_the_reference_loss() {
    let table = SampleTable::reference();
    let cal = KinematicCalibrator::default();
    assert_eq!(*cal.optimizer(), GradientDescent::new(1000, 0.01, 0.95));

    let before = cal.loss(&KinematicParams::default(), table.samples());
    let params = cal.fit(table.samples()).expect("fit");
    let after = cal.loss(&params, table.samples());
    assert!(after < before, "{after} !< {before}");
    assert!(after < 5e-3, "final loss {after}");

    // the height term pins tz to the negated commanded height
    assert_relative_eq!(params.tz, -0.09, epsilon = 1e-4);
    assert_relative_eq!(params.tx, -0.1436, epsilon = 2e-3);
    assert_relative_eq!(params.ty, 0.0156, epsilon = 2e-3);
    assert_relative_eq!(params.theta1_offset, 0.9197, epsilon = 2e-3);
    assert_relative_eq!(params.theta2_offset, 0.6119, epsilon = 2e-3);
}

#[test]
fn fit_is_deterministic() {
    let table = SampleTable::reference();
    let cal = KinematicCalibrator::default();
    let a = cal.fit(table.samples()).expect("fit");
    let b = cal.fit(table.samples()).expect("fit");
    assert_eq!(a, b);
}

#[test]
fn planar_fit_keeps_tz_at_zero() {
    let table = SampleTable::reference();
    let cal = KinematicCalibrator::default().with_mode(LossMode::Planar);
    let params = cal.fit(table.samples()).expect("fit");
    assert_eq!(params.tz, 0.0);

    // without the height term the planar part of the solution is unchanged
    let aware = KinematicCalibrator::default()
        .fit(table.samples())
        .expect("fit");
    assert_relative_eq!(params.tx, aware.tx, epsilon = 1e-9);
    assert_relative_eq!(params.theta1_offset, aware.theta1_offset, epsilon = 1e-9);
}

#[test]
fn loss_at_start_matches_objective() {
    let table = SampleTable::reference();
    let cal = KinematicCalibrator::default();
    let start = ParamVector::repeat(INITIAL_PARAM);
    let via_params = cal.loss(&KinematicParams::from_vector(&start), table.samples());
    let via_objective = cal.objective(table.samples()).value(&start);
    assert_eq!(via_params, via_objective);
}

#[test]
fn recovers_offsets_from_synthetic_observations() {
    // without the translation penalty the true offsets are the exact optimum
    let model = ArmModel {
        regularization: 0.0,
        ..ArmModel::default()
    };
    let truth = KinematicParams {
        tx: 0.05,
        ty: -0.02,
        tz: 0.0,
        theta1_offset: 0.1,
        theta2_offset: -0.05,
    };
    let samples: Vec<CalibrationSample> = (0..12)
        .map(|i| {
            let t1 = 0.9 + 0.07 * i as f64;
            let t2 = 2.0 - 0.12 * i as f64;
            let claw = model.claw(t1 + truth.theta1_offset, t2 + truth.theta2_offset);
            CalibrationSample::new(t1, t2, Point3::new(claw.x + truth.tx, claw.y + truth.ty, 0.0))
        })
        .collect();

    let cal = KinematicCalibrator::new(model, GradientDescent::new(20_000, 0.005, 0.9));
    let fitted = cal.fit(&samples).expect("fit");
    assert!(cal.loss(&fitted, &samples) < 1e-12);
    assert_relative_eq!(fitted.to_vector(), truth.to_vector(), epsilon = 1e-6);
}

#[test]
fn sample_tables_round_trip_through_json() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("samples.json");
    let table = SampleTable::reference();
    table.write_json(&path).expect("write");
    let back = SampleTable::load_json(&path).expect("load");
    assert_eq!(back, table);
}

#[test]
fn reloaded_table_fits_bit_for_bit() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("reference.json");
    let table = SampleTable::reference();
    table.write_json(&path).expect("write");
    let reloaded = SampleTable::load_json(&path).expect("load");

    for (a, b) in table.samples().iter().zip(reloaded.samples()) {
        assert_eq!(a.theta1.to_bits(), b.theta1.to_bits());
        assert_eq!(a.theta2.to_bits(), b.theta2.to_bits());
    }

    let cal = KinematicCalibrator::default();
    let direct = cal.fit(table.samples()).expect("fit");
    let from_file = cal.fit(reloaded.samples()).expect("fit");
    for (a, b) in direct.to_vector().iter().zip(from_file.to_vector().iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
