//! Calibration sample tables and their JSON form.

use std::collections::BTreeSet;
use std::{fs, path::Path};

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum SampleIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One commanded joint configuration and where the claw was observed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    /// Shoulder angle in radians.
    pub theta1: f64,
    /// Elbow angle in radians.
    pub theta2: f64,
    /// Commanded claw height, when the table records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Observed claw position in board coordinates.
    pub position: Point3<f64>,
}

impl CalibrationSample {
    pub fn new(theta1: f64, theta2: f64, position: Point3<f64>) -> Self {
        Self {
            theta1,
            theta2,
            height: None,
            position,
        }
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }
}

/// Whether any sample carries a height channel.
pub(crate) fn any_height(samples: &[CalibrationSample]) -> bool {
    samples.iter().any(|s| s.height.is_some())
}

/// Number of distinct `(θ1, θ2)` pairs, compared bitwise; repeated joint
/// configurations add no information about the offsets.
pub(crate) fn distinct_angle_pairs(samples: &[CalibrationSample]) -> usize {
    samples
        .iter()
        .map(|s| (s.theta1.to_bits(), s.theta2.to_bits()))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Height recorded with every row of [`SampleTable::reference`].
pub const REFERENCE_HEIGHT: f64 = 0.09000000000000007;

/// `(θ1, θ2, x)` rows of the reference sweep along the board's x axis.
const REFERENCE_ROWS: [(f64, f64, f64); 8] = [
    (0.9773843811168232, 2.0385445663293718, 0.0),
    (1.0611601852125507, 1.8570303241219621, 0.05),
    (1.1588986233242329, 1.6755160819145525, 0.1),
    (1.2426744274199601, 1.466076571675234, 0.15000000000000002),
    (1.3404128655316423, 1.256637061435915, 0.2),
    (1.4521139376592793, 1.019272283164687, 0.25),
    (1.5777776438028703, 0.75398223686155, 0.30000000000000004),
    (1.7034413499464618, 0.4607669225265024, 0.35000000000000003),
];

/// Ordered list of samples; serialized as a bare JSON array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleTable {
    samples: Vec<CalibrationSample>,
}

impl From<Vec<CalibrationSample>> for SampleTable {
    fn from(samples: Vec<CalibrationSample>) -> Self {
        Self { samples }
    }
}

impl FromIterator<CalibrationSample> for SampleTable {
    fn from_iter<I: IntoIterator<Item = CalibrationSample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl SampleTable {
    /// Eight claw positions along `y = 0`, 5 cm apart, each with the
    /// commanded height [`REFERENCE_HEIGHT`].
    pub fn reference() -> Self {
        REFERENCE_ROWS
            .iter()
            .map(|&(t1, t2, x)| {
                CalibrationSample::new(t1, t2, Point3::new(x, 0.0, 0.0))
                    .with_height(REFERENCE_HEIGHT)
            })
            .collect()
    }

    pub fn samples(&self) -> &[CalibrationSample] {
        &self.samples
    }

    pub fn push(&mut self, sample: CalibrationSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether any sample carries a height channel.
    pub fn has_height(&self) -> bool {
        any_height(&self.samples)
    }

    /// Number of distinct `(θ1, θ2)` pairs.
    pub fn distinct_angle_pairs(&self) -> usize {
        distinct_angle_pairs(&self.samples)
    }

    /// Load a JSON sample array from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SampleIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the table to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SampleIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_table_shape() {
        let table = SampleTable::reference();
        assert_eq!(table.len(), 8);
        assert!(table.has_height());
        assert_eq!(table.distinct_angle_pairs(), 8);
        assert_eq!(table.samples()[7].position.x, 0.35000000000000003);
    }

    #[test]
    fn repeated_angles_count_once() {
        let s = CalibrationSample::new(0.5, 1.0, Point3::new(0.1, 0.0, 0.0));
        let table: SampleTable = [s, s, CalibrationSample { theta2: 1.1, ..s }]
            .into_iter()
            .collect();
        assert_eq!(table.distinct_angle_pairs(), 2);
        assert!(!table.has_height());
    }

    #[test]
    fn json_omits_missing_height() {
        let s = CalibrationSample::new(0.5, 1.0, Point3::new(0.1, 0.2, 0.0));
        let json = serde_json::to_string(&SampleTable::from(vec![s])).expect("serialize");
        assert_eq!(
            json,
            r#"[{"theta1":0.5,"theta2":1.0,"position":[0.1,0.2,0.0]}]"#
        );
        let back: SampleTable = serde_json::from_str(&json).expect("parse");
        assert_eq!(back.samples(), &[s]);
    }
}
