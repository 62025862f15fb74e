//! Marker layout on the physical board.

use std::collections::BTreeMap;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Marker id → marker centre in board coordinates (`x = file`, `y = rank`,
/// `z = height`, one unit per square).
///
/// Iteration is in ascending id order, which is also the order in which
/// pose correspondences are built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerBoardMap {
    markers: BTreeMap<u32, Point3<f64>>,
}

impl Default for MarkerBoardMap {
    /// The four corner markers of the deployed board, each 0.4 squares
    /// outside the nearest playing-area corner.
    fn default() -> Self {
        Self::from_iter([
            (6, Point3::new(-0.4, -0.4, 0.0)),
            (9, Point3::new(8.4, 8.4, 0.0)),
            (12, Point3::new(8.4, -0.4, 0.0)),
            (15, Point3::new(-0.4, 8.4, 0.0)),
        ])
    }
}

impl FromIterator<(u32, Point3<f64>)> for MarkerBoardMap {
    fn from_iter<I: IntoIterator<Item = (u32, Point3<f64>)>>(iter: I) -> Self {
        Self {
            markers: iter.into_iter().collect(),
        }
    }
}

impl MarkerBoardMap {
    pub fn empty() -> Self {
        Self {
            markers: BTreeMap::new(),
        }
    }

    /// Add or move a marker; returns the previous position.
    pub fn insert(&mut self, id: u32, position: Point3<f64>) -> Option<Point3<f64>> {
        self.markers.insert(id, position)
    }

    pub fn get(&self, id: u32) -> Option<Point3<f64>> {
        self.markers.get(&id).copied()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.markers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.markers.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Point3<f64>)> + '_ {
        self.markers.iter().map(|(&id, &p)| (id, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_iterates_in_ascending_id_order() {
        let ids: Vec<u32> = MarkerBoardMap::default().ids().collect();
        assert_eq!(ids, vec![6, 9, 12, 15]);
    }

    #[test]
    fn json_uses_id_keys() {
        let map = MarkerBoardMap::from_iter([(3, Point3::new(1.0, 2.0, 0.0))]);
        let json = serde_json::to_string(&map).expect("serialize");
        assert_eq!(json, r#"{"3":[1.0,2.0,0.0]}"#);
        let back: MarkerBoardMap = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, map);
    }
}
