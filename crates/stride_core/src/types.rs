//! Core types shared by the variables, splines, models and constraints.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Number of Cartesian dimensions of every spline quantity.
pub const K3D: usize = 3;

/// Number of rows a 6D base acceleration occupies.
pub const K6D: usize = 6;

/// Row offset of the angular part inside a 6D block.
pub const ANGULAR: usize = 0;

/// Row offset of the linear part inside a 6D block.
pub const LINEAR: usize = 3;

/// Derivative order of a spline quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dx {
    Pos,
    Vel,
    Acc,
}

/// Rows of a 6D base acceleration, angular first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim6D {
    AngX,
    AngY,
    AngZ,
    LinX,
    LinY,
    LinZ,
}

impl Dim6D {
    pub const ALL: [Dim6D; K6D] = [
        Dim6D::AngX,
        Dim6D::AngY,
        Dim6D::AngZ,
        Dim6D::LinX,
        Dim6D::LinY,
        Dim6D::LinZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Closed interval a scalar constraint row or variable must lie in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const ZERO: Bounds = Bounds {
        lower: 0.0,
        upper: 0.0,
    };

    pub const UNBOUNDED: Bounds = Bounds {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Hard equality `value <= x <= value`.
    pub fn equality(value: f64) -> Self {
        Self::new(value, value)
    }

    pub fn contains(&self, value: f64, tolerance: f64) -> bool {
        value >= self.lower - tolerance && value <= self.upper + tolerance
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Position, velocity and acceleration of a 3D spline at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearState {
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub acc: Vector3<f64>,
}

impl LinearState {
    pub fn at(&self, dx: Dx) -> &Vector3<f64> {
        match dx {
            Dx::Pos => &self.pos,
            Dx::Vel => &self.vel,
            Dx::Acc => &self.acc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim6d_indices_are_angular_first() {
        let indices: Vec<usize> = Dim6D::ALL.iter().map(|d| d.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(Dim6D::AngX.index(), ANGULAR);
        assert_eq!(Dim6D::LinX.index(), LINEAR);
    }

    #[test]
    fn bounds_contains_respects_tolerance() {
        let b = Bounds::equality(9.81);
        assert!(b.contains(9.81, 0.0));
        assert!(b.contains(9.8100001, 1e-6));
        assert!(!b.contains(9.7, 1e-6));
        assert!(Bounds::default().contains(1e300, 0.0));
    }

    #[test]
    fn dx_deserializes_from_variant_name() {
        let dx: Dx = serde_json::from_str("\"Acc\"").expect("valid Dx");
        assert_eq!(dx, Dx::Acc);
    }
}
