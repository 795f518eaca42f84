use nalgebra::Vector3;

use crate::types::{Dx, LinearState};
use crate::variables::Node;

/// Which end of a polynomial a node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Start,
    End,
}

/// Cubic polynomial fully defined by position and velocity at both ends.
///
/// `x(t) = a + b t + c t^2 + d t^3` for local time `t` in `[0, T]`.
#[derive(Debug, Clone)]
pub struct CubicHermitePolynomial {
    coeffs: [Vector3<f64>; 4],
    start: Node,
    end: Node,
    duration: f64,
}

/// Monomial basis `[1, t, t^2, t^3]` differentiated `dxdt` times.
fn basis(dxdt: Dx, t: f64) -> [f64; 4] {
    match dxdt {
        Dx::Pos => [1.0, t, t * t, t * t * t],
        Dx::Vel => [0.0, 1.0, 2.0 * t, 3.0 * t * t],
        Dx::Acc => [0.0, 0.0, 2.0, 6.0 * t],
    }
}

impl CubicHermitePolynomial {
    pub fn new(start: &Node, end: &Node, duration: f64) -> Self {
        let t = duration;
        let t2 = t * t;
        let t3 = t2 * t;
        let (x0, v0, x1, v1) = (start.pos, start.vel, end.pos, end.vel);

        let c = -(3.0 * (x0 - x1) + t * (2.0 * v0 + v1)) / t2;
        let d = (2.0 * (x0 - x1) + t * (v0 + v1)) / t3;

        Self {
            coeffs: [x0, v0, c, d],
            start: *start,
            end: *end,
            duration,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn point(&self, t_local: f64) -> LinearState {
        LinearState {
            pos: self.evaluate(Dx::Pos, t_local),
            vel: self.evaluate(Dx::Vel, t_local),
            acc: self.evaluate(Dx::Acc, t_local),
        }
    }

    fn evaluate(&self, dxdt: Dx, t: f64) -> Vector3<f64> {
        basis(dxdt, t)
            .iter()
            .zip(self.coeffs.iter())
            .fold(Vector3::zeros(), |acc, (b, c)| acc + c * *b)
    }

    /// Derivative of the `dxdt` quantity at `t_local` w.r.t. one scalar
    /// entry of a boundary node. Identical for every dimension.
    pub fn derivative_wrt_node(&self, dxdt: Dx, side: Side, node_deriv: Dx, t_local: f64) -> f64 {
        let t = self.duration;
        let t2 = t * t;
        let t3 = t2 * t;
        let dcoeffs: [f64; 4] = match (side, node_deriv) {
            (Side::Start, Dx::Pos) => [1.0, 0.0, -3.0 / t2, 2.0 / t3],
            (Side::Start, Dx::Vel) => [0.0, 1.0, -2.0 / t, 1.0 / t2],
            (Side::End, Dx::Pos) => [0.0, 0.0, 3.0 / t2, -2.0 / t3],
            (Side::End, Dx::Vel) => [0.0, 0.0, -1.0 / t, 1.0 / t2],
            (_, Dx::Acc) => return 0.0,
        };
        basis(dxdt, t_local)
            .iter()
            .zip(dcoeffs.iter())
            .map(|(b, dc)| b * dc)
            .sum()
    }

    /// Derivative of the position at fixed `t_local` w.r.t. the duration.
    pub fn derivative_of_pos_wrt_duration(&self, t_local: f64) -> Vector3<f64> {
        let t = self.duration;
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t3 * t;
        let (x0, v0) = (self.start.pos, self.start.vel);
        let (x1, v1) = (self.end.pos, self.end.vel);

        let dc_dt = 6.0 * (x0 - x1) / t3 + (2.0 * v0 + v1) / t2;
        let dd_dt = -6.0 * (x0 - x1) / t4 - 2.0 * (v0 + v1) / t3;

        dc_dt * (t_local * t_local) + dd_dt * (t_local * t_local * t_local)
    }
}
