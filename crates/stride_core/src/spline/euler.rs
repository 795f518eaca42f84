//! Base orientation from a spline of ZYX Euler angles.
//!
//! The spline stores `[roll, pitch, yaw]` and the base rotation is
//! `R = Rz(yaw) Ry(pitch) Rx(roll)`. World angular velocity is not a
//! polynomial derivative of the angles but `ω = M(θ) θ̇`, so this module owns
//! the kinematic map and the chain rule through it.

use nalgebra::{Matrix3, Rotation3, Vector3};

use super::NodeSpline;
use crate::jacobian::{Jacobian, JacobianBuilder};
use crate::types::{Dx, K3D};

/// Maps Euler-angle rates to world angular velocity.
pub fn euler_rate_to_angular_velocity(angles: &Vector3<f64>) -> Matrix3<f64> {
    let (sy, cy) = angles.y.sin_cos();
    let (sz, cz) = angles.z.sin_cos();
    Matrix3::new(
        cy * cz, -sz, 0.0, //
        cy * sz, cz, 0.0, //
        -sy, 0.0, 1.0,
    )
}

/// Partial derivative of [`euler_rate_to_angular_velocity`] w.r.t. angle `k`.
fn derivative_of_m(angles: &Vector3<f64>, k: usize) -> Matrix3<f64> {
    let (sy, cy) = angles.y.sin_cos();
    let (sz, cz) = angles.z.sin_cos();
    match k {
        0 => Matrix3::zeros(),
        1 => Matrix3::new(
            -sy * cz, 0.0, 0.0, //
            -sy * sz, 0.0, 0.0, //
            -cy, 0.0, 0.0,
        ),
        2 => Matrix3::new(
            -cy * sz, -cz, 0.0, //
            cy * cz, -sz, 0.0, //
            0.0, 0.0, 0.0,
        ),
        _ => panic!("Euler angle index {k} out of range"),
    }
}

/// Second partial derivative of the rate matrix w.r.t. angles `k` and `l`.
fn second_derivative_of_m(angles: &Vector3<f64>, k: usize, l: usize) -> Matrix3<f64> {
    let (sy, cy) = angles.y.sin_cos();
    let (sz, cz) = angles.z.sin_cos();
    match (k.min(l), k.max(l)) {
        (0, _) => Matrix3::zeros(),
        (1, 1) => Matrix3::new(
            -cy * cz, 0.0, 0.0, //
            -cy * sz, 0.0, 0.0, //
            sy, 0.0, 0.0,
        ),
        (1, 2) => Matrix3::new(
            sy * sz, 0.0, 0.0, //
            -sy * cz, 0.0, 0.0, //
            0.0, 0.0, 0.0,
        ),
        (2, 2) => Matrix3::new(
            -cy * cz, sz, 0.0, //
            -cy * sz, -cz, 0.0, //
            0.0, 0.0, 0.0,
        ),
        _ => panic!("Euler angle indices ({k}, {l}) out of range"),
    }
}

/// Matrix whose column `k` is `∂M/∂θ_k · v`.
fn derivative_of_m_times(angles: &Vector3<f64>, v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::from_columns(&[
        derivative_of_m(angles, 0) * v,
        derivative_of_m(angles, 1) * v,
        derivative_of_m(angles, 2) * v,
    ])
}

/// Time derivative of the rate matrix, `Σ_k ∂M/∂θ_k θ̇_k`.
fn m_dot(angles: &Vector3<f64>, rates: &Vector3<f64>) -> Matrix3<f64> {
    (0..K3D).fold(Matrix3::zeros(), |acc, k| {
        acc + derivative_of_m(angles, k) * rates[k]
    })
}

/// Orientation evaluator over an Euler-angle node spline.
#[derive(Debug, Clone)]
pub struct EulerConverter<'a> {
    spline: NodeSpline<'a>,
}

impl<'a> EulerConverter<'a> {
    pub fn new(spline: NodeSpline<'a>) -> Self {
        Self { spline }
    }

    pub fn spline(&self) -> &NodeSpline<'a> {
        &self.spline
    }

    pub fn rotation_base_to_world(&self, t: f64) -> Rotation3<f64> {
        let angles = self.spline.point(t).pos;
        Rotation3::from_euler_angles(angles.x, angles.y, angles.z)
    }

    pub fn angular_velocity_in_world(&self, t: f64) -> Vector3<f64> {
        let state = self.spline.point(t);
        euler_rate_to_angular_velocity(&state.pos) * state.vel
    }

    /// `ω̇ = M θ̈ + Ṁ θ̇`.
    pub fn angular_acceleration_in_world(&self, t: f64) -> Vector3<f64> {
        let state = self.spline.point(t);
        euler_rate_to_angular_velocity(&state.pos) * state.acc
            + m_dot(&state.pos, &state.vel) * state.vel
    }

    /// `∂ω/∂n = M J_vel + [∂M/∂θ_k θ̇]_k J_pos`.
    pub fn deriv_of_ang_vel_wrt_euler_nodes(&self, t: f64) -> Jacobian {
        let state = self.spline.point(t);
        let jac_pos = self.spline.jacobian_wrt_nodes(t, Dx::Pos);
        let jac_vel = self.spline.jacobian_wrt_nodes(t, Dx::Vel);

        let mut jac = JacobianBuilder::new(K3D, jac_pos.ncols());
        jac.add_product(0, &euler_rate_to_angular_velocity(&state.pos), &jac_vel);
        jac.add_product(0, &derivative_of_m_times(&state.pos, &state.vel), &jac_pos);
        jac.build()
    }

    /// Differentiates `M θ̈ + Ṁ θ̇` through angles, rates and accelerations.
    pub fn deriv_of_ang_acc_wrt_euler_nodes(&self, t: f64) -> Jacobian {
        let state = self.spline.point(t);
        let (angles, rates, accs) = (state.pos, state.vel, state.acc);
        let jac_pos = self.spline.jacobian_wrt_nodes(t, Dx::Pos);
        let jac_vel = self.spline.jacobian_wrt_nodes(t, Dx::Vel);
        let jac_acc = self.spline.jacobian_wrt_nodes(t, Dx::Acc);

        let m = euler_rate_to_angular_velocity(&angles);
        let m_rate = m_dot(&angles, &rates);

        // ∂(Ṁ θ̇)/∂θ̇ = [∂M/∂θ_k θ̇]_k + Ṁ
        let wrt_rates = derivative_of_m_times(&angles, &rates) + m_rate;

        // ∂(M θ̈)/∂θ + ∂(Ṁ θ̇)/∂θ
        let mut wrt_angles = derivative_of_m_times(&angles, &accs);
        for l in 0..K3D {
            let column = (0..K3D).fold(Vector3::zeros(), |acc, k| {
                acc + second_derivative_of_m(&angles, k, l) * rates * rates[k]
            });
            let mut target = wrt_angles.column_mut(l);
            target += column;
        }

        let mut jac = JacobianBuilder::new(K3D, jac_pos.ncols());
        jac.add_product(0, &m, &jac_acc);
        jac.add_product(0, &wrt_rates, &jac_vel);
        jac.add_product(0, &wrt_angles, &jac_pos);
        jac.build()
    }
}
