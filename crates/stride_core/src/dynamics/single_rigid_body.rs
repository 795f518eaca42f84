//! Single rigid body with point contacts.
//!
//! All limb masses are lumped into the base, and the inertia is taken
//! constant in world frame:
//!
//! ```text
//! a_lin = Σ f_i / m
//! a_ang = I⁻¹ (Σ (p_i − c) × f_i − ω × I ω)
//! ```
//!
//! Gravity is not part of the returned acceleration; the constraint places it
//! in the bounds of the linear z row.

use anyhow::{bail, Context, Result};
use nalgebra::{Matrix3, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ModelState;
use crate::jacobian::{Jacobian, JacobianBuilder};
use crate::traits::DynamicModel;
use crate::types::{ANGULAR, K6D, LINEAR};

/// Standard gravity in m/s².
pub const GRAVITY: f64 = 9.80665;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleRigidBodyParams {
    pub mass: f64,
    /// `[Ixx, Iyy, Izz, Ixy, Ixz, Iyz]` in world frame. Products of inertia
    /// enter the tensor negated.
    pub inertia: [f64; 6],
    pub gravity: f64,
}

impl Default for SingleRigidBodyParams {
    fn default() -> Self {
        Self {
            mass: 20.0,
            inertia: [1.209488, 5.5837, 6.056973, 0.005, -0.190812, -0.012668],
            gravity: GRAVITY,
        }
    }
}

impl SingleRigidBodyParams {
    pub fn inertia_tensor(&self) -> Matrix3<f64> {
        let [ixx, iyy, izz, ixy, ixz, iyz] = self.inertia;
        Matrix3::new(
            ixx, -ixy, -ixz, //
            -ixy, iyy, -iyz, //
            -ixz, -iyz, izz,
        )
    }
}

#[derive(Debug, Clone)]
pub struct SingleRigidBodyDynamics {
    mass: f64,
    gravity: f64,
    inertia: Matrix3<f64>,
    inertia_inv: Matrix3<f64>,
    ee_count: usize,
}

impl SingleRigidBodyDynamics {
    pub fn new(params: &SingleRigidBodyParams, ee_count: usize) -> Result<Self> {
        if !(params.mass.is_finite() && params.mass > 0.0) {
            bail!("Body mass must be positive, got {}.", params.mass);
        }
        if !params.gravity.is_finite() {
            bail!("Gravity must be finite, got {}.", params.gravity);
        }
        let inertia = params.inertia_tensor();
        let inertia_inv = inertia
            .try_inverse()
            .context("Inertia tensor is singular.")?;

        debug!(
            mass = params.mass,
            gravity = params.gravity,
            ee_count,
            "Built single rigid body model"
        );

        Ok(Self {
            mass: params.mass,
            gravity: params.gravity,
            inertia,
            inertia_inv,
            ee_count,
        })
    }

    pub fn inertia(&self) -> &Matrix3<f64> {
        &self.inertia
    }

    fn total_force(state: &ModelState) -> Vector3<f64> {
        state.ee_force.iter().sum()
    }

    /// Angular block only, the linear acceleration does not depend on the
    /// queried variables.
    fn angular_only(&self, lhs: &Matrix3<f64>, jac: &Jacobian) -> Jacobian {
        let mut out = JacobianBuilder::new(K6D, jac.ncols());
        out.add_product(ANGULAR, &(self.inertia_inv * lhs), jac);
        out.build()
    }
}

impl DynamicModel for SingleRigidBodyDynamics {
    fn ee_count(&self) -> usize {
        self.ee_count
    }

    fn gravity(&self) -> f64 {
        self.gravity
    }

    fn mass(&self) -> f64 {
        self.mass
    }

    fn base_acceleration(&self, state: &ModelState) -> Vector6<f64> {
        debug_assert_eq!(state.ee_count(), self.ee_count);

        let torque: Vector3<f64> = state
            .ee_force
            .iter()
            .zip(&state.ee_pos)
            .map(|(f, p)| (p - state.com_pos).cross(f))
            .sum();
        let gyroscopic = state.omega.cross(&(self.inertia * state.omega));

        let mut acc = Vector6::zeros();
        acc.fixed_rows_mut::<3>(ANGULAR)
            .copy_from(&(self.inertia_inv * (torque - gyroscopic)));
        acc.fixed_rows_mut::<3>(LINEAR)
            .copy_from(&(Self::total_force(state) / self.mass));
        acc
    }

    fn jacobian_of_acc_wrt_base_lin(
        &self,
        state: &ModelState,
        jac_base_lin_pos: &Jacobian,
    ) -> Jacobian {
        // ∂/∂c Σ (p_i − c) × f_i = [Σ f_i]×
        let lhs = Self::total_force(state).cross_matrix();
        self.angular_only(&lhs, jac_base_lin_pos)
    }

    fn jacobian_of_acc_wrt_base_ang(
        &self,
        state: &ModelState,
        jac_ang_vel: &Jacobian,
    ) -> Jacobian {
        // ∂(ω × Iω)/∂ω = [ω]× I − [Iω]×
        let lhs = (self.inertia * state.omega).cross_matrix()
            - state.omega.cross_matrix() * self.inertia;
        self.angular_only(&lhs, jac_ang_vel)
    }

    fn jacobian_of_acc_wrt_force(
        &self,
        state: &ModelState,
        jac_force: &Jacobian,
        ee: usize,
    ) -> Jacobian {
        let lever = (state.ee_pos[ee] - state.com_pos).cross_matrix();
        let mut out = JacobianBuilder::new(K6D, jac_force.ncols());
        out.add_product(ANGULAR, &(self.inertia_inv * lever), jac_force);
        out.add_block(LINEAR, jac_force, 1.0 / self.mass);
        out.build()
    }

    fn jacobian_of_acc_wrt_ee_pos(
        &self,
        state: &ModelState,
        jac_ee_pos: &Jacobian,
        ee: usize,
    ) -> Jacobian {
        // ∂(p × f)/∂p = −[f]×
        let lhs = -state.ee_force[ee].cross_matrix();
        self.angular_only(&lhs, jac_ee_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::to_dense;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use nalgebra_sparse::CsrMatrix;

    fn model() -> SingleRigidBodyDynamics {
        SingleRigidBodyDynamics::new(&SingleRigidBodyParams::default(), 2).expect("valid model")
    }

    fn state() -> ModelState {
        ModelState {
            com_pos: Vector3::new(0.1, -0.05, 0.5),
            omega: Vector3::new(0.3, -0.7, 0.2),
            ee_force: vec![Vector3::new(5.0, -3.0, 90.0), Vector3::new(-2.0, 4.0, 110.0)],
            ee_pos: vec![Vector3::new(0.35, 0.2, 0.0), Vector3::new(-0.3, -0.25, 0.02)],
        }
    }

    fn identity() -> Jacobian {
        CsrMatrix::from(&DMatrix::<f64>::identity(3, 3))
    }

    /// Central differences of the base acceleration w.r.t. a 3-vector that
    /// `perturb` writes into the state.
    fn numeric(
        model: &SingleRigidBodyDynamics,
        perturb: impl Fn(&mut ModelState, usize, f64),
    ) -> DMatrix<f64> {
        let h = 1e-6;
        let mut out = DMatrix::zeros(K6D, 3);
        for col in 0..3 {
            let mut plus = state();
            perturb(&mut plus, col, h);
            let mut minus = state();
            perturb(&mut minus, col, -h);
            let diff =
                (model.base_acceleration(&plus) - model.base_acceleration(&minus)) / (2.0 * h);
            out.set_column(col, &diff);
        }
        out
    }

    #[test]
    fn static_support_has_zero_angular_and_g_linear_z() {
        let model = model();
        let com = Vector3::new(0.0, 0.0, 0.5);
        let state = ModelState {
            com_pos: com,
            omega: Vector3::zeros(),
            ee_force: vec![
                Vector3::new(0.0, 0.0, model.mass() * model.gravity()),
                Vector3::zeros(),
            ],
            ee_pos: vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.3, 0.2, 0.0)],
        };
        let acc = model.base_acceleration(&state);
        assert_relative_eq!(
            acc,
            Vector6::new(0.0, 0.0, 0.0, 0.0, 0.0, GRAVITY),
            epsilon = 1e-12
        );
    }

    #[test]
    fn jacobian_wrt_base_lin_matches_finite_differences() {
        let model = model();
        let analytic = to_dense(&model.jacobian_of_acc_wrt_base_lin(&state(), &identity()));
        let numeric = numeric(&model, |s, col, d| s.com_pos[col] += d);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-5);
    }

    #[test]
    fn jacobian_wrt_angular_velocity_matches_finite_differences() {
        let model = model();
        let analytic = to_dense(&model.jacobian_of_acc_wrt_base_ang(&state(), &identity()));
        let numeric = numeric(&model, |s, col, d| s.omega[col] += d);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-5);
    }

    #[test]
    fn jacobian_wrt_force_and_position_match_finite_differences() {
        let model = model();
        for ee in 0..2 {
            let analytic = to_dense(&model.jacobian_of_acc_wrt_force(&state(), &identity(), ee));
            let numeric_f = numeric(&model, |s, col, d| s.ee_force[ee][col] += d);
            assert_relative_eq!(analytic, numeric_f, epsilon = 1e-5);

            let analytic = to_dense(&model.jacobian_of_acc_wrt_ee_pos(&state(), &identity(), ee));
            let numeric_p = numeric(&model, |s, col, d| s.ee_pos[ee][col] += d);
            assert_relative_eq!(analytic, numeric_p, epsilon = 1e-5);
        }
    }

    #[test]
    fn composes_with_wider_input_jacobians() {
        let model = model();
        let input = CsrMatrix::from(&DMatrix::from_row_slice(
            3,
            5,
            &[
                1.0, 0.0, 2.0, 0.0, 0.0, //
                0.0, 0.5, 0.0, 0.0, 1.0, //
                0.0, 0.0, 0.0, 3.0, 0.0,
            ],
        ));
        let composed = to_dense(&model.jacobian_of_acc_wrt_force(&state(), &input, 1));
        let direct = to_dense(&model.jacobian_of_acc_wrt_force(&state(), &identity(), 1));
        assert_eq!(composed.shape(), (K6D, 5));
        assert_relative_eq!(composed, direct * to_dense(&input), epsilon = 1e-12);
    }

    #[test]
    fn boxed_model_forwards_to_inner() {
        let boxed: Box<dyn DynamicModel> = Box::new(model());
        assert_eq!(boxed.ee_count(), 2);
        assert_relative_eq!(
            boxed.base_acceleration(&state()),
            model().base_acceleration(&state()),
            epsilon = 1e-15
        );
    }

    #[test]
    fn rejects_non_positive_mass_and_singular_inertia() {
        let params = SingleRigidBodyParams {
            mass: 0.0,
            ..SingleRigidBodyParams::default()
        };
        let err = SingleRigidBodyDynamics::new(&params, 1).expect_err("zero mass");
        assert!(err.to_string().contains("mass"));

        let params = SingleRigidBodyParams {
            inertia: [0.0; 6],
            ..SingleRigidBodyParams::default()
        };
        let err = SingleRigidBodyDynamics::new(&params, 1).expect_err("singular");
        assert!(err.to_string().contains("singular"));
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: SingleRigidBodyParams =
            serde_json::from_str(r#"{ "mass": 29.5 }"#).expect("valid json");
        assert_eq!(params.mass, 29.5);
        assert_eq!(params.gravity, GRAVITY);
        assert_eq!(params.inertia, SingleRigidBodyParams::default().inertia);
    }
}
