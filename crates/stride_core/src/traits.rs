use anyhow::Result;
use nalgebra::{DVector, Vector6};

use crate::dynamics::ModelState;
use crate::jacobian::{Jacobian, JacobianBuilder};
use crate::types::Bounds;
use crate::variables::OptimizationVariables;

/// Physical law relating contact forces to base acceleration.
///
/// Every Jacobian method takes the Jacobian of its input quantity w.r.t. some
/// variable set (3 rows) and returns the composed Jacobian of the 6D base
/// acceleration w.r.t. the same variables (6 rows, angular first).
pub trait DynamicModel {
    fn ee_count(&self) -> usize;

    /// Gravity magnitude along world -z.
    fn gravity(&self) -> f64;

    fn mass(&self) -> f64;

    /// Base acceleration `[angular; linear]` needed to balance the contact
    /// forces, excluding gravity.
    fn base_acceleration(&self, state: &ModelState) -> Vector6<f64>;

    fn jacobian_of_acc_wrt_base_lin(
        &self,
        state: &ModelState,
        jac_base_lin_pos: &Jacobian,
    ) -> Jacobian;

    fn jacobian_of_acc_wrt_base_ang(
        &self,
        state: &ModelState,
        jac_ang_vel: &Jacobian,
    ) -> Jacobian;

    fn jacobian_of_acc_wrt_force(
        &self,
        state: &ModelState,
        jac_force: &Jacobian,
        ee: usize,
    ) -> Jacobian;

    fn jacobian_of_acc_wrt_ee_pos(
        &self,
        state: &ModelState,
        jac_ee_pos: &Jacobian,
        ee: usize,
    ) -> Jacobian;
}

impl<M: DynamicModel + ?Sized> DynamicModel for Box<M> {
    fn ee_count(&self) -> usize {
        (**self).ee_count()
    }

    fn gravity(&self) -> f64 {
        (**self).gravity()
    }

    fn mass(&self) -> f64 {
        (**self).mass()
    }

    fn base_acceleration(&self, state: &ModelState) -> Vector6<f64> {
        (**self).base_acceleration(state)
    }

    fn jacobian_of_acc_wrt_base_lin(
        &self,
        state: &ModelState,
        jac_base_lin_pos: &Jacobian,
    ) -> Jacobian {
        (**self).jacobian_of_acc_wrt_base_lin(state, jac_base_lin_pos)
    }

    fn jacobian_of_acc_wrt_base_ang(
        &self,
        state: &ModelState,
        jac_ang_vel: &Jacobian,
    ) -> Jacobian {
        (**self).jacobian_of_acc_wrt_base_ang(state, jac_ang_vel)
    }

    fn jacobian_of_acc_wrt_force(
        &self,
        state: &ModelState,
        jac_force: &Jacobian,
        ee: usize,
    ) -> Jacobian {
        (**self).jacobian_of_acc_wrt_force(state, jac_force, ee)
    }

    fn jacobian_of_acc_wrt_ee_pos(
        &self,
        state: &ModelState,
        jac_ee_pos: &Jacobian,
        ee: usize,
    ) -> Jacobian {
        (**self).jacobian_of_acc_wrt_ee_pos(state, jac_ee_pos, ee)
    }
}

/// A block of constraint rows as seen by an NLP solver.
pub trait Constraint {
    fn name(&self) -> &str;

    /// Number of constraint rows.
    fn rows(&self) -> usize;

    /// Residual at the current variable values.
    fn values(&self, vars: &OptimizationVariables) -> Result<DVector<f64>>;

    fn bounds(&self) -> Vec<Bounds>;

    /// Writes the Jacobian w.r.t. the variable set `var_set` into `jac`, which
    /// must be `rows() x columns(var_set)`. Previous contents of `jac` are
    /// replaced, and sets the constraint does not depend on give a zero block.
    fn fill_jacobian_block(
        &self,
        vars: &OptimizationVariables,
        var_set: &str,
        jac: &mut Jacobian,
    ) -> Result<()>;
}

/// Per-instant hooks of a constraint enforced on a time grid.
///
/// The discretization engine takes one snapshot of the variables per call
/// and hands it to every instant, so nothing is cached between calls.
pub trait InstanceConstraint {
    /// Whatever an evaluation needs from the variables, e.g. the splines.
    type Snapshot<'a>
    where
        Self: 'a;

    fn rows_per_instance(&self) -> usize;

    fn snapshot<'a>(&'a self, vars: &'a OptimizationVariables) -> Result<Self::Snapshot<'a>>;

    /// Writes the rows of instant `k` (time `t`) into `g`.
    fn update_constraint_at_instance(
        &self,
        snapshot: &Self::Snapshot<'_>,
        t: f64,
        k: usize,
        g: &mut DVector<f64>,
    );

    /// Writes the bounds of instant `k` into `bounds`.
    fn update_bounds_at_instance(&self, t: f64, k: usize, bounds: &mut [Bounds]);

    /// Adds the Jacobian rows of instant `k` w.r.t. `var_set` into `jac`.
    fn update_jacobian_at_instance(
        &self,
        snapshot: &Self::Snapshot<'_>,
        t: f64,
        k: usize,
        var_set: &str,
        jac: &mut JacobianBuilder,
    );
}
