//! Rigid-body dynamics enforced at discrete instants.
//!
//! At every instant the acceleration the model derives from the contact
//! forces has to match the acceleration of the base splines:
//!
//! ```text
//! g(t) = model_acc(t) − [ω̇(t); p̈(t)]
//! ```
//!
//! with `g` bounded to zero except linear z, which equals gravity.

use anyhow::{Context, Result};
use nalgebra::{DVector, Vector6};
use tracing::{debug, trace};

use super::time_discretization::TimeDiscretizationConstraint;
use crate::dynamics::ModelState;
use crate::jacobian::{Jacobian, JacobianBuilder};
use crate::spline::SplineHolder;
use crate::traits::{DynamicModel, InstanceConstraint};
use crate::types::{Bounds, Dim6D, Dx, ANGULAR, K3D, K6D, LINEAR};
use crate::variables::{id::VariableSetId, OptimizationVariables, PhaseDurations};

pub const DYNAMIC_CONSTRAINT_NAME: &str = "dynamic";

/// Row of dimension `dim` at instant `k`.
pub fn row(k: usize, dim: Dim6D) -> usize {
    K6D * k + dim.index()
}

#[derive(Debug, Clone)]
pub struct DynamicConstraint<M> {
    model: M,
    base_poly_durations: Vec<f64>,
    fixed_schedules: Vec<PhaseDurations>,
}

impl<M: DynamicModel> DynamicConstraint<M> {
    /// `base_poly_durations` are the polynomial durations shared by the base
    /// translation and orientation splines.
    pub fn new(model: M, base_poly_durations: Vec<f64>) -> Self {
        Self {
            model,
            base_poly_durations,
            fixed_schedules: Vec::new(),
        }
    }

    /// Phase durations of limbs whose schedule is not optimized, indexed by
    /// limb. Limbs with schedule variables ignore their entry.
    pub fn with_fixed_schedules(mut self, schedules: Vec<PhaseDurations>) -> Self {
        self.fixed_schedules = schedules;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    fn model_state(&self, splines: &SplineHolder<'_>, t: f64) -> ModelState {
        ModelState {
            com_pos: splines.base_linear.point(t).pos,
            omega: splines.base_angular.angular_velocity_in_world(t),
            ee_force: splines.ee_force.iter().map(|s| s.point(t).pos).collect(),
            ee_pos: splines.ee_motion.iter().map(|s| s.point(t).pos).collect(),
        }
    }

    /// Rows the model contributes for `id`, `None` when the set is not read
    /// (limb out of range or schedule held fixed).
    fn model_jacobian(
        &self,
        splines: &SplineHolder<'_>,
        state: &ModelState,
        t: f64,
        id: VariableSetId,
    ) -> Option<Jacobian> {
        let m = &self.model;
        let jac = match id {
            VariableSetId::BaseLinNodes => m.jacobian_of_acc_wrt_base_lin(
                state,
                &splines.base_linear.jacobian_wrt_nodes(t, Dx::Pos),
            ),
            VariableSetId::BaseAngNodes => m.jacobian_of_acc_wrt_base_ang(
                state,
                &splines.base_angular.deriv_of_ang_vel_wrt_euler_nodes(t),
            ),
            VariableSetId::EeForceNodes(ee) => m.jacobian_of_acc_wrt_force(
                state,
                &splines.ee_force.get(ee)?.jacobian_wrt_nodes(t, Dx::Pos),
                ee,
            ),
            VariableSetId::EeMotionNodes(ee) => m.jacobian_of_acc_wrt_ee_pos(
                state,
                &splines.ee_motion.get(ee)?.jacobian_wrt_nodes(t, Dx::Pos),
                ee,
            ),
            VariableSetId::EeSchedule(ee) => {
                if !*splines.schedule_optimized.get(ee)? {
                    return None;
                }
                // the schedule moves both the force and the foot position
                let jac_f = splines.ee_force.get(ee)?.jacobian_of_pos_wrt_durations(t);
                let jac_x = splines.ee_motion.get(ee)?.jacobian_of_pos_wrt_durations(t);
                let mut sum = JacobianBuilder::new(K6D, jac_f.ncols());
                sum.add_block(0, &m.jacobian_of_acc_wrt_force(state, &jac_f, ee), 1.0);
                sum.add_block(0, &m.jacobian_of_acc_wrt_ee_pos(state, &jac_x, ee), 1.0);
                sum.build()
            }
        };
        Some(jac)
    }
}

impl<M: DynamicModel> InstanceConstraint for DynamicConstraint<M> {
    type Snapshot<'a> = SplineHolder<'a> where M: 'a;

    fn rows_per_instance(&self) -> usize {
        K6D
    }

    fn snapshot<'a>(&'a self, vars: &'a OptimizationVariables) -> Result<SplineHolder<'a>> {
        SplineHolder::new(
            vars,
            &self.base_poly_durations,
            self.model.ee_count(),
            &self.fixed_schedules,
        )
        .context("Building splines for the dynamic constraint.")
    }

    fn update_constraint_at_instance(
        &self,
        splines: &SplineHolder<'_>,
        t: f64,
        k: usize,
        g: &mut DVector<f64>,
    ) {
        let acc_model = self.model.base_acceleration(&self.model_state(splines, t));

        let mut acc_spline = Vector6::zeros();
        acc_spline
            .fixed_rows_mut::<K3D>(ANGULAR)
            .copy_from(&splines.base_angular.angular_acceleration_in_world(t));
        acc_spline
            .fixed_rows_mut::<K3D>(LINEAR)
            .copy_from(&splines.base_linear.point(t).acc);

        for dim in Dim6D::ALL {
            g[row(k, dim)] = acc_model[dim.index()] - acc_spline[dim.index()];
        }
    }

    fn update_bounds_at_instance(&self, _t: f64, k: usize, bounds: &mut [Bounds]) {
        for dim in Dim6D::ALL {
            bounds[row(k, dim)] = match dim {
                Dim6D::LinZ => Bounds::equality(self.model.gravity()),
                _ => Bounds::ZERO,
            };
        }
    }

    fn update_jacobian_at_instance(
        &self,
        splines: &SplineHolder<'_>,
        t: f64,
        k: usize,
        var_set: &str,
        jac: &mut JacobianBuilder,
    ) {
        let Some(id) = VariableSetId::parse(var_set) else {
            trace!(var_set, "Dynamic constraint does not depend on set");
            return;
        };

        let state = self.model_state(splines, t);
        let Some(jac_model) = self.model_jacobian(splines, &state, t, id) else {
            trace!(var_set, "Set not read by the dynamic constraint");
            return;
        };

        let first_row = row(k, Dim6D::AngX);
        jac.add_block(first_row, &jac_model, 1.0);

        // only the base splines parametrize the acceleration directly
        match id {
            VariableSetId::BaseLinNodes => {
                let jac_acc = splines.base_linear.jacobian_wrt_nodes(t, Dx::Acc);
                jac.add_block(first_row + LINEAR, &jac_acc, -1.0);
            }
            VariableSetId::BaseAngNodes => {
                let jac_ang_acc = splines.base_angular.deriv_of_ang_acc_wrt_euler_nodes(t);
                jac.add_block(first_row + ANGULAR, &jac_ang_acc, -1.0);
            }
            _ => {}
        }
    }
}

/// Dynamic constraint enforced at `times`.
pub fn dynamic_constraint<M: DynamicModel>(
    model: M,
    times: Vec<f64>,
    base_poly_durations: Vec<f64>,
) -> Result<TimeDiscretizationConstraint<DynamicConstraint<M>>> {
    debug!(
        ee_count = model.ee_count(),
        base_polys = base_poly_durations.len(),
        "Building dynamic constraint"
    );
    TimeDiscretizationConstraint::new(
        DYNAMIC_CONSTRAINT_NAME,
        times,
        DynamicConstraint::new(model, base_poly_durations),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivative_check::{analytic_jacobian_block, check_jacobian_block};
    use crate::jacobian;
    use crate::test_support::{self, Scenario};
    use crate::traits::Constraint;
    use crate::variables::id;
    use approx::assert_relative_eq;

    #[test]
    fn rows_and_bounds_have_six_entries_per_instant() {
        let scenario = Scenario::two_limbs();
        let c = scenario.constraint();
        let n = c.instance_count();
        assert_eq!(c.rows(), 6 * n);
        assert_eq!(c.values(&scenario.vars).expect("evaluates").len(), 6 * n);
        assert_eq!(c.bounds().len(), 6 * n);
    }

    #[test]
    fn bounds_pin_linear_z_to_gravity() {
        let scenario = Scenario::two_limbs();
        let c = scenario.constraint();
        let g = c.inner().model().gravity();
        for (i, b) in c.bounds().iter().enumerate() {
            if i % 6 == Dim6D::LinZ.index() {
                assert_eq!(*b, Bounds::equality(g));
            } else {
                assert_eq!(*b, Bounds::ZERO);
            }
        }
    }

    #[test]
    fn static_stance_satisfies_every_row() {
        let scenario = Scenario::static_stance();
        let c = scenario.constraint();
        let values = c.values(&scenario.vars).expect("evaluates");
        for (i, (v, b)) in values.iter().zip(&c.bounds()).enumerate() {
            assert!(b.contains(*v, 1e-9), "row {i}: {v} outside {b:?}");
        }
        let g = c.inner().model().gravity();
        for k in 0..c.instance_count() {
            assert_relative_eq!(values[row(k, Dim6D::LinZ)], g, epsilon = 1e-9);
        }
    }

    #[test]
    fn jacobians_match_finite_differences_for_every_family() {
        let scenario = Scenario::two_limbs();
        let c = scenario.constraint();
        for name in test_support::variable_set_names(2) {
            let check = check_jacobian_block(&c, &scenario.vars, &name, 1e-6).expect("evaluates");
            assert!(check.max_rel_error < 1e-5, "{name}: {check:?}");
        }
    }

    #[test]
    fn refilling_a_block_gives_the_same_jacobian() {
        let scenario = Scenario::two_limbs();
        let c = scenario.constraint();
        for name in test_support::variable_set_names(2) {
            let cols = scenario.vars.get(&name).expect("present").rows();
            let mut jac = jacobian::zeros(c.rows(), cols);
            c.fill_jacobian_block(&scenario.vars, &name, &mut jac)
                .expect("fills");
            let once = jacobian::to_dense(&jac);
            c.fill_jacobian_block(&scenario.vars, &name, &mut jac)
                .expect("fills");
            assert_eq!(jacobian::to_dense(&jac), once, "{name}");
            assert_eq!(
                once,
                analytic_jacobian_block(&c, &scenario.vars, &name).expect("fills"),
                "{name}"
            );
        }
    }

    #[test]
    fn unknown_set_gives_zero_block() {
        let scenario = Scenario::two_limbs();
        let c = scenario.constraint();
        let mut jac = jacobian::zeros(c.rows(), 4);
        for name in ["ee-motion-nodes_7", "joint-angles"] {
            c.fill_jacobian_block(&scenario.vars, name, &mut jac)
                .expect("fills");
        }
        assert_eq!(jac.nnz(), 0);
        assert_eq!((jac.nrows(), jac.ncols()), (c.rows(), 4));
    }

    #[test]
    fn later_phase_duration_leaves_earlier_instants_unchanged() {
        let scenario = Scenario::two_limbs();
        let c = scenario.constraint();
        let schedule = id::ee_schedule(0);

        let mut moved = scenario.vars.clone();
        let mut x = moved.durations(&schedule).expect("present").values();
        x[1] += 0.05;
        moved.set_values_of(&schedule, &x).expect("valid");

        let before = c.values(&scenario.vars).expect("evaluates");
        let after = c.values(&moved).expect("evaluates");
        let jac_before = analytic_jacobian_block(&c, &scenario.vars, &schedule).expect("fills");
        let jac_after = analytic_jacobian_block(&c, &moved, &schedule).expect("fills");

        let first_phase_end = scenario.vars.durations(&schedule).expect("present").durations()[0];
        let early: Vec<usize> = c
            .evaluation_times()
            .iter()
            .enumerate()
            .filter(|(_, &t)| t < first_phase_end)
            .map(|(k, _)| k)
            .collect();
        assert!(!early.is_empty());
        for k in early {
            for dim in Dim6D::ALL {
                let r = row(k, dim);
                assert_eq!(before[r], after[r], "row {r}");
                for col in 0..jac_before.ncols() {
                    assert_eq!(jac_before[(r, col)], jac_after[(r, col)], "entry ({r}, {col})");
                }
            }
        }
        assert_ne!(before, after);
    }

    #[test]
    fn fixed_schedules_replace_missing_schedule_variables() {
        let scenario = Scenario::two_limbs();
        let mut vars = OptimizationVariables::new();
        for set in scenario.vars.iter() {
            if !matches!(VariableSetId::parse(set.name()), Some(VariableSetId::EeSchedule(_))) {
                vars.add(set.clone()).expect("unique");
            }
        }
        let fixed: Vec<PhaseDurations> = (0..2)
            .map(|ee| {
                scenario
                    .vars
                    .durations(&id::ee_schedule(ee))
                    .expect("present")
                    .clone()
            })
            .collect();

        let optimized = scenario.constraint();
        let fixed_c = TimeDiscretizationConstraint::new(
            DYNAMIC_CONSTRAINT_NAME,
            optimized.evaluation_times().to_vec(),
            DynamicConstraint::new(scenario.model(), test_support::BASE_POLY_DURATIONS.to_vec())
                .with_fixed_schedules(fixed),
        )
        .expect("valid");

        assert_relative_eq!(
            fixed_c.values(&vars).expect("evaluates"),
            optimized.values(&scenario.vars).expect("evaluates"),
            epsilon = 1e-12
        );

        // a held schedule is not a variable, so it has no sensitivity
        let mut jac = jacobian::zeros(fixed_c.rows(), 2);
        fixed_c
            .fill_jacobian_block(&vars, &id::ee_schedule(0), &mut jac)
            .expect("fills");
        assert_eq!(jac.nnz(), 0);
    }

    #[test]
    fn missing_variable_sets_are_reported() {
        let scenario = Scenario::two_limbs();
        let c = scenario.constraint();
        let err = c
            .values(&OptimizationVariables::new())
            .expect_err("no variables");
        assert!(format!("{err:#}").contains(id::BASE_LIN_NODES));
    }

    #[test]
    fn boxed_model_builds_the_same_constraint() {
        let scenario = Scenario::two_limbs();
        let boxed: Box<dyn DynamicModel> = Box::new(scenario.model());
        let c = dynamic_constraint(
            boxed,
            scenario.constraint().evaluation_times().to_vec(),
            test_support::BASE_POLY_DURATIONS.to_vec(),
        )
        .expect("valid");
        assert_relative_eq!(
            c.values(&scenario.vars).expect("evaluates"),
            scenario.constraint().values(&scenario.vars).expect("evaluates"),
            epsilon = 1e-15
        );
    }
}
