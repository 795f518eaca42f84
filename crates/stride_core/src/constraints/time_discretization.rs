use anyhow::{bail, Result};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::jacobian::{Jacobian, JacobianBuilder};
use crate::traits::{Constraint, InstanceConstraint};
use crate::types::Bounds;
use crate::variables::OptimizationVariables;

/// Grid spacing below this is treated as landing on the final instant.
const TIME_EPS: f64 = 1e-10;

/// Uniform spacing of the instants a constraint is enforced at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscretizationSettings {
    pub dt: f64,
}

impl Default for DiscretizationSettings {
    fn default() -> Self {
        Self { dt: 0.1 }
    }
}

impl DiscretizationSettings {
    /// `0, dt, 2dt, …` strictly below `total`, then `total` itself.
    pub fn evaluation_times(&self, total: f64) -> Result<Vec<f64>> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            bail!("Discretization step must be positive, got {}.", self.dt);
        }
        if !(total.is_finite() && total > 0.0) {
            bail!("Total duration must be positive, got {total}.");
        }

        let mut times: Vec<f64> = (0_usize..)
            .map(|k| k as f64 * self.dt)
            .take_while(|t| *t < total - TIME_EPS)
            .collect();
        times.push(total);
        Ok(times)
    }
}

/// Enforces an [`InstanceConstraint`] at a fixed, ordered set of instants.
///
/// Rows of instant `k` are `k * rows_per_instance ..`. Each call rebuilds the
/// inner snapshot from the variables it is given.
#[derive(Debug, Clone)]
pub struct TimeDiscretizationConstraint<C> {
    name: String,
    times: Vec<f64>,
    inner: C,
}

impl<C: InstanceConstraint> TimeDiscretizationConstraint<C> {
    pub fn new(name: impl Into<String>, times: Vec<f64>, inner: C) -> Result<Self> {
        let name = name.into();
        if times.is_empty() {
            bail!("Constraint \"{name}\" needs at least one evaluation time.");
        }
        if let Some(t) = times.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
            bail!("Constraint \"{name}\" has invalid evaluation time {t}.");
        }
        if let Some(w) = times.windows(2).find(|w| w[1] < w[0]) {
            bail!(
                "Evaluation times of \"{name}\" must be non-decreasing ({} follows {}).",
                w[1],
                w[0]
            );
        }

        debug!(
            constraint = %name,
            instances = times.len(),
            rows = times.len() * inner.rows_per_instance(),
            "Built time-discretized constraint"
        );
        Ok(Self { name, times, inner })
    }

    pub fn uniform(
        name: impl Into<String>,
        total: f64,
        settings: &DiscretizationSettings,
        inner: C,
    ) -> Result<Self> {
        Self::new(name, settings.evaluation_times(total)?, inner)
    }

    pub fn evaluation_times(&self) -> &[f64] {
        &self.times
    }

    pub fn instance_count(&self) -> usize {
        self.times.len()
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: InstanceConstraint> Constraint for TimeDiscretizationConstraint<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> usize {
        self.times.len() * self.inner.rows_per_instance()
    }

    fn values(&self, vars: &OptimizationVariables) -> Result<DVector<f64>> {
        let snapshot = self.inner.snapshot(vars)?;
        let mut g = DVector::zeros(self.rows());
        for (k, &t) in self.times.iter().enumerate() {
            self.inner.update_constraint_at_instance(&snapshot, t, k, &mut g);
        }
        trace!(constraint = %self.name, norm = g.norm(), "Evaluated constraint");
        Ok(g)
    }

    fn bounds(&self) -> Vec<Bounds> {
        let mut bounds = vec![Bounds::ZERO; self.rows()];
        for (k, &t) in self.times.iter().enumerate() {
            self.inner.update_bounds_at_instance(t, k, &mut bounds);
        }
        bounds
    }

    fn fill_jacobian_block(
        &self,
        vars: &OptimizationVariables,
        var_set: &str,
        jac: &mut Jacobian,
    ) -> Result<()> {
        assert_eq!(
            jac.nrows(),
            self.rows(),
            "Jacobian block of \"{}\" has the wrong row count",
            self.name
        );

        let snapshot = self.inner.snapshot(vars)?;
        let mut builder = JacobianBuilder::new(jac.nrows(), jac.ncols());
        for (k, &t) in self.times.iter().enumerate() {
            self.inner
                .update_jacobian_at_instance(&snapshot, t, k, var_set, &mut builder);
        }
        *jac = builder.build();
        Ok(())
    }
}
