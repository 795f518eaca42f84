//! Solver-facing view of a variable container and its constraints.
//!
//! Constraint rows are stacked in insertion order, variable columns in the
//! order the sets were added to the container.

use anyhow::{Context, Result};
use nalgebra::DVector;
use tracing::{debug, trace};

use crate::jacobian::{self, Jacobian, JacobianBuilder};
use crate::traits::Constraint;
use crate::types::Bounds;
use crate::variables::OptimizationVariables;

pub struct Problem {
    vars: OptimizationVariables,
    constraints: Vec<Box<dyn Constraint>>,
}

impl Problem {
    pub fn new(vars: OptimizationVariables) -> Self {
        Self {
            vars,
            constraints: Vec::new(),
        }
    }

    pub fn add_constraint(&mut self, constraint: impl Constraint + 'static) {
        debug!(
            constraint = constraint.name(),
            rows = constraint.rows(),
            "Added constraint"
        );
        self.constraints.push(Box::new(constraint));
    }

    pub fn variables(&self) -> &OptimizationVariables {
        &self.vars
    }

    pub fn constraints(&self) -> &[Box<dyn Constraint>] {
        &self.constraints
    }

    pub fn variable_count(&self) -> usize {
        self.vars.rows()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.iter().map(|c| c.rows()).sum()
    }

    pub fn variable_values(&self) -> DVector<f64> {
        self.vars.values()
    }

    pub fn set_variables(&mut self, x: &DVector<f64>) -> Result<()> {
        self.vars.set_values(x)?;
        Ok(())
    }

    pub fn variable_bounds(&self) -> Vec<Bounds> {
        self.vars.bounds()
    }

    pub fn constraint_values(&self) -> Result<DVector<f64>> {
        let mut g = DVector::zeros(self.constraint_count());
        let mut row = 0;
        for c in &self.constraints {
            let values = c
                .values(&self.vars)
                .with_context(|| format!("Evaluating constraint \"{}\".", c.name()))?;
            g.rows_mut(row, values.len()).copy_from(&values);
            row += values.len();
        }
        Ok(g)
    }

    pub fn constraint_bounds(&self) -> Vec<Bounds> {
        self.constraints.iter().flat_map(|c| c.bounds()).collect()
    }

    /// Full `constraint_count x variable_count` Jacobian.
    pub fn constraint_jacobian(&self) -> Result<Jacobian> {
        let mut full = JacobianBuilder::new(self.constraint_count(), self.variable_count());
        let mut row = 0;
        for c in &self.constraints {
            let mut col = 0;
            for set in self.vars.iter() {
                let mut block = jacobian::zeros(c.rows(), set.rows());
                c.fill_jacobian_block(&self.vars, set.name(), &mut block)
                    .with_context(|| {
                        format!("Jacobian of \"{}\" w.r.t. \"{}\".", c.name(), set.name())
                    })?;
                full.add_submatrix(row, col, &block);
                col += set.rows();
            }
            row += c.rows();
        }
        let jac = full.build();
        trace!(nnz = jac.nnz(), "Assembled constraint Jacobian");
        Ok(jac)
    }
}
