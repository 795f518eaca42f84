//! Central-difference verification of analytic constraint Jacobians.

use anyhow::{Context, Result};
use nalgebra::DMatrix;
use tracing::debug;

use crate::jacobian::{self, to_dense};
use crate::traits::Constraint;
use crate::variables::OptimizationVariables;

/// Worst disagreement between an analytic and a numerical Jacobian block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeCheck {
    pub max_abs_error: f64,
    /// Error scaled by `max(1, |numeric|)`.
    pub max_rel_error: f64,
    /// `(row, col)` of the largest relative error.
    pub worst: Option<(usize, usize)>,
}

/// Dense Jacobian block of `constraint` w.r.t. `var_set` as filled by the
/// constraint itself.
pub fn analytic_jacobian_block<C: Constraint + ?Sized>(
    constraint: &C,
    vars: &OptimizationVariables,
    var_set: &str,
) -> Result<DMatrix<f64>> {
    let cols = vars.get(var_set)?.rows();
    let mut jac = jacobian::zeros(constraint.rows(), cols);
    constraint.fill_jacobian_block(vars, var_set, &mut jac)?;
    Ok(to_dense(&jac))
}

/// Central differences with step `base_step * (1 + |x_i|)` per column.
pub fn numerical_jacobian_block<C: Constraint + ?Sized>(
    constraint: &C,
    vars: &OptimizationVariables,
    var_set: &str,
    base_step: f64,
) -> Result<DMatrix<f64>> {
    let x = vars.get(var_set)?.values();
    let mut jac = DMatrix::zeros(constraint.rows(), x.len());
    let mut perturbed_vars = vars.clone();

    for col in 0..x.len() {
        let step = base_step * (1.0 + x[col].abs());
        let mut perturbed = x.clone();

        perturbed[col] = x[col] + step;
        perturbed_vars.set_values_of(var_set, &perturbed)?;
        let plus = constraint
            .values(&perturbed_vars)
            .with_context(|| format!("Evaluating \"{var_set}\" column {col} forward."))?;

        perturbed[col] = x[col] - step;
        perturbed_vars.set_values_of(var_set, &perturbed)?;
        let minus = constraint
            .values(&perturbed_vars)
            .with_context(|| format!("Evaluating \"{var_set}\" column {col} backward."))?;

        jac.set_column(col, &((plus - minus) / (2.0 * step)));
    }

    Ok(jac)
}

pub fn check_jacobian_block<C: Constraint + ?Sized>(
    constraint: &C,
    vars: &OptimizationVariables,
    var_set: &str,
    base_step: f64,
) -> Result<DerivativeCheck> {
    let analytic = analytic_jacobian_block(constraint, vars, var_set)?;
    let numeric = numerical_jacobian_block(constraint, vars, var_set, base_step)?;

    let mut check = DerivativeCheck {
        max_abs_error: 0.0,
        max_rel_error: 0.0,
        worst: None,
    };
    for col in 0..analytic.ncols() {
        for row in 0..analytic.nrows() {
            let abs = (analytic[(row, col)] - numeric[(row, col)]).abs();
            let rel = abs / numeric[(row, col)].abs().max(1.0);
            check.max_abs_error = check.max_abs_error.max(abs);
            if rel > check.max_rel_error {
                check.max_rel_error = rel;
                check.worst = Some((row, col));
            }
        }
    }

    debug!(
        constraint = constraint.name(),
        var_set,
        max_abs_error = check.max_abs_error,
        max_rel_error = check.max_rel_error,
        "Checked Jacobian block"
    );
    Ok(check)
}
