use nalgebra::{DVector, Vector3};

use super::VariableError;
use crate::jacobian::{Jacobian, JacobianBuilder};
use crate::types::{Bounds, K3D};

/// Shortest phase the default bounds allow, in seconds.
pub const MIN_PHASE_DURATION: f64 = 0.01;

/// Contact-phase durations of one limb.
///
/// The total time is fixed, so only the first `n - 1` durations are
/// variables; the last phase absorbs whatever time is left. Unless
/// overridden, each optimized duration lies in
/// `[MIN_PHASE_DURATION, total_time]`, so no phase collapses to zero length.
#[derive(Debug, Clone)]
pub struct PhaseDurations {
    name: String,
    durations: Vec<f64>,
    total_time: f64,
    bounds: Bounds,
}

impl PhaseDurations {
    pub fn new(name: impl Into<String>, durations: Vec<f64>) -> Result<Self, VariableError> {
        let name = name.into();
        if durations.is_empty() {
            return Err(VariableError::InvalidDuration {
                name,
                index: 0,
                value: 0.0,
            });
        }
        if let Some((index, &value)) = durations
            .iter()
            .enumerate()
            .find(|(_, d)| !(d.is_finite() && **d > 0.0))
        {
            return Err(VariableError::InvalidDuration { name, index, value });
        }
        let total_time: f64 = durations.iter().sum();
        Ok(Self {
            name,
            durations,
            total_time,
            bounds: Bounds::new(MIN_PHASE_DURATION.min(total_time), total_time),
        })
    }

    /// Limits every optimized duration to `[min_duration, max_duration]`.
    pub fn with_bounds(mut self, min_duration: f64, max_duration: f64) -> Self {
        self.bounds = Bounds::new(min_duration, max_duration);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> usize {
        self.durations.len() - 1
    }

    pub fn phase_count(&self) -> usize {
        self.durations.len()
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn values(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.durations[..self.rows()])
    }

    pub fn set_values(&mut self, x: &DVector<f64>) -> Result<(), VariableError> {
        let rows = self.rows();
        if x.len() != rows {
            return Err(VariableError::DimensionMismatch {
                name: self.name.clone(),
                expected: rows,
                actual: x.len(),
            });
        }
        self.durations[..rows].copy_from_slice(x.as_slice());
        self.durations[rows] = self.total_time - x.sum();
        Ok(())
    }

    pub fn bounds(&self) -> Vec<Bounds> {
        vec![self.bounds; self.rows()]
    }

    /// Jacobian of a spline position w.r.t. these duration variables.
    ///
    /// `dx_dt` is the sensitivity of the position to the duration of
    /// `current_phase` (at fixed global time) and `xd` its velocity. Earlier
    /// phases shift the spline along the time axis; in the last phase they
    /// also stretch it, since the end time is fixed.
    pub fn jacobian_of_pos(
        &self,
        current_phase: usize,
        dx_dt: &Vector3<f64>,
        xd: &Vector3<f64>,
    ) -> Jacobian {
        let mut jac = JacobianBuilder::new(K3D, self.rows());
        let in_last_phase = current_phase == self.durations.len() - 1;

        if !in_last_phase {
            for dim in 0..K3D {
                jac.add(dim, current_phase, dx_dt[dim]);
            }
        }

        for phase in 0..current_phase {
            for dim in 0..K3D {
                let mut value = -xd[dim];
                if in_last_phase {
                    value -= dx_dt[dim];
                }
                jac.add(dim, phase, value);
            }
        }

        jac.build()
    }
}
