//! Splines built on top of the current node and duration variables.
//!
//! A spline borrows the variable sets it is built from, so it always reflects
//! the values of the variable container it was created with and has to be
//! rebuilt after the solver moves the variables.

pub mod euler;
pub mod polynomial;

pub use euler::EulerConverter;
pub use polynomial::{CubicHermitePolynomial, Side};

use anyhow::{bail, Context, Result};

use crate::jacobian::{self, Jacobian, JacobianBuilder};
use crate::types::{Dx, LinearState, K3D};
use crate::variables::{id, NodeVariables, OptimizationVariables, PhaseDurations};

/// Instants this close to a polynomial boundary belong to the earlier one.
const SEGMENT_EPS: f64 = 1e-10;

/// Phase structure of a spline whose timing is driven by phase durations.
#[derive(Debug, Clone, Copy)]
struct PhaseTiming<'a> {
    durations: &'a PhaseDurations,
    polys_per_phase: &'a [usize],
}

/// Piecewise cubic Hermite spline through a set of node variables.
#[derive(Debug, Clone)]
pub struct NodeSpline<'a> {
    nodes: &'a NodeVariables,
    polys: Vec<CubicHermitePolynomial>,
    timing: Option<PhaseTiming<'a>>,
}

impl<'a> NodeSpline<'a> {
    /// Spline with fixed polynomial durations.
    pub fn from_durations(nodes: &'a NodeVariables, poly_durations: &[f64]) -> Result<Self> {
        if poly_durations.len() != nodes.polynomial_count() {
            bail!(
                "Spline \"{}\" has {} polynomials but {} durations were given.",
                nodes.name(),
                nodes.polynomial_count(),
                poly_durations.len()
            );
        }
        if poly_durations.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
            bail!(
                "Spline \"{}\" needs positive polynomial durations.",
                nodes.name()
            );
        }
        Ok(Self {
            nodes,
            polys: build_polynomials(nodes, poly_durations),
            timing: None,
        })
    }

    /// Spline whose polynomials split each phase duration evenly.
    pub fn from_phase_durations(
        nodes: &'a NodeVariables,
        durations: &'a PhaseDurations,
    ) -> Result<Self> {
        let Some(polys_per_phase) = nodes.polys_per_phase() else {
            bail!(
                "Spline \"{}\" is not phase based and cannot follow \"{}\".",
                nodes.name(),
                durations.name()
            );
        };
        if polys_per_phase.len() != durations.phase_count() {
            bail!(
                "Spline \"{}\" has {} phases but \"{}\" has {}.",
                nodes.name(),
                polys_per_phase.len(),
                durations.name(),
                durations.phase_count()
            );
        }

        let poly_durations: Vec<f64> = polys_per_phase
            .iter()
            .zip(durations.durations())
            .flat_map(|(&n_polys, &duration)| {
                std::iter::repeat(duration / n_polys as f64).take(n_polys)
            })
            .collect();

        Ok(Self {
            nodes,
            polys: build_polynomials(nodes, &poly_durations),
            timing: Some(PhaseTiming {
                durations,
                polys_per_phase,
            }),
        })
    }

    pub fn nodes(&self) -> &'a NodeVariables {
        self.nodes
    }

    pub fn polynomials(&self) -> &[CubicHermitePolynomial] {
        &self.polys
    }

    pub fn total_time(&self) -> f64 {
        self.polys.iter().map(CubicHermitePolynomial::duration).sum()
    }

    /// Polynomial containing `t` and the local time inside it.
    ///
    /// Panics if `t` lies outside the spline's time domain.
    pub fn segment(&self, t: f64) -> (usize, f64) {
        let total = self.total_time();
        assert!(
            t.is_finite() && t >= -SEGMENT_EPS && t <= total + SEGMENT_EPS,
            "time {t} outside the domain [0, {total}] of spline \"{}\"",
            self.nodes.name()
        );

        let mut t_start = 0.0;
        for (i, poly) in self.polys.iter().enumerate() {
            let t_end = t_start + poly.duration();
            if t <= t_end + SEGMENT_EPS {
                return (i, t - t_start);
            }
            t_start = t_end;
        }
        let last = self.polys.len() - 1;
        (last, t - (t_start - self.polys[last].duration()))
    }

    pub fn point(&self, t: f64) -> LinearState {
        let (poly_id, t_local) = self.segment(t);
        self.polys[poly_id].point(t_local)
    }

    /// Jacobian of the `dxdt` quantity at `t` w.r.t. the node variables.
    /// Only the two nodes of the active polynomial contribute.
    pub fn jacobian_wrt_nodes(&self, t: f64, dxdt: Dx) -> Jacobian {
        let (poly_id, t_local) = self.segment(t);
        let poly = &self.polys[poly_id];
        let mut jac = JacobianBuilder::new(K3D, self.nodes.rows());

        for (side, node_id) in [(Side::Start, poly_id), (Side::End, poly_id + 1)] {
            for node_deriv in [Dx::Pos, Dx::Vel] {
                let value = poly.derivative_wrt_node(dxdt, side, node_deriv, t_local);
                for dim in 0..K3D {
                    if let Some(idx) = self.nodes.index(node_id, node_deriv, dim) {
                        jac.add(dim, idx, value);
                    }
                }
            }
        }

        jac.build()
    }

    /// Jacobian of the position at `t` w.r.t. the phase-duration variables.
    /// Has zero columns for splines with fixed timing.
    pub fn jacobian_of_pos_wrt_durations(&self, t: f64) -> Jacobian {
        let Some(timing) = self.timing else {
            return jacobian::zeros(K3D, 0);
        };

        let (poly_id, t_local) = self.segment(t);
        let (phase, poly_in_phase) = phase_of_poly(timing.polys_per_phase, poly_id);
        let n_polys = timing.polys_per_phase[phase] as f64;

        let poly = &self.polys[poly_id];
        let vel = poly.point(t_local).vel;
        // each polynomial lasts D/n and starts poly_in_phase * D/n into the phase
        let dx_dt = (poly.derivative_of_pos_wrt_duration(t_local) - vel * poly_in_phase as f64)
            / n_polys;

        timing.durations.jacobian_of_pos(phase, &dx_dt, &vel)
    }
}

fn build_polynomials(nodes: &NodeVariables, poly_durations: &[f64]) -> Vec<CubicHermitePolynomial> {
    poly_durations
        .iter()
        .enumerate()
        .map(|(i, &duration)| {
            let (start, end) = nodes.boundary_nodes(i);
            CubicHermitePolynomial::new(start, end, duration)
        })
        .collect()
}

/// Phase index of a polynomial and its position inside that phase.
fn phase_of_poly(polys_per_phase: &[usize], poly_id: usize) -> (usize, usize) {
    let mut first = 0;
    for (phase, &n_polys) in polys_per_phase.iter().enumerate() {
        if poly_id < first + n_polys {
            return (phase, poly_id - first);
        }
        first += n_polys;
    }
    panic!("polynomial {poly_id} beyond the last phase");
}

/// Every spline the dynamics constraint reads, built once per evaluation
/// from the current variable values.
#[derive(Debug, Clone)]
pub struct SplineHolder<'a> {
    pub base_linear: NodeSpline<'a>,
    pub base_angular: EulerConverter<'a>,
    pub ee_motion: Vec<NodeSpline<'a>>,
    pub ee_force: Vec<NodeSpline<'a>>,
    /// Per limb, whether the schedule is a variable set rather than fixed.
    pub schedule_optimized: Vec<bool>,
}

impl<'a> SplineHolder<'a> {
    /// Limb timing comes from the limb's schedule variables when present,
    /// otherwise from `fixed_schedules[ee]`.
    pub fn new(
        vars: &'a OptimizationVariables,
        base_poly_durations: &[f64],
        ee_count: usize,
        fixed_schedules: &'a [PhaseDurations],
    ) -> Result<Self> {
        let base_linear =
            NodeSpline::from_durations(vars.nodes(id::BASE_LIN_NODES)?, base_poly_durations)?;
        let base_angular = EulerConverter::new(NodeSpline::from_durations(
            vars.nodes(id::BASE_ANG_NODES)?,
            base_poly_durations,
        )?);

        let mut ee_motion = Vec::with_capacity(ee_count);
        let mut ee_force = Vec::with_capacity(ee_count);
        let mut schedule_optimized = Vec::with_capacity(ee_count);
        for ee in 0..ee_count {
            let schedule_name = id::ee_schedule(ee);
            let optimized = vars.contains(&schedule_name);
            schedule_optimized.push(optimized);
            let schedule = if optimized {
                vars.durations(&schedule_name)?
            } else {
                fixed_schedules.get(ee).with_context(|| {
                    format!("No schedule variables or fixed schedule for end-effector {ee}.")
                })?
            };
            ee_motion.push(
                NodeSpline::from_phase_durations(vars.nodes(&id::ee_motion_nodes(ee))?, schedule)
                    .with_context(|| format!("Motion spline of end-effector {ee}."))?,
            );
            ee_force.push(
                NodeSpline::from_phase_durations(vars.nodes(&id::ee_force_nodes(ee))?, schedule)
                    .with_context(|| format!("Force spline of end-effector {ee}."))?,
            );
        }

        Ok(Self {
            base_linear,
            base_angular,
            ee_motion,
            ee_force,
            schedule_optimized,
        })
    }
}
