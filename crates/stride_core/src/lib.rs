//! The `stride_core` crate formulates the rigid-body dynamics constraint of a
//! legged-robot trajectory optimizer, together with its exact sparse
//! Jacobians w.r.t. every optimization variable.
//!
//! Key components:
//! - **Variables**: spline nodes for base and limbs plus limb phase durations,
//!   kept in an [`OptimizationVariables`] container under canonical names.
//! - **Splines**: cubic Hermite splines over those nodes, and an Euler-angle
//!   converter for the base orientation.
//! - **Dynamics**: the [`DynamicModel`] trait and a single-rigid-body model.
//! - **Constraints**: a time-discretization engine and the dynamics
//!   constraint built on it; [`Problem`] stacks constraints for a solver.
pub mod constraints;
pub mod derivative_check;
pub mod dynamics;
pub mod jacobian;
pub mod problem;
pub mod spline;
pub mod traits;
pub mod types;
pub mod variables;

#[cfg(test)]
mod test_support;

pub use constraints::{
    dynamic_constraint, DiscretizationSettings, DynamicConstraint, TimeDiscretizationConstraint,
};
pub use dynamics::{ModelState, SingleRigidBodyDynamics, SingleRigidBodyParams};
pub use jacobian::{Jacobian, JacobianBuilder};
pub use problem::Problem;
pub use traits::{Constraint, DynamicModel, InstanceConstraint};
pub use types::{Bounds, Dim6D, Dx};
pub use variables::{
    NodeVariables, OptimizationVariables, PhaseDurations, PhaseNodeKind, VariableError,
};
