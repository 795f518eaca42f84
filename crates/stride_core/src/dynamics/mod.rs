//! Dynamics models the constraint can be bound to.

pub mod single_rigid_body;

pub use single_rigid_body::{SingleRigidBodyDynamics, SingleRigidBodyParams};

use nalgebra::Vector3;

/// Quantities a dynamics model is evaluated at, for one instant only.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    pub com_pos: Vector3<f64>,
    /// Base angular velocity in world frame.
    pub omega: Vector3<f64>,
    pub ee_force: Vec<Vector3<f64>>,
    pub ee_pos: Vec<Vector3<f64>>,
}

impl ModelState {
    pub fn ee_count(&self) -> usize {
        self.ee_force.len()
    }
}
