pub mod dynamic;
pub mod time_discretization;

pub use dynamic::{dynamic_constraint, DynamicConstraint, DYNAMIC_CONSTRAINT_NAME};
pub use time_discretization::{DiscretizationSettings, TimeDiscretizationConstraint};
