//! Canonical names of the variable sets the dynamics constraint reads.

use std::fmt;

pub const BASE_LIN_NODES: &str = "base-lin-nodes";
pub const BASE_ANG_NODES: &str = "base-ang-nodes";

const EE_MOTION_PREFIX: &str = "ee-motion-nodes_";
const EE_FORCE_PREFIX: &str = "ee-force-nodes_";
const EE_SCHEDULE_PREFIX: &str = "ee-schedule_";

pub fn ee_motion_nodes(ee: usize) -> String {
    format!("{EE_MOTION_PREFIX}{ee}")
}

pub fn ee_force_nodes(ee: usize) -> String {
    format!("{EE_FORCE_PREFIX}{ee}")
}

pub fn ee_schedule(ee: usize) -> String {
    format!("{EE_SCHEDULE_PREFIX}{ee}")
}

/// Typed form of a variable-set name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableSetId {
    BaseLinNodes,
    BaseAngNodes,
    EeMotionNodes(usize),
    EeForceNodes(usize),
    EeSchedule(usize),
}

impl VariableSetId {
    /// Returns `None` for names outside the canonical scheme.
    pub fn parse(name: &str) -> Option<Self> {
        if name == BASE_LIN_NODES {
            return Some(Self::BaseLinNodes);
        }
        if name == BASE_ANG_NODES {
            return Some(Self::BaseAngNodes);
        }
        let ee_index = |prefix: &str| {
            name.strip_prefix(prefix)
                .and_then(|rest| rest.parse::<usize>().ok())
        };
        if let Some(ee) = ee_index(EE_MOTION_PREFIX) {
            return Some(Self::EeMotionNodes(ee));
        }
        if let Some(ee) = ee_index(EE_FORCE_PREFIX) {
            return Some(Self::EeForceNodes(ee));
        }
        ee_index(EE_SCHEDULE_PREFIX).map(Self::EeSchedule)
    }
}

impl fmt::Display for VariableSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BaseLinNodes => f.write_str(BASE_LIN_NODES),
            Self::BaseAngNodes => f.write_str(BASE_ANG_NODES),
            Self::EeMotionNodes(ee) => f.write_str(&ee_motion_nodes(*ee)),
            Self::EeForceNodes(ee) => f.write_str(&ee_force_nodes(*ee)),
            Self::EeSchedule(ee) => f.write_str(&ee_schedule(*ee)),
        }
    }
}
