//! Optimization variables read by the constraints.
//!
//! The container owns every variable set; constraints only ever borrow it
//! and write Jacobian entries into the column range of the set they are
//! asked about.

pub mod durations;
pub mod id;
pub mod nodes;

pub use durations::{PhaseDurations, MIN_PHASE_DURATION};
pub use id::VariableSetId;
pub use nodes::{Node, NodeValueInfo, NodeVariables, PhaseNodeKind};

use nalgebra::DVector;
use thiserror::Error;

use crate::types::Bounds;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VariableError {
    #[error("unknown variable set \"{0}\"")]
    Unknown(String),
    #[error("variable set \"{name}\" is not a {expected} set")]
    WrongKind { name: String, expected: &'static str },
    #[error("variable set \"{0}\" already exists")]
    Duplicate(String),
    #[error("variable set \"{name}\" expects {expected} values, got {actual}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("phase duration {index} of \"{name}\" must be positive and finite, got {value}")]
    InvalidDuration {
        name: String,
        index: usize,
        value: f64,
    },
}

/// A named block of decision variables.
#[derive(Debug, Clone)]
pub enum VariableSet {
    Nodes(NodeVariables),
    Durations(PhaseDurations),
}

impl VariableSet {
    pub fn name(&self) -> &str {
        match self {
            Self::Nodes(n) => n.name(),
            Self::Durations(d) => d.name(),
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            Self::Nodes(n) => n.rows(),
            Self::Durations(d) => d.rows(),
        }
    }

    pub fn values(&self) -> DVector<f64> {
        match self {
            Self::Nodes(n) => n.values(),
            Self::Durations(d) => d.values(),
        }
    }

    pub fn set_values(&mut self, x: &DVector<f64>) -> Result<(), VariableError> {
        match self {
            Self::Nodes(n) => n.set_values(x),
            Self::Durations(d) => d.set_values(x),
        }
    }

    pub fn bounds(&self) -> Vec<Bounds> {
        match self {
            Self::Nodes(n) => n.bounds().to_vec(),
            Self::Durations(d) => d.bounds(),
        }
    }
}

impl From<NodeVariables> for VariableSet {
    fn from(value: NodeVariables) -> Self {
        Self::Nodes(value)
    }
}

impl From<PhaseDurations> for VariableSet {
    fn from(value: PhaseDurations) -> Self {
        Self::Durations(value)
    }
}

/// Ordered collection of uniquely named variable sets. The order fixes the
/// column layout of the full variable vector.
#[derive(Debug, Clone, Default)]
pub struct OptimizationVariables {
    sets: Vec<VariableSet>,
}

impl OptimizationVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, set: impl Into<VariableSet>) -> Result<(), VariableError> {
        let set = set.into();
        if self.sets.iter().any(|s| s.name() == set.name()) {
            return Err(VariableError::Duplicate(set.name().to_string()));
        }
        self.sets.push(set);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableSet> {
        self.sets.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.iter().any(|s| s.name() == name)
    }

    pub fn get(&self, name: &str) -> Result<&VariableSet, VariableError> {
        self.sets
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| VariableError::Unknown(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut VariableSet, VariableError> {
        self.sets
            .iter_mut()
            .find(|s| s.name() == name)
            .ok_or_else(|| VariableError::Unknown(name.to_string()))
    }

    pub fn nodes(&self, name: &str) -> Result<&NodeVariables, VariableError> {
        match self.get(name)? {
            VariableSet::Nodes(n) => Ok(n),
            VariableSet::Durations(_) => Err(VariableError::WrongKind {
                name: name.to_string(),
                expected: "node",
            }),
        }
    }

    pub fn nodes_mut(&mut self, name: &str) -> Result<&mut NodeVariables, VariableError> {
        match self.get_mut(name)? {
            VariableSet::Nodes(n) => Ok(n),
            VariableSet::Durations(_) => Err(VariableError::WrongKind {
                name: name.to_string(),
                expected: "node",
            }),
        }
    }

    pub fn durations(&self, name: &str) -> Result<&PhaseDurations, VariableError> {
        match self.get(name)? {
            VariableSet::Durations(d) => Ok(d),
            VariableSet::Nodes(_) => Err(VariableError::WrongKind {
                name: name.to_string(),
                expected: "phase duration",
            }),
        }
    }

    pub fn set_values_of(&mut self, name: &str, x: &DVector<f64>) -> Result<(), VariableError> {
        self.get_mut(name)?.set_values(x)
    }

    /// Total number of decision variables.
    pub fn rows(&self) -> usize {
        self.sets.iter().map(VariableSet::rows).sum()
    }

    /// First column of `name` in the full variable vector.
    pub fn column_offset(&self, name: &str) -> Result<usize, VariableError> {
        let mut offset = 0;
        for set in &self.sets {
            if set.name() == name {
                return Ok(offset);
            }
            offset += set.rows();
        }
        Err(VariableError::Unknown(name.to_string()))
    }

    pub fn values(&self) -> DVector<f64> {
        let mut x = DVector::zeros(self.rows());
        let mut offset = 0;
        for set in &self.sets {
            let rows = set.rows();
            x.rows_mut(offset, rows).copy_from(&set.values());
            offset += rows;
        }
        x
    }

    pub fn set_values(&mut self, x: &DVector<f64>) -> Result<(), VariableError> {
        let rows = self.rows();
        if x.len() != rows {
            return Err(VariableError::DimensionMismatch {
                name: "all variables".to_string(),
                expected: rows,
                actual: x.len(),
            });
        }
        let mut offset = 0;
        for set in &mut self.sets {
            let n = set.rows();
            set.set_values(&x.rows(offset, n).into_owned())?;
            offset += n;
        }
        Ok(())
    }

    pub fn bounds(&self) -> Vec<Bounds> {
        self.sets.iter().flat_map(VariableSet::bounds).collect()
    }
}
