use anyhow::{bail, Result};
use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};

use super::VariableError;
use crate::types::{Bounds, Dx, K3D};

/// Position and velocity of a spline at a polynomial junction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
}

impl Node {
    pub fn new(pos: Vector3<f64>, vel: Vector3<f64>) -> Self {
        Self { pos, vel }
    }

    pub fn zero() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    /// Nodes store only position and velocity; asking for `Dx::Acc` panics.
    pub fn at(&self, deriv: Dx) -> &Vector3<f64> {
        match deriv {
            Dx::Pos => &self.pos,
            Dx::Vel => &self.vel,
            Dx::Acc => panic!("nodes store position and velocity only"),
        }
    }

    fn at_mut(&mut self, deriv: Dx) -> &mut Vector3<f64> {
        match deriv {
            Dx::Pos => &mut self.pos,
            Dx::Vel => &mut self.vel,
            Dx::Acc => panic!("nodes store position and velocity only"),
        }
    }
}

/// One scalar entry of the node array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeValueInfo {
    pub node_id: usize,
    pub deriv: Dx,
    pub dim: usize,
}

impl NodeValueInfo {
    pub fn new(node_id: usize, deriv: Dx, dim: usize) -> Self {
        Self {
            node_id,
            deriv,
            dim,
        }
    }
}

/// What a phase-based node spline represents. Decides which phases hold
/// a constant value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseNodeKind {
    /// Foot position: constant (and optimized) while in contact.
    Motion,
    /// Contact force: constant zero (not optimized) while swinging.
    Force,
}

fn deriv_slot(deriv: Dx) -> usize {
    match deriv {
        Dx::Pos => 0,
        Dx::Vel => 1,
        Dx::Acc => panic!("nodes store position and velocity only"),
    }
}

/// Hermite nodes of a 3D spline together with the mapping from optimization
/// indices to node entries.
///
/// One optimization index may drive several node entries (a foot that keeps
/// its position through a contact phase), while node entries not reached by
/// any index are fixed at their current value.
#[derive(Debug, Clone)]
pub struct NodeVariables {
    name: String,
    nodes: Vec<Node>,
    index_map: Vec<Vec<NodeValueInfo>>,
    lookup: Vec<[[Option<usize>; K3D]; 2]>,
    bounds: Vec<Bounds>,
    polys_per_phase: Option<Vec<usize>>,
}

impl NodeVariables {
    /// Every position and velocity entry of every node is a variable, laid
    /// out node by node as `pos.x, pos.y, pos.z, vel.x, vel.y, vel.z`.
    pub fn new(name: impl Into<String>, n_nodes: usize) -> Result<Self> {
        let name = name.into();
        if n_nodes < 2 {
            bail!("Node variables \"{name}\" need at least two nodes, got {n_nodes}.");
        }

        let mut index_map = Vec::with_capacity(2 * K3D * n_nodes);
        for node_id in 0..n_nodes {
            for deriv in [Dx::Pos, Dx::Vel] {
                for dim in 0..K3D {
                    index_map.push(vec![NodeValueInfo::new(node_id, deriv, dim)]);
                }
            }
        }
        Ok(Self::from_index_map(name, n_nodes, index_map, None))
    }

    /// Nodes of a limb spline whose phases alternate between contact and
    /// swing, starting in contact if `first_phase_in_contact`.
    ///
    /// Constant phases span one polynomial, changing phases
    /// `polys_per_changing_phase`. Nodes touching a constant phase have zero
    /// velocity; their position is one shared variable for `Motion` and fixed
    /// zero for `Force`.
    pub fn phase_based(
        name: impl Into<String>,
        kind: PhaseNodeKind,
        first_phase_in_contact: bool,
        phase_count: usize,
        polys_per_changing_phase: usize,
    ) -> Result<Self> {
        let name = name.into();
        if phase_count == 0 {
            bail!("Node variables \"{name}\" need at least one phase.");
        }
        if polys_per_changing_phase == 0 {
            bail!("Node variables \"{name}\" need at least one polynomial per phase.");
        }

        let constant: Vec<bool> = (0..phase_count)
            .map(|phase| {
                let in_contact = (phase % 2 == 0) == first_phase_in_contact;
                match kind {
                    PhaseNodeKind::Motion => in_contact,
                    PhaseNodeKind::Force => !in_contact,
                }
            })
            .collect();
        let polys_per_phase: Vec<usize> = constant
            .iter()
            .map(|&c| if c { 1 } else { polys_per_changing_phase })
            .collect();

        let n_nodes = polys_per_phase.iter().sum::<usize>() + 1;
        let mut in_constant_phase = vec![false; n_nodes];
        let mut starts_constant_phase = vec![false; n_nodes];
        let mut first_node = 0;
        for (phase, &n_polys) in polys_per_phase.iter().enumerate() {
            if constant[phase] {
                in_constant_phase[first_node] = true;
                in_constant_phase[first_node + 1] = true;
                starts_constant_phase[first_node] = true;
            }
            first_node += n_polys;
        }

        let mut index_map = Vec::new();
        for node_id in 0..n_nodes {
            if in_constant_phase[node_id] {
                if kind == PhaseNodeKind::Motion && starts_constant_phase[node_id] {
                    for dim in 0..K3D {
                        index_map.push(vec![
                            NodeValueInfo::new(node_id, Dx::Pos, dim),
                            NodeValueInfo::new(node_id + 1, Dx::Pos, dim),
                        ]);
                    }
                }
                continue;
            }
            for deriv in [Dx::Pos, Dx::Vel] {
                for dim in 0..K3D {
                    index_map.push(vec![NodeValueInfo::new(node_id, deriv, dim)]);
                }
            }
        }

        Ok(Self::from_index_map(
            name,
            n_nodes,
            index_map,
            Some(polys_per_phase),
        ))
    }

    fn from_index_map(
        name: String,
        n_nodes: usize,
        index_map: Vec<Vec<NodeValueInfo>>,
        polys_per_phase: Option<Vec<usize>>,
    ) -> Self {
        let mut lookup = vec![[[None; K3D]; 2]; n_nodes];
        for (idx, infos) in index_map.iter().enumerate() {
            for info in infos {
                lookup[info.node_id][deriv_slot(info.deriv)][info.dim] = Some(idx);
            }
        }
        let bounds = vec![Bounds::UNBOUNDED; index_map.len()];
        Self {
            name,
            nodes: vec![Node::zero(); n_nodes],
            index_map,
            lookup,
            bounds,
            polys_per_phase,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of optimization variables.
    pub fn rows(&self) -> usize {
        self.index_map.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn polynomial_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Polynomials per phase, for phase-based layouts.
    pub fn polys_per_phase(&self) -> Option<&[usize]> {
        self.polys_per_phase.as_deref()
    }

    pub fn boundary_nodes(&self, poly_id: usize) -> (&Node, &Node) {
        (&self.nodes[poly_id], &self.nodes[poly_id + 1])
    }

    /// Optimization index driving a node entry, if it is not fixed.
    pub fn index(&self, node_id: usize, deriv: Dx, dim: usize) -> Option<usize> {
        if deriv == Dx::Acc {
            return None;
        }
        self.lookup
            .get(node_id)
            .and_then(|slots| slots[deriv_slot(deriv)].get(dim).copied().flatten())
    }

    pub fn node_info_at(&self, idx: usize) -> &[NodeValueInfo] {
        &self.index_map[idx]
    }

    pub fn values(&self) -> DVector<f64> {
        self.values_from_nodes(&self.nodes)
    }

    pub fn set_values(&mut self, x: &DVector<f64>) -> Result<(), VariableError> {
        if x.len() != self.rows() {
            return Err(VariableError::DimensionMismatch {
                name: self.name.clone(),
                expected: self.rows(),
                actual: x.len(),
            });
        }
        self.write_values(x);
        Ok(())
    }

    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    /// Pins `deriv` of `node_id` to `values` in the listed dimensions. Entries
    /// that are not optimized are left alone.
    pub fn add_bounds(&mut self, node_id: usize, deriv: Dx, dims: &[usize], values: &Vector3<f64>) {
        for &dim in dims {
            if let Some(idx) = self.index(node_id, deriv, dim) {
                self.bounds[idx] = Bounds::equality(values[dim]);
            }
        }
    }

    pub fn add_start_bound(&mut self, deriv: Dx, dims: &[usize], values: &Vector3<f64>) {
        self.add_bounds(0, deriv, dims, values);
    }

    pub fn add_final_bound(&mut self, deriv: Dx, dims: &[usize], values: &Vector3<f64>) {
        let last = self.nodes.len() - 1;
        self.add_bounds(last, deriv, dims, values);
    }

    /// Straight line from `initial_pos` to `final_pos`, every node moving at
    /// the average velocity.
    pub fn initialize_towards_goal(
        &mut self,
        initial_pos: &Vector3<f64>,
        final_pos: &Vector3<f64>,
        t_total: f64,
    ) {
        let dp = final_pos - initial_pos;
        let average_velocity = dp / t_total;
        let last = (self.nodes.len() - 1) as f64;
        let desired: Vec<Node> = (0..self.nodes.len())
            .map(|i| Node::new(initial_pos + dp * (i as f64 / last), average_velocity))
            .collect();
        let x = self.values_from_nodes(&desired);
        self.write_values(&x);
    }

    /// Every optimized position set to `pos`, every optimized velocity zero.
    pub fn initialize_constant(&mut self, pos: &Vector3<f64>) {
        let desired = vec![Node::new(*pos, Vector3::zeros()); self.nodes.len()];
        let x = self.values_from_nodes(&desired);
        self.write_values(&x);
    }

    fn values_from_nodes(&self, nodes: &[Node]) -> DVector<f64> {
        DVector::from_iterator(
            self.index_map.len(),
            self.index_map.iter().map(|infos| {
                let info = infos[0];
                nodes[info.node_id].at(info.deriv)[info.dim]
            }),
        )
    }

    fn write_values(&mut self, x: &DVector<f64>) {
        for (idx, infos) in self.index_map.iter().enumerate() {
            for info in infos {
                self.nodes[info.node_id].at_mut(info.deriv)[info.dim] = x[idx];
            }
        }
    }
}
