//! Shared fixtures for the unit tests.

use nalgebra::{DVector, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::constraints::{
    DiscretizationSettings, DynamicConstraint, TimeDiscretizationConstraint,
    DYNAMIC_CONSTRAINT_NAME,
};
use crate::dynamics::{SingleRigidBodyDynamics, SingleRigidBodyParams};
use crate::traits::DynamicModel;
use crate::variables::{id, NodeVariables, OptimizationVariables, PhaseDurations, PhaseNodeKind};

pub const TOTAL_TIME: f64 = 1.0;
pub const BASE_POLY_DURATIONS: [f64; 4] = [0.25; 4];
const POLYS_PER_CHANGING_PHASE: usize = 2;
const SEED: u64 = 7;

/// Every variable-set name of a scenario with `ee_count` limbs.
pub fn variable_set_names(ee_count: usize) -> Vec<String> {
    let mut names = vec![id::BASE_LIN_NODES.to_string(), id::BASE_ANG_NODES.to_string()];
    for ee in 0..ee_count {
        names.push(id::ee_motion_nodes(ee));
        names.push(id::ee_force_nodes(ee));
        names.push(id::ee_schedule(ee));
    }
    names
}

pub struct Scenario {
    pub vars: OptimizationVariables,
    params: SingleRigidBodyParams,
    ee_count: usize,
}

struct Limb {
    first_phase_in_contact: bool,
    durations: Vec<f64>,
}

impl Scenario {
    /// Two limbs with optimized schedules and a seeded random assignment.
    /// No phase boundary falls on the 0.1 s evaluation grid.
    pub fn two_limbs() -> Self {
        let limbs = [
            Limb {
                first_phase_in_contact: true,
                durations: vec![0.35, 0.3, 0.35],
            },
            Limb {
                first_phase_in_contact: false,
                durations: vec![0.25, 0.5, 0.25],
            },
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        let params = SingleRigidBodyParams::default();
        let mut vars = OptimizationVariables::new();

        let mut base_lin = base_nodes(id::BASE_LIN_NODES);
        base_lin.initialize_towards_goal(
            &Vector3::new(0.0, 0.0, 0.5),
            &Vector3::new(0.4, 0.1, 0.55),
            TOTAL_TIME,
        );
        jitter(&mut base_lin, &mut rng, 0.1);
        vars.add(base_lin).expect("unique");

        let mut base_ang = base_nodes(id::BASE_ANG_NODES);
        jitter(&mut base_ang, &mut rng, 0.3);
        vars.add(base_ang).expect("unique");

        let support = params.mass * params.gravity / limbs.len() as f64;
        for (ee, limb) in limbs.iter().enumerate() {
            let phases = limb.durations.len();

            let mut motion = NodeVariables::phase_based(
                id::ee_motion_nodes(ee),
                PhaseNodeKind::Motion,
                limb.first_phase_in_contact,
                phases,
                POLYS_PER_CHANGING_PHASE,
            )
            .expect("valid layout");
            motion.initialize_constant(&Vector3::new(0.3 - 0.6 * ee as f64, 0.2, 0.0));
            jitter(&mut motion, &mut rng, 0.1);
            vars.add(motion).expect("unique");

            let mut force = NodeVariables::phase_based(
                id::ee_force_nodes(ee),
                PhaseNodeKind::Force,
                limb.first_phase_in_contact,
                phases,
                POLYS_PER_CHANGING_PHASE,
            )
            .expect("valid layout");
            force.initialize_constant(&Vector3::new(0.0, 0.0, support));
            jitter(&mut force, &mut rng, 20.0);
            vars.add(force).expect("unique");

            vars.add(
                PhaseDurations::new(id::ee_schedule(ee), limb.durations.clone())
                    .expect("positive durations"),
            )
            .expect("unique");
        }

        Self {
            vars,
            params,
            ee_count: limbs.len(),
        }
    }

    /// Base at rest above limb 0, which carries the full weight for the whole
    /// horizon while limb 1 swings without load.
    pub fn static_stance() -> Self {
        let params = SingleRigidBodyParams::default();
        let mut vars = OptimizationVariables::new();

        let mut base_lin = base_nodes(id::BASE_LIN_NODES);
        base_lin.initialize_constant(&Vector3::new(0.1, -0.2, 0.5));
        vars.add(base_lin).expect("unique");
        vars.add(base_nodes(id::BASE_ANG_NODES)).expect("unique");

        for (ee, in_contact) in [(0, true), (1, false)] {
            let mut motion = NodeVariables::phase_based(
                id::ee_motion_nodes(ee),
                PhaseNodeKind::Motion,
                in_contact,
                1,
                POLYS_PER_CHANGING_PHASE,
            )
            .expect("valid layout");
            let foot = if in_contact {
                Vector3::new(0.1, -0.2, 0.0)
            } else {
                Vector3::new(-0.3, 0.25, 0.1)
            };
            motion.initialize_constant(&foot);
            vars.add(motion).expect("unique");

            let mut force = NodeVariables::phase_based(
                id::ee_force_nodes(ee),
                PhaseNodeKind::Force,
                in_contact,
                1,
                POLYS_PER_CHANGING_PHASE,
            )
            .expect("valid layout");
            force.initialize_constant(&Vector3::new(0.0, 0.0, params.mass * params.gravity));
            vars.add(force).expect("unique");

            vars.add(PhaseDurations::new(id::ee_schedule(ee), vec![TOTAL_TIME]).expect("valid"))
                .expect("unique");
        }

        Self {
            vars,
            params,
            ee_count: 2,
        }
    }

    pub fn model(&self) -> SingleRigidBodyDynamics {
        SingleRigidBodyDynamics::new(&self.params, self.ee_count).expect("valid model")
    }

    pub fn constraint(
        &self,
    ) -> TimeDiscretizationConstraint<DynamicConstraint<SingleRigidBodyDynamics>> {
        let model = self.model();
        assert_eq!(model.ee_count(), self.ee_count);
        TimeDiscretizationConstraint::uniform(
            DYNAMIC_CONSTRAINT_NAME,
            TOTAL_TIME,
            &DiscretizationSettings::default(),
            DynamicConstraint::new(model, BASE_POLY_DURATIONS.to_vec()),
        )
        .expect("valid constraint")
    }
}

fn base_nodes(name: &str) -> NodeVariables {
    NodeVariables::new(name, BASE_POLY_DURATIONS.len() + 1).expect("valid layout")
}

fn jitter(nodes: &mut NodeVariables, rng: &mut ChaCha8Rng, scale: f64) {
    let x = nodes.values();
    let noisy = DVector::from_iterator(
        x.len(),
        x.iter().map(|v| v + scale * rng.gen_range(-1.0..1.0)),
    );
    nodes.set_values(&noisy).expect("matching length");
}
