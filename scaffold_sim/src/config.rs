// Data-driven swarm configuration.
//
// All tunable parameters live in `SwarmConfig`, loaded from JSON (or built
// from `Default`) and never mutated once a `Swarm` holds it. The sim reads
// world size, material limits, and behavior tuning from here instead of
// module-level constants. The one exception is the geometric tolerance,
// which is the fixed `geometry::EPSILON`.
//
// Parameters are grouped into nested structs: `WorldParams`, `BeamParams`,
// two `SiteParams` (home and construction site), `ConstructionParams`,
// `RepairParams`, and one `BehaviorProfile` per `AgentKind`. Profiles carry
// the per-class data (step length, sensing radius, direction priorities);
// named preset constructors (`BehaviorProfile::builder()`, `::repairer()`)
// tune the same parameter set.
//
// See also: `swarm.rs` which owns the config, `structure.rs` which sizes its
// grid from `WorldParams`, `agent.rs` which copies its profile at creation.
//
// **Critical constraint: determinism.** A config plus its `seed` fully
// determines a run.

use crate::error::SimError;
use crate::geometry::{self, Vec3};
use crate::types::AgentKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Nested parameter groups
// ---------------------------------------------------------------------------

/// The world box and its spatial-index grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldParams {
    /// Minimum corner. The ground plane is at `origin[2]`.
    pub origin: [f64; 3],
    /// Extent along each axis.
    pub size: [f64; 3],
    /// Edge length of one cubic cell of the spatial index.
    pub cell_size: f64,
}

impl WorldParams {
    pub fn origin(&self) -> Vec3 {
        Vec3::from(self.origin)
    }

    pub fn size(&self) -> Vec3 {
        Vec3::from(self.size)
    }

    /// Height of the ground plane.
    pub fn ground(&self) -> f64 {
        self.origin[2]
    }

    /// Number of cells along each axis.
    pub fn dims(&self) -> [usize; 3] {
        self.size
            .map(|s| ((s / self.cell_size).ceil() as usize).max(1))
    }

    /// True if `p` is inside the world box (inclusive, with tolerance).
    pub fn contains(&self, p: Vec3) -> bool {
        geometry::within(self.origin(), self.size(), p)
    }
}

/// Material properties shared by every beam.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BeamParams {
    pub length: f64,
    pub weight: f64,
}

/// A circular area on the ground (home or construction site).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiteParams {
    pub center: [f64; 3],
    /// Horizontal radius of the area.
    pub radius: f64,
}

impl SiteParams {
    pub fn center(&self) -> Vec3 {
        Vec3::from(self.center)
    }

    /// True if `p` is horizontally within `radius` of the center.
    pub fn contains(&self, p: Vec3) -> bool {
        geometry::horizontal_distance(self.center(), p) <= self.radius + geometry::EPSILON
    }
}

/// Priority of each per-axis movement predicate. Higher values are relaxed
/// later; 0 disables the predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionPriorities {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// Per-class behavioral data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BehaviorProfile {
    /// Distance covered per timestep.
    pub step_length: f64,
    /// Radius within which a grounded agent notices beams to climb.
    pub sensing_radius: f64,
    /// Beams picked up per trip home.
    pub beams_per_load: u32,
    /// Weight of the agent itself, excluding carried beams.
    pub agent_weight: f64,
    /// Predicates used while carrying beams (up and toward the site).
    pub climb_priorities: DirectionPriorities,
    /// Predicates used while empty-handed (down and toward home).
    pub descend_priorities: DirectionPriorities,
}

impl BehaviorProfile {
    /// Plain builder: climbing straight up matters most.
    pub fn builder() -> Self {
        Self {
            step_length: 2.0,
            sensing_radius: 6.0,
            beams_per_load: 1,
            agent_weight: 0.5,
            climb_priorities: DirectionPriorities { x: 1, y: 1, z: 3 },
            descend_priorities: DirectionPriorities { x: 1, y: 1, z: 3 },
        }
    }

    /// Repairer: slower, carries a spare beam for supports, and gives up
    /// the horizontal predicates before the vertical one.
    pub fn repairer() -> Self {
        Self {
            step_length: 1.5,
            sensing_radius: 6.0,
            beams_per_load: 2,
            agent_weight: 0.5,
            climb_priorities: DirectionPriorities { x: 1, y: 1, z: 2 },
            descend_priorities: DirectionPriorities { x: 1, y: 1, z: 2 },
        }
    }
}

/// Tuning for beam placement (angles in radians).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstructionParams {
    /// Below this angle from vertical a candidate is "vertical enough" and
    /// is skipped in favor of a connection that actually leans.
    pub min_angle: f64,
    /// Candidates leaning further than this from vertical are ignored.
    pub max_angle: f64,
    /// Chance of building at a joint (rather than only at a beam top).
    pub joint_construct_probability: f64,
    /// Every Nth placement of an agent gets a random lateral disturbance.
    pub disturbance_period: u32,
    /// Maximum disturbance angle.
    pub max_disturbance: f64,
    /// A planned member passing within this distance of a beam counts as a
    /// connection to it.
    pub connection_tolerance: f64,
}

/// Tuning for overload detection and support placement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepairParams {
    /// Moment limit for a beam of length `nominal_span`.
    pub moment_limit: f64,
    pub nominal_span: f64,
    /// Steps spent looking for a parallel support member before building one.
    pub support_search_steps: u32,
    /// Maximum angle between axes for a beam to count as "nearly parallel".
    pub support_parallel_angle: f64,
    /// Vertical weight of the descent direction (0 = horizontal, 1 = along
    /// the beam).
    pub descent_vertical_bias: f64,
    /// Angle of a new support relative to the overloaded beam's axis.
    pub support_angle: f64,
    /// Maximum random disturbance applied to a support direction.
    pub max_disturbance: f64,
    /// Re-rolls of the disturbance before falling back to vertical.
    pub placement_attempts: u32,
}

impl RepairParams {
    /// Overload limit for a beam of the given length.
    pub fn limit_for_span(&self, span: f64) -> f64 {
        self.moment_limit * span / self.nominal_span
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level swarm configuration. Loaded from JSON, never mutated at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Seed for the swarm's master PRNG.
    pub seed: u64,
    pub world: WorldParams,
    pub beam: BeamParams,
    /// Where agents spawn and pick up beams.
    pub home: SiteParams,
    /// Where agents build.
    pub site: SiteParams,
    pub construction: ConstructionParams,
    pub repair: RepairParams,
    /// Behavior data keyed by agent class.
    pub profiles: BTreeMap<AgentKind, BehaviorProfile>,
    /// Initial population per class.
    pub population: BTreeMap<AgentKind, u32>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(AgentKind::Builder, BehaviorProfile::builder());
        profiles.insert(AgentKind::Repairer, BehaviorProfile::repairer());
        let mut population = BTreeMap::new();
        population.insert(AgentKind::Builder, 8);
        population.insert(AgentKind::Repairer, 2);

        Self {
            seed: 0,
            world: WorldParams {
                origin: [-50.0, -50.0, 0.0],
                size: [100.0, 100.0, 100.0],
                cell_size: 10.0,
            },
            beam: BeamParams {
                length: 10.0,
                weight: 1.0,
            },
            home: SiteParams {
                center: [-30.0, -30.0, 0.0],
                radius: 5.0,
            },
            site: SiteParams {
                center: [0.0, 0.0, 0.0],
                radius: 10.0,
            },
            construction: ConstructionParams {
                min_angle: 5f64.to_radians(),
                max_angle: 60f64.to_radians(),
                joint_construct_probability: 0.3,
                disturbance_period: 4,
                max_disturbance: 10f64.to_radians(),
                connection_tolerance: 1.0,
            },
            repair: RepairParams {
                moment_limit: 50.0,
                nominal_span: 10.0,
                support_search_steps: 5,
                support_parallel_angle: 10f64.to_radians(),
                descent_vertical_bias: 0.5,
                support_angle: 30f64.to_radians(),
                max_disturbance: 5f64.to_radians(),
                placement_attempts: 4,
            },
            profiles,
            population,
        }
    }
}

impl SwarmConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Profile for an agent class.
    pub fn profile(&self, kind: AgentKind) -> Result<&BehaviorProfile, SimError> {
        self.profiles
            .get(&kind)
            .ok_or_else(|| SimError::InvalidConfig(format!("no behavior profile for {kind:?}")))
    }

    /// Reject configs the simulation cannot run with.
    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |msg: &str| Err(SimError::InvalidConfig(msg.to_string()));

        if self.world.size.iter().any(|&s| s <= 0.0) || self.world.cell_size <= 0.0 {
            return invalid("world size and cell size must be positive");
        }
        if self.beam.length <= 0.0 || self.beam.weight < 0.0 {
            return invalid("beam length must be positive and weight non-negative");
        }
        if !self.world.contains(self.home.center()) || !self.world.contains(self.site.center()) {
            return invalid("home and site must lie inside the world");
        }
        if self.repair.nominal_span <= 0.0 {
            return invalid("repair nominal span must be positive");
        }
        for (kind, profile) in &self.profiles {
            if profile.step_length <= 0.0 {
                return Err(SimError::InvalidConfig(format!(
                    "{kind:?} profile needs a positive step length"
                )));
            }
        }
        for kind in self.population.keys() {
            self.profile(*kind)?;
        }
        Ok(())
    }
}
