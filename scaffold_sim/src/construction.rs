// Construction strategy: when to place a beam and where it goes.
//
// `should_construct()` gates placement: the agent must be carrying, must
// have moved since its last placement, and must be inside the construction
// site. On the ground that is enough; on a beam the agent builds from the
// beam's top end, or from a joint with `joint_construct_probability`.
//
// `plan_build()` pivots a new beam of the configured length about the
// agent's location. The default is straight up. Nearby beams the new member
// could reach are turned into candidate directions in two ways: points on
// the beam exactly one beam length away (sphere intersection), and the
// point where the vertical default passes within `connection_tolerance` of
// the beam (closest points). Candidates leaning more than `max_angle` from
// vertical are dropped and the rest sorted by lean. The first available
// candidate leaning more than `min_angle` wins, then the first available
// one at all, then vertical. Every `disturbance_period`-th placement is
// tilted by a random angle up to `max_disturbance` to break up repeated
// geometry.
//
// See also: `agent.rs` which applies the resulting `Intent::Build`,
// `structure.rs` for `available()`.

use crate::agent::{Body, Intent, WorldView};
use crate::config::{ConstructionParams, SwarmConfig};
use crate::geometry::{self, Segment, Vec3};
use crate::locomotion;
use crate::structure::Structure;
use crate::types::BeamId;
use std::f64::consts::TAU;

/// A direction in which the new beam would connect to `beam`.
#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    pub beam: BeamId,
    pub direction: Vec3,
    /// Lean from vertical, radians.
    pub angle: f64,
}

#[derive(Clone, Debug)]
pub struct Constructor {
    params: ConstructionParams,
    beam_length: f64,
}

impl Constructor {
    pub fn new(config: &SwarmConfig) -> Self {
        Self {
            params: config.construction.clone(),
            beam_length: config.beam.length,
        }
    }

    pub fn should_construct(&self, body: &mut Body, view: &WorldView<'_>) -> bool {
        if body.carried == 0
            || body.memory.built_since_move
            || !view.config.site.contains(body.location)
        {
            return false;
        }
        let Some(id) = body.beam else {
            return true;
        };
        let Some(beam) = view.structure.beam(id) else {
            return false;
        };
        if geometry::points_equal(body.location, beam.segment().upper()) {
            return true;
        }
        locomotion::at_joint(view.structure, body.beam, body.location)
            && body.rng.random_bool(self.params.joint_construct_probability)
    }

    /// Connection candidates around `pivot`, sorted by increasing lean.
    pub fn candidates(&self, pivot: Vec3, structure: &Structure) -> Vec<Candidate> {
        let reach = self.beam_length;
        let vertical = Segment::new(pivot, pivot + geometry::up() * reach);
        let ids = structure.nearby_beams(pivot, reach).unwrap_or_default();

        let mut out = Vec::new();
        for beam in ids.iter().filter_map(|&id| structure.beam(id)) {
            if beam.contains_point(pivot) {
                continue;
            }
            let segment = beam.segment();
            let mut targets = geometry::sphere_intersection(&segment, pivot, reach, true);
            if let Some((on_member, on_beam)) = geometry::closest_points(&vertical, &segment, true)
                && geometry::distance(on_member, on_beam) <= self.params.connection_tolerance
            {
                targets.push(on_beam);
            }
            for target in targets {
                let Some(direction) = geometry::try_unit(target - pivot) else {
                    continue;
                };
                let Some(angle) = geometry::angle_between(direction, geometry::up()) else {
                    continue;
                };
                if angle <= self.params.max_angle {
                    out.push(Candidate {
                        beam: beam.id,
                        direction,
                        angle,
                    });
                }
            }
        }
        out.sort_by(|a, b| a.angle.total_cmp(&b.angle));
        out
    }

    /// Choose the new beam's endpoints, or `None` if nothing can be placed
    /// from here.
    pub fn plan_build(&self, body: &mut Body, view: &WorldView<'_>) -> Option<Intent> {
        let structure = view.structure;
        let start = body.location;
        let end_of = |direction: Vec3| start + direction * self.beam_length;
        let fits = |direction: Vec3| structure.available(start, end_of(direction));

        let candidates = self.candidates(start, structure);
        let mut direction = candidates
            .iter()
            .find(|c| c.angle > self.params.min_angle && fits(c.direction))
            .or_else(|| candidates.iter().find(|c| fits(c.direction)))
            .map_or(geometry::up(), |c| c.direction);

        let period = self.params.disturbance_period;
        if period > 0 && (body.memory.builds + 1) % period == 0 {
            let tilted = disturb(body, direction, self.params.max_disturbance);
            if fits(tilted) {
                direction = tilted;
            }
        }

        fits(direction).then(|| Intent::Build {
            start,
            end: end_of(direction),
            support_for: None,
        })
    }
}

/// Tilt `direction` by a random angle up to `max_angle` about a random
/// azimuth.
pub(crate) fn disturb(body: &mut Body, direction: Vec3, max_angle: f64) -> Vec3 {
    if max_angle <= 0.0 {
        return direction;
    }
    let tilt = body.rng.range_f64(0.0, max_angle);
    let azimuth = body.rng.range_f64(0.0, TAU);
    geometry::rotate_to_axis(geometry::direction_from_angles(tilt, azimuth), direction)
}
