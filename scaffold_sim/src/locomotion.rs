// Locomotion strategy: moving along the beam graph and across the ground.
//
// On a beam, the candidate moves are the directions toward the endpoints of
// the current beam, plus (when standing on a joint) toward the endpoints of
// every beam meeting there. `elect()` filters them through per-axis tests
// whose strictness is set by the agent's `DirectionPriorities`:
//
// - carrying beams: z must rise; x and y must not move away from the site.
// - empty-handed: z must fall; x and y must not move away from home.
//
// If nothing passes, the tests at the lowest remaining priority tier are
// dropped and the filter retried, until something passes or no tests are
// left. Away from joints, a survivor continuing the previous climb direction
// wins; otherwise the pick is random. A climb ends at the next joint or
// endpoint along the chosen beam, or after `remaining_step`.
//
// On the ground, an agent picks up beams at home, walks back home when
// empty, and otherwise walks to the site, detouring to mount any beam with a
// grounded end within its sensing radius. Inside the site with nothing to
// do it roams along a persistent heading, re-rolled (and checked against
// the world bounds) whenever it would leave the world.
//
// See also: `agent.rs` for `Body` and `Intent`, `repair.rs` which reuses
// `available_directions()` and `climb_intent()` while descending.

use crate::agent::{Body, Intent, WorldView};
use crate::beam::Beam;
use crate::config::{BehaviorProfile, DirectionPriorities};
use crate::geometry::{self, EPSILON, Vec3};
use crate::structure::Structure;
use crate::types::BeamId;

/// A possible move: head along `beam` in `direction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionOption {
    pub beam: BeamId,
    pub direction: Vec3,
}

/// Outcome of direction election.
#[derive(Clone, Copy, Debug)]
pub struct Election {
    pub choice: Option<DirectionOption>,
    /// True if no option passed every movement test.
    pub relaxed: bool,
}

#[derive(Clone, Debug)]
pub struct Locomotion {
    pub(crate) step_length: f64,
    sensing_radius: f64,
    climb: DirectionPriorities,
    descend: DirectionPriorities,
}

/// True if `location` is on the ground or on a joint of `beam`.
pub fn at_joint(structure: &Structure, beam: Option<BeamId>, location: Vec3) -> bool {
    structure.on_ground(location)
        || beam
            .and_then(|id| structure.beam(id))
            .is_some_and(|b| b.joint_at(location).is_some())
}

/// Project `point` onto `beam`, snapping to a joint or endpoint within
/// tolerance so repeated climbs do not drift off the graph.
pub fn settle_on_beam(beam: &Beam, point: Vec3) -> Vec3 {
    let projected = geometry::closest_point_on_segment(&beam.segment(), point);
    beam.joints()
        .iter()
        .map(|j| j.point)
        .chain([beam.start, beam.end])
        .find(|&p| geometry::points_equal(p, projected))
        .unwrap_or(projected)
}

impl Locomotion {
    pub fn new(profile: &BehaviorProfile) -> Self {
        Self {
            step_length: profile.step_length,
            sensing_radius: profile.sensing_radius,
            climb: profile.climb_priorities,
            descend: profile.descend_priorities,
        }
    }

    /// Every distinct direction reachable from the agent's position.
    ///
    /// Moves heading upward along `flagged` are left out.
    pub fn available_directions(
        &self,
        body: &Body,
        structure: &Structure,
        flagged: Option<BeamId>,
    ) -> Vec<DirectionOption> {
        let Some(current) = body.beam.and_then(|id| structure.beam(id)) else {
            return Vec::new();
        };
        let location = body.location;

        let mut beams = vec![current.id];
        if let Some(joint) = current.joint_at(location) {
            beams.extend(joint.beams.iter().copied());
        }

        let mut options: Vec<DirectionOption> = Vec::new();
        for beam in beams.iter().filter_map(|&id| structure.beam(id)) {
            for endpoint in [beam.start, beam.end] {
                let Some(direction) = geometry::try_unit(endpoint - location) else {
                    continue;
                };
                if Some(beam.id) == flagged && direction.z > EPSILON {
                    continue;
                }
                if options
                    .iter()
                    .any(|o| geometry::same_direction(o.direction, direction))
                {
                    continue;
                }
                options.push(DirectionOption {
                    beam: beam.id,
                    direction,
                });
            }
        }
        options
    }

    /// Pick one option through the priority-relaxed movement tests.
    pub fn elect(
        &self,
        body: &mut Body,
        view: &WorldView<'_>,
        options: &[DirectionOption],
    ) -> Election {
        let carrying = body.carried > 0;
        let (priorities, target) = if carrying {
            (self.climb, view.config.site.center())
        } else {
            (self.descend, view.config.home.center())
        };
        let weights = [priorities.x, priorities.y, priorities.z];
        let mut tiers: Vec<u32> = weights.iter().copied().filter(|&w| w > 0).collect();
        tiers.sort_unstable();
        tiers.dedup();

        let location = body.location;
        let passes = |direction: Vec3, axis: usize| -> bool {
            if axis == 2 {
                if carrying {
                    direction.z > EPSILON
                } else {
                    direction.z < -EPSILON
                }
            } else {
                direction[axis] * (target[axis] - location[axis]) >= -EPSILON
            }
        };

        let mut candidates = Vec::new();
        let mut relaxed = false;
        for level in 0..=tiers.len() {
            let floor = tiers.get(level).copied();
            candidates = options
                .iter()
                .copied()
                .filter(|o| {
                    (0..3).all(|axis| match floor {
                        Some(min) if weights[axis] >= min => passes(o.direction, axis),
                        _ => true,
                    })
                })
                .collect::<Vec<_>>();
            if !candidates.is_empty() {
                relaxed = level > 0;
                break;
            }
            relaxed = true;
        }

        let straight = body.memory.previous_direction.filter(|_| {
            !at_joint(view.structure, body.beam, location)
        });
        let choice = straight
            .and_then(|prev| {
                candidates
                    .iter()
                    .copied()
                    .find(|o| geometry::same_direction(o.direction, prev))
            })
            .or_else(|| {
                body.rng
                    .choose_index(candidates.len())
                    .map(|i| candidates[i])
            });
        Election { choice, relaxed }
    }

    /// Turn an elected option into a climb no longer than the remaining step
    /// and ending no further than the next joint or endpoint.
    pub fn climb_intent(
        &self,
        body: &Body,
        structure: &Structure,
        choice: Option<DirectionOption>,
    ) -> Intent {
        let Some(option) = choice else {
            return Intent::Idle;
        };
        let Some(stop) = structure
            .beam(option.beam)
            .and_then(|b| distance_to_stop(b, body.location, option.direction))
        else {
            return Intent::Idle;
        };
        Intent::Climb {
            beam: option.beam,
            direction: option.direction,
            distance: stop.min(body.memory.remaining_step),
        }
    }

    /// Ground behavior: pick up, head home, mount a sensed beam, head to the
    /// site, or roam.
    pub fn wander(&self, body: &mut Body, view: &WorldView<'_>) -> Intent {
        let config = view.config;
        let location = body.location;
        let step = body.memory.remaining_step;

        if body.carried == 0 && config.home.contains(location) {
            return Intent::PickUp;
        }

        if body.carried > 0
            && let Some((beam, foot)) = self.sense_beam(location, view.structure)
        {
            let distance = geometry::horizontal_distance(location, foot);
            if distance <= step + EPSILON {
                return Intent::Mount { beam, point: foot };
            }
            if let Some(direction) = horizontal_unit(foot - location) {
                return Intent::Walk {
                    direction,
                    distance: step,
                };
            }
        }

        let area = if body.carried == 0 {
            &config.home
        } else {
            &config.site
        };
        if !area.contains(location) {
            let offset = area.center() - location;
            if let Some(direction) = horizontal_unit(offset) {
                body.memory.ground_direction = Some(direction);
                let remaining = Vec3::new(offset.x, offset.y, 0.0).norm();
                return Intent::Walk {
                    direction,
                    distance: step.min(remaining),
                };
            }
        }
        self.roam(body, view.structure)
    }

    /// Nearest beam with a grounded end within the sensing radius.
    fn sense_beam(&self, location: Vec3, structure: &Structure) -> Option<(BeamId, Vec3)> {
        let ids = structure.nearby_beams(location, self.sensing_radius).ok()?;
        let mut best: Option<(f64, BeamId, Vec3)> = None;
        for beam in ids.iter().filter_map(|&id| structure.beam(id)) {
            for end in [beam.start, beam.end] {
                if !structure.on_ground(end) {
                    continue;
                }
                let d = geometry::horizontal_distance(location, end);
                if d <= self.sensing_radius && best.is_none_or(|(bd, _, _)| d < bd) {
                    best = Some((d, beam.id, end));
                }
            }
        }
        best.map(|(_, id, end)| (id, end))
    }

    /// Walk along the persistent ground heading, re-rolling it when it would
    /// leave the world.
    fn roam(&self, body: &mut Body, structure: &Structure) -> Intent {
        let location = body.location;
        let step = body.memory.remaining_step;
        let stays_inside = |d: Vec3| structure.in_bounds(location + d * step);

        if let Some(direction) = body.memory.ground_direction
            && stays_inside(direction)
        {
            return Intent::Walk {
                direction,
                distance: step,
            };
        }
        for _ in 0..8 {
            let direction = Vec3::from(body.rng.random_horizontal_unit());
            if stays_inside(direction) {
                body.memory.ground_direction = Some(direction);
                return Intent::Walk {
                    direction,
                    distance: step,
                };
            }
        }

        // Boxed in near a corner: head for the middle of the world.
        let world = structure.world();
        let center = world.origin() + world.size() / 2.0;
        let offset = center - location;
        match horizontal_unit(offset) {
            Some(direction) => {
                body.memory.ground_direction = Some(direction);
                Intent::Walk {
                    direction,
                    distance: step.min(Vec3::new(offset.x, offset.y, 0.0).norm()),
                }
            }
            None => Intent::Idle,
        }
    }
}

/// Distance along `direction` from `from` to the next joint or endpoint of
/// `beam`.
fn distance_to_stop(beam: &Beam, from: Vec3, direction: Vec3) -> Option<f64> {
    beam.joints()
        .iter()
        .map(|j| j.point)
        .chain([beam.start, beam.end])
        .filter_map(|p| {
            let t = (p - from).dot(&direction);
            (t > EPSILON && geometry::points_equal(from + direction * t, p)).then_some(t)
        })
        .min_by(f64::total_cmp)
}

fn horizontal_unit(v: Vec3) -> Option<Vec3> {
    geometry::try_unit(Vec3::new(v.x, v.y, 0.0))
}
