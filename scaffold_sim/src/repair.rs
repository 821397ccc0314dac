// Repair strategy: detecting overloaded beams and propping them up.
//
// Repairers are builders with one extra strategy. Each step, `observe()`
// asks the analysis provider for the moment on the beam the agent stands
// on, but only when the provider is current for the present geometry. A
// moment above the span-scaled limit flags the beam. While a beam is
// flagged, moves heading up along it are never offered.
//
// Repair starts when a repairer with a flagged beam finds that no available
// direction passes its movement tests. It then:
//
// 1. Computes a descent direction from the flagged beam's axis, keeping the
//    horizontal part and scaling the downward part by
//    `descent_vertical_bias`.
// 2. For up to `support_search_steps` steps, looks for a nearly parallel
//    beam reachable from where it stands. If one is found it climbs onto
//    it; once on that beam and clear of any joint the repair is resolved.
//    Otherwise it moves along the option best matching the descent.
// 3. When the budget runs out (or it reaches the ground) it places a
//    support beam: `support_angle` off the flagged beam's axis at a random
//    azimuth, projected into the vertical plane through that axis, tilted by
//    up to `max_disturbance`, and never pointing down. Rejected placements
//    are re-rolled up to `placement_attempts` times before falling back to
//    vertical. An agent with nothing left to carry abandons the repair.
//
// See also: `agent.rs` for `AgentMemory` and how `Intent::Build` with
// `support_for` resolves the repair, `locomotion.rs` for the shared
// direction machinery, `analysis.rs` for the moment source.

use crate::agent::{Body, Intent, WorldView};
use crate::config::{RepairParams, SwarmConfig};
use crate::construction::disturb;
use crate::event::SwarmEventKind;
use crate::geometry::{self, Vec3};
use crate::locomotion::{self, DirectionOption, Locomotion};
use crate::types::BeamId;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tracing::info;

/// Progress of an active repair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepairState {
    /// The overloaded beam.
    pub target: BeamId,
    /// Search steps left before building a support directly.
    pub steps_left: u32,
    /// Preferred direction of travel while searching.
    pub descent: Vec3,
    /// Parallel member found during the search.
    pub support: Option<BeamId>,
}

#[derive(Clone, Debug)]
pub struct Repairer {
    params: RepairParams,
    beam_length: f64,
}

impl Repairer {
    pub fn new(config: &SwarmConfig) -> Self {
        Self {
            params: config.repair.clone(),
            beam_length: config.beam.length,
        }
    }

    /// Check the current beam's moment and flag it if overloaded.
    pub fn observe(&self, body: &mut Body, view: &WorldView<'_>) {
        let Some(beam) = body.beam.and_then(|id| view.structure.beam(id)) else {
            return;
        };
        if !view.analysis_current() {
            return;
        }
        match view.analysis.moment(beam.id, body.location) {
            Ok(moment) => {
                let limit = self.params.limit_for_span(beam.length());
                if moment > limit {
                    body.memory.broken_beams.push(beam.id);
                    if body.memory.flagged_beam != Some(beam.id) {
                        body.memory.flagged_beam = Some(beam.id);
                        body.pending.push(SwarmEventKind::OverloadDetected {
                            agent: body.id,
                            beam: beam.id,
                            moment,
                            limit,
                        });
                    }
                }
            }
            Err(e) => body.note(format!("moment query for {} failed: {e}", beam.id)),
        }
    }

    /// Start repairing the flagged beam and return the first repair move.
    pub fn enter_repair(
        &self,
        body: &mut Body,
        view: &WorldView<'_>,
        locomotion: &Locomotion,
    ) -> Option<Intent> {
        let target = body.memory.flagged_beam?;
        let Some(beam) = view.structure.beam(target) else {
            body.memory.flagged_beam = None;
            return None;
        };
        let axis = upward(beam.axis());
        let descent = geometry::try_unit(Vec3::new(
            axis.x,
            axis.y,
            -axis.z.abs() * self.params.descent_vertical_bias,
        ))
        .unwrap_or(-geometry::up());

        info!(agent = %body.id, beam = %target, "starting repair");
        body.memory.repair = Some(RepairState {
            target,
            steps_left: self.params.support_search_steps,
            descent,
            support: None,
        });
        body.pending.push(SwarmEventKind::RepairStarted {
            agent: body.id,
            beam: target,
        });
        self.continue_repair(body, view, locomotion)
    }

    /// Next repair move, or `None` once the repair has ended and normal
    /// behavior should take over.
    pub fn continue_repair(
        &self,
        body: &mut Body,
        view: &WorldView<'_>,
        locomotion: &Locomotion,
    ) -> Option<Intent> {
        let mut state = body.memory.repair.clone()?;
        let structure = view.structure;
        let Some(target) = structure.beam(state.target) else {
            self.abandon(body, state.target);
            return None;
        };

        if let Some(support) = state.support
            && body.beam == Some(support)
            && !locomotion::at_joint(structure, body.beam, body.location)
        {
            info!(agent = %body.id, beam = %state.target, support = %support, "repair resolved");
            body.memory.repair = None;
            body.memory.flagged_beam = None;
            body.pending.push(SwarmEventKind::RepairResolved {
                agent: body.id,
                beam: state.target,
                support: Some(support),
            });
            return None;
        }

        if state.steps_left == 0 || body.beam.is_none() {
            if body.carried == 0 {
                self.abandon(body, state.target);
                return None;
            }
            let intent = self.plan_support(body, view, state.target, target.axis());
            if intent.is_none() {
                self.abandon(body, state.target);
            }
            return intent;
        }

        let options = locomotion.available_directions(body, structure, Some(state.target));
        let target_axis = target.axis();
        let parallel = |o: &DirectionOption| {
            o.beam != state.target
                && structure.beam(o.beam).is_some_and(|b| {
                    geometry::angle_between(b.axis(), target_axis).is_some_and(|a| {
                        a.min(std::f64::consts::PI - a) <= self.params.support_parallel_angle
                    })
                })
        };
        let on_support = state.support.filter(|s| body.beam == Some(*s));
        let found = match on_support {
            // Keep moving along the support until clear of the joint.
            Some(s) => options.iter().copied().find(|o| o.beam == s),
            None => options.iter().copied().find(|o| parallel(o)),
        };
        let choice = match found {
            Some(o) => {
                state.support = Some(o.beam);
                Some(o)
            }
            None => options
                .iter()
                .copied()
                .max_by(|a, b| {
                    a.direction
                        .dot(&state.descent)
                        .total_cmp(&b.direction.dot(&state.descent))
                }),
        };
        state.steps_left = state.steps_left.saturating_sub(1);
        body.memory.repair = Some(state);
        Some(locomotion.climb_intent(body, structure, choice))
    }

    /// A support placement from the agent's location, or `None` if every
    /// attempt is blocked.
    fn plan_support(
        &self,
        body: &mut Body,
        view: &WorldView<'_>,
        target: BeamId,
        target_axis: Vec3,
    ) -> Option<Intent> {
        let structure = view.structure;
        let start = body.location;
        let axis = upward(target_axis);
        // Normal of the vertical plane through the axis; none for a column.
        let plane_normal = geometry::try_unit(axis.cross(&geometry::up()));

        for _ in 0..self.params.placement_attempts {
            let azimuth = body.rng.range_f64(0.0, TAU);
            let raw = geometry::rotate_to_axis(
                geometry::direction_from_angles(self.params.support_angle, azimuth),
                axis,
            );
            let in_plane = match plane_normal {
                Some(n) => geometry::project_onto_plane(raw, n),
                None => raw,
            };
            let Some(direction) = geometry::try_unit(in_plane) else {
                continue;
            };
            let mut direction = disturb(body, direction, self.params.max_disturbance);
            direction.z = direction.z.abs();
            let Some(direction) = geometry::try_unit(direction) else {
                continue;
            };
            let end = start + direction * self.beam_length;
            if structure.available(start, end) {
                return Some(Intent::Build {
                    start,
                    end,
                    support_for: Some(target),
                });
            }
        }

        let end = start + geometry::up() * self.beam_length;
        structure.available(start, end).then_some(Intent::Build {
            start,
            end,
            support_for: Some(target),
        })
    }

    fn abandon(&self, body: &mut Body, target: BeamId) {
        info!(agent = %body.id, beam = %target, "abandoning repair");
        body.memory.repair = None;
        body.memory.flagged_beam = None;
        body.pending.push(SwarmEventKind::RepairAbandoned {
            agent: body.id,
            beam: target,
        });
    }
}

/// `axis` flipped, if needed, to point up.
fn upward(axis: Vec3) -> Vec3 {
    if axis.z < 0.0 { -axis } else { axis }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentBehavior};
    use crate::analysis::{MomentTable, StructuralAnalysis};
    use crate::structure::Structure;
    use crate::types::{AgentId, AgentKind};
    use scaffold_prng::SwarmRng;

    fn v(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, y, z)
    }

    fn repairer_at(
        config: &SwarmConfig,
        structure: &mut Structure,
        location: Vec3,
        beam: Option<BeamId>,
        carried: u32,
    ) -> Agent {
        let mut agent = Agent::new(
            AgentId(0),
            AgentKind::Repairer,
            location,
            config,
            SwarmRng::new(21),
        )
        .unwrap();
        agent.place(structure, location, beam).unwrap();
        agent.set_carried(structure, carried);
        agent
    }

    #[test]
    fn descent_keeps_horizontal_heading() {
        let config = SwarmConfig::default();
        let mut s = Structure::new(&config.world);
        let lean = s.add_beam(v(20.0, 0.0, 0.0), v(26.0, 0.0, 8.0), 1.0).unwrap().beam;
        let mut agent = repairer_at(&config, &mut s, v(26.0, 0.0, 8.0), Some(lean), 2);
        let mut table = MomentTable::new();
        table.set_moment(lean, 500.0);
        table.run_analysis(&s).unwrap();
        let view = WorldView {
            structure: &s,
            analysis: &table,
            config: &config,
        };
        agent.decide(&view);
        let state = agent.memory().repair.clone().expect("repair started");
        assert_eq!(state.target, lean);
        // Axis (0.6, 0, 0.8) -> (0.6, 0, -0.4) normalized.
        let expected = geometry::unit(v(0.6, 0.0, -0.4));
        assert!(geometry::points_equal(state.descent, expected));
        assert_eq!(state.steps_left, config.repair.support_search_steps - 1);
        assert!(agent.memory().search_mode());
    }

    #[test]
    fn exhausted_search_builds_a_support() {
        let mut config = SwarmConfig::default();
        config.repair.support_search_steps = 1;
        let mut s = Structure::new(&config.world);
        let column = s.add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0).unwrap().beam;
        let mut agent = repairer_at(&config, &mut s, v(20.0, 0.0, 10.0), Some(column), 2);

        let mut table = MomentTable::new();
        table.set_moment(column, 500.0);

        let mut placed = None;
        for _ in 0..4 {
            table.run_analysis(&s).unwrap();
            let view = WorldView {
                structure: &s,
                analysis: &table,
                config: &config,
            };
            agent.decide(&view);
            for event in agent.act(&mut s) {
                if let SwarmEventKind::BeamPlaced {
                    beam, support_for, ..
                } = event
                {
                    placed = Some((beam, support_for));
                }
            }
            if placed.is_some() {
                break;
            }
        }
        let (support, support_for) = placed.expect("support placed");
        assert_eq!(support_for, Some(column));
        let beam = s.beam(support).unwrap();
        assert!(beam.end.z >= beam.start.z);
        assert_eq!(
            s.annotations().get(&support),
            Some(&crate::types::BeamAnnotation::Support)
        );
        assert!(!agent.memory().repair_mode());
        assert_eq!(agent.carried(), 1);
    }

    #[test]
    fn parallel_member_is_taken_as_support() {
        let config = SwarmConfig::default();
        let mut s = Structure::new(&config.world);
        let column = s.add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0).unwrap().beam;
        // A brace from the column at z = 6 and a second column rising from
        // the brace's far end, parallel to the first.
        let brace = s.add_beam(v(20.0, 0.0, 6.0), v(23.0, 0.0, 6.0), 1.0).unwrap().beam;
        let twin = s.add_beam(v(23.0, 0.0, 6.0), v(23.0, 0.0, 16.0), 1.0).unwrap().beam;
        let agent = repairer_at(&config, &mut s, v(23.0, 0.0, 6.0), Some(brace), 2);

        let mut table = MomentTable::new();
        table.run_analysis(&s).unwrap();
        let view = WorldView {
            structure: &s,
            analysis: &table,
            config: &config,
        };
        let repairer = Repairer::new(&config);
        let locomotion = Locomotion::new(&config.profiles[&AgentKind::Repairer]);
        let mut body = agent.body_for_tests();
        body.memory.flagged_beam = Some(column);
        body.memory.repair = Some(RepairState {
            target: column,
            steps_left: 3,
            descent: v(0.0, 0.0, -1.0),
            support: None,
        });
        let intent = repairer.continue_repair(&mut body, &view, &locomotion);
        match intent {
            Some(Intent::Climb { beam, .. }) => assert_eq!(beam, twin),
            other => panic!("expected a climb onto the twin, got {other:?}"),
        }
        assert_eq!(body.memory.repair.as_ref().unwrap().support, Some(twin));

        // Once on the twin and away from the joint, the repair ends.
        body.beam = Some(twin);
        body.location = v(23.0, 0.0, 8.0);
        assert_eq!(repairer.continue_repair(&mut body, &view, &locomotion), None);
        assert!(body.memory.repair.is_none());
        assert!(matches!(
            body.pending.last(),
            Some(SwarmEventKind::RepairResolved { support: Some(b), .. }) if *b == twin
        ));
    }

    #[test]
    fn empty_handed_repair_is_abandoned() {
        let config = SwarmConfig::default();
        let mut s = Structure::new(&config.world);
        let column = s.add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0).unwrap().beam;
        let agent = repairer_at(&config, &mut s, v(20.0, 0.0, 0.0), None, 0);
        let table = MomentTable::new();
        let view = WorldView {
            structure: &s,
            analysis: &table,
            config: &config,
        };
        let repairer = Repairer::new(&config);
        let locomotion = Locomotion::new(&config.profiles[&AgentKind::Repairer]);
        let mut body = agent.body_for_tests();
        body.memory.repair = Some(RepairState {
            target: column,
            steps_left: 0,
            descent: v(0.0, 0.0, -1.0),
            support: None,
        });
        assert_eq!(repairer.continue_repair(&mut body, &view, &locomotion), None);
        assert!(!body.memory.repair_mode());
        assert_eq!(
            body.pending,
            vec![SwarmEventKind::RepairAbandoned {
                agent: AgentId(0),
                beam: column
            }]
        );
    }

    #[test]
    fn analysis_failure_is_recorded_not_fatal() {
        let config = SwarmConfig::default();
        let mut s = Structure::new(&config.world);
        let column = s.add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0).unwrap().beam;
        let agent = repairer_at(&config, &mut s, v(20.0, 0.0, 5.0), Some(column), 1);

        /// Claims to be current but cannot answer moment queries.
        struct Broken(u64);
        impl StructuralAnalysis for Broken {
            fn moment(&self, _: BeamId, _: Vec3) -> Result<f64, crate::error::AnalysisError> {
                Err(crate::error::AnalysisError::Failed("no convergence".into()))
            }
            fn deflection(
                &self,
                _: BeamId,
            ) -> Result<Option<(Vec3, Vec3)>, crate::error::AnalysisError> {
                Ok(None)
            }
            fn run_analysis(
                &mut self,
                structure: &Structure,
            ) -> Result<(), crate::error::AnalysisError> {
                self.0 = structure.revision();
                Ok(())
            }
            fn analyzed_revision(&self) -> Option<u64> {
                Some(self.0)
            }
        }

        let broken = Broken(s.revision());
        let view = WorldView {
            structure: &s,
            analysis: &broken,
            config: &config,
        };
        let mut body = agent.body_for_tests();
        Repairer::new(&config).observe(&mut body, &view);
        assert_eq!(body.diagnostics.len(), 1);
        assert!(body.diagnostics[0].contains("no convergence"));
        assert_eq!(body.memory.flagged_beam, None);
    }
}
