// Agents: per-agent state, the decide/act protocol, and load bookkeeping.
//
// Every agent is one `Agent` struct; behavioral differences between classes
// come from the strategy objects it is composed of, chosen by `AgentKind`
// and configured from its `BehaviorProfile`:
// - `Locomotion` (`locomotion.rs`): direction election on the beam graph and
//   ground wandering between home and the construction site.
// - `Constructor` (`construction.rs`): when to build and where the new beam
//   goes.
// - `Repairer` (`repair.rs`, repairers only): overload detection, descent,
//   and support placement.
//
// ## Two-phase protocol
//
// `decide()` reads the structure, the analysis provider, and the agent's own
// memory, and stores an `Intent`. It never mutates shared state, so the
// swarm runs it for all agents in parallel. `act()` applies the stored
// intent to the structure and returns the resulting events. Everything an
// agent needs to carry from one phase to the other (or from one step to the
// next) lives in its typed `AgentMemory`.
//
// ## Load bookkeeping
//
// An agent standing on a beam imposes its weight (`agent_weight` plus its
// carried beams) on that beam. `sync_load()` runs at the end of every `act()`
// and moves the imposed load when the agent changes beam or its weight
// changes; `release()` removes it before the agent is deleted.
//
// See also: `swarm.rs` for the orchestrator, `event.rs` for the events
// produced here, `config.rs` for `BehaviorProfile`.
//
// **Critical constraint: determinism.** Each agent draws only from its own
// `SwarmRng` (forked from the swarm's master at creation), so decisions are
// independent of the order in which agents are decided.

use crate::analysis::StructuralAnalysis;
use crate::config::{BehaviorProfile, SwarmConfig};
use crate::construction::Constructor;
use crate::error::SimError;
use crate::event::SwarmEventKind;
use crate::geometry::{self, EPSILON, Vec3};
use crate::locomotion::{self, Locomotion};
use crate::repair::{RepairState, Repairer};
use crate::structure::Structure;
use crate::types::{AgentId, AgentKind, BeamAnnotation, BeamId};
use scaffold_prng::SwarmRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Behavior trait and read-only view
// ---------------------------------------------------------------------------

/// Everything an agent may read while deciding.
#[derive(Clone, Copy)]
pub struct WorldView<'a> {
    pub structure: &'a Structure,
    pub analysis: &'a dyn StructuralAnalysis,
    pub config: &'a SwarmConfig,
}

impl WorldView<'_> {
    /// True if the analysis provider holds results for the present geometry.
    pub fn analysis_current(&self) -> bool {
        self.analysis.is_current(self.structure.revision())
    }
}

pub trait AgentBehavior {
    /// Choose this step's action. Reads shared state only.
    fn decide(&mut self, view: &WorldView<'_>);

    /// Apply the action chosen by `decide()`.
    fn act(&mut self, structure: &mut Structure) -> Vec<SwarmEventKind>;

    /// Externally visible state, with the location deflected by the
    /// current beam.
    fn current_state(&self, structure: &Structure) -> AgentSnapshot;

    /// Remove any load this agent imposes on the structure.
    fn release(&mut self, structure: &mut Structure);
}

// ---------------------------------------------------------------------------
// Typed agent state
// ---------------------------------------------------------------------------

/// Coarse locomotion state, derived from position, intent, and memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Grounded,
    OnStructure,
    Constructing,
    Repairing,
}

/// The action chosen by `decide()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    Idle,
    /// Take a fresh load of beams at home.
    PickUp,
    /// Move across the ground.
    Walk { direction: Vec3, distance: f64 },
    /// Step onto a beam at `point` (a grounded endpoint).
    Mount { beam: BeamId, point: Vec3 },
    /// Move along `beam` (possibly switching to it at a joint).
    Climb {
        beam: BeamId,
        direction: Vec3,
        distance: f64,
    },
    /// Step off the current beam onto the ground.
    Dismount,
    /// Place a new beam.
    Build {
        start: Vec3,
        end: Vec3,
        support_for: Option<BeamId>,
    },
}

/// Decision state carried between phases and steps.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentMemory {
    /// Direction of the last climb, for straight-line climbing.
    pub previous_direction: Option<Vec3>,
    /// Persistent heading while roaming on the ground.
    pub ground_direction: Option<Vec3>,
    /// Set by a placement, cleared by the next real move.
    pub built_since_move: bool,
    /// Beams placed over the agent's lifetime.
    pub builds: u32,
    /// Beam most recently measured above its moment limit.
    pub flagged_beam: Option<BeamId>,
    /// Beams found overloaded during the current step.
    pub broken_beams: Vec<BeamId>,
    /// Distance still available this step.
    pub remaining_step: f64,
    pub repair: Option<RepairState>,
}

impl AgentMemory {
    /// Reset the per-step fields.
    pub fn begin_step(&mut self, step_length: f64) {
        self.remaining_step = step_length;
        self.broken_beams.clear();
    }

    pub fn repair_mode(&self) -> bool {
        self.repair.is_some()
    }

    /// Repairing and still looking for a parallel support member.
    pub fn search_mode(&self) -> bool {
        self.repair
            .as_ref()
            .is_some_and(|r| r.steps_left > 0 && r.support.is_none())
    }

    /// The beam under repair, or the last flagged one.
    pub fn broken_beam(&self) -> Option<BeamId> {
        self.repair.as_ref().map(|r| r.target).or(self.flagged_beam)
    }
}

/// Mutable per-agent state shared by the strategies.
#[derive(Clone, Debug)]
pub struct Body {
    pub id: AgentId,
    pub location: Vec3,
    pub beam: Option<BeamId>,
    pub carried: u32,
    pub memory: AgentMemory,
    pub diagnostics: Vec<String>,
    pub(crate) rng: SwarmRng,
    pub(crate) intent: Intent,
    /// Load currently applied to the structure, and where.
    pub(crate) imposed: Option<(BeamId, f64)>,
    /// Events raised while deciding, emitted by the next `act()`.
    pub(crate) pending: Vec<SwarmEventKind>,
}

impl Body {
    /// Record a collaborator problem in the agent's diagnostics.
    pub(crate) fn note(&mut self, message: String) {
        warn!(agent = %self.id, "{message}");
        self.diagnostics.push(message);
    }
}

/// Externally visible agent state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub kind: AgentKind,
    pub state: AgentState,
    pub location: Vec3,
    /// Location adjusted by the current beam's deflection.
    pub deflected_location: Vec3,
    pub beam: Option<BeamId>,
    pub carried: u32,
    pub repair_mode: bool,
    pub search_mode: bool,
    pub broken_beam: Option<BeamId>,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Agent {
    pub kind: AgentKind,
    body: Body,
    profile: BehaviorProfile,
    beam_weight: f64,
    locomotion: Locomotion,
    constructor: Constructor,
    repairer: Option<Repairer>,
}

impl Agent {
    /// Create an agent of `kind` standing on the ground at `location`.
    pub fn new(
        id: AgentId,
        kind: AgentKind,
        location: Vec3,
        config: &SwarmConfig,
        rng: SwarmRng,
    ) -> Result<Self, SimError> {
        let profile = config.profile(kind)?.clone();
        let repairer = match kind {
            AgentKind::Builder => None,
            AgentKind::Repairer => Some(Repairer::new(config)),
        };
        Ok(Self {
            kind,
            body: Body {
                id,
                location,
                beam: None,
                carried: 0,
                memory: AgentMemory {
                    remaining_step: profile.step_length,
                    ..AgentMemory::default()
                },
                diagnostics: Vec::new(),
                rng,
                intent: Intent::Idle,
                imposed: None,
                pending: Vec::new(),
            },
            locomotion: Locomotion::new(&profile),
            constructor: Constructor::new(config),
            repairer,
            beam_weight: config.beam.weight,
            profile,
        })
    }

    pub fn id(&self) -> AgentId {
        self.body.id
    }

    pub fn location(&self) -> Vec3 {
        self.body.location
    }

    pub fn beam(&self) -> Option<BeamId> {
        self.body.beam
    }

    pub fn carried(&self) -> u32 {
        self.body.carried
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.body.memory
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.body.diagnostics
    }

    pub fn intent(&self) -> &Intent {
        &self.body.intent
    }

    pub fn profile(&self) -> &BehaviorProfile {
        &self.profile
    }

    /// Weight imposed on the beam the agent stands on.
    pub fn weight(&self) -> f64 {
        self.profile.agent_weight + self.body.carried as f64 * self.beam_weight
    }

    /// Put the agent at `location`, on `beam` or on the ground, and move its
    /// imposed load accordingly. Used to stage scenarios.
    pub fn place(
        &mut self,
        structure: &mut Structure,
        location: Vec3,
        beam: Option<BeamId>,
    ) -> Result<(), SimError> {
        if !structure.in_bounds(location) {
            return Err(SimError::OutOfBounds { point: location });
        }
        if let Some(id) = beam
            && structure.beam(id).is_none()
        {
            return Err(SimError::UnknownBeam(id));
        }
        self.body.location = location;
        self.body.beam = beam;
        self.body.memory.previous_direction = None;
        self.sync_load(structure);
        Ok(())
    }

    pub fn set_carried(&mut self, structure: &mut Structure, carried: u32) {
        self.body.carried = carried;
        self.sync_load(structure);
    }

    #[cfg(test)]
    pub(crate) fn body_for_tests(&self) -> Body {
        self.body.clone()
    }

    /// Location displaced by the current beam's reported deflection.
    pub fn deflected_location(&self, structure: &Structure) -> Vec3 {
        self.body
            .beam
            .and_then(|id| structure.beam(id))
            .map_or(self.body.location, |b| b.deflected_point(self.body.location))
    }

    /// Move the imposed load to match the current beam and weight.
    fn sync_load(&mut self, structure: &mut Structure) {
        let desired = self.body.beam.map(|b| (b, self.weight()));
        if desired == self.body.imposed {
            return;
        }
        if let Some((old, w)) = self.body.imposed.take() {
            // The beam may have been removed with the load still on it.
            if structure.adjust_load(old, -w).is_err() {
                debug!(agent = %self.body.id, beam = %old, "load target gone");
            }
        }
        if let Some((beam, w)) = desired {
            match structure.adjust_load(beam, w) {
                Ok(()) => self.body.imposed = desired,
                Err(e) => self.body.note(format!("could not load {beam}: {e}")),
            }
        }
    }

    fn apply_build(
        &mut self,
        structure: &mut Structure,
        start: Vec3,
        end: Vec3,
        support_for: Option<BeamId>,
        events: &mut Vec<SwarmEventKind>,
    ) {
        let id = self.body.id;
        if self.body.carried == 0 || !structure.available(start, end) {
            debug!(agent = %id, "placement no longer available");
            events.push(SwarmEventKind::PlacementRejected { agent: id, start, end });
            return;
        }
        let placement = match structure.add_beam(start, end, self.beam_weight) {
            Ok(p) => p,
            Err(e) => {
                self.body.note(format!("placement failed: {e}"));
                events.push(SwarmEventKind::PlacementRejected { agent: id, start, end });
                return;
            }
        };
        self.body.carried -= 1;
        self.body.memory.builds += 1;
        self.body.memory.built_since_move = true;
        info!(agent = %id, beam = %placement.beam, joints = placement.joints, "placed beam");
        events.push(SwarmEventKind::BeamPlaced {
            agent: id,
            beam: placement.beam,
            start,
            end,
            support_for,
        });

        if let Some(target) = support_for {
            structure.annotate(placement.beam, BeamAnnotation::Support);
            self.body.memory.repair = None;
            self.body.memory.flagged_beam = None;
            events.push(SwarmEventKind::RepairResolved {
                agent: id,
                beam: target,
                support: Some(placement.beam),
            });
        }
    }
}

impl AgentBehavior for Agent {
    fn decide(&mut self, view: &WorldView<'_>) {
        let body = &mut self.body;
        body.memory.begin_step(self.locomotion.step_length);
        body.intent = Intent::Idle;

        if let Some(id) = body.beam
            && view.structure.beam(id).is_none()
        {
            body.note(format!("{id} was removed underfoot"));
            body.beam = None;
            body.location.z = view.structure.ground();
            body.memory.previous_direction = None;
        }

        if let Some(repairer) = &self.repairer {
            repairer.observe(body, view);
            if body.memory.repair_mode()
                && let Some(intent) = repairer.continue_repair(body, view, &self.locomotion)
            {
                body.intent = intent;
                return;
            }
        }

        if self.constructor.should_construct(body, view)
            && let Some(intent) = self.constructor.plan_build(body, view)
        {
            body.intent = intent;
            return;
        }

        let beam = body.beam;
        body.intent = match beam {
            None => self.locomotion.wander(body, view),
            Some(_) if body.carried == 0 && view.structure.on_ground(body.location) => {
                Intent::Dismount
            }
            Some(_) => {
                let flagged = body.memory.flagged_beam;
                let options = self
                    .locomotion
                    .available_directions(body, view.structure, flagged);
                let election = self.locomotion.elect(body, view, &options);
                let repair = match &self.repairer {
                    Some(r) if election.relaxed && flagged.is_some() => {
                        r.enter_repair(body, view, &self.locomotion)
                    }
                    _ => None,
                };
                repair.unwrap_or_else(|| {
                    self.locomotion
                        .climb_intent(body, view.structure, election.choice)
                })
            }
        };
        debug!(agent = %body.id, intent = ?body.intent, "decided");
    }

    fn act(&mut self, structure: &mut Structure) -> Vec<SwarmEventKind> {
        let mut events = std::mem::take(&mut self.body.pending);
        for event in &events {
            if let SwarmEventKind::OverloadDetected { beam, .. } = event {
                structure.annotate(*beam, BeamAnnotation::Overloaded);
            }
        }

        let id = self.body.id;
        match self.body.intent.clone() {
            Intent::Idle => {}
            Intent::PickUp => {
                let count = self.profile.beams_per_load.saturating_sub(self.body.carried);
                self.body.carried += count;
                events.push(SwarmEventKind::LoadPickedUp { agent: id, count });
            }
            Intent::Walk { direction, distance } => {
                let mut target = self.body.location + direction * distance;
                target.z = structure.ground();
                if structure.in_bounds(target) {
                    self.body.location = target;
                    self.body.memory.remaining_step -= distance;
                    if distance > EPSILON {
                        self.body.memory.built_since_move = false;
                    }
                } else {
                    self.body.memory.ground_direction = None;
                }
            }
            Intent::Mount { beam, point } => {
                if structure.beam(beam).is_some() {
                    let moved = geometry::distance(self.body.location, point);
                    self.body.location = point;
                    self.body.beam = Some(beam);
                    self.body.memory.previous_direction = None;
                    self.body.memory.remaining_step -= moved;
                    if moved > EPSILON {
                        self.body.memory.built_since_move = false;
                    }
                    events.push(SwarmEventKind::Mounted { agent: id, beam });
                }
            }
            Intent::Climb {
                beam,
                direction,
                distance,
            } => {
                if let Some(b) = structure.beam(beam) {
                    self.body.location =
                        locomotion::settle_on_beam(b, self.body.location + direction * distance);
                    self.body.beam = Some(beam);
                    self.body.memory.previous_direction = Some(direction);
                    self.body.memory.remaining_step -= distance;
                    if distance > EPSILON {
                        self.body.memory.built_since_move = false;
                    }
                }
            }
            Intent::Dismount => {
                if let Some(beam) = self.body.beam.take() {
                    self.body.location.z = structure.ground();
                    self.body.memory.previous_direction = None;
                    events.push(SwarmEventKind::Dismounted { agent: id, beam });
                }
            }
            Intent::Build {
                start,
                end,
                support_for,
            } => self.apply_build(structure, start, end, support_for, &mut events),
        }

        self.sync_load(structure);
        events
    }

    fn current_state(&self, structure: &Structure) -> AgentSnapshot {
        let memory = &self.body.memory;
        let state = if memory.repair_mode() {
            AgentState::Repairing
        } else if matches!(self.body.intent, Intent::Build { .. }) {
            AgentState::Constructing
        } else if self.body.beam.is_some() {
            AgentState::OnStructure
        } else {
            AgentState::Grounded
        };
        AgentSnapshot {
            id: self.body.id,
            kind: self.kind,
            state,
            location: self.body.location,
            deflected_location: self.deflected_location(structure),
            beam: self.body.beam,
            carried: self.body.carried,
            repair_mode: memory.repair_mode(),
            search_mode: memory.search_mode(),
            broken_beam: memory.broken_beam(),
        }
    }

    fn release(&mut self, structure: &mut Structure) {
        if let Some((beam, w)) = self.body.imposed.take()
            && structure.adjust_load(beam, -w).is_err()
        {
            debug!(agent = %self.body.id, beam = %beam, "released load on a removed beam");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{MomentTable, NoAnalysis};

    fn v(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, y, z)
    }

    fn setup(kind: AgentKind) -> (SwarmConfig, Structure, Agent) {
        let config = SwarmConfig::default();
        let structure = Structure::new(&config.world);
        let agent = Agent::new(AgentId(0), kind, v(0.0, 0.0, 0.0), &config, SwarmRng::new(7))
            .unwrap();
        (config, structure, agent)
    }

    fn cycle(
        agent: &mut Agent,
        structure: &mut Structure,
        analysis: &dyn StructuralAnalysis,
        config: &SwarmConfig,
    ) -> Vec<SwarmEventKind> {
        let view = WorldView {
            structure,
            analysis,
            config,
        };
        agent.decide(&view);
        agent.act(structure)
    }

    #[test]
    fn grounded_agent_moves_at_most_one_step() {
        let (config, mut structure, mut agent) = setup(AgentKind::Builder);
        assert!(agent.memory().ground_direction.is_none());
        cycle(&mut agent, &mut structure, &NoAnalysis, &config);
        let moved = geometry::distance(agent.location(), v(0.0, 0.0, 0.0));
        assert!(moved <= 2.0 + EPSILON, "moved {moved}");
        assert!(moved > 0.0, "an empty-handed agent heads home");
        assert!(structure.in_bounds(agent.location()));
        assert_eq!(agent.current_state(&structure).state, AgentState::Grounded);
    }

    #[test]
    fn agent_at_home_picks_up_a_load() {
        let (config, mut structure, mut agent) = setup(AgentKind::Repairer);
        agent
            .place(&mut structure, config.home.center(), None)
            .unwrap();
        let events = cycle(&mut agent, &mut structure, &NoAnalysis, &config);
        assert_eq!(agent.carried(), 2);
        assert!(events.contains(&SwarmEventKind::LoadPickedUp {
            agent: AgentId(0),
            count: 2
        }));
    }

    #[test]
    fn load_follows_the_agent() {
        let (config, mut structure, mut agent) = setup(AgentKind::Builder);
        let a = structure
            .add_beam(v(0.0, 0.0, 0.0), v(0.0, 0.0, 10.0), 1.0)
            .unwrap()
            .beam;
        let b = structure
            .add_beam(v(3.0, 0.0, 0.0), v(3.0, 0.0, 10.0), 1.0)
            .unwrap()
            .beam;
        agent.place(&mut structure, v(0.0, 0.0, 4.0), Some(a)).unwrap();
        agent.set_carried(&mut structure, 1);
        let expected = config.profiles[&AgentKind::Builder].agent_weight + config.beam.weight;
        assert!((structure.beam(a).unwrap().load - expected).abs() < 1e-12);

        agent.place(&mut structure, v(3.0, 0.0, 4.0), Some(b)).unwrap();
        assert_eq!(structure.beam(a).unwrap().load, 0.0);
        assert!((structure.beam(b).unwrap().load - expected).abs() < 1e-12);

        agent.release(&mut structure);
        assert_eq!(structure.beam(b).unwrap().load, 0.0);
    }

    #[test]
    fn empty_handed_agent_steps_off_at_ground_level() {
        let (config, mut structure, mut agent) = setup(AgentKind::Builder);
        let a = structure
            .add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0)
            .unwrap()
            .beam;
        agent.place(&mut structure, v(20.0, 0.0, 0.0), Some(a)).unwrap();
        let events = cycle(&mut agent, &mut structure, &NoAnalysis, &config);
        assert!(events.contains(&SwarmEventKind::Dismounted {
            agent: AgentId(0),
            beam: a
        }));
        assert_eq!(agent.beam(), None);
        assert_eq!(structure.beam(a).unwrap().load, 0.0);
    }

    #[test]
    fn removed_beam_drops_agent_to_ground() {
        let (config, mut structure, mut agent) = setup(AgentKind::Builder);
        let a = structure
            .add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0)
            .unwrap()
            .beam;
        agent.place(&mut structure, v(20.0, 0.0, 6.0), Some(a)).unwrap();
        structure.remove_beam(a, None).unwrap();
        cycle(&mut agent, &mut structure, &NoAnalysis, &config);
        assert_eq!(agent.beam(), None);
        assert_eq!(agent.location().z, 0.0);
        assert_eq!(agent.diagnostics().len(), 1);
    }

    #[test]
    fn overloaded_dead_end_enters_repair_mode() {
        let (config, mut structure, mut agent) = setup(AgentKind::Repairer);
        // A lone column outside the site: from its top the only way is down,
        // which fails the carrying agent's "up" and "toward site" tests.
        let column = structure
            .add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0)
            .unwrap()
            .beam;
        agent.place(&mut structure, v(20.0, 0.0, 10.0), Some(column)).unwrap();
        agent.set_carried(&mut structure, 2);

        let mut table = MomentTable::new();
        table.set_moment(column, 1_000.0);
        table.run_analysis(&structure).unwrap();

        let view = WorldView {
            structure: &structure,
            analysis: &table,
            config: &config,
        };
        agent.decide(&view);
        let memory = agent.memory();
        assert!(memory.repair_mode());
        assert_eq!(memory.broken_beam(), Some(column));
        assert_eq!(memory.broken_beams, vec![column]);
        assert!(matches!(
            agent.intent(),
            Intent::Climb { direction, .. } if direction.z < 0.0
        ));

        let events = agent.act(&mut structure);
        assert!(events.iter().any(|e| matches!(
            e,
            SwarmEventKind::OverloadDetected { beam, .. } if *beam == column
        )));
        assert!(events.contains(&SwarmEventKind::RepairStarted {
            agent: AgentId(0),
            beam: column
        }));
        assert_eq!(
            structure.annotations().get(&column),
            Some(&BeamAnnotation::Overloaded)
        );
        assert_eq!(agent.current_state(&structure).state, AgentState::Repairing);
    }

    #[test]
    fn stale_analysis_is_not_read() {
        let (config, mut structure, mut agent) = setup(AgentKind::Repairer);
        let column = structure
            .add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0)
            .unwrap()
            .beam;
        let mut table = MomentTable::new();
        table.set_moment(column, 1_000.0);
        table.run_analysis(&structure).unwrap();
        // Placing the agent changes the load, so the results go stale.
        agent.place(&mut structure, v(20.0, 0.0, 10.0), Some(column)).unwrap();
        agent.set_carried(&mut structure, 2);
        cycle(&mut agent, &mut structure, &table, &config);
        assert!(!agent.memory().repair_mode());
        assert_eq!(agent.memory().flagged_beam, None);
    }

    #[test]
    fn snapshot_reports_deflected_location() {
        let (_, mut structure, mut agent) = setup(AgentKind::Builder);
        let a = structure
            .add_beam(v(0.0, 0.0, 0.0), v(0.0, 0.0, 10.0), 1.0)
            .unwrap()
            .beam;
        agent.place(&mut structure, v(0.0, 0.0, 10.0), Some(a)).unwrap();
        let mut table = MomentTable::new();
        table.set_deflection(a, Vec3::zeros(), v(1.0, 0.0, 0.0));
        table.run_analysis(&structure).unwrap();
        structure.apply_deflections(&table);
        let snapshot = agent.current_state(&structure);
        assert!(geometry::points_equal(snapshot.location, v(0.0, 0.0, 10.0)));
        assert!(geometry::points_equal(snapshot.deflected_location, v(1.0, 0.0, 10.0)));
    }
}
