// Swarm orchestrator: population, analysis refresh, and the lock-step loop.
//
// `Swarm` is the single source of truth for a run. It owns the config, the
// `Structure` (beam graph plus spatial index), the analysis provider, every
// agent, and the master PRNG. A run is a pure function:
// `(state, commands) -> (new_state, events)`.
//
// ## Step
//
// `step()` runs one timestep:
//
//   1. Apply the step's `SwarmCommand`s in slice order.
//   2. If the analysis provider is not current for the structure's
//      revision, ask it to re-run. Failures are logged and the step goes on
//      without stress data.
//   3. `decide_all()`: every agent chooses an `Intent` from a shared
//      read-only `WorldView`. Decisions never see another agent's intent, so
//      they run in parallel on the rayon pool.
//   4. `act_all()`: intents are applied to the structure one agent at a
//      time, in id order.
//   5. Advance the timestep.
//
// Two agents placing crossing beams in the same step is not supported: the
// second placement sees the first one's joints, so the outcome depends on
// id order.
//
// ## Population
//
// Agents spawn on the ground at a random point of the home area. Removal
// (`RemoveAgents`, `RemoveAgent`) releases the agent's load on its beam
// before deleting it. `Reset` replaces every agent with a fresh one of the
// same kind at home and keeps the structure. Agent ids are never reused.
//
// See also: `agent.rs` for the decide/act protocol, `command.rs` and
// `event.rs` for the external interface, `analysis.rs` for providers.
//
// **Critical constraint: determinism.** Agents live in a `BTreeMap` and act
// in id order; each owns a PRNG forked from the master at spawn time, so the
// parallel decide phase produces the same intents as a sequential one.

use crate::agent::{Agent, AgentBehavior, AgentSnapshot, WorldView};
use crate::analysis::{LeverArmEstimator, StructuralAnalysis};
use crate::command::SwarmCommand;
use crate::config::SwarmConfig;
use crate::error::SimError;
use crate::event::{SwarmEvent, SwarmEventKind};
use crate::geometry::Vec3;
use crate::structure::Structure;
use crate::types::{AgentId, AgentKind, BeamAnnotation, BeamId};
use rayon::prelude::*;
use scaffold_prng::SwarmRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// The result of one `step()`.
pub struct StepResult {
    /// Narrative events emitted during this step, in order.
    pub events: Vec<SwarmEvent>,
}

/// Externally visible beam state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BeamSnapshot {
    pub id: BeamId,
    pub start: Vec3,
    pub end: Vec3,
    pub deflected_start: Vec3,
    pub deflected_end: Vec3,
    pub load: f64,
}

/// Read-only view of a whole swarm at the end of a step, for loggers and
/// renderers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    pub timestep: u64,
    pub agents: Vec<AgentSnapshot>,
    pub beams: Vec<BeamSnapshot>,
    pub annotations: Vec<(BeamId, BeamAnnotation)>,
}

pub struct Swarm {
    config: SwarmConfig,
    structure: Structure,
    analysis: Box<dyn StructuralAnalysis>,
    agents: BTreeMap<AgentId, Agent>,
    next_agent: u32,
    rng: SwarmRng,
    timestep: u64,
}

impl Swarm {
    /// Create a swarm with the config's initial population at home.
    pub fn new(
        config: SwarmConfig,
        analysis: Box<dyn StructuralAnalysis>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let structure = Structure::new(&config.world);
        let rng = SwarmRng::new(config.seed);
        let mut swarm = Self {
            config,
            structure,
            analysis,
            agents: BTreeMap::new(),
            next_agent: 0,
            rng,
            timestep: 0,
        };

        let population: Vec<(AgentKind, u32)> = swarm
            .config
            .population
            .iter()
            .map(|(&kind, &count)| (kind, count))
            .collect();
        let mut events = Vec::new();
        for (kind, count) in population {
            swarm.add_agents(kind, count, &mut events)?;
        }
        info!(agents = swarm.agents.len(), seed = swarm.config.seed, "swarm created");
        Ok(swarm)
    }

    /// Create a swarm using the bundled weight-flow moment estimate.
    pub fn with_lever_arm(config: SwarmConfig) -> Result<Self, SimError> {
        Self::new(config, Box::new(LeverArmEstimator::new()))
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Mutable access for staging scenarios. Agents standing on a beam
    /// removed here drop to the ground on their next decide.
    pub fn structure_mut(&mut self) -> &mut Structure {
        &mut self.structure
    }

    pub fn analysis(&self) -> &dyn StructuralAnalysis {
        self.analysis.as_ref()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Mutable agent access, paired with the structure so staging moves
    /// can keep beam loads in sync.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<(&mut Agent, &mut Structure)> {
        let agent = self.agents.get_mut(&id)?;
        Some((agent, &mut self.structure))
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Apply `commands`, then run one decide pass and one act pass.
    pub fn step(&mut self, commands: &[SwarmCommand]) -> StepResult {
        let mut kinds = Vec::new();
        for command in commands {
            if let Err(e) = self.apply_command(command, &mut kinds) {
                warn!(timestep = self.timestep, error = %e, ?command, "command failed");
            }
        }

        self.refresh_analysis();
        self.decide_all();
        kinds.extend(self.act_all());

        let timestep = self.timestep;
        self.timestep += 1;
        debug!(timestep, events = kinds.len(), "step complete");
        StepResult {
            events: kinds
                .into_iter()
                .map(|kind| SwarmEvent { timestep, kind })
                .collect(),
        }
    }

    fn apply_command(
        &mut self,
        command: &SwarmCommand,
        events: &mut Vec<SwarmEventKind>,
    ) -> Result<(), SimError> {
        match command {
            SwarmCommand::AddAgents { kind, count } => self.add_agents(*kind, *count, events),
            SwarmCommand::RemoveAgents { count } => {
                self.remove_agents(*count, events);
                Ok(())
            }
            SwarmCommand::RemoveAgent { id } => self.remove_agent(*id, events),
            SwarmCommand::Reset => self.reset(events),
        }
    }

    /// Re-run the analysis if its results are stale, then copy deflections
    /// onto the beams.
    pub fn refresh_analysis(&mut self) {
        let revision = self.structure.revision();
        if self.analysis.is_current(revision) {
            return;
        }
        if let Err(e) = self.analysis.run_analysis(&self.structure) {
            warn!(revision, error = %e, "structural analysis failed");
            return;
        }
        if self.analysis.is_current(revision) {
            self.structure.apply_deflections(self.analysis.as_ref());
        }
    }

    /// Let every agent choose its intent. Read-only on shared state.
    pub fn decide_all(&mut self) {
        let view = WorldView {
            structure: &self.structure,
            analysis: self.analysis.as_ref(),
            config: &self.config,
        };
        self.agents
            .par_iter_mut()
            .for_each(|(_, agent)| agent.decide(&view));
    }

    /// Apply every agent's intent in id order.
    pub fn act_all(&mut self) -> Vec<SwarmEventKind> {
        let mut events = Vec::new();
        for agent in self.agents.values_mut() {
            events.extend(agent.act(&mut self.structure));
        }
        events
    }

    // -----------------------------------------------------------------------
    // Population
    // -----------------------------------------------------------------------

    fn spawn_point(&mut self) -> Vec3 {
        let home = &self.config.home;
        let [x, y, _] = self.rng.random_horizontal_unit();
        let r = self.rng.next_f64() * home.radius;
        let mut p = home.center() + Vec3::new(x, y, 0.0) * r;
        p.z = self.structure.ground();
        p
    }

    /// Spawn `count` agents of `kind` at the home area.
    pub fn add_agents(
        &mut self,
        kind: AgentKind,
        count: u32,
        events: &mut Vec<SwarmEventKind>,
    ) -> Result<(), SimError> {
        for _ in 0..count {
            let id = AgentId(self.next_agent);
            let location = self.spawn_point();
            let agent = Agent::new(id, kind, location, &self.config, self.rng.fork())?;
            self.next_agent += 1;
            self.agents.insert(id, agent);
            debug!(agent = %id, ?kind, "agent added");
            events.push(SwarmEventKind::AgentAdded {
                agent: id,
                kind,
                location,
            });
        }
        Ok(())
    }

    /// Remove the `count` most recently added agents (all of them if fewer
    /// exist).
    pub fn remove_agents(&mut self, count: u32, events: &mut Vec<SwarmEventKind>) {
        for _ in 0..count {
            let Some((_, mut agent)) = self.agents.pop_last() else {
                break;
            };
            agent.release(&mut self.structure);
            debug!(agent = %agent.id(), "agent removed");
            events.push(SwarmEventKind::AgentRemoved { agent: agent.id() });
        }
    }

    pub fn remove_agent(
        &mut self,
        id: AgentId,
        events: &mut Vec<SwarmEventKind>,
    ) -> Result<(), SimError> {
        let mut agent = self.agents.remove(&id).ok_or(SimError::UnknownAgent(id))?;
        agent.release(&mut self.structure);
        events.push(SwarmEventKind::AgentRemoved { agent: id });
        Ok(())
    }

    /// Replace every agent with a fresh one of the same kind at home.
    pub fn reset(&mut self, events: &mut Vec<SwarmEventKind>) -> Result<(), SimError> {
        let kinds: Vec<AgentKind> = self.agents.values().map(|a| a.kind).collect();
        let count = self.agents.len() as u32;
        self.remove_agents(count, events);
        for kind in kinds {
            self.add_agents(kind, 1, events)?;
        }
        info!(agents = self.agents.len(), "swarm reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> SwarmSnapshot {
        let agents = self
            .agents
            .values()
            .map(|a| a.current_state(&self.structure))
            .collect();
        let beams = self
            .structure
            .beams()
            .map(|b| {
                let (deflected_start, deflected_end) = b.deflected_endpoints();
                BeamSnapshot {
                    id: b.id,
                    start: b.start,
                    end: b.end,
                    deflected_start,
                    deflected_end,
                    load: b.load,
                }
            })
            .collect();
        SwarmSnapshot {
            timestep: self.timestep,
            agents,
            beams,
            annotations: self
                .structure
                .annotations()
                .iter()
                .map(|(&id, &a)| (id, a))
                .collect(),
        }
    }

    /// Serialize the current snapshot to JSON.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }
}
