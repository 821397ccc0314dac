// Test-only scenario harness for end-to-end swarm tests.
//
// Wraps a real `Swarm` (from `scaffold_sim::swarm`) with a builder for
// staging structures and agents, and with helpers that step the swarm while
// collecting every emitted event. Scenarios go through the same code paths
// as a headless run: the only test-specific code is the staging (placing
// beams and agents directly) and the event bookkeeping.
//
// See also: `tests/full_run.rs` for the scenarios.

use scaffold_prng::SwarmRng;
use scaffold_sim::agent::{Agent, AgentBehavior, WorldView};
use scaffold_sim::analysis::{MomentTable, NoAnalysis, StructuralAnalysis};
use scaffold_sim::command::SwarmCommand;
use scaffold_sim::config::SwarmConfig;
use scaffold_sim::event::{SwarmEvent, SwarmEventKind};
use scaffold_sim::geometry::Vec3;
use scaffold_sim::structure::Structure;
use scaffold_sim::swarm::Swarm;
use scaffold_sim::types::{AgentId, AgentKind, BeamId};

/// Shorthand for a point.
pub fn v(x: f64, y: f64, z: f64) -> Vec3 {
    Vec3::new(x, y, z)
}

/// Default config with a fixed seed and the given population.
pub fn config_with(seed: u64, builders: u32, repairers: u32) -> SwarmConfig {
    let mut config = SwarmConfig {
        seed,
        ..SwarmConfig::default()
    };
    config.population.insert(AgentKind::Builder, builders);
    config.population.insert(AgentKind::Repairer, repairers);
    config
}

/// A running swarm plus every event it has emitted.
pub struct Scenario {
    pub swarm: Swarm,
    pub events: Vec<SwarmEvent>,
}

impl Scenario {
    /// Swarm driven by the bundled weight-flow estimate.
    pub fn lever_arm(config: SwarmConfig) -> Self {
        Self {
            swarm: Swarm::with_lever_arm(config).expect("config should be valid"),
            events: Vec::new(),
        }
    }

    /// Swarm with no structural feedback.
    pub fn quiet(config: SwarmConfig) -> Self {
        Self {
            swarm: Swarm::new(config, Box::new(NoAnalysis)).expect("config should be valid"),
            events: Vec::new(),
        }
    }

    /// Place a beam directly, bypassing the agents.
    pub fn beam(&mut self, start: Vec3, end: Vec3) -> BeamId {
        let weight = self.swarm.config().beam.weight;
        self.swarm
            .structure_mut()
            .add_beam(start, end, weight)
            .expect("staged beam should fit")
            .beam
    }

    /// Run one step with `commands`, recording its events.
    pub fn step_with(&mut self, commands: &[SwarmCommand]) -> &[SwarmEvent] {
        let start = self.events.len();
        let result = self.swarm.step(commands);
        self.events.extend(result.events);
        &self.events[start..]
    }

    /// Run `steps` steps without commands.
    pub fn run(&mut self, steps: u32) {
        for _ in 0..steps {
            self.step_with(&[]);
        }
    }

    pub fn count(&self, pred: impl Fn(&SwarmEventKind) -> bool) -> usize {
        self.events.iter().filter(|e| pred(&e.kind)).count()
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.swarm.agents().map(|a| a.id()).collect()
    }
}

/// A single agent outside any swarm, for scenarios that script the
/// analysis provider step by step.
pub struct Solo {
    pub config: SwarmConfig,
    pub structure: Structure,
    pub agent: Agent,
    pub table: MomentTable,
}

impl Solo {
    pub fn new(kind: AgentKind, location: Vec3) -> Self {
        let config = SwarmConfig::default();
        let structure = Structure::new(&config.world);
        let agent = Agent::new(AgentId(0), kind, location, &config, SwarmRng::new(1))
            .expect("agent should be created");
        Self {
            config,
            structure,
            agent,
            table: MomentTable::new(),
        }
    }

    /// Re-run the scripted analysis for the current geometry, then run one
    /// decide/act cycle.
    pub fn cycle(&mut self) -> Vec<SwarmEventKind> {
        self.table
            .run_analysis(&self.structure)
            .expect("scripted analysis should run");
        let view = WorldView {
            structure: &self.structure,
            analysis: &self.table,
            config: &self.config,
        };
        self.agent.decide(&view);
        self.agent.act(&mut self.structure)
    }
}
