// scaffold_sim: swarm construction simulation library.
//
// This crate contains all simulation logic for a swarm of agents that carry
// beams from a home area to a construction site and assemble them into a
// lattice: the geometry kernel, the beam/joint graph with its spatial index,
// the agent state machine and its strategies, the structural-analysis
// interface, and the lock-step orchestrator. It has no rendering or I/O
// dependencies and can be tested, benchmarked, and run headless.
//
// Module overview:
// - `swarm.rs`:        Top-level `Swarm`, population commands, decide/act loop, snapshots.
// - `structure.rs`:    Beam arena + uniform-grid spatial index, cell-path tracing, joints.
// - `beam.rs`:         `Beam` and `Joint` records, deflection interpolation.
// - `geometry.rs`:     Vector/segment helpers (intersection, closest points, rotations).
// - `agent.rs`:        `Agent`, `AgentBehavior`, typed memory, load bookkeeping.
// - `locomotion.rs`:   Direction election on the beam graph and ground wandering.
// - `construction.rs`: When and where to place a new beam.
// - `repair.rs`:       Overload detection, descent, and support placement.
// - `analysis.rs`:     `StructuralAnalysis` trait + bundled providers.
// - `command.rs`:      `SwarmCommand`: population mutations.
// - `event.rs`:        Narrative `SwarmEvent`s.
// - `config.rs`:       `SwarmConfig`: all tunable parameters, loaded from JSON.
// - `error.rs`:        `SimError` / `AnalysisError`.
// - `types.rs`:        `CellCoord`, `BeamId`, `AgentId`, `AgentKind`.
// - `prng`:            Re-exported from `scaffold_prng`: xoshiro256++ PRNG with SplitMix64 seeding.
//
// **Critical constraint: determinism.** A run is a pure function:
// `(state, commands) -> (new_state, events)`. All randomness comes from
// seeded PRNGs forked from the swarm's master. No `HashMap` iteration
// reaches an output, no system time, no OS entropy. Use `BTreeMap` for
// ordered collections.

pub mod agent;
pub mod analysis;
pub mod beam;
pub mod command;
pub mod config;
pub mod construction;
pub mod error;
pub mod event;
pub mod geometry;
pub mod locomotion;
pub use scaffold_prng as prng;
pub mod repair;
pub mod structure;
pub mod swarm;
pub mod types;
