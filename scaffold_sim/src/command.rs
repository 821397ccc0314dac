// Commands that change the swarm population.
//
// All external mutations to a running swarm go through `SwarmCommand`. A
// step is a pure function `(state, commands) -> (new_state, events)`:
// `Swarm::step()` applies the step's commands first, in slice order, then
// runs the decide and act phases.
//
// See also: `swarm.rs` for `apply_command()` which dispatches these,
// `event.rs` for the events each command emits.

use crate::types::{AgentId, AgentKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwarmCommand {
    /// Spawn `count` agents of `kind` at the home area.
    AddAgents { kind: AgentKind, count: u32 },
    /// Remove the `count` most recently added agents.
    RemoveAgents { count: u32 },
    /// Remove one agent by id.
    RemoveAgent { id: AgentId },
    /// Replace every agent with a fresh one of the same kind at home.
    Reset,
}
