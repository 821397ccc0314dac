// Narrative events emitted by the swarm.
//
// Every observable change during a step (agents joining or leaving, loads
// picked up, beams placed or rejected, repair progress) is reported as a
// `SwarmEvent` in the step's `StepResult`. Events are output only; nothing
// in the simulation reads them back. External tooling (loggers, renderers,
// the integration tests) consumes them alongside `Swarm::snapshot()`.
//
// See also: `swarm.rs` which stamps and collects events, `agent.rs` and
// `repair.rs` which produce the agent-side kinds.
//
// **Critical constraint: determinism.** Events within a step appear in
// command order, then in agent-id order.

use crate::geometry::Vec3;
use crate::types::{AgentId, AgentKind, BeamId};
use serde::{Deserialize, Serialize};

/// An event tagged with the timestep it happened in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwarmEvent {
    pub timestep: u64,
    pub kind: SwarmEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SwarmEventKind {
    AgentAdded {
        agent: AgentId,
        kind: AgentKind,
        location: Vec3,
    },
    AgentRemoved {
        agent: AgentId,
    },
    LoadPickedUp {
        agent: AgentId,
        count: u32,
    },
    Mounted {
        agent: AgentId,
        beam: BeamId,
    },
    Dismounted {
        agent: AgentId,
        beam: BeamId,
    },
    BeamPlaced {
        agent: AgentId,
        beam: BeamId,
        start: Vec3,
        end: Vec3,
        /// The overloaded beam this one was placed to support.
        support_for: Option<BeamId>,
    },
    /// A planned placement became unavailable before it could be applied.
    PlacementRejected {
        agent: AgentId,
        start: Vec3,
        end: Vec3,
    },
    OverloadDetected {
        agent: AgentId,
        beam: BeamId,
        moment: f64,
        limit: f64,
    },
    RepairStarted {
        agent: AgentId,
        beam: BeamId,
    },
    RepairResolved {
        agent: AgentId,
        beam: BeamId,
        support: Option<BeamId>,
    },
    RepairAbandoned {
        agent: AgentId,
        beam: BeamId,
    },
}

impl SwarmEventKind {
    /// The agent the event is about.
    pub fn agent(&self) -> AgentId {
        match self {
            Self::AgentAdded { agent, .. }
            | Self::AgentRemoved { agent }
            | Self::LoadPickedUp { agent, .. }
            | Self::Mounted { agent, .. }
            | Self::Dismounted { agent, .. }
            | Self::BeamPlaced { agent, .. }
            | Self::PlacementRejected { agent, .. }
            | Self::OverloadDetected { agent, .. }
            | Self::RepairStarted { agent, .. }
            | Self::RepairResolved { agent, .. }
            | Self::RepairAbandoned { agent, .. } => *agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = SwarmEvent {
            timestep: 7,
            kind: SwarmEventKind::BeamPlaced {
                agent: AgentId(2),
                beam: BeamId(5),
                start: Vec3::new(0.0, 0.0, 0.0),
                end: Vec3::new(0.0, 0.0, 10.0),
                support_for: Some(BeamId(3)),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let restored: SwarmEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.timestep, 7);
        assert_eq!(restored.kind, event.kind);
        assert_eq!(restored.kind.agent(), AgentId(2));
    }
}
