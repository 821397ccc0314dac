// Core types shared across the simulation.
//
// Defines grid coordinates (`CellCoord`), compact entity identifiers
// (`BeamId`, `AgentId`), the agent class enum (`AgentKind`), and beam
// diagnostic annotations. All types derive `Serialize` and `Deserialize` so
// snapshots and configs round-trip through JSON.
//
// Identifiers are sequential integers handed out by their owning arena
// (`Structure` for beams, `Swarm` for agents). Their `Display` form
// (`B12`, `A3`) doubles as the entity's name in snapshots and logs.
//
// **Critical constraint: determinism.** IDs are assigned in a fixed order;
// collections keyed by them are `BTreeMap`s.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial index coordinates
// ---------------------------------------------------------------------------

/// Integer coordinates of one cell in the spatial index.
///
/// The axes follow world space: x east, y north, z up. Coordinates may be
/// negative while a cell path is being traced; the index rejects them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn axis(self, axis: usize) -> i32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn with_axis(self, axis: usize, value: i32) -> Self {
        let mut c = self;
        match axis {
            0 => c.x = value,
            1 => c.y = value,
            _ => c.z = value,
        }
        c
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Entity IDs
// ---------------------------------------------------------------------------

macro_rules! compact_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

compact_id!(/// Arena identifier (and name) of a beam in the `Structure`.
BeamId, "B");
compact_id!(/// Identifier (and name) of an agent in the `Swarm`.
AgentId, "A");

// ---------------------------------------------------------------------------
// Simulation enums
// ---------------------------------------------------------------------------

/// Agent class. Behavioral differences come from the matching
/// `BehaviorProfile` in the config, not from separate agent types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentKind {
    /// Carries beams up the structure and places them.
    Builder,
    /// A builder that also watches for overloaded beams and props them up.
    Repairer,
}

/// Diagnostic annotation attached to a beam for external visualization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamAnnotation {
    /// An agent measured a moment above the beam's limit.
    Overloaded,
    /// Placed as a support for an overloaded beam.
    Support,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_as_names() {
        assert_eq!(BeamId(12).to_string(), "B12");
        assert_eq!(AgentId(3).to_string(), "A3");
    }

    #[test]
    fn cell_coord_axis_access() {
        let c = CellCoord::new(1, 2, 3);
        assert_eq!((c.axis(0), c.axis(1), c.axis(2)), (1, 2, 3));
        assert_eq!(c.with_axis(1, 9), CellCoord::new(1, 9, 3));
        assert_eq!(c.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn agent_kind_serializes_as_map_key() {
        let mut counts = std::collections::BTreeMap::new();
        counts.insert(AgentKind::Repairer, 2u32);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"Repairer":2}"#);
    }
}
