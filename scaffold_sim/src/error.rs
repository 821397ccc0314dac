// Error types for the simulation core.
//
// Two enums, matching the two failure tiers that are not plain geometry:
// - `SimError`: broken invariants and invalid input (out-of-bounds
//   endpoints, a beam that traces zero cells, asymmetric joints, bad
//   config). These abort the operation that hit them.
// - `AnalysisError`: the structural-analysis collaborator could not answer.
//   Agents log these into their diagnostics and fall back to a conservative
//   decision; they never stop a run.
//
// Geometric degeneracies (parallel lines, no intersection) are not errors;
// see `geometry.rs`.

use crate::geometry::Vec3;
use crate::types::{AgentId, BeamId};

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("point ({}, {}, {}) lies outside the world bounds", .point.x, .point.y, .point.z)]
    OutOfBounds { point: Vec3 },

    #[error("beam endpoints coincide")]
    DegenerateBeam,

    #[error("beam path touches no cell of the spatial index")]
    EmptyCellPath,

    #[error("no beam named {0}")]
    UnknownBeam(BeamId),

    #[error("no agent named {0}")]
    UnknownAgent(AgentId),

    #[error("joint between {beam} and {other} is registered on only one side")]
    AsymmetricJoint { beam: BeamId, other: BeamId },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("analysis results are stale for the current geometry")]
    Stale,

    #[error("analysis has no result for beam {0}")]
    UnknownBeam(BeamId),

    #[error("analysis failed: {0}")]
    Failed(String),
}
