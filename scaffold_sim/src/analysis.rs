// Structural analysis interface and bundled providers.
//
// The simulation never computes member forces itself. Agents ask a
// `StructuralAnalysis` provider for per-beam bending moments and endpoint
// deflections; the provider answers from the results of its last
// `run_analysis()`. Results are tied to the `Structure::revision()` they
// were computed for, and `is_current()` is the lock-state query: agents only
// read moments when the provider is current for the present geometry, and
// treat anything else (stale results, provider errors) as "no stress data
// this step" rather than "safe".
//
// Providers bundled here:
// - `NoAnalysis`: never current. Every query is `AnalysisError::Stale`.
// - `MomentTable`: scripted moments and deflections per beam. Used by test
//   fixtures and as the landing spot for an external engine's results.
// - `LeverArmEstimator`: a weight-flow estimate. Load flows from the top of
//   the beam graph toward the ground (beams sharing joints pass their load
//   to neighbors nearer the ground, split evenly), and each beam's moment is
//   its carried load times the horizontal lever arm from its support point.
//   No deflection is reported.
//
// See also: `structure.rs` for `revision()` and `apply_deflections()`,
// `repair.rs` for the consumer of `moment()`, `swarm.rs` for the refresh at
// the start of each step.
//
// **Critical constraint: determinism.** Providers keep results in
// `BTreeMap`s and walk beams in id order.

use crate::error::AnalysisError;
use crate::geometry::{self, Vec3};
use crate::structure::Structure;
use crate::types::BeamId;
use std::collections::{BTreeMap, VecDeque};

/// A source of structural results for the current beam graph.
pub trait StructuralAnalysis: Send + Sync {
    /// Worst-case bending moment on `beam` near `near`.
    fn moment(&self, beam: BeamId, near: Vec3) -> Result<f64, AnalysisError>;

    /// Endpoint displacements of `beam`, or `None` if it is undeflected.
    fn deflection(&self, beam: BeamId) -> Result<Option<(Vec3, Vec3)>, AnalysisError>;

    /// Recompute results for the structure's present geometry.
    fn run_analysis(&mut self, structure: &Structure) -> Result<(), AnalysisError>;

    /// The structure revision the held results belong to.
    fn analyzed_revision(&self) -> Option<u64>;

    /// True if the held results are valid for `revision`.
    fn is_current(&self, revision: u64) -> bool {
        self.analyzed_revision() == Some(revision)
    }
}

// ---------------------------------------------------------------------------
// NoAnalysis
// ---------------------------------------------------------------------------

/// Provider for runs without structural feedback.
#[derive(Clone, Debug, Default)]
pub struct NoAnalysis;

impl StructuralAnalysis for NoAnalysis {
    fn moment(&self, _beam: BeamId, _near: Vec3) -> Result<f64, AnalysisError> {
        Err(AnalysisError::Stale)
    }

    fn deflection(&self, _beam: BeamId) -> Result<Option<(Vec3, Vec3)>, AnalysisError> {
        Err(AnalysisError::Stale)
    }

    fn run_analysis(&mut self, _structure: &Structure) -> Result<(), AnalysisError> {
        Ok(())
    }

    fn analyzed_revision(&self) -> Option<u64> {
        None
    }
}

// ---------------------------------------------------------------------------
// MomentTable
// ---------------------------------------------------------------------------

/// Scripted per-beam results. Beams without an entry report zero moment
/// and no deflection once an analysis has run.
#[derive(Clone, Debug, Default)]
pub struct MomentTable {
    moments: BTreeMap<BeamId, f64>,
    deflections: BTreeMap<BeamId, (Vec3, Vec3)>,
    failure: Option<String>,
    analyzed: Option<u64>,
}

impl MomentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_moment(&mut self, beam: BeamId, moment: f64) {
        self.moments.insert(beam, moment);
    }

    pub fn set_deflection(&mut self, beam: BeamId, start: Vec3, end: Vec3) {
        self.deflections.insert(beam, (start, end));
    }

    /// Make every subsequent `run_analysis()` fail with `message`.
    pub fn fail_with(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
        self.analyzed = None;
    }
}

impl StructuralAnalysis for MomentTable {
    fn moment(&self, beam: BeamId, _near: Vec3) -> Result<f64, AnalysisError> {
        if self.analyzed.is_none() {
            return Err(AnalysisError::Stale);
        }
        Ok(self.moments.get(&beam).copied().unwrap_or(0.0))
    }

    fn deflection(&self, beam: BeamId) -> Result<Option<(Vec3, Vec3)>, AnalysisError> {
        if self.analyzed.is_none() {
            return Err(AnalysisError::Stale);
        }
        Ok(self.deflections.get(&beam).copied())
    }

    fn run_analysis(&mut self, structure: &Structure) -> Result<(), AnalysisError> {
        if let Some(message) = &self.failure {
            return Err(AnalysisError::Failed(message.clone()));
        }
        self.analyzed = Some(structure.revision());
        Ok(())
    }

    fn analyzed_revision(&self) -> Option<u64> {
        self.analyzed
    }
}

// ---------------------------------------------------------------------------
// LeverArmEstimator
// ---------------------------------------------------------------------------

/// Weight-flow moment estimate over the joint graph.
#[derive(Clone, Debug, Default)]
pub struct LeverArmEstimator {
    moments: BTreeMap<BeamId, f64>,
    analyzed: Option<u64>,
}

impl LeverArmEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructuralAnalysis for LeverArmEstimator {
    fn moment(&self, beam: BeamId, _near: Vec3) -> Result<f64, AnalysisError> {
        if self.analyzed.is_none() {
            return Err(AnalysisError::Stale);
        }
        self.moments
            .get(&beam)
            .copied()
            .ok_or(AnalysisError::UnknownBeam(beam))
    }

    fn deflection(&self, beam: BeamId) -> Result<Option<(Vec3, Vec3)>, AnalysisError> {
        if self.analyzed.is_none() {
            return Err(AnalysisError::Stale);
        }
        if self.moments.contains_key(&beam) {
            Ok(None)
        } else {
            Err(AnalysisError::UnknownBeam(beam))
        }
    }

    fn run_analysis(&mut self, structure: &Structure) -> Result<(), AnalysisError> {
        self.moments = estimate_moments(structure);
        self.analyzed = Some(structure.revision());
        Ok(())
    }

    fn analyzed_revision(&self) -> Option<u64> {
        self.analyzed
    }
}

/// Distribute load from leaf beams toward grounded ones and convert each
/// beam's share into a moment about its support point.
fn estimate_moments(structure: &Structure) -> BTreeMap<BeamId, f64> {
    // BFS from grounded beams: hops to the ground through the joint graph.
    let mut hops: BTreeMap<BeamId, u32> = BTreeMap::new();
    let mut queue = VecDeque::new();
    for beam in structure.beams() {
        if structure.on_ground(beam.start) || structure.on_ground(beam.end) {
            hops.insert(beam.id, 0);
            queue.push_back(beam.id);
        }
    }
    while let Some(current) = queue.pop_front() {
        let (Some(&h), Some(beam)) = (hops.get(&current), structure.beam(current)) else {
            continue;
        };
        for other in beam.neighbors() {
            if !hops.contains_key(&other) {
                hops.insert(other, h + 1);
                queue.push_back(other);
            }
        }
    }

    // Leaves first, then toward the ground.
    let mut order: Vec<BeamId> = structure.beams().map(|b| b.id).collect();
    order.sort_by_key(|id| std::cmp::Reverse(hops.get(id).copied().unwrap_or(u32::MAX)));

    // Load received from beams further from the ground.
    let mut received: BTreeMap<BeamId, f64> = BTreeMap::new();
    let mut moments = BTreeMap::new();
    for id in order {
        let Some(beam) = structure.beam(id) else {
            continue;
        };
        let own_hops = hops.get(&id).copied();
        let inflow = received.get(&id).copied().unwrap_or(0.0);

        // Support points: a grounded endpoint, or joints shared with beams
        // nearer the ground.
        let mut supports: Vec<(BeamId, Vec3)> = Vec::new();
        for joint in beam.joints() {
            for &other in &joint.beams {
                let nearer = match (own_hops, hops.get(&other)) {
                    (Some(h), Some(&o)) => o < h,
                    _ => false,
                };
                if nearer {
                    supports.push((other, joint.point));
                }
            }
        }
        let support_point = if own_hops == Some(0) {
            beam.segment().lower()
        } else {
            supports
                .iter()
                .map(|&(_, p)| p)
                .min_by(|a, b| a.z.total_cmp(&b.z))
                .unwrap_or_else(|| beam.segment().lower())
        };

        let lever = geometry::horizontal_distance(support_point, beam.start)
            .max(geometry::horizontal_distance(support_point, beam.end));
        moments.insert(id, (beam.weight / 2.0 + beam.load + inflow) * lever);

        if !supports.is_empty() {
            let share = (beam.weight + beam.load + inflow) / supports.len() as f64;
            for (other, _) in supports {
                *received.entry(other).or_insert(0.0) += share;
            }
        }
    }
    moments
}
