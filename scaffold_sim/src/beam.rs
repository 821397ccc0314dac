// Beam entities and their joint lists.
//
// A `Beam` is a straight member between two endpoints. Its joints record
// where other beams cross it: each `Joint` is a coordinate on this beam plus
// the ids of the beams meeting there. Beams never hold references to each
// other; the `Structure` arena resolves ids, which keeps ownership acyclic.
//
// Joint coordinates are matched by tolerance (`geometry::points_equal`),
// never by exact float keys. The joint mutators here are crate-private:
// only `Structure::link_joint` / `Structure::unlink_beam` touch them, and
// those always update both beams of a pair together.
//
// See also: `structure.rs` (the arena and spatial index), `analysis.rs`
// (deflection data written back onto beams).

use crate::geometry::{self, Segment, Vec3};
use crate::types::{BeamId, CellCoord};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A point where this beam meets one or more other beams.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Joint {
    pub point: Vec3,
    pub beams: SmallVec<[BeamId; 2]>,
}

/// Endpoint displacements reported by the analysis provider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deflection {
    pub start: Vec3,
    pub end: Vec3,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Beam {
    pub id: BeamId,
    pub start: Vec3,
    pub end: Vec3,
    /// Self-weight of the member.
    pub weight: f64,
    /// Weight currently imposed by agents standing on the beam.
    pub load: f64,
    /// Cells of the spatial index this beam was registered in.
    pub cells: Vec<CellCoord>,
    joints: Vec<Joint>,
    deflection: Option<Deflection>,
}

impl Beam {
    pub(crate) fn new(id: BeamId, start: Vec3, end: Vec3, weight: f64) -> Self {
        Self {
            id,
            start,
            end,
            weight,
            load: 0.0,
            cells: Vec::new(),
            joints: Vec::new(),
            deflection: None,
        }
    }

    pub fn segment(&self) -> Segment {
        Segment::new(self.start, self.end)
    }

    pub fn length(&self) -> f64 {
        self.segment().length()
    }

    /// Unit axis from `start` to `end`.
    pub fn axis(&self) -> Vec3 {
        geometry::unit(self.end - self.start)
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// The joint at `point`, if any.
    pub fn joint_at(&self, point: Vec3) -> Option<&Joint> {
        self.joints
            .iter()
            .find(|j| geometry::points_equal(j.point, point))
    }

    /// True if this beam records a joint with `other` anywhere along it.
    pub fn touches(&self, other: BeamId) -> bool {
        self.joints.iter().any(|j| j.beams.contains(&other))
    }

    /// Ids of every beam jointed to this one, sorted and deduplicated.
    pub fn neighbors(&self) -> Vec<BeamId> {
        let mut ids: Vec<BeamId> = self
            .joints
            .iter()
            .flat_map(|j| j.beams.iter().copied())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// True if `point` lies on this beam.
    pub fn contains_point(&self, point: Vec3) -> bool {
        geometry::on_line(self.start, self.end, point, true)
    }

    /// True if `point` is one of the endpoints.
    pub fn is_endpoint(&self, point: Vec3) -> bool {
        geometry::points_equal(point, self.start) || geometry::points_equal(point, self.end)
    }

    pub fn deflection(&self) -> Option<Deflection> {
        self.deflection
    }

    pub(crate) fn set_deflection(&mut self, deflection: Option<Deflection>) {
        self.deflection = deflection;
    }

    /// Endpoints displaced by the last reported deflection (or the nominal
    /// endpoints when none was reported).
    pub fn deflected_endpoints(&self) -> (Vec3, Vec3) {
        match self.deflection {
            Some(d) => (self.start + d.start, self.end + d.end),
            None => (self.start, self.end),
        }
    }

    /// Deflected position of a point on the beam, interpolating the endpoint
    /// displacements linearly along the axis.
    pub fn deflected_point(&self, point: Vec3) -> Vec3 {
        let Some(d) = self.deflection else {
            return point;
        };
        let length = self.length();
        let t = if length > geometry::EPSILON {
            ((point - self.start).dot(&(self.end - self.start)) / (length * length)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        point + d.start * (1.0 - t) + d.end * t
    }

    pub(crate) fn add_joint(&mut self, point: Vec3, other: BeamId) {
        debug_assert!(
            self.contains_point(point),
            "joint {point:?} is not on beam {}",
            self.id
        );
        if let Some(joint) = self
            .joints
            .iter_mut()
            .find(|j| geometry::points_equal(j.point, point))
        {
            if !joint.beams.contains(&other) {
                joint.beams.push(other);
            }
        } else {
            let mut beams = SmallVec::new();
            beams.push(other);
            self.joints.push(Joint { point, beams });
        }
    }

    /// Remove every joint entry referencing `other`. Returns the points that
    /// referenced it.
    pub(crate) fn remove_joints_with(&mut self, other: BeamId) -> Vec<Vec3> {
        let mut points = Vec::new();
        for joint in &mut self.joints {
            if let Some(pos) = joint.beams.iter().position(|&b| b == other) {
                joint.beams.remove(pos);
                points.push(joint.point);
            }
        }
        self.joints.retain(|j| !j.beams.is_empty());
        points
    }
}
