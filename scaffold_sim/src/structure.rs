// Spatial index over all beams (the "structure").
//
// The world box is partitioned into a fixed grid of cubic cells, stored as a
// flat `Vec` indexed by `x + y * nx + z * nx * ny`. Each cell holds the ids
// of every beam whose segment passes through it. The beams themselves live
// in an arena (`BTreeMap<BeamId, Beam>`) owned by the structure.
//
// ## Cell-path tracing
//
// `cell_path()` walks a segment boundary by boundary (a 3D DDA in the style
// of Amanatides & Woo): from the start cell, find the axis whose next cell
// boundary the segment reaches first (boundary distance scaled by the
// segment's per-axis rate of change), step into the neighbor across that
// boundary, and repeat until the end cell is reached. Cost is linear in the
// number of cells touched.
//
// ## Joints
//
// `add_beam()` tests the new segment against every beam already sharing a
// cell with it and registers each crossing through `link_joint()`, which
// writes the joint onto both beams in one step. `remove_beam()` clears the
// beam from its cells and undoes every joint through `unlink_beam()`. No
// other code path mutates joints, so the pair symmetry holds by
// construction; `check_joint_symmetry()` verifies it.
//
// Out-of-bounds queries are caller bugs and return `SimError::OutOfBounds`.
//
// See also: `geometry.rs` for the intersection tests, `beam.rs` for the
// joint lists, `analysis.rs` for the revision-based staleness check.
//
// **Critical constraint: determinism.** Cells are `BTreeSet`s and the arena
// a `BTreeMap`, so every query returns beams in id order.

use crate::analysis::StructuralAnalysis;
use crate::beam::{Beam, Deflection};
use crate::config::WorldParams;
use crate::error::SimError;
use crate::geometry::{self, EPSILON, Segment, Vec3};
use crate::types::{BeamAnnotation, BeamId, CellCoord};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace, warn};

/// Beams registered in one cell.
pub type Cell = BTreeSet<BeamId>;

/// Result of a successful `add_beam()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub beam: BeamId,
    /// Number of cells the beam was registered in (always >= 1).
    pub cells_touched: usize,
    /// Number of joints created with existing beams.
    pub joints: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Structure {
    world: WorldParams,
    dims: [usize; 3],
    cells: Vec<Cell>,
    beams: BTreeMap<BeamId, Beam>,
    next_beam: u32,
    max_height: f64,
    /// Bumped on every geometric or load change.
    revision: u64,
    annotations: BTreeMap<BeamId, BeamAnnotation>,
}

impl Structure {
    /// Create an empty structure covering `world`.
    pub fn new(world: &WorldParams) -> Self {
        let dims = world.dims();
        Self {
            world: world.clone(),
            dims,
            cells: vec![Cell::new(); dims[0] * dims[1] * dims[2]],
            beams: BTreeMap::new(),
            next_beam: 0,
            max_height: world.ground(),
            revision: 0,
            annotations: BTreeMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    pub fn world(&self) -> &WorldParams {
        &self.world
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn ground(&self) -> f64 {
        self.world.ground()
    }

    pub fn beam(&self, id: BeamId) -> Option<&Beam> {
        self.beams.get(&id)
    }

    pub fn beams(&self) -> impl Iterator<Item = &Beam> {
        self.beams.values()
    }

    pub fn beam_count(&self) -> usize {
        self.beams.len()
    }

    /// Highest beam endpoint ever registered (the ground when empty).
    pub fn max_height(&self) -> f64 {
        self.max_height
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn annotations(&self) -> &BTreeMap<BeamId, BeamAnnotation> {
        &self.annotations
    }

    pub fn in_bounds(&self, p: Vec3) -> bool {
        self.world.contains(p)
    }

    /// True if `p` lies on the ground plane.
    pub fn on_ground(&self, p: Vec3) -> bool {
        geometry::compare(p.z, self.ground())
    }

    // -----------------------------------------------------------------------
    // Cells
    // -----------------------------------------------------------------------

    /// The cell containing `p`, or `None` outside the world. Points on the
    /// far face of the world belong to the last cell.
    pub fn cell_of(&self, p: Vec3) -> Option<CellCoord> {
        if !self.in_bounds(p) {
            return None;
        }
        let local = p - self.world.origin();
        let mut coord = [0i32; 3];
        for (axis, c) in coord.iter_mut().enumerate() {
            let idx = (local[axis] / self.world.cell_size).floor() as i64;
            *c = idx.clamp(0, self.dims[axis] as i64 - 1) as i32;
        }
        Some(CellCoord::new(coord[0], coord[1], coord[2]))
    }

    fn index(&self, c: CellCoord) -> Option<usize> {
        let [nx, ny, nz] = self.dims;
        if c.x < 0 || c.y < 0 || c.z < 0 {
            return None;
        }
        let (x, y, z) = (c.x as usize, c.y as usize, c.z as usize);
        (x < nx && y < ny && z < nz).then(|| x + y * nx + z * nx * ny)
    }

    pub fn cell(&self, c: CellCoord) -> Option<&Cell> {
        self.index(c).map(|i| &self.cells[i])
    }

    /// The cell containing `point`.
    pub fn get_box(&self, point: Vec3) -> Result<&Cell, SimError> {
        self.cell_of(point)
            .and_then(|c| self.cell(c))
            .ok_or(SimError::OutOfBounds { point })
    }

    /// Every cell whose volume intersects the sphere at `point` with the
    /// given radius, clipped to the world. `point` itself must be in bounds.
    pub fn get_boxes(&self, point: Vec3, radius: f64) -> Result<Vec<CellCoord>, SimError> {
        if !self.in_bounds(point) {
            return Err(SimError::OutOfBounds { point });
        }
        let cs = self.world.cell_size;
        let local = point - self.world.origin();
        let range = |axis: usize| {
            let max = self.dims[axis] as i64 - 1;
            let lo = (((local[axis] - radius) / cs).floor() as i64).clamp(0, max) as i32;
            let hi = (((local[axis] + radius) / cs).floor() as i64).clamp(0, max) as i32;
            lo..=hi
        };

        let mut out = Vec::new();
        for z in range(2) {
            for y in range(1) {
                for x in range(0) {
                    // Distance from the sphere center to the cell's box.
                    let corner = [x, y, z];
                    let dist_sq: f64 = (0..3)
                        .map(|axis| {
                            let lo = corner[axis] as f64 * cs;
                            let hi = lo + cs;
                            let d = (lo - local[axis]).max(0.0).max(local[axis] - hi);
                            d * d
                        })
                        .sum();
                    if dist_sq.sqrt() <= radius + EPSILON {
                        out.push(CellCoord::new(x, y, z));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Ids of every beam registered in a cell within `radius` of `point`.
    pub fn nearby_beams(&self, point: Vec3, radius: f64) -> Result<Vec<BeamId>, SimError> {
        let mut seen = FxHashSet::default();
        for c in self.get_boxes(point, radius)? {
            if let Some(cell) = self.cell(c) {
                seen.extend(cell.iter().copied());
            }
        }
        let mut ids: Vec<BeamId> = seen.into_iter().collect();
        ids.sort();
        Ok(ids)
    }

    /// Cells crossed by the segment from `start` to `end`, in path order.
    pub fn cell_path(&self, start: Vec3, end: Vec3) -> Result<Vec<CellCoord>, SimError> {
        let mut current = self
            .cell_of(start)
            .ok_or(SimError::OutOfBounds { point: start })?;
        let end_cell = self
            .cell_of(end)
            .ok_or(SimError::OutOfBounds { point: end })?;

        let cs = self.world.cell_size;
        let local = start - self.world.origin();
        let dir = end - start;
        let t_tolerance = EPSILON / dir.norm().max(EPSILON);

        // Per axis: step sign, parameter at the next boundary, parameter
        // span of one cell.
        let mut step = [0i32; 3];
        let mut t_max = [f64::INFINITY; 3];
        let mut t_delta = [f64::INFINITY; 3];
        for axis in 0..3 {
            let cell = current.axis(axis) as f64;
            if dir[axis] > 0.0 {
                step[axis] = 1;
                t_delta[axis] = cs / dir[axis];
                t_max[axis] = ((cell + 1.0) * cs - local[axis]) / dir[axis];
            } else if dir[axis] < 0.0 {
                step[axis] = -1;
                t_delta[axis] = cs / -dir[axis];
                t_max[axis] = (local[axis] - cell * cs) / -dir[axis];
            }
        }

        let mut path = vec![current];
        let max_steps = self.dims.iter().sum::<usize>() + 3;
        while current != end_cell && path.len() <= max_steps {
            let axis = if t_max[0] <= t_max[1] && t_max[0] <= t_max[2] {
                0
            } else if t_max[1] <= t_max[2] {
                1
            } else {
                2
            };
            if t_max[axis] > 1.0 + t_tolerance {
                break;
            }
            let next = current.with_axis(axis, current.axis(axis) + step[axis]);
            if self.index(next).is_none() {
                break;
            }
            current = next;
            t_max[axis] += t_delta[axis];
            path.push(current);
        }
        // Rounding can stop the march short of the end cell; finish it one
        // face at a time so consecutive cells stay adjacent.
        while current != end_cell && path.len() <= max_steps {
            let Some(axis) = (0..3).find(|&a| current.axis(a) != end_cell.axis(a)) else {
                break;
            };
            let delta = (end_cell.axis(axis) - current.axis(axis)).signum();
            current = current.with_axis(axis, current.axis(axis) + delta);
            path.push(current);
        }
        trace!(cells = path.len(), "traced cell path");
        Ok(path)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Register a new beam from `start` to `end`.
    ///
    /// Registers the beam in every cell on its path and creates a joint
    /// (on both beams) for every existing beam it crosses. Fails without
    /// modifying anything if an endpoint is out of bounds or the beam is
    /// degenerate.
    pub fn add_beam(&mut self, start: Vec3, end: Vec3, weight: f64) -> Result<Placement, SimError> {
        for point in [start, end] {
            if !self.in_bounds(point) {
                return Err(SimError::OutOfBounds { point });
            }
        }
        if geometry::points_equal(start, end) {
            return Err(SimError::DegenerateBeam);
        }
        let path = self.cell_path(start, end)?;
        if path.is_empty() {
            return Err(SimError::EmptyCellPath);
        }

        let segment = Segment::new(start, end);
        let mut tested = FxHashSet::default();
        let mut crossings = Vec::new();
        for &c in &path {
            let Some(cell) = self.cell(c) else { continue };
            for &other in cell {
                if !tested.insert(other) {
                    continue;
                }
                if let Some(other_beam) = self.beams.get(&other)
                    && let Some(point) =
                        geometry::segment_intersection(&segment, &other_beam.segment(), true)
                {
                    crossings.push((other, point));
                }
            }
        }

        let id = BeamId(self.next_beam);
        self.next_beam += 1;
        let mut beam = Beam::new(id, start, end, weight);
        beam.cells = path.clone();
        self.beams.insert(id, beam);
        for &c in &path {
            if let Some(i) = self.index(c) {
                self.cells[i].insert(id);
            }
        }
        for &(other, point) in &crossings {
            self.link_joint(id, other, point)?;
        }
        debug_assert!(
            self.check_joint_symmetry().is_ok(),
            "joint symmetry broken by {id}"
        );

        self.max_height = self.max_height.max(start.z).max(end.z);
        self.revision += 1;
        debug!(
            beam = %id,
            cells = path.len(),
            joints = crossings.len(),
            "added beam"
        );
        Ok(Placement {
            beam: id,
            cells_touched: path.len(),
            joints: crossings.len(),
        })
    }

    /// Remove a beam and every joint referencing it.
    ///
    /// When `near` is a point on the beam, only the cells on the beam's
    /// recorded path are cleared; otherwise every cell is swept.
    pub fn remove_beam(&mut self, id: BeamId, near: Option<Vec3>) -> Result<Beam, SimError> {
        let beam = self.beams.get(&id).ok_or(SimError::UnknownBeam(id))?;
        if near.is_some_and(|p| beam.contains_point(p)) {
            let path = beam.cells.clone();
            for c in path {
                if let Some(i) = self.index(c) {
                    self.cells[i].remove(&id);
                }
            }
        } else {
            debug!(beam = %id, "removing beam by full cell sweep");
            for cell in &mut self.cells {
                cell.remove(&id);
            }
        }

        self.unlink_beam(id);
        let removed = self.beams.remove(&id).ok_or(SimError::UnknownBeam(id))?;
        self.annotations.remove(&id);
        self.max_height = self
            .beams
            .values()
            .flat_map(|b| [b.start.z, b.end.z])
            .fold(self.ground(), f64::max);
        self.revision += 1;
        Ok(removed)
    }

    /// Record a joint between `a` and `b` at `point` on both beams.
    fn link_joint(&mut self, a: BeamId, b: BeamId, point: Vec3) -> Result<(), SimError> {
        if a == b {
            return Ok(());
        }
        for id in [a, b] {
            if !self.beams.contains_key(&id) {
                return Err(SimError::UnknownBeam(id));
            }
        }
        if let Some(beam) = self.beams.get_mut(&a) {
            beam.add_joint(point, b);
        }
        if let Some(beam) = self.beams.get_mut(&b) {
            beam.add_joint(point, a);
        }
        Ok(())
    }

    /// Drop every joint between `id` and its neighbors, on both sides.
    fn unlink_beam(&mut self, id: BeamId) {
        let neighbors = match self.beams.get(&id) {
            Some(beam) => beam.neighbors(),
            None => return,
        };
        for other in neighbors {
            if let Some(beam) = self.beams.get_mut(&other) {
                beam.remove_joints_with(id);
            }
            if let Some(beam) = self.beams.get_mut(&id) {
                beam.remove_joints_with(other);
            }
        }
    }

    /// Add `delta` to the agent load carried by a beam (clamped at zero).
    pub fn adjust_load(&mut self, id: BeamId, delta: f64) -> Result<(), SimError> {
        let beam = self.beams.get_mut(&id).ok_or(SimError::UnknownBeam(id))?;
        beam.load = (beam.load + delta).max(0.0);
        self.revision += 1;
        Ok(())
    }

    pub fn annotate(&mut self, id: BeamId, annotation: BeamAnnotation) {
        if self.beams.contains_key(&id) {
            self.annotations.insert(id, annotation);
        }
    }

    /// Copy the provider's deflections onto every beam. Beams the provider
    /// cannot answer for are treated as undeflected.
    pub fn apply_deflections(&mut self, analysis: &dyn StructuralAnalysis) {
        for (id, beam) in &mut self.beams {
            let deflection = match analysis.deflection(*id) {
                Ok(d) => d.map(|(start, end)| Deflection { start, end }),
                Err(e) => {
                    warn!(beam = %id, error = %e, "no deflection data");
                    None
                }
            };
            beam.set_deflection(deflection);
        }
    }

    // -----------------------------------------------------------------------
    // Placement checks
    // -----------------------------------------------------------------------

    /// True if a beam with these endpoints (either orientation) exists.
    ///
    /// Scans every cell within tolerance of either endpoint, so a stored
    /// endpoint just across a cell boundary still counts.
    pub fn exists(&self, e1: Vec3, e2: Vec3) -> bool {
        let same = |b: &Beam| {
            (geometry::points_equal(b.start, e1) && geometry::points_equal(b.end, e2))
                || (geometry::points_equal(b.start, e2) && geometry::points_equal(b.end, e1))
        };
        [e1, e2].into_iter().any(|endpoint| {
            self.get_boxes(endpoint, EPSILON).is_ok_and(|cells| {
                cells
                    .iter()
                    .filter_map(|&c| self.cell(c))
                    .flat_map(|cell| cell.iter())
                    .filter_map(|id| self.beams.get(id))
                    .any(|b| same(b))
            })
        })
    }

    /// True if a new beam from `e1` to `e2` could be placed: both ends in
    /// bounds, not a duplicate, and not collinearly overlapping any beam
    /// registered in either endpoint's cell.
    pub fn available(&self, e1: Vec3, e2: Vec3) -> bool {
        if !self.in_bounds(e1) || !self.in_bounds(e2) || geometry::points_equal(e1, e2) {
            return false;
        }
        if self.exists(e1, e2) {
            return false;
        }
        let candidate = Segment::new(e1, e2);
        for endpoint in [e1, e2] {
            let Ok(cell) = self.get_box(endpoint) else {
                return false;
            };
            if cell
                .iter()
                .filter_map(|id| self.beams.get(id))
                .any(|b| overlaps_collinearly(&candidate, &b.segment()))
            {
                return false;
            }
        }
        true
    }

    /// Verify that every joint is recorded on both beams and every id in a
    /// cell resolves to a beam.
    pub fn check_joint_symmetry(&self) -> Result<(), SimError> {
        for beam in self.beams.values() {
            for joint in beam.joints() {
                for &other in &joint.beams {
                    let mirrored = self
                        .beams
                        .get(&other)
                        .and_then(|o| o.joint_at(joint.point))
                        .is_some_and(|j| j.beams.contains(&beam.id));
                    if !mirrored {
                        return Err(SimError::AsymmetricJoint {
                            beam: beam.id,
                            other,
                        });
                    }
                }
            }
        }
        for cell in &self.cells {
            if let Some(&id) = cell.iter().find(|id| !self.beams.contains_key(id)) {
                return Err(SimError::UnknownBeam(id));
            }
        }
        Ok(())
    }
}

/// True if `a` and `b` lie on one line and share more than a single point.
fn overlaps_collinearly(a: &Segment, b: &Segment) -> bool {
    if !geometry::collinear(a.start, a.end, b.start) || !geometry::collinear(a.start, a.end, b.end)
    {
        return false;
    }
    let axis = geometry::unit(a.direction());
    let t0 = (b.start - a.start).dot(&axis);
    let t1 = (b.end - a.start).dot(&axis);
    let lo = t0.min(t1).max(0.0);
    let hi = t0.max(t1).min(a.length());
    hi - lo > EPSILON
}
