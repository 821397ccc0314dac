// Tolerance-aware 3D geometry primitives.
//
// Everything the spatial index and the agents know about space goes through
// this module: segment/segment intersection, closest points between skew
// segments, segment/sphere intersection, on-line and collinearity tests, and
// the rotation helper that turns "angle from vertical" into an angle relative
// to an arbitrary beam axis.
//
// Points and vectors share one type, `Vec3` (a `nalgebra::Vector3<f64>`).
// All equality tests are built from `compare()`, never from exact float
// equality.
//
// Failure policy:
// - Geometrically ambiguous configurations (parallel lines, no intersection,
//   point outside a segment) return `None` or an empty `Vec`.
// - `unit()` of a zero-length vector is a caller bug and panics.
//
// See also: `structure.rs` (cell-path tracing and joint detection),
// `locomotion.rs`, `construction.rs`, `repair.rs`.

use nalgebra::{Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// Point or direction in world space.
pub type Vec3 = Vector3<f64>;

/// Absolute tolerance for every geometric comparison.
pub const EPSILON: f64 = 1e-4;

/// World "up". The ground plane is perpendicular to this.
pub fn up() -> Vec3 {
    Vec3::new(0.0, 0.0, 1.0)
}

/// A bounded line segment between two points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Vec3,
    pub end: Vec3,
}

impl Segment {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    /// Unnormalized direction `end - start`.
    pub fn direction(&self) -> Vec3 {
        self.end - self.start
    }

    pub fn length(&self) -> f64 {
        self.direction().norm()
    }

    pub fn midpoint(&self) -> Vec3 {
        midpoint(self.start, self.end)
    }

    /// Point at parameter `t` (0 = start, 1 = end).
    pub fn point_at(&self, t: f64) -> Vec3 {
        self.start + self.direction() * t
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.end, self.start)
    }

    /// The endpoint with the larger z (ties favor `end`).
    pub fn upper(&self) -> Vec3 {
        if self.start.z > self.end.z {
            self.start
        } else {
            self.end
        }
    }

    /// The endpoint with the smaller z (ties favor `start`).
    pub fn lower(&self) -> Vec3 {
        if self.start.z > self.end.z {
            self.end
        } else {
            self.start
        }
    }
}

/// `|a - b| < EPSILON`.
pub fn compare(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Component-wise `compare()`.
pub fn points_equal(a: Vec3, b: Vec3) -> bool {
    compare(a.x, b.x) && compare(a.y, b.y) && compare(a.z, b.z)
}

/// True if `v` is shorter than the tolerance.
pub fn is_zero(v: Vec3) -> bool {
    v.norm() < EPSILON
}

/// Unit vector in the direction of `v`.
///
/// Panics on a zero-length vector: callers must rule that out.
pub fn unit(v: Vec3) -> Vec3 {
    let len = v.norm();
    assert!(len > EPSILON, "unit(): zero-length vector {v:?}");
    v / len
}

/// Unit vector, or `None` for a zero-length input.
pub fn try_unit(v: Vec3) -> Option<Vec3> {
    let len = v.norm();
    (len > EPSILON).then(|| v / len)
}

pub fn midpoint(a: Vec3, b: Vec3) -> Vec3 {
    (a + b) * 0.5
}

pub fn distance(a: Vec3, b: Vec3) -> f64 {
    (b - a).norm()
}

/// Distance between two points projected onto the ground plane.
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// True if `a` and `b` point along the same line (either sense).
/// Zero vectors are parallel to nothing.
pub fn parallel(a: Vec3, b: Vec3) -> bool {
    match (try_unit(a), try_unit(b)) {
        (Some(ua), Some(ub)) => ua.cross(&ub).norm() < EPSILON,
        _ => false,
    }
}

/// True if `a` and `b` are parallel and point the same way.
pub fn same_direction(a: Vec3, b: Vec3) -> bool {
    parallel(a, b) && a.dot(&b) > 0.0
}

/// Angle between two vectors in radians, in [0, π].
///
/// Returns `None` if either vector has zero length.
pub fn angle_between(a: Vec3, b: Vec3) -> Option<f64> {
    let ua = try_unit(a)?;
    let ub = try_unit(b)?;
    Some(ua.dot(&ub).clamp(-1.0, 1.0).acos())
}

/// True if `p` lies inside the bounding box spanned by `a` and `b`
/// (inclusive, with tolerance).
pub fn between_points(a: Vec3, b: Vec3, p: Vec3) -> bool {
    (0..3).all(|i| {
        let lo = a[i].min(b[i]);
        let hi = a[i].max(b[i]);
        p[i] >= lo - EPSILON && p[i] <= hi + EPSILON
    })
}

/// True if `p` lies inside the axis-aligned box at `origin` with extent
/// `size` (inclusive, with tolerance).
pub fn within(origin: Vec3, size: Vec3, p: Vec3) -> bool {
    between_points(origin, origin + size, p)
}

/// True if the three points lie on one line.
pub fn collinear(a: Vec3, b: Vec3, c: Vec3) -> bool {
    let ab = b - a;
    if is_zero(ab) {
        return true;
    }
    ab.cross(&(c - a)).norm() / ab.norm() < EPSILON
}

/// True if `point` lies on the line through `l1` and `l2` and, when
/// `segment` is set, between them.
///
/// A degenerate line (`l1 == l2`) contains only that point.
pub fn on_line(l1: Vec3, l2: Vec3, point: Vec3, segment: bool) -> bool {
    if points_equal(l1, l2) {
        return points_equal(l1, point);
    }
    collinear(l1, l2, point) && (!segment || between_points(l1, l2, point))
}

/// Parameter tolerance for a segment of the given direction, so that the
/// positional tolerance stays `EPSILON` regardless of segment length.
fn param_tolerance(direction: Vec3) -> f64 {
    EPSILON / direction.norm().max(EPSILON)
}

/// The unique intersection of two segments (or their infinite lines when
/// `segment` is false).
///
/// Returns `None` when the lines are parallel, skew, or the intersection
/// lies outside either segment. Segments sharing an endpoint return that
/// endpoint even when they are collinear.
pub fn segment_intersection(l1: &Segment, l2: &Segment, segment: bool) -> Option<Vec3> {
    for &p in &[l1.start, l1.end] {
        if points_equal(p, l2.start) || points_equal(p, l2.end) {
            return Some(p);
        }
    }

    let d1 = l1.direction();
    let d2 = l2.direction();
    let w = l2.start - l1.start;
    let normal = d1.cross(&d2);
    let normal_len = normal.norm();
    if normal_len < EPSILON {
        return None;
    }

    // Distance between the two lines along their common normal.
    if (w.dot(&normal) / normal_len).abs() >= EPSILON {
        return None;
    }

    let normal_sq = normal_len * normal_len;
    let t = w.cross(&d2).dot(&normal) / normal_sq;
    let u = w.cross(&d1).dot(&normal) / normal_sq;

    if segment {
        let tol1 = param_tolerance(d1);
        let tol2 = param_tolerance(d2);
        if t < -tol1 || t > 1.0 + tol1 || u < -tol2 || u > 1.0 + tol2 {
            return None;
        }
    }
    let point = l1.point_at(t);
    if !points_equal(point, l2.point_at(u)) {
        return None;
    }
    Some(point)
}

/// The pair of points `(p1, p2)`, `p1` on `l1` and `p2` on `l2`, that
/// minimizes their distance.
///
/// `l1` is shifted along the common normal by the inter-line distance until
/// it meets `l2`; the meeting point is then projected back onto `l1`.
/// Returns `None` for parallel segments or (when `segment` is set) when the
/// closest pair falls outside either segment.
pub fn closest_points(l1: &Segment, l2: &Segment, segment: bool) -> Option<(Vec3, Vec3)> {
    let normal = try_unit(l1.direction().cross(&l2.direction()))?;
    let offset = normal * (l2.start - l1.start).dot(&normal);
    let shifted = Segment::new(l1.start + offset, l1.end + offset);
    let on_l2 = segment_intersection(&shifted, l2, false)?;
    let on_l1 = on_l2 - offset;
    if segment && !(between_points(l1.start, l1.end, on_l1) && between_points(l2.start, l2.end, on_l2))
    {
        return None;
    }
    Some((on_l1, on_l2))
}

/// Intersections of a segment (or its infinite line) with a sphere.
///
/// Returns zero, one (tangent), or two points, ordered along the segment.
/// A zero-length segment never intersects.
pub fn sphere_intersection(seg: &Segment, center: Vec3, radius: f64, segment: bool) -> Vec<Vec3> {
    let d = seg.direction();
    let f = seg.start - center;
    let a = d.dot(&d);
    if a < EPSILON * EPSILON {
        return Vec::new();
    }
    let b = 2.0 * f.dot(&d);
    let c = f.dot(&f) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;

    let ts: Vec<f64> = if discriminant < -EPSILON {
        Vec::new()
    } else if discriminant.abs() <= EPSILON {
        vec![-b / (2.0 * a)]
    } else {
        let root = discriminant.sqrt();
        vec![(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)]
    };

    let tol = param_tolerance(d);
    ts.into_iter()
        .filter(|&t| !segment || (t >= -tol && t <= 1.0 + tol))
        .map(|t| seg.point_at(if segment { t.clamp(0.0, 1.0) } else { t }))
        .collect()
}

/// Closest point on a segment to `p`.
pub fn closest_point_on_segment(seg: &Segment, p: Vec3) -> Vec3 {
    let d = seg.direction();
    let len_sq = d.norm_squared();
    if len_sq < EPSILON * EPSILON {
        return seg.start;
    }
    let t = ((p - seg.start).dot(&d) / len_sq).clamp(0.0, 1.0);
    seg.point_at(t)
}

pub fn distance_to_segment(seg: &Segment, p: Vec3) -> f64 {
    distance(closest_point_on_segment(seg, p), p)
}

/// Unit direction from spherical angles measured against "up": `polar` is
/// the angle from vertical, `azimuth` the rotation about it from +x.
pub fn direction_from_angles(polar: f64, azimuth: f64) -> Vec3 {
    Vec3::new(
        polar.sin() * azimuth.cos(),
        polar.sin() * azimuth.sin(),
        polar.cos(),
    )
}

/// Rotate `direction` (expressed relative to "up") into the frame whose
/// up is `axis`, using Rodrigues' rotation about `up × axis`.
///
/// `axis` must be non-zero.
pub fn rotate_to_axis(direction: Vec3, axis: Vec3) -> Vec3 {
    let target = unit(axis);
    let up = up();
    let cos = up.dot(&target).clamp(-1.0, 1.0);
    let rotation_axis = up.cross(&target);
    if rotation_axis.norm() < EPSILON {
        return if cos > 0.0 {
            direction
        } else {
            // Antiparallel: half-turn about x.
            Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI) * direction
        };
    }
    let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(rotation_axis), cos.acos());
    rotation * direction
}

/// Remove the component of `v` along `normal`.
pub fn project_onto_plane(v: Vec3, normal: Vec3) -> Vec3 {
    match try_unit(normal) {
        Some(n) => v - n * v.dot(&n),
        None => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn v(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, y, z)
    }

    fn seg(a: (f64, f64, f64), b: (f64, f64, f64)) -> Segment {
        Segment::new(v(a.0, a.1, a.2), v(b.0, b.1, b.2))
    }

    #[test]
    fn compare_uses_tolerance() {
        assert!(compare(1.0, 1.0 + EPSILON / 2.0));
        assert!(!compare(1.0, 1.0 + EPSILON * 2.0));
    }

    #[test]
    #[should_panic(expected = "zero-length")]
    fn unit_of_zero_vector_panics() {
        unit(Vec3::zeros());
    }

    #[test]
    fn crossing_segments_intersect() {
        let a = seg((0.0, 0.0, 0.0), (0.0, 0.0, 10.0));
        let b = seg((0.0, -5.0, 5.0), (0.0, 5.0, 5.0));
        let p = segment_intersection(&a, &b, true).unwrap();
        assert!(points_equal(p, v(0.0, 0.0, 5.0)), "got {p:?}");
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        let a = seg((0.0, 0.0, 0.0), (0.0, 0.0, 10.0));
        let b = seg((1.0, 0.0, 0.0), (1.0, 0.0, 10.0));
        assert_eq!(segment_intersection(&a, &b, true), None);
        assert_eq!(segment_intersection(&a, &b, false), None);
    }

    #[test]
    fn skew_segments_do_not_intersect() {
        let a = seg((0.0, 0.0, 0.0), (10.0, 0.0, 0.0));
        let b = seg((5.0, -5.0, 1.0), (5.0, 5.0, 1.0));
        assert_eq!(segment_intersection(&a, &b, false), None);
    }

    #[test]
    fn intersection_outside_segment_bounds_needs_infinite_lines() {
        let a = seg((0.0, 0.0, 0.0), (0.0, 0.0, 4.0));
        let b = seg((0.0, -5.0, 5.0), (0.0, 5.0, 5.0));
        assert_eq!(segment_intersection(&a, &b, true), None);
        let p = segment_intersection(&a, &b, false).unwrap();
        assert!(points_equal(p, v(0.0, 0.0, 5.0)));
    }

    #[test]
    fn shared_endpoint_is_returned_even_when_collinear() {
        let a = seg((0.0, 0.0, 0.0), (0.0, 0.0, 5.0));
        let b = seg((0.0, 0.0, 5.0), (0.0, 0.0, 10.0));
        let p = segment_intersection(&a, &b, true).unwrap();
        assert!(points_equal(p, v(0.0, 0.0, 5.0)));
    }

    #[test]
    fn touching_at_interior_point_intersects() {
        // b starts on a's interior.
        let a = seg((0.0, 0.0, 0.0), (0.0, 0.0, 10.0));
        let b = seg((0.0, 0.0, 4.0), (3.0, 0.0, 8.0));
        let p = segment_intersection(&a, &b, true).unwrap();
        assert!(points_equal(p, v(0.0, 0.0, 4.0)));
    }

    #[test]
    fn near_miss_skew_segments_agree_in_either_order() {
        for (offset, meets) in [(1e-3, false), (1e-5, true)] {
            let a = seg((-45.0, 0.0, 10.0), (45.0, 0.0, 10.0));
            let b = seg((40.0, -5.0, 10.0 + offset), (40.0, 5.0, 10.0 + offset));
            let ab = segment_intersection(&a, &b, true);
            let ba = segment_intersection(&b, &a, true);
            assert_eq!(ab.is_some(), meets, "offset {offset}: {ab:?}");
            assert_eq!(ba.is_some(), meets, "offset {offset}: {ba:?}");
            if let (Some(p), Some(q)) = (ab, ba) {
                assert!(points_equal(p, q), "{p:?} vs {q:?}");
                assert!(points_equal(p, v(40.0, 0.0, 10.0)));
            }
        }
    }

    #[test]
    fn long_skew_segments_never_meet_off_either_line() {
        let long = seg((-48.0, -48.0, 2.0), (48.0, 48.0, 90.0));
        for offset in [1e-3, 1e-5] {
            for x in [-40.0, -7.5, 0.0, 21.0, 44.0] {
                let z = 2.0 + (x + 48.0) * 88.0 / 96.0 + offset;
                let cross = seg((x - 3.0, x + 3.0, z), (x + 3.0, x - 3.0, z));
                let ab = segment_intersection(&long, &cross, true);
                let ba = segment_intersection(&cross, &long, true);
                assert_eq!(ab.is_some(), ba.is_some(), "x {x}, offset {offset}");
                for p in ab.into_iter().chain(ba) {
                    assert!(on_line(long.start, long.end, p, true), "{p:?} off long");
                    assert!(on_line(cross.start, cross.end, p, true), "{p:?} off cross");
                }
            }
        }
    }

    #[test]
    fn closest_points_between_skew_segments() {
        let a = seg((0.0, 0.0, 0.0), (10.0, 0.0, 0.0));
        let b = seg((5.0, -5.0, 2.0), (5.0, 5.0, 2.0));
        let (p, q) = closest_points(&a, &b, true).unwrap();
        assert!(points_equal(p, v(5.0, 0.0, 0.0)), "p = {p:?}");
        assert!(points_equal(q, v(5.0, 0.0, 2.0)), "q = {q:?}");
    }

    #[test]
    fn closest_points_none_for_parallel_or_out_of_range() {
        let a = seg((0.0, 0.0, 0.0), (10.0, 0.0, 0.0));
        let b = seg((0.0, 1.0, 0.0), (10.0, 1.0, 0.0));
        assert_eq!(closest_points(&a, &b, true), None);
        let c = seg((20.0, -5.0, 2.0), (20.0, 5.0, 2.0));
        assert_eq!(closest_points(&a, &c, true), None);
        assert!(closest_points(&a, &c, false).is_some());
    }

    #[test]
    fn sphere_intersection_counts() {
        let s = seg((-10.0, 0.0, 0.0), (10.0, 0.0, 0.0));
        let two = sphere_intersection(&s, Vec3::zeros(), 5.0, true);
        assert_eq!(two.len(), 2);
        assert!(points_equal(two[0], v(-5.0, 0.0, 0.0)));
        assert!(points_equal(two[1], v(5.0, 0.0, 0.0)));

        let tangent = seg((-10.0, 5.0, 0.0), (10.0, 5.0, 0.0));
        assert_eq!(sphere_intersection(&tangent, Vec3::zeros(), 5.0, true).len(), 1);

        let miss = seg((-10.0, 6.0, 0.0), (10.0, 6.0, 0.0));
        assert!(sphere_intersection(&miss, Vec3::zeros(), 5.0, true).is_empty());
    }

    #[test]
    fn sphere_intersection_respects_segment_bounds() {
        let s = seg((0.0, 0.0, 0.0), (3.0, 0.0, 0.0));
        assert!(sphere_intersection(&s, Vec3::zeros(), 5.0, true).is_empty());
        assert_eq!(sphere_intersection(&s, Vec3::zeros(), 5.0, false).len(), 2);
    }

    #[test]
    fn on_line_midpoint_and_offset() {
        let a = v(0.0, 0.0, 0.0);
        let b = v(0.0, 0.0, 10.0);
        assert!(on_line(a, b, midpoint(a, b), true));
        assert!(!on_line(a, b, v(EPSILON * 5.0, 0.0, 5.0), true));
        assert!(!on_line(a, b, v(0.0, 0.0, 12.0), true));
        assert!(on_line(a, b, v(0.0, 0.0, 12.0), false));
    }

    #[test]
    fn within_box_inclusive() {
        let origin = v(-50.0, -50.0, 0.0);
        let size = v(100.0, 100.0, 100.0);
        assert!(within(origin, size, v(0.0, 0.0, 0.0)));
        assert!(within(origin, size, v(50.0, 50.0, 100.0)));
        assert!(!within(origin, size, v(0.0, 0.0, -1.0)));
    }

    #[test]
    fn parallel_and_same_direction() {
        assert!(parallel(v(0.0, 0.0, 1.0), v(0.0, 0.0, -3.0)));
        assert!(!same_direction(v(0.0, 0.0, 1.0), v(0.0, 0.0, -3.0)));
        assert!(same_direction(v(1.0, 1.0, 0.0), v(2.0, 2.0, 0.0)));
        assert!(!parallel(Vec3::zeros(), v(1.0, 0.0, 0.0)));
    }

    #[test]
    fn rotate_to_axis_maps_up_onto_axis() {
        let axis = v(1.0, 0.0, 1.0);
        let rotated = rotate_to_axis(up(), axis);
        assert!(points_equal(rotated, unit(axis)), "got {rotated:?}");
    }

    #[test]
    fn rotate_to_axis_preserves_relative_angle() {
        let axis = v(0.0, 1.0, 0.0);
        let relative = direction_from_angles(FRAC_PI_4, 0.0);
        let rotated = rotate_to_axis(relative, axis);
        let angle = angle_between(rotated, axis).unwrap();
        assert!(compare(angle, FRAC_PI_4), "angle {angle}");
    }

    #[test]
    fn rotate_to_axis_identity_and_flip() {
        let d = direction_from_angles(0.3, 1.0);
        assert!(points_equal(rotate_to_axis(d, up()), d));
        let flipped = rotate_to_axis(up(), v(0.0, 0.0, -2.0));
        assert!(points_equal(flipped, v(0.0, 0.0, -1.0)));
    }

    #[test]
    fn direction_from_angles_is_unit() {
        let d = direction_from_angles(FRAC_PI_2, FRAC_PI_2);
        assert!(points_equal(d, v(0.0, 1.0, 0.0)));
    }

    #[test]
    fn closest_point_on_segment_clamps() {
        let s = seg((0.0, 0.0, 0.0), (0.0, 0.0, 10.0));
        assert!(points_equal(closest_point_on_segment(&s, v(3.0, 0.0, 5.0)), v(0.0, 0.0, 5.0)));
        assert!(points_equal(closest_point_on_segment(&s, v(0.0, 0.0, -4.0)), Vec3::zeros()));
        assert!(compare(distance_to_segment(&s, v(3.0, 4.0, 5.0)), 5.0));
    }

    #[test]
    fn project_onto_plane_removes_normal_component() {
        let p = project_onto_plane(v(1.0, 2.0, 3.0), v(0.0, 0.0, 5.0));
        assert!(points_equal(p, v(1.0, 2.0, 0.0)));
    }
}
