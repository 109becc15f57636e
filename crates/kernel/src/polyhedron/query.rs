//! Read-only geometric queries: lookups, containment, intersection and
//! ray picking.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::Polyhedron;
use crate::geometry::plane::{Plane, PointStatus};
use crate::geometry::point::Point3d;
use crate::geometry::ray::Ray;
use crate::topology::mesh::{EdgeId, SideId, VertexId};

/// Nearest front-facing side hit by a ray.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    pub distance: f64,
    pub side: SideId,
}

/// Where a set of points lies relative to a plane, taken as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetStatus {
    /// Some points above, none below.
    Above,
    /// No points above.
    Below,
    Straddling,
}

impl Polyhedron {
    // ─── Lookups ─────────────────────────────────────────────────────────────

    pub fn has_vertex(&self, position: &Point3d, epsilon: f64) -> bool {
        self.find_vertex_at(position, epsilon).is_some()
    }

    /// An edge between `a` and `b`, in either direction.
    pub fn has_edge(&self, a: &Point3d, b: &Point3d, epsilon: f64) -> bool {
        self.find_edge_at(a, b, epsilon).is_some()
    }

    /// A side whose loop matches `points` up to rotation, walked in either
    /// direction.
    pub fn has_face(&self, points: &[Point3d], epsilon: f64) -> bool {
        self.find_side_at(points, epsilon).is_some()
    }

    pub(crate) fn find_vertex_at(&self, position: &Point3d, epsilon: f64) -> Option<VertexId> {
        self.mesh
            .vertices
            .iter()
            .find(|(_, v)| v.position.almost_eq(position, epsilon))
            .map(|(id, _)| id)
    }

    pub(crate) fn find_edge_at(&self, a: &Point3d, b: &Point3d, epsilon: f64) -> Option<EdgeId> {
        self.mesh
            .edges
            .iter()
            .find(|(_, e)| {
                let (s, t) = (self.mesh.position(e.start), self.mesh.position(e.end));
                (s.almost_eq(a, epsilon) && t.almost_eq(b, epsilon)) || (s.almost_eq(b, epsilon) && t.almost_eq(a, epsilon))
            })
            .map(|(id, _)| id)
    }

    pub(crate) fn find_side_at(&self, points: &[Point3d], epsilon: f64) -> Option<SideId> {
        self.mesh
            .side_ids()
            .into_iter()
            .find(|&side| loops_match(&self.mesh.side_positions(side), points, epsilon))
    }

    // ─── Containment ─────────────────────────────────────────────────────────

    /// Whether `point` lies inside or on the boundary of the solid. Always
    /// false for lower-dimensional states.
    pub fn contains_point(&self, point: &Point3d) -> bool {
        if !self.is_polyhedron() {
            return false;
        }
        let eps = self.tolerance.point_status;
        if !self.bounds.expanded(eps).contains_point(point) {
            return false;
        }
        self.mesh
            .sides
            .values()
            .all(|s| s.plane.point_status(point, eps) != PointStatus::Above)
    }

    /// Whether every vertex of `other` is contained in `self`.
    pub fn contains(&self, other: &Polyhedron) -> bool {
        if !self.is_polyhedron() || other.is_empty() {
            return false;
        }
        if !self.bounds.expanded(self.tolerance.point_status).contains(&other.bounds) {
            return false;
        }
        other.mesh.vertices.values().all(|v| self.contains_point(&v.position))
    }

    // ─── Intersection ────────────────────────────────────────────────────────

    /// Whether the two shapes share interior points. Solids that only touch
    /// along a face, edge or vertex do not intersect.
    pub fn intersects(&self, other: &Polyhedron) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if !self.bounds.expanded(self.tolerance.almost_zero).intersects(&other.bounds) {
            return false;
        }
        let result = match (self.is_polyhedron(), other.is_polyhedron()) {
            (true, true) => self.solid_intersects_solid(other),
            (true, false) => other.degenerate_intersects_solid(self),
            (false, true) => self.degenerate_intersects_solid(other),
            (false, false) => self.degenerate_intersects_degenerate(other),
        };
        trace!(result, "intersection test");
        result
    }

    /// Separating axis test over face normals and edge pair cross products.
    fn solid_intersects_solid(&self, other: &Polyhedron) -> bool {
        let eps = self.tolerance.point_status;
        let mine = self.vertices();
        let theirs = other.vertices();
        let separated_by_faces = |faces: &Polyhedron, points: &[Point3d]| {
            faces
                .mesh
                .sides
                .values()
                .any(|s| set_status(&s.plane, points, eps) == SetStatus::Above)
        };
        if separated_by_faces(self, &theirs) || separated_by_faces(other, &mine) {
            return false;
        }

        for (a0, a1) in self.edges() {
            for (b0, b1) in other.edges() {
                let axis = (a1 - a0).cross(&(b1 - b0));
                let Some(plane) = Plane::from_normal_and_point(axis, &a0) else {
                    continue;
                };
                let lhs = set_status(&plane, &mine, eps);
                let rhs = set_status(&plane, &theirs, eps);
                if lhs != SetStatus::Straddling && rhs != SetStatus::Straddling && lhs != rhs {
                    return false;
                }
            }
        }
        true
    }

    /// Point, edge or polygon against a solid.
    fn degenerate_intersects_solid(&self, solid: &Polyhedron) -> bool {
        if self.mesh.vertices.values().any(|v| solid.contains_point(&v.position)) {
            return true;
        }
        let ps = self.tolerance.point_status;
        let faces: Vec<(Vec<Point3d>, Plane)> = solid
            .mesh
            .sides
            .iter()
            .map(|(id, s)| (solid.mesh.side_positions(id), s.plane))
            .collect();
        let my_edges = self.edges();
        let edge_hits_solid = my_edges
            .iter()
            .any(|(a, b)| faces.iter().any(|(ring, plane)| segment_crosses_polygon(a, b, ring, plane, ps)));
        if edge_hits_solid {
            return true;
        }
        // Edges of the solid piercing the polygon.
        match self.front_loop() {
            Some((ring, plane)) if self.is_polygon() => solid
                .edges()
                .iter()
                .any(|(a, b)| segment_crosses_polygon(a, b, &ring, &plane, ps)),
            _ => false,
        }
    }

    fn degenerate_intersects_degenerate(&self, other: &Polyhedron) -> bool {
        let eps = self.tolerance.almost_zero;
        let ps = self.tolerance.point_status;
        match (self.is_polygon(), other.is_polygon()) {
            (true, true) => {
                let (Some((r1, p1)), Some((r2, p2))) = (self.front_loop(), other.front_loop()) else {
                    return false;
                };
                polygons_intersect(&r1, &p1, &r2, &p2, ps, eps)
            }
            (true, false) => other.simple_intersects_polygon(self),
            (false, true) => self.simple_intersects_polygon(other),
            (false, false) => {
                let mine = self.as_segment();
                let theirs = other.as_segment();
                let (Some((a0, a1)), Some((b0, b1))) = (mine, theirs) else {
                    return false;
                };
                segment_distance(&a0, &a1, &b0, &b1) <= eps
            }
        }
    }

    /// Point or edge against a polygon.
    fn simple_intersects_polygon(&self, polygon: &Polyhedron) -> bool {
        let Some((ring, plane)) = polygon.front_loop() else {
            return false;
        };
        let ps = self.tolerance.point_status;
        match self.as_segment() {
            Some((a, b)) if !a.almost_eq(&b, self.tolerance.almost_zero) => {
                segment_crosses_polygon(&a, &b, &ring, &plane, ps)
            }
            Some((a, _)) => plane.point_status(&a, ps) == PointStatus::Inside && polygon_contains(&a, &ring, &plane, ps),
            None => false,
        }
    }

    /// The single point or edge of a degenerate state as a segment.
    fn as_segment(&self) -> Option<(Point3d, Point3d)> {
        if self.is_point() {
            let p = self.mesh.vertices.values().next()?.position;
            Some((p, p))
        } else if self.is_edge() {
            self.edges().into_iter().next()
        } else {
            None
        }
    }

    fn front_loop(&self) -> Option<(Vec<Point3d>, Plane)> {
        let (id, side) = self.mesh.sides.iter().next()?;
        Some((self.mesh.side_positions(id), side.plane))
    }

    // ─── Picking ─────────────────────────────────────────────────────────────

    /// Nearest side whose front faces the ray.
    pub fn intersect_with_ray(&self, ray: &Ray) -> Option<RayHit> {
        let ps = self.tolerance.point_status;
        self.mesh
            .sides
            .iter()
            .filter(|(_, s)| s.plane.normal.dot(&ray.direction) < 0.0)
            .filter_map(|(id, s)| {
                let distance = ray.intersect_plane(&s.plane)?;
                if distance < 0.0 {
                    return None;
                }
                let hit = ray.point_at(distance);
                polygon_contains(&hit, &self.mesh.side_positions(id), &s.plane, ps)
                    .then_some(RayHit { distance, side: id })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn loops_match(ring: &[Point3d], points: &[Point3d], epsilon: f64) -> bool {
    let n = ring.len();
    if n != points.len() || n == 0 {
        return false;
    }
    (0..n)
        .filter(|&j| ring[j].almost_eq(&points[0], epsilon))
        .any(|j| {
            let forward = (0..n).all(|k| ring[(j + k) % n].almost_eq(&points[k], epsilon));
            let backward = (0..n).all(|k| ring[(j + n - k) % n].almost_eq(&points[k], epsilon));
            forward || backward
        })
}

fn set_status(plane: &Plane, points: &[Point3d], epsilon: f64) -> SetStatus {
    let mut above = false;
    let mut below = false;
    for p in points {
        match plane.point_status(p, epsilon) {
            PointStatus::Above => above = true,
            PointStatus::Below => below = true,
            PointStatus::Inside => {}
        }
        if above && below {
            return SetStatus::Straddling;
        }
    }
    if above { SetStatus::Above } else { SetStatus::Below }
}

/// Whether `point`, assumed to lie in the polygon's plane, is inside or on
/// the boundary of a clockwise loop.
fn polygon_contains(point: &Point3d, ring: &[Point3d], plane: &Plane, epsilon: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    (0..n).all(|i| {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let edge = b - a;
        let len = edge.length();
        len <= f64::EPSILON || edge.cross(&(*point - a)).dot(&plane.normal) <= epsilon * len
    })
}

fn segment_crosses_polygon(a: &Point3d, b: &Point3d, ring: &[Point3d], plane: &Plane, epsilon: f64) -> bool {
    let (da, db) = (plane.signed_distance(a), plane.signed_distance(b));
    if da.abs() <= epsilon && db.abs() <= epsilon {
        if polygon_contains(a, ring, plane, epsilon) || polygon_contains(b, ring, plane, epsilon) {
            return true;
        }
        let n = ring.len();
        return (0..n).any(|i| segment_distance(a, b, &ring[i], &ring[(i + 1) % n]) <= epsilon);
    }
    if (da > epsilon && db > epsilon) || (da < -epsilon && db < -epsilon) {
        return false;
    }
    let t = if (da - db).abs() <= f64::EPSILON { 0.0 } else { da / (da - db) };
    polygon_contains(&a.lerp(b, t.clamp(0.0, 1.0)), ring, plane, epsilon)
}

fn polygons_intersect(r1: &[Point3d], p1: &Plane, r2: &[Point3d], p2: &Plane, ps: f64, eps: f64) -> bool {
    let edges_hit = |ring: &[Point3d], other: &[Point3d], plane: &Plane| {
        let n = ring.len();
        (0..n).any(|i| segment_crosses_polygon(&ring[i], &ring[(i + 1) % n], other, plane, ps))
    };
    if edges_hit(r1, r2, p2) || edges_hit(r2, r1, p1) {
        return true;
    }
    let inside = |p: &Point3d, ring: &[Point3d], plane: &Plane| {
        plane.signed_distance(p).abs() <= eps && polygon_contains(p, ring, plane, ps)
    };
    r1.first().is_some_and(|p| inside(p, r2, p2)) || r2.first().is_some_and(|p| inside(p, r1, p1))
}

/// Closest distance between segments `p0-p1` and `q0-q1`.
fn segment_distance(p0: &Point3d, p1: &Point3d, q0: &Point3d, q1: &Point3d) -> f64 {
    let d1 = *p1 - *p0;
    let d2 = *q1 - *q0;
    let r = *p0 - *q0;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(&r);
    let tiny = f64::EPSILON;

    let (s, t) = if a <= tiny && e <= tiny {
        (0.0, 0.0)
    } else if a <= tiny {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= tiny {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let mut s = if denom > tiny { ((b * f - c * e) / denom).clamp(0.0, 1.0) } else { 0.0 };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    p0.lerp(p1, s).distance_to(&q0.lerp(q1, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    use crate::geometry::transform::{BoundingBox, Rotation, Transform};
    use crate::geometry::vector::Vec3;
    use crate::polyhedron::tests::cube;

    fn boxed(min: [f64; 3], max: [f64; 3]) -> Polyhedron {
        Polyhedron::from_bounding_box(&BoundingBox::new(Point3d::from_array(min), Point3d::from_array(max)))
    }

    #[test]
    fn test_lookups() {
        let poly = cube(8.0);
        assert!(poly.has_vertex(&Point3d::new(8.0, -8.0, 8.0), 1e-9));
        assert!(!poly.has_vertex(&Point3d::new(8.0, 0.0, 8.0), 1e-9));
        assert!(poly.has_edge(&Point3d::new(8.0, 8.0, 8.0), &Point3d::new(8.0, -8.0, 8.0), 1e-9));
        assert!(poly.has_edge(&Point3d::new(8.0, -8.0, 8.0), &Point3d::new(8.0, 8.0, 8.0), 1e-9));
        assert!(!poly.has_edge(&Point3d::new(8.0, 8.0, 8.0), &Point3d::new(-8.0, -8.0, 8.0), 1e-9));

        let top = [
            Point3d::new(-8.0, -8.0, 8.0),
            Point3d::new(-8.0, 8.0, 8.0),
            Point3d::new(8.0, 8.0, 8.0),
            Point3d::new(8.0, -8.0, 8.0),
        ];
        assert!(poly.has_face(&top, 1e-9));
        let mut reversed = top;
        reversed.reverse();
        assert!(poly.has_face(&reversed, 1e-9));
        assert!(!poly.has_face(&top[..3], 1e-9));
    }

    #[test]
    fn test_contains_point() {
        let poly = cube(8.0);
        assert!(poly.contains_point(&Point3d::ORIGIN));
        assert!(poly.contains_point(&Point3d::new(8.0, 8.0, 8.0)));
        assert!(!poly.contains_point(&Point3d::new(8.5, 0.0, 0.0)));
        assert!(!Polyhedron::from_points(&[Point3d::ORIGIN]).contains_point(&Point3d::ORIGIN));
    }

    #[test]
    fn test_contains() {
        let big = cube(8.0);
        let small = cube(2.0);
        assert!(big.contains(&small));
        assert!(big.contains(&big.clone()));
        assert!(!small.contains(&big));
    }

    #[test]
    fn test_solid_intersections() {
        let a = boxed([0.0; 3], [4.0; 3]);
        assert!(a.intersects(&boxed([2.0; 3], [6.0; 3])));
        assert!(a.intersects(&boxed([1.0; 3], [2.0; 3])));
        // Touching along a face, an edge or a corner.
        assert!(!a.intersects(&boxed([4.0, 0.0, 0.0], [8.0, 4.0, 4.0])));
        assert!(!a.intersects(&boxed([4.0, 4.0, 0.0], [8.0, 8.0, 4.0])));
        assert!(!a.intersects(&boxed([4.0; 3], [8.0; 3])));
        assert!(!a.intersects(&boxed([10.0; 3], [12.0; 3])));
    }

    #[test]
    fn test_edge_axis_separates_skew_solids() {
        // Two wedges whose ridges cross with a gap of 0.5. Tilted so the
        // bounding boxes overlap; no face plane separates them, only the
        // cross product of the two ridges does.
        let tilt = Transform::rotation_about(
            &Rotation::from_axis_angle(&nalgebra::Vector3::x_axis(), FRAC_PI_4),
            &Point3d::ORIGIN,
        );
        let wedge = |points: [[f64; 3]; 4]| {
            let tilted: Vec<Point3d> = points
                .iter()
                .map(|&p| tilt.transform_point(&Point3d::from_array(p)))
                .collect();
            Polyhedron::from_points(&tilted)
        };
        let a = wedge([[-2.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, -2.0], [0.0, -2.0, -2.0]]);
        let b = wedge([[0.0, -2.0, 0.5], [0.0, 2.0, 0.5], [2.0, 0.0, 2.5], [-2.0, 0.0, 2.5]]);
        assert!(a.is_polyhedron() && b.is_polyhedron());
        assert!(a.bounds().intersects(&b.bounds()));
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));

        let c = wedge([[0.0, -2.0, -0.5], [0.0, 2.0, -0.5], [2.0, 0.0, 1.5], [-2.0, 0.0, 1.5]]);
        assert!(a.intersects(&c));
    }

    #[test]
    fn test_degenerate_intersections() {
        let solid = cube(4.0);
        let through = Polyhedron::from_points(&[Point3d::new(-8.0, 0.0, 0.0), Point3d::new(8.0, 0.0, 0.0)]);
        assert!(through.is_edge());
        assert!(solid.intersects(&through));
        assert!(through.intersects(&solid));

        let beside = Polyhedron::from_points(&[Point3d::new(-8.0, 6.0, 0.0), Point3d::new(8.0, 6.0, 0.0)]);
        assert!(!solid.intersects(&beside));

        let inside = Polyhedron::from_points(&[Point3d::new(1.0, 1.0, 1.0)]);
        assert!(solid.intersects(&inside));

        let sheet = Polyhedron::from_points(&[
            Point3d::new(-8.0, -8.0, 0.0),
            Point3d::new(8.0, -8.0, 0.0),
            Point3d::new(8.0, 8.0, 0.0),
            Point3d::new(-8.0, 8.0, 0.0),
        ]);
        assert!(sheet.is_polygon());
        assert!(sheet.intersects(&solid));
        assert!(!sheet.intersects(&inside));

        let cross = Polyhedron::from_points(&[Point3d::new(0.0, 0.0, -2.0), Point3d::new(0.0, 0.0, 2.0)]);
        assert!(sheet.intersects(&cross));
        let apart = Polyhedron::from_points(&[Point3d::new(0.0, 0.0, 1.0), Point3d::new(0.0, 0.0, 2.0)]);
        assert!(!sheet.intersects(&apart));

        let a = Polyhedron::from_points(&[Point3d::new(-1.0, 0.0, 0.0), Point3d::new(1.0, 0.0, 0.0)]);
        let b = Polyhedron::from_points(&[Point3d::new(0.0, -1.0, 0.0), Point3d::new(0.0, 1.0, 0.0)]);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_ray_picking() {
        let poly = cube(8.0);
        let down = Ray::new(Point3d::new(1.0, 2.0, 20.0), -Vec3::Z).unwrap();
        let hit = poly.intersect_with_ray(&down).unwrap();
        assert!((hit.distance - 12.0).abs() < 1e-12);
        assert_eq!(poly.side_plane(hit.side).unwrap().normal, Vec3::Z);

        let away = Ray::new(Point3d::new(0.0, 0.0, 20.0), Vec3::Z).unwrap();
        assert!(poly.intersect_with_ray(&away).is_none());
        let miss = Ray::new(Point3d::new(20.0, 0.0, 20.0), -Vec3::Z).unwrap();
        assert!(poly.intersect_with_ray(&miss).is_none());
    }
}
