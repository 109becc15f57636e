//! Incremental convex hull.

use std::collections::HashSet;

use tracing::{debug, instrument, trace};

use super::Polyhedron;
use crate::geometry::plane::{Plane, PointStatus};
use crate::geometry::point::{Point2d, Point3d};
use crate::geometry::transform::Axis;
use crate::topology::mesh::{EdgeId, FaceUid, SideId, VertexId};

impl Polyhedron {
    /// Convex hull of `points`, inserted one at a time.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3d>) -> Self {
        let mut poly = Self::new();
        poly.add_points(points);
        poly
    }

    pub fn add_points<'a>(&mut self, points: impl IntoIterator<Item = &'a Point3d>) {
        for p in points {
            self.add_point(*p);
        }
    }

    /// Grows the hull to include `point`. Returns the new vertex, or `None`
    /// if the point was already covered and the hull is unchanged.
    #[instrument(skip(self), fields(vertices = self.mesh.vertices.len()))]
    pub fn add_point(&mut self, point: Point3d) -> Option<VertexId> {
        let added = match self.mesh.sides.len() {
            0 => match self.mesh.vertices.len() {
                0 => Some(self.mesh.add_vertex(point)),
                1 => self.add_point_to_point(point),
                _ => self.add_point_to_edge(point),
            },
            2 => self.add_point_to_polygon(point),
            _ => self.add_point_to_polyhedron(point),
        };
        if added.is_some() {
            self.update_bounds();
            self.debug_check();
        } else {
            trace!("point already covered by hull");
        }
        added
    }

    fn add_point_to_point(&mut self, point: Point3d) -> Option<VertexId> {
        let existing = self.mesh.vertex_ids()[0];
        if self.tolerance.points_coincident(&self.mesh.position(existing), &point) {
            return None;
        }
        let v = self.mesh.add_vertex(point);
        self.mesh.add_edge(existing, v);
        Some(v)
    }

    fn add_point_to_edge(&mut self, point: Point3d) -> Option<VertexId> {
        let edge_id = self.mesh.edge_ids()[0];
        let (a, b) = {
            let e = &self.mesh.edges[edge_id];
            (e.start, e.end)
        };
        let pa = self.mesh.position(a);
        let pb = self.mesh.position(b);
        if self.tolerance.points_coincident(&pa, &point) || self.tolerance.points_coincident(&pb, &point) {
            return None;
        }

        let axis = pb - pa;
        let length = axis.length();
        let offset = point - pa;
        let off_line = offset.cross(&axis).length() / length;
        if off_line <= self.tolerance.point_status {
            // Collinear: keep the two extreme points.
            let t = offset.dot(&axis) / (length * length);
            return if t < 0.0 {
                self.mesh.vertices[a].position = point;
                Some(a)
            } else if t > 1.0 {
                self.mesh.vertices[b].position = point;
                Some(b)
            } else {
                None
            };
        }

        let plane = Plane::from_points(&pa, &pb, &point)?;
        let c = self.mesh.add_vertex(point);
        self.mesh.link_side(&[a, b, c], plane, None);
        self.mesh.link_side(&[c, b, a], plane.flipped(), None);
        debug!("edge grew into triangle");
        Some(c)
    }

    fn add_point_to_polygon(&mut self, point: Point3d) -> Option<VertexId> {
        let sides = self.mesh.side_ids();
        let front = sides[0];
        let plane = self.mesh.sides[front].plane;
        if plane.point_status(&point, self.tolerance.point_status) != PointStatus::Inside {
            return self.add_point_to_polyhedron(point);
        }
        if self
            .mesh
            .vertices
            .values()
            .any(|v| self.tolerance.points_coincident(&v.position, &point))
        {
            return None;
        }

        // Coplanar: rebuild the polygon from the planar hull.
        let mut points: Vec<Point3d> = self.mesh.side_positions(front);
        points.push(point);
        let hull = planar_hull(&points, plane.normal.dominant_axis(), self.tolerance.almost_zero);
        if !hull.contains(&(points.len() - 1)) {
            return None;
        }
        let mut ring: Vec<Point3d> = hull.iter().map(|&i| points[i]).collect();
        let oriented = Plane::from_loop(&ring)?;
        if oriented.normal.dot(&plane.normal) < 0.0 {
            ring.reverse();
        }
        let faces: Vec<Option<FaceUid>> = sides.iter().map(|&s| self.mesh.sides[s].face).collect();

        self.mesh.clear();
        let ids: Vec<VertexId> = ring.iter().map(|p| self.mesh.add_vertex(*p)).collect();
        let reversed: Vec<VertexId> = ids.iter().rev().copied().collect();
        self.mesh.link_side(&ids, plane, faces[0]);
        self.mesh.link_side(&reversed, plane.flipped(), faces[1]);
        let added = ring
            .iter()
            .position(|p| p.almost_eq(&point, 0.0))
            .map(|i| ids[i]);
        debug!(vertices = ids.len(), "polygon grew in plane");
        added
    }

    fn add_point_to_polyhedron(&mut self, point: Point3d) -> Option<VertexId> {
        let v = self.weave(point)?;
        self.merge_sides();
        self.merge_edges();
        self.mesh.vertices.contains_key(v).then_some(v)
    }

    /// Drops every side `point` can see and connects the seam around the
    /// hole to `point` with triangles.
    fn weave(&mut self, point: Point3d) -> Option<VertexId> {
        let eps = self.tolerance.point_status;
        let visible: HashSet<SideId> = self
            .mesh
            .sides
            .iter()
            .filter(|(_, s)| s.plane.point_status(&point, eps) == PointStatus::Above)
            .map(|(id, _)| id)
            .collect();
        if visible.is_empty() {
            return None;
        }

        // Seam edges as walked by the side that stays.
        let mut seam: Vec<(VertexId, VertexId, Plane)> = Vec::new();
        let mut doomed: Vec<EdgeId> = Vec::new();
        for (id, e) in &self.mesh.edges {
            let (Some(l), Some(r)) = (e.left, e.right) else { continue };
            match (visible.contains(&l), visible.contains(&r)) {
                (true, true) => doomed.push(id),
                (true, false) => seam.push((e.start, e.end, self.mesh.sides[l].plane)),
                (false, true) => seam.push((e.end, e.start, self.mesh.sides[r].plane)),
                (false, false) => {}
            }
        }

        for &s in &visible {
            self.mesh.remove_side(s);
        }
        for e in doomed {
            self.mesh.edges.remove(e);
        }
        let orphans: Vec<VertexId> = self
            .mesh
            .vertices
            .keys()
            .filter(|&v| !self.mesh.edges.values().any(|e| e.has_vertex(v)))
            .collect();
        for v in orphans {
            self.mesh.vertices.remove(v);
        }

        let apex = self.mesh.add_vertex(point);
        let apex_pos = point;
        for (u, v, fallback) in seam {
            let pu = self.mesh.position(u);
            let pv = self.mesh.position(v);
            let plane = Plane::from_points(&pv, &pu, &apex_pos).unwrap_or(fallback);
            self.mesh.link_side(&[v, u, apex], plane, None);
        }
        debug!(
            removed = visible.len(),
            sides = self.mesh.sides.len(),
            "wove point into hull"
        );
        Some(apex)
    }
}

/// Indices of the convex hull of `points` projected along `drop`,
/// counter-clockwise in the projected frame. Collinear points are skipped.
fn planar_hull(points: &[Point3d], drop: Axis, epsilon: f64) -> Vec<usize> {
    let project = |p: &Point3d| match drop {
        Axis::X => Point2d::new(p.y, p.z),
        Axis::Y => Point2d::new(p.z, p.x),
        Axis::Z => Point2d::new(p.x, p.y),
    };
    let flat: Vec<Point2d> = points.iter().map(project).collect();
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        flat[a]
            .x
            .total_cmp(&flat[b].x)
            .then(flat[a].y.total_cmp(&flat[b].y))
    });

    let mut hull: Vec<usize> = Vec::with_capacity(order.len() * 2);
    for pass in 0..2 {
        let start = hull.len();
        let sweep: Vec<usize> = if pass == 0 {
            order.clone()
        } else {
            order.iter().rev().copied().collect()
        };
        for i in sweep {
            while hull.len() >= start + 2 {
                let a = flat[hull[hull.len() - 2]];
                let b = flat[hull[hull.len() - 1]];
                if a.turn(&b, &flat[i]) <= epsilon {
                    hull.pop();
                } else {
                    break;
                }
            }
            hull.push(i);
        }
        hull.pop();
    }
    hull
}
