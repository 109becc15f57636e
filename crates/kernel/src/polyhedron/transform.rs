use tracing::{debug, instrument};

use super::Polyhedron;
use crate::geometry::point::Point3d;
use crate::geometry::transform::{Axis, Rotation, Transform};
use crate::geometry::vector::Vec3;
use crate::topology::mesh::FaceUid;

impl Polyhedron {
    pub fn translate(&mut self, delta: &Vec3) {
        for (_, v) in self.mesh.vertices.iter_mut() {
            v.position = v.position + *delta;
        }
        for (_, s) in self.mesh.sides.iter_mut() {
            s.plane = s.plane.translated(delta);
        }
        self.update_bounds();
    }

    /// Quarter turn clockwise about `axis` through `center`, seen looking
    /// down the positive axis.
    pub fn rotate90_cw(&mut self, axis: Axis, center: &Point3d) {
        self.map_points(|p| p.rotated90(axis, center, true), true);
    }

    pub fn rotate90_ccw(&mut self, axis: Axis, center: &Point3d) {
        self.map_points(|p| p.rotated90(axis, center, false), true);
    }

    pub fn rotate(&mut self, rotation: &Rotation, center: &Point3d) {
        let t = Transform::rotation_about(rotation, center);
        self.map_points(|p| t.transform_point(p), true);
    }

    /// Mirrors across the plane orthogonal to `axis` through `center`.
    pub fn flip(&mut self, axis: Axis, center: &Point3d) {
        self.map_points(|p| p.flipped(axis, center), false);
    }

    /// Applies an arbitrary affine map. Mirroring maps keep the sides
    /// wound clockwise by reversing every loop.
    #[instrument(skip(self, transform))]
    pub fn transform(&mut self, transform: &Transform) {
        let keeps_winding = transform.preserves_orientation();
        self.map_points(|p| transform.transform_point(p), keeps_winding);
        debug!(keeps_winding, "polyhedron transformed");
    }

    /// Rounds vertex coordinates that lie within `almost_zero` of an
    /// integer, then merges the sides and edges that rounding made
    /// coplanar or collinear. Returns the face ids left without a side.
    pub fn snap(&mut self) -> Vec<FaceUid> {
        let eps = self.tolerance.almost_zero;
        for (_, v) in self.mesh.vertices.iter_mut() {
            v.position = v.position.snapped(eps);
        }
        self.refresh_planes();
        let dropped = self.merge_sides();
        let merged = self.merge_edges();
        self.update_bounds();
        self.debug_check();
        debug!(dropped = dropped.len(), merged, "snapped vertices");
        dropped
    }

    fn map_points(&mut self, f: impl Fn(&Point3d) -> Point3d, keeps_winding: bool) {
        for (_, v) in self.mesh.vertices.iter_mut() {
            v.position = f(&v.position);
        }
        if !keeps_winding {
            self.mesh.reverse_orientation();
        }
        self.refresh_planes();
        self.update_bounds();
    }
}
