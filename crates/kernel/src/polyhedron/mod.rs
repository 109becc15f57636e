//! Convex polyhedra backed by a half-edge mesh.
//!
//! A `Polyhedron` is in exactly one of five states: empty, a single point,
//! a single edge, a two-sided polygon or a closed solid. Hull insertion and
//! clipping move between these states; drags and merges only operate on
//! closed solids.

pub mod hull;
pub mod clip;
pub mod drag;
pub mod merge;
pub mod query;
pub mod transform;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::geometry::plane::Plane;
use crate::geometry::point::Point3d;
use crate::geometry::transform::BoundingBox;
use crate::geometry::vector::Vec3;
use crate::topology::audit::{audit_mesh, AuditConfig, TopologyAudit, TopologyError};
use crate::topology::mesh::{EdgeId, FaceUid, Mesh, SideId, VertexId};
use crate::{KernelError, Tolerance};

pub use clip::{ClipResult, CutResult, FaceAddition};
pub use drag::{DragResult, MergePolicy, MultiDragResult};
pub use query::RayHit;

/// Which range of the unified handle space an index falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleKind {
    Vertex,
    Edge,
    Side,
}

/// Read-only view of one side for collaborators (renderer, texturing).
#[derive(Debug, Clone, PartialEq)]
pub struct FaceView {
    pub side: SideId,
    pub face: Option<FaceUid>,
    pub plane: Plane,
    /// Boundary loop, clockwise when seen from outside.
    pub vertices: Vec<Point3d>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polyhedron {
    pub(crate) mesh: Mesh,
    pub(crate) bounds: BoundingBox,
    pub(crate) tolerance: Tolerance,
}

impl Default for Polyhedron {
    fn default() -> Self {
        Self::new()
    }
}

impl Polyhedron {
    pub fn new() -> Self {
        Self {
            mesh: Mesh::new(),
            bounds: BoundingBox::empty(),
            tolerance: crate::default_tolerance(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    /// Cuboid seed with sides in the order -x, +x, -y, +y, +z, -z.
    /// Flat or inverted boxes collapse to the matching lower-dimensional
    /// state.
    #[instrument]
    pub fn from_bounding_box(bounds: &BoundingBox) -> Self {
        let size = bounds.size();
        let eps = crate::default_tolerance().almost_zero;
        if size.x <= eps || size.y <= eps || size.z <= eps {
            let corners = corners(bounds);
            return Self::from_points(&corners);
        }

        let mut poly = Self::new();
        let ids: Vec<VertexId> = corners(bounds)
            .into_iter()
            .map(|p| poly.mesh.add_vertex(p))
            .collect();
        // Corner index bits: x = 1, y = 2, z = 4.
        let loops: [([usize; 4], Vec3, &Point3d); 6] = [
            ([0, 2, 6, 4], -Vec3::X, &bounds.min),
            ([1, 5, 7, 3], Vec3::X, &bounds.max),
            ([0, 4, 5, 1], -Vec3::Y, &bounds.min),
            ([2, 3, 7, 6], Vec3::Y, &bounds.max),
            ([4, 6, 7, 5], Vec3::Z, &bounds.max),
            ([0, 1, 3, 2], -Vec3::Z, &bounds.min),
        ];
        for (corner_loop, normal, anchor) in loops {
            let vertices: Vec<VertexId> = corner_loop.iter().map(|&i| ids[i]).collect();
            let plane = Plane {
                normal,
                distance: normal.dot(&anchor.to_vec3()),
            };
            poly.mesh.link_side(&vertices, plane, None);
        }
        poly.update_bounds();
        debug!(vertices = 8, edges = poly.mesh.edges.len(), "seeded cuboid");
        poly
    }

    // ─── State ───────────────────────────────────────────────────────────────

    pub fn is_empty(&self) -> bool {
        self.mesh.vertices.is_empty()
    }

    pub fn is_point(&self) -> bool {
        self.mesh.vertices.len() == 1
    }

    pub fn is_edge(&self) -> bool {
        self.mesh.vertices.len() == 2 && self.mesh.edges.len() == 1
    }

    pub fn is_polygon(&self) -> bool {
        self.mesh.sides.len() == 2
    }

    pub fn is_polyhedron(&self) -> bool {
        self.mesh.sides.len() > 3
    }

    /// Polygon or solid.
    pub fn is_closed(&self) -> bool {
        self.mesh.sides.len() >= 2
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.mesh.edges.len()
    }

    pub fn side_count(&self) -> usize {
        self.mesh.sides.len()
    }

    /// Vertex positions in handle order.
    pub fn vertices(&self) -> Vec<Point3d> {
        self.mesh.vertices.values().map(|v| v.position).collect()
    }

    /// Edge endpoints in handle order.
    pub fn edges(&self) -> Vec<(Point3d, Point3d)> {
        self.mesh
            .edges
            .values()
            .map(|e| (self.mesh.position(e.start), self.mesh.position(e.end)))
            .collect()
    }

    /// Sides in handle order.
    pub fn faces(&self) -> Vec<FaceView> {
        self.mesh
            .sides
            .iter()
            .map(|(id, s)| FaceView {
                side: id,
                face: s.face,
                plane: s.plane,
                vertices: self.mesh.side_positions(id),
            })
            .collect()
    }

    pub fn face_loop(&self, side: SideId) -> Vec<Point3d> {
        self.mesh.side_positions(side)
    }

    pub fn side_plane(&self, side: SideId) -> Option<Plane> {
        self.mesh.sides.get(side).map(|s| s.plane)
    }

    pub fn side_of_face(&self, face: FaceUid) -> Option<SideId> {
        self.mesh
            .sides
            .iter()
            .find(|(_, s)| s.face == Some(face))
            .map(|(id, _)| id)
    }

    pub(crate) fn set_side_face(&mut self, side: SideId, face: Option<FaceUid>) {
        if let Some(s) = self.mesh.sides.get_mut(side) {
            s.face = face;
        }
    }

    /// Mean of a side's vertices.
    pub fn face_center(&self, side: SideId) -> Option<Point3d> {
        Point3d::centroid(&self.mesh.side_positions(side))
    }

    /// Mean of all vertices.
    pub fn center(&self) -> Option<Point3d> {
        Point3d::centroid(self.mesh.vertices.values().map(|v| &v.position))
    }

    /// Runs the mesh audit and checks the cached bounds.
    pub fn audit(&self, config: &AuditConfig) -> TopologyAudit {
        let mut audit = audit_mesh(&self.mesh, config);
        if !self.is_empty() {
            let actual = BoundingBox::from_points(self.mesh.vertices.values().map(|v| &v.position));
            let eps = config.tolerance.almost_zero;
            if !actual.min.almost_eq(&self.bounds.min, eps) || !actual.max.almost_eq(&self.bounds.max, eps) {
                audit.errors.push(TopologyError::BoundsMismatch);
            }
        }
        audit
    }

    pub(crate) fn update_bounds(&mut self) {
        self.bounds = BoundingBox::from_points(self.mesh.vertices.values().map(|v| &v.position));
    }

    pub(crate) fn refresh_planes(&mut self) {
        for side in self.mesh.side_ids() {
            self.mesh.refresh_plane(side);
        }
    }

    pub(crate) fn debug_check(&self) {
        debug_assert!(
            self.audit(&AuditConfig::topology().with_tolerance(self.tolerance)).all_valid(),
            "mesh invariants violated: {:?}",
            self.audit(&AuditConfig::topology().with_tolerance(self.tolerance)).errors
        );
    }

    // ─── Handles ─────────────────────────────────────────────────────────────

    /// Size of the unified handle space: vertices, then edges, then sides.
    pub fn handle_count(&self) -> usize {
        self.mesh.vertices.len() + self.mesh.edges.len() + self.mesh.sides.len()
    }

    /// Splits a handle into its kind and the index within that kind.
    pub fn handle_kind(&self, handle: usize) -> Result<(HandleKind, usize), KernelError> {
        let v = self.mesh.vertices.len();
        let e = self.mesh.edges.len();
        let s = self.mesh.sides.len();
        if handle < v {
            Ok((HandleKind::Vertex, handle))
        } else if handle < v + e {
            Ok((HandleKind::Edge, handle - v))
        } else if handle < v + e + s {
            Ok((HandleKind::Side, handle - v - e))
        } else {
            Err(KernelError::InvalidHandle {
                index: handle,
                count: self.handle_count(),
            })
        }
    }

    pub fn vertex_handle(&self, id: VertexId) -> Option<usize> {
        self.mesh.vertices.keys().position(|k| k == id)
    }

    pub fn edge_handle(&self, id: EdgeId) -> Option<usize> {
        self.mesh
            .edges
            .keys()
            .position(|k| k == id)
            .map(|i| i + self.mesh.vertices.len())
    }

    pub fn side_handle(&self, id: SideId) -> Option<usize> {
        self.mesh
            .sides
            .keys()
            .position(|k| k == id)
            .map(|i| i + self.mesh.vertices.len() + self.mesh.edges.len())
    }

    pub(crate) fn vertex_at(&self, handle: usize) -> Result<VertexId, KernelError> {
        match self.handle_kind(handle)? {
            (HandleKind::Vertex, i) => self.mesh.vertices.keys().nth(i).ok_or(KernelError::InvalidHandle {
                index: handle,
                count: self.handle_count(),
            }),
            _ => Err(KernelError::WrongHandleKind {
                index: handle,
                expected: HandleKind::Vertex,
            }),
        }
    }

    pub(crate) fn edge_at(&self, handle: usize) -> Result<EdgeId, KernelError> {
        match self.handle_kind(handle)? {
            (HandleKind::Edge, i) => self.mesh.edges.keys().nth(i).ok_or(KernelError::InvalidHandle {
                index: handle,
                count: self.handle_count(),
            }),
            _ => Err(KernelError::WrongHandleKind {
                index: handle,
                expected: HandleKind::Edge,
            }),
        }
    }

    pub(crate) fn side_at(&self, handle: usize) -> Result<SideId, KernelError> {
        match self.handle_kind(handle)? {
            (HandleKind::Side, i) => self.mesh.sides.keys().nth(i).ok_or(KernelError::InvalidHandle {
                index: handle,
                count: self.handle_count(),
            }),
            _ => Err(KernelError::WrongHandleKind {
                index: handle,
                expected: HandleKind::Side,
            }),
        }
    }
}

/// The eight corners of a box, indexed by bits x = 1, y = 2, z = 4.
fn corners(bounds: &BoundingBox) -> [Point3d; 8] {
    let (lo, hi) = (bounds.min, bounds.max);
    std::array::from_fn(|i| {
        Point3d::new(
            if i & 1 == 0 { lo.x } else { hi.x },
            if i & 2 == 0 { lo.y } else { hi.y },
            if i & 4 == 0 { lo.z } else { hi.z },
        )
    })
}
