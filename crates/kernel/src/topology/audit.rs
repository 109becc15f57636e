use std::collections::HashSet;

use tracing::{debug, instrument};

use super::mesh::{EdgeId, Mesh, SideId, VertexId};
use crate::geometry::plane::PointStatus;
use crate::Tolerance;

/// Which checks `audit_mesh` runs.
#[derive(Debug, Clone, Copy)]
pub struct AuditConfig {
    /// Tolerances used by the geometric checks.
    pub tolerance: Tolerance,
    /// Planarity of every side and convexity of the whole solid.
    pub check_geometry: bool,
    /// No two adjacent sides share a plane.
    pub check_coplanar: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::full()
    }
}

impl AuditConfig {
    /// Connectivity only.
    pub fn topology() -> Self {
        Self {
            tolerance: Tolerance::default(),
            check_geometry: false,
            check_coplanar: false,
        }
    }

    pub fn full() -> Self {
        Self {
            tolerance: Tolerance::default(),
            check_geometry: true,
            check_coplanar: true,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopologyError {
    EulerViolation { v: usize, e: usize, f: usize },
    OpenEdge { edge: EdgeId },
    DanglingReference { edge: EdgeId },
    ShortLoop { side: SideId, len: usize },
    BrokenLoop { side: SideId, index: usize },
    DuplicateVertex { a: VertexId, b: VertexId },
    ZeroLengthEdge { edge: EdgeId, length: f64 },
    NonPlanarSide { side: SideId, vertex: VertexId, distance: f64 },
    NotConvex { side: SideId, vertex: VertexId, distance: f64 },
    CoplanarNeighbours { a: SideId, b: SideId },
    BoundsMismatch,
}

/// Result of auditing one mesh.
#[derive(Debug, Clone, Default)]
pub struct TopologyAudit {
    pub euler_valid: bool,
    pub all_edges_two_faced: bool,
    pub loops_consistent: bool,
    pub no_duplicate_vertices: bool,
    pub no_degenerate_edges: bool,
    pub geometry_valid: bool,
    pub errors: Vec<TopologyError>,
}

impl TopologyAudit {
    pub fn all_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks the mesh invariants. Meshes without sides (empty, point, edge)
/// only get the vertex and edge checks.
#[instrument(skip(mesh, config))]
pub fn audit_mesh(mesh: &Mesh, config: &AuditConfig) -> TopologyAudit {
    let mut errors = Vec::new();
    let tol = &config.tolerance;
    let (v, e, f) = mesh.counts();
    let closed = f > 0;

    // Euler characteristic
    if closed && v as i64 - e as i64 + f as i64 != 2 {
        errors.push(TopologyError::EulerViolation { v, e, f });
    }

    // Edge references
    for (id, edge) in &mesh.edges {
        if !mesh.vertices.contains_key(edge.start) || !mesh.vertices.contains_key(edge.end) {
            errors.push(TopologyError::DanglingReference { edge: id });
            continue;
        }
        let refs_ok = [edge.left, edge.right]
            .iter()
            .flatten()
            .all(|s| mesh.sides.contains_key(*s));
        if !refs_ok {
            errors.push(TopologyError::DanglingReference { edge: id });
        }
        if closed && (edge.left.is_none() || edge.right.is_none() || edge.left == edge.right) {
            errors.push(TopologyError::OpenEdge { edge: id });
        }
        let length = mesh.edge_length(id);
        if length < tol.almost_zero {
            errors.push(TopologyError::ZeroLengthEdge { edge: id, length });
        }
    }

    // Side loops
    for (id, side) in &mesh.sides {
        let n = side.edges.len();
        if n < 3 || side.vertices.len() != n {
            errors.push(TopologyError::ShortLoop { side: id, len: n });
            continue;
        }
        for i in 0..n {
            let Some(edge) = mesh.edges.get(side.edges[i]) else {
                errors.push(TopologyError::BrokenLoop { side: id, index: i });
                continue;
            };
            if edge.left != Some(id) && edge.right != Some(id) {
                errors.push(TopologyError::BrokenLoop { side: id, index: i });
                continue;
            }
            let next = side.edges[(i + 1) % n];
            if !mesh.edges.contains_key(next)
                || mesh.start_vertex(side.edges[i], id) != side.vertices[i]
                || mesh.end_vertex(side.edges[i], id) != mesh.start_vertex(next, id)
            {
                errors.push(TopologyError::BrokenLoop { side: id, index: i });
            }
        }
    }

    // Coincident vertices
    let ids: Vec<VertexId> = mesh.vertex_ids();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            if tol.points_coincident(&mesh.position(a), &mesh.position(b)) {
                errors.push(TopologyError::DuplicateVertex { a, b });
            }
        }
    }

    let topology_errors = errors.len();

    if config.check_geometry && closed {
        check_geometry(mesh, tol, &mut errors);
    }
    if config.check_coplanar && f > 2 {
        check_coplanar(mesh, tol, &mut errors);
    }

    let audit = TopologyAudit {
        euler_valid: !errors.iter().any(|e| matches!(e, TopologyError::EulerViolation { .. })),
        all_edges_two_faced: !errors.iter().any(|e| matches!(e, TopologyError::OpenEdge { .. })),
        loops_consistent: !errors
            .iter()
            .any(|e| matches!(e, TopologyError::ShortLoop { .. } | TopologyError::BrokenLoop { .. })),
        no_duplicate_vertices: !errors.iter().any(|e| matches!(e, TopologyError::DuplicateVertex { .. })),
        no_degenerate_edges: !errors.iter().any(|e| matches!(e, TopologyError::ZeroLengthEdge { .. })),
        geometry_valid: errors.len() == topology_errors,
        errors,
    };
    debug!(
        vertices = v,
        edges = e,
        sides = f,
        error_count = audit.errors.len(),
        "mesh audit complete"
    );
    audit
}

fn check_geometry(mesh: &Mesh, tol: &Tolerance, errors: &mut Vec<TopologyError>) {
    let solid = mesh.sides.len() > 2;
    for (id, side) in &mesh.sides {
        for &v in &side.vertices {
            let Some(vertex) = mesh.vertices.get(v) else { continue };
            let distance = side.plane.signed_distance(&vertex.position);
            if distance.abs() > tol.point_status {
                errors.push(TopologyError::NonPlanarSide { side: id, vertex: v, distance });
            }
        }
        if !solid {
            continue;
        }
        for (v, vertex) in &mesh.vertices {
            if side.plane.point_status(&vertex.position, tol.point_status) == PointStatus::Above {
                let distance = side.plane.signed_distance(&vertex.position);
                errors.push(TopologyError::NotConvex { side: id, vertex: v, distance });
            }
        }
    }
}

fn check_coplanar(mesh: &Mesh, tol: &Tolerance, errors: &mut Vec<TopologyError>) {
    let mut seen: HashSet<(SideId, SideId)> = HashSet::new();
    for (_, edge) in &mesh.edges {
        let (Some(l), Some(r)) = (edge.left, edge.right) else { continue };
        let (Some(a), Some(b)) = (mesh.sides.get(l), mesh.sides.get(r)) else { continue };
        let key = if l < r { (l, r) } else { (r, l) };
        if seen.contains(&key) || a.plane.normal.dot(&b.plane.normal) <= 0.0 {
            continue;
        }
        let flat = b.vertices.iter().all(|&v| {
            mesh.vertices
                .get(v)
                .is_some_and(|vx| a.plane.point_status(&vx.position, tol.point_status) == PointStatus::Inside)
        });
        if flat {
            seen.insert(key);
            errors.push(TopologyError::CoplanarNeighbours { a: l, b: r });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::plane::Plane;
    use crate::geometry::point::Point3d;
    use crate::geometry::vector::Vec3;

    fn triangle_polygon() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3d::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3d::new(0.0, 4.0, 0.0));
        let c = mesh.add_vertex(Point3d::new(4.0, 0.0, 0.0));
        let up = Plane::from_normal_and_point(Vec3::Z, &Point3d::ORIGIN).unwrap();
        mesh.link_side(&[a, b, c], up, None);
        mesh.link_side(&[c, b, a], up.flipped(), None);
        mesh
    }

    #[test]
    fn test_polygon_passes_full_audit() {
        let audit = audit_mesh(&triangle_polygon(), &AuditConfig::full());
        assert!(audit.all_valid(), "{:?}", audit.errors);
        assert!(audit.euler_valid);
    }

    #[test]
    fn test_open_mesh_is_reported() {
        let mut mesh = triangle_polygon();
        let back = mesh.side_ids()[1];
        mesh.remove_side(back);
        let audit = audit_mesh(&mesh, &AuditConfig::topology());
        assert!(!audit.euler_valid);
        assert!(!audit.all_edges_two_faced);
    }

    #[test]
    fn test_duplicate_vertex_is_reported() {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Point3d::new(1.0, 1.0, 1.0));
        mesh.add_vertex(Point3d::new(1.0, 1.0, 1.0005));
        let audit = audit_mesh(&mesh, &AuditConfig::topology());
        assert!(!audit.no_duplicate_vertices);
    }

    #[test]
    fn test_non_planar_side_is_reported() {
        let mut mesh = triangle_polygon();
        let v = mesh.vertex_ids()[0];
        mesh.vertices[v].position.z = 1.0;
        let audit = audit_mesh(&mesh, &AuditConfig::full());
        assert!(audit.euler_valid);
        assert!(!audit.geometry_valid);
        let audit = audit_mesh(&mesh, &AuditConfig::topology());
        assert!(audit.all_valid());
    }
}
