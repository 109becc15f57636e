//! Cleanup passes that restore strict convexity after structural edits.

use tracing::{debug, trace, warn};

use super::Polyhedron;
use crate::geometry::plane::PointStatus;
use crate::topology::mesh::{EdgeId, FaceUid, SideId, VertexId};

impl Polyhedron {
    /// Merges every pair of adjacent coplanar sides. Returns the face ids
    /// that no longer have a side.
    pub fn merge_sides(&mut self) -> Vec<FaceUid> {
        let mut dropped = Vec::new();
        let mut merged = 0usize;
        while let Some((side, neighbour)) = self.find_coplanar_pair() {
            if !self.merge_neighbours(side, neighbour, &mut dropped) {
                warn!(?side, ?neighbour, "coplanar sides share no edge run; left unmerged");
                break;
            }
            merged += 1;
        }
        if merged > 0 {
            debug!(merged, "merged coplanar sides");
        }
        dropped
    }

    /// Removes every degree-two vertex whose two edges are collinear.
    pub fn merge_edges(&mut self) -> usize {
        let mut merged = 0usize;
        while let Some((v, e1, e2)) = self.find_collinear_pair() {
            self.merge_edge_pair(v, e1, e2);
            merged += 1;
        }
        if merged > 0 {
            debug!(merged, "merged collinear edges");
        }
        merged
    }

    fn find_coplanar_pair(&self) -> Option<(SideId, SideId)> {
        let eps = self.tolerance.point_status;
        for (id, side) in &self.mesh.sides {
            for &e in &side.edges {
                let Some(n) = self.mesh.edges[e].other_side(id) else { continue };
                let Some(neighbour) = self.mesh.sides.get(n) else { continue };
                if side.plane.normal.dot(&neighbour.plane.normal) <= 0.0 {
                    continue;
                }
                let flat = neighbour
                    .vertices
                    .iter()
                    .all(|&v| side.plane.point_status(&self.mesh.position(v), eps) == PointStatus::Inside);
                if flat {
                    return Some((id, n));
                }
            }
        }
        None
    }

    /// Absorbs `neighbour` into `side` across their shared run of edges.
    /// The neighbour's face id is pushed to `dropped` unless it survives.
    fn merge_neighbours(&mut self, side: SideId, neighbour: SideId, dropped: &mut Vec<FaceUid>) -> bool {
        let shared = |mesh: &crate::topology::mesh::Mesh, e: EdgeId| {
            mesh.edges[e].other_side(side) == Some(neighbour)
        };

        // Rotate `side` so the shared run starts at index 0.
        let n = self.mesh.sides[side].len();
        let Some(run_start) = (0..n).find(|&i| {
            let edges = &self.mesh.sides[side].edges;
            shared(&self.mesh, edges[i]) && !shared(&self.mesh, edges[(i + n - 1) % n])
        }) else {
            return false;
        };
        self.mesh.shift(side, run_start);
        let run_len = self.mesh.sides[side]
            .edges
            .iter()
            .take_while(|&&e| shared(&self.mesh, e))
            .count();

        // Same for `neighbour`, whose run is walked in reverse.
        let m = self.mesh.sides[neighbour].len();
        let Some(n_start) = (0..m).find(|&i| {
            let edges = &self.mesh.sides[neighbour].edges;
            let is_shared = |e: EdgeId| self.mesh.edges[e].other_side(neighbour) == Some(side);
            !is_shared(edges[i]) && is_shared(edges[(i + m - 1) % m])
        }) else {
            return false;
        };
        self.mesh.shift(neighbour, n_start);

        let s = &self.mesh.sides[side];
        let run: Vec<EdgeId> = s.edges[..run_len].to_vec();
        let interior: Vec<VertexId> = s.vertices[1..run_len].to_vec();
        let s_keep: Vec<EdgeId> = s.edges[run_len..].to_vec();
        let n_keep: Vec<EdgeId> = self.mesh.sides[neighbour].edges[..m - run_len].to_vec();

        for &e in &n_keep {
            self.mesh.retarget_edge(e, neighbour, side);
        }
        for e in run {
            self.mesh.edges.remove(e);
        }
        for v in interior {
            self.mesh.vertices.remove(v);
        }
        let Some(absorbed) = self.mesh.sides.remove(neighbour) else {
            return false;
        };

        let merged_face = self.mesh.sides[side].face.or(absorbed.face);
        let s = &mut self.mesh.sides[side];
        s.edges = s_keep.into_iter().chain(n_keep).collect();
        s.face = merged_face;
        self.mesh.update_side_vertices(side);
        self.mesh.refresh_plane(side);
        trace!(?side, ?neighbour, run_len, "merged sides");

        if let Some(uid) = absorbed.face.filter(|&uid| Some(uid) != merged_face) {
            dropped.push(uid);
        }
        true
    }

    fn find_collinear_pair(&self) -> Option<(VertexId, EdgeId, EdgeId)> {
        for v in self.mesh.vertices.keys() {
            let incident = self.mesh.vertex_edges(v);
            let &[e1, e2] = incident.as_slice() else { continue };
            let a = self.mesh.edges[e1].other_vertex(v);
            let b = self.mesh.edges[e2].other_vertex(v);
            let pv = self.mesh.position(v);
            let d1 = pv - self.mesh.position(a);
            let d2 = self.mesh.position(b) - pv;
            if d1.angle_to(&d2) >= self.tolerance.collinear {
                continue;
            }
            let big_enough = [self.mesh.edges[e1].left, self.mesh.edges[e1].right]
                .into_iter()
                .all(|s| s.and_then(|s| self.mesh.sides.get(s)).is_some_and(|s| s.len() > 3));
            if big_enough {
                return Some((v, e1, e2));
            }
        }
        None
    }

    /// Replaces `a -e1- v -e2- b` with a single edge `a - b`.
    fn merge_edge_pair(&mut self, v: VertexId, e1: EdgeId, e2: EdgeId) {
        let a = self.mesh.edges[e1].other_vertex(v);
        let b = self.mesh.edges[e2].other_vertex(v);
        let (Some(s1), Some(s2)) = (self.mesh.edges[e1].left, self.mesh.edges[e1].right) else {
            return;
        };
        // `right` walks a -> v -> b.
        let (right, left) = if self.mesh.end_vertex(e1, s1) == v { (s1, s2) } else { (s2, s1) };

        let merged = self.mesh.add_edge(a, b);
        self.mesh.edges[merged].right = Some(right);
        self.mesh.edges[merged].left = Some(left);

        for side in [right, left] {
            let s = &self.mesh.sides[side];
            let n = s.len();
            let (Some(i), Some(j)) = (s.index_of_edge(e1), s.index_of_edge(e2)) else {
                continue;
            };
            // The pair occupies two consecutive slots; `first` is the earlier one.
            let first = if (i + 1) % n == j { i } else { j };
            self.mesh.replace_edges(side, (first + n - 1) % n, (first + 2) % n, merged);
        }
        self.mesh.edges.remove(e1);
        self.mesh.edges.remove(e2);
        self.mesh.vertices.remove(v);
        trace!(?v, "merged collinear edges");
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::point::Point3d;
    use crate::polyhedron::tests::cube;
    use crate::polyhedron::Polyhedron;
    use crate::topology::audit::AuditConfig;

    #[test]
    fn test_merge_passes_on_clean_mesh_are_noops() {
        let mut poly = cube(4.0);
        assert!(poly.merge_sides().is_empty());
        assert_eq!(poly.merge_edges(), 0);
        assert_eq!(poly.mesh.counts(), (8, 12, 6));
    }

    #[test]
    fn test_split_edge_then_merge_edges_restores_cube() {
        let mut poly = cube(4.0);
        let e = poly.mesh.edge_ids()[0];
        poly.split_edge(e);
        assert_eq!(poly.mesh.counts(), (9, 13, 6));
        assert_eq!(poly.merge_edges(), 1);
        assert_eq!(poly.mesh.counts(), (8, 12, 6));
        let audit = poly.audit(&AuditConfig::full());
        assert!(audit.all_valid(), "{:?}", audit.errors);
    }

    #[test]
    fn test_split_face_then_merge_sides_restores_cube() {
        let mut poly = cube(4.0);
        let side = poly.mesh.side_ids()[4];
        let center = poly.split_face(side).unwrap();
        assert_eq!(poly.mesh.counts(), (9, 16, 9));
        poly.merge_sides();
        poly.merge_edges();
        assert!(!poly.mesh.vertices.contains_key(center));
        assert_eq!(poly.mesh.counts(), (8, 12, 6));
        let audit = poly.audit(&AuditConfig::full());
        assert!(audit.all_valid(), "{:?}", audit.errors);
    }

    #[test]
    fn test_merge_passes_are_idempotent() {
        let mut poly = Polyhedron::from_points(&[
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(4.0, 0.0, 0.0),
            Point3d::new(4.0, 4.0, 0.0),
            Point3d::new(0.0, 4.0, 0.0),
            Point3d::new(2.0, 2.0, 3.0),
            Point3d::new(2.0, 0.0, 0.0),
        ]);
        poly.merge_sides();
        poly.merge_edges();
        let once = poly.vertices();
        poly.merge_sides();
        poly.merge_edges();
        assert_eq!(poly.vertices(), once);
        assert_eq!(poly.mesh.counts(), (5, 8, 5));
    }
}
