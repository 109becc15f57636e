//! Vertex, edge and face drags.
//!
//! Every drag runs on a scratch copy. The vertex is advanced in steps, each
//! bounded by the nearest plane that would make its neighbourhood concave;
//! after each step the incident sides are re-planed and the merge passes
//! run. The copy is committed only when the vertex reached its target or
//! was absorbed on the way, and the result passes a full audit, so a
//! refused drag leaves the polyhedron untouched.
//!
//! Points, edges and polygons have no neighbourhood to step through; their
//! vertices are moved by rebuilding the hull around the new position.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use super::{HandleKind, Polyhedron};
use crate::geometry::plane::{Plane, PointStatus};
use crate::geometry::point::Point3d;
use crate::geometry::vector::Vec3;
use crate::topology::audit::AuditConfig;
use crate::topology::mesh::{EdgeId, FaceUid, Side, SideId, SideMark, VertexId};
use crate::KernelError;

const MAX_DRAG_STEPS: usize = 64;

/// What to do when a dragged vertex lands on another vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Fuse with the other vertex if they share an edge, refuse otherwise.
    Merge,
    /// Always refuse.
    Reject,
}

/// Outcome of a drag.
///
/// When `moved` is set, `handle` addresses the dragged vertex in the
/// post-drag handle space. If the vertex was swallowed by a neighbouring
/// side on the way, `absorbed` is set too and `handle` addresses whatever
/// took it in: the vertex it fused with, or the side it flattened into.
/// A refused drag reports the original handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragResult {
    pub handle: usize,
    pub moved: bool,
    pub absorbed: bool,
}

impl DragResult {
    pub(crate) fn unmoved(handle: usize) -> Self {
        Self { handle, moved: false, absorbed: false }
    }

    fn moved_to(handle: usize) -> Self {
        Self { handle, moved: true, absorbed: false }
    }

    fn absorbed_into(handle: usize) -> Self {
        Self { handle, moved: true, absorbed: true }
    }
}

/// Outcome of moving several elements by the same delta. `handles` lists
/// the moved elements in the post-move handle space, in request order, or
/// the requested handles when the move was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiDragResult {
    pub handles: Vec<usize>,
    pub moved: bool,
}

impl MultiDragResult {
    pub(crate) fn unmoved(handles: &[usize]) -> Self {
        Self { handles: handles.to_vec(), moved: false }
    }
}

/// Where a dragged vertex ended up.
#[derive(Debug, Clone, Copy)]
enum Landing {
    At(VertexId),
    /// The vertex disappeared into its surroundings at this position.
    Absorbed(Point3d),
}

impl Polyhedron {
    /// Dispatches on the kind of `handle`.
    pub fn move_handle(&mut self, handle: usize, delta: Vec3, policy: MergePolicy) -> Result<DragResult, KernelError> {
        match self.handle_kind(handle)?.0 {
            HandleKind::Vertex => self.move_vertex(handle, delta, policy),
            HandleKind::Edge => self.move_edge(handle, delta, policy),
            HandleKind::Side => self.move_face(handle, delta, policy),
        }
    }

    /// Moves one vertex. Works in every non-empty state; a polygon vertex
    /// may only move within the polygon's plane.
    #[instrument(skip(self), fields(vertices = self.mesh.vertices.len()))]
    pub fn move_vertex(&mut self, handle: usize, delta: Vec3, policy: MergePolicy) -> Result<DragResult, KernelError> {
        let v = self.vertex_at(handle)?;
        if delta.is_null(self.tolerance.almost_zero) {
            return Ok(DragResult::unmoved(handle));
        }
        let mut work = self.clone();
        let landing = work.displace_vertex(v, delta, policy);
        Ok(self.commit(work, landing, handle))
    }

    /// Drags the midpoint of an edge. Whether the motion is possible is
    /// left to the drag itself and the audit of its result.
    #[instrument(skip(self), fields(edges = self.mesh.edges.len()))]
    pub fn move_edge(&mut self, handle: usize, delta: Vec3, policy: MergePolicy) -> Result<DragResult, KernelError> {
        let e = self.edge_at(handle)?;
        if delta.is_null(self.tolerance.almost_zero) {
            return Ok(DragResult::unmoved(handle));
        }
        if !self.is_polyhedron() {
            return Err(KernelError::NotAPolyhedron);
        }

        let mut work = self.clone();
        let m = work.split_edge(e);
        let landing = work.drag_vertex(m, delta, policy).filter(|l| matches!(l, Landing::At(_)));
        Ok(self.commit(work, landing, handle))
    }

    /// Drags the center of a face outward. Inward drags are refused.
    #[instrument(skip(self), fields(sides = self.mesh.sides.len()))]
    pub fn move_face(&mut self, handle: usize, delta: Vec3, policy: MergePolicy) -> Result<DragResult, KernelError> {
        let side = self.side_at(handle)?;
        let eps = self.tolerance.almost_zero;
        if delta.is_null(eps) {
            return Ok(DragResult::unmoved(handle));
        }
        if !self.is_polyhedron() {
            return Err(KernelError::NotAPolyhedron);
        }
        let normal = self.mesh.sides[side].plane.normal;
        if delta.dot(&normal) <= eps {
            debug!("face drag does not leave the solid");
            return Ok(DragResult::unmoved(handle));
        }

        let mut work = self.clone();
        let Some(c) = work.split_face(side) else {
            return Ok(DragResult::unmoved(handle));
        };
        // A center that sinks back into the face leaves the shape as it was.
        let landing = work.drag_vertex(c, delta, policy).filter(|l| matches!(l, Landing::At(_)));
        Ok(self.commit(work, landing, handle))
    }

    // ─── Multi-element moves ─────────────────────────────────────────────────

    /// Moves several vertices by the same delta. Refused unless every one
    /// of them arrives.
    #[instrument(skip(self, handles), fields(count = handles.len()))]
    pub fn move_vertices(
        &mut self,
        handles: &[usize],
        delta: Vec3,
        policy: MergePolicy,
    ) -> Result<MultiDragResult, KernelError> {
        let mut positions = Vec::with_capacity(handles.len());
        for &h in handles {
            positions.push(self.mesh.position(self.vertex_at(h)?));
        }
        if positions.is_empty() || delta.is_null(self.tolerance.almost_zero) {
            return Ok(MultiDragResult::unmoved(handles));
        }

        let eps = self.tolerance.point_status;
        let mut work = self.clone();
        let placed = work.displace_vertices(&positions, delta, policy).then(|| {
            positions
                .iter()
                .map(|p| work.find_vertex_at(&(*p + delta), eps).and_then(|v| work.vertex_handle(v)))
                .collect::<Option<Vec<_>>>()
        });
        Ok(self.commit_all(work, placed.flatten(), handles))
    }

    /// Translates whole edges. Every endpoint must arrive without merging
    /// and every edge must still exist afterwards.
    #[instrument(skip(self, handles), fields(count = handles.len()))]
    pub fn move_edges(&mut self, handles: &[usize], delta: Vec3) -> Result<MultiDragResult, KernelError> {
        let mut segments = Vec::with_capacity(handles.len());
        for &h in handles {
            let edge = &self.mesh.edges[self.edge_at(h)?];
            segments.push((self.mesh.position(edge.start), self.mesh.position(edge.end)));
        }
        if segments.is_empty() || delta.is_null(self.tolerance.almost_zero) {
            return Ok(MultiDragResult::unmoved(handles));
        }

        let eps = self.tolerance.point_status;
        let endpoints: Vec<Point3d> = segments.iter().flat_map(|&(a, b)| [a, b]).collect();
        let mut work = self.clone();
        let placed = work.displace_vertices(&endpoints, delta, MergePolicy::Reject).then(|| {
            segments
                .iter()
                .map(|(a, b)| {
                    work.find_edge_at(&(*a + delta), &(*b + delta), eps)
                        .and_then(|e| work.edge_handle(e))
                })
                .collect::<Option<Vec<_>>>()
        });
        Ok(self.commit_all(work, placed.flatten(), handles))
    }

    /// Translates whole faces. Every face must survive with its loop
    /// intact.
    #[instrument(skip(self, handles), fields(count = handles.len()))]
    pub fn move_faces(&mut self, handles: &[usize], delta: Vec3) -> Result<MultiDragResult, KernelError> {
        let mut loops = Vec::with_capacity(handles.len());
        for &h in handles {
            loops.push(self.mesh.side_positions(self.side_at(h)?));
        }
        if loops.is_empty() || delta.is_null(self.tolerance.almost_zero) {
            return Ok(MultiDragResult::unmoved(handles));
        }

        let eps = self.tolerance.point_status;
        let corners: Vec<Point3d> = loops.iter().flatten().copied().collect();
        let mut work = self.clone();
        let placed = work.displace_vertices(&corners, delta, MergePolicy::Reject).then(|| {
            loops
                .iter()
                .map(|ring| {
                    let moved: Vec<Point3d> = ring.iter().map(|p| *p + delta).collect();
                    work.find_side_at(&moved, eps).and_then(|s| work.side_handle(s))
                })
                .collect::<Option<Vec<_>>>()
        });
        Ok(self.commit_all(work, placed.flatten(), handles))
    }

    // ─── Commit ──────────────────────────────────────────────────────────────

    /// Adopts `work` if the drag landed and it passes a full audit.
    fn commit(&mut self, work: Polyhedron, landing: Option<Landing>, handle: usize) -> DragResult {
        let Some(landing) = landing else {
            return DragResult::unmoved(handle);
        };
        if !work.passes_commit_audit() {
            return DragResult::unmoved(handle);
        }
        *self = work;
        let result = match landing {
            Landing::At(v) => DragResult::moved_to(self.vertex_handle(v).unwrap_or(handle)),
            Landing::Absorbed(p) => DragResult::absorbed_into(self.absorbing_handle(&p).unwrap_or(handle)),
        };
        debug!(handle = result.handle, absorbed = result.absorbed, "drag committed");
        result
    }

    fn commit_all(&mut self, work: Polyhedron, placed: Option<Vec<usize>>, handles: &[usize]) -> MultiDragResult {
        let Some(placed) = placed else {
            debug!("not every element arrived");
            return MultiDragResult::unmoved(handles);
        };
        if !work.passes_commit_audit() {
            return MultiDragResult::unmoved(handles);
        }
        *self = work;
        debug!(count = placed.len(), "move committed");
        MultiDragResult { handles: placed, moved: true }
    }

    fn passes_commit_audit(&self) -> bool {
        let audit = self.audit(&AuditConfig::full().with_tolerance(self.tolerance));
        if !audit.all_valid() {
            warn!(errors = ?audit.errors, "drag result failed audit; rolled back");
        }
        audit.all_valid()
    }

    /// The vertex sitting at `p`, or else the side whose plane passes
    /// closest to it.
    fn absorbing_handle(&self, p: &Point3d) -> Option<usize> {
        let eps = self.tolerance.point_status;
        if let Some(v) = self.find_vertex_at(p, eps) {
            return self.vertex_handle(v);
        }
        self.mesh
            .sides
            .iter()
            .filter(|(_, s)| s.plane.point_status(p, eps) == PointStatus::Inside)
            .min_by(|(_, a), (_, b)| {
                a.plane
                    .signed_distance(p)
                    .abs()
                    .total_cmp(&b.plane.signed_distance(p).abs())
            })
            .and_then(|(id, _)| self.side_handle(id))
    }

    // ─── Stepping ────────────────────────────────────────────────────────────

    fn displace_vertex(&mut self, v: VertexId, delta: Vec3, policy: MergePolicy) -> Option<Landing> {
        if self.is_polyhedron() {
            self.drag_vertex(v, delta, policy)
        } else {
            self.move_degenerate_vertex(v, delta, policy)
        }
    }

    /// Moves the vertices found at `positions`, farthest along `delta`
    /// first, so that none is pushed into a vertex that has yet to move.
    /// False as soon as one fails to land.
    fn displace_vertices(&mut self, positions: &[Point3d], delta: Vec3, policy: MergePolicy) -> bool {
        let eps = self.tolerance.almost_zero;
        let mut order: Vec<Point3d> = Vec::with_capacity(positions.len());
        for p in positions {
            if !order.iter().any(|q| q.almost_eq(p, eps)) {
                order.push(*p);
            }
        }
        order.sort_by(|a, b| b.to_vec3().dot(&delta).total_cmp(&a.to_vec3().dot(&delta)));

        for p in order {
            let Some(v) = self.find_vertex_at(&p, eps) else {
                debug!(?p, "vertex vanished before its turn");
                return false;
            };
            if !matches!(self.displace_vertex(v, delta, policy), Some(Landing::At(_))) {
                return false;
            }
        }
        true
    }

    /// Moves `v` by `delta`. `None` if the path was blocked, the step
    /// budget ran out or the vertex stopped short of its target.
    fn drag_vertex(&mut self, v: VertexId, delta: Vec3, policy: MergePolicy) -> Option<Landing> {
        let dir = delta.normalized()?;
        let target = self.mesh.position(v) + delta;
        let mut remaining = delta.length();

        for step in 0..MAX_DRAG_STEPS {
            if remaining <= self.tolerance.almost_zero {
                break;
            }
            let origin = self.mesh.position(v);
            let Some(travelled) = self.drag_step(v, dir, remaining, policy) else {
                debug!(step, "drag blocked");
                return None;
            };
            if !self.mesh.vertices.contains_key(v) {
                let position = (origin + dir * travelled).snapped(self.tolerance.almost_zero);
                debug!(step, ?position, "dragged vertex was absorbed");
                return Some(Landing::Absorbed(position));
            }
            remaining -= travelled;
            trace!(step, travelled, remaining, "drag step");
        }
        if remaining > self.tolerance.almost_zero {
            warn!(remaining, "drag step budget exhausted");
            return None;
        }

        let snapped = self.mesh.position(v).snapped(self.tolerance.almost_zero);
        self.mesh.vertices[v].position = snapped;
        for side in self.mesh.incident_sides(v) {
            self.mesh.refresh_plane(side);
        }
        self.update_bounds();
        (snapped.distance_to(&target) <= self.tolerance.point_status).then_some(Landing::At(v))
    }

    /// Moves a vertex of a point, edge or polygon by rebuilding the hull
    /// with the vertex at its destination. Side face ids carry over to the
    /// rebuilt side facing the same way.
    fn move_degenerate_vertex(&mut self, v: VertexId, delta: Vec3, policy: MergePolicy) -> Option<Landing> {
        let destination = (self.mesh.position(v) + delta).snapped(self.tolerance.almost_zero);
        if self.is_polygon() {
            let plane = self.mesh.sides.values().next()?.plane;
            if plane.point_status(&destination, self.tolerance.point_status) != PointStatus::Inside {
                debug!(?destination, "polygon vertex would leave its plane");
                return None;
            }
        }
        let occupant = self
            .mesh
            .vertices
            .iter()
            .find(|&(w, vx)| w != v && self.tolerance.points_coincident(&vx.position, &destination))
            .map(|(w, _)| w);
        if let Some(w) = occupant {
            if policy == MergePolicy::Reject || self.mesh.find_edge(v, w).is_none() {
                debug!(?policy, "vertex would land on another vertex");
                return None;
            }
        }

        let points: Vec<Point3d> = self
            .mesh
            .vertices
            .iter()
            .map(|(w, vx)| if w == v { destination } else { vx.position })
            .collect();
        let faces: Vec<(Vec3, Option<FaceUid>)> = self.mesh.sides.values().map(|s| (s.plane.normal, s.face)).collect();

        let mut rebuilt = Polyhedron::new().with_tolerance(self.tolerance);
        rebuilt.add_points(&points);
        for side in rebuilt.mesh.side_ids() {
            let normal = rebuilt.mesh.sides[side].plane.normal;
            let face = faces
                .iter()
                .filter(|(n, _)| n.dot(&normal) > 0.0)
                .max_by(|(a, _), (b, _)| a.dot(&normal).total_cmp(&b.dot(&normal)))
                .and_then(|&(_, f)| f);
            rebuilt.set_side_face(side, face);
        }
        *self = rebuilt;
        trace!(?destination, vertices = self.mesh.vertices.len(), "rebuilt degenerate hull");

        Some(match self.find_vertex_at(&destination, self.tolerance.almost_zero) {
            Some(w) => Landing::At(w),
            None => Landing::Absorbed(destination),
        })
    }

    /// One bounded step along `dir`. Returns the distance travelled.
    fn drag_step(&mut self, v: VertexId, dir: Vec3, remaining: f64, policy: MergePolicy) -> Option<f64> {
        let eps = self.tolerance.almost_zero;

        // Reduce the neighbourhood to triangles.
        for side in self.mesh.incident_sides(v) {
            if self.mesh.sides[side].len() <= 3 {
                continue;
            }
            if self.mesh.sides[side].plane.normal.dot(&dir) > eps {
                self.triangulate_side(side, v);
            } else {
                self.split_side(side, v);
            }
        }

        let origin = self.mesh.position(v);
        let distance = self.safe_distance(v, &origin, &dir, remaining);
        self.mesh.vertices[v].position = origin + dir * distance;
        for side in self.mesh.incident_sides(v) {
            self.mesh.refresh_plane(side);
        }
        let position = self.mesh.position(v);

        if self.lies_inside_foreign_edge(v, &position) {
            debug!(?position, "vertex would land inside an edge");
            return None;
        }

        let coincident = self
            .mesh
            .vertices
            .iter()
            .find(|&(w, vx)| w != v && self.tolerance.points_coincident(&vx.position, &position))
            .map(|(w, _)| w);
        if let Some(w) = coincident {
            match policy {
                MergePolicy::Merge if self.mesh.find_edge(v, w).is_some() => self.merge_vertices(v, w)?,
                _ => {
                    debug!(?policy, "vertex would land on another vertex");
                    return None;
                }
            }
        }

        self.remove_degenerate_triangles(v);
        self.merge_sides();
        self.merge_edges();
        self.update_bounds();
        Some(distance)
    }

    /// Largest distance `v` can travel along `dir` before one of its fan
    /// triangles becomes coplanar with a neighbour, capped at `remaining`.
    fn safe_distance(&self, v: VertexId, origin: &Point3d, dir: &Vec3, remaining: f64) -> f64 {
        let eps = self.tolerance.almost_zero;
        let fan = self.mesh.incident_sides(v);
        let mut distance = remaining;
        let mut consider = |plane: Option<Plane>| {
            if let Some(t) = plane.and_then(|p| p.intersect_with_line(origin, dir)) {
                if t > eps && t < distance {
                    distance = t;
                }
            }
        };

        for (k, &side) in fan.iter().enumerate() {
            let Some((a, b)) = self.fan_triangle(side, v) else { continue };
            let next = fan[(k + 1) % fan.len()];
            if let Some((_, c)) = self.fan_triangle(next, v) {
                // `next` is (v, c, a) or (v, b, c) depending on winding.
                let far = if c == a || c == b { None } else { Some(c) };
                if let Some(c) = far {
                    consider(Plane::from_points(
                        &self.mesh.position(a),
                        &self.mesh.position(b),
                        &self.mesh.position(c),
                    ));
                }
            }
            let s = &self.mesh.sides[side];
            let Some(i) = s.index_of_vertex(v) else { continue };
            let opposite = s.edges[(i + 1) % 3];
            let neighbour = self.mesh.edges[opposite].other_side(side);
            consider(neighbour.and_then(|n| self.side_plane(n)));
        }
        distance
    }

    /// The two other vertices of a triangle containing `v`, in loop order.
    fn fan_triangle(&self, side: SideId, v: VertexId) -> Option<(VertexId, VertexId)> {
        let s = self.mesh.sides.get(side)?;
        if s.len() != 3 {
            return None;
        }
        let i = s.index_of_vertex(v)?;
        Some((s.vertices[(i + 1) % 3], s.vertices[(i + 2) % 3]))
    }

    fn lies_inside_foreign_edge(&self, v: VertexId, p: &Point3d) -> bool {
        let eps = self.tolerance.almost_zero;
        self.mesh.edges.values().filter(|e| !e.has_vertex(v)).any(|e| {
            let a = self.mesh.position(e.start);
            let b = self.mesh.position(e.end);
            if a.distance_to(p) <= eps || b.distance_to(p) <= eps {
                return false;
            }
            let ab = b - a;
            let len2 = ab.length_squared();
            if len2 <= eps * eps {
                return false;
            }
            let t = (*p - a).dot(&ab) / len2;
            t > 0.0 && t < 1.0 && a.lerp(&b, t).distance_to(p) <= eps
        })
    }

    // ─── Surgery ─────────────────────────────────────────────────────────────

    /// Cuts the triangle `(prev, v, next)` off `side`. The remainder keeps
    /// the side id.
    fn split_side(&mut self, side: SideId, v: VertexId) -> Option<SideId> {
        let s = self.mesh.sides.get(side)?;
        let n = s.len();
        if n <= 3 {
            return None;
        }
        let i = s.index_of_vertex(v)?;
        let e_in = s.edges[(i + n - 1) % n];
        let e_out = s.edges[i];
        let prev = s.vertices[(i + n - 1) % n];
        let next = s.vertices[(i + 1) % n];
        let (plane, face) = (s.plane, s.face);

        let chord = self.mesh.add_edge(prev, next);
        self.mesh.edges[chord].right = Some(side);
        self.mesh.replace_edges(side, (i + n - 2) % n, (i + 1) % n, chord);

        let tri = self.mesh.sides.insert(Side {
            vertices: Vec::new(),
            edges: vec![e_in, e_out, chord],
            plane,
            face,
            mark: SideMark::New,
        });
        self.mesh.edges[chord].left = Some(tri);
        self.mesh.retarget_edge(e_in, side, tri);
        self.mesh.retarget_edge(e_out, side, tri);
        self.mesh.update_side_vertices(tri);
        Some(tri)
    }

    /// Replaces `side` with a fan of triangles around `v`.
    fn triangulate_side(&mut self, side: SideId, v: VertexId) {
        let Some(s) = self.mesh.sides.get(side) else { return };
        let n = s.len();
        let Some(i) = s.index_of_vertex(v) else { return };
        if n <= 3 {
            return;
        }
        let ring: Vec<VertexId> = (0..n).map(|k| s.vertices[(i + k) % n]).collect();
        let (plane, face) = (s.plane, s.face);
        self.mesh.remove_side(side);
        for k in 1..n - 1 {
            self.mesh.link_side(&[v, ring[k], ring[k + 1]], plane, face);
        }
    }

    /// Inserts a vertex at the midpoint of `edge`.
    pub(crate) fn split_edge(&mut self, edge: EdgeId) -> VertexId {
        let old = self.mesh.edges[edge].clone();
        let mid = self.mesh.position(old.start).midpoint(&self.mesh.position(old.end));
        let m = self.mesh.add_vertex(mid);
        let e1 = self.mesh.add_edge(old.start, m);
        let e2 = self.mesh.add_edge(m, old.end);
        for e in [e1, e2] {
            self.mesh.edges[e].left = old.left;
            self.mesh.edges[e].right = old.right;
        }
        if let Some(r) = old.right {
            self.splice_edge(r, edge, [e1, e2]);
        }
        if let Some(l) = old.left {
            self.splice_edge(l, edge, [e2, e1]);
        }
        self.mesh.edges.remove(edge);
        trace!(?edge, "split edge");
        m
    }

    fn splice_edge(&mut self, side: SideId, edge: EdgeId, with: [EdgeId; 2]) {
        if let Some(i) = self.mesh.sides[side].index_of_edge(edge) {
            self.mesh.sides[side].edges.splice(i..=i, with);
            self.mesh.update_side_vertices(side);
        }
    }

    /// Replaces `side` with a fan of triangles around a new center vertex.
    pub(crate) fn split_face(&mut self, side: SideId) -> Option<VertexId> {
        let ring = self.mesh.sides.get(side)?.vertices.clone();
        let center = Point3d::centroid(&self.mesh.side_positions(side))?;
        let removed = self.mesh.remove_side(side)?;
        let c = self.mesh.add_vertex(center);
        let n = ring.len();
        for k in 0..n {
            self.mesh.link_side(&[c, ring[k], ring[(k + 1) % n]], removed.plane, removed.face);
        }
        self.update_bounds();
        Some(c)
    }

    /// Fuses `w` into `v` along their shared edge. The two triangles on
    /// that edge collapse; their remaining edges are taken over by the
    /// sides across them.
    fn merge_vertices(&mut self, v: VertexId, w: VertexId) -> Option<()> {
        if self.mesh.vertices.len() <= 4 {
            return None;
        }
        let e = self.mesh.find_edge(v, w)?;
        let pair = [self.mesh.edges[e].left?, self.mesh.edges[e].right?];

        for t in pair {
            let s = &self.mesh.sides[t];
            if s.len() != 3 {
                return None;
            }
            let (keep, drop): (EdgeId, EdgeId) = {
                let mut others = s.edges.iter().copied().filter(|&x| x != e);
                let (x, y) = (others.next()?, others.next()?);
                if self.mesh.edges[x].has_vertex(v) { (x, y) } else { (y, x) }
            };
            let across = self.mesh.edges[drop].other_side(t)?;
            if pair.contains(&across) {
                return None;
            }
            let i = self.mesh.sides[across].index_of_edge(drop)?;
            self.mesh.sides[across].edges[i] = keep;
            self.mesh.retarget_edge(keep, t, across);
            self.mesh.edges.remove(drop);
            self.mesh.sides.remove(t);
        }
        self.mesh.edges.remove(e);

        for (_, edge) in self.mesh.edges.iter_mut() {
            if edge.start == w {
                edge.start = v;
            }
            if edge.end == w {
                edge.end = v;
            }
        }
        self.mesh.vertices.remove(w);
        for side in self.mesh.side_ids() {
            self.mesh.update_side_vertices(side);
        }
        debug!(?v, ?w, "merged vertices");
        Some(())
    }

    /// Removes zero-area triangles around `v` by dissolving each into the
    /// side across its longest edge.
    fn remove_degenerate_triangles(&mut self, v: VertexId) {
        let eps = self.tolerance.almost_zero;
        for side in self.mesh.incident_sides(v) {
            let Some(s) = self.mesh.sides.get(side) else { continue };
            if s.len() != 3 {
                continue;
            }
            let p = self.mesh.side_positions(side);
            let longest = (0..3)
                .max_by(|&a, &b| {
                    self.mesh
                        .edge_length(s.edges[a])
                        .total_cmp(&self.mesh.edge_length(s.edges[b]))
                })
                .unwrap_or(0);
            let base = self.mesh.edge_length(s.edges[longest]);
            let area2 = (p[1] - p[0]).cross(&(p[2] - p[0])).length();
            if area2 > eps * base {
                continue;
            }

            let long_edge = s.edges[longest];
            let rest = [s.edges[(longest + 1) % 3], s.edges[(longest + 2) % 3]];
            let Some(across) = self.mesh.edges[long_edge].other_side(side) else { continue };
            if across == side {
                continue;
            }
            let Some(i) = self.mesh.sides[across].index_of_edge(long_edge) else { continue };
            self.mesh.sides[across].edges.splice(i..=i, rest);
            for e in rest {
                self.mesh.retarget_edge(e, side, across);
            }
            self.mesh.edges.remove(long_edge);
            self.mesh.sides.remove(side);
            self.mesh.update_side_vertices(across);
            trace!(?side, ?across, "dissolved degenerate triangle");
        }
    }
}
