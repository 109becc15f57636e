use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::geometry::plane::Plane;
use crate::geometry::point::Point3d;

// ─── Entity Keys ─────────────────────────────────────────────────────────────

new_key_type! {
    pub struct VertexId;
    pub struct EdgeId;
    pub struct SideId;
}

/// Identity of the textured face a side belongs to. Assigned by the brush
/// layer; the mesh only carries it through structural edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceUid(pub u64);

// ─── Marks ───────────────────────────────────────────────────────────────────

/// Transient classification used during a single clip or weave pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VertexMark {
    #[default]
    Unknown,
    Keep,
    Drop,
    Undecided,
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeMark {
    #[default]
    Unknown,
    Keep,
    Drop,
    Split,
    Undecided,
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SideMark {
    #[default]
    Unknown,
    Keep,
    Drop,
    Split,
    New,
}

// ─── Mesh Entities ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3d,
    pub mark: VertexMark,
}

/// An edge between two vertices.
///
/// The `right` side traverses the edge from `start` to `end`, the `left`
/// side traverses it from `end` to `start`. Either may be `None` while the
/// edge is under construction, or permanently for a lone segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub start: VertexId,
    pub end: VertexId,
    pub left: Option<SideId>,
    pub right: Option<SideId>,
    pub mark: EdgeMark,
}

impl Edge {
    pub fn new(start: VertexId, end: VertexId) -> Self {
        Self {
            start,
            end,
            left: None,
            right: None,
            mark: EdgeMark::Unknown,
        }
    }

    pub fn has_vertex(&self, v: VertexId) -> bool {
        self.start == v || self.end == v
    }

    pub fn other_vertex(&self, v: VertexId) -> VertexId {
        if self.start == v { self.end } else { self.start }
    }

    /// The side on the opposite face of `side`, if any.
    pub fn other_side(&self, side: SideId) -> Option<SideId> {
        if self.right == Some(side) {
            self.left
        } else if self.left == Some(side) {
            self.right
        } else {
            None
        }
    }

    /// Swaps the endpoints together with the side references so that each
    /// side still traverses the edge in the same direction.
    pub fn flip(&mut self) {
        std::mem::swap(&mut self.start, &mut self.end);
        std::mem::swap(&mut self.left, &mut self.right);
    }
}

/// A planar boundary loop. `vertices[i]` is the vertex at which
/// `edges[i]` starts when walked by this side; the loop is clockwise when
/// seen from outside the solid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Side {
    pub vertices: Vec<VertexId>,
    pub edges: Vec<EdgeId>,
    pub plane: Plane,
    pub face: Option<FaceUid>,
    pub mark: SideMark,
}

impl Side {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn index_of_vertex(&self, v: VertexId) -> Option<usize> {
        self.vertices.iter().position(|&x| x == v)
    }

    pub fn index_of_edge(&self, e: EdgeId) -> Option<usize> {
        self.edges.iter().position(|&x| x == e)
    }
}

// ─── Mesh ────────────────────────────────────────────────────────────────────

/// Arena storage for the half-edge graph of one polyhedron.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: SlotMap<VertexId, Vertex>,
    pub edges: SlotMap<EdgeId, Edge>,
    pub sides: SlotMap<SideId, Side>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.sides.clear();
    }

    /// (vertices, edges, sides)
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.vertices.len(), self.edges.len(), self.sides.len())
    }

    pub fn add_vertex(&mut self, position: Point3d) -> VertexId {
        self.vertices.insert(Vertex {
            position,
            mark: VertexMark::Unknown,
        })
    }

    pub fn add_edge(&mut self, start: VertexId, end: VertexId) -> EdgeId {
        self.edges.insert(Edge::new(start, end))
    }

    pub fn position(&self, v: VertexId) -> Point3d {
        self.vertices[v].position
    }

    /// Any edge connecting `a` and `b`, in either direction.
    pub fn find_edge(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.edges
            .iter()
            .find(|(_, e)| (e.start == a && e.end == b) || (e.start == b && e.end == a))
            .map(|(id, _)| id)
    }

    /// Vertex at which `side` enters `edge`.
    pub fn start_vertex(&self, edge: EdgeId, side: SideId) -> VertexId {
        let e = &self.edges[edge];
        if e.right == Some(side) { e.start } else { e.end }
    }

    /// Vertex at which `side` leaves `edge`.
    pub fn end_vertex(&self, edge: EdgeId, side: SideId) -> VertexId {
        let e = &self.edges[edge];
        if e.right == Some(side) { e.end } else { e.start }
    }

    pub fn edge_length(&self, edge: EdgeId) -> f64 {
        let e = &self.edges[edge];
        self.position(e.start).distance_to(&self.position(e.end))
    }

    pub fn side_positions(&self, side: SideId) -> Vec<Point3d> {
        self.sides[side]
            .vertices
            .iter()
            .map(|&v| self.position(v))
            .collect()
    }

    /// Creates a side walking `vertices` in order. Existing edges between
    /// consecutive vertices are reused, missing ones are created.
    pub fn link_side(&mut self, vertices: &[VertexId], plane: Plane, face: Option<FaceUid>) -> SideId {
        let side = self.sides.insert(Side {
            vertices: vertices.to_vec(),
            edges: Vec::with_capacity(vertices.len()),
            plane,
            face,
            mark: SideMark::Unknown,
        });
        let n = vertices.len();
        for i in 0..n {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            let edge = match self.find_edge(a, b) {
                Some(id) => {
                    let e = &mut self.edges[id];
                    if e.start == a {
                        e.right = Some(side);
                    } else {
                        e.left = Some(side);
                    }
                    id
                }
                None => {
                    let id = self.add_edge(a, b);
                    self.edges[id].right = Some(side);
                    id
                }
            };
            self.sides[side].edges.push(edge);
        }
        side
    }

    /// Recomputes `side.vertices` from its edge list.
    pub fn update_side_vertices(&mut self, side: SideId) {
        let vertices: Vec<VertexId> = self.sides[side]
            .edges
            .iter()
            .map(|&e| self.start_vertex(e, side))
            .collect();
        self.sides[side].vertices = vertices;
    }

    /// Replaces the run of edges strictly between `i1` and `i2` (cyclically)
    /// with `new_edge`, which must already reference `side`. The resulting
    /// loop is `[e_i2 .. e_i1, new_edge]`.
    pub fn replace_edges(&mut self, side: SideId, i1: usize, i2: usize, new_edge: EdgeId) -> Vec<EdgeId> {
        let old = self.sides[side].edges.clone();
        let n = old.len();
        let mut kept = Vec::with_capacity(n);
        let mut removed = Vec::new();
        let mut j = i2;
        loop {
            kept.push(old[j]);
            if j == i1 {
                break;
            }
            j = (j + 1) % n;
        }
        let mut j = (i1 + 1) % n;
        while j != i2 {
            removed.push(old[j]);
            j = (j + 1) % n;
        }
        kept.push(new_edge);
        self.sides[side].edges = kept;
        self.update_side_vertices(side);
        removed
    }

    /// Rotates the loop of `side` so that index `offset` becomes index 0.
    pub fn shift(&mut self, side: SideId, offset: usize) {
        let s = &mut self.sides[side];
        let n = s.edges.len();
        if n == 0 {
            return;
        }
        let offset = offset % n;
        s.edges.rotate_left(offset);
        s.vertices.rotate_left(offset);
    }

    pub fn flip_edge(&mut self, edge: EdgeId) {
        self.edges[edge].flip();
    }

    /// Removes `side` and clears every edge reference to it.
    pub fn remove_side(&mut self, side: SideId) -> Option<Side> {
        let removed = self.sides.remove(side)?;
        for &e in &removed.edges {
            if let Some(edge) = self.edges.get_mut(e) {
                if edge.left == Some(side) {
                    edge.left = None;
                }
                if edge.right == Some(side) {
                    edge.right = None;
                }
            }
        }
        Some(removed)
    }

    /// Points whichever slot of `edge` refers to `from` at `to` instead.
    pub fn retarget_edge(&mut self, edge: EdgeId, from: SideId, to: SideId) {
        let e = &mut self.edges[edge];
        if e.left == Some(from) {
            e.left = Some(to);
        }
        if e.right == Some(from) {
            e.right = Some(to);
        }
    }

    /// Edges incident to `v`.
    pub fn vertex_edges(&self, v: VertexId) -> Vec<EdgeId> {
        self.edges
            .iter()
            .filter(|(_, e)| e.has_vertex(v))
            .map(|(id, _)| id)
            .collect()
    }

    /// Sides around `v` as a fan: the successor of a side is the side
    /// across the edge along which it enters `v`. Stops early if the fan
    /// is open.
    pub fn incident_sides(&self, v: VertexId) -> Vec<SideId> {
        let Some(first) = self
            .sides
            .iter()
            .find(|(_, s)| s.vertices.contains(&v))
            .map(|(id, _)| id)
        else {
            return Vec::new();
        };

        let mut fan = vec![first];
        let mut current = first;
        for _ in 0..self.sides.len() {
            let s = &self.sides[current];
            let Some(i) = s.index_of_vertex(v) else {
                break;
            };
            let n = s.edges.len();
            let entering = s.edges[(i + n - 1) % n];
            match self.edges[entering].other_side(current) {
                Some(next) if next == first => break,
                Some(next) => {
                    fan.push(next);
                    current = next;
                }
                None => break,
            }
        }
        fan
    }

    /// Outward plane of a side from its current vertex positions.
    pub fn compute_plane(&self, side: SideId) -> Option<Plane> {
        Plane::from_loop(&self.side_positions(side))
    }

    /// Recomputes the plane of `side`. Returns false if the loop is
    /// degenerate, in which case the stored plane is left alone.
    pub fn refresh_plane(&mut self, side: SideId) -> bool {
        match self.compute_plane(side) {
            Some(plane) => {
                self.sides[side].plane = plane;
                true
            }
            None => false,
        }
    }

    pub fn reset_marks(&mut self) {
        for (_, v) in self.vertices.iter_mut() {
            v.mark = VertexMark::Unknown;
        }
        for (_, e) in self.edges.iter_mut() {
            e.mark = EdgeMark::Unknown;
        }
        for (_, s) in self.sides.iter_mut() {
            s.mark = SideMark::Unknown;
        }
    }

    /// Reverses the winding of every side. Used after mirroring.
    pub fn reverse_orientation(&mut self) {
        for (_, e) in self.edges.iter_mut() {
            std::mem::swap(&mut e.left, &mut e.right);
        }
        let ids: Vec<SideId> = self.sides.keys().collect();
        for id in ids {
            self.sides[id].edges.reverse();
            self.update_side_vertices(id);
        }
    }

    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.vertices.keys().collect()
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.keys().collect()
    }

    pub fn side_ids(&self) -> Vec<SideId> {
        self.sides.keys().collect()
    }
}
