//! Plane clipping. Everything above the plane is removed and the opening
//! is closed with a cap side carrying the plane.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::Polyhedron;
use crate::geometry::plane::{Plane, PointStatus};
use crate::geometry::point::Point3d;
use crate::topology::mesh::{EdgeId, EdgeMark, FaceUid, Side, SideId, SideMark, VertexMark};

/// Outcome of `Polyhedron::clip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipResult {
    /// Part of the solid was removed; the rest is still closed.
    Success,
    /// The plane does not cut the solid.
    Unchanged,
    /// The whole solid lies above the plane and was removed.
    Empty,
}

/// Outcome of `Polyhedron::add_face`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutResult {
    /// The face does not cut the solid; nothing changed.
    Redundant,
    /// The face would remove the whole solid; nothing changed.
    Null,
    /// The solid was cut and the face now bounds it.
    Split,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceAddition {
    pub result: CutResult,
    /// Faces whose sides were cut away entirely.
    pub dropped: Vec<FaceUid>,
}

impl Polyhedron {
    /// Removes the part of the polyhedron above `plane`.
    pub fn clip(&mut self, plane: &Plane) -> ClipResult {
        self.clip_tagged(plane, None)
    }

    /// Like `clip`, tagging the cap side with `face`.
    #[instrument(skip(self), fields(vertices = self.mesh.vertices.len()))]
    pub(crate) fn clip_tagged(&mut self, plane: &Plane, face: Option<FaceUid>) -> ClipResult {
        if self.is_empty() {
            return ClipResult::Empty;
        }
        let result = match self.cut(plane, face).result {
            CutResult::Split => ClipResult::Success,
            CutResult::Redundant => ClipResult::Unchanged,
            CutResult::Null => {
                self.mesh.clear();
                self.update_bounds();
                ClipResult::Empty
            }
        };
        debug!(?result, "clip complete");
        result
    }

    /// Cuts the polyhedron with the boundary plane of `face`. The cap side
    /// is tagged with `face`. A `Null` cut leaves the polyhedron untouched.
    #[instrument(skip(self, plane))]
    pub fn add_face(&mut self, plane: &Plane, face: FaceUid) -> FaceAddition {
        if self.is_empty() {
            return FaceAddition {
                result: CutResult::Null,
                dropped: Vec::new(),
            };
        }
        self.cut(plane, Some(face))
    }

    fn cut(&mut self, plane: &Plane, face: Option<FaceUid>) -> FaceAddition {
        if !self.is_polyhedron() {
            return self.cut_degenerate(plane);
        }

        let mut work = self.clone();
        let outcome = match work.cut_solid(plane, face) {
            Some(outcome) => outcome,
            None => {
                warn!("cap loop could not be closed; polyhedron left unchanged");
                return FaceAddition {
                    result: CutResult::Redundant,
                    dropped: Vec::new(),
                };
            }
        };
        if outcome.result == CutResult::Split {
            work.debug_check();
            *self = work;
            info!(
                vertices = self.mesh.vertices.len(),
                sides = self.mesh.sides.len(),
                dropped = outcome.dropped.len(),
                "polyhedron cut"
            );
        }
        outcome
    }

    /// Clips a point, edge or polygon by rebuilding the hull of what is
    /// left below the plane.
    fn cut_degenerate(&mut self, plane: &Plane) -> FaceAddition {
        let eps = self.tolerance.point_status;
        let status = |p: &Point3d| plane.point_status(p, eps);
        let positions = self.vertices();
        let below = positions.iter().filter(|p| status(p) == PointStatus::Below).count();
        let above = positions.iter().filter(|p| status(p) == PointStatus::Above).count();
        let result = if above == 0 {
            CutResult::Redundant
        } else if below == 0 {
            CutResult::Null
        } else {
            CutResult::Split
        };
        if result != CutResult::Split {
            return FaceAddition {
                result,
                dropped: Vec::new(),
            };
        }

        let mut kept: Vec<Point3d> = positions
            .iter()
            .filter(|p| status(p) != PointStatus::Above)
            .copied()
            .collect();
        for (a, b) in self.edges() {
            if matches!(
                (status(&a), status(&b)),
                (PointStatus::Above, PointStatus::Below) | (PointStatus::Below, PointStatus::Above)
            ) {
                if let Some(t) = plane.intersect_with_line(&a, &(b - a)) {
                    kept.push(a.lerp(&b, t).snapped(self.tolerance.almost_zero));
                }
            }
        }
        let old_faces: Vec<(Plane, Option<FaceUid>)> =
            self.mesh.sides.values().map(|s| (s.plane, s.face)).collect();

        let mut rebuilt = Polyhedron::new().with_tolerance(self.tolerance);
        rebuilt.add_points(&kept);
        for side in rebuilt.mesh.side_ids() {
            let normal = rebuilt.mesh.sides[side].plane.normal;
            let face = old_faces
                .iter()
                .find(|(p, _)| p.normal.dot(&normal) > 0.0)
                .and_then(|(_, f)| *f);
            rebuilt.set_side_face(side, face);
        }
        let dropped = old_faces
            .iter()
            .filter_map(|(_, f)| *f)
            .filter(|f| rebuilt.side_of_face(*f).is_none())
            .collect();
        *self = rebuilt;
        FaceAddition {
            result: CutResult::Split,
            dropped,
        }
    }

    /// The clip proper on a closed solid. Returns `None` if the cap seam
    /// does not form a single loop, leaving `self` in an unusable state.
    fn cut_solid(&mut self, plane: &Plane, face: Option<FaceUid>) -> Option<FaceAddition> {
        let eps = self.tolerance.point_status;

        // (1) vertices
        let (mut keep, mut drop) = (0usize, 0usize);
        for (_, v) in self.mesh.vertices.iter_mut() {
            v.mark = match plane.point_status(&v.position, eps) {
                PointStatus::Below => {
                    keep += 1;
                    VertexMark::Keep
                }
                PointStatus::Above => {
                    drop += 1;
                    VertexMark::Drop
                }
                PointStatus::Inside => VertexMark::Undecided,
            };
        }
        if drop == 0 || keep == 0 {
            self.mesh.reset_marks();
            let result = if drop == 0 { CutResult::Redundant } else { CutResult::Null };
            return Some(FaceAddition {
                result,
                dropped: Vec::new(),
            });
        }

        // (2) edges
        for edge in self.mesh.edge_ids() {
            let (start, end) = {
                let e = &self.mesh.edges[edge];
                (e.start, e.end)
            };
            let marks = (self.mesh.vertices[start].mark, self.mesh.vertices[end].mark);
            let mark = match marks {
                (VertexMark::Keep, VertexMark::Drop) | (VertexMark::Drop, VertexMark::Keep) => EdgeMark::Split,
                (VertexMark::Keep, _) | (_, VertexMark::Keep) => EdgeMark::Keep,
                (VertexMark::Drop, _) | (_, VertexMark::Drop) => EdgeMark::Drop,
                _ => EdgeMark::Undecided,
            };
            self.mesh.edges[edge].mark = mark;
            if mark == EdgeMark::Split {
                self.split_at_plane(edge, plane);
            }
        }

        // (3) sides
        let mut new_edges: Vec<EdgeId> = Vec::new();
        let mut dropped: Vec<FaceUid> = Vec::new();
        for side in self.mesh.side_ids() {
            match self.classify_side(side) {
                SideCut::Keep => self.mesh.sides[side].mark = SideMark::Keep,
                SideCut::Drop => self.mesh.sides[side].mark = SideMark::Drop,
                SideCut::Split { i1, i2 } => {
                    let from = self.mesh.end_vertex(self.mesh.sides[side].edges[i1], side);
                    let to = self.mesh.start_vertex(self.mesh.sides[side].edges[i2], side);
                    let bridge = self.mesh.add_edge(from, to);
                    self.mesh.edges[bridge].right = Some(side);
                    self.mesh.edges[bridge].mark = EdgeMark::New;
                    self.mesh.replace_edges(side, i1, i2, bridge);
                    self.mesh.sides[side].mark = SideMark::Split;
                    new_edges.push(bridge);
                }
            }
        }

        // Edges lying in the plane between a kept and a dropped side.
        for side in self.mesh.side_ids() {
            if self.mesh.sides[side].mark != SideMark::Keep {
                continue;
            }
            for e in self.mesh.sides[side].edges.clone() {
                if self.mesh.edges[e].mark != EdgeMark::Undecided {
                    continue;
                }
                let other = self.mesh.edges[e].other_side(side);
                if other.is_some_and(|o| self.mesh.sides[o].mark == SideMark::Drop) {
                    if self.mesh.edges[e].right != Some(side) {
                        self.mesh.flip_edge(e);
                    }
                    new_edges.push(e);
                }
            }
        }

        for side in self.mesh.side_ids() {
            if self.mesh.sides[side].mark == SideMark::Drop {
                if let Some(removed) = self.mesh.sides.remove(side) {
                    dropped.extend(removed.face);
                }
            }
        }

        // (4) cap
        let chain = self.chain_cap_edges(new_edges)?;
        let cap = self.mesh.sides.insert(Side {
            vertices: Vec::with_capacity(chain.len()),
            edges: chain.clone(),
            plane: *plane,
            face,
            mark: SideMark::New,
        });
        for &e in &chain {
            self.mesh.edges[e].left = Some(cap);
        }
        self.mesh.update_side_vertices(cap);

        // (5) purge
        self.mesh.edges.retain(|_, e| e.mark != EdgeMark::Drop);
        self.mesh.vertices.retain(|_, v| v.mark != VertexMark::Drop);
        self.mesh.reset_marks();

        // (6) bounds
        self.update_bounds();
        Some(FaceAddition {
            result: CutResult::Split,
            dropped,
        })
    }

    /// Moves the dropped endpoint of a split edge onto the plane.
    fn split_at_plane(&mut self, edge: EdgeId, plane: &Plane) {
        let (start, end) = {
            let e = &self.mesh.edges[edge];
            (e.start, e.end)
        };
        let a = self.mesh.position(start);
        let b = self.mesh.position(end);
        let Some(t) = plane.intersect_with_line(&a, &(b - a)) else {
            return;
        };
        let point = a.lerp(&b, t).snapped(self.tolerance.almost_zero);
        let v = self.mesh.add_vertex(point);
        self.mesh.vertices[v].mark = VertexMark::New;
        let start_dropped = self.mesh.vertices[start].mark == VertexMark::Drop;
        let e = &mut self.mesh.edges[edge];
        if start_dropped {
            e.start = v;
        } else {
            e.end = v;
        }
    }

    fn classify_side(&self, side: SideId) -> SideCut {
        let s = &self.mesh.sides[side];
        let n = s.len();
        let marks: Vec<EdgeMark> = s.edges.iter().map(|&e| self.mesh.edges[e].mark).collect();
        let count = |m: EdgeMark| marks.iter().filter(|&&x| x == m).count();
        let (keep, drop, split) = (count(EdgeMark::Keep), count(EdgeMark::Drop), count(EdgeMark::Split));

        if drop == 0 && split == 0 {
            return SideCut::Keep;
        }
        if keep == 0 && split == 0 {
            return SideCut::Drop;
        }

        let (mut i1, mut i2) = (None, None);
        for i in 0..n {
            let prev = marks[(i + n - 1) % n];
            match marks[i] {
                EdgeMark::Split => {
                    let start = self.mesh.start_vertex(s.edges[i], side);
                    if self.mesh.vertices[start].mark == VertexMark::Keep {
                        i1 = Some(i);
                    } else {
                        i2 = Some(i);
                    }
                }
                EdgeMark::Keep if prev == EdgeMark::Drop => i2 = Some(i),
                EdgeMark::Drop if prev == EdgeMark::Keep => i1 = Some((i + n - 1) % n),
                _ => {}
            }
        }
        match (i1, i2) {
            (Some(i1), Some(i2)) => SideCut::Split { i1, i2 },
            _ => {
                // Only reachable through numerical noise; keep the side intact.
                warn!(?side, "side has no clean crossing; kept");
                SideCut::Keep
            }
        }
    }

    /// Orders cap edges so that each one ends where the cap enters the
    /// previous one. The cap walks every edge from `end` to `start`.
    fn chain_cap_edges(&self, mut edges: Vec<EdgeId>) -> Option<Vec<EdgeId>> {
        if edges.len() < 3 {
            return None;
        }
        for i in 0..edges.len() - 1 {
            let start = self.mesh.edges[edges[i]].start;
            let j = (i + 1..edges.len()).find(|&j| self.mesh.edges[edges[j]].end == start)?;
            edges.swap(i + 1, j);
        }
        let first_end = self.mesh.edges[edges[0]].end;
        let last_start = self.mesh.edges[edges[edges.len() - 1]].start;
        (first_end == last_start).then_some(edges)
    }
}

enum SideCut {
    Keep,
    Drop,
    Split { i1: usize, i2: usize },
}
