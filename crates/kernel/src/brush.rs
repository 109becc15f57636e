//! Brushes: a convex polyhedron plus the textured faces that bound it.
//!
//! Every side of the geometry is tagged with the `FaceUid` of the face it
//! belongs to. Structural edits can split, merge or remove sides, so after
//! each edit the face list is re-synchronised with the sides: faces whose
//! plane survived follow their side, new sides get new faces (attributes
//! copied from the face they came from, or the one with the closest
//! normal), and faces left without a side are dropped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::geometry::plane::Plane;
use crate::geometry::point::Point3d;
use crate::geometry::transform::{Axis, BoundingBox, Rotation, Transform};
use crate::geometry::vector::Vec3;
use crate::polyhedron::{
    CutResult, DragResult, FaceAddition, FaceView, HandleKind, MergePolicy, MultiDragResult, Polyhedron,
};
use crate::topology::mesh::FaceUid;
use crate::KernelError;

// ─── Identity ────────────────────────────────────────────────────────────────

/// Monotonic source of face ids. Owned by the caller and passed to every
/// operation that may create faces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdGenerator {
    next: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> FaceUid {
        let id = FaceUid(self.next);
        self.next += 1;
        id
    }
}

// ─── Faces ───────────────────────────────────────────────────────────────────

/// Texture mapping of a face. Opaque to the kernel; only copied around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureAttributes {
    pub texture: String,
    pub offset: [f64; 2],
    pub rotation: f64,
    pub scale: [f64; 2],
}

impl Default for TextureAttributes {
    fn default() -> Self {
        Self {
            texture: String::new(),
            offset: [0.0, 0.0],
            rotation: 0.0,
            scale: [1.0, 1.0],
        }
    }
}

impl TextureAttributes {
    pub fn named(texture: impl Into<String>) -> Self {
        Self {
            texture: texture.into(),
            ..Self::default()
        }
    }
}

/// A bounding half-space of a brush, given by three points wound
/// clockwise when seen from outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushFace {
    pub id: FaceUid,
    pub points: [Point3d; 3],
    pub plane: Plane,
    pub attributes: TextureAttributes,
}

impl BrushFace {
    pub fn new(id: FaceUid, points: [Point3d; 3], attributes: TextureAttributes) -> Result<Self, KernelError> {
        let plane = Plane::from_points(&points[0], &points[1], &points[2]).ok_or(KernelError::DegeneratePlane)?;
        Ok(Self {
            id,
            points,
            plane,
            attributes,
        })
    }

    fn from_side(id: FaceUid, view: &FaceView, attributes: TextureAttributes) -> Self {
        Self {
            id,
            points: loop_points(&view.vertices),
            plane: view.plane,
            attributes,
        }
    }

    /// Moves the face onto the current geometry of `view`.
    fn follow(&mut self, view: &FaceView) {
        self.points = loop_points(&view.vertices);
        self.plane = view.plane;
    }
}

fn loop_points(vertices: &[Point3d]) -> [Point3d; 3] {
    std::array::from_fn(|i| vertices.get(i).copied().unwrap_or(Point3d::ORIGIN))
}

fn closest_face<'a>(faces: &'a [BrushFace], normal: &Vec3) -> Option<&'a BrushFace> {
    faces
        .iter()
        .max_by(|a, b| a.plane.normal.dot(normal).total_cmp(&b.plane.normal.dot(normal)))
}

// ─── Brush ───────────────────────────────────────────────────────────────────

/// Face bookkeeping caused by a brush edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrushEdit {
    pub drag: DragResult,
    pub new_faces: Vec<FaceUid>,
    pub dropped_faces: Vec<FaceUid>,
}

/// Face bookkeeping caused by moving several elements at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrushMultiEdit {
    pub drag: MultiDragResult,
    pub new_faces: Vec<FaceUid>,
    pub dropped_faces: Vec<FaceUid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brush {
    faces: Vec<BrushFace>,
    geometry: Polyhedron,
}

impl Brush {
    /// Intersects the half-spaces of `faces` inside `world_bounds`. Faces
    /// that do not cut are discarded, even when they lie on a side of the
    /// world box; sides left over from the world box get new faces.
    #[instrument(skip(faces, ids), fields(count = faces.len()))]
    pub fn from_faces(
        world_bounds: &BoundingBox,
        faces: Vec<BrushFace>,
        ids: &mut IdGenerator,
    ) -> Result<Self, KernelError> {
        let mut geometry = Polyhedron::from_bounding_box(world_bounds);
        let mut kept: Vec<BrushFace> = Vec::with_capacity(faces.len());
        for face in faces {
            let addition = geometry.add_face(&face.plane, face.id);
            match addition.result {
                CutResult::Null => return Err(KernelError::EmptyBrush),
                CutResult::Redundant => debug!(face = ?face.id, "face does not cut the brush"),
                CutResult::Split => {
                    kept.retain(|f| !addition.dropped.contains(&f.id));
                    kept.push(face);
                }
            }
        }
        let mut brush = Self { faces: kept, geometry };
        brush.sync_faces(ids);
        info!(faces = brush.faces.len(), "brush built");
        Ok(brush)
    }

    /// Axis-aligned box with the same attributes on every face.
    pub fn cuboid(bounds: &BoundingBox, attributes: TextureAttributes, ids: &mut IdGenerator) -> Self {
        let mut geometry = Polyhedron::from_bounding_box(bounds);
        let mut faces = Vec::new();
        for view in geometry.faces() {
            let id = ids.next_id();
            geometry.set_side_face(view.side, Some(id));
            faces.push(BrushFace::from_side(id, &view, attributes.clone()));
        }
        Self { faces, geometry }
    }

    pub fn faces(&self) -> &[BrushFace] {
        &self.faces
    }

    pub fn face(&self, id: FaceUid) -> Option<&BrushFace> {
        self.faces.iter().find(|f| f.id == id)
    }

    pub fn geometry(&self) -> &Polyhedron {
        &self.geometry
    }

    /// Handle of the side carrying `face`.
    pub fn face_handle(&self, face: FaceUid) -> Option<usize> {
        self.geometry
            .side_of_face(face)
            .and_then(|side| self.geometry.side_handle(side))
    }

    // ─── Edits ───────────────────────────────────────────────────────────────

    /// Cuts the brush with `face`. `Null` leaves the brush unchanged.
    #[instrument(skip(self, face, ids), fields(uid = ?face.id))]
    pub fn add_face(&mut self, face: BrushFace, ids: &mut IdGenerator) -> FaceAddition {
        let addition = self.geometry.add_face(&face.plane, face.id);
        if addition.result != CutResult::Split {
            return addition;
        }
        self.faces.push(face);
        let (_, dropped) = self.sync_faces(ids);
        FaceAddition {
            result: addition.result,
            dropped,
        }
    }

    pub fn move_handle(
        &mut self,
        handle: usize,
        delta: Vec3,
        policy: MergePolicy,
        ids: &mut IdGenerator,
    ) -> Result<BrushEdit, KernelError> {
        let drag = self.geometry.move_handle(handle, delta, policy)?;
        Ok(self.after_drag(drag, ids))
    }

    pub fn move_vertex(
        &mut self,
        handle: usize,
        delta: Vec3,
        policy: MergePolicy,
        ids: &mut IdGenerator,
    ) -> Result<BrushEdit, KernelError> {
        let drag = self.geometry.move_vertex(handle, delta, policy)?;
        Ok(self.after_drag(drag, ids))
    }

    pub fn move_edge(
        &mut self,
        handle: usize,
        delta: Vec3,
        policy: MergePolicy,
        ids: &mut IdGenerator,
    ) -> Result<BrushEdit, KernelError> {
        let drag = self.geometry.move_edge(handle, delta, policy)?;
        Ok(self.after_drag(drag, ids))
    }

    pub fn move_face(
        &mut self,
        handle: usize,
        delta: Vec3,
        policy: MergePolicy,
        ids: &mut IdGenerator,
    ) -> Result<BrushEdit, KernelError> {
        let drag = self.geometry.move_face(handle, delta, policy)?;
        Ok(self.after_drag(drag, ids))
    }

    pub fn move_vertices(
        &mut self,
        handles: &[usize],
        delta: Vec3,
        policy: MergePolicy,
        ids: &mut IdGenerator,
    ) -> Result<BrushMultiEdit, KernelError> {
        let drag = self.geometry.move_vertices(handles, delta, policy)?;
        Ok(self.after_multi_drag(drag, ids))
    }

    pub fn move_edges(&mut self, handles: &[usize], delta: Vec3, ids: &mut IdGenerator) -> Result<BrushMultiEdit, KernelError> {
        let drag = self.geometry.move_edges(handles, delta)?;
        Ok(self.after_multi_drag(drag, ids))
    }

    /// Translates whole faces. The moved faces keep their ids and
    /// attributes.
    pub fn move_faces(&mut self, handles: &[usize], delta: Vec3, ids: &mut IdGenerator) -> Result<BrushMultiEdit, KernelError> {
        let drag = self.geometry.move_faces(handles, delta)?;
        if drag.moved {
            self.carry_faces(&drag.handles);
        }
        Ok(self.after_multi_drag(drag, ids))
    }

    fn after_drag(&mut self, drag: DragResult, ids: &mut IdGenerator) -> BrushEdit {
        let (new_faces, dropped_faces) = self.resync(drag.moved, ids);
        BrushEdit {
            drag,
            new_faces,
            dropped_faces,
        }
    }

    fn after_multi_drag(&mut self, drag: MultiDragResult, ids: &mut IdGenerator) -> BrushMultiEdit {
        let (new_faces, dropped_faces) = self.resync(drag.moved, ids);
        BrushMultiEdit {
            drag,
            new_faces,
            dropped_faces,
        }
    }

    fn resync(&mut self, moved: bool, ids: &mut IdGenerator) -> (Vec<FaceUid>, Vec<FaceUid>) {
        if !moved {
            return (Vec::new(), Vec::new());
        }
        let (new_faces, dropped_faces) = self.sync_faces(ids);
        debug!(new = new_faces.len(), dropped = dropped_faces.len(), "faces re-synchronised");
        (new_faces, dropped_faces)
    }

    /// Puts the faces of the sides at `handles` onto their new planes, so
    /// that the following sync keeps them.
    fn carry_faces(&mut self, handles: &[usize]) {
        let views = self.geometry.faces();
        for &handle in handles {
            let Ok((HandleKind::Side, i)) = self.geometry.handle_kind(handle) else { continue };
            let Some(view) = views.get(i) else { continue };
            let Some(uid) = view.face else { continue };
            if let Some(face) = self.faces.iter_mut().find(|f| f.id == uid) {
                face.follow(view);
            }
        }
    }

    pub fn translate(&mut self, delta: &Vec3) {
        self.geometry.translate(delta);
        self.refresh_faces();
    }

    pub fn rotate90_cw(&mut self, axis: Axis, center: &Point3d) {
        self.geometry.rotate90_cw(axis, center);
        self.refresh_faces();
    }

    pub fn rotate90_ccw(&mut self, axis: Axis, center: &Point3d) {
        self.geometry.rotate90_ccw(axis, center);
        self.refresh_faces();
    }

    pub fn rotate(&mut self, rotation: &Rotation, center: &Point3d) {
        self.geometry.rotate(rotation, center);
        self.refresh_faces();
    }

    pub fn flip(&mut self, axis: Axis, center: &Point3d) {
        self.geometry.flip(axis, center);
        self.refresh_faces();
    }

    pub fn transform(&mut self, transform: &Transform) {
        self.geometry.transform(transform);
        self.refresh_faces();
    }

    /// Snaps the geometry to the integer grid. Faces whose sides were
    /// merged away are dropped and returned.
    pub fn snap(&mut self) -> Vec<FaceUid> {
        let dropped = self.geometry.snap();
        self.faces.retain(|f| !dropped.contains(&f.id));
        self.refresh_faces();
        dropped
    }

    /// Fragment brushes covering `self` minus `tool`. Fragment faces take
    /// their attributes from the face of either brush they lie on.
    #[instrument(skip_all)]
    pub fn subtract(&self, tool: &Brush, ids: &mut IdGenerator) -> Vec<Brush> {
        self.geometry
            .subtract(&tool.geometry)
            .into_iter()
            .map(|mut fragment| {
                let mut faces = Vec::new();
                for view in fragment.faces() {
                    let template = view
                        .face
                        .and_then(|uid| self.face(uid).or_else(|| tool.face(uid)))
                        .or_else(|| closest_face(&self.faces, &view.plane.normal));
                    let id = ids.next_id();
                    fragment.set_side_face(view.side, Some(id));
                    let attributes = template.map(|f| f.attributes.clone()).unwrap_or_default();
                    faces.push(BrushFace::from_side(id, &view, attributes));
                }
                Brush {
                    faces,
                    geometry: fragment,
                }
            })
            .collect()
    }

    // ─── Snapshots ───────────────────────────────────────────────────────────

    pub fn to_snapshot(&self) -> Result<String, KernelError> {
        serde_json::to_string(self).map_err(KernelError::Snapshot)
    }

    pub fn from_snapshot(json: &str) -> Result<Self, KernelError> {
        serde_json::from_str(json).map_err(KernelError::Snapshot)
    }

    // ─── Face bookkeeping ────────────────────────────────────────────────────

    /// Rebuilds the face list from the sides. Returns the created and the
    /// dropped face ids.
    fn sync_faces(&mut self, ids: &mut IdGenerator) -> (Vec<FaceUid>, Vec<FaceUid>) {
        let eps = self.geometry.tolerance().point_status;
        let views = self.geometry.faces();
        let old = std::mem::take(&mut self.faces);
        let mut claimed: HashSet<FaceUid> = HashSet::new();
        let mut slots: Vec<Option<BrushFace>> = vec![None; views.len()];
        let mut new_faces = Vec::new();

        // Sides still lying on the plane of their own face keep it.
        for (slot, view) in slots.iter_mut().zip(&views) {
            let own = view
                .face
                .and_then(|uid| old.iter().find(|f| f.id == uid))
                .filter(|f| !claimed.contains(&f.id) && f.plane.almost_eq(&view.plane, eps));
            if let Some(face) = own {
                claimed.insert(face.id);
                let mut face = face.clone();
                face.follow(view);
                *slot = Some(face);
            }
        }

        // The rest adopt an unclaimed coplanar face or get a new one.
        for (slot, view) in slots.iter_mut().zip(&views) {
            if slot.is_some() {
                continue;
            }
            let coplanar = old
                .iter()
                .find(|f| !claimed.contains(&f.id) && f.plane.almost_eq(&view.plane, eps));
            let face = match coplanar {
                Some(face) => {
                    claimed.insert(face.id);
                    let mut face = face.clone();
                    face.follow(view);
                    face
                }
                None => {
                    let template = view
                        .face
                        .and_then(|uid| old.iter().find(|f| f.id == uid))
                        .or_else(|| closest_face(&old, &view.plane.normal));
                    let attributes = template.map(|f| f.attributes.clone()).unwrap_or_default();
                    let id = ids.next_id();
                    new_faces.push(id);
                    BrushFace::from_side(id, view, attributes)
                }
            };
            self.geometry.set_side_face(view.side, Some(face.id));
            *slot = Some(face);
        }

        let dropped: Vec<FaceUid> = old.iter().map(|f| f.id).filter(|id| !claimed.contains(id)).collect();
        self.faces = slots.into_iter().flatten().collect();
        (new_faces, dropped)
    }

    /// Moves every face onto its side after a rigid or affine transform.
    fn refresh_faces(&mut self) {
        for view in self.geometry.faces() {
            let Some(uid) = view.face else { continue };
            if let Some(face) = self.faces.iter_mut().find(|f| f.id == uid) {
                face.follow(&view);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::plane::PointStatus;
    use crate::topology::audit::AuditConfig;

    fn world() -> BoundingBox {
        BoundingBox::new(Point3d::new(-64.0, -64.0, -64.0), Point3d::new(64.0, 64.0, 64.0))
    }

    fn cube_brush(half: f64, texture: &str, ids: &mut IdGenerator) -> Brush {
        Brush::cuboid(
            &BoundingBox::new(Point3d::new(-half, -half, -half), Point3d::new(half, half, half)),
            TextureAttributes::named(texture),
            ids,
        )
    }

    fn top_face(brush: &Brush) -> FaceUid {
        brush
            .faces()
            .iter()
            .find(|f| f.plane.normal == Vec3::Z)
            .map(|f| f.id)
            .unwrap()
    }

    /// Every side has exactly one face and every face lies on its side.
    fn assert_consistent(brush: &Brush) {
        let views = brush.geometry().faces();
        assert_eq!(views.len(), brush.faces().len());
        let mut seen = HashSet::new();
        for view in &views {
            let uid = view.face.unwrap();
            assert!(seen.insert(uid), "face {uid:?} on two sides");
            let face = brush.face(uid).unwrap();
            for p in &face.points {
                assert_eq!(view.plane.point_status(p, 1e-6), PointStatus::Inside);
            }
            assert!(face.plane.almost_eq(&view.plane, 1e-9));
        }
        let audit = brush.geometry().audit(&AuditConfig::full());
        assert!(audit.all_valid(), "{:?}", audit.errors);
    }

    #[test]
    fn test_id_generator_is_monotonic() {
        let mut ids = IdGenerator::starting_at(10);
        assert_eq!(ids.next_id(), FaceUid(10));
        assert_eq!(ids.next_id(), FaceUid(11));
        assert_eq!(IdGenerator::new().next_id(), FaceUid(1));
    }

    #[test]
    fn test_face_from_collinear_points_is_rejected() {
        let result = BrushFace::new(
            FaceUid(1),
            [Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0), Point3d::new(2.0, 2.0, 2.0)],
            TextureAttributes::default(),
        );
        assert!(matches!(result, Err(KernelError::DegeneratePlane)));
    }

    #[test]
    fn test_cuboid() {
        let mut ids = IdGenerator::new();
        let brush = cube_brush(8.0, "stone", &mut ids);
        assert_eq!(brush.faces().len(), 6);
        assert_consistent(&brush);
        assert_eq!(ids.next_id(), FaceUid(7));
    }

    #[test]
    fn test_from_faces_builds_tetrahedron() {
        let mut ids = IdGenerator::new();
        let hull = Polyhedron::from_points(&[
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(8.0, 0.0, 0.0),
            Point3d::new(0.0, 8.0, 0.0),
            Point3d::new(0.0, 0.0, 8.0),
        ]);
        let faces: Vec<BrushFace> = hull
            .faces()
            .iter()
            .map(|view| {
                let [a, b, c] = loop_points(&view.vertices);
                BrushFace::new(ids.next_id(), [a, b, c], TextureAttributes::named("rock")).unwrap()
            })
            .collect();
        let brush = Brush::from_faces(&world(), faces, &mut ids).unwrap();
        assert_eq!(brush.geometry().mesh().counts(), (4, 6, 4));
        assert_eq!(brush.faces().len(), 4);
        assert!(brush.faces().iter().all(|f| f.id.0 <= 4));
        assert_consistent(&brush);
    }

    #[test]
    fn test_from_faces_fills_open_sides_from_world_bounds() {
        let mut ids = IdGenerator::new();
        let floor = BrushFace::new(
            ids.next_id(),
            [Point3d::ORIGIN, Point3d::new(0.0, 1.0, 0.0), Point3d::new(1.0, 0.0, 0.0)],
            TextureAttributes::named("floor"),
        )
        .unwrap();
        assert_eq!(floor.plane.normal, Vec3::Z);
        let brush = Brush::from_faces(&world(), vec![floor], &mut ids).unwrap();
        assert_eq!(brush.faces().len(), 6);
        assert!(brush.faces().iter().all(|f| f.attributes.texture == "floor"));
        assert!((brush.geometry().bounds().max.z).abs() < 1e-9);
        assert_consistent(&brush);
    }

    #[test]
    fn test_from_faces_without_volume_fails() {
        let mut ids = IdGenerator::new();
        let below = BrushFace::new(
            ids.next_id(),
            [
                Point3d::new(0.0, 0.0, -10.0),
                Point3d::new(0.0, 1.0, -10.0),
                Point3d::new(1.0, 0.0, -10.0),
            ],
            TextureAttributes::default(),
        )
        .unwrap();
        let above = BrushFace::new(
            ids.next_id(),
            [
                Point3d::new(0.0, 0.0, 10.0),
                Point3d::new(1.0, 0.0, 10.0),
                Point3d::new(0.0, 1.0, 10.0),
            ],
            TextureAttributes::default(),
        )
        .unwrap();
        assert_eq!(above.plane.normal, -Vec3::Z);
        let result = Brush::from_faces(&world(), vec![below, above], &mut ids);
        assert!(matches!(result, Err(KernelError::EmptyBrush)));
    }

    #[test]
    fn test_from_faces_discards_redundant_face() {
        // The first face coincides with the top of the world box and cuts
        // nothing; the top side gets a face of its own.
        let mut ids = IdGenerator::new();
        let ceiling = BrushFace::new(
            ids.next_id(),
            [
                Point3d::new(0.0, 0.0, 64.0),
                Point3d::new(0.0, 1.0, 64.0),
                Point3d::new(1.0, 0.0, 64.0),
            ],
            TextureAttributes::named("sky"),
        )
        .unwrap();
        let east = BrushFace::new(
            ids.next_id(),
            [
                Point3d::new(8.0, 0.0, 0.0),
                Point3d::new(8.0, 0.0, 1.0),
                Point3d::new(8.0, 1.0, 0.0),
            ],
            TextureAttributes::named("wall"),
        )
        .unwrap();
        let (ceiling_id, east_id) = (ceiling.id, east.id);
        let brush = Brush::from_faces(&world(), vec![ceiling, east], &mut ids).unwrap();
        assert!(brush.face(ceiling_id).is_none());
        assert!(brush.face(east_id).is_some());
        assert_eq!(brush.faces().len(), 6);
        assert!(brush.faces().iter().all(|f| f.attributes.texture != "sky"));
        assert_consistent(&brush);
    }

    #[test]
    fn test_add_face_drops_covered_face() {
        let mut ids = IdGenerator::new();
        let mut brush = cube_brush(8.0, "stone", &mut ids);
        let east = brush.faces().iter().find(|f| f.plane.normal == Vec3::X).unwrap().id;
        let cut = BrushFace::new(
            ids.next_id(),
            [
                Point3d::new(4.0, 0.0, 0.0),
                Point3d::new(4.0, 0.0, 1.0),
                Point3d::new(4.0, 1.0, 0.0),
            ],
            TextureAttributes::named("cut"),
        )
        .unwrap();
        let cut_id = cut.id;
        let addition = brush.add_face(cut, &mut ids);
        assert_eq!(addition.result, CutResult::Split);
        assert_eq!(addition.dropped, vec![east]);
        assert!(brush.face(east).is_none());
        assert_eq!(brush.face(cut_id).unwrap().attributes.texture, "cut");
        assert_eq!(brush.faces().len(), 6);
        assert_consistent(&brush);
    }

    #[test]
    fn test_face_drag_replaces_face_with_pyramid() {
        let mut ids = IdGenerator::new();
        let mut brush = cube_brush(8.0, "stone", &mut ids);
        let top = top_face(&brush);
        brush.faces.iter_mut().find(|f| f.id == top).unwrap().attributes = TextureAttributes::named("roof");

        let handle = brush.face_handle(top).unwrap();
        let edit = brush
            .move_face(handle, Vec3::new(0.0, 0.0, 4.0), MergePolicy::Merge, &mut ids)
            .unwrap();
        assert!(edit.drag.moved);
        assert_eq!(edit.dropped_faces, vec![top]);
        assert_eq!(edit.new_faces.len(), 4);
        for id in &edit.new_faces {
            assert_eq!(brush.face(*id).unwrap().attributes.texture, "roof");
        }
        assert_eq!(brush.faces().len(), 9);
        assert_consistent(&brush);
    }

    #[test]
    fn test_vertex_drag_keeps_flat_faces() {
        let mut ids = IdGenerator::new();
        let mut brush = cube_brush(8.0, "stone", &mut ids);
        let before: Vec<FaceUid> = brush.faces().iter().map(|f| f.id).collect();
        let top = top_face(&brush);
        let handle = brush
            .geometry()
            .vertices()
            .iter()
            .position(|p| *p == Point3d::new(8.0, 8.0, 8.0))
            .unwrap();
        let edit = brush
            .move_vertex(handle, Vec3::new(0.0, 0.0, 4.0), MergePolicy::Merge, &mut ids)
            .unwrap();
        assert!(edit.drag.moved);
        assert_eq!(edit.dropped_faces, vec![top]);
        assert_eq!(edit.new_faces.len(), 2);
        for id in before.iter().filter(|&&id| id != top) {
            assert!(brush.face(*id).is_some());
        }
        assert_consistent(&brush);
    }

    #[test]
    fn test_refused_drag_leaves_faces_alone() {
        let mut ids = IdGenerator::new();
        let mut brush = cube_brush(8.0, "stone", &mut ids);
        let faces = brush.faces().to_vec();
        let handle = brush.face_handle(top_face(&brush)).unwrap();
        let edit = brush
            .move_face(handle, Vec3::new(0.0, 0.0, -4.0), MergePolicy::Merge, &mut ids)
            .unwrap();
        assert!(!edit.drag.moved);
        assert!(edit.new_faces.is_empty() && edit.dropped_faces.is_empty());
        assert_eq!(brush.faces(), faces.as_slice());
    }

    #[test]
    fn test_rigid_face_move_keeps_face_ids() {
        let mut ids = IdGenerator::new();
        let mut brush = cube_brush(8.0, "stone", &mut ids);
        let before: Vec<FaceUid> = brush.faces().iter().map(|f| f.id).collect();
        let top = top_face(&brush);
        let handle = brush.face_handle(top).unwrap();

        let edit = brush.move_faces(&[handle], Vec3::new(0.0, 0.0, 4.0), &mut ids).unwrap();
        assert!(edit.drag.moved);
        assert!(edit.new_faces.is_empty() && edit.dropped_faces.is_empty());
        assert_eq!(brush.face_handle(top), Some(edit.drag.handles[0]));
        assert!(brush.face(top).unwrap().points.iter().all(|p| p.z == 12.0));
        let after: Vec<FaceUid> = brush.faces().iter().map(|f| f.id).collect();
        assert_eq!(after.len(), 6);
        assert!(before.iter().all(|id| after.contains(id)));
        assert_consistent(&brush);
    }

    #[test]
    fn test_rigid_edge_move_replaces_tilted_faces() {
        let mut ids = IdGenerator::new();
        let mut brush = cube_brush(8.0, "stone", &mut ids);
        let top = top_face(&brush);
        let east = brush.faces().iter().find(|f| f.plane.normal == Vec3::X).unwrap().id;
        let handle = brush
            .geometry()
            .edges()
            .iter()
            .position(|(a, b)| a.x == 8.0 && b.x == 8.0 && a.z == 8.0 && b.z == 8.0)
            .map(|i| i + brush.geometry().vertex_count())
            .unwrap();

        let edit = brush.move_edges(&[handle], Vec3::new(2.0, 0.0, 2.0), &mut ids).unwrap();
        assert!(edit.drag.moved);
        assert_eq!(edit.new_faces.len(), 2);
        let mut dropped = edit.dropped_faces.clone();
        dropped.sort();
        let mut expected = vec![top, east];
        expected.sort();
        assert_eq!(dropped, expected);
        assert_eq!(brush.faces().len(), 6);
        assert_consistent(&brush);
    }

    #[test]
    fn test_refused_vertex_move_leaves_faces_alone() {
        let mut ids = IdGenerator::new();
        let mut brush = cube_brush(8.0, "stone", &mut ids);
        let faces = brush.faces().to_vec();
        let corners = brush.geometry().vertices();
        let handles = vec![
            corners.iter().position(|p| *p == Point3d::new(8.0, 8.0, 8.0)).unwrap(),
            corners.iter().position(|p| *p == Point3d::new(-8.0, 8.0, 8.0)).unwrap(),
        ];
        // Both corners would land on the corners across the top.
        let edit = brush
            .move_vertices(&handles, Vec3::new(0.0, -16.0, 0.0), MergePolicy::Reject, &mut ids)
            .unwrap();
        assert!(!edit.drag.moved);
        assert_eq!(edit.drag.handles, handles);
        assert!(edit.new_faces.is_empty() && edit.dropped_faces.is_empty());
        assert_eq!(brush.faces(), faces.as_slice());
    }

    #[test]
    fn test_transforms_move_faces_along() {
        let mut ids = IdGenerator::new();
        let mut brush = cube_brush(8.0, "stone", &mut ids);
        let ids_before: Vec<FaceUid> = brush.faces().iter().map(|f| f.id).collect();

        brush.translate(&Vec3::new(8.0, 0.0, 0.0));
        assert_consistent(&brush);
        brush.rotate90_cw(Axis::Z, &Point3d::ORIGIN);
        assert_consistent(&brush);
        brush.flip(Axis::Y, &Point3d::ORIGIN);
        assert_consistent(&brush);
        brush.transform(&Transform::scaling(2.0, 1.0, 1.0));
        assert_consistent(&brush);

        let ids_after: Vec<FaceUid> = brush.faces().iter().map(|f| f.id).collect();
        assert_eq!(ids_before, ids_after);
        let center = brush.geometry().center().unwrap();
        for face in brush.faces() {
            assert_eq!(face.plane.point_status(&center, 1e-9), PointStatus::Below);
        }
    }

    #[test]
    fn test_subtract_produces_textured_fragments() {
        let mut ids = IdGenerator::new();
        let outer = cube_brush(32.0, "stone", &mut ids);
        let inner = cube_brush(16.0, "tool", &mut ids);
        let fragments = outer.subtract(&inner, &mut ids);
        assert_eq!(fragments.len(), 6);

        let mut all_ids = HashSet::new();
        for fragment in &fragments {
            assert_consistent(fragment);
            assert!(fragment.faces().iter().any(|f| f.attributes.texture == "tool"));
            assert!(fragment.faces().iter().any(|f| f.attributes.texture == "stone"));
            for face in fragment.faces() {
                assert!(all_ids.insert(face.id));
            }
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut ids = IdGenerator::new();
        let brush = cube_brush(8.0, "stone", &mut ids);
        let json = brush.to_snapshot().unwrap();
        let restored = Brush::from_snapshot(&json).unwrap();
        assert_eq!(restored.faces().len(), 6);
        for (a, b) in brush.faces().iter().zip(restored.faces()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.attributes, b.attributes);
        }
        for (a, b) in brush.geometry().vertices().iter().zip(restored.geometry().vertices()) {
            assert!(a.almost_eq(&b, 1e-12));
        }
        assert_consistent(&restored);

        assert!(matches!(Brush::from_snapshot("{"), Err(KernelError::Snapshot(_))));
    }
}
