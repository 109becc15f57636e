pub mod geometry;
pub mod topology;
pub mod polyhedron;
pub mod csg;
pub mod brush;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export the main entry points at crate root for convenience.
pub use brush::{Brush, BrushEdit, BrushFace, BrushMultiEdit, IdGenerator, TextureAttributes};
pub use csg::{CsgEngine, DefaultCsgEngine};
pub use polyhedron::{ClipResult, CutResult, DragResult, HandleKind, MergePolicy, MultiDragResult, Polyhedron};
pub use topology::mesh::FaceUid;

/// Global tolerance configuration for geometric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Points closer than this to a plane are classified as lying on it.
    pub point_status: f64,
    /// Positions and distances closer than this are considered equal.
    /// Also the snapping radius around integer coordinates.
    pub almost_zero: f64,
    /// Directions whose angle (radians) is below this are parallel.
    pub collinear: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            point_status: 0.01,
            almost_zero: 0.001,
            collinear: 0.01,
        }
    }
}

impl Tolerance {
    /// Parses a tolerance override. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        serde_json::from_str(json).map_err(KernelError::Config)
    }

    pub fn points_coincident(&self, a: &geometry::point::Point3d, b: &geometry::point::Point3d) -> bool {
        a.almost_eq(b, self.almost_zero)
    }
}

/// Tolerance given to newly constructed polyhedra.
pub fn default_tolerance() -> Tolerance {
    Tolerance::default()
}

/// Caller-facing failures. Geometric degeneracies are reported through
/// result values instead.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("handle {index} is out of range (handle space has {count} entries)")]
    InvalidHandle { index: usize, count: usize },

    #[error("handle {index} does not address a {expected:?}")]
    WrongHandleKind { index: usize, expected: HandleKind },

    #[error("plane points are collinear")]
    DegeneratePlane,

    #[error("face planes do not enclose any volume")]
    EmptyBrush,

    #[error("operation requires a closed polyhedron")]
    NotAPolyhedron,

    #[error("invalid tolerance configuration: {0}")]
    Config(#[source] serde_json::Error),

    #[error("brush snapshot could not be encoded or decoded: {0}")]
    Snapshot(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_from_partial_json() {
        let tol = Tolerance::from_json(r#"{ "point_status": 0.5 }"#).unwrap();
        assert_eq!(tol.point_status, 0.5);
        assert_eq!(tol.almost_zero, Tolerance::default().almost_zero);
    }

    #[test]
    fn test_tolerance_rejects_garbage() {
        let err = Tolerance::from_json("not json").unwrap_err();
        assert!(matches!(err, KernelError::Config(_)));
    }
}
