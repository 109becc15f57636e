//! Subtraction of one convex solid from another.

use tracing::{debug, info, instrument};

use crate::polyhedron::{ClipResult, Polyhedron};

/// Trait for set subtraction between convex solids.
///
/// Implement this trait to provide alternative CSG backends or mock
/// implementations.
pub trait CsgEngine {
    /// Convex pieces covering `minuend` minus `tool`, pairwise disjoint.
    /// Returns `[minuend]` when the two do not intersect and an empty list
    /// when the tool swallows the minuend.
    fn subtract(&self, minuend: &Polyhedron, tool: &Polyhedron) -> Vec<Polyhedron>;
}

/// Peels the minuend one tool plane at a time: the part outside the
/// current plane becomes a fragment, the part inside carries on to the
/// next plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCsgEngine;

impl CsgEngine for DefaultCsgEngine {
    #[instrument(skip_all, fields(tool_sides = tool.side_count()))]
    fn subtract(&self, minuend: &Polyhedron, tool: &Polyhedron) -> Vec<Polyhedron> {
        if !minuend.is_polyhedron() || !tool.is_polyhedron() || !minuend.intersects(tool) {
            debug!("operands do not overlap; minuend returned as is");
            return vec![minuend.clone()];
        }

        let mut fragments = Vec::new();
        let mut remaining = minuend.clone();
        for view in tool.faces() {
            let mut outside = remaining.clone();
            if outside.clip_tagged(&view.plane.flipped(), view.face) != ClipResult::Empty {
                fragments.push(outside);
            }
            if remaining.clip_tagged(&view.plane, view.face) == ClipResult::Empty {
                break;
            }
        }
        info!(fragments = fragments.len(), "subtraction complete");
        fragments
    }
}

impl Polyhedron {
    /// `self` minus `tool` with the default engine.
    pub fn subtract(&self, tool: &Polyhedron) -> Vec<Polyhedron> {
        DefaultCsgEngine.subtract(self, tool)
    }
}
