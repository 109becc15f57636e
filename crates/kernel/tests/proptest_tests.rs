//! Property-based tests for brush kernel invariants using the `proptest` crate.

use proptest::prelude::*;

use brush_kernel::geometry::plane::{Plane, PointStatus};
use brush_kernel::geometry::point::Point3d;
use brush_kernel::geometry::transform::BoundingBox;
use brush_kernel::geometry::vector::Vec3;
use brush_kernel::topology::audit::AuditConfig;
use brush_kernel::{ClipResult, MergePolicy, Polyhedron};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Point strictly inside the ±8 cube used by most properties.
fn arb_inner_point() -> impl Strategy<Value = Point3d> {
    (-6.0f64..6.0, -6.0f64..6.0, -6.0f64..6.0).prop_map(|(x, y, z)| Point3d::new(x, y, z))
}

/// Direction that is long enough to normalise.
fn arb_direction() -> impl Strategy<Value = Vec3> {
    (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0)
        .prop_map(|(x, y, z)| Vec3::new(x, y, z))
        .prop_filter("direction too short", |v| v.length() > 0.1)
}

fn arb_cloud() -> impl Strategy<Value = Vec<Point3d>> {
    prop::collection::vec(
        (-50.0f64..50.0, -50.0f64..50.0, -50.0f64..50.0).prop_map(|(x, y, z)| Point3d::new(x, y, z)),
        4..16,
    )
}

/// Integer-cornered box overlapping the `-24..24` range.
fn arb_tool_box() -> impl Strategy<Value = BoundingBox> {
    (-24i32..20, -24i32..20, -24i32..20, 1i32..24, 1i32..24, 1i32..24).prop_map(|(x, y, z, dx, dy, dz)| {
        BoundingBox::new(
            Point3d::new(x as f64, y as f64, z as f64),
            Point3d::new((x + dx) as f64, (y + dy) as f64, (z + dz) as f64),
        )
    })
}

fn cube(half: f64) -> Polyhedron {
    Polyhedron::from_bounding_box(&BoundingBox::new(
        Point3d::new(-half, -half, -half),
        Point3d::new(half, half, half),
    ))
}

fn arb_clip_plane() -> impl Strategy<Value = Plane> {
    (arb_direction(), arb_inner_point())
        .prop_filter_map("degenerate plane", |(n, p)| Plane::from_normal_and_point(n, &p))
}

// ---------------------------------------------------------------------------
// 1. Clipping a solid through its interior leaves a valid solid below the plane
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn clip_through_interior_stays_closed(plane in arb_clip_plane()) {
        let mut poly = cube(8.0);
        let result = poly.clip(&plane);
        prop_assert_eq!(result, ClipResult::Success);
        prop_assert!(poly.is_polyhedron());
        let audit = poly.audit(&AuditConfig::full());
        prop_assert!(audit.all_valid(), "audit errors: {:?}", audit.errors);
        for p in poly.vertices() {
            prop_assert_ne!(plane.point_status(&p, 0.01), PointStatus::Above);
        }
    }
}

// ---------------------------------------------------------------------------
// 2. A clip already done is a no-op the second time
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn repeated_clip_is_unchanged(plane in arb_clip_plane()) {
        let mut poly = cube(8.0);
        poly.clip(&plane);
        let counts = poly.mesh().counts();
        prop_assert_eq!(poly.clip(&plane), ClipResult::Unchanged);
        prop_assert_eq!(poly.mesh().counts(), counts);
    }
}

// ---------------------------------------------------------------------------
// 3. Merge passes find nothing left to merge after a clip
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn merge_passes_are_idempotent(a in arb_clip_plane(), b in arb_clip_plane()) {
        let mut poly = cube(8.0);
        poly.clip(&a);
        poly.clip(&b);
        prop_assume!(poly.is_polyhedron());
        let counts = poly.mesh().counts();
        prop_assert!(poly.merge_sides().is_empty());
        prop_assert_eq!(poly.merge_edges(), 0);
        prop_assert_eq!(poly.mesh().counts(), counts);
    }
}

// ---------------------------------------------------------------------------
// 4. A zero drag never changes anything
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn zero_drag_is_noop(handle in 0usize..26) {
        let mut poly = cube(8.0);
        let before = poly.vertices();
        let result = poly.move_handle(handle, Vec3::ZERO, MergePolicy::Merge).unwrap();
        prop_assert!(!result.moved);
        prop_assert_eq!(result.handle, handle);
        prop_assert_eq!(poly.vertices(), before);
    }
}

// ---------------------------------------------------------------------------
// 5. A drag either succeeds with a valid solid or leaves the solid untouched
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn vertex_drag_is_all_or_nothing(handle in 0usize..8, delta in arb_direction(), scale in 1.0f64..6.0) {
        let mut poly = cube(8.0);
        let before = poly.vertices();
        let result = poly.move_vertex(handle, delta * scale, MergePolicy::Reject).unwrap();
        if result.moved {
            let audit = poly.audit(&AuditConfig::full());
            prop_assert!(audit.all_valid(), "audit errors: {:?}", audit.errors);
        } else {
            prop_assert_eq!(poly.vertices(), before);
        }
    }
}

// ---------------------------------------------------------------------------
// 6. The hull of a point cloud contains every input point
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn hull_contains_its_points(points in arb_cloud()) {
        let poly = Polyhedron::from_points(&points);
        prop_assume!(poly.is_polyhedron());
        let audit = poly.audit(&AuditConfig::topology());
        prop_assert!(audit.all_valid(), "audit errors: {:?}", audit.errors);
        for p in &points {
            prop_assert!(poly.contains_point(p), "{:?} outside hull", p);
        }
    }
}

// ---------------------------------------------------------------------------
// 7. Translation there and back restores the vertices
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn translation_round_trip(
        (x, y, z) in (-100.0f64..100.0, -100.0f64..100.0, -100.0f64..100.0),
        plane in arb_clip_plane(),
    ) {
        let mut poly = cube(8.0);
        poly.clip(&plane);
        let before = poly.vertices();
        let d = Vec3::new(x, y, z);
        poly.translate(&d);
        poly.translate(&-d);
        for (a, b) in before.iter().zip(poly.vertices()) {
            prop_assert!(a.almost_eq(&b, 1e-9));
        }
    }
}

// ---------------------------------------------------------------------------
// 8. Subtraction fragments tile the minuend minus the tool
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn subtraction_fragments_tile_difference(tool_box in arb_tool_box()) {
        let minuend = cube(16.0);
        let tool = Polyhedron::from_bounding_box(&tool_box);
        let fragments = minuend.subtract(&tool);

        // Half-integer samples never sit on an integer boundary plane.
        let coords: Vec<f64> = (0..11).map(|k| -15.5 + 3.0 * k as f64).collect();
        for &x in &coords {
            for &y in &coords {
                for &z in &coords {
                    let p = Point3d::new(x, y, z);
                    let covering = fragments.iter().filter(|f| f.contains_point(&p)).count();
                    let expected = usize::from(!tool.contains_point(&p));
                    prop_assert_eq!(covering, expected, "sample {:?}", p);
                }
            }
        }
    }
}
