use serde::{Deserialize, Serialize};

use super::plane::Plane;
use super::point::Point3d;
use super::vector::Vec3;

/// A half-line with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Point3d,
    pub direction: Vec3,
}

impl Ray {
    /// `None` if `direction` has zero length.
    pub fn new(origin: Point3d, direction: Vec3) -> Option<Self> {
        Some(Self {
            origin,
            direction: direction.normalized()?,
        })
    }

    pub fn point_at(&self, distance: f64) -> Point3d {
        self.origin + self.direction * distance
    }

    /// Signed distance along the ray to `plane`, or `None` if parallel.
    pub fn intersect_plane(&self, plane: &Plane) -> Option<f64> {
        plane.intersect_with_line(&self.origin, &self.direction)
    }

    /// Distance of the orthogonal projection of `point` onto the ray's line.
    pub fn project(&self, point: &Point3d) -> f64 {
        (*point - self.origin).dot(&self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_direction_is_rejected() {
        assert!(Ray::new(Point3d::ORIGIN, Vec3::ZERO).is_none());
    }

    #[test]
    fn test_intersect_plane_behind_origin_is_negative() {
        let ray = Ray::new(Point3d::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 3.0)).unwrap();
        let plane = Plane::from_normal_and_point(Vec3::Z, &Point3d::ORIGIN).unwrap();
        let d = ray.intersect_plane(&plane).unwrap();
        assert!((d + 5.0).abs() < 1e-12);
        assert!((ray.point_at(2.0).z - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_project() {
        let ray = Ray::new(Point3d::ORIGIN, Vec3::X).unwrap();
        assert!((ray.project(&Point3d::new(4.0, 9.0, -2.0)) - 4.0).abs() < 1e-12);
    }
}
