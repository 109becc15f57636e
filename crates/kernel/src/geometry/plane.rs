use serde::{Deserialize, Serialize};

use super::point::Point3d;
use super::vector::Vec3;

/// Classification of a point against an oriented plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointStatus {
    /// On the side the normal points to.
    Above,
    /// On the opposite side of the normal.
    Below,
    /// Within epsilon of the plane.
    Inside,
}

/// An oriented plane `normal . p = distance` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f64,
}

impl Plane {
    /// Builds a plane from a normal (normalized here) and a point on the plane.
    pub fn from_normal_and_point(normal: Vec3, point: &Point3d) -> Option<Self> {
        let normal = normal.normalized()?;
        Some(Self {
            normal,
            distance: normal.dot(&point.to_vec3()),
        })
    }

    /// Plane through three points. The normal is `(p2 - p0) x (p1 - p0)`,
    /// so a loop that is clockwise when seen from the side the normal points
    /// to yields that normal. `None` if the points are collinear.
    pub fn from_points(p0: &Point3d, p1: &Point3d, p2: &Point3d) -> Option<Self> {
        let normal = (*p2 - *p0).cross(&(*p1 - *p0));
        Self::from_normal_and_point(normal, p0)
    }

    /// Best-fit plane of a closed loop that is clockwise when seen from the
    /// side the normal points to (Newell's method). `None` for loops with
    /// no area.
    pub fn from_loop(points: &[Point3d]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let mut normal = Vec3::ZERO;
        for (i, p) in points.iter().enumerate() {
            let q = &points[(i + 1) % points.len()];
            normal.x += (p.y - q.y) * (p.z + q.z);
            normal.y += (p.z - q.z) * (p.x + q.x);
            normal.z += (p.x - q.x) * (p.y + q.y);
        }
        let center = Point3d::centroid(points)?;
        Self::from_normal_and_point(-normal, &center)
    }

    /// The point on the plane closest to the origin.
    pub fn anchor(&self) -> Point3d {
        let a = self.normal * self.distance;
        Point3d::new(a.x, a.y, a.z)
    }

    pub fn signed_distance(&self, point: &Point3d) -> f64 {
        self.normal.dot(&point.to_vec3()) - self.distance
    }

    pub fn point_status(&self, point: &Point3d, epsilon: f64) -> PointStatus {
        let d = self.signed_distance(point);
        if d > epsilon {
            PointStatus::Above
        } else if d < -epsilon {
            PointStatus::Below
        } else {
            PointStatus::Inside
        }
    }

    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            distance: -self.distance,
        }
    }

    pub fn translated(&self, delta: &Vec3) -> Self {
        Self {
            normal: self.normal,
            distance: self.distance + self.normal.dot(delta),
        }
    }

    /// Distance along `direction` from `origin` to the plane, in units of
    /// `direction`'s length. `None` when the line is parallel to the plane.
    pub fn intersect_with_line(&self, origin: &Point3d, direction: &Vec3) -> Option<f64> {
        let denom = self.normal.dot(direction);
        if denom.abs() < 1e-12 {
            return None;
        }
        Some((self.distance - self.normal.dot(&origin.to_vec3())) / denom)
    }

    /// Same orientation and offset within the given tolerances.
    pub fn almost_eq(&self, other: &Plane, epsilon: f64) -> bool {
        (self.distance - other.distance).abs() <= epsilon
            && (self.normal - other.normal).is_null(epsilon)
    }

    /// Orthogonal projection of `point` onto the plane.
    pub fn project_point(&self, point: &Point3d) -> Point3d {
        *point - self.normal * self.signed_distance(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_points_clockwise_seen_from_above() {
        // Clockwise when looking down the +z axis.
        let plane = Plane::from_points(
            &Point3d::new(0.0, 0.0, 4.0),
            &Point3d::new(0.0, 1.0, 4.0),
            &Point3d::new(1.0, 1.0, 4.0),
        )
        .unwrap();
        assert_relative_eq!(plane.normal, Vec3::Z);
        assert!((plane.distance - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_loop_agrees_with_from_points() {
        let quad = [
            Point3d::new(0.0, 0.0, 2.0),
            Point3d::new(0.0, 3.0, 2.0),
            Point3d::new(3.0, 3.0, 2.0),
            Point3d::new(3.0, 0.0, 2.0),
        ];
        let a = Plane::from_loop(&quad).unwrap();
        let b = Plane::from_points(&quad[0], &quad[1], &quad[2]).unwrap();
        assert!(a.almost_eq(&b, 1e-9));
    }

    #[test]
    fn test_collinear_points_have_no_plane() {
        let p = Plane::from_points(
            &Point3d::new(0.0, 0.0, 0.0),
            &Point3d::new(1.0, 1.0, 1.0),
            &Point3d::new(2.0, 2.0, 2.0),
        );
        assert!(p.is_none());
    }

    #[test]
    fn test_point_status() {
        let plane = Plane::from_normal_and_point(Vec3::Z, &Point3d::ORIGIN).unwrap();
        assert_eq!(plane.point_status(&Point3d::new(0.0, 0.0, 1.0), 0.01), PointStatus::Above);
        assert_eq!(plane.point_status(&Point3d::new(5.0, 0.0, -1.0), 0.01), PointStatus::Below);
        assert_eq!(plane.point_status(&Point3d::new(3.0, 3.0, 0.005), 0.01), PointStatus::Inside);
    }

    #[test]
    fn test_flipped_swaps_sides() {
        let plane = Plane::from_normal_and_point(Vec3::X, &Point3d::new(2.0, 0.0, 0.0)).unwrap();
        let p = Point3d::new(5.0, 0.0, 0.0);
        assert_eq!(plane.point_status(&p, 0.01), PointStatus::Above);
        assert_eq!(plane.flipped().point_status(&p, 0.01), PointStatus::Below);
    }

    #[test]
    fn test_intersect_with_line() {
        let plane = Plane::from_normal_and_point(Vec3::Z, &Point3d::new(0.0, 0.0, 10.0)).unwrap();
        let t = plane.intersect_with_line(&Point3d::ORIGIN, &Vec3::new(0.0, 0.0, 2.0)).unwrap();
        assert!((t - 5.0).abs() < 1e-12);
        assert!(plane.intersect_with_line(&Point3d::ORIGIN, &Vec3::X).is_none());
    }

    #[test]
    fn test_project_point() {
        let plane = Plane::from_normal_and_point(Vec3::Y, &Point3d::new(0.0, 3.0, 0.0)).unwrap();
        assert_relative_eq!(
            plane.project_point(&Point3d::new(1.0, 7.0, 2.0)),
            Point3d::new(1.0, 3.0, 2.0)
        );
    }
}
