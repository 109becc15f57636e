use approx::{AbsDiffEq, RelativeEq};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

use super::transform::Axis;
use super::vector::Vec3;

/// A point in 3D Euclidean space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3d {
    pub const ORIGIN: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    pub fn distance_squared_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn midpoint(&self, other: &Self) -> Self {
        Self {
            x: (self.x + other.x) * 0.5,
            y: (self.y + other.y) * 0.5,
            z: (self.z + other.z) * 0.5,
        }
    }

    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            x: self.x + t * (other.x - self.x),
            y: self.y + t * (other.y - self.y),
            z: self.z + t * (other.z - self.z),
        }
    }

    /// True if every coordinate differs from `other` by at most `epsilon`.
    pub fn almost_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
    }

    /// Rounds every coordinate that lies within `epsilon` of an integer.
    pub fn snapped(&self, epsilon: f64) -> Self {
        fn snap(c: f64, epsilon: f64) -> f64 {
            let r = c.round();
            if (c - r).abs() < epsilon { r } else { c }
        }
        Self::new(
            snap(self.x, epsilon),
            snap(self.y, epsilon),
            snap(self.z, epsilon),
        )
    }

    /// Quarter turn about `axis` through `center`. Clockwise is as seen
    /// looking down the positive axis towards the origin.
    pub fn rotated90(&self, axis: Axis, center: &Point3d, clockwise: bool) -> Self {
        let v = *self - *center;
        let r = match (axis, clockwise) {
            (Axis::X, true) => Vec3::new(v.x, v.z, -v.y),
            (Axis::X, false) => Vec3::new(v.x, -v.z, v.y),
            (Axis::Y, true) => Vec3::new(-v.z, v.y, v.x),
            (Axis::Y, false) => Vec3::new(v.z, v.y, -v.x),
            (Axis::Z, true) => Vec3::new(v.y, -v.x, v.z),
            (Axis::Z, false) => Vec3::new(-v.y, v.x, v.z),
        };
        *center + r
    }

    /// Mirror image across the plane orthogonal to `axis` through `center`.
    pub fn flipped(&self, axis: Axis, center: &Point3d) -> Self {
        let mut p = *self;
        match axis {
            Axis::X => p.x = 2.0 * center.x - p.x,
            Axis::Y => p.y = 2.0 * center.y - p.y,
            Axis::Z => p.z = 2.0 * center.z - p.z,
        }
        p
    }

    pub fn component(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(arr: [f64; 3]) -> Self {
        Self {
            x: arr[0],
            y: arr[1],
            z: arr[2],
        }
    }

    /// Arithmetic mean of a point set. `None` for an empty set.
    pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Point3d>) -> Option<Self> {
        let mut sum = Vec3::ZERO;
        let mut count = 0usize;
        for p in points {
            sum = sum + p.to_vec3();
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let mean = sum / count as f64;
        Some(Self::new(mean.x, mean.y, mean.z))
    }
}

impl Add<Vec3> for Point3d {
    type Output = Point3d;
    fn add(self, rhs: Vec3) -> Self::Output {
        Point3d::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3d {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Sub<Vec3> for Point3d {
    type Output = Point3d;
    fn sub(self, rhs: Vec3) -> Self::Output {
        Point3d::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl AbsDiffEq for Point3d {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.x.abs_diff_eq(&other.x, epsilon)
            && self.y.abs_diff_eq(&other.y, epsilon)
            && self.z.abs_diff_eq(&other.z, epsilon)
    }
}

impl RelativeEq for Point3d {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.x.relative_eq(&other.x, epsilon, max_relative)
            && self.y.relative_eq(&other.y, epsilon, max_relative)
            && self.z.relative_eq(&other.z, epsilon, max_relative)
    }
}

/// A point in 2D space, used when a planar point set is projected onto a
/// coordinate plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

impl Point2d {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Z component of `(a - self) x (b - self)`; positive for a left turn.
    pub fn turn(&self, a: &Self, b: &Self) -> f64 {
        (a.x - self.x) * (b.y - self.y) - (a.y - self.y) * (b.x - self.x)
    }
}
