pub mod point;
pub mod vector;
pub mod plane;
pub mod ray;
pub mod transform;
