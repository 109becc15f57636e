pub mod mesh;
pub mod audit;
