//! Geometry and sampling helpers shared by the pipeline and the host kernels

pub mod geometry;
pub mod trilinear;

pub use geometry::{add_translation, closest_odd_integer, rot_x, rot_y, rot_z, volume_center};
pub use trilinear::sample_trilinear;
