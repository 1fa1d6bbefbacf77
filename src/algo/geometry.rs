//! Homogeneous 4x4 transform helpers
//!
//! All transforms act on normalized volume coordinates where the sample
//! volume spans `[0, 1]` on every axis. Rotations are taken about an explicit
//! center point so that the volume can be tilted in place.

use nalgebra::{Matrix4, Point3, Rotation3, Unit, Vector3};

/// Center of the normalized volume
pub fn volume_center() -> Vector3<f32> {
    Vector3::new(0.5, 0.5, 0.5)
}

fn rotation_about(axis: Unit<Vector3<f32>>, angle_rad: f32, center: &Vector3<f32>) -> Matrix4<f32> {
    let rotation = Rotation3::from_axis_angle(&axis, angle_rad).to_homogeneous();
    Matrix4::new_translation(center) * rotation * Matrix4::new_translation(&-center)
}

/// Rotation about the X axis through `center`
pub fn rot_x(angle_rad: f32, center: &Vector3<f32>) -> Matrix4<f32> {
    rotation_about(Vector3::x_axis(), angle_rad, center)
}

/// Rotation about the Y axis through `center`
pub fn rot_y(angle_rad: f32, center: &Vector3<f32>) -> Matrix4<f32> {
    rotation_about(Vector3::y_axis(), angle_rad, center)
}

/// Rotation about the Z axis through `center`
pub fn rot_z(angle_rad: f32, center: &Vector3<f32>) -> Matrix4<f32> {
    rotation_about(Vector3::z_axis(), angle_rad, center)
}

/// Add `(x, y, z)` to the translation column of an affine transform.
///
/// This is a post-hoc shift of the output, not a multiplication by a
/// translation matrix: the rotation block is left untouched.
pub fn add_translation(matrix: &mut Matrix4<f32>, x: f32, y: f32, z: f32) {
    matrix[(0, 3)] += x;
    matrix[(1, 3)] += y;
    matrix[(2, 3)] += z;
}

/// Apply an affine transform to a point
pub fn transform_point(matrix: &Matrix4<f32>, point: &Point3<f32>) -> Point3<f32> {
    matrix.transform_point(point)
}

/// Rotation from Euler angles in degrees (alpha about X, beta about Y, gamma about Z)
pub fn rotation_from_degrees(alpha: f32, beta: f32, gamma: f32) -> Rotation3<f32> {
    Rotation3::from_euler_angles(alpha.to_radians(), beta.to_radians(), gamma.to_radians())
}

/// Nearest odd integer, rounding half up
pub fn closest_odd_integer(value: f32) -> i64 {
    ((value - 1.0) / 2.0 + 0.5).floor() as i64 * 2 + 1
}
