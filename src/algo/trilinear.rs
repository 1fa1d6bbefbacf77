//! Trilinear sampling of volumes in normalized coordinates.
//!
//! Volumes are `Array3<f32>` indexed `[z, y, x]`, following the `[row, col]`
//! convention of 2D images with depth as the outermost axis. A normalized
//! coordinate of 0 maps to the first voxel center and 1 to the last.

use nalgebra::Point3;
use ndarray::Array3;

fn axis_position(coord: f32, len: usize) -> Option<(usize, usize, f32)> {
    if len == 0 || !coord.is_finite() || !(0.0..=1.0).contains(&coord) {
        return None;
    }
    if len == 1 {
        return Some((0, 0, 0.0));
    }
    let pos = coord * (len - 1) as f32;
    let lo = (pos.floor() as usize).min(len - 1);
    let hi = (lo + 1).min(len - 1);
    Some((lo, hi, pos - lo as f32))
}

/// Sample `volume` at a normalized point; points outside `[0, 1]^3` read as zero
pub fn sample_trilinear(volume: &Array3<f32>, point: &Point3<f32>) -> f32 {
    let (depth, height, width) = volume.dim();
    let (Some((x0, x1, fx)), Some((y0, y1, fy)), Some((z0, z1, fz))) = (
        axis_position(point.x, width),
        axis_position(point.y, height),
        axis_position(point.z, depth),
    ) else {
        return 0.0;
    };

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

    let c00 = lerp(volume[[z0, y0, x0]], volume[[z0, y0, x1]], fx);
    let c01 = lerp(volume[[z0, y1, x0]], volume[[z0, y1, x1]], fx);
    let c10 = lerp(volume[[z1, y0, x0]], volume[[z1, y0, x1]], fx);
    let c11 = lerp(volume[[z1, y1, x0]], volume[[z1, y1, x1]], fx);

    let c0 = lerp(c00, c01, fy);
    let c1 = lerp(c10, c11, fy);
    lerp(c0, c1, fz)
}

/// Normalized coordinate of voxel `index` along an axis of `len` voxels
pub fn normalized_coordinate(index: usize, len: usize) -> f32 {
    if len <= 1 {
        0.5
    } else {
        index as f32 / (len - 1) as f32
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::Array3;

    use super::*;

    #[test]
    fn test_corners_hit_voxels_exactly() {
        let mut v = Array3::<f32>::zeros((2, 2, 2));
        v[[0, 0, 0]] = 1.0;
        v[[1, 1, 1]] = 8.0;

        assert_relative_eq!(sample_trilinear(&v, &Point3::new(0.0, 0.0, 0.0)), 1.0);
        assert_relative_eq!(sample_trilinear(&v, &Point3::new(1.0, 1.0, 1.0)), 8.0);
    }

    #[test]
    fn test_midpoint_is_average() {
        let v = Array3::from_shape_fn((2, 2, 2), |(z, y, x)| (x + 2 * y + 4 * z) as f32);
        assert_relative_eq!(sample_trilinear(&v, &Point3::new(0.5, 0.5, 0.5)), 3.5);
    }

    #[test]
    fn test_outside_reads_zero() {
        let v = Array3::<f32>::ones((3, 3, 3));
        assert_eq!(sample_trilinear(&v, &Point3::new(-0.01, 0.5, 0.5)), 0.0);
        assert_eq!(sample_trilinear(&v, &Point3::new(0.5, 1.2, 0.5)), 0.0);
        assert_eq!(sample_trilinear(&v, &Point3::new(0.5, 0.5, f32::NAN)), 0.0);
    }

    #[test]
    fn test_single_slice_volume() {
        let v = Array3::<f32>::from_elem((1, 4, 4), 2.0);
        assert_relative_eq!(sample_trilinear(&v, &Point3::new(0.3, 0.6, 0.9)), 2.0);
    }
}
