//! Device-resident volumetric images

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ndarray::Array3;

/// Shared handle to an image; clones refer to the same storage
pub type SharedImage = Arc<VolumeImage>;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Single-channel float image of up to three dimensions.
///
/// Storage is an `Array3<f32>` indexed `[z, y, x]`; 2D images have a depth of
/// one. Every image gets a process-unique id at creation so that image
/// identity can be compared without comparing contents.
#[derive(Debug)]
pub struct VolumeImage {
    id: u64,
    data: RwLock<Array3<f32>>,
}

impl VolumeImage {
    /// Zero-filled image with `(width, height, depth)` voxels
    pub fn zeros((width, height, depth): (usize, usize, usize)) -> Self {
        Self::from_array(Array3::zeros((depth, height, width)))
    }

    /// Wrap an existing `[z, y, x]` array
    pub fn from_array(data: Array3<f32>) -> Self {
        Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            data: RwLock::new(data),
        }
    }

    /// Convenience for `Arc::new(VolumeImage::zeros(..))`
    pub fn shared_zeros(dims: (usize, usize, usize)) -> SharedImage {
        Arc::new(Self::zeros(dims))
    }

    /// Process-unique identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// `(width, height, depth)` in voxels
    pub fn dimensions(&self) -> (usize, usize, usize) {
        let (depth, height, width) = self.read().dim();
        (width, height, depth)
    }

    pub fn width(&self) -> usize {
        self.dimensions().0
    }

    pub fn height(&self) -> usize {
        self.dimensions().1
    }

    pub fn depth(&self) -> usize {
        self.dimensions().2
    }

    /// Number of voxels
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read access to the voxel data
    pub fn read(&self) -> RwLockReadGuard<'_, Array3<f32>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access to the voxel data
    pub fn write(&self) -> RwLockWriteGuard<'_, Array3<f32>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset every voxel to zero
    pub fn fill_zero(&self) {
        self.write().fill(0.0);
    }

    /// Replace the contents; the new array may have a different shape
    pub fn replace(&self, data: Array3<f32>) {
        *self.write() = data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_are_width_height_depth() {
        let img = VolumeImage::zeros((8, 4, 2));
        assert_eq!(img.dimensions(), (8, 4, 2));
        assert_eq!(img.read().dim(), (2, 4, 8));
        assert_eq!(img.len(), 64);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = VolumeImage::zeros((1, 1, 1));
        let b = VolumeImage::zeros((1, 1, 1));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_fill_zero() {
        let img = VolumeImage::from_array(Array3::ones((2, 2, 2)));
        img.fill_zero();
        assert!(img.read().iter().all(|&v| v == 0.0));
    }
}
