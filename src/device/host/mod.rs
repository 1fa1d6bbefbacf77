//! Host-memory compute device
//!
//! Reference implementations of the illumination, detection and camera units
//! running on the CPU with `ndarray`. They model the optics coarsely (Gaussian
//! sheets, Beer-Lambert attenuation, Gaussian depth of field, Poisson shot
//! noise) and exist so the pipeline can run end to end without a GPU.

mod camera;
mod detection;
mod illumination;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AllocationError;

use super::ComputeDevice;

pub use camera::{models as sensor_models, ScmosCamera, SensorModel};
pub use detection::WideFieldDetection;
pub use illumination::LightSheetIllumination;

/// Largest image extent per axis accepted by default
pub const DEFAULT_MAX_EXTENT: usize = 4096;

/// CPU-backed compute device
#[derive(Debug)]
pub struct HostDevice {
    max_extent: usize,
    alignment: usize,
    sensor: SensorModel,
    noise_seed: Option<u64>,
    cameras_created: AtomicU64,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    /// Device with the default extent, no alignment and the default sensor
    pub fn new() -> Self {
        Self {
            max_extent: DEFAULT_MAX_EXTENT,
            alignment: 1,
            sensor: sensor_models::ORCA_FLASH4.clone(),
            noise_seed: None,
            cameras_created: AtomicU64::new(0),
        }
    }

    /// Limit every image axis to `max_extent` voxels
    pub fn with_max_extent(mut self, max_extent: usize) -> Self {
        self.max_extent = max_extent;
        self
    }

    /// Round adapted dimensions up to a multiple of `alignment`
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment.max(1);
        self
    }

    /// Sensor model used by cameras created from now on
    pub fn with_sensor(mut self, sensor: SensorModel) -> Self {
        self.sensor = sensor;
        self
    }

    /// Seed camera noise; camera `n` uses `seed + n`
    pub fn with_noise_seed(mut self, seed: Option<u64>) -> Self {
        self.noise_seed = seed;
        self
    }

    pub fn max_extent(&self) -> usize {
        self.max_extent
    }

    fn check_allocation(&self, dims: (usize, usize, usize)) -> Result<(), AllocationError> {
        let (width, height, depth) = dims;
        if width == 0 || height == 0 || depth == 0 {
            return Err(AllocationError::EmptyImage {
                width,
                height,
                depth,
            });
        }
        if width > self.max_extent || height > self.max_extent || depth > self.max_extent {
            return Err(AllocationError::ExceedsExtent {
                width,
                height,
                depth,
                max_extent: self.max_extent,
            });
        }
        Ok(())
    }

    fn adapt_axis(&self, len: usize) -> usize {
        let aligned = len.div_ceil(self.alignment) * self.alignment;
        let max_aligned = (self.max_extent / self.alignment) * self.alignment;
        aligned.min(max_aligned)
    }
}

impl ComputeDevice for HostDevice {
    type Illumination = LightSheetIllumination;
    type Detection = WideFieldDetection;
    type Camera = ScmosCamera;

    fn adapt_dimensions(&self, dims: (usize, usize, usize)) -> (usize, usize, usize) {
        (
            self.adapt_axis(dims.0),
            self.adapt_axis(dims.1),
            self.adapt_axis(dims.2),
        )
    }

    fn create_illumination(
        &self,
        dims: (usize, usize, usize),
    ) -> Result<LightSheetIllumination, AllocationError> {
        self.check_allocation(dims)?;
        Ok(LightSheetIllumination::new(dims))
    }

    fn create_detection(
        &self,
        width: usize,
        height: usize,
    ) -> Result<WideFieldDetection, AllocationError> {
        self.check_allocation((width, height, 1))?;
        Ok(WideFieldDetection::new(width, height))
    }

    fn create_camera(
        &self,
        max_width: usize,
        max_height: usize,
    ) -> Result<ScmosCamera, AllocationError> {
        self.check_allocation((max_width, max_height, 1))?;
        let index = self.cameras_created.fetch_add(1, Ordering::Relaxed);
        let seed = self.noise_seed.map(|s| s.wrapping_add(index));
        Ok(ScmosCamera::new(max_width, max_height, self.sensor.clone(), seed))
    }
}
