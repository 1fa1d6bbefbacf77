//! Compute device abstraction and render unit capabilities
//!
//! The orchestrator never computes optics itself. It drives three kinds of
//! render units (illumination, detection, camera) allocated by a
//! [`ComputeDevice`]. Every unit implements [`Renderable`]; there is no
//! default no-op render.
//!
//! `render(wait_to_finish)` may enqueue work asynchronously on a real device.
//! Only when `wait_to_finish` is true must the unit's image be final on
//! return.

pub mod host;
mod image;

use nalgebra::{Matrix4, Vector3};
use ndarray::Array2;

use crate::error::{AllocationError, RenderError};

pub use host::HostDevice;
pub use image::{SharedImage, VolumeImage};

/// Capability shared by every render unit
pub trait Renderable {
    /// Render the unit's output image
    fn render(&mut self, wait_to_finish: bool) -> Result<(), RenderError>;

    /// Output image; the handle stays the same across renders
    fn image(&self) -> SharedImage;

    /// Release device resources; calling it again is a no-op
    fn close(&mut self);
}

/// One light sheet. Renders its contribution on top of an optional input
/// light map into its own light map image.
pub trait IlluminationUnit: Renderable {
    /// Propagation axis and sheet normal, both in volume coordinates
    fn set_axis_and_normal(&mut self, axis: &Vector3<f32>, normal: &Vector3<f32>);
    /// Light map accumulated by upstream arms, `None` for the first arm
    fn set_input(&mut self, input: Option<SharedImage>);
    fn set_intensity(&mut self, intensity: f32);
    fn set_wavelength(&mut self, wavelength: f32);
    /// Sheet center in normalized volume coordinates
    fn set_position(&mut self, x: f32, y: f32, z: f32);
    /// Sheet extent within its plane, normalized
    fn set_height(&mut self, height: f32);
    /// Euler angles of the sheet and tilt `theta` about its own axis, in degrees
    fn set_orientation(&mut self, alpha: f32, beta: f32, gamma: f32, theta: f32);
    fn set_detection_transform(&mut self, transform: &Matrix4<f32>);
    fn set_phantom_transform(&mut self, transform: &Matrix4<f32>);
    fn set_scattering_phantom(&mut self, phantom: Option<SharedImage>);
}

/// Wide-field detection optics producing a 2D detection image
pub trait DetectionUnit: Renderable {
    fn set_fluorescence_phantom(&mut self, phantom: Option<SharedImage>);
    fn set_scattering_phantom(&mut self, phantom: Option<SharedImage>);
    fn set_light_map(&mut self, light_map: Option<SharedImage>);
    fn set_intensity(&mut self, intensity: f32);
    fn set_wavelength(&mut self, wavelength: f32);
    /// Focal plane depth in normalized coordinates
    fn set_focus_z(&mut self, focus_z: f32);
    fn set_width(&mut self, width: usize);
    fn set_height(&mut self, height: usize);
    fn set_phantom_transform(&mut self, transform: &Matrix4<f32>);
    /// Whether inputs changed since the last [`DetectionUnit::clear_update`]
    fn is_update_pending(&self) -> bool;
    fn clear_update(&mut self);
}

/// Camera sensor reading a region of a detection image
pub trait CameraUnit: Renderable {
    fn set_input_image(&mut self, image: SharedImage);
    /// ROI centered on the sensor, shifted by the offsets; sizes are clamped
    /// to the sensor
    fn set_centered_roi(&mut self, offset_x: i64, offset_y: i64, width: usize, height: usize);
    fn set_down_up_vector(&mut self, down_up: &Vector3<f32>);
    fn max_width(&self) -> usize;
    fn max_height(&self) -> usize;
    /// Quantized sensor counts of the last render, `[row, col]`
    fn raw_buffer(&self) -> Array2<u16>;
    fn is_update_pending(&self) -> bool;
    fn clear_update(&mut self);
}

/// Provider of render units on some compute device
pub trait ComputeDevice {
    type Illumination: IlluminationUnit;
    type Detection: DetectionUnit;
    type Camera: CameraUnit;

    /// Adapt requested `(width, height, depth)` to what the device supports
    fn adapt_dimensions(&self, dims: (usize, usize, usize)) -> (usize, usize, usize);

    fn create_illumination(
        &self,
        dims: (usize, usize, usize),
    ) -> Result<Self::Illumination, AllocationError>;

    fn create_detection(&self, width: usize, height: usize)
        -> Result<Self::Detection, AllocationError>;

    fn create_camera(&self, max_width: usize, max_height: usize)
        -> Result<Self::Camera, AllocationError>;
}
