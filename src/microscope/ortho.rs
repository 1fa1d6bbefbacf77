use std::f32::consts::PI;
use std::sync::Arc;

use nalgebra::{Matrix4, Vector3};

use crate::algo::geometry::{rot_y, volume_center};
use crate::device::ComputeDevice;
use crate::parameters::ParameterStore;

use super::{LightSheetMicroscope, Result};

impl<D: ComputeDevice> LightSheetMicroscope<D> {
    /// Built microscope in the classic orthogonal arrangement.
    ///
    /// Detection paths are spaced evenly about the Y axis through the volume
    /// center, so two paths face each other across the sample. Illumination
    /// arms alternate between entering from the low and high X side, all
    /// with sheets normal to Z. Every camera is
    /// `max_camera_resolution x max_camera_resolution`.
    pub fn ortho(
        device: D,
        parameters: Arc<ParameterStore>,
        detection_paths: usize,
        illumination_arms: usize,
        max_camera_resolution: usize,
        dimensions: (usize, usize, usize),
    ) -> Result<Self> {
        let mut microscope = Self::with_parameters(device, parameters, dimensions);
        let center = volume_center();

        for i in 0..detection_paths {
            let angle = 2.0 * PI * i as f32 / detection_paths as f32;
            let transform = if i == 0 { Matrix4::identity() } else { rot_y(angle, &center) };
            microscope.add_detection_path(
                transform,
                Vector3::y(),
                max_camera_resolution,
                max_camera_resolution,
            )?;
        }

        for i in 0..illumination_arms {
            let axis = if i % 2 == 0 { Vector3::x() } else { -Vector3::x() };
            microscope.add_illumination_arm(axis, Vector3::z())?;
        }

        microscope.build()?;
        Ok(microscope)
    }
}
