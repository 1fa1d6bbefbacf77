use log::trace;
use nalgebra::{Matrix4, Point3};
use ndarray::{Array3, Zip};

use crate::algo::trilinear::{normalized_coordinate, sample_trilinear};
use crate::device::{DetectionUnit, Renderable, SharedImage, VolumeImage};
use crate::error::RenderError;

/// Depth of field (standard deviation) at the reference wavelength
const DEPTH_OF_FIELD: f32 = 0.02;
/// Wavelength at which [`DEPTH_OF_FIELD`] applies
const REFERENCE_WAVELENGTH: f32 = 0.0005;
/// Attenuation of emitted light per unit scattering density per normalized length
const EMISSION_SCATTERING: f32 = 2.0;
/// Focal planes integrated per render
const FOCAL_SAMPLES: usize = 48;

/// Wide-field detection: fluorescence excited by the light map, weighted by a
/// Gaussian depth of field around the focal plane and dimmed by scattering
/// between the emitter and the objective (on the `z = 0` side).
#[derive(Debug)]
pub struct WideFieldDetection {
    image: SharedImage,
    width: usize,
    height: usize,
    fluorescence: Option<SharedImage>,
    scattering: Option<SharedImage>,
    light_map: Option<SharedImage>,
    intensity: f32,
    wavelength: f32,
    focus_z: f32,
    phantom_transform: Matrix4<f32>,
    update_pending: bool,
    closed: bool,
}

impl WideFieldDetection {
    pub(super) fn new(width: usize, height: usize) -> Self {
        Self {
            image: VolumeImage::shared_zeros((width, height, 1)),
            width,
            height,
            fluorescence: None,
            scattering: None,
            light_map: None,
            intensity: 1.0,
            wavelength: REFERENCE_WAVELENGTH,
            focus_z: 0.5,
            phantom_transform: Matrix4::identity(),
            update_pending: false,
            closed: false,
        }
    }

    fn depth_of_field(&self) -> f32 {
        DEPTH_OF_FIELD * (self.wavelength / REFERENCE_WAVELENGTH).max(f32::EPSILON)
    }
}

impl Renderable for WideFieldDetection {
    fn render(&mut self, wait_to_finish: bool) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }
        let (width, height) = (self.width, self.height);
        let mut out = Array3::<f32>::zeros((1, height, width));

        let sigma = self.depth_of_field();
        let dz = 1.0 / FOCAL_SAMPLES as f32;
        let weights: Vec<(f32, f32)> = (0..FOCAL_SAMPLES)
            .map(|k| (k as f32 + 0.5) * dz)
            .map(|z| (z, (-(z - self.focus_z).powi(2) / (2.0 * sigma * sigma)).exp()))
            .collect();
        // a focal plane far outside the volume sees nothing in focus
        let total_weight: f32 = weights.iter().map(|(_, w)| w).sum();

        if let (Some(fluorescence), Some(light_map), true) =
            (&self.fluorescence, &self.light_map, total_weight > 0.0)
        {
            let fluorescence = fluorescence.read();
            let light_map = light_map.read();
            let scattering = self.scattering.as_ref().map(|s| s.read());

            Zip::indexed(&mut out).for_each(|(_, y, x), value| {
                let u = normalized_coordinate(x, width);
                let v = normalized_coordinate(y, height);
                let mut optical_depth = 0.0;
                let mut signal = 0.0;
                for &(z, w) in &weights {
                    let p = Point3::new(u, v, z);
                    let sample_point = self.phantom_transform.transform_point(&p);
                    if let Some(scattering) = scattering.as_deref() {
                        optical_depth += sample_trilinear(scattering, &sample_point) * dz;
                    }
                    if w < 1e-6 {
                        continue;
                    }
                    let emitted = sample_trilinear(&fluorescence, &sample_point)
                        * sample_trilinear(&light_map, &p);
                    signal += w * emitted * (-EMISSION_SCATTERING * optical_depth).exp();
                }
                *value = self.intensity * signal / total_weight;
            });
        }

        self.image.replace(out);
        trace!("detection rendered {width}x{height} (wait: {wait_to_finish})");
        Ok(())
    }

    fn image(&self) -> SharedImage {
        self.image.clone()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.fluorescence = None;
            self.scattering = None;
            self.light_map = None;
            self.image.replace(Array3::zeros((0, 0, 0)));
        }
    }
}

impl DetectionUnit for WideFieldDetection {
    fn set_fluorescence_phantom(&mut self, phantom: Option<SharedImage>) {
        self.fluorescence = phantom;
        self.update_pending = true;
    }

    fn set_scattering_phantom(&mut self, phantom: Option<SharedImage>) {
        self.scattering = phantom;
        self.update_pending = true;
    }

    fn set_light_map(&mut self, light_map: Option<SharedImage>) {
        self.light_map = light_map;
        self.update_pending = true;
    }

    fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
        self.update_pending = true;
    }

    fn set_wavelength(&mut self, wavelength: f32) {
        self.wavelength = wavelength;
        self.update_pending = true;
    }

    fn set_focus_z(&mut self, focus_z: f32) {
        self.focus_z = focus_z;
        self.update_pending = true;
    }

    fn set_width(&mut self, width: usize) {
        self.width = width;
        self.update_pending = true;
    }

    fn set_height(&mut self, height: usize) {
        self.height = height;
        self.update_pending = true;
    }

    fn set_phantom_transform(&mut self, transform: &Matrix4<f32>) {
        self.phantom_transform = *transform;
        self.update_pending = true;
    }

    fn is_update_pending(&self) -> bool {
        self.update_pending
    }

    fn clear_update(&mut self) {
        self.update_pending = false;
    }
}
