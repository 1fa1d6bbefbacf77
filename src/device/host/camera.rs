//! sCMOS camera model: ROI readout, orientation, shot and read noise,
//! quantization.

use log::trace;
use nalgebra::{Point3, Vector3};
use ndarray::{Array2, Array3};
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{thread_rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};

use crate::algo::trilinear::{normalized_coordinate, sample_trilinear};
use crate::device::{CameraUnit, Renderable, SharedImage, VolumeImage};
use crate::error::RenderError;

/// Electrical characteristics of a camera sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorModel {
    /// Name/model of the sensor
    pub name: String,
    /// Photo-electrons generated per unit of detection signal
    pub electrons_per_unit: f64,
    /// Read noise in electrons (standard deviation)
    pub read_noise_e: f64,
    /// Digital numbers per electron
    pub dn_per_electron: f64,
    /// Bias added to every pixel, in DN
    pub offset_dn: f64,
    /// Bit depth of the ADC
    pub bit_depth: u8,
}

impl SensorModel {
    /// Largest representable DN value
    pub fn max_dn(&self) -> f64 {
        ((1u32 << self.bit_depth.min(16)) - 1) as f64
    }

    /// Convert electrons to clipped, rounded DN
    pub fn quantize(&self, electrons: f64) -> u16 {
        let dn = self.offset_dn + electrons.max(0.0) * self.dn_per_electron;
        dn.clamp(0.0, self.max_dn()).round() as u16
    }
}

/// Standard sensor models
pub mod models {
    use super::*;

    /// Hamamatsu ORCA-Flash4.0 class sCMOS sensor
    pub static ORCA_FLASH4: Lazy<SensorModel> = Lazy::new(|| SensorModel {
        name: "ORCA-Flash4.0".to_string(),
        electrons_per_unit: 1000.0,
        read_noise_e: 1.6,
        dn_per_electron: 0.46,
        offset_dn: 100.0,
        bit_depth: 16,
    });

    /// Noise-free sensor with unit gain, useful for deterministic output
    pub static IDEAL: Lazy<SensorModel> = Lazy::new(|| SensorModel {
        name: "Ideal".to_string(),
        electrons_per_unit: 1000.0,
        read_noise_e: 0.0,
        dn_per_electron: 1.0,
        offset_dn: 0.0,
        bit_depth: 16,
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Roi {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

/// Camera sensor that reads a centered region of interest out of the
/// detection image mapped onto its full `max_width x max_height` area.
#[derive(Debug)]
pub struct ScmosCamera {
    max_width: usize,
    max_height: usize,
    roi: Roi,
    down_up: Vector3<f32>,
    input: Option<SharedImage>,
    image: SharedImage,
    raw: Array2<u16>,
    sensor: SensorModel,
    rng: StdRng,
    shot_noise: bool,
    update_pending: bool,
    closed: bool,
}

impl ScmosCamera {
    pub(super) fn new(
        max_width: usize,
        max_height: usize,
        sensor: SensorModel,
        seed: Option<u64>,
    ) -> Self {
        let seed = seed.unwrap_or_else(|| thread_rng().next_u64());
        Self {
            max_width,
            max_height,
            roi: Roi {
                x: 0,
                y: 0,
                width: max_width,
                height: max_height,
            },
            down_up: Vector3::y(),
            input: None,
            image: VolumeImage::shared_zeros((max_width, max_height, 1)),
            raw: Array2::zeros((max_height, max_width)),
            sensor,
            rng: StdRng::seed_from_u64(seed),
            shot_noise: true,
            update_pending: false,
            closed: false,
        }
    }

    /// Enable or disable Poisson shot noise
    pub fn set_shot_noise(&mut self, enabled: bool) {
        self.shot_noise = enabled;
    }

    pub fn sensor(&self) -> &SensorModel {
        &self.sensor
    }

    /// Current ROI as `(x, y, width, height)` in sensor pixels
    pub fn roi(&self) -> (usize, usize, usize, usize) {
        (self.roi.x, self.roi.y, self.roi.width, self.roi.height)
    }

    /// Map normalized sensor coordinates to normalized detection coordinates
    /// according to which way is "up" on the sample.
    fn orient(&self, u: f32, v: f32) -> (f32, f32) {
        let up = self.down_up;
        if up.x.abs() > up.y.abs() {
            if up.x >= 0.0 {
                (v, 1.0 - u)
            } else {
                (1.0 - v, u)
            }
        } else if up.y >= 0.0 {
            (u, v)
        } else {
            (u, 1.0 - v)
        }
    }
}

impl Renderable for ScmosCamera {
    fn render(&mut self, wait_to_finish: bool) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }
        let read_noise_e = self.sensor.read_noise_e;
        if !(read_noise_e.is_finite() && read_noise_e >= 0.0) {
            return Err(RenderError::InvalidSetting(format!(
                "read noise must be a finite non-negative number of electrons, got {read_noise_e}"
            )));
        }
        let read_noise = Normal::new(0.0, read_noise_e)
            .map_err(|e| RenderError::InvalidSetting(format!("read noise: {e}")))?;

        let Roi {
            x: x0,
            y: y0,
            width,
            height,
        } = self.roi;
        let mut electrons = Array2::<f64>::zeros((height, width));

        if let Some(input) = &self.input {
            let detection = input.read();
            for ((row, col), e) in electrons.indexed_iter_mut() {
                let u = normalized_coordinate(x0 + col, self.max_width);
                let v = normalized_coordinate(y0 + row, self.max_height);
                let (du, dv) = self.orient(u, v);
                let signal = sample_trilinear(&detection, &Point3::new(du, dv, 0.5)) as f64;
                *e = signal.max(0.0) * self.sensor.electrons_per_unit;
            }
        }

        let rng = &mut self.rng;
        if self.shot_noise {
            electrons.mapv_inplace(|mean| match Poisson::new(mean) {
                Ok(poisson) => poisson.sample(&mut *rng),
                Err(_) => 0.0,
            });
        }
        electrons.mapv_inplace(|e| e + read_noise.sample(&mut *rng));

        self.raw = electrons.mapv(|e| self.sensor.quantize(e));
        let dn = self.raw.mapv(|v| v as f32);
        self.image.replace(dn.insert_axis(ndarray::Axis(0)));
        trace!("camera read out {width}x{height} ROI at ({x0}, {y0}) (wait: {wait_to_finish})");
        Ok(())
    }

    fn image(&self) -> SharedImage {
        self.image.clone()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.input = None;
            self.raw = Array2::zeros((0, 0));
            self.image.replace(Array3::zeros((0, 0, 0)));
        }
    }
}

impl CameraUnit for ScmosCamera {
    fn set_input_image(&mut self, image: SharedImage) {
        self.input = Some(image);
        self.update_pending = true;
    }

    fn set_centered_roi(&mut self, offset_x: i64, offset_y: i64, width: usize, height: usize) {
        let place = |size: usize, max: usize, offset: i64| {
            let size = size.clamp(1, max.max(1));
            let centered = ((max - size) / 2) as i64 + offset;
            let start = centered.clamp(0, (max - size) as i64) as usize;
            (start, size)
        };
        let (x, width) = place(width, self.max_width, offset_x);
        let (y, height) = place(height, self.max_height, offset_y);
        self.roi = Roi { x, y, width, height };
        self.update_pending = true;
    }

    fn set_down_up_vector(&mut self, down_up: &Vector3<f32>) {
        self.down_up = *down_up;
        self.update_pending = true;
    }

    fn max_width(&self) -> usize {
        self.max_width
    }

    fn max_height(&self) -> usize {
        self.max_height
    }

    fn raw_buffer(&self) -> Array2<u16> {
        self.raw.clone()
    }

    fn is_update_pending(&self) -> bool {
        self.update_pending
    }

    fn clear_update(&mut self) {
        self.update_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn ideal_camera(w: usize, h: usize) -> ScmosCamera {
        let mut camera = ScmosCamera::new(w, h, models::IDEAL.clone(), Some(7));
        camera.set_shot_noise(false);
        camera
    }

    fn gradient(w: usize, h: usize) -> SharedImage {
        let data = Array3::from_shape_fn((1, h, w), |(_, y, _)| y as f32 / (h - 1) as f32);
        Arc::new(VolumeImage::from_array(data))
    }

    #[test]
    fn test_roi_defaults_to_full_sensor() {
        let camera = ideal_camera(32, 24);
        assert_eq!(camera.roi(), (0, 0, 32, 24));
    }

    #[test]
    fn test_centered_roi_and_offsets() {
        let mut camera = ideal_camera(32, 32);
        camera.set_centered_roi(0, 0, 16, 8);
        assert_eq!(camera.roi(), (8, 12, 16, 8));

        camera.set_centered_roi(4, -20, 16, 8);
        assert_eq!(camera.roi(), (12, 0, 16, 8));

        camera.set_centered_roi(0, 0, 100, 0);
        assert_eq!(camera.roi(), (0, 15, 32, 1));
    }

    #[test]
    fn test_output_matches_roi() {
        let mut camera = ideal_camera(32, 32);
        camera.set_input_image(gradient(64, 64));
        camera.set_centered_roi(0, 0, 10, 6);
        camera.render(true).unwrap();

        assert_eq!(camera.raw_buffer().dim(), (6, 10));
        assert_eq!(camera.image().dimensions(), (10, 6, 1));
    }

    #[test]
    fn test_down_up_flips_rows() {
        let mut upright = ideal_camera(8, 8);
        upright.set_input_image(gradient(8, 8));
        upright.render(true).unwrap();

        let mut flipped = ideal_camera(8, 8);
        flipped.set_input_image(gradient(8, 8));
        flipped.set_down_up_vector(&Vector3::new(0.0, -1.0, 0.0));
        flipped.render(true).unwrap();

        let a = upright.raw_buffer();
        let b = flipped.raw_buffer();
        assert_eq!(a[[0, 3]], 0);
        assert_eq!(a[[7, 3]], 1000);
        assert_eq!(b[[0, 3]], 1000);
        assert_eq!(b[[7, 3]], 0);
    }

    #[test]
    fn test_quantize_clips_to_bit_depth() {
        let mut sensor = models::IDEAL.clone();
        sensor.bit_depth = 8;
        assert_eq!(sensor.quantize(-5.0), 0);
        assert_eq!(sensor.quantize(100.4), 100);
        assert_eq!(sensor.quantize(1e9), 255);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let render = || {
            let mut camera = ScmosCamera::new(8, 8, models::ORCA_FLASH4.clone(), Some(42));
            camera.set_input_image(gradient(8, 8));
            camera.render(true).unwrap();
            camera.raw_buffer()
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_negative_read_noise_is_reported() {
        let mut sensor = models::IDEAL.clone();
        sensor.read_noise_e = -1.0;
        let mut camera = ScmosCamera::new(4, 4, sensor, Some(1));
        assert!(matches!(camera.render(true), Err(RenderError::InvalidSetting(_))));

        let mut sensor = models::IDEAL.clone();
        sensor.read_noise_e = f64::NAN;
        let mut camera = ScmosCamera::new(4, 4, sensor, Some(1));
        assert!(matches!(camera.render(true), Err(RenderError::InvalidSetting(_))));
    }
}
