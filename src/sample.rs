//! Synthetic samples providing fluorescence and scattering phantoms
//!
//! A [`Sample`] renders its phantom volumes on demand. The microscope only
//! stores and forwards the resulting images through the parameter store's
//! phantom slots; see [`LightSheetMicroscope::render_sample`].

use std::sync::Arc;

use log::debug;
use nalgebra::Point3;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, UnitSphere};

use crate::algo::trilinear::normalized_coordinate;
use crate::device::{ComputeDevice, SharedImage, VolumeImage};
use crate::microscope::{LightSheetMicroscope, Result};
use crate::parameters::PhantomParameter;

/// Source of phantom volumes
pub trait Sample {
    /// Bring the phantom images up to date
    fn render_phantoms(&mut self);

    /// Fluorescence phantom; the handle stays the same across renders
    fn fluorescence(&self) -> SharedImage;

    /// Scattering phantom, if the sample scatters
    fn scattering(&self) -> Option<SharedImage>;
}

/// Fluorescent nuclei scattered over the surface of a hollow sphere, like an
/// early embryo, with a uniformly scattering interior.
///
/// The scattering volume is rendered at half the lateral and axial
/// resolution of the fluorescence volume.
#[derive(Debug)]
pub struct SpheroidSample {
    nuclei: Vec<Point3<f32>>,
    /// Radius of the shell carrying the nuclei, normalized units
    shell_radius: f32,
    /// Radius of each nucleus, normalized units
    nucleus_radius: f32,
    /// Scattering density inside the shell
    scattering_density: f32,
    fluorescence: SharedImage,
    scattering: SharedImage,
    dirty: bool,
}

impl SpheroidSample {
    /// Sample with `nuclei` nuclei placed at random from `seed`.
    ///
    /// `dimensions` is the `(width, height, depth)` of the fluorescence
    /// phantom.
    pub fn new(dimensions: (usize, usize, usize), nuclei: usize, seed: u64) -> Self {
        let shell_radius = 0.3;
        let mut rng = StdRng::seed_from_u64(seed);
        let nuclei = (0..nuclei)
            .map(|_| {
                let [x, y, z]: [f32; 3] = UnitSphere.sample(&mut rng);
                // slight radial jitter so nuclei do not sit on a perfect shell
                let r = shell_radius * (1.0 + 0.05 * (rng.gen::<f32>() - 0.5));
                Point3::new(0.5 + r * x, 0.5 + r * y, 0.5 + r * z)
            })
            .collect();

        let (width, height, depth) = dimensions;
        let half = ((width / 2).max(1), (height / 2).max(1), (depth / 2).max(1));
        Self {
            nuclei,
            shell_radius,
            nucleus_radius: 0.04,
            scattering_density: 0.2,
            fluorescence: VolumeImage::shared_zeros(dimensions),
            scattering: VolumeImage::shared_zeros(half),
            dirty: true,
        }
    }

    pub fn nuclei(&self) -> &[Point3<f32>] {
        &self.nuclei
    }

    pub fn set_nucleus_radius(&mut self, radius: f32) {
        self.nucleus_radius = radius;
        self.dirty = true;
    }

    pub fn set_scattering_density(&mut self, density: f32) {
        self.scattering_density = density;
        self.dirty = true;
    }

    fn rasterize_fluorescence(&self) -> Array3<f32> {
        let (width, height, depth) = self.fluorescence.dimensions();
        let sigma2 = 2.0 * (self.nucleus_radius / 2.0).powi(2);
        let cutoff2 = (2.0 * self.nucleus_radius).powi(2);
        Array3::from_shape_fn((depth, height, width), |(z, y, x)| {
            let p = Point3::new(
                normalized_coordinate(x, width),
                normalized_coordinate(y, height),
                normalized_coordinate(z, depth),
            );
            let value: f32 = self
                .nuclei
                .iter()
                .map(|n| (p - n).norm_squared())
                .filter(|d2| *d2 < cutoff2)
                .map(|d2| (-d2 / sigma2).exp())
                .sum();
            value.min(1.0)
        })
    }

    fn rasterize_scattering(&self) -> Array3<f32> {
        let (width, height, depth) = self.scattering.dimensions();
        let center = Point3::new(0.5, 0.5, 0.5);
        let outer = self.shell_radius + self.nucleus_radius;
        Array3::from_shape_fn((depth, height, width), |(z, y, x)| {
            let p = Point3::new(
                normalized_coordinate(x, width),
                normalized_coordinate(y, height),
                normalized_coordinate(z, depth),
            );
            if (p - center).norm() <= outer {
                self.scattering_density
            } else {
                0.0
            }
        })
    }
}

impl Sample for SpheroidSample {
    fn render_phantoms(&mut self) {
        if !self.dirty {
            return;
        }
        self.fluorescence.replace(self.rasterize_fluorescence());
        self.scattering.replace(self.rasterize_scattering());
        self.dirty = false;
        debug!(
            "rendered spheroid phantoms with {} nuclei at {:?}",
            self.nuclei.len(),
            self.fluorescence.dimensions()
        );
    }

    fn fluorescence(&self) -> SharedImage {
        Arc::clone(&self.fluorescence)
    }

    fn scattering(&self) -> Option<SharedImage> {
        Some(Arc::clone(&self.scattering))
    }
}

impl<D: ComputeDevice> LightSheetMicroscope<D> {
    /// Render the sample's phantoms, publish them to the parameter store and
    /// render every detection path.
    pub fn render_sample<S: Sample + ?Sized>(
        &mut self,
        sample: &mut S,
        wait_to_finish: bool,
    ) -> Result<()> {
        sample.render_phantoms();
        let parameters = self.parameters();
        parameters.set_phantom(PhantomParameter::Fluorescence, sample.fluorescence());
        if let Some(scattering) = sample.scattering() {
            parameters.set_phantom(PhantomParameter::Scattering, scattering);
        }
        self.render(wait_to_finish)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_nuclei_lie_near_shell() {
        let sample = SpheroidSample::new((16, 16, 16), 50, 3);
        assert_eq!(sample.nuclei().len(), 50);
        for n in sample.nuclei() {
            let r = (n - Point3::new(0.5, 0.5, 0.5)).norm();
            assert!((r - 0.3).abs() < 0.01, "{r}");
        }
    }

    #[test]
    fn test_same_seed_same_sample() {
        let a = SpheroidSample::new((8, 8, 8), 10, 11);
        let b = SpheroidSample::new((8, 8, 8), 10, 11);
        assert_eq!(a.nuclei(), b.nuclei());
    }

    #[test]
    fn test_phantoms_rendered_in_place() {
        let mut sample = SpheroidSample::new((16, 16, 16), 30, 5);
        let fluorescence = sample.fluorescence();
        sample.render_phantoms();

        assert!(Arc::ptr_eq(&fluorescence, &sample.fluorescence()));
        let max = fluorescence.read().iter().cloned().fold(0.0f32, f32::max);
        assert!(max > 0.0 && max <= 1.0);

        let scattering = sample.scattering().unwrap();
        assert_eq!(scattering.dimensions(), (8, 8, 8));
        // center of the spheroid scatters, the corner does not
        assert_relative_eq!(scattering.read()[[4, 4, 4]], 0.2);
        assert_relative_eq!(scattering.read()[[0, 0, 0]], 0.0);
    }

    #[test]
    fn test_changing_density_rerenders() {
        let mut sample = SpheroidSample::new((8, 8, 8), 5, 1);
        sample.render_phantoms();
        sample.set_scattering_density(0.7);
        sample.render_phantoms();
        assert_relative_eq!(sample.scattering().unwrap().read()[[2, 2, 2]], 0.7);
    }
}
