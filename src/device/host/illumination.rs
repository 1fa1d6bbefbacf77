use std::f32::consts::PI;

use log::trace;
use nalgebra::{Matrix4, Point3, Rotation3, Unit, Vector3};
use ndarray::{Array3, Zip};

use crate::algo::geometry::rotation_from_degrees;
use crate::algo::trilinear::{normalized_coordinate, sample_trilinear};
use crate::device::{IlluminationUnit, Renderable, SharedImage, VolumeImage};
use crate::error::RenderError;

/// Beam waist of the sheet at its focus, normalized units
const SHEET_WAIST: f32 = 0.01;
/// Edge softness of the sheet along its height, normalized units
const HEIGHT_EDGE: f32 = 0.02;
/// Attenuation per unit of scattering density per normalized length
const SCATTERING_COEFFICIENT: f32 = 4.0;
/// Samples used to integrate attenuation along the propagation axis
const ATTENUATION_STEPS: usize = 16;

/// Gaussian light sheet with Beer-Lambert attenuation through the
/// scattering phantom.
///
/// The light map is expressed in the frame of the detection path being
/// rendered; sample-space coordinates are obtained by applying the phantom
/// (stage) transform after the detection transform.
#[derive(Debug)]
pub struct LightSheetIllumination {
    light_map: SharedImage,
    input: Option<SharedImage>,
    scattering: Option<SharedImage>,
    axis: Vector3<f32>,
    normal: Vector3<f32>,
    intensity: f32,
    wavelength: f32,
    position: Point3<f32>,
    height: f32,
    angles: [f32; 4],
    detection_transform: Matrix4<f32>,
    phantom_transform: Matrix4<f32>,
    closed: bool,
}

impl LightSheetIllumination {
    pub(super) fn new(dims: (usize, usize, usize)) -> Self {
        Self {
            light_map: VolumeImage::shared_zeros(dims),
            input: None,
            scattering: None,
            axis: Vector3::x(),
            normal: Vector3::z(),
            intensity: 1.0,
            wavelength: 0.0005,
            position: Point3::new(0.5, 0.5, 0.5),
            height: 1.0,
            angles: [0.0; 4],
            detection_transform: Matrix4::identity(),
            phantom_transform: Matrix4::identity(),
            closed: false,
        }
    }

    /// Propagation axis and sheet normal after applying the orientation angles
    pub fn effective_axes(&self) -> (Unit<Vector3<f32>>, Unit<Vector3<f32>>) {
        let [alpha, beta, gamma, theta] = self.angles;
        let rotation = rotation_from_degrees(alpha, beta, gamma);
        let axis = Unit::new_normalize(rotation * self.axis);
        let tilt = Rotation3::from_axis_angle(&axis, theta.to_radians());
        let normal = Unit::new_normalize(tilt * (rotation * self.normal));
        (axis, normal)
    }

    /// Sheet thickness (standard deviation) at distance `d` from the focus
    fn sheet_sigma(&self, d: f32) -> f32 {
        let rayleigh = PI * SHEET_WAIST * SHEET_WAIST / self.wavelength.max(f32::EPSILON);
        SHEET_WAIST * (1.0 + (d / rayleigh).powi(2)).sqrt()
    }

    fn attenuation(
        &self,
        scattering: Option<&Array3<f32>>,
        to_sample: &Matrix4<f32>,
        point: &Point3<f32>,
        axis: &Vector3<f32>,
    ) -> f32 {
        let Some(scattering) = scattering else {
            return 1.0;
        };
        // march back toward the side the light enters from
        let path_length = 3f32.sqrt();
        let step = path_length / ATTENUATION_STEPS as f32;
        let mut optical_depth = 0.0;
        for i in 1..=ATTENUATION_STEPS {
            let p = *point - axis * (step * i as f32);
            if !(0.0..=1.0).contains(&p.x)
                || !(0.0..=1.0).contains(&p.y)
                || !(0.0..=1.0).contains(&p.z)
            {
                break;
            }
            optical_depth += sample_trilinear(scattering, &to_sample.transform_point(&p)) * step;
        }
        (-SCATTERING_COEFFICIENT * optical_depth).exp()
    }
}

impl Renderable for LightSheetIllumination {
    fn render(&mut self, wait_to_finish: bool) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }
        let dims = self.light_map.dimensions();
        let (width, height, depth) = dims;

        let mut map = match &self.input {
            Some(input) => {
                let input_dims = input.dimensions();
                if input_dims != dims {
                    return Err(RenderError::DimensionMismatch {
                        expected: dims,
                        actual: input_dims,
                    });
                }
                input.read().clone()
            }
            None => Array3::zeros((depth, height, width)),
        };

        let (axis, normal) = self.effective_axes();
        let across = Unit::new_normalize(axis.cross(&*normal));
        let to_sample = self.phantom_transform * self.detection_transform;
        let half_height = self.height.max(0.0) / 2.0;
        let scattering_guard = self.scattering.as_ref().map(|s| s.read());
        let scattering = scattering_guard.as_deref();

        Zip::indexed(&mut map).for_each(|(z, y, x), value| {
            let p = Point3::new(
                normalized_coordinate(x, width),
                normalized_coordinate(y, height),
                normalized_coordinate(z, depth),
            );
            let offset = p - self.position;
            let along = axis.dot(&offset);
            let off_plane = normal.dot(&offset);
            let off_height = (across.dot(&offset).abs() - half_height).max(0.0);

            let sigma = self.sheet_sigma(along);
            let profile = (-off_plane * off_plane / (2.0 * sigma * sigma)).exp()
                * (-off_height * off_height / (2.0 * HEIGHT_EDGE * HEIGHT_EDGE)).exp();
            if profile < 1e-6 {
                return;
            }
            *value +=
                self.intensity * profile * self.attenuation(scattering, &to_sample, &p, &axis);
        });
        drop(scattering_guard);

        self.light_map.replace(map);
        trace!("light sheet rendered {width}x{height}x{depth} (wait: {wait_to_finish})");
        Ok(())
    }

    fn image(&self) -> SharedImage {
        self.light_map.clone()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.input = None;
            self.scattering = None;
            self.light_map.replace(Array3::zeros((0, 0, 0)));
        }
    }
}

impl IlluminationUnit for LightSheetIllumination {
    fn set_axis_and_normal(&mut self, axis: &Vector3<f32>, normal: &Vector3<f32>) {
        self.axis = *axis;
        self.normal = *normal;
    }

    fn set_input(&mut self, input: Option<SharedImage>) {
        self.input = input;
    }

    fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    fn set_wavelength(&mut self, wavelength: f32) {
        self.wavelength = wavelength;
    }

    fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Point3::new(x, y, z);
    }

    fn set_height(&mut self, height: f32) {
        self.height = height;
    }

    fn set_orientation(&mut self, alpha: f32, beta: f32, gamma: f32, theta: f32) {
        self.angles = [alpha, beta, gamma, theta];
    }

    fn set_detection_transform(&mut self, transform: &Matrix4<f32>) {
        self.detection_transform = *transform;
    }

    fn set_phantom_transform(&mut self, transform: &Matrix4<f32>) {
        self.phantom_transform = *transform;
    }

    fn set_scattering_phantom(&mut self, phantom: Option<SharedImage>) {
        self.scattering = phantom;
    }
}
