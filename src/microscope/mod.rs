//! Multi-arm light-sheet microscope orchestrator
//!
//! A [`LightSheetMicroscope`] owns the illumination arms, detection paths and
//! camera sinks allocated on a [`ComputeDevice`], links every arm to every
//! path when built, and drives the per-frame render sequence:
//!
//! 1. refresh each linked arm from the parameter store and chain their light
//!    maps (first arm gets no input, each later arm gets its predecessor's
//!    output),
//! 2. render the detection optics of the path over the accumulated light map,
//! 3. read the detection image out through the path's camera.
//!
//! Only the camera render honours the caller's `wait` flag; every other unit
//! renders without waiting.

mod ortho;

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use nalgebra::{Matrix4, Vector3};
use ndarray::Array2;

use crate::algo::geometry::closest_odd_integer;
use crate::device::{
    CameraUnit, ComputeDevice, DetectionUnit, IlluminationUnit, Renderable, SharedImage,
};
use crate::error::{Component, SimulatorError};
use crate::parameters::{
    CameraParameter, DetectionParameter, IlluminationParameter, ParameterStore, PhantomParameter,
    UnitConversion,
};
use crate::transform::TransformComposer;

/// Result type used by the orchestrator
pub type Result<T> = std::result::Result<T, SimulatorError>;

/// Depth of the light map relative to the main volume depth
const LIGHT_MAP_DEPTH_FACTOR: f32 = 1.0;
/// Lateral downscale of the light map relative to the main volume
const LIGHT_MAP_LATERAL_DIVISOR: usize = 4;

/// Index of an illumination arm, in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArmHandle(usize);

impl ArmHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a detection path (and its camera), in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathHandle(usize);

impl PathHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle of a microscope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroscopeState {
    /// Arms and paths may be added
    Configured,
    /// Linked and renderable
    Built,
    /// Every unit released; terminal
    Closed,
}

/// Light-sheet microscope simulator driving render units of a compute device
pub struct LightSheetMicroscope<D: ComputeDevice> {
    device: D,
    dimensions: (usize, usize, usize),
    parameters: Arc<ParameterStore>,
    transforms: TransformComposer,
    light_sheets: Vec<D::Illumination>,
    detections: Vec<D::Detection>,
    cameras: Vec<D::Camera>,
    /// Arm indices feeding each detection path
    links: Vec<Vec<usize>>,
    state: MicroscopeState,
}

impl<D: ComputeDevice> LightSheetMicroscope<D> {
    /// Microscope with a fresh parameter store
    pub fn new(device: D, dimensions: (usize, usize, usize)) -> Self {
        Self::with_parameters(device, Arc::new(ParameterStore::new()), dimensions)
    }

    /// Microscope reading from a caller-owned parameter store.
    ///
    /// `dimensions` is `(width, height, depth)` of the main volume and is
    /// adapted to the device before anything is allocated.
    pub fn with_parameters(
        device: D,
        parameters: Arc<ParameterStore>,
        dimensions: (usize, usize, usize),
    ) -> Self {
        let adapted = device.adapt_dimensions(dimensions);
        if adapted != dimensions {
            debug!("volume {dimensions:?} adapted to {adapted:?} by device");
        }
        Self {
            device,
            dimensions: adapted,
            transforms: TransformComposer::new(parameters.clone()),
            parameters,
            light_sheets: Vec::new(),
            detections: Vec::new(),
            cameras: Vec::new(),
            links: Vec::new(),
            state: MicroscopeState::Configured,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Device-adapted `(width, height, depth)` of the main volume
    pub fn dimensions(&self) -> (usize, usize, usize) {
        self.dimensions
    }

    pub fn width(&self) -> usize {
        self.dimensions.0
    }

    pub fn height(&self) -> usize {
        self.dimensions.1
    }

    pub fn depth(&self) -> usize {
        self.dimensions.2
    }

    /// Parameter store read before every render
    pub fn parameters(&self) -> &Arc<ParameterStore> {
        &self.parameters
    }

    pub fn state(&self) -> MicroscopeState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == MicroscopeState::Closed
    }

    /// Light map dimensions derived from the main volume
    pub fn light_map_dimensions(&self) -> (usize, usize, usize) {
        let (width, height, depth) = self.dimensions;
        let odd_depth = closest_odd_integer(depth as f32 * LIGHT_MAP_DEPTH_FACTOR).max(1) as usize;
        (
            width / LIGHT_MAP_LATERAL_DIVISOR,
            height / LIGHT_MAP_LATERAL_DIVISOR,
            depth.min(odd_depth),
        )
    }

    fn check_configurable(&self) -> Result<()> {
        match self.state {
            MicroscopeState::Configured => Ok(()),
            MicroscopeState::Built => Err(SimulatorError::AlreadyBuilt),
            MicroscopeState::Closed => Err(SimulatorError::Closed),
        }
    }

    fn check_renderable(&self) -> Result<()> {
        match self.state {
            MicroscopeState::Built => Ok(()),
            MicroscopeState::Configured => Err(SimulatorError::NotBuilt),
            MicroscopeState::Closed => Err(SimulatorError::Closed),
        }
    }

    /// Add an illumination arm propagating along `axis` with sheet `normal`
    pub fn add_illumination_arm(
        &mut self,
        axis: Vector3<f32>,
        normal: Vector3<f32>,
    ) -> Result<ArmHandle> {
        self.check_configurable()?;
        let index = self.light_sheets.len();
        let dims = self.light_map_dimensions();

        let mut light_sheet = self
            .device
            .create_illumination(dims)
            .map_err(SimulatorError::allocation(Component::LightSheet(index)))?;
        light_sheet.set_axis_and_normal(&axis, &normal);
        self.light_sheets.push(light_sheet);

        debug!("added light sheet #{index} with light map {dims:?}");
        Ok(ArmHandle(index))
    }

    /// Add a detection path with its camera.
    ///
    /// `detection_transform` maps the path's frame into the sample frame and
    /// is fixed from here on. The camera reads out at most
    /// `max_width x max_height` pixels.
    pub fn add_detection_path(
        &mut self,
        detection_transform: Matrix4<f32>,
        down_up: Vector3<f32>,
        max_width: usize,
        max_height: usize,
    ) -> Result<PathHandle> {
        self.check_configurable()?;
        let index = self.detections.len();
        let (width, height, _) = self.dimensions;

        let mut detection = self
            .device
            .create_detection(width, height)
            .map_err(SimulatorError::allocation(Component::DetectionOptics(index)))?;
        let mut camera = match self.device.create_camera(max_width, max_height) {
            Ok(camera) => camera,
            Err(source) => {
                detection.close();
                return Err(SimulatorError::allocation(Component::Camera(index))(source));
            }
        };
        camera.set_down_up_vector(&down_up);
        camera.set_input_image(detection.image());

        let transform_index = self.transforms.push_detection_transform(detection_transform);
        debug_assert_eq!(transform_index, index);
        self.detections.push(detection);
        self.cameras.push(camera);

        debug!("added detection path #{index} with {max_width}x{max_height} camera");
        Ok(PathHandle(index))
    }

    /// Link every illumination arm to every detection path.
    ///
    /// Must be called once, after all arms and paths are added and before
    /// the first render.
    pub fn build(&mut self) -> Result<()> {
        self.check_configurable()?;
        let arms: Vec<usize> = (0..self.light_sheets.len()).collect();
        self.links = vec![arms; self.detections.len()];
        self.state = MicroscopeState::Built;

        info!(
            "built microscope {:?} with {} light sheet(s) and {} detection path(s)",
            self.dimensions,
            self.light_sheets.len(),
            self.detections.len()
        );
        Ok(())
    }

    pub fn number_of_light_sheets(&self) -> usize {
        self.light_sheets.len()
    }

    pub fn number_of_detection_paths(&self) -> usize {
        self.detections.len()
    }

    /// Arm indices linked to each detection path, in render order
    pub fn links(&self) -> &[Vec<usize>] {
        &self.links
    }

    fn check_index(kind: &'static str, index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(SimulatorError::IndexOutOfRange { kind, index, len })
        }
    }

    pub fn light_sheet(&self, index: usize) -> Result<&D::Illumination> {
        self.light_sheets
            .get(index)
            .ok_or(SimulatorError::IndexOutOfRange {
                kind: "light sheet",
                index,
                len: self.light_sheets.len(),
            })
    }

    pub fn detection_optics(&self, index: usize) -> Result<&D::Detection> {
        self.detections
            .get(index)
            .ok_or(SimulatorError::IndexOutOfRange {
                kind: "detection path",
                index,
                len: self.detections.len(),
            })
    }

    pub fn camera(&self, index: usize) -> Result<&D::Camera> {
        self.cameras.get(index).ok_or(SimulatorError::IndexOutOfRange {
            kind: "camera",
            index,
            len: self.cameras.len(),
        })
    }

    /// Mutable camera access, e.g. to change its noise settings
    pub fn camera_mut(&mut self, index: usize) -> Result<&mut D::Camera> {
        let len = self.cameras.len();
        self.cameras.get_mut(index).ok_or(SimulatorError::IndexOutOfRange {
            kind: "camera",
            index,
            len,
        })
    }

    /// Detection transform given when path `index` was added
    pub fn detection_transform(&self, index: usize) -> Result<Matrix4<f32>> {
        self.transforms
            .detection_transform(index)
            .ok_or(SimulatorError::IndexOutOfRange {
                kind: "detection path",
                index,
                len: self.transforms.len(),
            })
    }

    /// Stage transform from the current parameters
    pub fn stage_transform(&self) -> Matrix4<f32> {
        self.transforms.stage_transform()
    }

    /// Stage transform composed with the detection transform of path `index`
    pub fn combined_transform(&self, index: usize) -> Result<Matrix4<f32>> {
        self.transforms
            .combined_transform(index)
            .ok_or(SimulatorError::IndexOutOfRange {
                kind: "detection path",
                index,
                len: self.transforms.len(),
            })
    }

    /// Output image of the camera of path `index`
    pub fn camera_image(&self, index: usize) -> Result<SharedImage> {
        Ok(self.camera(index)?.image())
    }

    /// Quantized sensor counts of the camera of path `index`
    pub fn camera_raw_buffer(&self, index: usize) -> Result<Array2<u16>> {
        Ok(self.camera(index)?.raw_buffer())
    }

    /// Copy the raw counts of camera `index`, row-major, into `dest` starting
    /// at `offset`. Returns the number of values written.
    pub fn copy_camera_image_to(
        &self,
        index: usize,
        dest: &mut [u16],
        offset: usize,
    ) -> Result<usize> {
        let raw = self.camera_raw_buffer(index)?;
        let needed = raw.len();
        let available = dest.len();
        let target = dest
            .get_mut(offset..)
            .and_then(|tail| tail.get_mut(..needed))
            .ok_or(SimulatorError::BufferTooSmall {
                needed,
                offset,
                available,
            })?;
        for (d, s) in target.iter_mut().zip(raw.iter()) {
            *d = *s;
        }
        Ok(needed)
    }

    /// Render every detection path in order; only the last camera render
    /// waits when `wait_to_finish` is set.
    pub fn render(&mut self, wait_to_finish: bool) -> Result<()> {
        self.check_renderable()?;
        let count = self.detections.len();
        for path in 0..count {
            self.render_path(path, wait_to_finish && path + 1 == count)?;
        }
        Ok(())
    }

    /// Render one detection path, including the light sheets linked to it
    pub fn render_path(&mut self, path: usize, wait_to_finish: bool) -> Result<()> {
        self.check_renderable()?;
        Self::check_index("detection path", path, self.detections.len())?;

        let stage = self.transforms.stage_transform();
        let detection_transform = self.detection_transform(path)?;
        let combined = stage * detection_transform;
        let scattering = self.parameters.phantom(PhantomParameter::Scattering);

        let linked = self.links[path].clone();
        for &arm in &linked {
            self.apply_light_sheet_parameters(
                arm,
                &detection_transform,
                &stage,
                scattering.clone(),
            );
        }

        let mut light_map: Option<SharedImage> = None;
        for &arm in &linked {
            let light_sheet = &mut self.light_sheets[arm];
            light_sheet.set_input(light_map.take());
            let start = Instant::now();
            light_sheet
                .render(false)
                .map_err(SimulatorError::render(Component::LightSheet(arm)))?;
            debug!("render_light_sheet #{arm}: {:?}", start.elapsed());
            light_map = Some(light_sheet.image());
        }

        self.apply_detection_parameters(path, &combined, scattering, light_map);
        let detection = &mut self.detections[path];
        let start = Instant::now();
        detection
            .render(false)
            .map_err(SimulatorError::render(Component::DetectionOptics(path)))?;
        debug!("render_detection #{path}: {:?}", start.elapsed());
        let detection_image = detection.image();

        let p = &self.parameters;
        let camera = &mut self.cameras[path];
        let offset_x = p.number(CameraParameter::RoiOffsetX, path) as i64;
        let offset_y = p.number(CameraParameter::RoiOffsetY, path) as i64;
        let roi_width = p.number_or(CameraParameter::RoiWidth, path, camera.max_width() as f64);
        let roi_height = p.number_or(CameraParameter::RoiHeight, path, camera.max_height() as f64);

        camera.set_input_image(detection_image);
        camera.set_centered_roi(offset_x, offset_y, roi_width as usize, roi_height as usize);
        let start = Instant::now();
        camera
            .render(wait_to_finish)
            .map_err(SimulatorError::render(Component::Camera(path)))?;
        debug!("render_camera #{path}: {:?}", start.elapsed());

        self.detections[path].clear_update();
        self.cameras[path].clear_update();
        Ok(())
    }

    fn apply_light_sheet_parameters(
        &mut self,
        arm: usize,
        detection_transform: &Matrix4<f32>,
        stage: &Matrix4<f32>,
        scattering: Option<SharedImage>,
    ) {
        let p = &self.parameters;
        let length = p.number(UnitConversion::Length, 0) as f32;
        let laser = p.number(UnitConversion::LaserIntensity, 0) as f32;
        let get = |key: IlluminationParameter| p.number(key, arm) as f32;

        let light_sheet = &mut self.light_sheets[arm];
        light_sheet.set_detection_transform(detection_transform);
        light_sheet.set_phantom_transform(stage);
        light_sheet.set_scattering_phantom(scattering);
        light_sheet.set_intensity(get(IlluminationParameter::Intensity) / laser);
        light_sheet.set_wavelength(get(IlluminationParameter::Wavelength));
        light_sheet.set_position(
            get(IlluminationParameter::X) / length + 0.5,
            get(IlluminationParameter::Y) / length + 0.5,
            get(IlluminationParameter::Z) / length + 0.5,
        );
        light_sheet.set_height(get(IlluminationParameter::Height) / length);
        light_sheet.set_orientation(
            get(IlluminationParameter::Alpha),
            get(IlluminationParameter::Beta),
            get(IlluminationParameter::Gamma),
            get(IlluminationParameter::Theta),
        );
    }

    fn apply_detection_parameters(
        &mut self,
        path: usize,
        combined: &Matrix4<f32>,
        scattering: Option<SharedImage>,
        light_map: Option<SharedImage>,
    ) {
        let p = &self.parameters;
        let length = p.number(UnitConversion::Length, 0) as f32;
        let fluorescence = p.phantom(PhantomParameter::Fluorescence);
        let (width, height) = match &fluorescence {
            Some(phantom) => (phantom.width(), phantom.height()),
            None => {
                warn!("no fluorescence phantom set; detection path #{path} renders a dark image");
                (self.dimensions.0, self.dimensions.1)
            }
        };

        let detection = &mut self.detections[path];
        detection.set_intensity(p.number(DetectionParameter::Intensity, path) as f32);
        detection.set_wavelength(p.number(DetectionParameter::Wavelength, path) as f32);
        detection.set_focus_z(p.number(DetectionParameter::FocusZ, path) as f32 / length + 0.5);
        detection.set_width(width);
        detection.set_height(height);
        detection.set_phantom_transform(combined);
        detection.set_fluorescence_phantom(fluorescence);
        detection.set_scattering_phantom(scattering);
        detection.set_light_map(light_map);
    }

    /// Release every unit. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.state == MicroscopeState::Closed {
            return;
        }
        for light_sheet in &mut self.light_sheets {
            light_sheet.close();
        }
        for detection in &mut self.detections {
            detection.close();
        }
        for camera in &mut self.cameras {
            camera.close();
        }
        self.state = MicroscopeState::Closed;
        info!("microscope closed");
    }
}

impl<D: ComputeDevice> Drop for LightSheetMicroscope<D> {
    fn drop(&mut self) {
        self.close();
    }
}
