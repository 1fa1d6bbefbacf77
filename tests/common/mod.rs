//! Recording compute device for observing what the orchestrator asks of its
//! render units.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lightsheet_sim::device::{
    CameraUnit, ComputeDevice, DetectionUnit, IlluminationUnit, Renderable, SharedImage,
    VolumeImage,
};
use lightsheet_sim::error::{AllocationError, RenderError};
use nalgebra::{Matrix4, Vector3};
use ndarray::{Array2, Array3};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Arm(usize),
    Detection(usize),
    Camera(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Render {
        unit: Unit,
        /// Id of the input image seen at render time
        input: Option<u64>,
        wait: bool,
    },
    Close(Unit),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

fn record(log: &EventLog, event: Event) {
    log.lock().unwrap().push(event);
}

/// Which allocation, if any, should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailOn {
    #[default]
    Nothing,
    Illumination,
    Detection,
    Camera,
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub log: EventLog,
    pub fail_on: FailOn,
    arms: AtomicUsize,
    detections: AtomicUsize,
    cameras: AtomicUsize,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(fail_on: FailOn) -> Self {
        Self {
            fail_on,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    pub fn renders(&self) -> Vec<(Unit, Option<u64>, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Render { unit, input, wait } => Some((unit, input, wait)),
                Event::Close(_) => None,
            })
            .collect()
    }

    pub fn close_count(&self, unit: Unit) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == Event::Close(unit))
            .count()
    }

    pub fn cameras_created(&self) -> usize {
        self.cameras.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    fn refuse(&self) -> AllocationError {
        AllocationError::Device("refused by test device".to_string())
    }
}

impl ComputeDevice for RecordingDevice {
    type Illumination = MockIllumination;
    type Detection = MockDetection;
    type Camera = MockCamera;

    fn adapt_dimensions(&self, dims: (usize, usize, usize)) -> (usize, usize, usize) {
        dims
    }

    fn create_illumination(
        &self,
        dims: (usize, usize, usize),
    ) -> Result<MockIllumination, AllocationError> {
        if self.fail_on == FailOn::Illumination {
            return Err(self.refuse());
        }
        let index = self.arms.fetch_add(1, Ordering::SeqCst);
        Ok(MockIllumination {
            index,
            log: self.log.clone(),
            image: VolumeImage::shared_zeros(dims),
            input: None,
            axis: Vector3::zeros(),
            normal: Vector3::zeros(),
            intensity: 0.0,
            wavelength: 0.0,
            position: (0.0, 0.0, 0.0),
            height: 0.0,
            orientation: [0.0; 4],
            detection_transform: Matrix4::zeros(),
            phantom_transform: Matrix4::zeros(),
            scattering: None,
            closed: false,
        })
    }

    fn create_detection(
        &self,
        width: usize,
        height: usize,
    ) -> Result<MockDetection, AllocationError> {
        if self.fail_on == FailOn::Detection {
            return Err(self.refuse());
        }
        let index = self.detections.fetch_add(1, Ordering::SeqCst);
        Ok(MockDetection {
            index,
            log: self.log.clone(),
            image: VolumeImage::shared_zeros((width, height, 1)),
            width,
            height,
            fluorescence: None,
            scattering: None,
            light_map: None,
            intensity: 0.0,
            wavelength: 0.0,
            focus_z: 0.0,
            phantom_transform: Matrix4::zeros(),
            update_pending: false,
            closed: false,
        })
    }

    fn create_camera(
        &self,
        max_width: usize,
        max_height: usize,
    ) -> Result<MockCamera, AllocationError> {
        if self.fail_on == FailOn::Camera {
            return Err(self.refuse());
        }
        let index = self.cameras.fetch_add(1, Ordering::SeqCst);
        Ok(MockCamera {
            index,
            log: self.log.clone(),
            image: VolumeImage::shared_zeros((max_width, max_height, 1)),
            max_width,
            max_height,
            roi: (0, 0, max_width, max_height),
            down_up: Vector3::zeros(),
            input: None,
            raw: Array2::zeros((max_height, max_width)),
            update_pending: false,
            closed: false,
        })
    }
}

#[derive(Debug)]
pub struct MockIllumination {
    pub index: usize,
    log: EventLog,
    image: SharedImage,
    pub input: Option<SharedImage>,
    pub axis: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub intensity: f32,
    pub wavelength: f32,
    pub position: (f32, f32, f32),
    pub height: f32,
    pub orientation: [f32; 4],
    pub detection_transform: Matrix4<f32>,
    pub phantom_transform: Matrix4<f32>,
    pub scattering: Option<SharedImage>,
    closed: bool,
}

impl Renderable for MockIllumination {
    fn render(&mut self, wait_to_finish: bool) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }
        record(
            &self.log,
            Event::Render {
                unit: Unit::Arm(self.index),
                input: self.input.as_ref().map(|i| i.id()),
                wait: wait_to_finish,
            },
        );
        Ok(())
    }

    fn image(&self) -> SharedImage {
        self.image.clone()
    }

    fn close(&mut self) {
        self.closed = true;
        record(&self.log, Event::Close(Unit::Arm(self.index)));
    }
}

impl IlluminationUnit for MockIllumination {
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
        self.position = (x, y, z);
    }

    fn set_height(&mut self, height: f32) {
        self.height = height;
    }

    fn set_orientation(&mut self, alpha: f32, beta: f32, gamma: f32, theta: f32) {
        self.orientation = [alpha, beta, gamma, theta];
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

#[derive(Debug)]
pub struct MockDetection {
    pub index: usize,
    log: EventLog,
    image: SharedImage,
    pub width: usize,
    pub height: usize,
    pub fluorescence: Option<SharedImage>,
    pub scattering: Option<SharedImage>,
    pub light_map: Option<SharedImage>,
    pub intensity: f32,
    pub wavelength: f32,
    pub focus_z: f32,
    pub phantom_transform: Matrix4<f32>,
    update_pending: bool,
    closed: bool,
}

impl Renderable for MockDetection {
    fn render(&mut self, wait_to_finish: bool) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }
        record(
            &self.log,
            Event::Render {
                unit: Unit::Detection(self.index),
                input: self.light_map.as_ref().map(|i| i.id()),
                wait: wait_to_finish,
            },
        );
        self.image.replace(Array3::zeros((1, self.height, self.width)));
        Ok(())
    }

    fn image(&self) -> SharedImage {
        self.image.clone()
    }

    fn close(&mut self) {
        self.closed = true;
        record(&self.log, Event::Close(Unit::Detection(self.index)));
    }
}

impl DetectionUnit for MockDetection {
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

#[derive(Debug)]
pub struct MockCamera {
    pub index: usize,
    log: EventLog,
    image: SharedImage,
    max_width: usize,
    max_height: usize,
    /// `(offset_x, offset_y, width, height)` as last requested
    pub roi: (i64, i64, usize, usize),
    pub down_up: Vector3<f32>,
    pub input: Option<SharedImage>,
    raw: Array2<u16>,
    update_pending: bool,
    closed: bool,
}

impl Renderable for MockCamera {
    fn render(&mut self, wait_to_finish: bool) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }
        record(
            &self.log,
            Event::Render {
                unit: Unit::Camera(self.index),
                input: self.input.as_ref().map(|i| i.id()),
                wait: wait_to_finish,
            },
        );
        let (_, _, width, height) = self.roi;
        self.raw = Array2::from_shape_fn((height, width), |(r, c)| (r * width + c) as u16);
        Ok(())
    }

    fn image(&self) -> SharedImage {
        self.image.clone()
    }

    fn close(&mut self) {
        self.closed = true;
        record(&self.log, Event::Close(Unit::Camera(self.index)));
    }
}

impl CameraUnit for MockCamera {
    fn set_input_image(&mut self, image: SharedImage) {
        self.input = Some(image);
        self.update_pending = true;
    }

    fn set_centered_roi(&mut self, offset_x: i64, offset_y: i64, width: usize, height: usize) {
        self.roi = (offset_x, offset_y, width, height);
        self.update_pending = true;
    }

    fn set_down_up_vector(&mut self, down_up: &Vector3<f32>) {
        self.down_up = *down_up;
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
