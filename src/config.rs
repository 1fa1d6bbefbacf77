//! Microscope configuration files
//!
//! A configuration describes the hardware layout (volume size, number of
//! arms and paths, camera size and sensor) plus optional parameter
//! overrides, so a simulation can be reproduced from a single JSON file:
//!
//! ```json
//! {
//!   "volume": [128, 128, 128],
//!   "detection_paths": 2,
//!   "illumination_arms": 2,
//!   "camera_resolution": 256,
//!   "noise_seed": 7,
//!   "parameters": { "Illumination.Height": { "0": 0.5 } }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::host::{sensor_models, SensorModel};
use crate::device::HostDevice;
use crate::error::SimulatorError;
use crate::microscope::LightSheetMicroscope;
use crate::parameters::{ParameterError, ParameterPreset, ParameterStore};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid parameter overrides: {0}")]
    Parameters(#[from] ParameterError),
    #[error("failed to assemble microscope: {0}")]
    Simulator(#[from] SimulatorError),
}

/// Layout and settings of a simulated microscope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicroscopeConfig {
    /// Main volume `(width, height, depth)`
    pub volume: (usize, usize, usize),
    pub detection_paths: usize,
    pub illumination_arms: usize,
    /// Side length of every camera sensor in pixels
    pub camera_resolution: usize,
    pub sensor: SensorModel,
    /// Seed for camera noise; unseeded when absent
    pub noise_seed: Option<u64>,
    /// Parameter overrides applied on top of the defaults
    pub parameters: ParameterPreset,
}

impl Default for MicroscopeConfig {
    fn default() -> Self {
        Self {
            volume: (128, 128, 128),
            detection_paths: 2,
            illumination_arms: 2,
            camera_resolution: 256,
            sensor: sensor_models::ORCA_FLASH4.clone(),
            noise_seed: None,
            parameters: ParameterPreset::default(),
        }
    }
}

impl MicroscopeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Host device configured with this sensor and noise seed
    pub fn host_device(&self) -> HostDevice {
        HostDevice::new()
            .with_sensor(self.sensor.clone())
            .with_noise_seed(self.noise_seed)
    }

    /// Parameter store holding the configured overrides
    pub fn parameter_store(&self) -> Result<Arc<ParameterStore>, ConfigError> {
        let store = ParameterStore::new();
        store.apply_preset(&self.parameters)?;
        Ok(Arc::new(store))
    }

    /// Build an orthogonal microscope on the host device
    pub fn build_host_microscope(&self) -> Result<LightSheetMicroscope<HostDevice>, ConfigError> {
        let microscope = LightSheetMicroscope::ortho(
            self.host_device(),
            self.parameter_store()?,
            self.detection_paths,
            self.illumination_arms,
            self.camera_resolution,
            self.volume,
        )?;
        Ok(microscope)
    }
}
