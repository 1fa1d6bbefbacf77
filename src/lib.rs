//! Multi-arm light-sheet microscope simulation
//!
//! This crate drives a simulated light-sheet microscope: illumination arms
//! produce light maps that are chained into one accumulated light map per
//! detection path, detection optics image the fluorescent sample under that
//! light, and camera sinks read the result out as sensor counts. Numeric
//! settings live in a shared [`ParameterStore`] and are applied to every unit
//! right before it renders, so parameters can change between frames.
//!
//! The optics themselves are computed by render units allocated from a
//! [`device::ComputeDevice`]; [`HostDevice`] provides a CPU implementation.

pub mod algo;
pub mod config;
pub mod device;
pub mod error;
pub mod image_proc;
pub mod microscope;
pub mod parameters;
pub mod sample;
pub mod shared_args;
pub mod transform;

// Re-exports for easier access
pub use config::MicroscopeConfig;
pub use device::{HostDevice, SharedImage, VolumeImage};
pub use error::{Component, SimulatorError};
pub use microscope::{ArmHandle, LightSheetMicroscope, MicroscopeState, PathHandle};
pub use parameters::{
    CameraParameter, DetectionParameter, IlluminationParameter, NumberParameter, ParameterPreset,
    ParameterStore, PhantomParameter, StageParameter, UnitConversion,
};
pub use sample::{Sample, SpheroidSample};
pub use transform::TransformComposer;
