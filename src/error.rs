//! Error types for the microscope simulator.
//!
//! Three layers of failure exist: the compute device can fail to allocate an
//! image, a render unit can fail while rendering, and the orchestrator rejects
//! calls that violate its lifecycle or index preconditions. Absent parameters
//! are never errors; they resolve to defaults.

use std::fmt;

use thiserror::Error;

/// Identity of the pipeline component that requested a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Illumination arm with its index
    LightSheet(usize),
    /// Detection optics with its path index
    DetectionOptics(usize),
    /// Camera sink with its path index
    Camera(usize),
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::LightSheet(i) => write!(f, "light sheet #{i}"),
            Component::DetectionOptics(i) => write!(f, "detection optics #{i}"),
            Component::Camera(i) => write!(f, "camera #{i}"),
        }
    }
}

/// Device-level allocation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("cannot allocate empty image {width}x{height}x{depth}")]
    EmptyImage {
        width: usize,
        height: usize,
        depth: usize,
    },
    #[error("image {width}x{height}x{depth} exceeds device extent {max_extent}")]
    ExceedsExtent {
        width: usize,
        height: usize,
        depth: usize,
        max_extent: usize,
    },
    #[error("device rejected allocation: {0}")]
    Device(String),
}

/// Failure raised by a render unit while rendering
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("render unit has been closed")]
    Closed,
    #[error("input image is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
    #[error("invalid render setting: {0}")]
    InvalidSetting(String),
}

/// Crate-wide error returned by the orchestrator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("allocation failed for {component}: {source}")]
    Allocation {
        component: Component,
        #[source]
        source: AllocationError,
    },
    #[error("{kind} index {index} out of range (have {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },
    #[error("microscope must be built before rendering")]
    NotBuilt,
    #[error("microscope is already built; arms and paths can no longer be added")]
    AlreadyBuilt,
    #[error("microscope has been closed")]
    Closed,
    #[error("render failed in {component}: {source}")]
    Render {
        component: Component,
        #[source]
        source: RenderError,
    },
    #[error("destination buffer too small: need {needed} values at offset {offset}, have {available}")]
    BufferTooSmall {
        needed: usize,
        offset: usize,
        available: usize,
    },
}

impl SimulatorError {
    pub(crate) fn render(component: Component) -> impl FnOnce(RenderError) -> Self {
        move |source| SimulatorError::Render { component, source }
    }

    pub(crate) fn allocation(component: Component) -> impl FnOnce(AllocationError) -> Self {
        move |source| SimulatorError::Allocation { component, source }
    }
}
