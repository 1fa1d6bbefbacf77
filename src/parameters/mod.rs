//! Parameter keys and the indexed parameter store
//!
//! Numeric parameters are grouped in families (camera, illumination,
//! detection, stage, unit conversion). Every numeric key carries an intrinsic
//! default, so a lookup never comes back empty. Phantom keys name volumetric
//! images instead of numbers.
//!
//! Lengths (positions, heights, focus, stage translation) are given in
//! physical units and divided by [`UnitConversion::Length`] to land in the
//! normalized `[0, 1]` volume space. Angles are in degrees.

mod preset;
mod store;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use preset::ParameterPreset;
pub use store::ParameterStore;

/// Errors raised while resolving parameter names or presets
#[derive(Error, Debug)]
pub enum ParameterError {
    #[error("unknown parameter key: {0}")]
    UnknownKey(String),
    #[error("invalid index '{index}' for parameter {key}")]
    InvalidIndex { key: String, index: String },
    #[error("failed to parse parameter preset: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read parameter preset: {0}")]
    Io(#[from] std::io::Error),
}

/// Camera region-of-interest parameters, indexed by detection path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraParameter {
    RoiOffsetX,
    RoiOffsetY,
    RoiWidth,
    RoiHeight,
}

/// Light sheet parameters, indexed by illumination arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IlluminationParameter {
    Intensity,
    Wavelength,
    X,
    Y,
    Z,
    Height,
    Alpha,
    Beta,
    Gamma,
    Theta,
}

/// Detection optics parameters, indexed by detection path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionParameter {
    Intensity,
    Wavelength,
    FocusZ,
}

/// Sample stage pose; only index 0 is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageParameter {
    StageX,
    StageY,
    StageZ,
    StageRX,
    StageRY,
    StageRZ,
}

/// Scale factors from physical units to normalized units; only index 0 is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitConversion {
    Length,
    LaserIntensity,
}

/// Phantom image slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhantomParameter {
    Fluorescence,
    Scattering,
}

/// Any numeric parameter key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberParameter {
    Camera(CameraParameter),
    Illumination(IlluminationParameter),
    Detection(DetectionParameter),
    Stage(StageParameter),
    UnitConversion(UnitConversion),
}

impl CameraParameter {
    pub const ALL: [CameraParameter; 4] = [
        CameraParameter::RoiOffsetX,
        CameraParameter::RoiOffsetY,
        CameraParameter::RoiWidth,
        CameraParameter::RoiHeight,
    ];

    fn default_value(self) -> f64 {
        match self {
            CameraParameter::RoiOffsetX | CameraParameter::RoiOffsetY => 0.0,
            CameraParameter::RoiWidth | CameraParameter::RoiHeight => 2048.0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            CameraParameter::RoiOffsetX => "ROIOffsetX",
            CameraParameter::RoiOffsetY => "ROIOffsetY",
            CameraParameter::RoiWidth => "ROIWidth",
            CameraParameter::RoiHeight => "ROIHeight",
        }
    }
}

impl IlluminationParameter {
    pub const ALL: [IlluminationParameter; 10] = [
        IlluminationParameter::Intensity,
        IlluminationParameter::Wavelength,
        IlluminationParameter::X,
        IlluminationParameter::Y,
        IlluminationParameter::Z,
        IlluminationParameter::Height,
        IlluminationParameter::Alpha,
        IlluminationParameter::Beta,
        IlluminationParameter::Gamma,
        IlluminationParameter::Theta,
    ];

    fn default_value(self) -> f64 {
        match self {
            IlluminationParameter::Intensity => 1.0,
            IlluminationParameter::Wavelength => 0.0005,
            IlluminationParameter::Height => 1.0,
            IlluminationParameter::X
            | IlluminationParameter::Y
            | IlluminationParameter::Z
            | IlluminationParameter::Alpha
            | IlluminationParameter::Beta
            | IlluminationParameter::Gamma
            | IlluminationParameter::Theta => 0.0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            IlluminationParameter::Intensity => "Intensity",
            IlluminationParameter::Wavelength => "Wavelength",
            IlluminationParameter::X => "X",
            IlluminationParameter::Y => "Y",
            IlluminationParameter::Z => "Z",
            IlluminationParameter::Height => "Height",
            IlluminationParameter::Alpha => "Alpha",
            IlluminationParameter::Beta => "Beta",
            IlluminationParameter::Gamma => "Gamma",
            IlluminationParameter::Theta => "Theta",
        }
    }
}

impl DetectionParameter {
    pub const ALL: [DetectionParameter; 3] = [
        DetectionParameter::Intensity,
        DetectionParameter::Wavelength,
        DetectionParameter::FocusZ,
    ];

    fn default_value(self) -> f64 {
        match self {
            DetectionParameter::Intensity => 1.0,
            DetectionParameter::Wavelength => 0.0005,
            DetectionParameter::FocusZ => 0.0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            DetectionParameter::Intensity => "Intensity",
            DetectionParameter::Wavelength => "Wavelength",
            DetectionParameter::FocusZ => "FocusZ",
        }
    }
}

impl StageParameter {
    pub const ALL: [StageParameter; 6] = [
        StageParameter::StageX,
        StageParameter::StageY,
        StageParameter::StageZ,
        StageParameter::StageRX,
        StageParameter::StageRY,
        StageParameter::StageRZ,
    ];

    fn name(self) -> &'static str {
        match self {
            StageParameter::StageX => "StageX",
            StageParameter::StageY => "StageY",
            StageParameter::StageZ => "StageZ",
            StageParameter::StageRX => "StageRX",
            StageParameter::StageRY => "StageRY",
            StageParameter::StageRZ => "StageRZ",
        }
    }
}

impl UnitConversion {
    pub const ALL: [UnitConversion; 2] = [UnitConversion::Length, UnitConversion::LaserIntensity];

    fn name(self) -> &'static str {
        match self {
            UnitConversion::Length => "Length",
            UnitConversion::LaserIntensity => "LaserIntensity",
        }
    }
}

impl NumberParameter {
    /// Value returned for this key when no override is stored
    pub fn default_value(self) -> f64 {
        match self {
            NumberParameter::Camera(p) => p.default_value(),
            NumberParameter::Illumination(p) => p.default_value(),
            NumberParameter::Detection(p) => p.default_value(),
            NumberParameter::Stage(_) => 0.0,
            NumberParameter::UnitConversion(_) => 1.0,
        }
    }

    /// Family prefix used in qualified names
    pub fn family(self) -> &'static str {
        match self {
            NumberParameter::Camera(_) => "Camera",
            NumberParameter::Illumination(_) => "Illumination",
            NumberParameter::Detection(_) => "Detection",
            NumberParameter::Stage(_) => "Stage",
            NumberParameter::UnitConversion(_) => "UnitConversion",
        }
    }

    /// Name of the key within its family
    pub fn name(self) -> &'static str {
        match self {
            NumberParameter::Camera(p) => p.name(),
            NumberParameter::Illumination(p) => p.name(),
            NumberParameter::Detection(p) => p.name(),
            NumberParameter::Stage(p) => p.name(),
            NumberParameter::UnitConversion(p) => p.name(),
        }
    }

    /// Every numeric key, family by family
    pub fn all() -> impl Iterator<Item = NumberParameter> {
        CameraParameter::ALL
            .into_iter()
            .map(NumberParameter::from)
            .chain(IlluminationParameter::ALL.into_iter().map(NumberParameter::from))
            .chain(DetectionParameter::ALL.into_iter().map(NumberParameter::from))
            .chain(StageParameter::ALL.into_iter().map(NumberParameter::from))
            .chain(UnitConversion::ALL.into_iter().map(NumberParameter::from))
    }
}

impl fmt::Display for NumberParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.family(), self.name())
    }
}

impl FromStr for NumberParameter {
    type Err = ParameterError;

    /// Parses qualified names such as `Illumination.Height` or `Stage.StageRX`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NumberParameter::all()
            .find(|p| p.to_string() == s)
            .ok_or_else(|| ParameterError::UnknownKey(s.to_string()))
    }
}

impl From<CameraParameter> for NumberParameter {
    fn from(p: CameraParameter) -> Self {
        NumberParameter::Camera(p)
    }
}

impl From<IlluminationParameter> for NumberParameter {
    fn from(p: IlluminationParameter) -> Self {
        NumberParameter::Illumination(p)
    }
}

impl From<DetectionParameter> for NumberParameter {
    fn from(p: DetectionParameter) -> Self {
        NumberParameter::Detection(p)
    }
}

impl From<StageParameter> for NumberParameter {
    fn from(p: StageParameter) -> Self {
        NumberParameter::Stage(p)
    }
}

impl From<UnitConversion> for NumberParameter {
    fn from(p: UnitConversion) -> Self {
        NumberParameter::UnitConversion(p)
    }
}
