use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{NumberParameter, ParameterError, ParameterPreset, PhantomParameter};
use crate::device::SharedImage;

/// Sparse, indexed parameter table shared between a control surface and the
/// render loop.
///
/// Each `(key, index)` entry is written and read under a lock, so a reader
/// never sees a torn value. There is no ordering between concurrent writers
/// and readers beyond that: the last write wins.
///
/// # Examples
/// ```
/// use lightsheet_sim::parameters::{IlluminationParameter, ParameterStore};
///
/// let store = ParameterStore::new();
/// assert_eq!(store.number(IlluminationParameter::Intensity, 3), 1.0);
///
/// store.set_number(IlluminationParameter::Intensity, 3, 0.25);
/// assert_eq!(store.number(IlluminationParameter::Intensity, 3), 0.25);
/// assert_eq!(store.number_or(IlluminationParameter::Intensity, 4, 7.0), 7.0);
/// ```
#[derive(Debug, Default)]
pub struct ParameterStore {
    numbers: RwLock<HashMap<(NumberParameter, usize), f64>>,
    phantoms: RwLock<HashMap<PhantomParameter, SharedImage>>,
}

impl ParameterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the value for `key` at `index`
    pub fn set_number(&self, key: impl Into<NumberParameter>, index: usize, value: f64) {
        let mut numbers = self.numbers.write().unwrap_or_else(PoisonError::into_inner);
        numbers.insert((key.into(), index), value);
    }

    /// Stored value, or the key's intrinsic default
    pub fn number(&self, key: impl Into<NumberParameter>, index: usize) -> f64 {
        let key = key.into();
        self.number_or(key, index, key.default_value())
    }

    /// Stored value, or `fallback` in place of the intrinsic default
    pub fn number_or(&self, key: impl Into<NumberParameter>, index: usize, fallback: f64) -> f64 {
        let numbers = self.numbers.read().unwrap_or_else(PoisonError::into_inner);
        numbers.get(&(key.into(), index)).copied().unwrap_or(fallback)
    }

    /// Whether an override is stored for `key` at `index`
    pub fn contains(&self, key: impl Into<NumberParameter>, index: usize) -> bool {
        let numbers = self.numbers.read().unwrap_or_else(PoisonError::into_inner);
        numbers.contains_key(&(key.into(), index))
    }

    /// Set the phantom image for a slot, replacing any previous image
    pub fn set_phantom(&self, key: PhantomParameter, image: SharedImage) {
        let mut phantoms = self.phantoms.write().unwrap_or_else(PoisonError::into_inner);
        phantoms.insert(key, image);
    }

    /// Phantom image for a slot, if one was set
    pub fn phantom(&self, key: PhantomParameter) -> Option<SharedImage> {
        let phantoms = self.phantoms.read().unwrap_or_else(PoisonError::into_inner);
        phantoms.get(&key).cloned()
    }

    /// Write every entry of a preset into the store
    pub fn apply_preset(&self, preset: &ParameterPreset) -> Result<usize, ParameterError> {
        let entries = preset.entries()?;
        let count = entries.len();
        let mut numbers = self.numbers.write().unwrap_or_else(PoisonError::into_inner);
        for (key, index, value) in entries {
            numbers.insert((key, index), value);
        }
        log::debug!("applied {count} parameter overrides from preset");
        Ok(count)
    }
}
