use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{NumberParameter, ParameterError};

/// Named parameter overrides loaded from JSON.
///
/// Keys are qualified parameter names and each maps index strings to values:
///
/// ```json
/// {
///   "Illumination.Height": { "0": 0.2, "1": 0.2 },
///   "Stage.StageRY": { "0": 15.0 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterPreset {
    values: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ParameterPreset {
    /// Parse a preset from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, ParameterError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a preset from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Add a single override
    pub fn insert(&mut self, key: NumberParameter, index: usize, value: f64) {
        self.values
            .entry(key.to_string())
            .or_default()
            .insert(index.to_string(), value);
    }

    /// Resolve all entries into typed keys, failing on the first bad name
    pub fn entries(&self) -> Result<Vec<(NumberParameter, usize, f64)>, ParameterError> {
        let mut out = Vec::new();
        for (name, indexed) in &self.values {
            let key: NumberParameter = name.parse()?;
            for (index, value) in indexed {
                let index = index
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| ParameterError::InvalidIndex {
                        key: name.clone(),
                        index: index.clone(),
                    })?;
                out.push((key, index, *value));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{IlluminationParameter, ParameterStore, StageParameter};

    #[test]
    fn test_preset_applies_to_store() {
        let preset = ParameterPreset::from_json_str(
            r#"{
                "Illumination.Height": { "0": 0.2, "1": 0.4 },
                "Stage.StageRY": { "0": 15.0 }
            }"#,
        )
        .unwrap();

        let store = ParameterStore::new();
        assert_eq!(store.apply_preset(&preset).unwrap(), 3);
        assert_eq!(store.number(IlluminationParameter::Height, 0), 0.2);
        assert_eq!(store.number(IlluminationParameter::Height, 1), 0.4);
        assert_eq!(store.number(StageParameter::StageRY, 0), 15.0);
    }

    #[test]
    fn test_unknown_key_fails_without_writing() {
        let preset = ParameterPreset::from_json_str(
            r#"{
                "Illumination.Height": { "0": 0.2 },
                "Stage.Tilt": { "0": 1.0 }
            }"#,
        )
        .unwrap();
        let store = ParameterStore::new();
        assert!(matches!(
            store.apply_preset(&preset),
            Err(ParameterError::UnknownKey(_))
        ));
        assert!(!store.contains(IlluminationParameter::Height, 0));
        assert_eq!(store.number(IlluminationParameter::Height, 0), 1.0);
    }

    #[test]
    fn test_bad_index_rejected() {
        let preset =
            ParameterPreset::from_json_str(r#"{ "Detection.FocusZ": { "first": 1.0 } }"#)
                .unwrap();
        assert!(matches!(
            preset.entries(),
            Err(ParameterError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_insert_serializes_qualified_names() {
        let mut preset = ParameterPreset::default();
        preset.insert(StageParameter::StageX.into(), 0, 2.0);
        let json = serde_json::to_string(&preset).unwrap();
        assert_eq!(json, r#"{"Stage.StageX":{"0":2.0}}"#);
    }
}
