//! Stage and detection transform composition
//!
//! The stage transform tilts the sample about the volume center and shifts
//! it:
//!
//! ```text
//! stage = rotX(StageRX) * rotY(StageRY) * rotZ(StageRZ), then + (StageX, StageY, StageZ) / Length
//! ```
//!
//! and the transform handed to detection path `i` is `stage * detection[i]`.
//! The multiplication order is part of the rendering contract; changing it
//! misaligns every detection path.

use std::sync::Arc;

use nalgebra::Matrix4;

use crate::algo::geometry::{add_translation, rot_x, rot_y, rot_z, volume_center};
use crate::parameters::{ParameterStore, StageParameter, UnitConversion};

/// Builds stage and stage+detection transforms from the parameter store.
///
/// Detection transforms are recorded in path order when paths are added and
/// are never modified afterwards.
#[derive(Debug)]
pub struct TransformComposer {
    parameters: Arc<ParameterStore>,
    detection_transforms: Vec<Matrix4<f32>>,
}

impl TransformComposer {
    pub fn new(parameters: Arc<ParameterStore>) -> Self {
        Self {
            parameters,
            detection_transforms: Vec::new(),
        }
    }

    /// Record the detection transform of the next path, returning its index
    pub fn push_detection_transform(&mut self, transform: Matrix4<f32>) -> usize {
        self.detection_transforms.push(transform);
        self.detection_transforms.len() - 1
    }

    /// Number of recorded detection transforms
    pub fn len(&self) -> usize {
        self.detection_transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detection_transforms.is_empty()
    }

    /// Detection transform recorded for `path`
    pub fn detection_transform(&self, path: usize) -> Option<Matrix4<f32>> {
        self.detection_transforms.get(path).copied()
    }

    /// Current stage transform
    pub fn stage_transform(&self) -> Matrix4<f32> {
        let p = &self.parameters;
        let length = p.number(UnitConversion::Length, 0) as f32;

        let stage_x = p.number_or(StageParameter::StageX, 0, 0.0) as f32 / length;
        let stage_y = p.number_or(StageParameter::StageY, 0, 0.0) as f32 / length;
        let stage_z = p.number_or(StageParameter::StageZ, 0, 0.0) as f32 / length;

        let stage_rx = p.number_or(StageParameter::StageRX, 0, 0.0) as f32;
        let stage_ry = p.number_or(StageParameter::StageRY, 0, 0.0) as f32;
        let stage_rz = p.number_or(StageParameter::StageRZ, 0, 0.0) as f32;

        let center = volume_center();
        let mut matrix = rot_x(stage_rx.to_radians(), &center)
            * rot_y(stage_ry.to_radians(), &center)
            * rot_z(stage_rz.to_radians(), &center);

        add_translation(&mut matrix, stage_x, stage_y, stage_z);
        matrix
    }

    /// `stage_transform() * detection_transform(path)`
    pub fn combined_transform(&self, path: usize) -> Option<Matrix4<f32>> {
        self.detection_transform(path)
            .map(|detection| self.stage_transform() * detection)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use super::*;

    fn composer() -> (Arc<ParameterStore>, TransformComposer) {
        let store = Arc::new(ParameterStore::new());
        (store.clone(), TransformComposer::new(store))
    }

    #[test]
    fn test_default_stage_is_identity() {
        let (_, composer) = composer();
        assert_relative_eq!(composer.stage_transform(), Matrix4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_translation_is_scaled_by_length() {
        let (store, composer) = composer();
        store.set_number(UnitConversion::Length, 0, 500.0);
        store.set_number(StageParameter::StageX, 0, 50.0);
        store.set_number(StageParameter::StageZ, 0, -100.0);

        let m = composer.stage_transform();
        assert_relative_eq!(m[(0, 3)], 0.1, epsilon = 1e-6);
        assert_relative_eq!(m[(1, 3)], 0.0, epsilon = 1e-6);
        assert_relative_eq!(m[(2, 3)], -0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_order_is_x_then_y_then_z() {
        let (store, composer) = composer();
        store.set_number(StageParameter::StageRX, 0, 30.0);
        store.set_number(StageParameter::StageRY, 0, 45.0);
        store.set_number(StageParameter::StageRZ, 0, 60.0);

        let c = volume_center();
        let expected = rot_x(30f32.to_radians(), &c)
            * rot_y(45f32.to_radians(), &c)
            * rot_z(60f32.to_radians(), &c);
        let reversed = rot_z(60f32.to_radians(), &c)
            * rot_y(45f32.to_radians(), &c)
            * rot_x(30f32.to_radians(), &c);

        let m = composer.stage_transform();
        assert_relative_eq!(m, expected, epsilon = 1e-6);
        assert!((m - reversed).abs().max() > 1e-3);
    }

    #[test]
    fn test_stage_rotation_pivots_on_volume_center() {
        let (store, composer) = composer();
        store.set_number(StageParameter::StageRY, 0, 90.0);
        let p = composer.stage_transform().transform_point(&Point3::new(0.5, 0.5, 0.5));
        assert_relative_eq!(p, Point3::new(0.5, 0.5, 0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_combined_is_stage_times_detection() {
        let (store, mut composer) = composer();
        let detection = rot_y(std::f32::consts::PI, &volume_center());
        assert_eq!(composer.push_detection_transform(Matrix4::identity()), 0);
        assert_eq!(composer.push_detection_transform(detection), 1);

        store.set_number(StageParameter::StageRX, 0, 10.0);
        store.set_number(StageParameter::StageY, 0, 0.25);

        let combined = composer.combined_transform(1).unwrap();
        assert_relative_eq!(combined, composer.stage_transform() * detection, epsilon = 1e-6);
        assert_eq!(composer.detection_transform(1), Some(detection));
        assert!(composer.combined_transform(2).is_none());
    }
}
