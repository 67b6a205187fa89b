//! Handedness-corrected anchor pose builder.
//!
//! The localization engine reports the camera pose in the map-local frame.
//! Its Y and Z axes point the opposite way to the render scene's, so the
//! reported rotation cannot be dropped into the scene as-is.
//! [`corrected_pose_matrix`] negates the second and third rotation columns
//! and keeps the first column and the translation. [`build_anchor_pose`] then
//! undoes that pose and re-expresses it under the live camera transform. The
//! result is where the map origin sits in tracking space.
//!
//! # Example
//!
//! ```rust
//! use geoanchor_perception::anchor::{build_anchor_pose, LocalizationResult};
//! use geoanchor_perception::transform::{Affine4, Quaternion, Vec3};
//! use geoanchor_types::LocError;
//!
//! let camera = Affine4::from_translation(Vec3::new(0.0, 1.5, 0.0));
//!
//! let hit = LocalizationResult::new(0, Vec3::new(2.0, 0.0, 0.0), Quaternion::identity());
//! let anchor = build_anchor_pose(&hit, &camera).unwrap();
//! assert!((anchor.translation().x + 2.0).abs() < 1e-5);
//! assert!((anchor.translation().y - 1.5).abs() < 1e-5);
//!
//! let miss = LocalizationResult::no_match();
//! assert_eq!(build_anchor_pose(&miss, &camera), Err(LocError::NoLocalization));
//! ```

use geoanchor_types::LocError;
use tracing::warn;

use crate::transform::{Affine4, Quaternion, Vec3};

/// One completed localization call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalizationResult {
    /// Handle of the matched map, or negative when nothing matched.
    pub map_handle: i32,
    /// Camera position in the map-local frame.
    pub position: Vec3,
    /// Camera orientation in the map-local frame.
    pub rotation: Quaternion,
    /// Engine match score. Informational only.
    pub confidence: i32,
}

impl LocalizationResult {
    pub fn new(map_handle: i32, position: Vec3, rotation: Quaternion) -> Self {
        Self {
            map_handle,
            position,
            rotation,
            confidence: 0,
        }
    }

    /// The sentinel the engine returns when no map matched.
    pub fn no_match() -> Self {
        Self::new(-1, Vec3::zero(), Quaternion::identity())
    }

    pub fn with_confidence(mut self, confidence: i32) -> Self {
        self.confidence = confidence;
        self
    }

    /// `true` when the engine found a map (`map_handle >= 0`).
    pub fn is_success(&self) -> bool {
        self.map_handle >= 0
    }
}

/// The map-local camera pose with the handedness correction applied.
///
/// Rows are `[R.col0, -R.col1, -R.col2, t]`. The translation is never
/// negated.
pub fn corrected_pose_matrix(result: &LocalizationResult) -> Affine4 {
    let r = result.rotation.to_rotation_matrix();
    let col = |j: usize| Vec3::new(r[0][j], r[1][j], r[2][j]);
    Affine4::from_axes(col(0), col(1).neg(), col(2).neg(), result.position)
}

/// Place the map anchor in tracking space.
///
/// Returns `invert(M) ∘ camera_transform` where `M` is
/// [`corrected_pose_matrix`]. Operand order matters: the other order yields a
/// transform in the wrong space.
///
/// # Errors
///
/// - [`LocError::NoLocalization`] when `result.map_handle < 0`.
/// - [`LocError::SingularPose`] when `M` cannot be inverted, e.g. for a zero
///   quaternion.
pub fn build_anchor_pose(
    result: &LocalizationResult,
    camera_transform: &Affine4,
) -> Result<Affine4, LocError> {
    if !result.is_success() {
        return Err(LocError::NoLocalization);
    }

    let pose = corrected_pose_matrix(result);
    let inverse = pose.invert().map_err(|e| {
        warn!(
            map_handle = result.map_handle,
            det = e.det,
            "discarding localization with singular pose"
        );
        LocError::SingularPose
    })?;

    Ok(inverse.compose(camera_transform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn sample_result() -> LocalizationResult {
        LocalizationResult::new(
            3,
            Vec3::new(1.0, -2.0, 0.5),
            Quaternion::from_axis_angle(Vec3::new(0.2, 1.0, -0.3), 0.8),
        )
    }

    #[test]
    fn negative_handle_is_no_localization() {
        let result = LocalizationResult::new(-1, Vec3::new(1.0, 1.0, 1.0), Quaternion::identity());
        assert_eq!(
            build_anchor_pose(&result, &Affine4::identity()),
            Err(LocError::NoLocalization)
        );
    }

    #[test]
    fn zero_quaternion_is_singular_pose() {
        let result = LocalizationResult::new(0, Vec3::new(1.0, 2.0, 3.0), Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(
            build_anchor_pose(&result, &Affine4::identity()),
            Err(LocError::SingularPose)
        );
    }

    #[test]
    fn corrected_matrix_flips_second_and_third_columns_only() {
        let result = sample_result();
        let naive = Affine4::from_rotation_translation(
            result.rotation.to_rotation_matrix(),
            result.position,
        );
        let corrected = corrected_pose_matrix(&result);

        assert_eq!(corrected.axis(0), naive.axis(0));
        assert_eq!(corrected.axis(1), naive.axis(1).neg());
        assert_eq!(corrected.axis(2), naive.axis(2).neg());
        assert_eq!(corrected.translation(), result.position);
    }

    #[test]
    fn anchor_undoes_corrected_pose() {
        let result = sample_result();
        let camera = Affine4::from_rotation_translation(
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.4).to_rotation_matrix(),
            Vec3::new(0.3, 1.4, -2.0),
        );
        let anchor = build_anchor_pose(&result, &camera).unwrap();

        // Re-applying the corrected pose must land back on the camera transform.
        let back = corrected_pose_matrix(&result).compose(&anchor);
        assert!(back.approx_eq(&camera, 1e-4), "back={back:?}");
    }

    #[test]
    fn anchor_maps_reported_position_to_camera_position() {
        let result = sample_result();
        let camera = Affine4::from_translation(Vec3::new(5.0, 0.0, -1.0));
        let anchor = build_anchor_pose(&result, &camera).unwrap();

        // The camera sits at `position` in map space, so that map point must
        // land on the camera's tracking-space position.
        let p = anchor.transform_point(result.position);
        assert!((p.x - 5.0).abs() < 1e-4);
        assert!(p.y.abs() < 1e-4);
        assert!((p.z + 1.0).abs() < 1e-4);
    }

    #[test]
    fn operand_order_matters() {
        let result = LocalizationResult::new(
            0,
            Vec3::new(1.0, 0.0, 0.0),
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), FRAC_PI_2),
        );
        let camera = Affine4::from_translation(Vec3::new(0.0, 0.0, 3.0));
        let anchor = build_anchor_pose(&result, &camera).unwrap();
        let swapped = camera.compose(&corrected_pose_matrix(&result).invert().unwrap());
        assert!(!anchor.approx_eq(&swapped, 1e-3));
    }

    #[test]
    fn confidence_is_carried_but_unused() {
        let camera = Affine4::identity();
        let plain = sample_result();
        let scored = plain.with_confidence(87);
        assert_eq!(scored.confidence, 87);
        assert_eq!(
            build_anchor_pose(&plain, &camera),
            build_anchor_pose(&scored, &camera)
        );
    }
}
