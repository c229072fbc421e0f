use crate::{CameraPoint, Projective, Skew3, WorldPoint};
use derive_more::{AsMut, AsRef, From, Into};
use nalgebra::{IsometryMatrix3, Matrix4, Point3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A rigid change of frame between the world and one camera.
///
/// The two implementors are each other's inverse:
///
/// * [`WorldToCamera`] takes [`WorldPoint`]s to [`CameraPoint`]s
/// * [`CameraToWorld`] takes [`CameraPoint`]s to [`WorldPoint`]s
pub trait Pose: From<IsometryMatrix3<f64>> + Clone + Copy {
    type InputPoint: Projective;
    type OutputPoint: Projective;
    type Inverse: Pose;

    fn isometry(self) -> IsometryMatrix3<f64>;

    fn inverse(self) -> Self::Inverse {
        self.isometry().inverse().into()
    }

    /// The 4x4 matrix `[R t; 0 1]`.
    fn homogeneous(self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    fn transform(self, input: Self::InputPoint) -> Self::OutputPoint {
        (self.homogeneous() * input.homogeneous()).into()
    }
}

/// The extrinsic calibration of a camera: where the world is, seen from the camera.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct WorldToCamera(pub IsometryMatrix3<f64>);

impl WorldToCamera {
    /// Builds the pose from the `rvec`/`tvec` pair that OpenCV's `solvePnP` and
    /// `calibrateCamera` produce.
    pub fn from_rodrigues(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self(IsometryMatrix3::from_parts(
            translation.into(),
            Skew3(rotation).rotation(),
        ))
    }
}

impl Pose for WorldToCamera {
    type InputPoint = WorldPoint;
    type OutputPoint = CameraPoint;
    type Inverse = CameraToWorld;

    #[inline(always)]
    fn isometry(self) -> IsometryMatrix3<f64> {
        self.0
    }
}

/// Where a camera is in the world and which way it faces.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraToWorld(pub IsometryMatrix3<f64>);

impl CameraToWorld {
    /// The world position of the optical center.
    ///
    /// For extrinsics `(R, t)` this is `-Rᵀ·t`.
    pub fn optical_center(self) -> Point3<f64> {
        self.0.translation.vector.into()
    }
}

impl Pose for CameraToWorld {
    type InputPoint = CameraPoint;
    type OutputPoint = WorldPoint;
    type Inverse = WorldToCamera;

    #[inline(always)]
    fn isometry(self) -> IsometryMatrix3<f64> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use nalgebra::Vector4;
    use proptest::prelude::*;

    fn extrinsics() -> WorldToCamera {
        WorldToCamera::from_rodrigues(
            Vector3::new(1.9, -0.4, 0.3),
            Vector3::new(-120.0, 850.0, 4100.0),
        )
    }

    #[test]
    fn optical_center_is_negative_rotated_translation() {
        let pose = extrinsics();
        let expected = -(pose.0.rotation.transpose() * pose.0.translation.vector);
        let center = pose.inverse().optical_center();
        assert!((center.coords - expected).norm() < 1e-9);
    }

    #[test]
    fn optical_center_is_the_camera_origin() {
        let pose = extrinsics();
        let center = WorldPoint::from_point(pose.inverse().optical_center());
        let seen = pose.transform(center).point().unwrap();
        assert!(seen.coords.norm() < 1e-9);
    }

    #[test]
    fn homogeneous_layout() {
        let matrix = extrinsics().homogeneous();
        assert_eq!(matrix.row(3).transpose(), Vector4::new(0.0, 0.0, 0.0, 1.0));
        assert_float_eq!(matrix[(0, 3)], -120.0, abs <= 1e-12);
        assert_float_eq!(matrix[(1, 3)], 850.0, abs <= 1e-12);
        assert_float_eq!(matrix[(2, 3)], 4100.0, abs <= 1e-12);
    }

    #[test]
    fn there_and_back() {
        let pose = extrinsics();
        proptest!(|(x in -2000.0..2000.0, y in -2000.0..2000.0, z in 0.0..2000.0)| {
            let camera = pose.transform(WorldPoint::new(x, y, z));
            let back = pose.inverse().transform(camera).point().unwrap();
            prop_assert!((back.coords - Vector3::new(x, y, z)).norm() < 1e-6);
        });
    }
}
