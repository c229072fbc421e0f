//! Pinhole camera models for `carve-core`.
//!
//! [`CameraIntrinsics`] is the ideal pinhole described by an OpenCV camera matrix, and
//! [`CameraIntrinsicsDistortion`] adds OpenCV's lens distortion on top so that the
//! `CameraMatrix` and `DistortionCoeffs` of a calibration file can be used as they are.
//! Both implement [`carve_core::CameraModel`] with [`NormalizedKeyPoint`] as the projection.

mod distortion;

pub use distortion::*;

use carve_core::nalgebra::{Matrix3, Point2, Vector2};
use carve_core::{CameraModel, CameraPoint, ImagePoint, KeyPoint, Projective};
use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A point on the virtual image plane one unit in front of the optical center.
///
/// This is `(x / z, y / z)` of a [`CameraPoint`], free of intrinsics and distortion.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NormalizedKeyPoint(pub Point2<f64>);

impl NormalizedKeyPoint {
    /// Perspective divide of a camera point. `None` on the plane of the optical center.
    pub fn from_camera_point(point: CameraPoint) -> Option<Self> {
        Point2::from_homogeneous(point.bearing_unnormalized()).map(Self)
    }

    /// The camera point on this ray with the given depth along the optical axis.
    pub fn with_depth(self, depth: f64) -> CameraPoint {
        (self.coords * depth).push(depth).push(1.0).into()
    }
}

/// The camera matrix
///
/// ```text
/// [ fx  s  cx ]
/// [  0 fy  cy ]
/// [  0  0   1 ]
/// ```
///
/// with focal lengths and principal point in pixels.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub skew: f64,
}

impl CameraIntrinsics {
    /// Reads `fx`, `fy`, `cx`, `cy` and the skew out of a camera matrix.
    ///
    /// ```
    /// use carve_core::nalgebra::Matrix3;
    /// use carve_pinhole::CameraIntrinsics;
    /// let matrix = Matrix3::new(
    ///     800.0, 0.0, 320.0,
    ///     0.0, 810.0, 240.0,
    ///     0.0, 0.0, 1.0,
    /// );
    /// let intrinsics = CameraIntrinsics::from_matrix(&matrix);
    /// assert_eq!(intrinsics.mean_focal(), 805.0);
    /// assert_eq!(intrinsics.matrix(), matrix);
    /// ```
    pub fn from_matrix(matrix: &Matrix3<f64>) -> Self {
        Self {
            focals: Vector2::new(matrix.m11, matrix.m22),
            principal_point: Point2::new(matrix.m13, matrix.m23),
            skew: matrix.m12,
        }
    }

    /// The mean of the two focal lengths in pixels.
    pub fn mean_focal(&self) -> f64 {
        (self.focals.x + self.focals.y) / 2.0
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        let (f, c) = (self.focals, self.principal_point);
        Matrix3::new(
            f.x, self.skew, c.x,
            0.0, f.y,       c.y,
            0.0, 0.0,       1.0,
        )
    }
}

impl CameraModel for CameraIntrinsics {
    type Projection = NormalizedKeyPoint;

    /// Applies the inverse camera matrix.
    ///
    /// ```
    /// use carve_core::{CameraModel, KeyPoint};
    /// use carve_core::nalgebra::{Matrix3, Point2};
    /// use carve_pinhole::CameraIntrinsics;
    /// let intrinsics = CameraIntrinsics::from_matrix(&Matrix3::new(
    ///     800.0, 1.7, 500.0,
    ///     0.0, 900.0, 600.0,
    ///     0.0, 0.0, 1.0,
    /// ));
    /// let pixel = KeyPoint(Point2::new(471.0, 322.0));
    /// let normalized = intrinsics.calibrate(pixel);
    /// let back = intrinsics.matrix() * normalized.to_homogeneous();
    /// assert!((back - pixel.to_homogeneous()).norm() < 1e-9);
    /// assert!((intrinsics.uncalibrate(normalized).0 - pixel.0).norm() < 1e-9);
    /// ```
    fn calibrate<P>(&self, point: P) -> NormalizedKeyPoint
    where
        P: ImagePoint,
    {
        let offset = point.image_point() - self.principal_point;
        let y = offset.y / self.focals.y;
        let x = (offset.x - self.skew * y) / self.focals.x;
        NormalizedKeyPoint(Point2::new(x, y))
    }

    fn uncalibrate(&self, projection: NormalizedKeyPoint) -> KeyPoint {
        let NormalizedKeyPoint(p) = projection;
        let offset = Vector2::new(self.focals.x * p.x + self.skew * p.y, self.focals.y * p.y);
        KeyPoint(self.principal_point + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carve_core::nalgebra::Point3;

    #[test]
    fn camera_point_through_virtual_plane() {
        let point = CameraPoint::from_point(Point3::new(2.0, -1.0, 4.0));
        let normalized = NormalizedKeyPoint::from_camera_point(point).unwrap();
        assert_eq!(normalized.0, Point2::new(0.5, -0.25));
        let back = normalized.with_depth(4.0).point().unwrap();
        assert!((back - Point3::new(2.0, -1.0, 4.0)).norm() < 1e-12);
    }

    #[test]
    fn optical_center_plane_has_no_projection() {
        let point = CameraPoint::from_point(Point3::new(2.0, -1.0, 0.0));
        assert_eq!(NormalizedKeyPoint::from_camera_point(point), None);
    }

    #[test]
    fn principal_point_is_the_optical_axis() {
        let intrinsics = CameraIntrinsics {
            focals: Vector2::new(780.0, 790.0),
            principal_point: Point2::new(322.0, 243.0),
            skew: 0.0,
        };
        let axis = intrinsics.calibrate(KeyPoint(Point2::new(322.0, 243.0)));
        assert_eq!(axis.0, Point2::origin());
    }
}
