use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Point3, Vector3, Vector4};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A 3d location stored as a homogeneous 4-vector `(x, y, z, w)`.
///
/// Poses are 4x4 matrices, so keeping the points homogeneous lets every frame change be a
/// single matrix product. The `w` component is `1.0` for anything built from euclidean
/// coordinates and is only divided out when a euclidean point is requested.
pub trait Projective: From<Vector4<f64>> + Clone + Copy {
    /// The raw homogeneous vector.
    fn homogeneous(self) -> Vector4<f64>;

    /// Divides out `w`. Gives `None` when `w` is zero.
    fn point(self) -> Option<Point3<f64>> {
        Point3::from_homogeneous(self.homogeneous())
    }

    /// Appends `w = 1.0` to a euclidean point.
    fn from_point(point: Point3<f64>) -> Self {
        point.to_homogeneous().into()
    }

    /// The `xyz` part without dividing by `w`.
    ///
    /// For a point in front of a camera this is the direction it is seen in, scaled by
    /// `w`, which is enough for a perspective divide.
    fn bearing_unnormalized(self) -> Vector3<f64> {
        self.homogeneous().xyz()
    }
}

/// A point in a camera's frame: origin at the optical center, `x` right, `y` down and
/// `z` out of the lens. Distances are in the unit of the calibration's translation vector,
/// which is usually the millimeters of the checkerboard square size.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraPoint(pub Vector4<f64>);

impl CameraPoint {
    /// Distance in front of the optical center along the optical axis.
    ///
    /// Negative behind the camera, `None` at infinity.
    pub fn depth(self) -> Option<f64> {
        self.point().map(|point| point.z)
    }
}

impl Projective for CameraPoint {
    fn homogeneous(self) -> Vector4<f64> {
        self.0
    }
}

/// A point in the frame shared by every calibrated camera and by the voxel lattice.
///
/// All cameras must be calibrated against the same world origin (the same checkerboard
/// placement) for their silhouettes to be intersected meaningfully.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct WorldPoint(pub Vector4<f64>);

impl WorldPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Vector4::new(x, y, z, 1.0))
    }

    /// The center of the voxel at an integer lattice coordinate.
    pub fn from_lattice(position: Point3<i32>) -> Self {
        Self::new(position.x.into(), position.y.into(), position.z.into())
    }
}

impl Projective for WorldPoint {
    fn homogeneous(self) -> Vector4<f64> {
        self.0
    }
}
