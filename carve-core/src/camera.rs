use crate::{ImagePoint, KeyPoint};

/// A lens and sensor: maps between pixels and the camera-frame representation a model
/// works in, usually a point on the virtual image plane at depth `1.0`.
///
/// Both sides use `x` to the right and `y` down. Only intrinsics are involved; where the
/// camera sits in the world is a [`WorldToCamera`](crate::WorldToCamera) pose.
pub trait CameraModel {
    type Projection;

    /// Pixel to projection, removing every lens effect the model knows about.
    fn calibrate<P>(&self, point: P) -> Self::Projection
    where
        P: ImagePoint;

    /// Projection to pixel, applying the lens effects again.
    fn uncalibrate(&self, projection: Self::Projection) -> KeyPoint;
}
