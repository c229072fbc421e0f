use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Point2, Vector2};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Anything that sits at a pixel location of some image.
pub trait ImagePoint {
    fn image_point(&self) -> Point2<f64>;
}

/// Raw pixel coordinates, `x` to the right and `y` down from the top-left corner.
///
/// Lens distortion has not been removed. [`crate::CameraModel::calibrate`] turns this into
/// the camera model's own projection type.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct KeyPoint(pub Point2<f64>);

impl KeyPoint {
    /// Rounds the keypoint to the pixel it falls on.
    ///
    /// Returns `None` if either coordinate is not finite or does not fit into an `i32`.
    pub fn pixel(self) -> Option<Point2<i32>> {
        let rounded = self.0.coords.map(f64::round);
        let fits = |n: f64| n.is_finite() && n >= i32::MIN as f64 && n <= i32::MAX as f64;
        if fits(rounded.x) && fits(rounded.y) {
            Some(Point2::new(rounded.x as i32, rounded.y as i32))
        } else {
            None
        }
    }

    /// Checks if the keypoint lies on an image of the given size.
    pub fn is_within(self, size: Vector2<u32>) -> bool {
        self.pixel().map_or(false, |pixel| {
            pixel.x >= 0 && pixel.y >= 0 && (pixel.x as u32) < size.x && (pixel.y as u32) < size.y
        })
    }
}

impl ImagePoint for KeyPoint {
    fn image_point(&self) -> Point2<f64> {
        self.0
    }
}
