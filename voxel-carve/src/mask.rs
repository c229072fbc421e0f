use crate::Result;
use carve_core::nalgebra::{Point2, Vector2};
use derive_more::{AsRef, Deref, From, Into};
use image::{GrayImage, Luma};
use std::path::Path;

/// A binary silhouette of the foreground as seen by one camera.
///
/// Any nonzero pixel is foreground.
#[derive(Debug, Clone, PartialEq, AsRef, Deref, From, Into)]
pub struct ForegroundMask(GrayImage);

impl ForegroundMask {
    /// An all-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    pub fn from_gray(image: GrayImage) -> Self {
        Self(image)
    }

    /// Decodes a mask from any image format `image` understands, converting it to grayscale.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(image::open(path)?.to_luma8()))
    }

    /// The width and height in pixels.
    pub fn size(&self) -> Vector2<u32> {
        Vector2::new(self.0.width(), self.0.height())
    }

    /// Checks if the pixel is foreground. Pixels outside of the mask are background.
    pub fn is_foreground(&self, pixel: Point2<i32>) -> bool {
        if pixel.x < 0 || pixel.y < 0 {
            return false;
        }
        let (x, y) = (pixel.x as u32, pixel.y as u32);
        if x >= self.0.width() || y >= self.0.height() {
            return false;
        }
        let Luma([value]) = *self.0.get_pixel(x, y);
        value != 0
    }

    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        self.0
            .put_pixel(x, y, Luma([if foreground { u8::MAX } else { 0 }]));
    }

    /// The number of foreground pixels.
    pub fn count_foreground(&self) -> usize {
        self.0.as_raw().iter().filter(|&&value| value != 0).count()
    }

    /// The number of pixels that are foreground in exactly one of the two masks.
    ///
    /// The masks do not need to have the same size; pixels missing from one mask count as
    /// background there.
    pub fn difference(&self, other: &Self) -> usize {
        if self.size() == other.size() {
            return self
                .0
                .as_raw()
                .iter()
                .zip(other.0.as_raw())
                .filter(|&(&a, &b)| (a != 0) != (b != 0))
                .count();
        }
        let width = self.0.width().max(other.0.width());
        let height = self.0.height().max(other.0.height());
        (0..height)
            .flat_map(|y| (0..width).map(move |x| Point2::new(x as i32, y as i32)))
            .filter(|&pixel| self.is_foreground(pixel) != other.is_foreground(pixel))
            .count()
    }

    pub fn into_inner(self) -> GrayImage {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: u32, from: u32, to: u32) -> ForegroundMask {
        let mut mask = ForegroundMask::new(size, size);
        for y in from..to {
            for x in from..to {
                mask.set(x, y, true);
            }
        }
        mask
    }

    #[test]
    fn nonzero_is_foreground() {
        let mut image = GrayImage::new(4, 4);
        image.put_pixel(1, 2, Luma([1]));
        let mask = ForegroundMask::from_gray(image);
        assert!(mask.is_foreground(Point2::new(1, 2)));
        assert!(!mask.is_foreground(Point2::new(2, 1)));
        assert!(!mask.is_foreground(Point2::new(-1, 2)));
        assert!(!mask.is_foreground(Point2::new(1, 4)));
        assert_eq!(mask.count_foreground(), 1);
    }

    #[test]
    fn difference_is_symmetric_xor() {
        let a = square(10, 2, 6);
        let b = square(10, 4, 8);
        // Two 4x4 squares overlapping in a 2x2 square.
        assert_eq!(a.difference(&b), 16 + 16 - 2 * 4);
        assert_eq!(b.difference(&a), a.difference(&b));
        assert_eq!(a.difference(&a), 0);
    }

    #[test]
    fn difference_ignores_foreground_intensity() {
        let mut dim = ForegroundMask::from_gray(GrayImage::from_pixel(6, 5, Luma([1])));
        let bright = ForegroundMask::from_gray(GrayImage::from_pixel(6, 5, Luma([255])));
        assert_eq!(dim.difference(&bright), 0);
        dim.set(5, 4, false);
        dim.set(0, 0, false);
        assert_eq!(dim.difference(&bright), 2);
        assert_eq!(bright.difference(&dim), 2);
    }

    #[test]
    fn difference_tolerates_size_mismatch() {
        let small = square(4, 0, 4);
        let large = square(8, 0, 8);
        assert_eq!(small.difference(&large), 64 - 16);
        assert_eq!(large.difference(&small), 64 - 16);
    }

    #[test]
    fn reads_back_saved_mask() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mask = square(6, 1, 3);
        mask.save(&path).unwrap();
        assert_eq!(ForegroundMask::open(&path).unwrap(), mask);
    }
}
