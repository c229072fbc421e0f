//! Error types for reconstruction setup and carving.

use std::path::PathBuf;

/// Errors that can occur while setting up cameras, building the grid, or carving a frame.
///
/// Everything up to and including [`Error::InvalidGrid`] is a setup error and must be dealt
/// with before any frame is carved. The mask errors only invalidate the frame they came with.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The calibration file of a camera could not be located.
    #[error("calibration for camera {camera} not found at {path}")]
    CalibrationMissing {
        /// The camera whose calibration is missing.
        camera: usize,
        /// Where the calibration was expected.
        path: PathBuf,
    },

    /// The calibration file exists but could not be read or interpreted.
    #[error("unable to parse calibration {path}: {reason}")]
    CalibrationParse {
        /// The offending file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The background reference image of a camera is absent or unreadable.
    #[error("background image for camera {camera} not usable at {path}: {reason}")]
    BackgroundMissing {
        /// The camera whose background is missing.
        camera: usize,
        /// Where the background image was expected.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Grid construction was requested without any cameras.
    #[error("camera set is empty, nothing to reconstruct")]
    EmptyCameraSet,

    /// The cameras do not all share the same image plane size.
    #[error("camera {camera} has an image plane of {actual:?}, expected {expected:?}")]
    CameraSizeMismatch {
        /// The first camera that disagrees with camera 0.
        camera: usize,
        /// The size of camera 0.
        expected: (u32, u32),
        /// The size of the disagreeing camera.
        actual: (u32, u32),
    },

    /// The grid height and step do not describe a regular lattice.
    #[error("invalid grid: height {height} and step {step} must be positive and the step must divide the height")]
    InvalidGrid {
        /// Half extent of the volume.
        height: i32,
        /// Distance between neighbouring voxels.
        step: i32,
    },

    /// A frame did not come with exactly one mask per camera.
    #[error("expected one foreground mask per camera ({expected}), got {actual}")]
    MaskCountMismatch {
        /// The number of cameras.
        expected: usize,
        /// The number of masks provided.
        actual: usize,
    },

    /// A foreground mask does not have the size of its camera's image plane.
    #[error("foreground mask of camera {camera} is {actual:?}, expected {expected:?}")]
    MaskSizeMismatch {
        /// The camera the mask belongs to.
        camera: usize,
        /// The image plane size.
        expected: (u32, u32),
        /// The mask size.
        actual: (u32, u32),
    },

    /// An image could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
