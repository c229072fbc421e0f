//! # Carve Core
//!
//! This library provides the geometric types shared by the voxel carving crates.
//! It contains the camera model trait, image keypoints, homogeneous camera and world points,
//! and the poses that move points between the world and a camera's frame of reference.
//! The crate is kept small so that every other crate in the workspace can depend on it
//! without pulling in image handling or parallelism.
//!
//! ## Coordinate frames
//!
//! Two 3d frames of reference show up everywhere in shape-from-silhouette:
//!
//! * [The world frame](WorldPoint), shared by all cameras and by the voxel lattice.
//!   For a calibration produced from a checkerboard lying on the floor, the floor is the
//!   `z = 0` plane and `z` grows upwards into the reconstruction volume.
//! * [The camera frame](CameraPoint), whose origin is the optical center of one camera.
//!   The positive X axis is right, positive Y axis is down, and the positive Z axis is
//!   forwards out of the lens.
//!
//! A [`WorldToCamera`] pose is what an extrinsic calibration (a Rodrigues rotation vector and
//! a translation vector) describes. Its inverse, [`CameraToWorld`], tells us where the camera
//! sits in the world and is used to put the camera's field of view into the scene.
//!
//! ```text
//!          world z
//!             |      camera (O) looking down at the volume
//!             |        \
//!             |         \  @@@@@@@ virtual image plane
//!             |          \
//!             +-----------\---------- world y
//!            /    voxels   \
//!           /               p
//!       world x
//! ```

mod camera;
mod keypoint;
mod point;
mod pose;
mod so3;

pub use camera::*;
pub use keypoint::*;
pub use nalgebra;
pub use point::*;
pub use pose::*;
pub use so3::*;
