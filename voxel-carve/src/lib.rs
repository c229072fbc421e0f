//! # Voxel Carve
//!
//! Multi-camera shape-from-silhouette reconstruction. A handful of static, calibrated cameras
//! look at a volume. Every frame each camera contributes a foreground mask, and a voxel is
//! kept when its projection falls on the silhouette in the cameras that decide about it.
//!
//! The pieces, in the order they are used:
//!
//! * [`Camera`] loads a camera's calibration and background image and projects world points
//!   onto its image.
//! * [`VoxelGrid`] lays out the voxel lattice once and caches the projection of every voxel
//!   into every camera.
//! * [`carve`] and [`VisibilityEngine`] turn one frame's [`ForegroundMask`]s into the
//!   [`VisibleSet`] of occupied voxels.
//! * [`ThresholdTuner`] searches for the HSV thresholds the background subtraction that
//!   produces the masks should use.
//!
//! ```no_run
//! use voxel_carve::{Camera, ForegroundMask, ReconstructionSettings, VisibilityEngine, VoxelGrid};
//!
//! # fn main() -> voxel_carve::Result<()> {
//! let settings = ReconstructionSettings::default();
//! let cameras = (1..=4)
//!     .map(|n| Camera::open(format!("data/cam{}", n), n - 1, &settings))
//!     .collect::<Result<Vec<_>, _>>()?;
//! let grid = VoxelGrid::build(&cameras, &settings.grid)?;
//! let mut engine = VisibilityEngine::new(grid, settings.grid.policy);
//!
//! let masks = (1..=4)
//!     .map(|n| ForegroundMask::open(format!("data/cam{}/foreground/0000.png", n)))
//!     .collect::<Result<Vec<_>, _>>()?;
//! let visible = engine.update(&masks)?;
//! println!("{} voxels occupied", visible.len());
//! # Ok(())
//! # }
//! ```
//!
//! Grid construction and carving run on all cores through `rayon` unless the default `rayon`
//! feature is disabled.

mod calibration;
mod camera;
mod carve;
mod error;
mod grid;
mod mask;
mod settings;
mod threshold;

pub use calibration::*;
pub use camera::*;
pub use carve::*;
pub use error::*;
pub use grid::*;
pub use mask::*;
pub use settings::*;
pub use threshold::*;

pub use carve_core;
pub use carve_pinhole;
