use crate::{CameraProjection, CarvePolicy, Error, ForegroundMask, Result, Voxel, VoxelGrid};
use log::*;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// The voxels that are occupied in one frame, by index in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleSet(Vec<usize>);

impl VisibleSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    /// The voxel indices in ascending order.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Looks up the occupied voxels in the grid they were carved from.
    pub fn voxels<'a>(&'a self, grid: &'a VoxelGrid) -> impl Iterator<Item = Voxel> + 'a {
        self.0.iter().filter_map(move |&index| grid.voxel(index))
    }
}

/// Decides whether one voxel is occupied given its projections and the masks of every camera.
fn is_occupied(
    projections: &[CameraProjection],
    masks: &[ForegroundMask],
    policy: CarvePolicy,
) -> bool {
    let mut seen = projections.iter().zip(masks);
    match policy {
        CarvePolicy::AllCameras => {
            seen.all(|(projection, mask)| projection.valid && mask.is_foreground(projection.pixel))
        }
        CarvePolicy::InViewCameras { min_views } => {
            let mut views = 0;
            for (projection, mask) in seen.filter(|(projection, _)| projection.valid) {
                if !mask.is_foreground(projection.pixel) {
                    return false;
                }
                views += 1;
            }
            views >= min_views.max(1)
        }
    }
}

/// Carves one frame: keeps the voxels that the occupancy policy accepts given one foreground
/// mask per camera, in camera order.
///
/// The masks are checked against the grid before anything is carved.
pub fn carve(
    grid: &VoxelGrid,
    masks: &[ForegroundMask],
    policy: CarvePolicy,
) -> Result<VisibleSet> {
    let camera_count = grid.camera_count();
    if masks.len() != camera_count {
        return Err(Error::MaskCountMismatch {
            expected: camera_count,
            actual: masks.len(),
        });
    }
    let plane_size = grid.plane_size();
    for (camera, mask) in masks.iter().enumerate() {
        let size = mask.size();
        if size != plane_size {
            return Err(Error::MaskSizeMismatch {
                camera,
                expected: (plane_size.x, plane_size.y),
                actual: (size.x, size.y),
            });
        }
    }

    let occupied = |(index, projections): (usize, &[CameraProjection])| {
        if is_occupied(projections, masks, policy) {
            Some(index)
        } else {
            None
        }
    };

    #[cfg(not(feature = "rayon"))]
    let visible: Vec<usize> = grid
        .projection_table()
        .chunks(camera_count)
        .enumerate()
        .filter_map(occupied)
        .collect();

    #[cfg(feature = "rayon")]
    let visible: Vec<usize> = grid
        .projection_table()
        .par_chunks(camera_count)
        .enumerate()
        .filter_map(occupied)
        .collect();

    debug!("{} of {} voxels visible", visible.len(), grid.len());
    Ok(VisibleSet(visible))
}

/// Keeps the grid and the visible set of the most recent frame.
///
/// The renderer pulls [`VisibilityEngine::visible_voxels`] whenever it wants. A frame that
/// fails to carve leaves the previous visible set in place.
#[derive(Debug, Clone)]
pub struct VisibilityEngine {
    grid: VoxelGrid,
    policy: CarvePolicy,
    visible: VisibleSet,
}

impl VisibilityEngine {
    /// Creates an engine with nothing visible yet.
    pub fn new(grid: VoxelGrid, policy: CarvePolicy) -> Self {
        Self {
            grid,
            policy,
            visible: VisibleSet::default(),
        }
    }

    /// Carves a new frame and replaces the visible set with the result.
    pub fn update(&mut self, masks: &[ForegroundMask]) -> Result<&VisibleSet> {
        self.visible = carve(&self.grid, masks, self.policy)?;
        Ok(&self.visible)
    }

    pub fn visible_voxels(&self) -> &VisibleSet {
        &self.visible
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn policy(&self) -> CarvePolicy {
        self.policy
    }
}
