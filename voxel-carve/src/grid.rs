use crate::{Camera, Error, GridSettings, Result};
use carve_core::nalgebra::{Point2, Point3, Vector2, Vector3};
use carve_core::WorldPoint;
use log::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// A point of the voxel lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Voxel {
    /// Position of the voxel in the grid's voxel array.
    pub index: usize,
    /// Lattice coordinate in world units.
    pub position: Point3<i32>,
}

/// Where a voxel lands on one camera's image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraProjection {
    /// The rounded pixel. Only meaningful if `valid` is set.
    pub pixel: Point2<i32>,
    /// Set when the voxel is in front of the camera and `pixel` lies on its image.
    pub valid: bool,
}

impl CameraProjection {
    fn invalid() -> Self {
        Self {
            pixel: Point2::origin(),
            valid: false,
        }
    }

    fn new(camera: &Camera, world: WorldPoint, plane_size: Vector2<u32>) -> Self {
        camera
            .project_in_front(world)
            .and_then(|keypoint| {
                keypoint.pixel().map(|pixel| Self {
                    pixel,
                    valid: keypoint.is_within(plane_size),
                })
            })
            .unwrap_or_else(Self::invalid)
    }
}

/// A regular lattice of voxels together with their precomputed projections into every camera.
///
/// The lattice spans `x, y ∈ [-height, height)` and `z ∈ [0, height)` with a spacing of
/// `step`. Voxel `p` sits at lattice offsets `(xp, yp, zp)` with
/// `p = zp · nx · ny + yp · nx + xp`.
///
/// The projections are stored per voxel, one [`CameraProjection`] per camera in camera order,
/// so the projections of voxel `p` are `projection_table()[p * cameras..(p + 1) * cameras]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    height: i32,
    step: i32,
    dimensions: Vector3<usize>,
    plane_size: Vector2<u32>,
    camera_count: usize,
    corners: [Point3<i32>; 8],
    projections: Vec<CameraProjection>,
}

impl VoxelGrid {
    /// Builds the lattice and projects every voxel into every camera.
    ///
    /// This is the expensive part of the reconstruction and only needs to happen once for a
    /// fixed camera setup. The result only depends on the cameras and the settings.
    pub fn build(cameras: &[Camera], settings: &GridSettings) -> Result<Self> {
        let first = cameras.first().ok_or(Error::EmptyCameraSet)?;
        let plane_size = first.plane_size();
        if let Some(mismatch) = cameras.iter().find(|c| c.plane_size() != plane_size) {
            return Err(Error::CameraSizeMismatch {
                camera: mismatch.id(),
                expected: (plane_size.x, plane_size.y),
                actual: (mismatch.plane_size().x, mismatch.plane_size().y),
            });
        }
        let dimensions = lattice_dimensions(settings)?;
        let (height, step) = (settings.height, settings.step);

        let plane = dimensions.x * dimensions.y;
        let voxel_count = plane * dimensions.z;
        let camera_count = cameras.len();
        info!(
            "building {}x{}x{} voxel grid ({} voxels) for {} cameras",
            dimensions.x, dimensions.y, dimensions.z, voxel_count, camera_count
        );

        let mut projections = vec![CameraProjection::invalid(); voxel_count * camera_count];
        let slabs_done = AtomicUsize::new(0);
        let fill_slab = |(zp, slab): (usize, &mut [CameraProjection])| {
            let z = zp as i32 * step;
            for (local, voxel_projections) in slab.chunks_mut(camera_count).enumerate() {
                let x = -height + (local % dimensions.x) as i32 * step;
                let y = -height + (local / dimensions.x) as i32 * step;
                let world = WorldPoint::from_lattice(Point3::new(x, y, z));
                for (projection, camera) in voxel_projections.iter_mut().zip(cameras) {
                    *projection = CameraProjection::new(camera, world, plane_size);
                }
            }
            let done = slabs_done.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(
                "voxel grid {:.0}% done",
                100.0 * done as f64 / dimensions.z as f64
            );
        };

        #[cfg(not(feature = "rayon"))]
        projections
            .chunks_mut(plane * camera_count)
            .enumerate()
            .for_each(fill_slab);

        #[cfg(feature = "rayon")]
        projections
            .par_chunks_mut(plane * camera_count)
            .enumerate()
            .for_each(fill_slab);

        let corners = [
            Point3::new(-height, -height, 0),
            Point3::new(-height, height, 0),
            Point3::new(height, height, 0),
            Point3::new(height, -height, 0),
            Point3::new(-height, -height, height),
            Point3::new(-height, height, height),
            Point3::new(height, height, height),
            Point3::new(height, -height, height),
        ];

        Ok(Self {
            height,
            step,
            dimensions,
            plane_size,
            camera_count,
            corners,
            projections,
        })
    }

    /// The number of voxels.
    pub fn len(&self) -> usize {
        self.dimensions.x * self.dimensions.y * self.dimensions.z
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of voxels along `x`, `y` and `z`.
    pub fn dimensions(&self) -> Vector3<usize> {
        self.dimensions
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    /// The image plane size shared by all cameras.
    pub fn plane_size(&self) -> Vector2<u32> {
        self.plane_size
    }

    pub fn camera_count(&self) -> usize {
        self.camera_count
    }

    /// The corners of the reconstruction volume: the floor square starting at
    /// `(-height, -height, 0)` and going on to `(-height, height, 0)`, then the same square
    /// at `z = height`.
    pub fn corners(&self) -> &[Point3<i32>; 8] {
        &self.corners
    }

    /// The lattice position of the voxel with the given index.
    pub fn position_of(&self, index: usize) -> Option<Point3<i32>> {
        if index >= self.len() {
            return None;
        }
        let xp = index % self.dimensions.x;
        let yp = index / self.dimensions.x % self.dimensions.y;
        let zp = index / (self.dimensions.x * self.dimensions.y);
        Some(Point3::new(
            -self.height + xp as i32 * self.step,
            -self.height + yp as i32 * self.step,
            zp as i32 * self.step,
        ))
    }

    /// The index of the voxel at the given lattice position.
    ///
    /// Returns `None` if the position is outside of the volume or between lattice points.
    pub fn index_of(&self, position: Point3<i32>) -> Option<usize> {
        let offset = |value: i32, origin: i32, count: usize| -> Option<usize> {
            let shifted = i64::from(value) - i64::from(origin);
            let step = i64::from(self.step);
            if shifted < 0 || shifted % step != 0 {
                return None;
            }
            let offset = (shifted / step) as usize;
            (offset < count).then(|| offset)
        };
        let xp = offset(position.x, -self.height, self.dimensions.x)?;
        let yp = offset(position.y, -self.height, self.dimensions.y)?;
        let zp = offset(position.z, 0, self.dimensions.z)?;
        Some((zp * self.dimensions.y + yp) * self.dimensions.x + xp)
    }

    pub fn voxel(&self, index: usize) -> Option<Voxel> {
        self.position_of(index)
            .map(|position| Voxel { index, position })
    }

    /// Iterates over all voxels in index order.
    pub fn voxels(&self) -> impl Iterator<Item = Voxel> + '_ {
        (0..self.len()).filter_map(move |index| self.voxel(index))
    }

    /// The projections of one voxel into every camera, in camera order.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn projections(&self, index: usize) -> &[CameraProjection] {
        &self.projections[index * self.camera_count..(index + 1) * self.camera_count]
    }

    /// The projections of all voxels, laid out as described on [`VoxelGrid`].
    pub fn projection_table(&self) -> &[CameraProjection] {
        &self.projections
    }
}

/// The number of voxels along each axis, if the settings describe a regular lattice.
fn lattice_dimensions(settings: &GridSettings) -> Result<Vector3<usize>> {
    let GridSettings { height, step, .. } = *settings;
    if height <= 0 || step <= 0 || height % step != 0 {
        return Err(Error::InvalidGrid { height, step });
    }
    let half = (height / step) as usize;
    Ok(Vector3::new(2 * half, 2 * half, half))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::tests::overhead_calibration;
    use crate::CarvePolicy;

    fn camera(id: usize, size: Vector2<u32>) -> Camera {
        Camera::from_calibration(id, overhead_calibration(vec![]), size).unwrap()
    }

    fn settings(height: i32, step: i32) -> GridSettings {
        GridSettings {
            height,
            step,
            policy: CarvePolicy::AllCameras,
        }
    }

    #[test]
    fn default_lattice_size() {
        let dimensions = lattice_dimensions(&GridSettings::default()).unwrap();
        assert_eq!(dimensions, Vector3::new(128, 128, 64));
        assert_eq!(dimensions.x * dimensions.y * dimensions.z, 1_048_576);
    }

    #[test]
    fn rejects_irregular_lattice() {
        for (height, step) in [(2048, 0), (2048, -32), (0, 32), (100, 32), (48, 32)] {
            assert!(matches!(
                lattice_dimensions(&settings(height, step)),
                Err(Error::InvalidGrid { .. })
            ));
        }
    }

    #[test]
    fn rejects_bad_camera_sets() {
        assert!(matches!(
            VoxelGrid::build(&[], &settings(64, 32)),
            Err(Error::EmptyCameraSet)
        ));

        let cameras = [
            camera(0, Vector2::new(640, 480)),
            camera(1, Vector2::new(640, 480)),
            camera(2, Vector2::new(320, 240)),
        ];
        assert!(matches!(
            VoxelGrid::build(&cameras, &settings(64, 32)),
            Err(Error::CameraSizeMismatch {
                camera: 2,
                expected: (640, 480),
                actual: (320, 240),
            })
        ));
    }

    #[test]
    fn index_and_position_are_inverse() {
        let cameras = [camera(0, Vector2::new(640, 480))];
        let grid = VoxelGrid::build(&cameras, &settings(128, 32)).unwrap();
        assert_eq!(grid.len(), 8 * 8 * 4);
        for voxel in grid.voxels() {
            assert_eq!(grid.index_of(voxel.position), Some(voxel.index));
        }
        assert_eq!(grid.position_of(0), Some(Point3::new(-128, -128, 0)));
        assert_eq!(grid.position_of(grid.len() - 1), Some(Point3::new(96, 96, 96)));
        assert_eq!(grid.position_of(grid.len()), None);
        assert_eq!(grid.index_of(Point3::new(128, 0, 0)), None);
        assert_eq!(grid.index_of(Point3::new(-127, 0, 0)), None);
        assert_eq!(grid.index_of(Point3::new(0, 0, -32)), None);
    }

    #[test]
    fn corners_bound_the_volume() {
        let cameras = [camera(0, Vector2::new(640, 480))];
        let grid = VoxelGrid::build(&cameras, &settings(64, 32)).unwrap();
        assert_eq!(grid.corners()[0], Point3::new(-64, -64, 0));
        assert_eq!(grid.corners()[2], Point3::new(64, 64, 0));
        assert_eq!(grid.corners()[6], Point3::new(64, 64, 64));
        for voxel in grid.voxels() {
            let p = voxel.position;
            assert!((-64..64).contains(&p.x) && (-64..64).contains(&p.y) && (0..64).contains(&p.z));
        }
    }

    #[test]
    fn projections_match_camera() {
        let cameras = [
            camera(0, Vector2::new(640, 480)),
            camera(1, Vector2::new(640, 480)),
        ];
        let grid = VoxelGrid::build(&cameras, &settings(256, 32)).unwrap();
        for voxel in grid.voxels() {
            let world = WorldPoint::from_lattice(voxel.position);
            for (camera, projection) in cameras.iter().zip(grid.projections(voxel.index)) {
                let expected = camera.project_in_front(world).unwrap();
                assert_eq!(Some(projection.pixel), expected.pixel());
                assert!(projection.valid);
            }
        }
    }

    #[test]
    fn build_is_deterministic() {
        let cameras = [camera(0, Vector2::new(640, 480))];
        let a = VoxelGrid::build(&cameras, &settings(4096, 512)).unwrap();
        let b = VoxelGrid::build(&cameras, &settings(4096, 512)).unwrap();
        assert_eq!(a, b);
        // The camera only sees the middle of a volume this wide.
        assert!(a.projection_table().iter().any(|p| !p.valid));
        assert!(a.projection_table().iter().any(|p| p.valid));
    }
}
