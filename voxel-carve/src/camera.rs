use crate::{Calibration, Error, ReconstructionSettings, Result};
use carve_core::nalgebra::{Matrix4, Point2, Point3, Vector2, Vector4};
use carve_core::{
    CameraModel, CameraPoint, CameraToWorld, KeyPoint, Pose, Projective, WorldPoint, WorldToCamera,
};
use carve_pinhole::{CameraIntrinsicsDistortion, NormalizedKeyPoint};
use image::RgbImage;
use log::*;
use std::path::{Path, PathBuf};

/// One calibrated, static camera observing the reconstruction volume.
///
/// A camera is immutable once created. It owns its calibration and the background reference
/// image, but not the frames or masks of the video it records, so a set of cameras can be
/// shared freely between threads while frames are carved.
#[derive(Debug, Clone)]
pub struct Camera {
    id: usize,
    calibration: Calibration,
    intrinsics: CameraIntrinsicsDistortion,
    pose: WorldToCamera,
    rt: Matrix4<f64>,
    rt_inverse: Matrix4<f64>,
    location: Point3<f64>,
    camera_plane: [WorldPoint; 6],
    plane_size: Vector2<u32>,
    background: Option<RgbImage>,
}

impl Camera {
    /// Opens a camera from its data directory.
    ///
    /// The background image is loaded first, since its size is the size of the camera's image
    /// plane, and then the calibration file. Both names come from `settings`.
    pub fn open(
        directory: impl AsRef<Path>,
        id: usize,
        settings: &ReconstructionSettings,
    ) -> Result<Self> {
        let directory = directory.as_ref();

        let background_path = directory.join(&settings.background_file);
        let background = image::open(&background_path)
            .map_err(|e| Error::BackgroundMissing {
                camera: id,
                path: background_path.clone(),
                reason: e.to_string(),
            })?
            .to_rgb8();
        let plane_size = Vector2::new(background.width(), background.height());
        debug!(
            "camera {} background {} is {}x{}",
            id,
            background_path.display(),
            plane_size.x,
            plane_size.y
        );

        let calibration_path = directory.join(&settings.calibration_file);
        if !calibration_path.is_file() {
            return Err(Error::CalibrationMissing {
                camera: id,
                path: calibration_path,
            });
        }
        let calibration = Calibration::from_file(&calibration_path)?;

        let mut camera = Self::from_calibration(id, calibration, plane_size)?;
        camera.background = Some(background);
        Ok(camera)
    }

    /// Creates a camera from an in-memory calibration and the size of its image plane.
    ///
    /// The camera has no background image. An unusable calibration is reported as
    /// [`Error::CalibrationParse`] with an empty path.
    pub fn from_calibration(
        id: usize,
        calibration: Calibration,
        plane_size: Vector2<u32>,
    ) -> Result<Self> {
        let parse_error = |reason: String| Error::CalibrationParse {
            path: PathBuf::new(),
            reason,
        };
        calibration.validate().map_err(parse_error)?;
        let intrinsics = calibration
            .intrinsics()
            .ok_or_else(|| parse_error("unsupported distortion model".to_owned()))?;

        let pose = calibration.pose();
        let camera_to_world: CameraToWorld = pose.inverse();
        let rt = pose.homogeneous();
        let rt_inverse = camera_to_world.homogeneous();
        let location = camera_to_world.optical_center();
        info!(
            "camera {} located at ({:.1}, {:.1}, {:.1})",
            id, location.x, location.y, location.z
        );

        let mut camera = Self {
            id,
            calibration,
            intrinsics,
            pose,
            rt,
            rt_inverse,
            location,
            camera_plane: [WorldPoint::from_point(location); 6],
            plane_size,
            background: None,
        };
        camera.camera_plane = camera.compute_camera_plane();
        Ok(camera)
    }

    /// The location of the camera followed by the four corners of its image plane, clockwise
    /// from the top left, and the principal point, all in world coordinates.
    ///
    /// The image plane is placed at the virtual depth used by [`Camera::image_to_world`].
    fn compute_camera_plane(&self) -> [WorldPoint; 6] {
        let (w, h) = (self.plane_size.x as f64, self.plane_size.y as f64);
        let principal_point = self.intrinsics.simple_intrinsics.principal_point;
        let corner = |x: f64, y: f64| self.image_to_world(KeyPoint(Point2::new(x, y)));
        [
            WorldPoint::from_point(self.location),
            corner(0.0, 0.0),
            corner(w, 0.0),
            corner(w, h),
            corner(0.0, h),
            corner(principal_point.x, principal_point.y),
        ]
    }

    /// Projects a world point onto the image, following OpenCV's `projectPoints`.
    ///
    /// The point is moved into the camera frame, divided by its depth, distorted, and
    /// multiplied by the intrinsic matrix. Nothing is checked: points behind the camera
    /// land on the image mirrored and points at depth zero produce non-finite coordinates.
    pub fn project_to_image(&self, world: WorldPoint) -> KeyPoint {
        let camera = self.pose.transform(world).bearing_unnormalized();
        let normalized = NormalizedKeyPoint(Point2::new(camera.x / camera.z, camera.y / camera.z));
        self.intrinsics.uncalibrate(normalized)
    }

    /// Projects a world point onto the image if it lies in front of the camera.
    ///
    /// Returns `None` for points on or behind the plane of the optical center and for
    /// projections that are not finite.
    pub fn project_in_front(&self, world: WorldPoint) -> Option<KeyPoint> {
        let depth = self.pose.transform(world).depth()?;
        if depth <= 0.0 || !depth.is_finite() {
            return None;
        }
        let keypoint = self.project_to_image(world);
        if keypoint.0.coords.iter().all(|n| n.is_finite()) {
            Some(keypoint)
        } else {
            None
        }
    }

    /// Moves a point from the camera frame into the world frame.
    pub fn camera_to_world(&self, camera: CameraPoint) -> WorldPoint {
        WorldPoint(self.rt_inverse * camera.homogeneous())
    }

    /// Places a pixel into the world, on the virtual image plane.
    ///
    /// The pixel is centered on the principal point and put at a depth of the mean focal
    /// length, all in pixel units. This neither undoes distortion nor uses world units, and is
    /// only meant for drawing the camera's field of view. See [`Camera::pixel_ray`] for a
    /// metric back-projection.
    pub fn image_to_world(&self, pixel: KeyPoint) -> WorldPoint {
        let intrinsics = &self.intrinsics.simple_intrinsics;
        let centered = pixel.0 - intrinsics.principal_point;
        self.camera_to_world(CameraPoint(Vector4::new(
            centered.x,
            centered.y,
            intrinsics.mean_focal(),
            1.0,
        )))
    }

    /// The world point seen at `pixel` that is `depth` world units in front of the camera.
    ///
    /// Distortion is undone, so this is the inverse of [`Camera::project_in_front`].
    pub fn pixel_ray(&self, pixel: KeyPoint, depth: f64) -> WorldPoint {
        self.camera_to_world(self.intrinsics.calibrate(pixel).with_depth(depth))
    }

    /// The index of the camera.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The calibration the camera was created from.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn intrinsics(&self) -> &CameraIntrinsicsDistortion {
        &self.intrinsics
    }

    /// The pose of the world relative to the camera.
    pub fn pose(&self) -> WorldToCamera {
        self.pose
    }

    /// The homogeneous rotation-translation matrix that maps world points into the camera frame.
    pub fn rt(&self) -> &Matrix4<f64> {
        &self.rt
    }

    /// The inverse of [`Camera::rt`].
    pub fn rt_inverse(&self) -> &Matrix4<f64> {
        &self.rt_inverse
    }

    /// The optical center in world coordinates.
    pub fn location(&self) -> Point3<f64> {
        self.location
    }

    /// See [`Camera::compute_camera_plane`] for the layout.
    pub fn camera_plane(&self) -> &[WorldPoint; 6] {
        &self.camera_plane
    }

    /// The width and height of the image plane in pixels.
    pub fn plane_size(&self) -> Vector2<u32> {
        self.plane_size
    }

    /// The background reference image, if the camera was opened from disk.
    pub fn background(&self) -> Option<&RgbImage> {
        self.background.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use carve_core::nalgebra::Vector3;
    use core::f64::consts::PI;
    use float_eq::assert_float_eq;
    use proptest::prelude::*;

    /// A camera 5000 units above the world origin looking straight down.
    pub(crate) fn overhead_calibration(distortion_coeffs: Vec<f64>) -> Calibration {
        Calibration {
            camera_matrix: [[800.0, 0.0, 320.0], [0.0, 800.0, 240.0], [0.0, 0.0, 1.0]],
            distortion_coeffs,
            rotation_values: [PI, 0.0, 0.0],
            translation_values: [0.0, 0.0, 5000.0],
        }
    }

    fn overhead_camera() -> Camera {
        Camera::from_calibration(
            0,
            overhead_calibration(vec![-0.2, 0.05, 0.001, -0.001, 0.0]),
            Vector2::new(640, 480),
        )
        .unwrap()
    }

    #[test]
    fn location_is_above_origin() {
        let camera = overhead_camera();
        assert!((camera.location() - Point3::new(0.0, 0.0, 5000.0)).norm() < 1e-9);
        assert_eq!(camera.camera_plane()[0].point(), Some(camera.location()));
    }

    #[test]
    fn origin_projects_to_principal_point() {
        let camera = overhead_camera();
        let keypoint = camera.project_to_image(WorldPoint::new(0.0, 0.0, 0.0));
        assert_float_eq!(keypoint.x, 320.0, abs <= 1e-9);
        assert_float_eq!(keypoint.y, 240.0, abs <= 1e-9);
    }

    #[test]
    fn points_behind_are_not_in_front() {
        let camera = overhead_camera();
        assert!(camera
            .project_in_front(WorldPoint::new(0.0, 0.0, 6000.0))
            .is_none());
        assert!(camera
            .project_in_front(WorldPoint::new(10.0, 10.0, 5000.0))
            .is_none());
        assert!(camera
            .project_in_front(WorldPoint::new(10.0, 10.0, 100.0))
            .is_some());
    }

    #[test]
    fn rt_inverse_is_consistent() {
        let camera = overhead_camera();
        let product = camera.rt() * camera.rt_inverse();
        assert!((product - Matrix4::identity()).norm() < 1e-9);
        assert_eq!(camera.rt().row(3).into_owned(), Vector4::w().transpose());
    }

    #[test]
    fn principal_point_lies_on_optical_axis() {
        let camera = overhead_camera();
        let principal = camera.camera_plane()[5].point().unwrap();
        let offset = principal - camera.location();
        assert_float_eq!(offset.norm(), 800.0, abs <= 1e-9);
        assert!((offset.normalize() - -Vector3::z()).norm() < 1e-9);
    }

    #[test]
    fn pixel_ray_inverts_projection() {
        let camera = overhead_camera();
        proptest!(|(x in -1500.0..1500.0, y in -1000.0..1000.0, z in 0.0..2000.0)| {
            let world = WorldPoint::new(x, y, z);
            let depth = camera.pose().transform(world).depth().unwrap();
            let keypoint = camera.project_in_front(world).unwrap();
            let back = camera.pixel_ray(keypoint, depth).point().unwrap();
            prop_assert!((back.coords - Vector3::new(x, y, z)).norm() < 1e-5);
        });
    }

    #[test]
    fn open_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ReconstructionSettings::default();

        assert!(matches!(
            Camera::open(dir.path(), 3, &settings),
            Err(Error::BackgroundMissing { camera: 3, .. })
        ));

        RgbImage::new(64, 48)
            .save(dir.path().join(&settings.background_file))
            .unwrap();
        assert!(matches!(
            Camera::open(dir.path(), 3, &settings),
            Err(Error::CalibrationMissing { camera: 3, .. })
        ));
    }

    #[test]
    fn open_reads_plane_size_from_background() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ReconstructionSettings {
            calibration_file: "calibration.json".to_owned(),
            ..Default::default()
        };
        RgbImage::new(64, 48)
            .save(dir.path().join(&settings.background_file))
            .unwrap();
        std::fs::write(
            dir.path().join(&settings.calibration_file),
            serde_json::to_string(&overhead_calibration(vec![])).unwrap(),
        )
        .unwrap();

        let camera = Camera::open(dir.path(), 0, &settings).unwrap();
        assert_eq!(camera.plane_size(), Vector2::new(64, 48));
        assert_eq!(camera.background().map(|b| b.dimensions()), Some((64, 48)));
    }
}
