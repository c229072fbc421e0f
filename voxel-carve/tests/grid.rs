use core::f64::consts::PI;
use voxel_carve::carve_core::nalgebra::{Point3, Vector2};
use voxel_carve::{Calibration, Camera, GridSettings, ReconstructionSettings, VoxelGrid};

fn overhead_camera(id: usize) -> Camera {
    let calibration = Calibration {
        camera_matrix: [[800.0, 0.0, 320.0], [0.0, 800.0, 240.0], [0.0, 0.0, 1.0]],
        distortion_coeffs: vec![-0.2, 0.05],
        rotation_values: [PI, 0.0, 0.0],
        translation_values: [0.0, 0.0, 8000.0],
    };
    Camera::from_calibration(id, calibration, Vector2::new(640, 480)).unwrap()
}

#[test]
fn default_grid_has_a_million_voxels() {
    let cameras = [overhead_camera(0)];
    let settings = ReconstructionSettings::default();
    let grid = VoxelGrid::build(&cameras, &settings.grid).unwrap();
    assert_eq!(grid.len(), 1_048_576);
    assert_eq!(grid.projection_table().len(), 1_048_576);
    assert_eq!(grid.position_of(0), Some(Point3::new(-2048, -2048, 0)));
    assert_eq!(
        grid.position_of(grid.len() - 1),
        Some(Point3::new(2016, 2016, 2016))
    );
}

#[test]
fn projection_table_is_per_voxel_per_camera() {
    let cameras = [overhead_camera(0), overhead_camera(1), overhead_camera(2)];
    let settings = GridSettings {
        height: 256,
        step: 64,
        ..Default::default()
    };
    let grid = VoxelGrid::build(&cameras, &settings).unwrap();
    assert_eq!(grid.camera_count(), 3);
    assert_eq!(grid.projection_table().len(), grid.len() * 3);
    for voxel in grid.voxels() {
        let projections = grid.projections(voxel.index);
        assert_eq!(projections.len(), 3);
        // Identical cameras see every voxel at the same pixel.
        assert!(projections.iter().all(|p| *p == projections[0]));
    }
}
