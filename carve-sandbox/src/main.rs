use log::*;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use voxel_carve::{
    Camera, ForegroundMask, ReconstructionSettings, VisibilityEngine, VoxelGrid,
};

#[derive(StructOpt, Clone)]
#[structopt(
    name = "carve-sandbox",
    about = "A tool for testing multi-camera voxel carving"
)]
struct Opt {
    /// The directory holding one subdirectory per camera.
    ///
    /// Each camera directory contains the calibration, the background image and a directory
    /// of foreground masks, one per frame, which are matched up across cameras by sorted
    /// file name.
    #[structopt(short, long, default_value = "data")]
    data: PathBuf,
    /// The file where settings are specified.
    ///
    /// This is in the format of `voxel_carve::ReconstructionSettings`.
    #[structopt(short, long, default_value = "carve-settings.json")]
    settings: PathBuf,
    /// The number of cameras.
    #[structopt(short, long, default_value = "4")]
    cameras: usize,
    /// Carry on without cameras that fail to load instead of stopping.
    #[structopt(long)]
    skip_uncalibrated: bool,
    /// Print the occupied voxels of every frame to stdout as `frame x y z`.
    #[structopt(short, long)]
    print: bool,
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let settings = std::fs::File::open(&opt.settings)
        .ok()
        .and_then(|file| serde_json::from_reader(file).ok());
    if settings.is_some() {
        info!("loaded existing settings");
    } else {
        info!("used default settings");
    }
    let settings: ReconstructionSettings = settings.unwrap_or_default();

    // Load the cameras.
    let mut cameras = vec![];
    let mut directories = vec![];
    for number in 1..=opt.cameras {
        let directory = opt
            .data
            .join(format!("{}{}", settings.camera_directory_prefix, number));
        match Camera::open(&directory, cameras.len(), &settings) {
            Ok(camera) => {
                cameras.push(camera);
                directories.push(directory);
            }
            Err(e) if opt.skip_uncalibrated => {
                warn!("skipping camera {}: {}", number, e);
            }
            Err(e) => {
                error!("unable to open camera {}: {}", number, e);
                std::process::exit(1);
            }
        }
    }
    info!("opened {} cameras", cameras.len());

    let grid = match VoxelGrid::build(&cameras, &settings.grid) {
        Ok(grid) => grid,
        Err(e) => {
            error!("unable to build the voxel grid: {}", e);
            std::process::exit(1);
        }
    };
    let mut engine = VisibilityEngine::new(grid, settings.grid.policy);

    // Match up the masks of all cameras by frame.
    let frames: Vec<Vec<PathBuf>> = directories
        .iter()
        .map(|directory| mask_paths(&directory.join(&settings.foreground_directory)))
        .collect();
    let frame_count = frames.iter().map(Vec::len).min().unwrap_or(0);
    if frames.iter().any(|paths| paths.len() != frame_count) {
        warn!(
            "cameras have different numbers of masks, only carving the first {} frames",
            frame_count
        );
    }

    for frame in 0..frame_count {
        let masks = frames
            .iter()
            .map(|paths| ForegroundMask::open(&paths[frame]))
            .collect::<Result<Vec<_>, _>>();
        let masks = match masks {
            Ok(masks) => masks,
            Err(e) => {
                warn!("skipping frame {}: {}", frame, e);
                continue;
            }
        };
        match engine.update(&masks) {
            Ok(visible) => info!("frame {}: {} voxels visible", frame, visible.len()),
            Err(e) => {
                warn!("skipping frame {}: {}", frame, e);
                continue;
            }
        }
        if opt.print {
            for voxel in engine.visible_voxels().voxels(engine.grid()) {
                let p = voxel.position;
                println!("{} {} {} {}", frame, p.x, p.y, p.z);
            }
        }
    }
}

/// The files in a directory sorted by name.
fn mask_paths(directory: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("unable to read masks from {}: {}", directory.display(), e);
            return vec![];
        }
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    paths
}
