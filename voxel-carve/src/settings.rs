use serde::{Deserialize, Serialize};

/// The settings for the reconstruction process.
///
/// Every field has a default, so a settings file only needs to mention what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionSettings {
    /// The voxel lattice and the occupancy rule.
    #[serde(default)]
    pub grid: GridSettings,
    /// The HSV threshold search.
    #[serde(default)]
    pub tuner: TunerSettings,
    /// The name of each camera directory is this prefix followed by the 1-based camera number.
    #[serde(default = "default_camera_directory_prefix")]
    pub camera_directory_prefix: String,
    /// The intrinsics and extrinsics file inside each camera directory.
    ///
    /// Files ending in `.json` are read as JSON, everything else as OpenCV FileStorage XML.
    #[serde(default = "default_calibration_file")]
    pub calibration_file: String,
    /// The background reference image inside each camera directory.
    #[serde(default = "default_background_file")]
    pub background_file: String,
    /// The directory of per-frame foreground masks inside each camera directory.
    #[serde(default = "default_foreground_directory")]
    pub foreground_directory: String,
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self {
            grid: GridSettings::default(),
            tuner: TunerSettings::default(),
            camera_directory_prefix: default_camera_directory_prefix(),
            calibration_file: default_calibration_file(),
            background_file: default_background_file(),
            foreground_directory: default_foreground_directory(),
        }
    }
}

fn default_camera_directory_prefix() -> String {
    "cam".to_owned()
}

fn default_calibration_file() -> String {
    "config.xml".to_owned()
}

fn default_background_file() -> String {
    "background.png".to_owned()
}

fn default_foreground_directory() -> String {
    "foreground".to_owned()
}

/// Decides which voxels count as occupied given the cameras that see them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CarvePolicy {
    /// Every camera must see the voxel in frame and on its silhouette.
    ///
    /// This is the reference behaviour. A voxel outside the field of view of any camera is
    /// never occupied, so a camera that sees only part of the volume carves away everything
    /// it cannot see. Use [`CarvePolicy::InViewCameras`] to let such cameras abstain.
    AllCameras,
    /// Cameras that do not have the voxel in frame abstain.
    ///
    /// Every camera that has the voxel in frame must see it on its silhouette, and at
    /// least `min_views` cameras must have it in frame.
    InViewCameras { min_views: usize },
}

impl Default for CarvePolicy {
    fn default() -> Self {
        Self::AllCameras
    }
}

/// The voxel lattice spans `x, y ∈ [-height, height)` and `z ∈ [0, height)` in world units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSettings {
    /// Half extent of the volume in world units (the unit of the calibration translation).
    #[serde(default = "default_height")]
    pub height: i32,
    /// Distance between neighbouring voxels in world units.
    ///
    /// Must divide `height` and not only `2 * height`: the lattice starts at `-height` and
    /// `z` at zero, so both halves need a whole number of steps for the voxel count to be
    /// `(2h/s)² · (h/s)`.
    #[serde(default = "default_step")]
    pub step: i32,
    /// The occupancy rule applied by the carving pass.
    #[serde(default)]
    pub policy: CarvePolicy,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            height: default_height(),
            step: default_step(),
            policy: CarvePolicy::default(),
        }
    }
}

fn default_height() -> i32 {
    2048
}

fn default_step() -> i32 {
    32
}

/// The constants of the HSV threshold search.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunerSettings {
    /// The number of differing pixels at or below which a candidate mask is accepted.
    #[serde(default = "default_tolerance")]
    pub tolerance: usize,
    /// How far a threshold moves up while the difference keeps shrinking.
    #[serde(default = "default_increase_step")]
    pub increase_step: u8,
    /// How far a threshold moves back down once the difference grows.
    #[serde(default = "default_decrease_step")]
    pub decrease_step: u8,
    /// Upper bound of the hue threshold (OpenCV hue is in `0..180`).
    #[serde(default = "default_hue_ceiling")]
    pub hue_ceiling: u8,
    /// Upper bound of the saturation threshold.
    #[serde(default = "default_channel_ceiling")]
    pub saturation_ceiling: u8,
    /// Upper bound of the value threshold.
    #[serde(default = "default_channel_ceiling")]
    pub value_ceiling: u8,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            increase_step: default_increase_step(),
            decrease_step: default_decrease_step(),
            hue_ceiling: default_hue_ceiling(),
            saturation_ceiling: default_channel_ceiling(),
            value_ceiling: default_channel_ceiling(),
        }
    }
}

fn default_tolerance() -> usize {
    50
}

fn default_increase_step() -> u8 {
    3
}

fn default_decrease_step() -> u8 {
    2
}

fn default_hue_ceiling() -> u8 {
    179
}

fn default_channel_ceiling() -> u8 {
    255
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        let settings: ReconstructionSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, ReconstructionSettings::default());
        assert_eq!(settings.grid.height, 2048);
        assert_eq!(settings.grid.step, 32);
        assert_eq!(settings.tuner.hue_ceiling, 179);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let settings: ReconstructionSettings = serde_json::from_str(
            r#"{
                "grid": { "step": 64, "policy": { "kind": "in_view_cameras", "min_views": 2 } },
                "calibration_file": "calibration.json"
            }"#,
        )
        .unwrap();
        assert_eq!(settings.grid.height, 2048);
        assert_eq!(settings.grid.step, 64);
        assert_eq!(
            settings.grid.policy,
            CarvePolicy::InViewCameras { min_views: 2 }
        );
        assert_eq!(settings.calibration_file, "calibration.json");
        assert_eq!(settings.background_file, "background.png");
    }
}
