//! Reading the intrinsic and extrinsic calibration of a camera from disk.
//!
//! Two formats are understood. OpenCV FileStorage XML, which is what `cv::FileStorage`
//! writes after `calibrateCamera`/`solvePnP`:
//!
//! ```xml
//! <?xml version="1.0"?>
//! <opencv_storage>
//! <CameraMatrix type_id="opencv-matrix">
//!   <rows>3</rows>
//!   <cols>3</cols>
//!   <dt>d</dt>
//!   <data>800. 0. 320. 0. 800. 240. 0. 0. 1.</data></CameraMatrix>
//! <DistortionCoeffs type_id="opencv-matrix"> ... </DistortionCoeffs>
//! <RotationValues type_id="opencv-matrix"> ... </RotationValues>
//! <TranslationValues type_id="opencv-matrix"> ... </TranslationValues>
//! </opencv_storage>
//! ```
//!
//! And JSON with the fields of [`Calibration`]. Files with a `.json` extension are read as
//! JSON, everything else as XML.

use crate::{Error, Result};
use carve_core::nalgebra::{Matrix3, Vector3};
use carve_core::WorldToCamera;
use carve_pinhole::{CameraIntrinsics, CameraIntrinsicsDistortion, Distortion};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The raw calibration of one camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// The intrinsic matrix in row-major order.
    pub camera_matrix: [[f64; 3]; 3],
    /// Distortion coefficients in OpenCV order `(k1, k2, p1, p2[, k3[, k4, k5, k6]])`.
    #[serde(default)]
    pub distortion_coeffs: Vec<f64>,
    /// Rodrigues rotation vector of the world relative to the camera.
    pub rotation_values: [f64; 3],
    /// Translation of the world origin in the camera frame.
    pub translation_values: [f64; 3],
}

impl Calibration {
    /// Reads a calibration file, choosing the format from its extension.
    ///
    /// Any failure, including an unreadable file, is reported as [`Error::CalibrationParse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let parse_error = |reason: String| Error::CalibrationParse {
            path: path.to_owned(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
        let is_json = path
            .extension()
            .map_or(false, |extension| extension.eq_ignore_ascii_case("json"));
        let calibration = if is_json {
            serde_json::from_str(&text).map_err(|e| parse_error(e.to_string()))?
        } else {
            Self::from_opencv_xml(&text).map_err(parse_error)?
        };
        calibration.validate().map_err(parse_error)?;
        Ok(calibration)
    }

    /// Parses an OpenCV FileStorage XML document.
    ///
    /// `DistortionCoeffs` may be left out, in which case the lens has no distortion.
    pub fn from_opencv_xml(xml: &str) -> std::result::Result<Self, String> {
        let matrices = read_opencv_matrices(xml)?;
        let required = |name: &str, len: usize| -> std::result::Result<Vec<f64>, String> {
            let matrix = matrices
                .get(name)
                .ok_or_else(|| format!("missing node {}", name))?;
            if matrix.data.len() != len {
                return Err(format!(
                    "node {} has {} values, expected {}",
                    name,
                    matrix.data.len(),
                    len
                ));
            }
            Ok(matrix.data.clone())
        };

        let k = required("CameraMatrix", 9)?;
        let rotation = required("RotationValues", 3)?;
        let translation = required("TranslationValues", 3)?;
        let distortion_coeffs = matrices
            .get("DistortionCoeffs")
            .map(|matrix| matrix.data.clone())
            .unwrap_or_default();

        Ok(Self {
            camera_matrix: [[k[0], k[1], k[2]], [k[3], k[4], k[5]], [k[6], k[7], k[8]]],
            distortion_coeffs,
            rotation_values: [rotation[0], rotation[1], rotation[2]],
            translation_values: [translation[0], translation[1], translation[2]],
        })
    }

    /// Checks that the values describe a usable camera.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let all_finite = self
            .camera_matrix
            .iter()
            .flatten()
            .chain(&self.distortion_coeffs)
            .chain(&self.rotation_values)
            .chain(&self.translation_values)
            .all(|n| n.is_finite());
        if !all_finite {
            return Err("calibration contains non-finite values".to_owned());
        }
        let [[fx, _, _], [_, fy, _], _] = self.camera_matrix;
        if fx <= 0.0 || fy <= 0.0 {
            return Err(format!("focal lengths must be positive, got ({}, {})", fx, fy));
        }
        if self.distortion_coeffs.len() > Distortion::MAX_COEFFICIENTS {
            return Err(format!(
                "{} distortion coefficients given, at most {} are supported",
                self.distortion_coeffs.len(),
                Distortion::MAX_COEFFICIENTS
            ));
        }
        Ok(())
    }

    /// The intrinsic matrix.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::from_fn(|row, col| self.camera_matrix[row][col])
    }

    /// The intrinsics together with the lens distortion.
    ///
    /// Returns `None` if there are too many distortion coefficients.
    pub fn intrinsics(&self) -> Option<CameraIntrinsicsDistortion> {
        let distortion = Distortion::from_coefficients(&self.distortion_coeffs)?;
        Some(CameraIntrinsicsDistortion::new(
            CameraIntrinsics::from_matrix(&self.matrix()),
            distortion,
        ))
    }

    /// The extrinsic pose mapping world points into the camera frame.
    pub fn pose(&self) -> WorldToCamera {
        WorldToCamera::from_rodrigues(
            Vector3::from(self.rotation_values),
            Vector3::from(self.translation_values),
        )
    }
}

#[derive(Debug, Default)]
struct OpenCvMatrix {
    rows: Option<usize>,
    cols: Option<usize>,
    data: Vec<f64>,
}

/// Collects every `opencv-matrix` node directly below the document root.
fn read_opencv_matrices(xml: &str) -> std::result::Result<HashMap<String, OpenCvMatrix>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut matrices: HashMap<String, OpenCvMatrix> = HashMap::new();
    let mut path: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if path.len() == 1 {
                    matrices.entry(name.clone()).or_default();
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(ref e)) => {
                // Only <root><Node><field> text is interesting.
                if let [_, node, field] = path.as_slice() {
                    let text = e.unescape().map_err(|e| e.to_string())?;
                    let matrix = matrices.entry(node.clone()).or_default();
                    match field.as_str() {
                        "rows" => matrix.rows = Some(parse_count(node, field, &text)?),
                        "cols" => matrix.cols = Some(parse_count(node, field, &text)?),
                        "data" => {
                            for token in text.split_whitespace() {
                                let value = token.parse::<f64>().map_err(|_| {
                                    format!("node {} has a non-numeric value {:?}", node, token)
                                })?;
                                matrix.data.push(value);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
        }
        buf.clear();
    }

    for (name, matrix) in &matrices {
        if let (Some(rows), Some(cols)) = (matrix.rows, matrix.cols) {
            if rows.checked_mul(cols) != Some(matrix.data.len()) {
                return Err(format!(
                    "node {} declares {}x{} but holds {} values",
                    name,
                    rows,
                    cols,
                    matrix.data.len()
                ));
            }
        }
    }

    Ok(matrices)
}

fn parse_count(node: &str, field: &str, text: &str) -> std::result::Result<usize, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("node {} has an invalid {} count {:?}", node, field, text))
}
