use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Matrix3, Rotation3, Vector3};
use num_traits::Float;
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A Rodrigues rotation vector, as stored in OpenCV calibration files.
///
/// The direction is the rotation axis and the norm is the angle in radians. This is the
/// so(3) tangent space of the rotation group, and [`Skew3::rotation`] is its exponential map.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Skew3(pub Vector3<f64>);

impl Skew3 {
    /// The rotation matrix, following OpenCV's `Rodrigues`:
    ///
    /// $$
    /// R = \cos θ ⋅ I + (1 - \cos θ) ⋅ \hat k \hat k^T + \sin θ ⋅ [\hat k]_×
    /// $$
    ///
    /// Below an angle of `f64::EPSILON` the vector is treated as no rotation.
    pub fn rotation(self) -> Rotation3<f64> {
        self.into()
    }

    /// The cross-product matrix `[w]×`, so that `w.hat() * v == w.cross(&v)`.
    pub fn hat(self) -> Matrix3<f64> {
        self.0.cross_matrix()
    }
}

impl From<Skew3> for Rotation3<f64> {
    fn from(w: Skew3) -> Self {
        let theta = w.0.norm();
        if theta < f64::epsilon() {
            return Rotation3::identity();
        }
        let k = w.0 / theta;
        let (sin, cos) = theta.sin_cos();
        let matrix = Matrix3::identity() * cos
            + k * k.transpose() * (1.0 - cos)
            + Skew3(k).hat() * sin;
        Rotation3::from_matrix_unchecked(matrix)
    }
}

impl From<Rotation3<f64>> for Skew3 {
    fn from(rotation: Rotation3<f64>) -> Self {
        let w = rotation.scaled_axis();
        // Rotations of π have an ambiguous axis, and nalgebra may give NaN for them.
        if w.iter().all(|n| n.is_finite()) {
            Self(w)
        } else {
            Self(Vector3::zeros())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn quarter_turn_about_z() {
        let rotation = Skew3(Vector3::new(0.0, 0.0, FRAC_PI_2)).rotation();
        assert!((rotation * Vector3::x() - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn half_turn_about_x_flips_y_and_z() {
        let rotation = Skew3(Vector3::new(PI, 0.0, 0.0)).rotation().into_inner();
        let expected = Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0));
        assert!((rotation - expected).norm() < 1e-12);
    }

    #[test]
    fn agrees_with_axis_angle() {
        let w = Vector3::new(0.3, -1.2, 0.7);
        let ours = Skew3(w).rotation();
        let theirs = Rotation3::from_scaled_axis(w);
        assert!((ours.into_inner() - theirs.into_inner()).norm() < 1e-12);
        let orthogonality = ours.into_inner() * ours.into_inner().transpose();
        assert!((orthogonality - Matrix3::identity()).norm() < 1e-12);
    }

    #[test]
    fn log_map_roundtrip() {
        let w = Skew3(Vector3::new(0.3, -1.2, 0.7));
        let back: Skew3 = w.rotation().into();
        assert!((back.0 - w.0).norm() < 1e-9);
    }

    #[test]
    fn zero_vector_is_identity() {
        let rotation = Skew3(Vector3::zeros()).rotation().into_inner();
        assert_eq!(rotation, Matrix3::identity());
    }
}
