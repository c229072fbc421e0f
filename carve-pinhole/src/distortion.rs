// TODO: The thin prism (s1..s4) and tilted sensor (τx, τy) terms of the 12 and 14
// coefficient OpenCV models are not supported yet.

use crate::{CameraIntrinsics, NormalizedKeyPoint};
use carve_core::nalgebra::{Point2, Vector2};
use carve_core::{CameraModel, ImagePoint, KeyPoint};
use num_traits::Float;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Polynomial in coefficient form.
///
/// $$
/// f(x, \vec β) = β_0 + β_1 ​⋅ x + β_2 ​⋅ x^2 + β_3 ⋅ x^3
/// $$
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Polynomial(pub [f64; 4]);

impl Polynomial {
    /// The polynomial that is `1.0` everywhere.
    pub fn one() -> Self {
        Self([1.0, 0.0, 0.0, 0.0])
    }

    pub fn evaluate(&self, value: f64) -> f64 {
        // Horner.
        let mut result = 0.0;
        for &coefficient in self.0.iter().rev() {
            result *= value;
            result += coefficient;
        }
        result
    }
}

/// Lens distortion in the OpenCV convention.
///
/// Given normalized coordinates $(x, y)$ and $r^2 = x^2 + y^2$, the distorted coordinates are
///
/// $$
/// \begin{aligned}
/// x' &= x ⋅ \frac{1 + k_1 r^2 + k_2 r^4 + k_3 r^6}{1 + k_4 r^2 + k_5 r^4 + k_6 r^6} + 2 p_1 x y + p_2 (r^2 + 2 x^2) \\\\
/// y' &= y ⋅ \frac{1 + k_1 r^2 + k_2 r^4 + k_3 r^6}{1 + k_4 r^2 + k_5 r^4 + k_6 r^6} + p_1 (r^2 + 2 y^2) + 2 p_2 x y
/// \end{aligned}
/// $$
///
/// The coefficient vector is stored as `(k1, k2, p1, p2[, k3[, k4, k5, k6]])`, which is the
/// layout OpenCV writes into `DistortionCoeffs`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Distortion {
    /// Numerator of the radial factor as a polynomial in $r^2$.
    pub radial_numerator: Polynomial,
    /// Denominator of the radial factor as a polynomial in $r^2$.
    pub radial_denominator: Polynomial,
    /// The decentering coefficients $(p_1, p_2)$.
    pub tangential: [f64; 2],
}

impl Distortion {
    /// The maximum number of coefficients that can be interpreted.
    pub const MAX_COEFFICIENTS: usize = 8;

    /// No distortion at all.
    pub fn none() -> Self {
        Self {
            radial_numerator: Polynomial::one(),
            radial_denominator: Polynomial::one(),
            tangential: [0.0, 0.0],
        }
    }

    /// Interprets an OpenCV distortion coefficient vector.
    ///
    /// Missing trailing coefficients are zero, so the empty slice is no distortion.
    /// Returns `None` when there are more coefficients than [`Self::MAX_COEFFICIENTS`].
    ///
    /// ```
    /// use carve_pinhole::Distortion;
    /// let distortion = Distortion::from_coefficients(&[-0.1, 0.01, 0.0, 0.0, 0.0]).unwrap();
    /// assert_eq!(distortion.coefficients(), [-0.1, 0.01, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    /// assert!(Distortion::from_coefficients(&[0.0; 12]).is_none());
    /// ```
    pub fn from_coefficients(coefficients: &[f64]) -> Option<Self> {
        if coefficients.len() > Self::MAX_COEFFICIENTS {
            return None;
        }
        let mut c = [0.0; Self::MAX_COEFFICIENTS];
        c[..coefficients.len()].copy_from_slice(coefficients);
        let [k1, k2, p1, p2, k3, k4, k5, k6] = c;
        Some(Self {
            radial_numerator: Polynomial([1.0, k1, k2, k3]),
            radial_denominator: Polynomial([1.0, k4, k5, k6]),
            tangential: [p1, p2],
        })
    }

    /// The coefficients in OpenCV order `(k1, k2, p1, p2, k3, k4, k5, k6)`.
    pub fn coefficients(&self) -> [f64; Self::MAX_COEFFICIENTS] {
        let [_, k1, k2, k3] = self.radial_numerator.0;
        let [_, k4, k5, k6] = self.radial_denominator.0;
        let [p1, p2] = self.tangential;
        [k1, k2, p1, p2, k3, k4, k5, k6]
    }

    fn radial(&self, r2: f64) -> f64 {
        self.radial_numerator.evaluate(r2) / self.radial_denominator.evaluate(r2)
    }

    fn decentering(&self, point: Vector2<f64>) -> Vector2<f64> {
        let [p1, p2] = self.tangential;
        let (x, y) = (point.x, point.y);
        let r2 = point.norm_squared();
        Vector2::new(
            2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        )
    }

    /// Apply distortion to an ideal normalized point.
    pub fn distort(&self, point: Vector2<f64>) -> Vector2<f64> {
        point * self.radial(point.norm_squared()) + self.decentering(point)
    }

    /// Numerically undo distortion.
    ///
    /// # Method
    ///
    /// This is the fixed-point iteration used by OpenCV's `undistortPoints`:
    ///
    /// $$
    /// \vec x_{i+1} = \frac{\vec x' - \vec t(\vec x_i)}{f_r(r_i^2)}
    /// $$
    ///
    /// starting from $\vec x_0 = \vec x'$. The iteration stops once re-distorting
    /// the estimate lands within `EPSILON` of the observed point.
    pub fn undistort(&self, distorted: Vector2<f64>) -> Vector2<f64> {
        const MAX_ITERATIONS: usize = 100;

        // In normalized image units.
        const EPSILON: f64 = 1e-12;

        let mut point = distorted;
        for _ in 0..MAX_ITERATIONS {
            let factor = self.radial(point.norm_squared());
            if !Float::is_finite(factor) || factor <= 0.0 {
                // The model folds over itself this far out, so there is no unique answer.
                return distorted;
            }
            point = (distorted - self.decentering(point)) / factor;
            let error = (self.distort(point) - distorted).norm();
            if Float::abs(error) <= EPSILON {
                break;
            }
        }
        point
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Self::none()
    }
}

/// Pinhole intrinsics followed by OpenCV lens distortion.
///
/// This is the model behind OpenCV's `projectPoints` and `undistortPoints`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsicsDistortion {
    pub simple_intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
}

impl CameraIntrinsicsDistortion {
    pub fn new(simple_intrinsics: CameraIntrinsics, distortion: Distortion) -> Self {
        Self {
            simple_intrinsics,
            distortion,
        }
    }
}

impl CameraModel for CameraIntrinsicsDistortion {
    type Projection = NormalizedKeyPoint;

    /// Removes the camera matrix and then the lens distortion from a pixel.
    ///
    /// ```
    /// use carve_core::{KeyPoint, CameraModel};
    /// use carve_pinhole::{CameraIntrinsics, CameraIntrinsicsDistortion, Distortion};
    /// use carve_core::nalgebra::{Vector2, Point2};
    /// let intrinsics = CameraIntrinsics {
    ///     focals: Vector2::new(800.0, 900.0),
    ///     principal_point: Point2::new(500.0, 600.0),
    ///     skew: 0.0,
    /// };
    /// let distortion = Distortion::from_coefficients(&[-0.16, 0.03, 0.001, -0.002]).unwrap();
    /// let camera = CameraIntrinsicsDistortion::new(intrinsics, distortion);
    /// let pixel = KeyPoint(Point2::new(471.0, 322.0));
    /// let ideal = camera.calibrate(pixel);
    /// assert!((camera.uncalibrate(ideal).0 - pixel.0).norm() < 1e-6);
    /// ```
    fn calibrate<P>(&self, point: P) -> NormalizedKeyPoint
    where
        P: ImagePoint,
    {
        let NormalizedKeyPoint(distorted) = self.simple_intrinsics.calibrate(point);
        NormalizedKeyPoint(Point2::from(self.distortion.undistort(distorted.coords)))
    }

    fn uncalibrate(&self, projection: NormalizedKeyPoint) -> KeyPoint {
        let NormalizedKeyPoint(ideal) = projection;
        let distorted = NormalizedKeyPoint(Point2::from(self.distortion.distort(ideal.coords)));
        self.simple_intrinsics.uncalibrate(distorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use proptest::prelude::*;

    fn webcam_lens() -> Distortion {
        Distortion::from_coefficients(&[-0.2816, 0.1118, 0.0012, -0.0004, -0.0229]).unwrap()
    }

    #[test]
    fn polynomial_in_ascending_powers() {
        let polynomial = Polynomial([1.0, 2.0, 3.0, 4.0]);
        assert_float_eq!(polynomial.evaluate(0.5), 1.0 + 1.0 + 0.75 + 0.5, ulps <= 1);
    }

    #[test]
    fn no_distortion_is_identity() {
        let point = Vector2::new(0.3, -0.7);
        assert_eq!(Distortion::none().distort(point), point);
        assert_eq!(Distortion::from_coefficients(&[]).unwrap(), Distortion::none());
    }

    #[test]
    fn radial_only_matches_closed_form() {
        let distortion = Distortion::from_coefficients(&[0.1, 0.01]).unwrap();
        let point = Vector2::new(0.2, 0.1);
        let r2 = 0.05;
        let expected = point * (1.0 + 0.1 * r2 + 0.01 * r2 * r2);
        assert!((distortion.distort(point) - expected).norm() < 1e-15);
    }

    #[test]
    fn undistort_inverts_distort() {
        let distortion = webcam_lens();
        proptest!(|(x in -0.5..0.5, y in -0.4..0.4)| {
            let ideal = Vector2::new(x, y);
            let recovered = distortion.undistort(distortion.distort(ideal));
            prop_assert!((recovered - ideal).norm() < 1e-9);
        });
    }
}
