use serde::{Deserialize, Serialize};

use crate::point::NormalizedPoint;

/// Maximum number of Newton iterations used to invert the distortion polynomial.
pub const UNDISTORT_MAX_ITERATIONS: usize = 20;

/// Convergence threshold on the angle update, in radians.
pub const UNDISTORT_EPSILON: f64 = 1e-10;

/// Angular margin kept below 90 degrees for best-effort undistortion.
const FIELD_OF_VIEW_MARGIN: f64 = 1e-6;

/// Represents the equidistant fisheye distortion parameters of a camera
///
/// The distorted angle is `theta_d = theta * (1 + k1 * theta^2 + k2 * theta^4 + k3 * theta^6 + k4 * theta^8)`
/// where `theta` is the angle between the incoming ray and the optical axis.
///
/// # Fields
///
/// * `k1` - The first distortion coefficient
/// * `k2` - The second distortion coefficient
/// * `k3` - The third distortion coefficient
/// * `k4` - The fourth distortion coefficient
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct FisheyeDistortion {
    /// The first distortion coefficient
    pub k1: f64,
    /// The second distortion coefficient
    pub k2: f64,
    /// The third distortion coefficient
    pub k3: f64,
    /// The fourth distortion coefficient
    pub k4: f64,
}

impl FisheyeDistortion {
    /// Create the distortion parameters from the coefficients.
    pub const fn new(k1: f64, k2: f64, k3: f64, k4: f64) -> Self {
        Self { k1, k2, k3, k4 }
    }

    /// Whether all the coefficients are finite.
    pub fn is_finite(&self) -> bool {
        [self.k1, self.k2, self.k3, self.k4]
            .iter()
            .all(|k| k.is_finite())
    }

    /// Evaluate the distorted angle for an undistorted angle.
    #[inline]
    pub fn theta_d(&self, theta: f64) -> f64 {
        let theta2 = theta * theta;
        let theta4 = theta2 * theta2;
        let theta6 = theta4 * theta2;
        let theta8 = theta4 * theta4;
        theta * (1.0 + self.k1 * theta2 + self.k2 * theta4 + self.k3 * theta6 + self.k4 * theta8)
    }

    /// Derivative of [`FisheyeDistortion::theta_d`] with respect to `theta`.
    #[inline]
    fn theta_d_derivative(&self, theta: f64) -> f64 {
        let theta2 = theta * theta;
        let theta4 = theta2 * theta2;
        let theta6 = theta4 * theta2;
        let theta8 = theta4 * theta4;
        1.0 + 3.0 * self.k1 * theta2
            + 5.0 * self.k2 * theta4
            + 7.0 * self.k3 * theta6
            + 9.0 * self.k4 * theta8
    }
}

impl From<[f64; 4]> for FisheyeDistortion {
    fn from(k: [f64; 4]) -> Self {
        Self::new(k[0], k[1], k[2], k[3])
    }
}

impl From<FisheyeDistortion> for [f64; 4] {
    fn from(d: FisheyeDistortion) -> Self {
        [d.k1, d.k2, d.k3, d.k4]
    }
}

/// The result of inverting the distortion for a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UndistortResult {
    /// The undistorted camera-normalized point (best effort when not converged).
    pub point: NormalizedPoint,
    /// Whether the Newton iteration converged to a ray in front of the camera.
    pub converged: bool,
}

/// Distort a camera-normalized point using the equidistant fisheye model
///
/// # Arguments
///
/// * `point` - The undistorted camera-normalized point
/// * `distortion` - The distortion parameters of the camera
///
/// # Returns
///
/// The distorted camera-normalized point. Multiply by the intrinsics to get pixels.
pub fn distort_point_fisheye(
    point: &NormalizedPoint,
    distortion: &FisheyeDistortion,
) -> NormalizedPoint {
    let r = point.x.hypot(point.y);

    // angle of the incoming ray with the optical axis
    let theta = r.atan();
    let theta_d = distortion.theta_d(theta);

    let scale = if r > 0.0 { theta_d / r } else { 1.0 };

    NormalizedPoint::new(point.x * scale, point.y * scale)
}

/// Undistort a camera-normalized point using the equidistant fisheye model
///
/// Inverts the distortion polynomial with Newton iterations on the ray angle.
/// If the iteration does not converge, or lands outside `(0, pi / 2)`, the point is
/// mapped with the equidistant angle clamped just below 90 degrees and `converged`
/// is false. The result is always finite.
///
/// # Arguments
///
/// * `point` - The distorted camera-normalized point
/// * `distortion` - The distortion parameters of the camera
///
/// # Returns
///
/// The undistorted camera-normalized point and the convergence flag.
pub fn undistort_point_fisheye(
    point: &NormalizedPoint,
    distortion: &FisheyeDistortion,
) -> UndistortResult {
    let radius = point.x.hypot(point.y);

    // the model is only valid up to 180 degrees of field of view
    let theta_d = radius.min(std::f64::consts::PI);

    if theta_d < UNDISTORT_EPSILON {
        return UndistortResult {
            point: *point,
            converged: true,
        };
    }

    let mut theta = theta_d;
    let mut converged = false;
    for _ in 0..UNDISTORT_MAX_ITERATIONS {
        let theta_fix =
            (distortion.theta_d(theta) - theta_d) / distortion.theta_d_derivative(theta);
        let next = theta - theta_fix;
        if !next.is_finite() {
            break;
        }
        theta = next;
        if theta_fix.abs() < UNDISTORT_EPSILON {
            converged = true;
            break;
        }
    }

    // a ray at or past 90 degrees, or on the opposite side of the optical axis, has no
    // image on the plane; fall back to the equidistant angle just inside the limit
    let converged = converged && theta > 0.0 && theta < std::f64::consts::FRAC_PI_2;
    if !converged {
        log::debug!("fisheye undistortion did not converge for theta_d = {theta_d}");
        theta = theta_d.min(std::f64::consts::FRAC_PI_2 - FIELD_OF_VIEW_MARGIN);
    }

    let scale = theta.tan() / radius;
    UndistortResult {
        point: NormalizedPoint::new(point.x * scale, point.y * scale),
        converged,
    }
}
