use birdseye_camera::{UndistortedPoint, WorldPoint};
use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, DegenerateScale};
use crate::linalg;

/// Minimum number of correspondences to estimate a homography.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Smallest accepted ratio between the eighth and the largest singular value of the DLT system.
pub const DEGENERACY_THRESHOLD: f64 = 1e-8;

/// Smallest accepted determinant of the homography in normalized coordinates.
pub const SINGULARITY_THRESHOLD: f64 = 1e-8;

/// Homogeneous scale below which a projected point is considered at infinity.
pub const PROJECTION_EPSILON: f64 = 1e-12;

/// A projective transform from undistorted pixels to the ground plane.
///
/// The inverse is computed once at construction so both directions are cheap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography {
    matrix: [[f64; 3]; 3],
    inverse: [[f64; 3]; 3],
}

impl Homography {
    /// Create a homography from a 3x3 matrix mapping undistorted pixels to world points.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::Singular`] if the matrix cannot be inverted.
    pub fn from_matrix(matrix: [[f64; 3]; 3]) -> Result<Self, CalibrationError> {
        let det = linalg::det_mat33(&matrix);
        let inverse = linalg::inverse_mat33(&matrix)
            .filter(|inv| inv.iter().flatten().all(|v| v.is_finite()))
            .ok_or(CalibrationError::Singular { det })?;
        Ok(Self { matrix, inverse })
    }

    /// The matrix mapping undistorted pixels to world points.
    pub fn matrix(&self) -> &[[f64; 3]; 3] {
        &self.matrix
    }

    /// The matrix mapping world points to undistorted pixels.
    pub fn inverse(&self) -> &[[f64; 3]; 3] {
        &self.inverse
    }

    /// Map an undistorted pixel onto the ground plane.
    pub fn to_world(&self, p: &UndistortedPoint) -> Result<WorldPoint, DegenerateScale> {
        project(&self.matrix, p.x, p.y).map(|[x, y]| WorldPoint::new(x, y))
    }

    /// Map a ground-plane point to an undistorted pixel.
    pub fn to_undistorted(&self, p: &WorldPoint) -> Result<UndistortedPoint, DegenerateScale> {
        project(&self.inverse, p.x, p.y).map(|[x, y]| UndistortedPoint::new(x, y))
    }

    /// The homogeneous scale of an undistorted pixel mapped onto the ground plane.
    ///
    /// Its sign tells on which side of the horizon line of the camera the pixel lies.
    pub fn scale_to_world(&self, p: &UndistortedPoint) -> f64 {
        linalg::mat33_mul_vec3(&self.matrix, &[p.x, p.y, 1.0])[2]
    }

    /// The homogeneous scale of a ground-plane point mapped to an undistorted pixel.
    pub fn scale_to_undistorted(&self, p: &WorldPoint) -> f64 {
        linalg::mat33_mul_vec3(&self.inverse, &[p.x, p.y, 1.0])[2]
    }
}

impl TryFrom<[[f64; 3]; 3]> for Homography {
    type Error = CalibrationError;

    fn try_from(matrix: [[f64; 3]; 3]) -> Result<Self, Self::Error> {
        Self::from_matrix(matrix)
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        h.matrix
    }
}

// apply a projective transform and divide by the homogeneous scale
fn project(m: &[[f64; 3]; 3], x: f64, y: f64) -> Result<[f64; 2], DegenerateScale> {
    let [u, v, w] = linalg::mat33_mul_vec3(m, &[x, y, 1.0]);
    if w.is_nan() || w.abs() <= PROJECTION_EPSILON {
        return Err(DegenerateScale(w));
    }
    Ok([u / w, v / w])
}

/// Estimate the homography mapping undistorted pixels to world points.
///
/// Uses the normalized direct linear transform: both point sets are translated and
/// scaled to zero mean and mean distance `sqrt(2)`, and the least-squares solution over
/// all the pairs is the right singular vector of the smallest singular value.
///
/// The returned matrix is scaled so that its bottom-right entry is 1 when that entry
/// is not close to zero.
///
/// # Arguments
///
/// * `src` - The undistorted pixels.
/// * `dst` - The matching world points, in the same order.
///
/// # Errors
///
/// A [`CalibrationError`] if the input has fewer than [`MIN_CORRESPONDENCES`] pairs,
/// non-finite or repeated points, or if the points are (nearly) collinear.
pub fn estimate_homography(
    src: &[UndistortedPoint],
    dst: &[WorldPoint],
) -> Result<Homography, CalibrationError> {
    if src.len() != dst.len() {
        return Err(CalibrationError::LengthMismatch {
            pixels: src.len(),
            world: dst.len(),
        });
    }

    if src.len() < MIN_CORRESPONDENCES {
        return Err(CalibrationError::NotEnoughCorrespondences {
            found: src.len(),
            required: MIN_CORRESPONDENCES,
        });
    }

    let src = src.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>();
    let dst = dst.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>();
    check_points(&src, &dst)?;

    // condition both sides to avoid mixing pixels and millimeters in the system
    let (src_n, t_src) = normalize_points_2d(&src);
    let (dst_n, t_dst) = normalize_points_2d(&dst);

    // construct matrix A
    let n = src_n.len();
    let mut mat_a = faer::Mat::<f64>::zeros(2 * n, 9);
    for (i, (x1_i, x2_i)) in src_n.iter().zip(dst_n.iter()).enumerate() {
        mat_a[(2 * i, 0)] = x1_i[0];
        mat_a[(2 * i, 1)] = x1_i[1];
        mat_a[(2 * i, 2)] = 1.0;
        mat_a[(2 * i, 6)] = -x2_i[0] * x1_i[0];
        mat_a[(2 * i, 7)] = -x2_i[0] * x1_i[1];
        mat_a[(2 * i, 8)] = -x2_i[0];

        mat_a[(2 * i + 1, 3)] = x1_i[0];
        mat_a[(2 * i + 1, 4)] = x1_i[1];
        mat_a[(2 * i + 1, 5)] = 1.0;
        mat_a[(2 * i + 1, 6)] = -x2_i[1] * x1_i[0];
        mat_a[(2 * i + 1, 7)] = -x2_i[1] * x1_i[1];
        mat_a[(2 * i + 1, 8)] = -x2_i[1];
    }

    // solve -> h: 9x1, the right singular vector of the smallest singular value
    let svd = mat_a.svd();

    // a second vanishing singular value means the solution is not unique
    let s = svd.s_diagonal();
    let ratio = s.read(7) / s.read(0);
    if ratio.is_nan() || ratio < DEGENERACY_THRESHOLD {
        return Err(CalibrationError::Degenerate { ratio });
    }

    let h = svd.v().col(8);
    let mut homo_n = [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], h[8]]];
    linalg::normalize_mat33_inplace(&mut homo_n);

    let det = linalg::det_mat33(&homo_n);
    if det.is_nan() || det.abs() < SINGULARITY_THRESHOLD {
        return Err(CalibrationError::Singular { det });
    }

    // denormalize: H = T_dst^-1 * Hn * T_src
    let t_dst_inv = invert_similarity(&t_dst);
    let mut homo = linalg::mat33_mul(&linalg::mat33_mul(&t_dst_inv, &homo_n), &t_src);

    let norm = homo.iter().flatten().map(|v| v * v).sum::<f64>().sqrt();
    if homo[2][2].abs() > norm * f64::EPSILON {
        let scale = homo[2][2];
        homo.iter_mut().flatten().for_each(|v| *v /= scale);
    } else {
        linalg::normalize_mat33_inplace(&mut homo);
    }

    Homography::from_matrix(homo)
}

fn check_points(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<(), CalibrationError> {
    for (index, (p, q)) in src.iter().zip(dst.iter()).enumerate() {
        if !p.iter().chain(q.iter()).all(|v| v.is_finite()) {
            return Err(CalibrationError::NonFinite { index });
        }

        let first = (0..index).find(|&j| src[j] == *p || dst[j] == *q);
        if let Some(first) = first {
            return Err(CalibrationError::Duplicate { index, first });
        }
    }
    Ok(())
}

// similarity transform T = [[s, 0, -s * mx], [0, s, -s * my], [0, 0, 1]]
fn normalize_points_2d(x: &[[f64; 2]]) -> (Vec<[f64; 2]>, [[f64; 3]; 3]) {
    let n = x.len() as f64;
    let mx = x.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = x.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist = x
        .iter()
        .map(|p| (p[0] - mx).hypot(p[1] - my))
        .sum::<f64>()
        / n;
    let scale = if mean_dist > 0.0 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let xn = x
        .iter()
        .map(|p| [(p[0] - mx) * scale, (p[1] - my) * scale])
        .collect();

    let t = [
        [scale, 0.0, -scale * mx],
        [0.0, scale, -scale * my],
        [0.0, 0.0, 1.0],
    ];
    (xn, t)
}

fn invert_similarity(t: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let s = t[0][0];
    [
        [1.0 / s, 0.0, -t[0][2] / s],
        [0.0, 1.0 / s, -t[1][2] / s],
        [0.0, 0.0, 1.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn apply(h: &[[f64; 3]; 3], p: [f64; 2]) -> [f64; 2] {
        let [x, y, w] = linalg::mat33_mul_vec3(h, &[p[0], p[1], 1.0]);
        [x / w, y / w]
    }

    fn to_points(h: &[[f64; 3]; 3], src: &[[f64; 2]]) -> (Vec<UndistortedPoint>, Vec<WorldPoint>) {
        let x1 = src.iter().map(|&p| UndistortedPoint::from(p)).collect();
        let x2 = src.iter().map(|&p| WorldPoint::from(apply(h, p))).collect();
        (x1, x2)
    }

    #[test]
    fn test_estimate_homography_identity() -> Result<(), CalibrationError> {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let (x1, x2) = to_points(&identity, &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let homo = estimate_homography(&x1, &x2)?;

        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(homo.matrix()[i][j], identity[i][j], epsilon = 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn test_estimate_homography_projective() -> Result<(), Box<dyn std::error::Error>> {
        let expected = [
            [1.2, 0.1, -300.0],
            [-0.05, 0.9, 120.0],
            [1e-4, -2e-4, 1.0],
        ];
        let src = [
            [100.0, 100.0],
            [900.0, 120.0],
            [880.0, 700.0],
            [130.0, 650.0],
            [500.0, 400.0],
            [300.0, 250.0],
        ];
        let (x1, x2) = to_points(&expected, &src);
        let homo = estimate_homography(&x1, &x2)?;

        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(
                    homo.matrix()[i][j],
                    expected[i][j],
                    epsilon = 1e-9,
                    max_relative = 1e-6
                );
            }
        }

        for (p, q) in x1.iter().zip(x2.iter()) {
            let w = homo.to_world(p)?;
            assert_relative_eq!(w.x, q.x, epsilon = 1e-6);
            assert_relative_eq!(w.y, q.y, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_homography_inverse_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let homo = Homography::from_matrix([
            [2.0, 0.0, 10.0],
            [0.0, 3.0, -5.0],
            [0.001, 0.0, 1.0],
        ])?;
        let p = UndistortedPoint::new(40.0, 25.0);
        let w = homo.to_world(&p)?;
        let q = homo.to_undistorted(&w)?;
        assert_relative_eq!(p.x, q.x, epsilon = 1e-9);
        assert_relative_eq!(p.y, q.y, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_homography_projection_at_infinity() -> Result<(), CalibrationError> {
        let homo = Homography::from_matrix([
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, -1.0],
        ])?;
        assert_eq!(
            homo.to_world(&UndistortedPoint::new(1.0, 5.0)),
            Err(DegenerateScale(0.0))
        );
        Ok(())
    }

    #[test]
    fn test_homography_scale_changes_sign_across_horizon() -> Result<(), Box<dyn std::error::Error>> {
        let homo = Homography::from_matrix([
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.01, 1.0],
        ])?;
        // the pixel row v = -100 maps to infinity
        assert!(homo.scale_to_world(&UndistortedPoint::new(0.0, 50.0)) > 0.0);
        assert!(homo.scale_to_world(&UndistortedPoint::new(0.0, -150.0)) < 0.0);

        let near = homo.to_world(&UndistortedPoint::new(0.0, 50.0))?;
        assert!(homo.scale_to_undistorted(&near) > 0.0);
        let far = homo.to_world(&UndistortedPoint::new(0.0, -150.0))?;
        assert!(homo.scale_to_undistorted(&far) < 0.0);
        Ok(())
    }

    #[test]
    fn test_estimate_homography_not_enough_points() {
        let x1 = vec![UndistortedPoint::new(0.0, 0.0); 3];
        let x2 = vec![WorldPoint::new(0.0, 0.0); 3];
        assert_eq!(
            estimate_homography(&x1, &x2),
            Err(CalibrationError::NotEnoughCorrespondences {
                found: 3,
                required: 4
            })
        );
    }

    #[test]
    fn test_estimate_homography_length_mismatch() {
        let x1 = vec![UndistortedPoint::new(0.0, 0.0); 5];
        let x2 = vec![WorldPoint::new(0.0, 0.0); 4];
        assert!(matches!(
            estimate_homography(&x1, &x2),
            Err(CalibrationError::LengthMismatch { pixels: 5, world: 4 })
        ));
    }

    #[test]
    fn test_estimate_homography_collinear() {
        let x1 = (0..4)
            .map(|i| UndistortedPoint::new(i as f64, i as f64))
            .collect::<Vec<_>>();
        let x2 = (0..4)
            .map(|i| WorldPoint::new(10.0 * i as f64, 10.0 * i as f64))
            .collect::<Vec<_>>();
        assert!(matches!(
            estimate_homography(&x1, &x2),
            Err(CalibrationError::Degenerate { .. })
        ));
    }

    #[test]
    fn test_estimate_homography_duplicate() {
        let x1 = vec![
            UndistortedPoint::new(0.0, 0.0),
            UndistortedPoint::new(100.0, 0.0),
            UndistortedPoint::new(0.0, 100.0),
            UndistortedPoint::new(100.0, 0.0),
        ];
        let x2 = vec![
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(1.0, 0.0),
            WorldPoint::new(0.0, 1.0),
            WorldPoint::new(1.0, 1.0),
        ];
        assert_eq!(
            estimate_homography(&x1, &x2),
            Err(CalibrationError::Duplicate { index: 3, first: 1 })
        );
    }

    #[test]
    fn test_estimate_homography_non_finite() {
        let mut x1 = vec![
            UndistortedPoint::new(0.0, 0.0),
            UndistortedPoint::new(100.0, 0.0),
            UndistortedPoint::new(0.0, 100.0),
            UndistortedPoint::new(100.0, 100.0),
        ];
        x1[2].y = f64::NAN;
        let x2 = vec![
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(1.0, 0.0),
            WorldPoint::new(0.0, 1.0),
            WorldPoint::new(1.0, 1.0),
        ];
        assert_eq!(
            estimate_homography(&x1, &x2),
            Err(CalibrationError::NonFinite { index: 2 })
        );
    }

    #[test]
    fn test_homography_serde_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let homo = Homography::from_matrix([[1.0, 0.0, 5.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]])?;
        let json = serde_json::to_string(&homo)?;
        assert_eq!(json, "[[1.0,0.0,5.0],[0.0,2.0,0.0],[0.0,0.0,1.0]]");
        let singular = serde_json::from_str::<Homography>("[[1,0,0],[0,0,0],[0,0,1]]");
        assert!(singular.is_err());
        Ok(())
    }
}
