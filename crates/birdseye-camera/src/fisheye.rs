use serde::{Deserialize, Serialize};

use crate::distortion::{distort_point_fisheye, undistort_point_fisheye, FisheyeDistortion};
use crate::error::CameraError;
use crate::intrinsic::{CameraIntrinsic, ImageSize};
use crate::point::{NormalizedPoint, PixelPoint, UndistortedPoint};

/// A fisheye camera: intrinsics, equidistant distortion and the sensor resolution.
///
/// All the operations are pure and preserve the order of the input points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FisheyeModel {
    intrinsic: CameraIntrinsic,
    distortion: FisheyeDistortion,
    image_size: ImageSize,
}

impl FisheyeModel {
    /// Create a new fisheye model.
    ///
    /// # Arguments
    ///
    /// * `intrinsic` - The intrinsic parameters of the camera.
    /// * `distortion` - The fisheye distortion coefficients.
    /// * `image_size` - The resolution of the raw fisheye images.
    ///
    /// # Errors
    ///
    /// Fails if the intrinsics are not strictly positive, a coefficient is not
    /// finite or the image is empty.
    pub fn new(
        intrinsic: CameraIntrinsic,
        distortion: FisheyeDistortion,
        image_size: ImageSize,
    ) -> Result<Self, CameraError> {
        intrinsic.validate()?;

        if !distortion.is_finite() {
            return Err(CameraError::InvalidParameter(format!(
                "distortion coefficients must be finite, got {distortion:?}"
            )));
        }

        if image_size.width == 0 || image_size.height == 0 {
            return Err(CameraError::InvalidParameter(format!(
                "image size must be non-empty, got {image_size}"
            )));
        }

        Ok(Self {
            intrinsic,
            distortion,
            image_size,
        })
    }

    /// The intrinsic parameters of the camera.
    pub fn intrinsic(&self) -> &CameraIntrinsic {
        &self.intrinsic
    }

    /// The distortion coefficients of the lens.
    pub fn distortion(&self) -> &FisheyeDistortion {
        &self.distortion
    }

    /// The resolution of the raw images.
    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    /// Whether a raw pixel lies inside `[0, width) x [0, height)`.
    pub fn contains(&self, p: &PixelPoint) -> bool {
        p.x >= 0.0
            && p.y >= 0.0
            && p.x < self.image_size.width as f64
            && p.y < self.image_size.height as f64
    }

    /// Undistort a raw pixel to camera-normalized coordinates.
    ///
    /// Returns the best-effort point and whether the inversion converged.
    pub fn undistort_point_normalized(&self, p: &PixelPoint) -> (NormalizedPoint, bool) {
        let distorted = self.intrinsic.normalize_pixel(p);
        let result = undistort_point_fisheye(&distorted, &self.distortion);
        (result.point, result.converged)
    }

    /// Undistort a raw pixel, re-projected through the model intrinsics.
    ///
    /// Returns the best-effort point and whether the inversion converged.
    pub fn undistort_point_checked(&self, p: &PixelPoint) -> (UndistortedPoint, bool) {
        let (n, converged) = self.undistort_point_normalized(p);
        let (x, y) = self.intrinsic.denormalize(&n);
        (UndistortedPoint::new(x, y), converged)
    }

    /// Undistort a raw pixel, re-projected through the model intrinsics.
    pub fn undistort_point(&self, p: &PixelPoint) -> UndistortedPoint {
        self.undistort_point_checked(p).0
    }

    /// Undistort raw fisheye pixels.
    ///
    /// The output is in the same pixel scale as the input: the rays are re-projected
    /// through the model intrinsics, not left as camera-normalized coordinates.
    ///
    /// # Arguments
    ///
    /// * `points` - The distorted pixels.
    ///
    /// # Returns
    ///
    /// The undistorted pixels, in the input order.
    pub fn undistort(&self, points: &[PixelPoint]) -> Vec<UndistortedPoint> {
        points.iter().map(|p| self.undistort_point(p)).collect()
    }

    /// Undistort raw fisheye pixels to camera-normalized coordinates.
    pub fn undistort_normalized(&self, points: &[PixelPoint]) -> Vec<NormalizedPoint> {
        points
            .iter()
            .map(|p| self.undistort_point_normalized(p).0)
            .collect()
    }

    /// Undistort raw fisheye pixels and re-project them through another camera matrix.
    ///
    /// Useful to place points on a canvas produced with [`FisheyeModel::estimate_new_intrinsic`].
    pub fn undistort_to(
        &self,
        points: &[PixelPoint],
        new_intrinsic: &CameraIntrinsic,
    ) -> Vec<UndistortedPoint> {
        points
            .iter()
            .map(|p| {
                let (n, _) = self.undistort_point_normalized(p);
                let (x, y) = new_intrinsic.denormalize(&n);
                UndistortedPoint::new(x, y)
            })
            .collect()
    }

    /// Convert an undistorted pixel to camera-normalized coordinates.
    pub fn to_normalized(&self, p: &UndistortedPoint) -> NormalizedPoint {
        self.intrinsic.normalize_undistorted(p)
    }

    /// Apply the lens distortion to a camera-normalized point.
    pub fn distort_normalized_point(&self, p: &NormalizedPoint) -> PixelPoint {
        let distorted = distort_point_fisheye(p, &self.distortion);
        let (x, y) = self.intrinsic.denormalize(&distorted);
        PixelPoint::new(x, y)
    }

    /// Apply the lens distortion to camera-normalized points.
    ///
    /// # Arguments
    ///
    /// * `points` - The undistorted camera-normalized points.
    ///
    /// # Returns
    ///
    /// The raw fisheye pixels, in the input order.
    pub fn distort_normalized(&self, points: &[NormalizedPoint]) -> Vec<PixelPoint> {
        points
            .iter()
            .map(|p| self.distort_normalized_point(p))
            .collect()
    }

    /// Apply the lens distortion to an undistorted pixel.
    pub fn distort_point(&self, p: &UndistortedPoint) -> PixelPoint {
        self.distort_normalized_point(&self.to_normalized(p))
    }

    /// Apply the lens distortion to undistorted pixels.
    ///
    /// This is the inverse of [`FisheyeModel::undistort`]: the points are normalized
    /// with the model intrinsics before the forward distortion.
    pub fn distort(&self, points: &[UndistortedPoint]) -> Vec<PixelPoint> {
        points.iter().map(|p| self.distort_point(p)).collect()
    }

    /// The horizontal field of view of the pinhole camera with the model intrinsics, in degrees.
    pub fn horizontal_fov_degrees(&self) -> f64 {
        2.0 * ((self.image_size.width as f64 / 2.0) / self.intrinsic.fx)
            .atan()
            .to_degrees()
    }

    /// Estimate a camera matrix to render an undistorted view of the fisheye image.
    ///
    /// The midpoints of the four image borders are undistorted and the focal length is
    /// chosen between the value keeping all of them visible and the one cropping to the
    /// closest of them. Borders beyond the field of view of the lens are ignored, so a lens
    /// whose image circle fits inside the sensor width is bounded by the top and bottom
    /// borders only.
    ///
    /// # Arguments
    ///
    /// * `balance` - In `[0, 1]`: 0 crops to the valid region, 1 keeps the full field of view.
    /// * `new_size` - The size of the undistorted image; the raw size when `None`.
    /// * `fov_scale` - Divides the resulting focal length; must be strictly positive.
    ///
    /// # Returns
    ///
    /// The new intrinsics.
    ///
    /// # Errors
    ///
    /// [`CameraError::InvalidParameter`] if a parameter is out of range or if no image
    /// border can be undistorted.
    pub fn estimate_new_intrinsic(
        &self,
        balance: f64,
        new_size: Option<ImageSize>,
        fov_scale: f64,
    ) -> Result<CameraIntrinsic, CameraError> {
        if !(0.0..=1.0).contains(&balance) {
            return Err(CameraError::InvalidParameter(format!(
                "balance must be in [0, 1], got {balance}"
            )));
        }
        if !(fov_scale.is_finite() && fov_scale > 0.0) {
            return Err(CameraError::InvalidParameter(format!(
                "fov_scale must be strictly positive, got {fov_scale}"
            )));
        }

        let (w, h) = (
            self.image_size.width as f64,
            self.image_size.height as f64,
        );

        // top, right, bottom, left
        let borders = [
            PixelPoint::new(w / 2.0, 0.0),
            PixelPoint::new(w, h / 2.0),
            PixelPoint::new(w / 2.0, h),
            PixelPoint::new(0.0, h / 2.0),
        ];

        // work in a space with square pixels; a border outside the lens domain has no
        // meaningful undistorted position and is left out
        let aspect_ratio = self.intrinsic.fx / self.intrinsic.fy;
        let [top, right, bottom, left] = borders.map(|p| {
            let (n, converged) = self.undistort_point_normalized(&p);
            if !converged {
                log::debug!("image border ({}, {}) is outside the lens domain", p.x, p.y);
            }
            converged.then(|| NormalizedPoint::new(n.x, n.y * aspect_ratio))
        });

        let valid = [top, right, bottom, left]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        if valid.is_empty() {
            return Err(CameraError::InvalidParameter(
                "no image border lies inside the lens domain".to_string(),
            ));
        }

        let n = valid.len() as f64;
        let center_x = valid.iter().map(|p| p.x).sum::<f64>() / n;
        let center_y = valid.iter().map(|p| p.y).sum::<f64>() / n;

        let candidates = [
            top.map(|p| h * 0.5 * aspect_ratio / (center_y - p.y)),
            right.map(|p| w * 0.5 / (p.x - center_x)),
            bottom.map(|p| h * 0.5 * aspect_ratio / (p.y - center_y)),
            left.map(|p| w * 0.5 / (center_x - p.x)),
        ]
        .into_iter()
        .flatten()
        .filter(|f| f.is_finite() && *f > 0.0)
        .collect::<Vec<_>>();
        if candidates.is_empty() {
            return Err(CameraError::InvalidParameter(
                "the image borders do not bound a focal length".to_string(),
            ));
        }

        let f_min = candidates.iter().copied().fold(f64::INFINITY, f64::min);
        let f_max = candidates.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let f = (balance * f_min + (1.0 - balance) * f_max) / fov_scale;

        let mut fx = f;
        let mut fy = f / aspect_ratio;
        let mut cx = -center_x * f + w * 0.5;
        let mut cy = (-center_y * f + h * aspect_ratio * 0.5) / aspect_ratio;

        if let Some(new_size) = new_size {
            let rx = new_size.width as f64 / w;
            let ry = new_size.height as f64 / h;
            fx *= rx;
            cx *= rx;
            fy *= ry;
            cy *= ry;
        }

        CameraIntrinsic::new(fx, fy, cx, cy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> Result<FisheyeModel, CameraError> {
        FisheyeModel::new(
            CameraIntrinsic::new(354.69554042, 353.75291574, 639.31964898, 481.37149087)?,
            FisheyeDistortion::new(0.05199583, -0.02759001, 0.01995445, -0.00505114),
            ImageSize {
                width: 1280,
                height: 960,
            },
        )
    }

    #[test]
    fn test_fisheye_model_rejects_invalid_input() -> Result<(), CameraError> {
        let intrinsic = CameraIntrinsic::new(350.0, 350.0, 640.0, 480.0)?;
        let size = ImageSize {
            width: 1280,
            height: 960,
        };
        assert!(FisheyeModel::new(
            intrinsic,
            FisheyeDistortion::new(f64::NAN, 0.0, 0.0, 0.0),
            size
        )
        .is_err());
        assert!(FisheyeModel::new(
            intrinsic,
            FisheyeDistortion::default(),
            ImageSize {
                width: 0,
                height: 960
            }
        )
        .is_err());
        Ok(())
    }

    #[test]
    fn test_undistort_principal_point_is_fixed() -> Result<(), CameraError> {
        let model = model()?;
        let c = PixelPoint::new(model.intrinsic().cx, model.intrinsic().cy);
        let u = model.undistort(&[c]);
        assert_relative_eq!(u[0].x, c.x, epsilon = 1e-9);
        assert_relative_eq!(u[0].y, c.y, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_undistort_pushes_points_outwards() -> Result<(), CameraError> {
        // the barrel distortion of a fisheye compresses the periphery
        let model = model()?;
        let p = PixelPoint::new(76.0, 581.0);
        let u = model.undistort_point(&p);
        assert!(u.x < p.x);
        Ok(())
    }

    #[test]
    fn test_distort_inverts_undistort() -> Result<(), CameraError> {
        let model = model()?;
        let points = vec![
            PixelPoint::new(76.0, 581.0),
            PixelPoint::new(442.0, 393.0),
            PixelPoint::new(1199.0, 575.0),
            PixelPoint::new(200.0, 150.0),
        ];
        let back = model.distort(&model.undistort(&points));
        assert_eq!(back.len(), points.len());
        for (p, q) in points.iter().zip(back.iter()) {
            assert_relative_eq!(p.x, q.x, epsilon = 1e-6);
            assert_relative_eq!(p.y, q.y, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_undistort_to_same_intrinsic_matches_undistort() -> Result<(), CameraError> {
        let model = model()?;
        let points = [PixelPoint::new(300.0, 200.0)];
        assert_eq!(
            model.undistort_to(&points, model.intrinsic()),
            model.undistort(&points)
        );
        Ok(())
    }

    #[test]
    fn test_contains() -> Result<(), CameraError> {
        let model = model()?;
        assert!(model.contains(&PixelPoint::new(0.0, 0.0)));
        assert!(model.contains(&PixelPoint::new(1279.5, 959.5)));
        assert!(!model.contains(&PixelPoint::new(1280.0, 10.0)));
        assert!(!model.contains(&PixelPoint::new(-0.1, 10.0)));
        Ok(())
    }

    #[test]
    fn test_horizontal_fov() -> Result<(), CameraError> {
        let model = FisheyeModel::new(
            CameraIntrinsic::new(640.0, 640.0, 640.0, 480.0)?,
            FisheyeDistortion::default(),
            ImageSize {
                width: 1280,
                height: 960,
            },
        )?;
        assert_relative_eq!(model.horizontal_fov_degrees(), 90.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_estimate_new_intrinsic_symmetric() -> Result<(), CameraError> {
        let model = FisheyeModel::new(
            CameraIntrinsic::new(600.0, 600.0, 640.0, 480.0)?,
            FisheyeDistortion::new(0.05, -0.02, 0.01, -0.005),
            ImageSize {
                width: 1280,
                height: 960,
            },
        )?;

        let keep_all = model.estimate_new_intrinsic(1.0, None, 1.0)?;
        let crop = model.estimate_new_intrinsic(0.0, None, 1.0)?;

        // a centered lens keeps the principal point centered
        assert_relative_eq!(keep_all.cx, 640.0, epsilon = 1e-6);
        assert_relative_eq!(keep_all.cy, 480.0, epsilon = 1e-6);
        assert!(keep_all.fx < crop.fx);

        let wider = model.estimate_new_intrinsic(1.0, None, 2.0)?;
        assert_relative_eq!(wider.fx, keep_all.fx / 2.0, epsilon = 1e-9);

        let canvas = model.estimate_new_intrinsic(
            1.0,
            Some(ImageSize {
                width: 2560,
                height: 1920,
            }),
            1.0,
        )?;
        assert_relative_eq!(canvas.cx, 1280.0, epsilon = 1e-6);
        assert_relative_eq!(canvas.fy, keep_all.fy * 2.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_estimate_new_intrinsic_ignores_borders_outside_the_lens() -> Result<(), CameraError> {
        // the side borders are beyond 90 degrees for both calibrated lenses
        let lenses = [
            (model()?, 145.024),
            (
                FisheyeModel::new(
                    CameraIntrinsic::new(355.67876243, 354.84207135, 638.84520097, 480.89256853)?,
                    FisheyeDistortion::new(0.0517522, -0.0267777, 0.01933738, -0.0052901),
                    ImageSize {
                        width: 1280,
                        height: 960,
                    },
                )?,
                145.414,
            ),
        ];

        for (lens, focal) in lenses {
            let (_, converged) = lens.undistort_point_normalized(&PixelPoint::new(0.0, 480.0));
            assert!(!converged);

            let keep_all = lens.estimate_new_intrinsic(1.0, None, 1.0)?;
            let crop = lens.estimate_new_intrinsic(0.0, None, 1.0)?;
            assert_relative_eq!(keep_all.fx, focal, epsilon = 1e-2);
            assert_relative_eq!(crop.fx, keep_all.fx, max_relative = 1e-9);
            assert!((keep_all.cx - 640.0).abs() < 2.0, "{keep_all:?}");
            assert!((keep_all.cy - 480.0).abs() < 10.0, "{keep_all:?}");

            let canvas = lens.estimate_new_intrinsic(0.8, None, 0.8)?;
            assert_relative_eq!(canvas.fx, keep_all.fx / 0.8, max_relative = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_estimate_new_intrinsic_without_usable_border() -> Result<(), CameraError> {
        let lens = FisheyeModel::new(
            CameraIntrinsic::new(100.0, 100.0, 640.0, 480.0)?,
            FisheyeDistortion::new(0.05199583, -0.02759001, 0.01995445, -0.00505114),
            ImageSize {
                width: 1280,
                height: 960,
            },
        )?;
        let err = lens.estimate_new_intrinsic(0.5, None, 1.0).unwrap_err();
        assert!(matches!(err, CameraError::InvalidParameter(_)));
        Ok(())
    }

    #[test]
    fn test_estimate_new_intrinsic_rejects_bad_parameters() -> Result<(), CameraError> {
        let model = model()?;
        assert!(model.estimate_new_intrinsic(1.5, None, 1.0).is_err());
        assert!(model.estimate_new_intrinsic(0.5, None, 0.0).is_err());
        Ok(())
    }
}
