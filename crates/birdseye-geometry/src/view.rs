use std::sync::Arc;

use birdseye_camera::{FisheyeModel, PixelPoint, UndistortedPoint, WorldPoint};
use serde::{Deserialize, Serialize};

use crate::error::{DegenerateScale, ViewError};
use crate::homography::{estimate_homography, Homography};
use crate::mapper::{DomainWarning, Projection};

/// A surveyed pair of a raw fisheye pixel and its ground-plane position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointCorrespondence {
    /// The pixel in the raw fisheye image.
    pub pixel: PixelPoint,
    /// The matching point on the ground plane.
    pub world: WorldPoint,
}

impl PointCorrespondence {
    /// Create a correspondence from a pixel and a world point.
    pub fn new(pixel: impl Into<PixelPoint>, world: impl Into<WorldPoint>) -> Self {
        Self {
            pixel: pixel.into(),
            world: world.into(),
        }
    }
}

/// The calibration of one camera view.
///
/// Built once from the surveyed correspondences: the pixel side is undistorted with the
/// lens model and a homography is fitted between the undistorted pixels and the ground
/// plane. The value is never mutated; use [`ViewCalibration::refit`] to recalibrate.
#[derive(Debug, Clone)]
pub struct ViewCalibration {
    name: String,
    model: Arc<FisheyeModel>,
    homography: Homography,
    correspondences: Vec<PointCorrespondence>,
    undistorted: Vec<UndistortedPoint>,
    // signs of the homogeneous scales over the surveyed area, in both directions
    world_side: f64,
    pixel_side: f64,
}

impl ViewCalibration {
    /// Calibrate a view.
    ///
    /// # Arguments
    ///
    /// * `name` - The identifier of the view, e.g. `"front"`.
    /// * `model` - The lens model of the camera, possibly shared with other views.
    /// * `correspondences` - At least four non-collinear surveyed pairs.
    ///
    /// # Errors
    ///
    /// A [`ViewError`] naming the view if the homography cannot be estimated.
    pub fn new(
        name: impl Into<String>,
        model: Arc<FisheyeModel>,
        correspondences: Vec<PointCorrespondence>,
    ) -> Result<Self, ViewError> {
        let name = name.into();

        let (pixels, world): (Vec<PixelPoint>, Vec<WorldPoint>) = correspondences
            .iter()
            .map(|c| (c.pixel, c.world))
            .unzip();

        // the homography lives in undistorted pixel space
        let undistorted = model.undistort(&pixels);

        let homography = estimate_homography(&undistorted, &world).map_err(|source| {
            log::warn!("failed to calibrate view `{name}`: {source}");
            ViewError {
                view: name.clone(),
                source,
            }
        })?;

        let world_side = world
            .iter()
            .map(|w| homography.scale_to_undistorted(w))
            .sum::<f64>()
            .signum();
        let pixel_side = undistorted
            .iter()
            .map(|u| homography.scale_to_world(u))
            .sum::<f64>()
            .signum();

        let view = Self {
            name,
            model,
            homography,
            correspondences,
            undistorted,
            world_side,
            pixel_side,
        };

        log::info!(
            "calibrated view `{}` from {} correspondences, max residual {:.3}",
            view.name,
            view.correspondences.len(),
            view.max_residual()
        );

        Ok(view)
    }

    /// Calibrate a view from separate pixel and world lists.
    ///
    /// # Errors
    ///
    /// Fails as [`ViewCalibration::new`] does, and if the lists differ in length.
    pub fn from_points(
        name: impl Into<String>,
        model: Arc<FisheyeModel>,
        pixels: &[PixelPoint],
        world: &[WorldPoint],
    ) -> Result<Self, ViewError> {
        let name = name.into();
        if pixels.len() != world.len() {
            return Err(ViewError {
                view: name,
                source: crate::error::CalibrationError::LengthMismatch {
                    pixels: pixels.len(),
                    world: world.len(),
                },
            });
        }

        let correspondences = pixels
            .iter()
            .zip(world.iter())
            .map(|(&pixel, &world)| PointCorrespondence { pixel, world })
            .collect();

        Self::new(name, model, correspondences)
    }

    /// Build a new calibration of the same view and lens from other correspondences.
    pub fn refit(&self, correspondences: Vec<PointCorrespondence>) -> Result<Self, ViewError> {
        Self::new(self.name.clone(), self.model.clone(), correspondences)
    }

    /// The identifier of the view.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lens model of the view.
    pub fn model(&self) -> &Arc<FisheyeModel> {
        &self.model
    }

    /// The fitted homography from undistorted pixels to the ground plane.
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// The correspondences used for the fit.
    pub fn correspondences(&self) -> &[PointCorrespondence] {
        &self.correspondences
    }

    /// The undistorted pixel side of the correspondences.
    pub fn undistorted(&self) -> &[UndistortedPoint] {
        &self.undistorted
    }

    /// The ground-plane distance between each surveyed world point and its fitted position.
    ///
    /// A pair mapping to infinity has an infinite residual.
    pub fn residuals(&self) -> Vec<f64> {
        self.undistorted
            .iter()
            .zip(self.correspondences.iter())
            .map(|(u, c)| match self.homography.to_world(u) {
                Ok(w) => w.distance(&c.world),
                Err(_) => f64::INFINITY,
            })
            .collect()
    }

    /// The largest fit residual.
    pub fn max_residual(&self) -> f64 {
        self.residuals().into_iter().fold(0.0, f64::max)
    }

    /// Whether a ground-plane point lies on the same side of the horizon line as the
    /// surveyed area, i.e. in front of the camera.
    pub fn faces_world(&self, p: &WorldPoint) -> bool {
        self.homography.scale_to_undistorted(p) * self.world_side > 0.0
    }

    /// Whether an undistorted pixel sees the ground, i.e. lies below the horizon line.
    pub fn faces_ground(&self, p: &UndistortedPoint) -> bool {
        self.homography.scale_to_world(p) * self.pixel_side > 0.0
    }

    /// Project a ground-plane point into the raw fisheye image.
    ///
    /// The inverse homography gives an undistorted pixel, which is converted to
    /// camera-normalized coordinates with the lens intrinsics before the forward distortion.
    pub fn world_to_fisheye(&self, p: &WorldPoint) -> Result<PixelPoint, DegenerateScale> {
        let undistorted = self.homography.to_undistorted(p)?;
        let normalized = self.model.to_normalized(&undistorted);
        Ok(self.model.distort_normalized_point(&normalized))
    }

    /// Project a raw fisheye pixel onto the ground plane.
    pub fn fisheye_to_world(&self, p: &PixelPoint) -> Result<WorldPoint, DegenerateScale> {
        let undistorted = self.model.undistort_point(p);
        self.homography.to_world(&undistorted)
    }

    /// Like [`ViewCalibration::world_to_fisheye`], flagging points behind the camera and
    /// pixels outside the image.
    pub fn world_to_fisheye_checked(
        &self,
        p: &WorldPoint,
    ) -> Result<Projection<PixelPoint>, DegenerateScale> {
        let point = self.world_to_fisheye(p)?;
        let warning = if !self.faces_world(p) {
            Some(DomainWarning::BehindCamera)
        } else if !self.model.contains(&point) {
            Some(DomainWarning::OutsideImage)
        } else {
            None
        };
        Ok(Projection { point, warning })
    }

    /// Like [`ViewCalibration::fisheye_to_world`], flagging pixels that do not map
    /// reliably onto the ground.
    pub fn fisheye_to_world_checked(
        &self,
        p: &PixelPoint,
    ) -> Result<Projection<WorldPoint>, DegenerateScale> {
        let (undistorted, converged) = self.model.undistort_point_checked(p);
        let point = self.homography.to_world(&undistorted)?;
        let warning = if !converged {
            Some(DomainWarning::NotConverged)
        } else if !self.faces_ground(&undistorted) {
            Some(DomainWarning::BehindCamera)
        } else if !self.model.contains(p) {
            Some(DomainWarning::OutsideImage)
        } else {
            None
        };
        Ok(Projection { point, warning })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalibrationError;
    use approx::assert_relative_eq;
    use birdseye_camera::{CameraIntrinsic, FisheyeDistortion, ImageSize};

    fn lens() -> Arc<FisheyeModel> {
        let model = CameraIntrinsic::new(354.69554042, 353.75291574, 639.31964898, 481.37149087)
            .and_then(|k| {
                FisheyeModel::new(
                    k,
                    FisheyeDistortion::new(0.05199583, -0.02759001, 0.01995445, -0.00505114),
                    ImageSize {
                        width: 1280,
                        height: 960,
                    },
                )
            })
            .expect("valid lens");
        Arc::new(model)
    }

    fn left() -> Vec<PointCorrespondence> {
        vec![
            PointCorrespondence::new([1071.0, 705.0], [-100.0, 0.0]),
            PointCorrespondence::new([834.0, 484.0], [-300.0, 0.0]),
            PointCorrespondence::new([265.0, 496.0], [-300.0, -500.0]),
            PointCorrespondence::new([96.0, 609.0], [-100.0, -500.0]),
        ]
    }

    #[test]
    fn test_view_calibration_four_points_is_exact() -> Result<(), Box<dyn std::error::Error>> {
        let view = ViewCalibration::new("left", lens(), left())?;
        assert_eq!(view.name(), "left");
        assert_eq!(view.undistorted().len(), 4);
        assert!(view.max_residual() < 1e-6);

        for c in view.correspondences() {
            let w = view.fisheye_to_world(&c.pixel)?;
            assert_relative_eq!(w.x, c.world.x, epsilon = 1e-6);
            assert_relative_eq!(w.y, c.world.y, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_surveyed_area_faces_camera() -> Result<(), ViewError> {
        let view = ViewCalibration::new("left", lens(), left())?;
        for (c, u) in view.correspondences().iter().zip(view.undistorted()) {
            assert!(view.faces_world(&c.world));
            assert!(view.faces_ground(u));
        }
        Ok(())
    }

    #[test]
    fn test_view_calibration_reports_view_name() {
        let mut correspondences = left();
        correspondences.truncate(3);
        let err = ViewCalibration::new("left", lens(), correspondences).unwrap_err();
        assert_eq!(err.view, "left");
        assert_eq!(
            err.source,
            CalibrationError::NotEnoughCorrespondences {
                found: 3,
                required: 4
            }
        );
        assert!(err.to_string().contains("`left`"));
    }

    #[test]
    fn test_view_calibration_from_points_length_mismatch() {
        let pixels = [PixelPoint::new(1.0, 2.0)];
        let err = ViewCalibration::from_points("rear", lens(), &pixels, &[]).unwrap_err();
        assert_eq!(
            err.source,
            CalibrationError::LengthMismatch {
                pixels: 1,
                world: 0
            }
        );
    }

    #[test]
    fn test_refit_builds_new_instance() -> Result<(), ViewError> {
        let view = ViewCalibration::new("left", lens(), left())?;
        let mut shifted = left();
        for c in shifted.iter_mut() {
            c.world.y += 100.0;
        }
        let refitted = view.refit(shifted)?;
        assert!(Arc::ptr_eq(view.model(), refitted.model()));
        assert_ne!(view.homography(), refitted.homography());
        assert_eq!(view.correspondences(), left().as_slice());
        Ok(())
    }
}
