use std::collections::BTreeMap;
use std::sync::Arc;

use birdseye_camera::{FisheyeModel, PixelPoint, WorldPoint};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{DegenerateScale, MapperError, ViewError};
use crate::view::{PointCorrespondence, ViewCalibration};

/// A non-fatal condition attached to a projected point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainWarning {
    /// The fisheye pixel lies outside the image bounds.
    OutsideImage,
    /// The undistortion of the pixel did not converge and fell back to a best-effort value.
    NotConverged,
    /// The point lies beyond the horizon line of the view: a ground point behind the camera,
    /// or a pixel that does not see the ground. The projection is mathematically valid but
    /// physically meaningless.
    BehindCamera,
}

/// A projected point with an optional domain warning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection<P> {
    /// The projected point.
    pub point: P,
    /// Set if the point lies outside the reliable domain of the lens model.
    pub warning: Option<DomainWarning>,
}

/// The inputs needed to calibrate one view.
#[derive(Debug, Clone)]
pub struct ViewSetup {
    /// The identifier of the view.
    pub name: String,
    /// The lens model of the camera.
    pub model: Arc<FisheyeModel>,
    /// The surveyed correspondences.
    pub correspondences: Vec<PointCorrespondence>,
}

/// Maps points between ground-plane coordinates and the raw fisheye pixels of named views.
///
/// Every view owns an independent calibration. The mapper holds no interior mutability, so
/// once built it can be shared across threads and queried without locking.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use birdseye_camera::{CameraIntrinsic, FisheyeDistortion, FisheyeModel, ImageSize};
/// use birdseye_geometry::{CoordinateMapper, PointCorrespondence, ViewCalibration};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let model = Arc::new(FisheyeModel::new(
///     CameraIntrinsic::new(354.7, 353.8, 639.3, 481.4)?,
///     FisheyeDistortion::new(0.052, -0.028, 0.020, -0.005),
///     ImageSize { width: 1280, height: 960 },
/// )?);
///
/// let view = ViewCalibration::new(
///     "left",
///     model,
///     vec![
///         PointCorrespondence::new([1071.0, 705.0], [-100.0, 0.0]),
///         PointCorrespondence::new([834.0, 484.0], [-300.0, 0.0]),
///         PointCorrespondence::new([265.0, 496.0], [-300.0, -500.0]),
///         PointCorrespondence::new([96.0, 609.0], [-100.0, -500.0]),
///     ],
/// )?;
///
/// let mut mapper = CoordinateMapper::new();
/// mapper.insert(view);
///
/// let pixel = mapper.world_to_fisheye("left", [-200.0, -250.0])?;
/// let world = mapper.fisheye_to_world("left", pixel)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoordinateMapper {
    views: BTreeMap<String, ViewCalibration>,
}

impl CoordinateMapper {
    /// Create a mapper without views.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calibrate a set of views in parallel.
    ///
    /// A view that fails does not affect the others. If two setups share a name the later
    /// one wins.
    ///
    /// # Returns
    ///
    /// The mapper with all successfully calibrated views, and the failures.
    pub fn calibrate(setups: Vec<ViewSetup>) -> (Self, Vec<ViewError>) {
        let results = setups
            .into_par_iter()
            .map(|setup| ViewCalibration::new(setup.name, setup.model, setup.correspondences))
            .collect::<Vec<_>>();

        let mut mapper = Self::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(view) => {
                    if let Some(previous) = mapper.insert(view) {
                        log::warn!("view `{}` was calibrated twice", previous.name());
                    }
                }
                Err(err) => failures.push(err),
            }
        }

        log::debug!(
            "calibrated {} views, {} failed",
            mapper.len(),
            failures.len()
        );

        (mapper, failures)
    }

    /// Register a calibrated view, replacing and returning any view with the same name.
    pub fn insert(&mut self, view: ViewCalibration) -> Option<ViewCalibration> {
        self.views.insert(view.name().to_string(), view)
    }

    /// Remove a view.
    pub fn remove(&mut self, name: &str) -> Option<ViewCalibration> {
        self.views.remove(name)
    }

    /// Get a view by name.
    pub fn view(&self, name: &str) -> Option<&ViewCalibration> {
        self.views.get(name)
    }

    /// Iterate over the views in name order.
    pub fn views(&self) -> impl Iterator<Item = &ViewCalibration> {
        self.views.values()
    }

    /// Iterate over the view names in order.
    pub fn view_names(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    /// Number of calibrated views.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Whether no view is calibrated.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    fn get(&self, name: &str) -> Result<&ViewCalibration, MapperError> {
        self.views
            .get(name)
            .ok_or_else(|| MapperError::UnknownView(name.to_string()))
    }

    /// Project a ground-plane point into the raw fisheye image of a view.
    ///
    /// # Arguments
    ///
    /// * `view` - The name of the view.
    /// * `p` - The ground-plane point, e.g. `[x, y]` or `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`MapperError::UnknownView`] or [`MapperError::DegenerateProjection`] if the point
    /// lies on the horizon line of the view.
    pub fn world_to_fisheye(
        &self,
        view: &str,
        p: impl Into<WorldPoint>,
    ) -> Result<PixelPoint, MapperError> {
        let calibration = self.get(view)?;
        calibration
            .world_to_fisheye(&p.into())
            .map_err(|e| degenerate(view, e))
    }

    /// Project a raw fisheye pixel of a view onto the ground plane.
    ///
    /// The result only approximately inverts [`CoordinateMapper::world_to_fisheye`]: the
    /// homography is a least-squares fit and the undistortion is iterative.
    ///
    /// # Errors
    ///
    /// [`MapperError::UnknownView`] or [`MapperError::DegenerateProjection`].
    pub fn fisheye_to_world(
        &self,
        view: &str,
        p: impl Into<PixelPoint>,
    ) -> Result<WorldPoint, MapperError> {
        let calibration = self.get(view)?;
        calibration
            .fisheye_to_world(&p.into())
            .map_err(|e| degenerate(view, e))
    }

    /// Like [`CoordinateMapper::world_to_fisheye`], flagging ground points behind the camera
    /// and pixels outside the image.
    pub fn world_to_fisheye_checked(
        &self,
        view: &str,
        p: impl Into<WorldPoint>,
    ) -> Result<Projection<PixelPoint>, MapperError> {
        self.get(view)?
            .world_to_fisheye_checked(&p.into())
            .map_err(|e| degenerate(view, e))
    }

    /// Like [`CoordinateMapper::fisheye_to_world`], flagging pixels the lens model cannot
    /// reliably invert and pixels that do not see the ground.
    pub fn fisheye_to_world_checked(
        &self,
        view: &str,
        p: impl Into<PixelPoint>,
    ) -> Result<Projection<WorldPoint>, MapperError> {
        self.get(view)?
            .fisheye_to_world_checked(&p.into())
            .map_err(|e| degenerate(view, e))
    }

    /// Project several ground-plane points, one result per input point.
    ///
    /// An unknown view fails every point.
    pub fn world_to_fisheye_many(
        &self,
        view: &str,
        points: &[WorldPoint],
    ) -> Vec<Result<PixelPoint, MapperError>> {
        match self.get(view) {
            Ok(calibration) => points
                .iter()
                .map(|p| {
                    calibration
                        .world_to_fisheye(p)
                        .map_err(|e| degenerate(view, e))
                })
                .collect(),
            Err(err) => vec![Err(err); points.len()],
        }
    }

    /// Project several fisheye pixels, one result per input point.
    pub fn fisheye_to_world_many(
        &self,
        view: &str,
        points: &[PixelPoint],
    ) -> Vec<Result<WorldPoint, MapperError>> {
        match self.get(view) {
            Ok(calibration) => points
                .iter()
                .map(|p| {
                    calibration
                        .fisheye_to_world(p)
                        .map_err(|e| degenerate(view, e))
                })
                .collect(),
            Err(err) => vec![Err(err); points.len()],
        }
    }
}

fn degenerate(view: &str, DegenerateScale(scale): DegenerateScale) -> MapperError {
    MapperError::DegenerateProjection {
        view: view.to_string(),
        scale,
    }
}
