use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use birdseye_camera::{CameraError, CameraIntrinsic, FisheyeDistortion, FisheyeModel, ImageSize};
use birdseye_geometry::{CoordinateMapper, PointCorrespondence, ViewError, ViewSetup};
use serde::{Deserialize, Serialize};

/// Errors raised while loading a rig description.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read `{path}`: {source}")]
    Io {
        /// The path of the file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not a valid rig description.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A lens has invalid parameters.
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// Two views share a name.
    #[error("Duplicate view `{0}`")]
    DuplicateView(String),

    /// The rig has no views.
    #[error("The rig has no views")]
    NoViews,
}

/// The calibration of a fisheye lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensConfig {
    /// The 3x3 intrinsics matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub intrinsics: [[f64; 3]; 3],
    /// The fisheye coefficients `[k1, k2, k3, k4]`.
    pub distortion: FisheyeDistortion,
    /// The resolution of the raw images.
    pub image_size: ImageSize,
}

impl LensConfig {
    /// Build the lens model.
    pub fn to_model(&self) -> Result<FisheyeModel, CameraError> {
        let intrinsic = CameraIntrinsic::from_matrix(&self.intrinsics)?;
        FisheyeModel::new(intrinsic, self.distortion, self.image_size)
    }
}

/// One camera view of the rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// The identifier of the view.
    pub name: String,
    /// Overrides the lens shared by the rig.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<LensConfig>,
    /// The surveyed pixel and ground-plane pairs.
    pub correspondences: Vec<PointCorrespondence>,
}

/// A surround-view rig: a shared lens and the surveyed views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    /// The lens used by views without their own.
    pub lens: LensConfig,
    /// The views of the rig.
    pub views: Vec<ViewConfig>,
}

/// The outcome of calibrating a rig.
#[derive(Debug)]
pub struct RigCalibration {
    /// The successfully calibrated views.
    pub mapper: CoordinateMapper,
    /// The views that failed to calibrate.
    pub failures: Vec<ViewError>,
}

impl RigConfig {
    /// Parse and validate a rig description from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a rig description from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loading rig from {}", path.display());
        Self::from_json_str(&json)
    }

    /// Check that the rig has views and that their names are unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.views.is_empty() {
            return Err(ConfigError::NoViews);
        }
        let mut names = HashSet::new();
        for view in &self.views {
            if !names.insert(view.name.as_str()) {
                return Err(ConfigError::DuplicateView(view.name.clone()));
            }
        }
        Ok(())
    }

    /// Build the lens models and the per-view calibration inputs.
    ///
    /// Views without their own lens share a single model.
    pub fn setups(&self) -> Result<Vec<ViewSetup>, ConfigError> {
        let shared = Arc::new(self.lens.to_model()?);
        self.views
            .iter()
            .map(|view| -> Result<ViewSetup, ConfigError> {
                let model = match &view.lens {
                    Some(lens) => Arc::new(lens.to_model()?),
                    None => Arc::clone(&shared),
                };
                Ok(ViewSetup {
                    name: view.name.clone(),
                    model,
                    correspondences: view.correspondences.clone(),
                })
            })
            .collect()
    }

    /// Calibrate every view of the rig.
    ///
    /// Invalid lenses fail the whole rig. A view that cannot be calibrated is reported in
    /// [`RigCalibration::failures`] and the other views are still usable.
    pub fn calibrate(&self) -> Result<RigCalibration, ConfigError> {
        self.validate()?;
        let (mapper, failures) = CoordinateMapper::calibrate(self.setups()?);
        for failure in &failures {
            log::warn!("{failure}");
        }
        log::info!(
            "calibrated {} of {} views",
            mapper.len(),
            self.views.len()
        );
        Ok(RigCalibration { mapper, failures })
    }
}
