#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for calibration and mapping.
pub mod error;

/// Homography estimation with the normalized DLT.
pub mod homography;

/// Small fixed-size linear algebra helpers.
pub mod linalg;

/// Coordinate mapping across several views.
pub mod mapper;

/// Calibration of a single camera view.
pub mod view;

pub use error::{CalibrationError, DegenerateScale, MapperError, ViewError};
pub use homography::{estimate_homography, Homography};
pub use mapper::{CoordinateMapper, DomainWarning, Projection, ViewSetup};
pub use view::{PointCorrespondence, ViewCalibration};
