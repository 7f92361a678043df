#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Equidistant fisheye distortion model.
pub mod distortion;

/// Error types for the camera models.
pub mod error;

/// Fisheye camera model with batch distort/undistort.
pub mod fisheye;

/// Pinhole intrinsics and image size.
pub mod intrinsic;

/// Point types for the different image spaces.
pub mod point;

pub use distortion::FisheyeDistortion;
pub use error::CameraError;
pub use fisheye::FisheyeModel;
pub use intrinsic::{CameraIntrinsic, ImageSize};
pub use point::{NormalizedPoint, PixelPoint, UndistortedPoint, WorldPoint};
