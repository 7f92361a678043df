#![deny(missing_docs)]
//! Surround-view rig calibration.
//!
//! Maps ground-plane coordinates to the raw pixels of fisheye cameras and back. Each camera
//! view is calibrated from a handful of surveyed correspondences: the pixels are undistorted
//! with the lens model and a homography is fitted to the ground plane.
//!
//! ```no_run
//! use birdseye::RigConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rig = RigConfig::from_file("data/surround_rig.json")?.calibrate()?;
//! let pixel = rig.mapper.world_to_fisheye("front", [0.0, 500.0])?;
//! let world = rig.mapper.fisheye_to_world("front", pixel)?;
//! # Ok(())
//! # }
//! ```

#[doc(inline)]
pub use birdseye_camera as camera;

#[doc(inline)]
pub use birdseye_geometry as geometry;

/// Loading a rig from a JSON description.
pub mod config;

/// Ground-plane sampling grids.
pub mod grid;

pub use birdseye_camera::{FisheyeModel, PixelPoint, WorldPoint};
pub use birdseye_geometry::{CoordinateMapper, DomainWarning, MapperError, Projection};
pub use config::{ConfigError, LensConfig, RigCalibration, RigConfig, ViewConfig};
pub use grid::{WorldGrid, WorldGridIter};
