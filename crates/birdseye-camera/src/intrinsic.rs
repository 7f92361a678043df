use serde::{Deserialize, Serialize};

use crate::error::CameraError;
use crate::point::{NormalizedPoint, PixelPoint, UndistortedPoint};

/// The size of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    /// The width of the image in pixels
    pub width: usize,
    /// The height of the image in pixels
    pub height: usize,
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

/// Represents the intrinsic parameters of a pinhole camera with zero skew.
///
/// # Fields
///
/// * `fx` - The focal length in the x direction
/// * `fy` - The focal length in the y direction
/// * `cx` - The x coordinate of the principal point
/// * `cy` - The y coordinate of the principal point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsic {
    /// The focal length in the x direction
    pub fx: f64,
    /// The focal length in the y direction
    pub fy: f64,
    /// The x coordinate of the principal point
    pub cx: f64,
    /// The y coordinate of the principal point
    pub cy: f64,
}

impl CameraIntrinsic {
    /// Create camera intrinsics from focal lengths and principal point.
    ///
    /// All four values must be finite and strictly positive.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraError> {
        let intrinsic = Self { fx, fy, cx, cy };
        intrinsic.validate()?;
        Ok(intrinsic)
    }

    /// Create camera intrinsics from a 3x3 intrinsics matrix.
    ///
    /// The matrix must have the form `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn from_matrix(k: &[[f64; 3]; 3]) -> Result<Self, CameraError> {
        if k[0][1] != 0.0 || k[1][0] != 0.0 || k[2] != [0.0, 0.0, 1.0] {
            return Err(CameraError::InvalidIntrinsics(
                "matrix must have form [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]".to_string(),
            ));
        }
        Self::new(k[0][0], k[1][1], k[0][2], k[1][2])
    }

    /// Convert to a 3x3 intrinsics matrix.
    pub fn to_matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Check the positivity and finiteness invariants.
    pub fn validate(&self) -> Result<(), CameraError> {
        let fields = [
            ("fx", self.fx),
            ("fy", self.fy),
            ("cx", self.cx),
            ("cy", self.cy),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(CameraError::InvalidIntrinsics(format!(
                    "{name} must be finite and strictly positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Map a pixel-scale point to camera-normalized coordinates.
    pub fn normalize(&self, x: f64, y: f64) -> NormalizedPoint {
        NormalizedPoint::new((x - self.cx) / self.fx, (y - self.cy) / self.fy)
    }

    /// Map camera-normalized coordinates to pixel scale.
    pub fn denormalize(&self, p: &NormalizedPoint) -> (f64, f64) {
        (self.fx * p.x + self.cx, self.fy * p.y + self.cy)
    }

    /// Normalize a raw fisheye pixel.
    pub fn normalize_pixel(&self, p: &PixelPoint) -> NormalizedPoint {
        self.normalize(p.x, p.y)
    }

    /// Normalize an undistorted pixel.
    pub fn normalize_undistorted(&self, p: &UndistortedPoint) -> NormalizedPoint {
        self.normalize(p.x, p.y)
    }
}
