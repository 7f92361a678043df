/// Errors raised while fitting the homography of a view.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum CalibrationError {
    /// Not enough correspondences to constrain a homography.
    #[error("Need at least {required} correspondences, got {found}")]
    NotEnoughCorrespondences {
        /// Number of correspondences provided.
        found: usize,
        /// Minimum number of correspondences.
        required: usize,
    },

    /// The pixel and world lists have different lengths.
    #[error("Pixel and world lists differ in length ({pixels} vs {world})")]
    LengthMismatch {
        /// Number of pixel points.
        pixels: usize,
        /// Number of world points.
        world: usize,
    },

    /// A correspondence holds a NaN or infinite coordinate.
    #[error("Correspondence {index} has a non-finite coordinate")]
    NonFinite {
        /// Index of the offending correspondence.
        index: usize,
    },

    /// A correspondence repeats the pixel or world point of an earlier one.
    #[error("Correspondence {index} duplicates correspondence {first}")]
    Duplicate {
        /// Index of the repeated correspondence.
        index: usize,
        /// Index of its first occurrence.
        first: usize,
    },

    /// The correspondences do not constrain a unique homography (collinear points).
    #[error("Degenerate correspondences (collinear?): singular value ratio {ratio:e}")]
    Degenerate {
        /// Ratio between the eighth and the largest singular value of the DLT system.
        ratio: f64,
    },

    /// The estimated homography is not invertible.
    #[error("Homography is singular (det {det:e})")]
    Singular {
        /// The determinant that failed the check.
        det: f64,
    },
}

/// A calibration failure together with the view it belongs to.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[error("Failed to calibrate view `{view}`: {source}")]
pub struct ViewError {
    /// The name of the view.
    pub view: String,
    /// The underlying error.
    #[source]
    pub source: CalibrationError,
}

/// The homogeneous scale of a projected point collapsed to zero.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq)]
#[error("Homogeneous scale {0:e} is too close to zero")]
pub struct DegenerateScale(pub f64);

/// Errors raised by the coordinate mapper.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum MapperError {
    /// No calibrated view with this name.
    #[error("Unknown view `{0}`")]
    UnknownView(String),

    /// The point maps to infinity (e.g. it lies on the horizon line of the view).
    #[error("Degenerate projection in view `{view}`: homogeneous scale {scale:e}")]
    DegenerateProjection {
        /// The name of the view.
        view: String,
        /// The homogeneous scale of the projected point.
        scale: f64,
    },
}
