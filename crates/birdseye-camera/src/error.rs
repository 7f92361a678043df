/// Error types for camera model operations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CameraError {
    /// Invalid camera intrinsics
    #[error("Invalid camera intrinsics: {0}")]
    InvalidIntrinsics(String),

    /// Invalid parameter passed to a camera model operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
