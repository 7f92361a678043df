use serde::{Deserialize, Serialize};

macro_rules! point2 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
        #[serde(from = "[f64; 2]", into = "[f64; 2]")]
        pub struct $name {
            /// The x coordinate.
            pub x: f64,
            /// The y coordinate.
            pub y: f64,
        }

        impl $name {
            /// Create a new point from its coordinates.
            pub const fn new(x: f64, y: f64) -> Self {
                Self { x, y }
            }

            /// Whether both coordinates are finite.
            pub fn is_finite(&self) -> bool {
                self.x.is_finite() && self.y.is_finite()
            }

            /// Euclidean distance to another point of the same space.
            pub fn distance(&self, other: &Self) -> f64 {
                (self.x - other.x).hypot(self.y - other.y)
            }
        }

        impl From<[f64; 2]> for $name {
            fn from(p: [f64; 2]) -> Self {
                Self { x: p[0], y: p[1] }
            }
        }

        impl From<(f64, f64)> for $name {
            fn from((x, y): (f64, f64)) -> Self {
                Self { x, y }
            }
        }

        impl From<$name> for [f64; 2] {
            fn from(p: $name) -> Self {
                [p.x, p.y]
            }
        }
    };
}

point2!(
    /// A coordinate in the raw (distorted) fisheye image, in pixels.
    PixelPoint
);

point2!(
    /// A pixel coordinate with lens distortion removed, re-projected through an intrinsic matrix.
    ///
    /// Only meaningful together with the intrinsic matrix used to produce it.
    UndistortedPoint
);

point2!(
    /// A camera-normalized coordinate, i.e. `((u - cx) / fx, (v - cy) / fy)`.
    NormalizedPoint
);

point2!(
    /// A coordinate on the ground plane, in physical units (e.g. millimeters).
    ///
    /// The origin and axes are fixed per deployment; the reference rig is vehicle
    /// centered with x lateral and y longitudinal.
    WorldPoint
);
