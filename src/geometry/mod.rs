//! Geometry utilities: SE3 poses, twists and 6×6 covariance types.

pub mod se3;
pub mod so3;
pub mod twist;

use nalgebra::{SMatrix, SVector};

pub use se3::SE3;
pub use twist::Twist3;

/// 6×6 matrix, used for pose covariances and information matrices.
///
/// Row/column order is (rot-x, rot-y, rot-z, x, y, z).
pub type Matrix6 = SMatrix<f64, 6, 6>;

/// 6-dimensional vector (SE3 tangent or stacked twist).
pub type Vector6 = SVector<f64, 6>;
