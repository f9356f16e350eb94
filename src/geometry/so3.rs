//! SO(3) Lie group utilities backing the SE(3) exponential and logarithm.
//!
//! Provides skew-symmetric matrix construction and the left Jacobian Jl(φ),
//! which maps a rotation-vector perturbation onto the translation part of an
//! SE(3) tangent vector.

use nalgebra::{Matrix3, Vector3};

/// Small angle threshold for numerical stability.
const SMALL_ANGLE_THRESHOLD: f64 = 1e-6;

/// Constructs the skew-symmetric matrix [v]× such that [v]× u = v × u.
///
/// ```text
/// [v]× = |  0   -v_z   v_y |
///        |  v_z   0   -v_x |
///        | -v_y  v_x    0  |
/// ```
#[inline]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Computes the left Jacobian Jl(φ) of SO(3).
///
/// ```text
/// Jl(φ) = I + (1 - cos|φ|)/|φ|² [φ]× + (|φ| - sin|φ|)/|φ|³ [φ]×²
/// ```
///
/// For small angles (|φ| < ε):
/// ```text
/// Jl(φ) ≈ I + 0.5 [φ]×
/// ```
pub fn left_jacobian(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();
    let skew_phi = skew(phi);

    if theta < SMALL_ANGLE_THRESHOLD {
        return Matrix3::identity() + 0.5 * skew_phi;
    }

    let theta_sq = theta * theta;
    let theta_cu = theta_sq * theta;

    Matrix3::identity()
        + ((1.0 - theta.cos()) / theta_sq) * skew_phi
        + ((theta - theta.sin()) / theta_cu) * skew_phi * skew_phi
}

/// Computes the inverse of the left Jacobian Jl⁻¹(φ).
///
/// ```text
/// Jl⁻¹(φ) = I - 0.5 [φ]× + (1/|φ|² - (1 + cos|φ|)/(2|φ| sin|φ|)) [φ]×²
/// ```
///
/// For small angles:
/// ```text
/// Jl⁻¹(φ) ≈ I - 0.5 [φ]× + 1/12 [φ]×²
/// ```
pub fn left_jacobian_inv(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();
    let skew_phi = skew(phi);
    let skew_phi_sq = skew_phi * skew_phi;

    if theta < SMALL_ANGLE_THRESHOLD {
        return Matrix3::identity() - 0.5 * skew_phi + (1.0 / 12.0) * skew_phi_sq;
    }

    let coeff = 1.0 / (theta * theta) - (1.0 + theta.cos()) / (2.0 * theta * theta.sin());

    Matrix3::identity() - 0.5 * skew_phi + coeff * skew_phi_sq
}
