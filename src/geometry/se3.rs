//! SE3: 6-DOF rigid body transformation (rotation + translation).
//!
//! Tangent vectors are ordered rotation first, `[ω_x, ω_y, ω_z, ρ_x, ρ_y, ρ_z]`,
//! which is also the ordering used by every 6×6 covariance in this crate.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use super::so3::{left_jacobian, left_jacobian_inv};
use super::Vector6;

/// Rigid body transform. Transforms points as: p' = R * p + t
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Construct from rotation and translation.
    pub fn from_rt(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Construct from quaternion (w, x, y, z) and translation.
    ///
    /// The quaternion is normalized.
    pub fn from_quaternion(qw: f64, qx: f64, qy: f64, qz: f64, translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz)),
            translation,
        }
    }

    /// Construct from translation and roll/pitch/yaw angles (radians).
    pub fn from_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            rotation: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            translation: Vector3::new(x, y, z),
        }
    }

    /// Inverse transform.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Composition `self ∘ other`: first apply `other`, then `self`.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Transform a point by this pose.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Logarithm map to the tangent space, `[ω; ρ]`.
    pub fn log(&self) -> Vector6 {
        let omega = self.rotation.scaled_axis();
        let rho = left_jacobian_inv(&omega) * self.translation;
        Vector6::new(omega.x, omega.y, omega.z, rho.x, rho.y, rho.z)
    }

    /// Exponential map from a tangent vector `[ω; ρ]`.
    pub fn exp(xi: &Vector6) -> Self {
        let omega = Vector3::new(xi[0], xi[1], xi[2]);
        let rho = Vector3::new(xi[3], xi[4], xi[5]);
        Self {
            rotation: UnitQuaternion::from_scaled_axis(omega),
            translation: left_jacobian(&omega) * rho,
        }
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let pose = SE3::from_euler(1.0, -2.0, 0.5, 0.1, 0.2, -0.3);
        let product = pose.compose(&pose.inverse());

        assert_relative_eq!(product.translation, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(product.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let a = SE3::from_euler(1.0, 0.0, 0.0, 0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let b = SE3::from_euler(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let p = Vector3::new(0.0, 0.0, 0.0);

        let composed = a.compose(&b).transform_point(&p);
        let sequential = a.transform_point(&b.transform_point(&p));

        assert_relative_eq!(composed, sequential, epsilon = 1e-12);
        assert_relative_eq!(composed, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_exp_log_recovers_tangent() {
        let xi = Vector6::new(0.1, -0.3, 0.2, 1.5, -0.4, 2.0);
        let recovered = SE3::exp(&xi).log();

        assert_relative_eq!(recovered, xi, epsilon = 1e-10);
    }

    #[test]
    fn test_log_of_identity_is_zero() {
        assert_relative_eq!(SE3::identity().log(), Vector6::zeros(), epsilon = 1e-15);
    }
}
