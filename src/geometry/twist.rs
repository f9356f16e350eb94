use nalgebra::Vector3;

use super::Vector6;

/// Linear + angular velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twist3 {
    /// Linear velocity (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Twist3 {
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Stacked `[v; ω]` vector.
    pub fn as_vector(&self) -> Vector6 {
        Vector6::new(
            self.linear.x,
            self.linear.y,
            self.linear.z,
            self.angular.x,
            self.angular.y,
            self.angular.z,
        )
    }
}

impl Default for Twist3 {
    fn default() -> Self {
        Self::zero()
    }
}
