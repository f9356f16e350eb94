//! Opaque, shared sensor observations.
//!
//! Observations are created once by a source and then only ever read. They
//! travel as [`ObservationPtr`] so the same observation can be handed to
//! several front-ends without copying; a consumer that needs a modified
//! version must build a new observation.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use nalgebra::Vector3;

/// A timestamped chunk of sensor data.
pub trait Observation: Send + Sync + Debug + Any {
    /// Acquisition time in nanoseconds.
    fn timestamp_ns(&self) -> u64;

    /// Name of the sensor that produced this observation.
    fn sensor_label(&self) -> &str;

    /// Downcast hook for front-ends that know the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an immutable observation.
pub type ObservationPtr = Arc<dyn Observation>;

/// Single IMU measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct ImuObservation {
    pub timestamp_ns: u64,
    pub sensor_label: String,
    /// Specific force (m/s²), sensor frame.
    pub accel: Vector3<f64>,
    /// Angular rate (rad/s), sensor frame.
    pub gyro: Vector3<f64>,
}

impl ImuObservation {
    pub fn new(
        sensor_label: impl Into<String>,
        timestamp_ns: u64,
        accel: Vector3<f64>,
        gyro: Vector3<f64>,
    ) -> Self {
        Self {
            timestamp_ns,
            sensor_label: sensor_label.into(),
            accel,
            gyro,
        }
    }

    /// Wrap into a shared handle.
    pub fn into_ptr(self) -> ObservationPtr {
        Arc::new(self)
    }
}

impl Observation for ImuObservation {
    fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    fn sensor_label(&self) -> &str {
        &self.sensor_label
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
