//! Raw-data sources - one per physical or virtual sensor.
//!
//! A source implements [`RawDataSource::spin`]: one bounded unit of polling
//! work, after which control returns to whoever drives it. Anything produced
//! during that unit goes out through
//! [`RawDataSourceBase::send_observations_to_front_ends`].

use std::sync::Arc;

use anyhow::Result;

use super::consumer::RawDataConsumer;
use super::observation::ObservationPtr;

/// A sensor driver or dataset player.
///
/// A given source is driven by one caller at a time; distinct sources run
/// concurrently on their own threads.
pub trait RawDataSource: Send {
    /// Poll the sensor once, sending zero or more observations.
    ///
    /// Must return promptly; it is called again in a loop at the sensor rate.
    fn spin(&mut self) -> Result<()>;

    /// Name used in logs and thread names.
    fn label(&self) -> &str {
        "raw-data-source"
    }
}

/// Link from a source to the consumer that receives its data.
///
/// Concrete sources embed one of these and call
/// [`send_observations_to_front_ends`](Self::send_observations_to_front_ends)
/// from `spin()`.
#[derive(Clone)]
pub struct RawDataSourceBase {
    consumer: Arc<dyn RawDataConsumer>,
}

impl RawDataSourceBase {
    pub fn new(consumer: Arc<dyn RawDataConsumer>) -> Self {
        Self { consumer }
    }

    /// Send an observation to the associated target front-ends.
    ///
    /// Blocks until the consumer has accepted it.
    pub fn send_observations_to_front_ends(&self, obs: ObservationPtr) {
        self.consumer.on_new_observation(obs);
    }

    /// Target of captured data.
    pub fn consumer(&self) -> &Arc<dyn RawDataConsumer> {
        &self.consumer
    }
}

impl std::fmt::Debug for RawDataSourceBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDataSourceBase").finish_non_exhaustive()
    }
}
