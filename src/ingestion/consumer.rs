//! Consumers - the receiving end of the sensor hand-off.
//!
//! [`RawDataConsumer::on_new_observation`] takes `&self` and may be called
//! from many source threads at once; each implementation brings its own
//! synchronization. The call is a synchronous hand-off: if an implementation
//! buffers, that is its own choice.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::warn;

use crate::config::IngestionConfig;

use super::observation::ObservationPtr;

/// Accepts observations produced by raw-data sources.
pub trait RawDataConsumer: Send + Sync {
    /// Accept one observation.
    fn on_new_observation(&self, obs: ObservationPtr);
}

impl<F> RawDataConsumer for F
where
    F: Fn(ObservationPtr) + Send + Sync,
{
    fn on_new_observation(&self, obs: ObservationPtr) {
        self(obs)
    }
}

/// Forwards observations into a crossbeam channel.
///
/// With a bounded capacity the hand-off blocks the calling source while the
/// channel is full, so nothing is dropped while a receiver is alive.
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    sender: Sender<ObservationPtr>,
}

impl ChannelConsumer {
    /// Create the consumer and the receiver the front-end drains.
    ///
    /// `capacity` of `None` means unbounded.
    pub fn new(capacity: Option<usize>) -> (Self, Receiver<ObservationPtr>) {
        let (sender, receiver) = match capacity {
            Some(cap) => bounded(cap),
            None => unbounded(),
        };
        (Self { sender }, receiver)
    }

    pub fn from_config(config: &IngestionConfig) -> (Self, Receiver<ObservationPtr>) {
        Self::new(config.channel_capacity)
    }

    /// Number of observations waiting in the channel.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

impl RawDataConsumer for ChannelConsumer {
    fn on_new_observation(&self, obs: ObservationPtr) {
        if let Err(err) = self.sender.send(obs) {
            warn!(
                "Dropping observation from '{}': no front-end receiving",
                err.0.sensor_label()
            );
        }
    }
}

/// Routes each observation to the consumers registered for its sensor label.
///
/// Routes are fixed at construction, so routing needs no locking. Every
/// target receives a clone of the same shared handle.
#[derive(Default)]
pub struct FanOutConsumer {
    routes: HashMap<String, Vec<Arc<dyn RawDataConsumer>>>,
    catch_all: Vec<Arc<dyn RawDataConsumer>>,
}

impl FanOutConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send observations from `sensor_label` to `consumer`.
    pub fn route(
        mut self,
        sensor_label: impl Into<String>,
        consumer: Arc<dyn RawDataConsumer>,
    ) -> Self {
        self.routes.entry(sensor_label.into()).or_default().push(consumer);
        self
    }

    /// Send every observation to `consumer`, whatever its label.
    pub fn catch_all(mut self, consumer: Arc<dyn RawDataConsumer>) -> Self {
        self.catch_all.push(consumer);
        self
    }

    /// Number of consumers an observation from `sensor_label` reaches.
    pub fn fan_out(&self, sensor_label: &str) -> usize {
        self.routes.get(sensor_label).map_or(0, Vec::len) + self.catch_all.len()
    }
}

impl RawDataConsumer for FanOutConsumer {
    fn on_new_observation(&self, obs: ObservationPtr) {
        let routed = self
            .routes
            .get(obs.sensor_label())
            .map(Vec::as_slice)
            .unwrap_or_default();

        if routed.is_empty() && self.catch_all.is_empty() {
            warn!("No front-end registered for sensor '{}'", obs.sensor_label());
            return;
        }

        for consumer in routed.iter().chain(&self.catch_all) {
            consumer.on_new_observation(Arc::clone(&obs));
        }
    }
}

impl std::fmt::Debug for FanOutConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut labels: Vec<&String> = self.routes.keys().collect();
        labels.sort();
        f.debug_struct("FanOutConsumer")
            .field("routes", &labels)
            .field("catch_all", &self.catch_all.len())
            .finish()
    }
}
