//! Raw-data ingestion: handing sensor observations from sources to front-ends.
//!
//! Each source runs its `spin()` loop on its own thread and pushes shared,
//! immutable observations into a consumer. The consumer is the single
//! shared hand-off point and must tolerate concurrent calls from every
//! source thread.

pub mod consumer;
pub mod driver;
pub mod observation;
pub mod source;

pub use consumer::{ChannelConsumer, FanOutConsumer, RawDataConsumer};
pub use driver::{run_consumer_loop, spawn_source, SourceHandle, SourceState};
pub use observation::{ImuObservation, Observation, ObservationPtr};
pub use source::{RawDataSource, RawDataSourceBase};
