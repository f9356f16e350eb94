pub mod config;
pub mod error;
pub mod geometry;
pub mod ingestion;
pub mod optimizer;
pub mod world_model;

pub use config::KernelConfig;
pub use error::{Result, WorldModelError};
