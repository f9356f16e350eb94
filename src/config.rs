//! Kernel configuration.
//!
//! Every section has a `Default`, so an empty TOML document (or no file at
//! all) yields a usable configuration:
//!
//! ```toml
//! [noise]
//! diag_xyz = 0.02
//! diag_rot_deg = 1.0
//!
//! [ingestion]
//! channel_capacity = 64
//! spin_period_ms = 10
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub noise: NoiseDefaults,
    pub ingestion: IngestionConfig,
}

impl KernelConfig {
    /// Parse from a TOML string.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid kernel configuration")
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text)
    }
}

/// Diagonal fallback noise for relative pose factors without a covariance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoiseDefaults {
    /// Standard deviation of translation, per axis (m).
    pub diag_xyz: f64,

    /// Standard deviation of each rotation angle (degrees).
    pub diag_rot_deg: f64,
}

impl NoiseDefaults {
    pub fn diag_rot_rad(&self) -> f64 {
        self.diag_rot_deg.to_radians()
    }
}

impl Default for NoiseDefaults {
    fn default() -> Self {
        Self {
            diag_xyz: 0.01,
            diag_rot_deg: 0.5,
        }
    }
}

/// Raw-data hand-off and source driver settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Capacity of channel consumers. `None` means unbounded.
    pub channel_capacity: Option<usize>,

    /// Minimum time between two `spin()` calls of one source (ms).
    /// Zero re-invokes the source immediately.
    pub spin_period_ms: u64,
}

impl IngestionConfig {
    pub fn spin_period(&self) -> Duration {
        Duration::from_millis(self.spin_period_ms)
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: None,
            spin_period_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = KernelConfig::from_toml_str("").unwrap();
        assert_eq!(config, KernelConfig::default());
        assert_eq!(config.noise.diag_xyz, 0.01);
        assert_eq!(config.ingestion.spin_period(), Duration::ZERO);
    }

    #[test]
    fn test_partial_sections() {
        let config = KernelConfig::from_toml_str(
            r#"
            [noise]
            diag_rot_deg = 2.0

            [ingestion]
            channel_capacity = 16
            spin_period_ms = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.noise.diag_xyz, 0.01);
        assert!((config.noise.diag_rot_rad() - 2.0_f64.to_radians()).abs() < 1e-15);
        assert_eq!(config.ingestion.channel_capacity, Some(16));
        assert_eq!(config.ingestion.spin_period(), Duration::from_millis(5));
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let err = KernelConfig::from_toml_str("[noise]\ndiag_xyz = \"wide\"").unwrap_err();
        assert!(err.to_string().contains("invalid kernel configuration"));
    }
}
