//! # Analyzer Configuration
//!
//! Settings for the block analyzer, loadable from and savable to JSON.
//! Missing fields take their defaults, so a config file only needs to name
//! what it changes.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pitch::Algorithm;
use crate::yin::DEFAULT_THRESHOLD;

/// Samples per analysis block (~46 ms at 44.1 kHz).
pub const ANALYSIS_BUFFER_SIZE: usize = 2048;
/// Blocks quieter than this RMS level are not analysed.
pub const MIN_AMPLITUDE_THRESHOLD: f32 = 0.01;
/// Preferred capture rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub algorithm: Algorithm,
    pub block_size: usize,
    pub amplitude_threshold: f32,
    pub yin_threshold: f32,
    pub sample_rate: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Yin,
            block_size: ANALYSIS_BUFFER_SIZE,
            amplitude_threshold: MIN_AMPLITUDE_THRESHOLD,
            yin_threshold: DEFAULT_THRESHOLD,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl AnalyzerConfig {
    /// Rejects settings the detectors cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size < 4 {
            bail!("Block size must be at least 4 samples, got {}", self.block_size);
        }
        if self.sample_rate == 0 {
            bail!("Sample rate must be positive");
        }
        if !(self.yin_threshold > 0.0 && self.yin_threshold < 1.0) {
            bail!("YIN threshold must lie in (0, 1), got {}", self.yin_threshold);
        }
        if !(self.amplitude_threshold >= 0.0) {
            bail!(
                "Amplitude threshold must be non-negative, got {}",
                self.amplitude_threshold
            );
        }
        Ok(())
    }
}

/// Saves the configuration as pretty-printed JSON.
pub fn save_config(config: &AnalyzerConfig, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json_string =
        serde_json::to_string_pretty(config).context("Failed to serialize analyzer config")?;
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create config file {}", path.display()))?;
    file.write_all(json_string.as_bytes())?;
    info!(path = %path.display(), "saved analyzer config");
    Ok(())
}

/// Loads and validates a configuration from a JSON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AnalyzerConfig> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open config file {}", path.display()))?;
    let mut data = String::new();
    file.read_to_string(&mut data)?;

    let config: AnalyzerConfig = serde_json::from_str(&data)
        .with_context(|| format!("Invalid analyzer config in {}", path.display()))?;
    config.validate()?;

    info!(path = %path.display(), algorithm = %config.algorithm, "loaded analyzer config");
    Ok(config)
}
