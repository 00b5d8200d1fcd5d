//! # Pitch Detection Module
//!
//! Common contract for the block-based pitch detectors and the pieces they
//! share: the valid bass-guitar band, parabolic interpolation and RMS.
//!
//! ## Features
//! - [`PitchDetector`] trait: prepare once, detect per block, read confidence
//! - [`Detector`]: closed set of implementations selectable at runtime
//! - [`Algorithm`]: index/name based selection mirroring the host's algorithm list
//!
//! A detector reports `0.0` Hz (and confidence `0.0`) whenever it has nothing
//! to say about a block: wrong block length, silence, no candidate, or a
//! result outside [`MIN_FREQUENCY`]..=[`MAX_FREQUENCY`]. It never panics on
//! malformed input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::spectral::FftDetector;
use crate::yin::YinDetector;

/// Lowest frequency reported by any detector (B0 on a 5-string bass).
pub const MIN_FREQUENCY: f32 = 30.0;
/// Highest frequency reported by any detector.
pub const MAX_FREQUENCY: f32 = 400.0;

/// Returns true if `frequency` lies inside the bass band (inclusive).
#[inline]
pub fn is_valid_frequency(frequency: f32) -> bool {
    (MIN_FREQUENCY..=MAX_FREQUENCY).contains(&frequency)
}

/// Root-mean-square level of a block. Zero for an empty block.
pub fn rms(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    (block.iter().map(|&s| s * s).sum::<f32>() / block.len() as f32).sqrt()
}

/// Fits a parabola through `values[index-1..=index+1]` and returns the
/// fractional position of its vertex.
///
/// Falls back to `index` itself when the extremum sits on either boundary or
/// the three points are collinear (zero denominator), so the result is always
/// finite for finite input.
pub fn parabolic_interpolation(values: &[f32], index: usize) -> f32 {
    if index == 0 || index + 1 >= values.len() {
        return index as f32;
    }

    let alpha = values[index - 1];
    let beta = values[index];
    let gamma = values[index + 1];

    let denominator = alpha - 2.0 * beta + gamma;
    if denominator == 0.0 {
        return index as f32;
    }

    let shift = 0.5 * (alpha - gamma) / denominator;
    if shift.is_finite() {
        index as f32 + shift
    } else {
        index as f32
    }
}

/// Capability shared by every block-based pitch detector.
pub trait PitchDetector {
    /// Sizes every internal buffer for `block_size` samples at `sample_rate` Hz
    /// and clears any state left from a previous configuration.
    fn prepare(&mut self, sample_rate: f64, block_size: usize);

    /// Estimates the fundamental of `block`.
    ///
    /// Returns the frequency in Hz, or `0.0` if no pitch was found. The block
    /// must hold exactly the prepared block size.
    fn detect(&mut self, block: &[f32]) -> f32;

    /// Display name of the algorithm.
    fn name(&self) -> &'static str;

    /// Confidence of the most recent [`detect`](Self::detect) call.
    fn confidence(&self) -> f32;
}

/// The available algorithms, in host display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Yin,
    Fft,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Yin, Algorithm::Fft];

    /// Selects an algorithm by its position in [`Algorithm::ALL`].
    /// Unknown indices fall back to YIN.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(Algorithm::Yin)
    }

    pub fn index(self) -> usize {
        match self {
            Algorithm::Yin => 0,
            Algorithm::Fft => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Yin => YinDetector::NAME,
            Algorithm::Fft => FftDetector::NAME,
        }
    }

    /// Names of all algorithms, for building a selector.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|a| a.name()).collect()
    }

    /// Builds a fresh, unprepared detector for this algorithm.
    pub fn create(self) -> Detector {
        match self {
            Algorithm::Yin => Detector::Yin(YinDetector::new()),
            Algorithm::Fft => Detector::Fft(FftDetector::new()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Unknown pitch detection algorithm: {}", s))
    }
}

/// A pitch detector chosen at runtime.
///
/// Callers hold a `Detector` and drive it through [`PitchDetector`]; adding an
/// algorithm means adding a variant here and in [`Algorithm`].
#[derive(Debug)]
pub enum Detector {
    Yin(YinDetector),
    Fft(FftDetector),
}

impl Detector {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Detector::Yin(_) => Algorithm::Yin,
            Detector::Fft(_) => Algorithm::Fft,
        }
    }

    fn inner(&self) -> &dyn PitchDetector {
        match self {
            Detector::Yin(d) => d,
            Detector::Fft(d) => d,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn PitchDetector {
        match self {
            Detector::Yin(d) => d,
            Detector::Fft(d) => d,
        }
    }
}

impl PitchDetector for Detector {
    fn prepare(&mut self, sample_rate: f64, block_size: usize) {
        self.inner_mut().prepare(sample_rate, block_size);
    }

    fn detect(&mut self, block: &[f32]) -> f32 {
        self.inner_mut().detect(block)
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn confidence(&self) -> f32 {
        self.inner().confidence()
    }
}
