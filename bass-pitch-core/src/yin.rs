//! # YIN Pitch Detector
//!
//! Time-domain fundamental estimation for bass guitar, after
//! A. de Cheveigné and H. Kawahara (2002).
//!
//! ## Steps
//! 1. Difference function over a half-block window
//! 2. Cumulative mean normalized difference (CMND)
//! 3. Absolute threshold: the first dip below the threshold, followed down to its local minimum
//! 4. Parabolic interpolation for sub-sample lag accuracy
//! 5. Band check and confidence from the depth of the dip

use tracing::debug;

use crate::pitch::{is_valid_frequency, parabolic_interpolation, PitchDetector};

/// Default absolute threshold on the normalized difference.
pub const DEFAULT_THRESHOLD: f32 = 0.15;

/// YIN detector with buffers sized by [`PitchDetector::prepare`].
#[derive(Debug, Clone)]
pub struct YinDetector {
    sample_rate: f64,
    block_size: usize,
    threshold: f32,
    confidence: f32,
    difference: Vec<f32>,
    cmnd: Vec<f32>,
}

impl Default for YinDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl YinDetector {
    pub const NAME: &'static str = "YIN";

    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD)
    }

    /// Creates a detector with a custom absolute threshold.
    ///
    /// Lower thresholds reject more blocks but report cleaner periods.
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            sample_rate: 0.0,
            block_size: 0,
            threshold,
            confidence: 0.0,
            difference: Vec::new(),
            cmnd: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// The cumulative mean normalized difference of the last block.
    pub fn cmnd(&self) -> &[f32] {
        &self.cmnd
    }

    /// d(t) = Σ (x[i] - x[i+t])² over the first half of the block.
    fn compute_difference(&mut self, block: &[f32]) {
        let half = self.difference.len();
        for (tau, slot) in self.difference.iter_mut().enumerate() {
            let mut sum = 0.0;
            for i in 0..half {
                let delta = block[i] - block[i + tau];
                sum += delta * delta;
            }
            *slot = sum;
        }
    }

    fn compute_cumulative_mean_normalized_difference(&mut self) {
        if self.cmnd.is_empty() {
            return;
        }
        self.cmnd[0] = 1.0;

        let mut running_sum = self.difference[0];
        for tau in 1..self.cmnd.len() {
            running_sum += self.difference[tau];
            self.cmnd[tau] = if running_sum > 0.0 {
                self.difference[tau] / (running_sum / (tau + 1) as f32)
            } else {
                1.0
            };
        }
    }

    /// Index of the local minimum inside the first region below the threshold.
    ///
    /// Lags 0 and 1 are skipped. Later, possibly deeper, regions are never
    /// examined.
    fn find_minimum_index(&self) -> Option<usize> {
        let len = self.cmnd.len();
        let start = (2..len).find(|&tau| self.cmnd[tau] < self.threshold)?;

        let mut min_index = start;
        while min_index + 1 < len && self.cmnd[min_index + 1] < self.cmnd[min_index] {
            min_index += 1;
        }
        Some(min_index)
    }

    fn reject(&mut self) -> f32 {
        self.confidence = 0.0;
        0.0
    }
}

impl PitchDetector for YinDetector {
    fn prepare(&mut self, sample_rate: f64, block_size: usize) {
        self.sample_rate = sample_rate;
        self.block_size = block_size;

        let half = block_size / 2;
        self.difference = vec![0.0; half];
        self.cmnd = vec![0.0; half];
        self.confidence = 0.0;

        debug!(sample_rate, block_size, lags = half, "prepared YIN detector");
    }

    fn detect(&mut self, block: &[f32]) -> f32 {
        if self.block_size == 0 || block.len() != self.block_size {
            return self.reject();
        }

        self.compute_difference(block);
        self.compute_cumulative_mean_normalized_difference();

        let Some(min_index) = self.find_minimum_index() else {
            return self.reject();
        };

        let lag = parabolic_interpolation(&self.cmnd, min_index);
        if lag <= 0.0 {
            return self.reject();
        }

        let frequency = (self.sample_rate / lag as f64) as f32;
        if !is_valid_frequency(frequency) {
            return self.reject();
        }

        let min_value = self.cmnd[min_index];
        self.confidence = (1.0 - min_value / self.threshold).max(0.0);
        frequency
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}
