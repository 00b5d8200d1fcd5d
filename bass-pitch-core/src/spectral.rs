//! # Spectral Pitch Detector
//!
//! Frequency-domain fundamental estimation: Hann window, forward FFT, the
//! strongest strict local maximum inside the bass band, parabolic refinement.
//!
//! Confidence is the peak's magnitude relative to the loudest bin of the whole
//! half spectrum. A bass note whose second harmonic outweighs the fundamental
//! therefore scores below 1 even when the reported frequency is right.

use tracing::debug;

use crate::fft::{fft_size_for, SpectralTransform};
use crate::pitch::{
    is_valid_frequency, parabolic_interpolation, PitchDetector, MAX_FREQUENCY, MIN_FREQUENCY,
};

/// Peaks at or below this magnitude are ignored.
pub const MIN_MAGNITUDE_THRESHOLD: f32 = 0.01;

#[derive(Debug)]
pub struct FftDetector {
    sample_rate: f64,
    block_size: usize,
    fft_size: usize,
    confidence: f32,
    transform: Option<SpectralTransform>,
    magnitudes: Vec<f32>,
}

impl Default for FftDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FftDetector {
    pub const NAME: &'static str = "FFT";

    pub fn new() -> Self {
        Self {
            sample_rate: 0.0,
            block_size: 0,
            fft_size: 0,
            confidence: 0.0,
            transform: None,
            magnitudes: Vec::new(),
        }
    }

    /// Transform length chosen by the last `prepare` (0 before that).
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Magnitude spectrum (bins `0..fft_size/2`) of the last analysed block.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    fn frequency_to_bin(&self, frequency: f32) -> f32 {
        (frequency as f64 * self.fft_size as f64 / self.sample_rate) as f32
    }

    fn bin_to_frequency(&self, bin: f32) -> f32 {
        (bin as f64 * self.sample_rate / self.fft_size as f64) as f32
    }

    /// Inclusive bin range covering the valid band, with one neighbour on each side.
    fn search_range(&self) -> Option<(usize, usize)> {
        let num_bins = self.magnitudes.len();
        if num_bins < 3 {
            return None;
        }

        let min_bin = (self.frequency_to_bin(MIN_FREQUENCY).floor() as usize).max(1);
        let max_bin = (self.frequency_to_bin(MAX_FREQUENCY).ceil() as usize).min(num_bins - 2);

        (min_bin < max_bin).then_some((min_bin, max_bin))
    }

    /// Strongest strict local maximum in the band that beats the magnitude floor.
    ///
    /// Bins are scanned upward and a later bin only replaces the current peak
    /// if it is strictly louder, so the lowest of equally loud peaks wins.
    fn find_peak_bin(&self) -> Option<usize> {
        let (min_bin, max_bin) = self.search_range()?;
        let mags = &self.magnitudes;

        let mut peak_bin = None;
        let mut peak_magnitude = MIN_MAGNITUDE_THRESHOLD;

        for i in min_bin..=max_bin {
            if mags[i] > peak_magnitude && mags[i] > mags[i - 1] && mags[i] > mags[i + 1] {
                peak_bin = Some(i);
                peak_magnitude = mags[i];
            }
        }
        peak_bin
    }

    fn reject(&mut self) -> f32 {
        self.confidence = 0.0;
        0.0
    }
}

impl PitchDetector for FftDetector {
    fn prepare(&mut self, sample_rate: f64, block_size: usize) {
        self.sample_rate = sample_rate;
        self.block_size = block_size;
        self.fft_size = fft_size_for(block_size);
        self.transform = Some(SpectralTransform::new(self.fft_size));
        self.magnitudes = vec![0.0; self.fft_size / 2];
        self.confidence = 0.0;

        debug!(sample_rate, block_size, fft_size = self.fft_size, "prepared FFT detector");
    }

    fn detect(&mut self, block: &[f32]) -> f32 {
        if self.block_size == 0 || block.len() != self.block_size {
            return self.reject();
        }
        let Some(transform) = self.transform.as_mut() else {
            return self.reject();
        };

        transform.load_windowed(block);
        transform.process();
        transform.magnitudes_into(&mut self.magnitudes);

        let Some(peak_bin) = self.find_peak_bin() else {
            return self.reject();
        };

        let bin = parabolic_interpolation(&self.magnitudes, peak_bin);
        let frequency = self.bin_to_frequency(bin);
        if !is_valid_frequency(frequency) {
            return self.reject();
        }

        let peak_magnitude = self.magnitudes[peak_bin];
        let max_magnitude = self.magnitudes.iter().cloned().fold(0.0f32, f32::max);
        self.confidence = if max_magnitude > 0.0 {
            peak_magnitude / max_magnitude
        } else {
            0.0
        };

        frequency
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine(sample_rate: f64, freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate;
                (2.0 * std::f64::consts::PI * freq as f64 * t).sin() as f32 * 0.5
            })
            .collect()
    }

    fn prepared(sample_rate: f64, block_size: usize) -> FftDetector {
        let mut detector = FftDetector::new();
        detector.prepare(sample_rate, block_size);
        detector
    }

    #[test]
    fn test_fft_size_is_power_of_two() {
        assert_eq!(prepared(44100.0, 2048).fft_size(), 2048);
        assert_eq!(prepared(44100.0, 3000).fft_size(), 4096);
        assert_eq!(prepared(44100.0, 3000).magnitudes().len(), 2048);
    }

    #[test]
    fn test_detect_bass_notes() {
        let sample_rate = 44100.0;
        let mut detector = prepared(sample_rate, 4096);

        for &freq in &[41.2, 55.0, 82.41, 110.0, 196.0, 220.0, 392.0] {
            let samples = generate_sine(sample_rate, freq, 4096);
            let result = detector.detect(&samples);

            assert!(
                (result - freq).abs() < 1.0,
                "Expected {}Hz, got {}Hz",
                freq,
                result
            );
            assert!(detector.confidence() > 0.0);
        }
    }

    #[test]
    fn test_zero_padded_block() {
        // 3000 samples are zero-padded into a 4096-point transform.
        let sample_rate = 44100.0;
        let mut detector = prepared(sample_rate, 3000);
        let result = detector.detect(&generate_sine(sample_rate, 110.0, 3000));
        assert!((result - 110.0).abs() < 2.2, "Got {}Hz", result);
    }

    #[test]
    fn test_silence_detection() {
        let mut detector = prepared(44100.0, 2048);
        assert_eq!(detector.detect(&vec![0.0; 2048]), 0.0);
        assert_eq!(detector.confidence(), 0.0);
    }

    #[test]
    fn test_out_of_band_rejected() {
        let sample_rate = 44100.0;
        let mut detector = prepared(sample_rate, 4096);

        for &freq in &[20.0, 500.0, 1000.0] {
            let samples = generate_sine(sample_rate, freq, 4096);
            assert_eq!(detector.detect(&samples), 0.0, "{}Hz must be rejected", freq);
            assert_eq!(detector.confidence(), 0.0);
        }
    }

    #[test]
    fn test_confidence_is_relative_to_loudest_bin() {
        let sample_rate = 44100.0;
        let len = 4096;
        // Weak 110 Hz fundamental under a loud 1 kHz tone outside the band.
        let samples: Vec<f32> = (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate;
                (0.1 * (2.0 * std::f64::consts::PI * 110.0 * t).sin()
                    + 0.8 * (2.0 * std::f64::consts::PI * 1000.0 * t).sin()) as f32
            })
            .collect();

        let mut detector = prepared(sample_rate, len);
        let result = detector.detect(&samples);
        assert!((result - 110.0).abs() < 1.0, "Got {}Hz", result);
        assert!(
            detector.confidence() > 0.0 && detector.confidence() < 0.2,
            "Confidence {} should reflect the louder out-of-band peak",
            detector.confidence()
        );
    }

    #[test]
    fn test_wrong_block_length() {
        let mut detector = prepared(44100.0, 2048);
        assert_eq!(detector.detect(&generate_sine(44100.0, 110.0, 2047)), 0.0);
        assert_eq!(detector.confidence(), 0.0);
    }

    #[test]
    fn test_unprepared_detector() {
        let mut detector = FftDetector::new();
        assert_eq!(detector.detect(&[0.5; 16]), 0.0);
        assert_eq!(detector.confidence(), 0.0);
    }

    #[test]
    fn test_degenerate_search_range() {
        // At 8 points and 44.1 kHz every bin is wider than the whole band.
        let mut detector = prepared(44100.0, 8);
        assert_eq!(detector.detect(&[0.5, -0.5, 0.5, -0.5, 0.5, -0.5, 0.5, -0.5]), 0.0);
    }

    #[test]
    fn test_reprepare_resizes() {
        let sample_rate = 44100.0;
        let mut detector = prepared(sample_rate, 2048);
        assert!(detector.detect(&generate_sine(sample_rate, 110.0, 2048)) > 0.0);

        detector.prepare(sample_rate, 8192);
        assert_eq!(detector.fft_size(), 8192);
        assert!(detector.magnitudes().iter().all(|&m| m == 0.0));
        assert_eq!(detector.detect(&generate_sine(sample_rate, 110.0, 2048)), 0.0);

        let result = detector.detect(&generate_sine(sample_rate, 82.41, 8192));
        assert!((result - 82.41).abs() < 1.0, "Got {}Hz", result);
    }

    #[test]
    fn test_strongest_local_peak_wins() {
        let mut detector = prepared(1024.0, 64);
        // 16 Hz per bin: band covers bins 1..=25
        let mut mags = vec![0.0; 32];
        mags[3] = 0.5;
        mags[6] = 0.9;
        mags[7] = 0.9; // plateau: neither 6 nor 7 is a strict maximum
        mags[10] = 0.7;
        mags[30] = 5.0; // outside the band
        detector.magnitudes = mags;
        assert_eq!(detector.find_peak_bin(), Some(10));
    }
}
