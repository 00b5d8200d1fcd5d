//! # Block Analyzer
//!
//! Runs one analysis block through the selected detector and feeds the
//! result into the running statistics:
//! 1. Measure the block's RMS level
//! 2. Skip blocks below the amplitude gate
//! 3. Detect pitch with the current algorithm
//! 4. Record non-zero detections together with the RMS level

use tracing::info;

use crate::config::AnalyzerConfig;
use crate::pitch::{rms, Algorithm, Detector, PitchDetector};
use crate::statistics::PitchStatistics;
use crate::yin::YinDetector;

/// Outcome of a single [`Analyzer::process_block`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockResult {
    /// Detected frequency in Hz, 0.0 if none.
    pub frequency: f32,
    pub confidence: f32,
    pub rms: f32,
    /// True if the block was quiet enough to be skipped without detection.
    pub gated: bool,
}

#[derive(Debug)]
pub struct Analyzer {
    config: AnalyzerConfig,
    sample_rate: f64,
    detector: Detector,
    statistics: PitchStatistics,
}

impl Analyzer {
    /// Creates an analyzer prepared for the configured sample rate and block size.
    pub fn new(config: AnalyzerConfig) -> Self {
        let sample_rate = config.sample_rate as f64;
        let detector = build_detector(&config, config.algorithm);
        let mut analyzer = Self {
            config,
            sample_rate,
            detector,
            statistics: PitchStatistics::new(),
        };
        analyzer.prepare(sample_rate);
        analyzer
    }

    /// Re-prepares the detector for a new sample rate and clears the statistics.
    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.detector.prepare(sample_rate, self.config.block_size);
        self.statistics.reset();
        info!(
            sample_rate,
            block_size = self.config.block_size,
            algorithm = %self.detector.algorithm(),
            "analyzer prepared"
        );
    }

    /// Switches to another algorithm. The statistics start over so the two
    /// algorithms are never mixed; selecting the current one does nothing.
    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        if algorithm == self.detector.algorithm() {
            return;
        }
        self.config.algorithm = algorithm;
        self.detector = build_detector(&self.config, algorithm);
        self.detector.prepare(self.sample_rate, self.config.block_size);
        self.statistics.reset();
        info!(algorithm = %algorithm, "switched pitch detection algorithm");
    }

    pub fn process_block(&mut self, block: &[f32]) -> BlockResult {
        let level = rms(block);
        if level <= self.config.amplitude_threshold {
            return BlockResult {
                frequency: 0.0,
                confidence: 0.0,
                rms: level,
                gated: true,
            };
        }

        let frequency = self.detector.detect(block);
        if frequency > 0.0 {
            self.statistics.observe(frequency, level);
        }

        BlockResult {
            frequency,
            confidence: self.detector.confidence(),
            rms: level,
            gated: false,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.detector.algorithm()
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn statistics(&self) -> &PitchStatistics {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut PitchStatistics {
        &mut self.statistics
    }
}

fn build_detector(config: &AnalyzerConfig, algorithm: Algorithm) -> Detector {
    match algorithm {
        Algorithm::Yin => Detector::Yin(YinDetector::with_threshold(config.yin_threshold)),
        other => other.create(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn generate_sine(sample_rate: f64, freq: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate;
                (2.0 * std::f64::consts::PI * freq as f64 * t).sin() as f32 * amplitude
            })
            .collect()
    }

    #[test]
    fn test_sine_blocks_update_statistics() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default());
        let block = generate_sine(44100.0, 110.0, 2048, 0.5);

        for _ in 0..5 {
            let result = analyzer.process_block(&block);
            assert!(!result.gated);
            assert!((result.frequency - 110.0).abs() < 1.0);
            assert!(result.confidence > 0.9);
        }

        let stats = analyzer.statistics();
        assert_eq!(stats.total_detections(), 5);
        assert_eq!(stats.valid_detections(), 5);
        assert_eq!(stats.current_note(), "A2");
        assert_relative_eq!(stats.pitch_stability(), 1.0, epsilon = 1e-4);
        assert_relative_eq!(stats.detection_confidence(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_quiet_blocks_are_gated() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default());
        let block = generate_sine(44100.0, 110.0, 2048, 0.005);

        let result = analyzer.process_block(&block);
        assert!(result.gated);
        assert_eq!(result.frequency, 0.0);
        assert_eq!(analyzer.statistics().total_detections(), 0);
    }

    #[test]
    fn test_failed_detections_are_not_recorded() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default());
        // Loud but out of band
        let block = generate_sine(44100.0, 500.0, 2048, 0.5);

        let result = analyzer.process_block(&block);
        assert!(!result.gated);
        assert_eq!(result.frequency, 0.0);
        assert_eq!(analyzer.statistics().total_detections(), 0);
    }

    #[test]
    fn test_switching_algorithm_resets_statistics() {
        let mut analyzer = Analyzer::new(AnalyzerConfig {
            block_size: 4096,
            ..Default::default()
        });
        let block = generate_sine(44100.0, 82.41, 4096, 0.5);
        analyzer.process_block(&block);
        assert_eq!(analyzer.statistics().total_detections(), 1);

        analyzer.set_algorithm(Algorithm::Yin);
        assert_eq!(analyzer.statistics().total_detections(), 1);

        analyzer.set_algorithm(Algorithm::Fft);
        assert_eq!(analyzer.algorithm(), Algorithm::Fft);
        assert_eq!(analyzer.detector().name(), "FFT");
        assert_eq!(analyzer.statistics().total_detections(), 0);

        let result = analyzer.process_block(&block);
        assert!((result.frequency - 82.41).abs() < 1.0, "Got {}Hz", result.frequency);
        assert_eq!(analyzer.statistics().total_detections(), 1);
    }

    #[test]
    fn test_prepare_for_new_sample_rate() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default());
        analyzer.process_block(&generate_sine(44100.0, 110.0, 2048, 0.5));

        analyzer.prepare(48000.0);
        assert_eq!(analyzer.sample_rate(), 48000.0);
        assert_eq!(analyzer.statistics().total_detections(), 0);

        let result = analyzer.process_block(&generate_sine(48000.0, 110.0, 2048, 0.5));
        assert!((result.frequency - 110.0).abs() < 1.0, "Got {}Hz", result.frequency);
    }

    #[test]
    fn test_wrong_block_size_is_a_silent_miss() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default());
        let result = analyzer.process_block(&generate_sine(44100.0, 110.0, 1000, 0.5));
        assert_eq!(result.frequency, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(analyzer.statistics().total_detections(), 0);
    }
}
