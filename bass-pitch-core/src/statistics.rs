//! # Pitch Statistics Module
//!
//! Running statistics over the stream of per-block pitch observations.
//!
//! Every observation is recorded, valid or not, so detection failures show
//! up as a lower valid ratio instead of disappearing. Two bounded windows are
//! kept: a short one ([`STABILITY_WINDOW`]) for stability and response time,
//! and a long one ([`MAX_HISTORY_SIZE`]) for the average pitch and plotting.
//! Both evict their oldest entry once full, and both are allocated up front so
//! observing never grows them.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::pitch::is_valid_frequency;
use crate::tuning;

/// Capacity of the long pitch history.
pub const MAX_HISTORY_SIZE: usize = 1000;
/// Capacity of the short window used for stability and response time.
pub const STABILITY_WINDOW: usize = 50;
/// RMS level at which the amplitude factor of the detection confidence saturates.
pub const AMPLITUDE_REFERENCE: f32 = 0.1;
/// Standard deviation (Hz) at which stability reaches zero.
pub const STABILITY_REFERENCE_HZ: f32 = 50.0;

/// One processed block as seen by the statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchObservation {
    /// Reported frequency in Hz, possibly 0.0 or out of band.
    pub frequency: f32,
    /// RMS amplitude of the block.
    pub amplitude: f32,
    pub timestamp: Instant,
}

impl PitchObservation {
    pub fn is_valid(&self) -> bool {
        is_valid_frequency(self.frequency)
    }
}

/// A copy of every derived value, for display or logging.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StatisticsSnapshot {
    pub current_pitch: f32,
    pub current_note: String,
    pub average_pitch: f32,
    pub average_note: String,
    pub pitch_stability: f32,
    pub detection_confidence: f32,
    /// Mean seconds between consecutive valid detections.
    pub response_time: f32,
    pub total_detections: u64,
    pub valid_detections: u64,
}

/// Aggregates pitch observations into running statistics.
///
/// Derived values are recomputed synchronously inside [`observe`](Self::observe);
/// the getters only read them.
#[derive(Debug, Clone)]
pub struct PitchStatistics {
    current_pitch: f32,
    current_amplitude: f32,

    average_pitch: f32,
    pitch_stability: f32,
    detection_confidence: f32,
    response_time: f32,

    total_detections: u64,
    valid_detections: u64,

    recent_observations: VecDeque<PitchObservation>,
    pitch_history: VecDeque<f32>,
}

impl Default for PitchStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl PitchStatistics {
    pub fn new() -> Self {
        Self {
            current_pitch: 0.0,
            current_amplitude: 0.0,
            average_pitch: 0.0,
            pitch_stability: 0.0,
            detection_confidence: 0.0,
            response_time: 0.0,
            total_detections: 0,
            valid_detections: 0,
            recent_observations: VecDeque::with_capacity(STABILITY_WINDOW + 1),
            pitch_history: VecDeque::with_capacity(MAX_HISTORY_SIZE + 1),
        }
    }

    /// Records a measurement stamped with the current time.
    pub fn observe(&mut self, frequency: f32, amplitude: f32) {
        self.observe_at(frequency, amplitude, Instant::now());
    }

    /// Records a measurement taken at `timestamp`.
    ///
    /// Timestamps are expected to be non-decreasing; a timestamp earlier than
    /// its predecessor counts as zero elapsed time.
    pub fn observe_at(&mut self, frequency: f32, amplitude: f32, timestamp: Instant) {
        let observation = PitchObservation {
            frequency,
            amplitude,
            timestamp,
        };

        self.recent_observations.push_back(observation);
        if self.recent_observations.len() > STABILITY_WINDOW {
            self.recent_observations.pop_front();
        }

        self.pitch_history.push_back(frequency);
        if self.pitch_history.len() > MAX_HISTORY_SIZE {
            self.pitch_history.pop_front();
        }

        self.current_pitch = frequency;
        self.current_amplitude = amplitude;

        self.total_detections += 1;
        if observation.is_valid() {
            self.valid_detections += 1;
        }

        self.update_statistics();
    }

    /// Clears all counters and both windows.
    pub fn reset(&mut self) {
        self.current_pitch = 0.0;
        self.current_amplitude = 0.0;
        self.average_pitch = 0.0;
        self.pitch_stability = 0.0;
        self.detection_confidence = 0.0;
        self.response_time = 0.0;
        self.total_detections = 0;
        self.valid_detections = 0;

        self.recent_observations.clear();
        self.pitch_history.clear();

        debug!("pitch statistics reset");
    }

    pub fn current_pitch(&self) -> f32 {
        self.current_pitch
    }

    pub fn current_amplitude(&self) -> f32 {
        self.current_amplitude
    }

    pub fn average_pitch(&self) -> f32 {
        self.average_pitch
    }

    /// 0..1, higher is steadier.
    pub fn pitch_stability(&self) -> f32 {
        self.pitch_stability
    }

    pub fn detection_confidence(&self) -> f32 {
        self.detection_confidence
    }

    /// Mean time in seconds between consecutive valid detections.
    pub fn response_time(&self) -> f32 {
        self.response_time
    }

    pub fn total_detections(&self) -> u64 {
        self.total_detections
    }

    pub fn valid_detections(&self) -> u64 {
        self.valid_detections
    }

    pub fn current_note(&self) -> &'static str {
        tuning::frequency_to_note(self.current_pitch)
    }

    pub fn average_note(&self) -> &'static str {
        tuning::frequency_to_note(self.average_pitch)
    }

    /// The short window, oldest first.
    pub fn recent_observations(&self) -> &VecDeque<PitchObservation> {
        &self.recent_observations
    }

    /// Copy of the long history, oldest first.
    pub fn pitch_history(&self) -> Vec<f32> {
        self.pitch_history.iter().copied().collect()
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            current_pitch: self.current_pitch,
            current_note: self.current_note().to_string(),
            average_pitch: self.average_pitch,
            average_note: self.average_note().to_string(),
            pitch_stability: self.pitch_stability,
            detection_confidence: self.detection_confidence,
            response_time: self.response_time,
            total_detections: self.total_detections,
            valid_detections: self.valid_detections,
        }
    }

    fn update_statistics(&mut self) {
        self.average_pitch = self.calculate_average_pitch();
        self.pitch_stability = self.calculate_pitch_stability();
        self.detection_confidence = self.calculate_detection_confidence();
        self.response_time = self.calculate_response_time();
    }

    fn calculate_average_pitch(&self) -> f32 {
        let (sum, count) = self
            .pitch_history
            .iter()
            .filter(|&&f| is_valid_frequency(f))
            .fold((0.0f64, 0usize), |(sum, count), &f| (sum + f as f64, count + 1));

        if count > 0 {
            (sum / count as f64) as f32
        } else {
            0.0
        }
    }

    /// Population standard deviation of the valid pitches in the short window,
    /// mapped onto 0..1 against [`STABILITY_REFERENCE_HZ`].
    fn calculate_pitch_stability(&self) -> f32 {
        let valid = || {
            self.recent_observations
                .iter()
                .filter(|o| o.is_valid())
                .map(|o| o.frequency as f64)
        };

        let count = valid().count();
        if count < 2 {
            return 0.0;
        }

        let mean = valid().sum::<f64>() / count as f64;
        let variance = valid().map(|f| (f - mean) * (f - mean)).sum::<f64>() / count as f64;
        let std_dev = variance.max(0.0).sqrt() as f32;

        (1.0 - std_dev / STABILITY_REFERENCE_HZ).max(0.0)
    }

    /// Long-run valid ratio scaled by how loud the latest block was.
    fn calculate_detection_confidence(&self) -> f32 {
        if self.total_detections == 0 {
            return 0.0;
        }

        let valid_ratio = self.valid_detections as f32 / self.total_detections as f32;
        let amplitude_factor = (self.current_amplitude / AMPLITUDE_REFERENCE).min(1.0);

        valid_ratio * amplitude_factor
    }

    /// Pairs that involve an invalid observation are skipped, not counted as zero.
    fn calculate_response_time(&self) -> f32 {
        let (total, pairs) = self
            .recent_observations
            .iter()
            .zip(self.recent_observations.iter().skip(1))
            .filter(|(prev, next)| prev.is_valid() && next.is_valid())
            .fold((0.0f64, 0usize), |(total, pairs), (prev, next)| {
                let elapsed = next.timestamp.saturating_duration_since(prev.timestamp);
                (total + elapsed.as_secs_f64(), pairs + 1)
            });

        if pairs < 2 {
            0.0
        } else {
            (total / pairs as f64) as f32
        }
    }
}
