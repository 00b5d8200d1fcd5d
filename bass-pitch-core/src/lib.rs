// bass-pitch-core/src/lib.rs

//! The core logic for the bass pitch detection tester.
//! This crate is responsible for pitch detection on fixed-size audio
//! blocks and for the running statistics built from the results. It is
//! completely headless and contains no display code.
//!
//! Detectors and statistics are single-owner objects: all calls take
//! `&mut self`, run to completion on the calling thread, and never allocate
//! after `prepare`.

pub mod analyzer;
pub mod audio;
pub mod config;
pub mod fft;
pub mod pitch;
pub mod spectral;
pub mod statistics;
pub mod tuning;
pub mod yin;

pub use analyzer::{Analyzer, BlockResult};
pub use config::AnalyzerConfig;
pub use pitch::{Algorithm, Detector, PitchDetector, MAX_FREQUENCY, MIN_FREQUENCY};
pub use spectral::FftDetector;
pub use statistics::{PitchObservation, PitchStatistics, StatisticsSnapshot};
pub use yin::YinDetector;
