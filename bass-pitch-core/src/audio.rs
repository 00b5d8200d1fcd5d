//! # Audio Capture Module
//!
//! Live input for the analyzer using CPAL (Cross-Platform Audio Library).
//! The input callback downmixes to mono, assembles fixed-size analysis blocks
//! and hands each complete block to a channel. Blocks are dropped, not
//! queued, when the receiver falls behind.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::Sender;
use anyhow::{Result, anyhow};
use tracing::{info, warn};

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `sender` - Receives one `Vec<f32>` per complete block
/// * `block_size` - Samples per analysis block
/// * `target_rate` - Preferred sample rate; the closest supported rate is used
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and the actual sample rate
/// * `Err(e)` - No usable input device or format
pub fn start_audio_capture(
    sender: Sender<Vec<f32>>,
    block_size: usize,
    target_rate: u32,
) -> Result<(cpal::Stream, u32)> {
    if block_size == 0 {
        return Err(anyhow!("Block size must be positive"));
    }

    let host = cpal::default_host();
    let device = host.default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!(device = %device.name()?, "using audio input device");

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));

    let sample_rate_val = config.sample_rate().0;
    let channels = config.channels().max(1) as usize;
    let config: cpal::StreamConfig = config.into();

    info!(sample_rate = sample_rate_val, channels, block_size, "selected input format");

    let err_fn = |err: cpal::StreamError| warn!("An error occurred on the audio stream: {}", err);

    let mut assembler = BlockAssembler::new(block_size);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels) {
                let mono = frame.iter().sum::<f32>() / frame.len() as f32;
                if let Some(block) = assembler.push(mono) {
                    // Ignore a full channel: the analysis thread is behind.
                    let _ = sender.try_send(block);
                }
            }
        },
        err_fn,
        None
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Collects samples into consecutive, non-overlapping blocks.
#[derive(Debug)]
pub struct BlockAssembler {
    block_size: usize,
    pending: Vec<f32>,
}

impl BlockAssembler {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            pending: Vec::with_capacity(block_size),
        }
    }

    /// Appends one sample; returns the block it completes, if any.
    pub fn push(&mut self, sample: f32) -> Option<Vec<f32>> {
        self.pending.push(sample);
        if self.pending.len() < self.block_size {
            return None;
        }
        let block = std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
        Some(block)
    }

    /// Samples waiting for the next block.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Picks the f32 input configuration closest to `target_rate`, preferring mono.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let in_range = (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate);
            let rate_diff = if in_range {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (rate_diff, c.channels() != 1, c.channels())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_emits_full_blocks() {
        let mut assembler = BlockAssembler::new(4);
        let mut blocks = Vec::new();
        for i in 0..10 {
            if let Some(block) = assembler.push(i as f32) {
                blocks.push(block);
            }
        }
        assert_eq!(blocks, vec![vec![0.0, 1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0, 7.0]]);
        assert_eq!(assembler.pending(), 2);
    }

    #[test]
    fn test_assembled_blocks_reach_channel() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut assembler = BlockAssembler::new(2);
        for sample in [0.1, 0.2, 0.3, 0.4] {
            if let Some(block) = assembler.push(sample) {
                let _ = tx.try_send(block);
            }
        }
        // The second block was dropped because the channel was full
        assert_eq!(rx.try_recv().unwrap(), vec![0.1, 0.2]);
        assert!(rx.try_recv().is_err());
    }
}
