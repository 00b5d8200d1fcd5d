//! # Fast Fourier Transform (FFT) Module
//!
//! Fixed-size forward transform used by the spectral pitch detector.
//! Everything that allocates happens in [`SpectralTransform::new`]; running the
//! transform and reading magnitudes only touches buffers sized up front.
//!
//! ## Features
//! - Power-of-two transform sizes planned once with RustFFT
//! - Precomputed Hann window for reduced spectral leakage
//! - Unscaled forward transform (no 1/N normalization)

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Returns the smallest power of two that is `>= len` (and at least 1).
pub fn fft_size_for(len: usize) -> usize {
    len.max(1).next_power_of_two()
}

/// Builds a symmetric Hann window of `size` points.
///
/// `w[i] = 0.5 - 0.5 * cos(2π·i / (size - 1))`, so both ends are exactly zero.
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    let n_minus_1 = (size - 1) as f32;
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos())
        .collect()
}

/// A planned, in-place forward transform of a fixed power-of-two length.
///
/// The input is written into an internal complex buffer with
/// [`load_windowed`](Self::load_windowed), transformed with
/// [`process`](Self::process), and read back as a half spectrum of
/// magnitudes with [`magnitudes_into`](Self::magnitudes_into).
pub struct SpectralTransform {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralTransform {
    /// Plans a transform of `fft_size` points. `fft_size` is rounded up to a power of two.
    pub fn new(fft_size: usize) -> Self {
        let size = fft_size_for(fft_size);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft,
            window: hann_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
        }
    }

    /// Number of points in the transform.
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Number of usable magnitude bins (`size / 2`).
    pub fn num_bins(&self) -> usize {
        self.buffer.len() / 2
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Copies `signal` into the transform buffer, zero-padding to the
    /// transform size and applying the Hann window. Extra samples past the
    /// transform size are ignored.
    pub fn load_windowed(&mut self, signal: &[f32]) {
        for (i, (slot, &w)) in self.buffer.iter_mut().zip(self.window.iter()).enumerate() {
            let sample = signal.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * w, 0.0);
        }
    }

    /// Runs the forward transform in place.
    pub fn process(&mut self) {
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
    }

    /// Complex spectrum of the last [`process`](Self::process) call.
    pub fn spectrum(&self) -> &[Complex<f32>] {
        &self.buffer
    }

    /// Writes `sqrt(re² + im²)` for bins `0..out.len()` (capped at `num_bins`).
    pub fn magnitudes_into(&self, out: &mut [f32]) {
        let bins = self.num_bins();
        for (mag, c) in out.iter_mut().zip(self.buffer.iter().take(bins)) {
            *mag = c.norm(); // .norm() is sqrt(re^2 + im^2)
        }
    }
}

impl std::fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fft_size_rounds_up() {
        assert_eq!(fft_size_for(2048), 2048);
        assert_eq!(fft_size_for(2049), 4096);
        assert_eq!(fft_size_for(1000), 1024);
        assert_eq!(fft_size_for(0), 1);
    }

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(1024);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[1023], 0.0, epsilon = 1e-6);
        let peak = w.iter().cloned().fold(0.0f32, f32::max);
        assert_abs_diff_eq!(peak, 1.0, epsilon = 1e-4);
        // Symmetric
        assert_abs_diff_eq!(w[100], w[1023 - 100], epsilon = 1e-5);
    }

    #[test]
    fn test_unscaled_dc_bin() {
        // Without the window a constant signal puts sum(x) into bin 0.
        let mut transform = SpectralTransform::new(64);
        transform.window.iter_mut().for_each(|w| *w = 1.0);
        transform.load_windowed(&[0.5; 64]);
        transform.process();

        let mut mags = vec![0.0; transform.num_bins()];
        transform.magnitudes_into(&mut mags);
        assert_abs_diff_eq!(mags[0], 32.0, epsilon = 1e-3);
        assert!(mags[1..].iter().all(|&m| m < 1e-3));
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let size = 1024;
        let bin = 37.0;
        let signal: Vec<f32> = (0..size)
            .map(|i| (2.0 * std::f32::consts::PI * bin * i as f32 / size as f32).sin())
            .collect();

        let mut transform = SpectralTransform::new(size);
        transform.load_windowed(&signal);
        transform.process();
        let mut mags = vec![0.0; transform.num_bins()];
        transform.magnitudes_into(&mut mags);

        let (peak, _) = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(peak, 37);
    }

    #[test]
    fn test_zero_padding_clears_stale_samples() {
        let mut transform = SpectralTransform::new(8);
        transform.load_windowed(&[1.0; 8]);
        transform.load_windowed(&[1.0; 3]);
        assert!(transform.spectrum()[3..].iter().all(|c| c.re == 0.0 && c.im == 0.0));
    }
}
