//! FFT analysis of the tapped signal

use super::{AnalysisWindow, AnalyzerConfig, FrequencyBands, RateLimiter};
use crate::error::Result;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

/// Windowed FFT → quadratic band map → dB normalization.
///
/// Everything is sized once at construction: the Hann table, the band map,
/// the FFT plan and its scratch space. `analyze` and `push_sample` allocate
/// only the copy that is handed to the consumer.
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    band_ranges: Vec<Range<usize>>,

    // Circular window fed from the audio thread
    window: AnalysisWindow,
    rate_limiter: RateLimiter,

    // Working buffers, overwritten on every analysis
    snapshot: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    bands: Vec<f32>,

    windows_filled: u64,
    analyses: u64,
}

impl SpectrumAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let fft_size = config.fft_size;
        let band_count = config.band_count;

        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        log::debug!(
            "Spectrum analyzer: {} point FFT, {} bands, {} ms min interval",
            fft_size,
            band_count,
            config.min_interval_ms
        );

        Ok(Self {
            fft,
            hann: hann_window(fft_size),
            band_ranges: quadratic_band_ranges(fft_size, band_count),
            window: AnalysisWindow::new(fft_size),
            rate_limiter: RateLimiter::new(config.min_interval()),
            snapshot: vec![0.0; fft_size],
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            magnitudes: vec![0.0; band_count],
            bands: vec![0.0; band_count],
            windows_filled: 0,
            analyses: 0,
            config,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn band_count(&self) -> usize {
        self.config.band_count
    }

    /// Bin range averaged into each band, lowest band first
    pub fn band_ranges(&self) -> &[Range<usize>] {
        &self.band_ranges
    }

    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }

    /// Complex spectrum of the most recent analysis
    pub fn spectrum(&self) -> &[Complex<f32>] {
        &self.spectrum
    }

    /// Averaged linear magnitude per band from the most recent analysis
    pub fn band_magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Number of times the window wrapped, analysed or not
    pub fn windows_filled(&self) -> u64 {
        self.windows_filled
    }

    /// Number of analyses that passed the rate limiter
    pub fn analyses(&self) -> u64 {
        self.analyses
    }

    /// Append one mono sample. When this completes a window and the rate
    /// limiter allows it, the window is analysed and a copy of the bands is
    /// returned for publishing.
    pub fn push_sample(&mut self, sample: f32) -> Option<FrequencyBands> {
        if self.window.push(sample) {
            self.window_filled_at(Instant::now())
        } else {
            None
        }
    }

    fn window_filled_at(&mut self, now: Instant) -> Option<FrequencyBands> {
        self.windows_filled += 1;

        // Gate before the FFT so suppressed windows cost nothing
        if !self.rate_limiter.try_acquire_at(now) {
            log::trace!("Window {} dropped by rate limiter", self.windows_filled);
            return None;
        }

        self.window.copy_chronological(&mut self.snapshot);
        self.compute();
        self.analyses += 1;

        Some(FrequencyBands::from_slice(&self.bands))
    }

    /// Analyse a chronologically ordered block of exactly `fft_size` samples.
    ///
    /// Returns `None` for any other length. Bypasses the window and the
    /// rate limiter.
    pub fn analyze(&mut self, samples: &[f32]) -> Option<&[f32]> {
        if samples.len() != self.fft_size() {
            return None;
        }
        self.snapshot.copy_from_slice(samples);
        self.compute();
        Some(self.bands.as_slice())
    }

    /// Zero the window and forget the last dispatch time.
    pub fn clear(&mut self) {
        self.window.clear();
        self.rate_limiter.clear();
    }

    fn compute(&mut self) {
        // Hann weights are indexed by chronological position
        for ((slot, &sample), &weight) in self
            .spectrum
            .iter_mut()
            .zip(self.snapshot.iter())
            .zip(self.hann.iter())
        {
            *slot = Complex::new(sample * weight, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        for (band, range) in self.band_ranges.iter().enumerate() {
            let count = range.len().max(1);
            let sum: f32 = self.spectrum[range.clone()]
                .iter()
                .map(|c| c.re.hypot(c.im))
                .sum();
            let magnitude = sum / count as f32;

            self.magnitudes[band] = magnitude;
            self.bands[band] = normalize_db(
                magnitude,
                self.config.magnitude_floor,
                self.config.db_floor,
                self.config.db_ceiling,
            );
        }
    }
}

/// Symmetric Hann window of length `size`.
fn hann_window(size: usize) -> Vec<f32> {
    let denom = (size.max(2) - 1) as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
        .collect()
}

/// Bin ranges for `band_count` bands over the first `fft_size / 2` bins.
///
/// Edges follow `(band / band_count)^2 * nyquist`, giving the low bands far
/// fewer bins than the high ones. Every range is non-empty and inside
/// `0..nyquist`.
fn quadratic_band_ranges(fft_size: usize, band_count: usize) -> Vec<Range<usize>> {
    let nyquist = fft_size / 2;
    let edge = |band: usize| -> f64 {
        let ratio = band as f64 / band_count as f64;
        ratio * ratio * nyquist as f64
    };

    (0..band_count)
        .map(|band| {
            let low = (edge(band).floor() as usize).min(nyquist - 1);
            let high = (edge(band + 1).ceil() as usize).clamp(low + 1, nyquist);
            low..high
        })
        .collect()
}

/// Map a linear magnitude onto `[0, 1]` through a fixed dB window.
fn normalize_db(magnitude: f32, floor: f32, db_floor: f32, db_ceiling: f32) -> f32 {
    // f32::max drops a NaN operand, so a NaN magnitude lands on the floor
    let db = 20.0 * magnitude.max(floor).log10();
    let normalized = (db - db_floor) / (db_ceiling - db_floor);
    if normalized.is_nan() {
        0.0
    } else {
        normalized.clamp(0.0, 1.0)
    }
}
