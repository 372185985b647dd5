//! Spectrum tap: passthrough audio stage plus the analysis behind it

mod capture;
mod dispatch;
mod fft;
mod format;
mod rate_limit;
mod tap;
mod window;

pub use capture::CaptureHost;
pub use dispatch::{
    ConsumerThread, Dispatcher, FrequencyBands, InlineDispatcher, Job, ListenerHandle,
    SpectrumListener, TokioDispatcher,
};
pub use fft::SpectrumAnalyzer;
pub use format::{AudioFormat, Negotiation, SampleEncoding};
pub use rate_limit::RateLimiter;
pub use tap::SpectrumTap;
pub use window::AnalysisWindow;

use crate::error::{Result, TapError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Analysis tuning.
///
/// `fft_size` and `band_count` are fixed for the lifetime of an analyzer.
/// The dB window and magnitude floor only shape how the bars look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// FFT window size (power of two)
    pub fft_size: usize,

    /// Number of output bands
    pub band_count: usize,

    /// Minimum time between two published spectra
    pub min_interval_ms: u64,

    /// Magnitudes below this are clamped before the dB conversion
    pub magnitude_floor: f32,

    /// dB value mapped to 0.0
    pub db_floor: f32,

    /// dB value mapped to 1.0
    pub db_ceiling: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 512,
            band_count: 32,
            min_interval_ms: 50,
            magnitude_floor: 1e-4,
            db_floor: -60.0,
            db_ceiling: 0.0,
        }
    }
}

impl AnalyzerConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Check the structural preconditions the FFT and band map rely on.
    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(TapError::InvalidConfig(format!(
                "fft_size must be a power of two >= 2, got {}",
                self.fft_size
            )));
        }
        if self.band_count == 0 || self.band_count > self.fft_size / 2 {
            return Err(TapError::InvalidConfig(format!(
                "band_count must be in 1..={}, got {}",
                self.fft_size / 2,
                self.band_count
            )));
        }
        if self.magnitude_floor.is_nan() || self.magnitude_floor <= 0.0 {
            return Err(TapError::InvalidConfig(format!(
                "magnitude_floor must be positive, got {}",
                self.magnitude_floor
            )));
        }
        if self.db_floor.is_nan() || self.db_ceiling.is_nan() || self.db_floor >= self.db_ceiling {
            return Err(TapError::InvalidConfig(format!(
                "db_floor ({}) must be below db_ceiling ({})",
                self.db_floor, self.db_ceiling
            )));
        }
        Ok(())
    }

    /// Parse a (possibly partial) JSON config; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TapError::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TapError::ConfigLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }
}
