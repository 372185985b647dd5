//! Spectrum Tap Library
//!
//! A transparent audio-graph stage: every buffer is forwarded untouched,
//! while a mono downmix of the same samples is windowed, transformed and
//! folded into a small set of log-scaled bands that are published to a
//! listener at a bounded rate.

pub mod audio;
pub mod error;
pub mod state;

pub use audio::{
    AnalyzerConfig, AudioFormat, ConsumerThread, Dispatcher, FrequencyBands, InlineDispatcher,
    ListenerHandle, Negotiation, SampleEncoding, SpectrumAnalyzer, SpectrumListener, SpectrumTap,
    TokioDispatcher,
};
pub use error::TapError;
pub use state::TapState;
