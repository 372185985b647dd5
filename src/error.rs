//! Crate error type

use thiserror::Error;

/// Errors surfaced by analyzer construction, dispatchers and the capture host.
///
/// An unsupported input format is deliberately absent: that is a negotiated
/// outcome reported through [`crate::audio::Negotiation`], not a failure.
#[derive(Error, Debug)]
pub enum TapError {
    #[error("Invalid analyzer config: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    #[error("Thread error: {0}")]
    ThreadSpawn(String),

    #[error("No async runtime: {0}")]
    NoRuntime(String),

    #[error("Audio device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, TapError>;
