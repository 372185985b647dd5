//! Tap lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a [`crate::audio::SpectrumTap`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TapState {
    /// No format accepted; pure passthrough.
    #[default]
    Unconfigured,

    /// A supported format is accepted but nobody is listening; pure passthrough.
    Configured,

    /// Format accepted and a listener attached; samples are accumulated.
    Active,

    /// End of stream queued.
    Ended,
}

impl TapState {
    /// True only when the tap pays for accumulation and analysis.
    pub fn is_analyzing(self) -> bool {
        self == TapState::Active
    }
}

impl fmt::Display for TapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TapState::Unconfigured => "unconfigured",
            TapState::Configured => "configured",
            TapState::Active => "active",
            TapState::Ended => "ended",
        };
        f.write_str(name)
    }
}
