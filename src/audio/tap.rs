//! Passthrough stage that feeds the spectrum analyzer

use super::{
    AnalyzerConfig, AudioFormat, Dispatcher, ListenerHandle, Negotiation, SpectrumAnalyzer,
    SpectrumListener,
};
use crate::error::Result;
use crate::state::TapState;
use std::sync::Arc;

/// Audio graph stage that forwards every buffer untouched and, while a
/// listener is attached, analyses a mono downmix of what passes through.
///
/// All methods except the listener ones are called from the audio thread.
/// Attaching and detaching go through a shared [`ListenerHandle`] and may
/// happen from any thread.
pub struct SpectrumTap {
    format: Option<AudioFormat>,
    analyzer: SpectrumAnalyzer,
    listener: ListenerHandle,
    dispatcher: Arc<dyn Dispatcher>,

    // Last queued buffer, until the host collects it
    output: Option<Vec<u8>>,
    input_ended: bool,
}

impl SpectrumTap {
    pub fn new(config: AnalyzerConfig, dispatcher: Arc<dyn Dispatcher>) -> Result<Self> {
        Ok(Self {
            format: None,
            analyzer: SpectrumAnalyzer::new(config)?,
            listener: ListenerHandle::new(),
            dispatcher,
            output: None,
            input_ended: false,
        })
    }

    /// Offer an input format.
    ///
    /// Anything but 16-bit signed or 32-bit float PCM is refused and leaves
    /// the tap in pure passthrough until a supported format is configured.
    pub fn configure(&mut self, format: AudioFormat) -> Negotiation {
        if !format.is_usable() {
            if self.format.take().is_some() {
                self.analyzer.clear();
            }
            log::warn!("Spectrum tap cannot handle {}, bypassing", format);
            return Negotiation::Unsupported;
        }

        if self.format != Some(format) {
            // Samples of the old format must not share a window with the new one
            self.analyzer.clear();
            log::info!("Spectrum tap configured for {}", format);
        }
        self.format = Some(format);
        Negotiation::Accepted(format)
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Whether incoming buffers are analysed. Polled once per buffer.
    pub fn is_active(&self) -> bool {
        self.format.is_some() && self.listener.is_attached() && !self.input_ended
    }

    pub fn state(&self) -> TapState {
        if self.input_ended {
            TapState::Ended
        } else if self.format.is_none() {
            TapState::Unconfigured
        } else if self.listener.is_attached() {
            TapState::Active
        } else {
            TapState::Configured
        }
    }

    pub fn analyzer(&self) -> &SpectrumAnalyzer {
        &self.analyzer
    }

    /// Clone of the listener slot for the consumer side.
    pub fn listener_handle(&self) -> ListenerHandle {
        self.listener.clone()
    }

    pub fn attach_listener<L>(&self, listener: L)
    where
        L: SpectrumListener + 'static,
    {
        self.listener.attach(listener);
    }

    pub fn detach_listener(&self) {
        self.listener.detach();
    }

    /// Accept one interleaved buffer. It replaces the output slot exactly as
    /// given; when active, its complete frames are also downmixed into the
    /// analysis window.
    pub fn queue_input(&mut self, buffer: Vec<u8>) {
        if let Some(format) = self.format.filter(|_| self.is_active()) {
            let analyzer = &mut self.analyzer;
            let listener = &self.listener;
            let dispatcher = self.dispatcher.as_ref();

            format.for_each_mono(&buffer, |sample| {
                if let Some(bands) = analyzer.push_sample(sample) {
                    listener.deliver_via(dispatcher, bands);
                }
            });
        }

        // An uncollected buffer is overwritten, never stacked
        self.output = (!buffer.is_empty()).then_some(buffer);
    }

    /// The forwarded buffer, or an empty one if nothing is pending.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.output.take().unwrap_or_default()
    }

    /// `queue_input` followed by `take_output`: returns `buffer` itself.
    pub fn process(&mut self, buffer: Vec<u8>) -> Vec<u8> {
        self.queue_input(buffer);
        self.take_output()
    }

    pub fn queue_end_of_stream(&mut self) {
        self.input_ended = true;
    }

    /// End of stream was queued and every forwarded buffer has been taken.
    pub fn is_ended(&self) -> bool {
        self.input_ended && self.output.is_none()
    }

    /// Discontinuity: drop pending output, the window contents and the
    /// rate limiter clock. The accepted format and listener are kept.
    pub fn flush(&mut self) {
        self.output = None;
        self.input_ended = false;
        self.analyzer.clear();
    }

    /// `flush`, then forget the format and detach the listener.
    pub fn reset(&mut self) {
        self.flush();
        self.format = None;
        self.listener.detach();
        log::debug!("Spectrum tap reset");
    }
}
