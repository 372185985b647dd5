//! Live-device host that drives a tap from a dedicated audio thread

use super::{AudioFormat, SampleEncoding, SpectrumTap};
use crate::error::{Result, TapError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Commands sent to the audio thread
enum HostCommand {
    Stop,
}

/// Runs a cpal input stream and pushes every callback buffer through a tap.
///
/// The cpal stream is not `Send`, so it lives on its own thread; this handle
/// only keeps the command channel and the shared tap.
pub struct CaptureHost {
    command_tx: mpsc::Sender<HostCommand>,
    thread_handle: Option<JoinHandle<()>>,
    tap: Arc<Mutex<SpectrumTap>>,
}

impl CaptureHost {
    /// Open `device_name` (or the default input device) and start feeding `tap`.
    pub fn start(tap: Arc<Mutex<SpectrumTap>>, device_name: Option<String>) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let tap_clone = tap.clone();

        let thread_handle = thread::Builder::new()
            .name("spectrum-audio".to_string())
            .spawn(move || {
                if let Err(e) = run_audio_thread(device_name, command_rx, tap_clone, &ready_tx) {
                    log::error!("Audio thread error: {}", e);
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| TapError::ThreadSpawn(e.to_string()))?;

        let mut host = Self {
            command_tx,
            thread_handle: Some(thread_handle),
            tap,
        };

        // Surface device errors to the caller instead of only logging them
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(host),
            Ok(Err(e)) => {
                host.stop();
                Err(e)
            }
            Err(_) => {
                host.stop();
                Err(TapError::ThreadSpawn("audio thread exited early".to_string()))
            }
        }
    }

    pub fn tap(&self) -> &Arc<Mutex<SpectrumTap>> {
        &self.tap
    }

    /// Stop the stream, signal end of stream to the tap and join the thread.
    pub fn stop(&mut self) {
        let _ = self.command_tx.send(HostCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureHost {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a cpal sample format onto the encodings the tap negotiates over.
fn encoding_for(format: SampleFormat) -> Option<SampleEncoding> {
    match format {
        SampleFormat::I8 => Some(SampleEncoding::Pcm8),
        SampleFormat::I16 => Some(SampleEncoding::Pcm16),
        SampleFormat::I32 => Some(SampleEncoding::Pcm32),
        SampleFormat::F32 => Some(SampleEncoding::Float),
        _ => None,
    }
}

fn find_input_device(host: &cpal::Host, device_name: Option<&str>) -> Result<Device> {
    match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| TapError::Device(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| TapError::Device(format!("Input device not found: {}", name))),
        None => host
            .default_input_device()
            .ok_or_else(|| TapError::Device("No input device found".to_string())),
    }
}

fn run_audio_thread(
    device_name: Option<String>,
    command_rx: mpsc::Receiver<HostCommand>,
    tap: Arc<Mutex<SpectrumTap>>,
    ready_tx: &mpsc::Sender<Result<()>>,
) -> Result<()> {
    let host = cpal::default_host();
    let device = find_input_device(&host, device_name.as_deref())?;
    let config = device
        .default_input_config()
        .map_err(|e| TapError::Device(e.to_string()))?;

    let sample_format = config.sample_format();
    let encoding = encoding_for(sample_format).ok_or_else(|| {
        TapError::Device(format!("Unsupported sample format: {:?}", sample_format))
    })?;
    let format = AudioFormat::new(encoding, config.channels(), config.sample_rate().0);

    log::info!(
        "Capturing from {} ({})",
        device.name().unwrap_or_else(|_| "Unknown".to_string()),
        format
    );

    if !tap.lock().configure(format).is_accepted() {
        log::warn!("Tap bypassed for {}; audio still flows", format);
    }

    let stream_config: StreamConfig = config.into();
    let stream = match sample_format {
        SampleFormat::I8 => build_stream::<i8>(&device, &stream_config, tap.clone()),
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, tap.clone()),
        SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, tap.clone()),
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, tap.clone()),
        other => {
            return Err(TapError::Device(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| TapError::Device(e.to_string()))?;

    stream.play().map_err(|e| TapError::Device(e.to_string()))?;
    log::info!("Audio capture started");
    let _ = ready_tx.send(Ok(()));

    // Block until told to stop; the stream callback does the work
    match command_rx.recv() {
        Ok(HostCommand::Stop) => log::info!("Audio capture stopping"),
        Err(_) => log::info!("Audio capture channel disconnected"),
    }
    drop(stream);

    let mut tap = tap.lock();
    tap.queue_end_of_stream();
    while !tap.is_ended() {
        tap.take_output();
    }

    Ok(())
}

/// Samples that can be written back out as interleaved little-endian PCM
trait PcmSample: cpal::SizedSample + Send + 'static {
    fn extend_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_pcm_sample {
    ($($t:ty),*) => {
        $(impl PcmSample for $t {
            fn extend_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        })*
    };
}

impl_pcm_sample!(i8, i16, i32, f32);

fn interleaved_bytes<T: PcmSample>(data: &[T]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(data));
    for &sample in data {
        sample.extend_le(&mut bytes);
    }
    bytes
}

/// Build the input stream for a given sample type
fn build_stream<T: PcmSample>(
    device: &Device,
    config: &StreamConfig,
    tap: Arc<Mutex<SpectrumTap>>,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut tap = tap.lock();
            tap.queue_input(interleaved_bytes(data));
            // No downstream sink here: the forwarded buffer is simply released
            while !tap.take_output().is_empty() {}
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )
}
