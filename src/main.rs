//! Capture from an input device and print the published spectrum as bars.
//!
//! Usage: `spectrum-tap [config.json]`; set `SPECTRUM_TAP_DEVICE` to pick an
//! input device by name. Press Enter to stop.

use parking_lot::Mutex;
use spectrum_tap::audio::CaptureHost;
use spectrum_tap::{AnalyzerConfig, ConsumerThread, FrequencyBands, SpectrumTap, TapError};
use std::path::Path;
use std::sync::Arc;

const BAR_GLYPHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn render_bars(bands: &[f32]) -> String {
    bands
        .iter()
        .map(|&b| {
            let level = (b.clamp(0.0, 1.0) * (BAR_GLYPHS.len() - 1) as f32).round() as usize;
            BAR_GLYPHS[level]
        })
        .collect()
}

fn main() -> Result<(), TapError> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => AnalyzerConfig::from_json_file(Path::new(&path))?,
        None => AnalyzerConfig::default(),
    };
    log::info!("Analyzer config: {:?}", config);

    let dispatcher = Arc::new(ConsumerThread::spawn()?);
    let tap = SpectrumTap::new(config, dispatcher)?;
    tap.attach_listener(|bands: FrequencyBands| {
        println!("|{}|", render_bars(&bands));
    });

    let mut host = CaptureHost::start(
        Arc::new(Mutex::new(tap)),
        std::env::var("SPECTRUM_TAP_DEVICE").ok(),
    )?;

    let mut line = String::new();
    if let Err(e) = std::io::stdin().read_line(&mut line) {
        log::warn!("Failed to read stdin: {}", e);
    }

    host.stop();

    let mut tap = host.tap().lock();
    log::info!(
        "Stopped after {} windows ({} published)",
        tap.analyzer().windows_filled(),
        tap.analyzer().analyses()
    );
    tap.reset();
    Ok(())
}
