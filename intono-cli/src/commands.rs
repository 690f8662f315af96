//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use intono_core::{
    audio::device::{list_input_devices, DeviceInfo},
    ipc::events::{ACTIVITY_CHANNEL, RECORDING_CHANNEL, STATUS_CHANNEL, UTTERANCE_CHANNEL},
    EngineConfig, IntonoEngine, NoteNaming, RecordingEvent, UtteranceResult,
};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analyze::analyze;
use crate::wav::{clip_path, read_mono, write_clip};

/// Output options shared by `analyze` and `listen`.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub naming: NoteNaming,
}

/// One console line per utterance, e.g.
/// `#1  A4    440.0 Hz   +0.0 ct  0.19s..1.40s  (42 voiced)`.
pub fn format_result(result: &UtteranceResult, naming: NoteNaming) -> String {
    format!(
        "#{:<3} {:<5} {:>7.1} Hz {:>+6.1} ct  {:.2}s..{:.2}s  ({} voiced)",
        result.sequence_id,
        result.note_name(naming),
        result.representative_frequency_hz,
        result.cents_offset,
        result.window.start_ms as f64 / 1_000.0,
        result.window.end_ms as f64 / 1_000.0,
        result.voiced_samples,
    )
}

fn print_result(result: &UtteranceResult, output: OutputOptions) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        println!("{}", format_result(result, output.naming));
    }
    Ok(())
}

/// One `{"channel": ..., "payload": ...}` line for `listen --events`.
pub fn event_line<T: Serialize>(channel: &str, payload: &T) -> Result<String> {
    Ok(serde_json::to_string(&serde_json::json!({
        "channel": channel,
        "payload": payload,
    }))?)
}

/// Print every event from `rx` as an `event_line` until the engine is dropped.
fn forward_events<T>(mut rx: broadcast::Receiver<T>, channel: &'static str) -> JoinHandle<()>
where
    T: Clone + Serialize + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event_line(channel, &event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(channel, "failed to serialize event: {e}"),
                },
                Err(RecvError::Lagged(n)) => warn!(channel, "receiver lagged by {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Decode `input`, run it through a session and print every utterance.
pub fn run_analyze(
    input: &Path,
    config: &EngineConfig,
    output: OutputOptions,
    clips_dir: Option<&Path>,
) -> Result<()> {
    let signal = read_mono(input)?;
    info!(
        path = %input.display(),
        sample_rate = signal.sample_rate,
        seconds = format_args!("{:.2}", signal.duration_secs()),
        "analyzing"
    );

    let analysis = analyze(&signal.samples, signal.sample_rate, config)
        .with_context(|| format!("failed to analyze {}", input.display()))?;

    if let Some(dir) = clips_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create clip directory {}", dir.display()))?;
    }
    let stamp = Utc::now();

    for result in &analysis.utterances {
        print_result(result, output)?;
        if let Some(dir) = clips_dir {
            let path = clip_path(dir, result, output.naming, stamp);
            let clip = signal.slice_window(&result.window, config.frame_len);
            write_clip(&path, clip, signal.sample_rate)?;
            info!(path = %path.display(), sequence_id = result.sequence_id, "clip written");
        }
    }

    info!(
        utterances = analysis.utterances.len(),
        dropped = analysis.dropped.len(),
        ticks = analysis.ticks,
        "analysis complete"
    );
    Ok(())
}

/// Run the live engine until Ctrl-C.
///
/// With `events`, every channel is printed as tagged JSON lines instead of
/// the per-utterance output.
pub async fn run_listen(
    config: EngineConfig,
    device: Option<String>,
    output: OutputOptions,
    events: bool,
) -> Result<()> {
    let engine = Arc::new(IntonoEngine::new(config)?);

    let forwarders = if events {
        vec![
            forward_events(engine.subscribe_utterances(), UTTERANCE_CHANNEL),
            forward_events(engine.subscribe_recordings(), RECORDING_CHANNEL),
            forward_events(engine.subscribe_activity(), ACTIVITY_CHANNEL),
            forward_events(engine.subscribe_status(), STATUS_CHANNEL),
        ]
    } else {
        spawn_console_printers(&engine, output)
    };

    let starter = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || starter.start_with_device(device))
        .await
        .context("engine start task panicked")??;

    eprintln!("listening; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;

    engine.stop()?;
    let diag = engine.pipeline_diagnostics_snapshot();
    info!(
        ticks = diag.ticks,
        utterances = diag.utterances_emitted,
        dropped = diag.utterances_dropped,
        "engine stopped"
    );
    // Dropping the engine closes the channels; let the forwarders drain.
    drop(engine);
    for task in forwarders {
        if tokio::time::timeout(Duration::from_secs(1), task).await.is_err() {
            warn!("event forwarder did not finish after stop");
        }
    }
    Ok(())
}

fn spawn_console_printers(engine: &IntonoEngine, output: OutputOptions) -> Vec<JoinHandle<()>> {
    let mut utterance_rx = engine.subscribe_utterances();
    let printer = tokio::spawn(async move {
        loop {
            match utterance_rx.recv().await {
                Ok(result) => {
                    if let Err(e) = print_result(&result, output) {
                        warn!("failed to print utterance: {e}");
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("utterance receiver lagged by {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut recording_rx = engine.subscribe_recordings();
    let recordings = tokio::spawn(async move {
        loop {
            match recording_rx.recv().await {
                Ok(RecordingEvent::Started { start_ms, .. }) => {
                    tracing::debug!(start_ms, "listening to utterance");
                }
                Ok(RecordingEvent::Discarded { reason, .. }) => {
                    tracing::debug!(?reason, "utterance discarded");
                }
                Ok(RecordingEvent::Finished { .. }) => {}
                Err(RecvError::Lagged(n)) => warn!("recording receiver lagged by {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut status_rx = engine.subscribe_status();
    let status = tokio::spawn(async move {
        while let Ok(event) = status_rx.recv().await {
            info!(status = ?event.status, detail = ?event.detail, "engine status");
        }
    });

    vec![printer, recordings, status]
}

pub fn format_device(device: &DeviceInfo) -> String {
    let mut flags = Vec::new();
    if device.is_recommended {
        flags.push("recommended");
    }
    if device.is_default {
        flags.push("default");
    }
    if flags.is_empty() {
        device.name.clone()
    } else {
        format!("{} [{}]", device.name, flags.join(", "))
    }
}

pub fn run_devices(json: bool) -> Result<()> {
    let devices = list_input_devices();
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        eprintln!("no input devices found");
    }
    for device in &devices {
        println!("{}", format_device(device));
    }
    Ok(())
}

/// Clip directory from the flag, falling back to the settings file.
pub fn resolve_clips_dir(flag: Option<PathBuf>, from_settings: Option<&Path>) -> Option<PathBuf> {
    flag.or_else(|| from_settings.map(Path::to_path_buf))
}
