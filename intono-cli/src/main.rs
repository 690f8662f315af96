//! `intono` command-line front end.
//!
//! ```text
//! intono analyze take.wav [--json] [--clips DIR] [--naming solfege]
//! intono listen [--device NAME] [--events] [--save]
//! intono devices [--json]
//! ```
//!
//! Results go to stdout (one line or one JSON object per utterance); logs go
//! to stderr, filtered by `RUST_LOG` (default `intono=info`).

mod analyze;
mod commands;
mod settings;
mod wav;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use intono_core::CorrelationMethod;
use settings::{default_settings_path, load_settings, parse_naming, save_settings, CliSettings};
use tracing::{debug, info};

use crate::commands::OutputOptions;

#[derive(Debug, Parser)]
#[command(name = "intono", version, about = "Pitch detection and utterance segmentation")]
struct Cli {
    /// Settings file (JSON). Defaults to the user data directory.
    #[arg(long, global = true, env = "INTONO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Segment a WAV file into utterances and report each one's note.
    Analyze {
        input: PathBuf,
        /// Write each utterance as a 16-bit mono WAV into this directory.
        #[arg(long)]
        clips: Option<PathBuf>,
        #[command(flatten)]
        tuning: TuningArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Listen to a microphone until Ctrl-C.
    Listen {
        /// Input device name (see `intono devices`).
        #[arg(long)]
        device: Option<String>,
        /// Print every engine event as `{"channel", "payload"}` JSON lines.
        #[arg(long)]
        events: bool,
        #[command(flatten)]
        tuning: TuningArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List audio input devices.
    Devices {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct TuningArgs {
    /// RMS above which a frame counts as speech.
    #[arg(long)]
    volume_threshold: Option<f32>,
    /// Silence (ms) that closes an utterance.
    #[arg(long)]
    silence_delay_ms: Option<u64>,
    #[arg(long, value_enum)]
    correlation: Option<CorrelationArg>,
    /// Write the effective settings back to the settings file.
    #[arg(long)]
    save: bool,
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Print one JSON object per utterance.
    #[arg(long)]
    json: bool,
    /// Note names: english (C, D, ...) or solfege (Do, Ré, ...).
    #[arg(long)]
    naming: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CorrelationArg {
    Direct,
    Fft,
}

impl From<CorrelationArg> for CorrelationMethod {
    fn from(arg: CorrelationArg) -> Self {
        match arg {
            CorrelationArg::Direct => CorrelationMethod::Direct,
            CorrelationArg::Fft => CorrelationMethod::Fft,
        }
    }
}

impl TuningArgs {
    fn apply(&self, settings: &mut CliSettings) {
        if let Some(v) = self.volume_threshold {
            settings.volume_threshold = v;
        }
        if let Some(v) = self.silence_delay_ms {
            settings.silence_delay_ms = v;
        }
        if let Some(c) = self.correlation {
            settings.correlation = c.into();
        }
        settings.normalize();
    }
}

impl OutputArgs {
    fn resolve(&self, settings: &CliSettings) -> Result<OutputOptions> {
        let naming = match self.naming.as_deref() {
            Some(raw) => parse_naming(raw)
                .ok_or_else(|| anyhow!("unknown note naming '{raw}' (expected english or solfege)"))?,
            None => settings.naming,
        };
        Ok(OutputOptions {
            json: self.json,
            naming,
        })
    }
}

/// Persist `settings` with the resolved note naming.
fn persist_settings(path: &Path, settings: &mut CliSettings, output: OutputOptions) -> Result<()> {
    settings.naming = output.naming;
    save_settings(path, settings)
        .with_context(|| format!("failed to save settings to {}", path.display()))?;
    info!(path = %path.display(), "settings saved");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("intono=info")),
        )
        .init();

    let cli = Cli::parse();

    let settings_path = cli.config.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    settings.apply_env_overrides();
    debug!(path = %settings_path.display(), ?settings, "settings loaded");

    match cli.command {
        Command::Analyze {
            input,
            clips,
            tuning,
            output,
        } => {
            tuning.apply(&mut settings);
            let output = output.resolve(&settings)?;
            if tuning.save {
                persist_settings(&settings_path, &mut settings, output)?;
            }
            let clips_dir = commands::resolve_clips_dir(clips, settings.clips_dir.as_deref());
            commands::run_analyze(
                &input,
                &settings.engine_config(),
                output,
                clips_dir.as_deref(),
            )
        }
        Command::Listen {
            device,
            events,
            tuning,
            output,
        } => {
            tuning.apply(&mut settings);
            let output = output.resolve(&settings)?;
            let device = device.or_else(|| settings.preferred_input_device.clone());
            if tuning.save {
                settings.preferred_input_device = device.clone();
                persist_settings(&settings_path, &mut settings, output)?;
            }
            info!(device = ?device, "starting live capture");
            commands::run_listen(settings.engine_config(), device, output, events).await
        }
        Command::Devices { json } => commands::run_devices(json),
    }
}
