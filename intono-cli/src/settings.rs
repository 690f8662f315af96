//! Persistent CLI settings (JSON file in the user data directory).
//!
//! Precedence, lowest to highest: defaults, settings file, environment
//! (`INTONO_VOLUME_THRESHOLD`, `INTONO_SILENCE_DELAY_MS`), command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use intono_core::{CorrelationMethod, EngineConfig, NoteNaming};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_VOLUME_THRESHOLD: &str = "INTONO_VOLUME_THRESHOLD";
pub const ENV_SILENCE_DELAY_MS: &str = "INTONO_SILENCE_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CliSettings {
    pub preferred_input_device: Option<String>,
    pub naming: NoteNaming,
    pub volume_threshold: f32,
    pub silence_delay_ms: u64,
    pub min_rms: f32,
    pub trim_threshold: f32,
    pub frame_len: usize,
    pub tick_ms: u64,
    pub correlation: CorrelationMethod,
    /// Where `analyze --clips` writes when no directory is given on the command line.
    pub clips_dir: Option<PathBuf>,
}

impl Default for CliSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            preferred_input_device: None,
            naming: NoteNaming::English,
            volume_threshold: engine.volume_threshold,
            silence_delay_ms: engine.silence_delay_ms,
            min_rms: engine.min_rms,
            trim_threshold: engine.trim_threshold,
            frame_len: engine.frame_len,
            tick_ms: engine.tick_ms,
            correlation: engine.correlation,
            clips_dir: None,
        }
    }
}

impl CliSettings {
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        self.volume_threshold = clamp_or(self.volume_threshold, 0.001, 1.0, defaults.volume_threshold);
        self.min_rms = clamp_or(self.min_rms, 0.000_1, 0.5, defaults.min_rms);
        self.trim_threshold = clamp_or(self.trim_threshold, 0.01, 1.0, defaults.trim_threshold);
        self.silence_delay_ms = self.silence_delay_ms.clamp(50, 10_000);
        self.frame_len = self.frame_len.clamp(256, 16_384);
        self.tick_ms = self.tick_ms.clamp(1, 500);
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    /// Apply `INTONO_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; unparsable values are ignored with a warning.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_VOLUME_THRESHOLD) {
            match raw.trim().parse::<f32>() {
                Ok(v) => self.volume_threshold = v,
                Err(e) => warn!(var = ENV_VOLUME_THRESHOLD, value = %raw, "ignoring override: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_SILENCE_DELAY_MS) {
            match raw.trim().parse::<u64>() {
                Ok(v) => self.silence_delay_ms = v,
                Err(e) => warn!(var = ENV_SILENCE_DELAY_MS, value = %raw, "ignoring override: {e}"),
            }
        }
        self.normalize();
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            volume_threshold: self.volume_threshold,
            silence_delay_ms: self.silence_delay_ms,
            min_rms: self.min_rms,
            trim_threshold: self.trim_threshold,
            frame_len: self.frame_len,
            tick_ms: self.tick_ms,
            correlation: self.correlation,
        }
    }
}

fn clamp_or(v: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v.clamp(lo, hi)
    } else {
        fallback
    }
}

pub fn parse_naming(raw: &str) -> Option<NoteNaming> {
    match raw.trim().to_lowercase().as_str() {
        "english" | "en" | "letters" => Some(NoteNaming::English),
        "solfege" | "solfège" | "solfeggio" | "do" | "fixed-do" => Some(NoteNaming::Solfege),
        _ => None,
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Intono")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("intono")
            .join("settings.json")
    }
}

/// Load settings from `path`. A missing file yields defaults; a malformed
/// one yields defaults with a warning.
pub fn load_settings(path: &Path) -> CliSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<CliSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "malformed settings file, using defaults: {e}");
            CliSettings::default()
        }),
        Err(_) => CliSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &CliSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
