//! WAV decoding for `analyze` and per-utterance clip writing.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use intono_core::{audio::downmix_into, NoteNaming, RecordingWindow, UtteranceResult};

/// Decoded mono signal.
#[derive(Debug, Clone)]
pub struct MonoSignal {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoSignal {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples covered by `window`, extended back by `pre_roll` samples so
    /// the clip includes the audio that filled the onset frame.
    pub fn slice_window(&self, window: &RecordingWindow, pre_roll: usize) -> &[f32] {
        let rate = u64::from(self.sample_rate);
        let to_index = |ms: u64| ((ms * rate) / 1_000).min(self.samples.len() as u64) as usize;
        let start = to_index(window.start_ms).saturating_sub(pre_roll);
        let end = to_index(window.end_ms).max(start);
        &self.samples[start..end]
    }
}

/// Read any PCM or float WAV and average its channels to mono f32.
pub fn read_mono(path: &Path) -> Result<MonoSignal> {
    let reader =
        WavReader::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        bail!("{}: invalid WAV header", path.display());
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("failed to decode {}", path.display()))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("failed to decode {}", path.display()))?
        }
    };

    let mut samples = Vec::new();
    downmix_into(&interleaved, spec.channels as usize, &mut samples, |s| s);
    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        frames = samples.len(),
        "decoded wav"
    );

    Ok(MonoSignal {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Write `samples` as a 16-bit mono WAV.
pub fn write_clip(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("failed to create {}", path.display()))?;
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// `<dir>/<stamp>-<seq>-<note>.wav`, e.g. `20261019T101500Z-0003-A4.wav`.
pub fn clip_path(
    dir: &Path,
    result: &UtteranceResult,
    naming: NoteNaming,
    stamp: DateTime<Utc>,
) -> PathBuf {
    let note = result.note_name(naming).replace('#', "s");
    dir.join(format!(
        "{}-{:04}-{}.wav",
        stamp.format("%Y%m%dT%H%M%SZ"),
        result.sequence_id,
        note
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;
    use intono_core::PitchClass;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("intono-wav-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    fn result(seq: u64, pitch_class: PitchClass, octave: i32) -> UtteranceResult {
        UtteranceResult {
            sequence_id: seq,
            representative_frequency_hz: 440.0,
            pitch_class,
            octave,
            cents_offset: 0.0,
            voiced_samples: 10,
            window: RecordingWindow {
                start_tick: 0,
                end_tick: 10,
                start_ms: 0,
                end_ms: 160,
            },
        }
    }

    #[test]
    fn reads_stereo_i16_as_averaged_mono() {
        let dir = scratch_dir("stereo");
        let path = dir.join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).expect("create");
        for (l, r) in [(16_384i16, 0i16), (-16_384, -16_384), (8_192, 8_192)] {
            writer.write_sample(l).expect("write");
            writer.write_sample(r).expect("write");
        }
        writer.finalize().expect("finalize");

        let signal = read_mono(&path).expect("decode");
        assert_eq!(signal.sample_rate, 8_000);
        assert_eq!(signal.samples.len(), 3);
        assert_abs_diff_eq!(signal.samples[0], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(signal.samples[1], -0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(signal.samples[2], 0.25, epsilon = 1e-6);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn reads_float_wav_unscaled() {
        let dir = scratch_dir("float");
        let path = dir.join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).expect("create");
        for s in [0.5f32, -0.125, 0.0] {
            writer.write_sample(s).expect("write");
        }
        writer.finalize().expect("finalize");

        let signal = read_mono(&path).expect("decode");
        assert_eq!(signal.samples, vec![0.5, -0.125, 0.0]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_mono(Path::new("/definitely/not/here.wav")).expect_err("must fail");
        assert!(err.to_string().contains("not/here.wav"));
    }

    #[test]
    fn clip_round_trips_at_16_bit() {
        let dir = scratch_dir("clip");
        let path = dir.join("clip.wav");
        write_clip(&path, &[0.5, -0.5, 2.0], 16_000).expect("write clip");

        let reader = WavReader::open(&path).expect("open clip");
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.spec().channels, 1);
        let signal = read_mono(&path).expect("decode clip");
        assert_eq!(signal.samples.len(), 3);
        assert_abs_diff_eq!(signal.samples[0], 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(signal.samples[1], -0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(signal.samples[2], 1.0, epsilon = 1e-3);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn slice_window_adds_pre_roll_and_clamps() {
        let signal = MonoSignal {
            samples: (0..1_000).map(|i| i as f32).collect(),
            sample_rate: 1_000,
        };
        let window = RecordingWindow {
            start_tick: 3,
            end_tick: 9,
            start_ms: 300,
            end_ms: 5_000,
        };
        let clip = signal.slice_window(&window, 100);
        assert_eq!(clip.first().copied(), Some(200.0));
        assert_eq!(clip.len(), 800);
    }

    #[test]
    fn clip_path_encodes_sequence_and_note() {
        let stamp = Utc.with_ymd_and_hms(2026, 10, 19, 10, 15, 0).unwrap();
        let path = clip_path(
            Path::new("/clips"),
            &result(3, PitchClass::ASharp, 4),
            NoteNaming::English,
            stamp,
        );
        assert_eq!(path, PathBuf::from("/clips/20261019T101500Z-0003-As4.wav"));

        let solfege = clip_path(
            Path::new("/clips"),
            &result(12, PitchClass::A, 3),
            NoteNaming::Solfege,
            stamp,
        );
        assert_eq!(solfege, PathBuf::from("/clips/20261019T101500Z-0012-La3.wav"));
    }
}
