//! Microphone capture via cpal.
//!
//! The input callback runs on an OS audio thread at elevated priority and
//! must not allocate per call, block, or perform I/O. It converts and
//! downmixes into a reused scratch buffer and pushes the result into the
//! SPSC ring producer, whose `push_slice` is lock-free.
//!
//! `cpal::Stream` is `!Send` on most platforms, so `AudioCapture` must be
//! created and dropped on the same thread (the engine does both inside
//! `spawn_blocking`).

pub mod device;

use std::sync::{atomic::AtomicBool, Arc};

#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

use crate::{
    buffering::AudioProducer,
    error::{IntonoError, Result},
};

/// Handle to an active capture stream. Dropping it closes the device.
pub struct AudioCapture {
    #[cfg(feature = "audio-cpal")]
    _stream: cpal::Stream,
    /// Sample rate reported by the device (Hz).
    pub sample_rate: u32,
    pub device_name: String,
}

/// Average interleaved `channels`-wide frames of `data` into mono `out`.
///
/// `out` is resized to the frame count; a trailing partial frame is ignored.
pub fn downmix_into<T, F>(data: &[T], channels: usize, out: &mut Vec<f32>, convert: F)
where
    T: Copy,
    F: Fn(T) -> f32,
{
    let ch = channels.max(1);
    let frames = data.len() / ch;
    out.resize(frames, 0.0);
    if ch == 1 {
        for (dst, &src) in out.iter_mut().zip(data) {
            *dst = convert(src);
        }
        return;
    }
    for (dst, frame) in out.iter_mut().zip(data.chunks_exact(ch)) {
        let sum: f32 = frame.iter().map(|&s| convert(s)).sum();
        *dst = sum / ch as f32;
    }
}

#[cfg(feature = "audio-cpal")]
impl AudioCapture {
    /// Open the input device named `preferred_device_name`, falling back to
    /// the default input device and then to the first available one.
    ///
    /// Must be called from the thread that will also drop this value.
    pub fn open_with_preference(
        producer: AudioProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
        use cpal::SampleFormat;

        let host = cpal::default_host();
        let device = select_device(&host, preferred_device_name)?;
        let device_name = device.name().unwrap_or_default();

        let supported = device
            .default_input_config()
            .map_err(|e| IntonoError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(
            device = device_name.as_str(),
            sample_rate,
            channels,
            format = ?supported.sample_format(),
            "opening input device"
        );

        let config = supported.config();
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_mono_stream::<f32>(&device, &config, producer, running),
            SampleFormat::I16 => build_mono_stream::<i16>(&device, &config, producer, running),
            SampleFormat::I32 => build_mono_stream::<i32>(&device, &config, producer, running),
            SampleFormat::U8 => build_mono_stream::<u8>(&device, &config, producer, running),
            SampleFormat::U16 => build_mono_stream::<u16>(&device, &config, producer, running),
            fmt => Err(IntonoError::AudioStream(format!(
                "unsupported sample format: {fmt:?}"
            ))),
        }?;

        stream
            .play()
            .map_err(|e| IntonoError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            sample_rate,
            device_name,
        })
    }
}

#[cfg(feature = "audio-cpal")]
fn select_device(
    host: &cpal::Host,
    preferred_name: Option<&str>,
) -> Result<cpal::Device> {
    use cpal::traits::{DeviceTrait, HostTrait};

    if let Some(preferred) = preferred_name {
        match host.input_devices() {
            Ok(mut devices) => {
                if let Some(found) =
                    devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false))
                {
                    return Ok(found);
                }
                warn!(preferred, "preferred input device not found, falling back");
            }
            Err(e) => warn!("failed to list input devices while resolving preference: {e}"),
        }
    }

    if let Some(default) = host.default_input_device() {
        return Ok(default);
    }

    let mut devices = host
        .input_devices()
        .map_err(|e| IntonoError::AudioDevice(e.to_string()))?;
    let fallback = devices.next().ok_or(IntonoError::NoDefaultInputDevice)?;
    warn!("no default input device, using first available input");
    Ok(fallback)
}

/// Build an input stream for sample type `T` that pushes mono f32 into `producer`.
#[cfg(feature = "audio-cpal")]
fn build_mono_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: AudioProducer,
    running: Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;
    use cpal::Sample;

    use crate::buffering::Producer;

    let channels = config.channels as usize;
    let mut mono: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _info| {
                if !running.load(std::sync::atomic::Ordering::Relaxed) {
                    return;
                }
                downmix_into(data, channels, &mut mono, |s: T| s.to_sample::<f32>());
                let written = producer.push_slice(&mono);
                if written < mono.len() {
                    warn!(dropped = mono.len() - written, "ring buffer full");
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| IntonoError::AudioStream(e.to_string()))
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _producer: AudioProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(IntonoError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}
