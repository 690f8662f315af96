//! `IntonoEngine`: top-level lifecycle controller for live capture.
//!
//! ## Lifecycle
//!
//! ```text
//! IntonoEngine::new(config)        → config validated, status = Idle
//!     └─► start()                  → audio open, pipeline spawned, status = Listening
//!         └─► stop()               → running=false, open utterance discarded,
//!                                    worker joined, status = Stopped
//! ```
//!
//! `start()` while running returns `AlreadyRunning`; `stop()` while stopped
//! returns `NotRunning`.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS, so `AudioCapture` is created
//! inside the `spawn_blocking` closure and dropped there. A sync channel
//! carries the open result (and the device sample rate) back to `start()`.
//! A second channel, never sent on, disconnects when the worker returns;
//! `stop()` and `start()` wait on it so two pipelines never share the
//! broadcast senders.

pub mod pipeline;
pub mod session;

pub use session::{Session, TickReport};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    audio::AudioCapture,
    buffering::create_audio_ring,
    error::{IntonoError, Result},
    ipc::events::{
        AudioActivityEvent, EngineStatus, EngineStatusEvent, RecordingEvent, UtteranceResult,
    },
    pitch::{
        autocorr::{DEFAULT_MIN_RMS, DEFAULT_TRIM_THRESHOLD},
        CorrelationMethod,
    },
    utterance::segmenter::DEFAULT_SILENCE_DELAY,
    vad::energy::DEFAULT_VOLUME_THRESHOLD,
};

/// Broadcast channel capacity per event stream.
const BROADCAST_CAP: usize = 256;

/// Upper bound on waiting for a previous pipeline worker to return.
const WORKER_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Analysis window length in samples.
pub const DEFAULT_FRAME_LEN: usize = 2_048;

/// Tick period; one frame is analysed per tick.
pub const DEFAULT_TICK_MS: u64 = 16;

/// Configuration for `IntonoEngine` and offline sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// RMS above which a tick counts as speech. Default: 0.02.
    pub volume_threshold: f32,
    /// Silence needed to close an utterance. Default: 1000.
    pub silence_delay_ms: u64,
    /// Frames quieter than this are never analysed for pitch. Default: 0.01.
    pub min_rms: f32,
    /// Edge-trim amplitude for the estimator. Default: 0.2.
    pub trim_threshold: f32,
    /// Samples per analysis frame. Default: 2048.
    pub frame_len: usize,
    /// Tick period in milliseconds. Default: 16.
    pub tick_ms: u64,
    pub correlation: CorrelationMethod,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            silence_delay_ms: DEFAULT_SILENCE_DELAY.as_millis() as u64,
            min_rms: DEFAULT_MIN_RMS,
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
            frame_len: DEFAULT_FRAME_LEN,
            tick_ms: DEFAULT_TICK_MS,
            correlation: CorrelationMethod::Direct,
        }
    }
}

impl EngineConfig {
    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f32| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(IntonoError::InvalidConfig(format!(
                    "{name} must be finite and > 0 (got {v})"
                )))
            }
        };
        positive("volumeThreshold", self.volume_threshold)?;
        positive("minRms", self.min_rms)?;
        positive("trimThreshold", self.trim_threshold)?;

        if self.frame_len < 2 {
            return Err(IntonoError::InvalidConfig(format!(
                "frameLen must be at least 2 samples (got {})",
                self.frame_len
            )));
        }
        if self.tick_ms == 0 {
            return Err(IntonoError::InvalidConfig("tickMs must be > 0".into()));
        }
        Ok(())
    }

    pub fn silence_delay(&self) -> Duration {
        Duration::from_millis(self.silence_delay_ms)
    }

    /// New samples consumed per tick at `sample_rate`. Never zero.
    pub fn hop_samples(&self, sample_rate: u32) -> usize {
        ((sample_rate as u64 * self.tick_ms) / 1_000).max(1) as usize
    }
}

/// The top-level engine handle.
///
/// `Send + Sync`; wrap in `Arc` to share with event-forwarding tasks.
pub struct IntonoEngine {
    config: EngineConfig,
    /// `true` while capture + pipeline are active.
    running: Arc<AtomicBool>,
    /// Disconnects when the current pipeline worker has returned.
    worker_exit: Mutex<Option<mpsc::Receiver<()>>>,
    status: Arc<Mutex<EngineStatus>>,
    utterance_tx: broadcast::Sender<UtteranceResult>,
    recording_tx: broadcast::Sender<RecordingEvent>,
    activity_tx: broadcast::Sender<AudioActivityEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl IntonoEngine {
    /// Create a new engine. Does not start capturing.
    ///
    /// # Errors
    /// `IntonoError::InvalidConfig` when `config` fails validation.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let (utterance_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (recording_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            worker_exit: Mutex::new(None),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            utterance_tx,
            recording_tx,
            activity_tx,
            status_tx,
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start capture on the default input device.
    pub fn start(&self) -> Result<()> {
        self.start_with_device(None)
    }

    /// Start capture, preferring the input device named `preferred_input_device`.
    ///
    /// Blocks until the device is confirmed open (or fails). Must be called
    /// from within a Tokio runtime.
    ///
    /// # Errors
    /// - `IntonoError::AlreadyRunning` if already started.
    /// - `IntonoError::NoDefaultInputDevice` / `AudioDevice` / `AudioStream` on device error.
    pub fn start_with_device(&self, preferred_input_device: Option<String>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IntonoError::AlreadyRunning);
        }
        self.wait_for_worker();

        self.diagnostics.reset();

        let (producer, consumer) = create_audio_ring();

        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let utterance_tx = self.utterance_tx.clone();
        let recording_tx = self.recording_tx.clone();
        let activity_tx = self.activity_tx.clone();
        let diagnostics = Arc::clone(&self.diagnostics);

        let (open_tx, open_rx) = mpsc::channel::<Result<u32>>();
        let (exit_tx, exit_rx) = mpsc::channel::<()>();
        *self.worker_exit.lock() = Some(exit_rx);

        tokio::task::spawn_blocking(move || {
            let _exit = exit_tx;
            // cpal::Stream is !Send: open and drop it on this thread.
            let capture = match AudioCapture::open_with_preference(
                producer,
                Arc::clone(&running),
                preferred_input_device.as_deref(),
            ) {
                Ok(c) => c,
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            let session = match Session::new(&config, capture.sample_rate) {
                Ok(s) => s,
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };
            let _ = open_tx.send(Ok(capture.sample_rate));

            pipeline::run(pipeline::PipelineContext {
                config,
                session,
                consumer,
                running,
                utterance_tx,
                recording_tx,
                activity_tx,
                diagnostics,
            });

            drop(capture);
        });

        match open_rx.recv() {
            Ok(Ok(sample_rate)) => {
                self.set_status(EngineStatus::Listening, None);
                info!(sample_rate, "engine started, listening");
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                error!(error = %e, "engine failed to start");
                self.set_status(EngineStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Error, Some("pipeline failed to start".into()));
                Err(IntonoError::Other(anyhow::anyhow!(
                    "pipeline task died unexpectedly"
                )))
            }
        }
    }

    /// Stop capture. Any open utterance is discarded without a result.
    ///
    /// # Errors
    /// `IntonoError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(IntonoError::NotRunning);
        }
        info!("engine stop requested");
        self.wait_for_worker();
        self.set_status(EngineStatus::Stopped, None);
        Ok(())
    }

    /// Block until the last spawned pipeline worker has returned.
    fn wait_for_worker(&self) {
        let Some(exit_rx) = self.worker_exit.lock().take() else {
            return;
        };
        if let Err(mpsc::RecvTimeoutError::Timeout) = exit_rx.recv_timeout(WORKER_EXIT_TIMEOUT) {
            warn!(
                timeout_ms = WORKER_EXIT_TIMEOUT.as_millis() as u64,
                "pipeline worker did not exit in time"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    pub fn subscribe_utterances(&self) -> broadcast::Receiver<UtteranceResult> {
        self.utterance_tx.subscribe()
    }

    /// Start/finish/discard notifications for raw-audio recorders.
    pub fn subscribe_recordings(&self) -> broadcast::Receiver<RecordingEvent> {
        self.recording_tx.subscribe()
    }

    /// Per-tick level, pitch and segmenter state.
    pub fn subscribe_activity(&self) -> broadcast::Receiver<AudioActivityEvent> {
        self.activity_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn pipeline_diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}
