//! Blocking pipeline loop.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Drain up to one hop of samples from the ring into the FrameBuffer
//! 2. Once a full hop has arrived and the window is primed, snapshot an AudioFrame
//! 3. Session::tick → volume, pitch, segmenter state, optional event
//! 4. Broadcast AudioActivityEvent every tick
//! 5. Started   → RecordingEvent::Started, open the utterance span
//!    Finalized → RecordingEvent::Finished + UtteranceResult
//!    Dropped   → RecordingEvent::Discarded
//! 6. On stop, abort any open utterance
//! ```
//!
//! Time is the sample clock (samples consumed / sample rate), so a given
//! input always yields the same ticks regardless of scheduling.
//!
//! The loop runs in `spawn_blocking`, keeping the Tokio executor free for I/O.

use std::sync::OnceLock;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, warn, Span};

use super::{session::TickReport, EngineConfig, Session};
use crate::{
    buffering::{frame::FrameBuffer, AudioConsumer},
    ipc::events::{AudioActivityEvent, RecordingEvent, UtteranceResult},
    utterance::SegmenterEvent,
};

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub samples_in: AtomicUsize,
    pub ticks: AtomicUsize,
    pub voiced_ticks: AtomicUsize,
    pub tick_errors: AtomicUsize,
    pub utterances_started: AtomicUsize,
    pub utterances_emitted: AtomicUsize,
    pub utterances_dropped: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.samples_in.store(0, Ordering::Relaxed);
        self.ticks.store(0, Ordering::Relaxed);
        self.voiced_ticks.store(0, Ordering::Relaxed);
        self.tick_errors.store(0, Ordering::Relaxed);
        self.utterances_started.store(0, Ordering::Relaxed);
        self.utterances_emitted.store(0, Ordering::Relaxed);
        self.utterances_dropped.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            samples_in: self.samples_in.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            voiced_ticks: self.voiced_ticks.load(Ordering::Relaxed),
            tick_errors: self.tick_errors.load(Ordering::Relaxed),
            utterances_started: self.utterances_started.load(Ordering::Relaxed),
            utterances_emitted: self.utterances_emitted.load(Ordering::Relaxed),
            utterances_dropped: self.utterances_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub samples_in: usize,
    pub ticks: usize,
    pub voiced_ticks: usize,
    pub tick_errors: usize,
    pub utterances_started: usize,
    pub utterances_emitted: usize,
    pub utterances_dropped: usize,
}

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub session: Session,
    pub consumer: AudioConsumer,
    pub running: Arc<AtomicBool>,
    pub utterance_tx: broadcast::Sender<UtteranceResult>,
    pub recording_tx: broadcast::Sender<RecordingEvent>,
    pub activity_tx: broadcast::Sender<AudioActivityEvent>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Minimum sleep when the ring is empty (avoids busy-wait burning a core).
const DEFAULT_SLEEP_EMPTY_MS: u64 = 5;

/// Ticks between periodic level logs.
const LEVEL_LOG_EVERY: u64 = 50;

/// Run the blocking pipeline until `ctx.running` becomes false.
pub fn run(mut ctx: PipelineContext) {
    let sample_rate = ctx.session.sample_rate();
    let hop = ctx.config.hop_samples(sample_rate);
    info!(
        sample_rate,
        frame_len = ctx.session.frame_len(),
        hop,
        "pipeline started"
    );

    let mut window = FrameBuffer::new(ctx.session.frame_len(), sample_rate);
    let mut scratch = Vec::with_capacity(hop);
    // Samples received since the last tick boundary.
    let mut pending = 0usize;
    let mut consumed = 0u64;
    let mut utterance_span: Option<Span> = None;

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        let n = window.fill_from(&mut ctx.consumer, &mut scratch, hop - pending);
        if n == 0 {
            std::thread::sleep(Duration::from_millis(empty_sleep_ms()));
            continue;
        }

        ctx.diagnostics.samples_in.fetch_add(n, Ordering::Relaxed);
        consumed += n as u64;
        pending += n;
        if pending < hop {
            continue;
        }
        pending = 0;
        if !window.is_primed() {
            continue;
        }

        let now = sample_clock(consumed, sample_rate);
        let frame = window.frame();
        match ctx.session.tick(&frame, now, false) {
            Ok(report) => handle_report(&ctx, report, &mut utterance_span),
            Err(e) => {
                ctx.diagnostics.tick_errors.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "tick failed");
            }
        }
    }

    if let Some(event) = ctx.session.stop(sample_clock(consumed, sample_rate)) {
        dispatch_event(&ctx, event, &mut utterance_span);
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        samples_in = snap.samples_in,
        ticks = snap.ticks,
        voiced_ticks = snap.voiced_ticks,
        tick_errors = snap.tick_errors,
        utterances_started = snap.utterances_started,
        utterances_emitted = snap.utterances_emitted,
        utterances_dropped = snap.utterances_dropped,
        "pipeline stopped, diagnostics"
    );
}

/// Elapsed session time for `samples` at `sample_rate`.
pub fn sample_clock(samples: u64, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(samples as f64 / sample_rate as f64)
}

fn handle_report(ctx: &PipelineContext, report: TickReport, span: &mut Option<Span>) {
    ctx.diagnostics.ticks.fetch_add(1, Ordering::Relaxed);
    if report.pitch.is_voiced() {
        ctx.diagnostics.voiced_ticks.fetch_add(1, Ordering::Relaxed);
    }

    let _ = ctx.activity_tx.send(AudioActivityEvent {
        seq: report.tick,
        rms: report.volume,
        pitch_hz: report.pitch.frequency(),
        state: report.state,
    });

    if report.tick % LEVEL_LOG_EVERY == 0 {
        debug!(
            tick = report.tick,
            rms = format_args!("{:.4}", report.volume),
            pitch_hz = ?report.pitch.frequency(),
            state = ?report.state,
            "audio level check"
        );
    }

    if let Some(event) = report.event {
        dispatch_event(ctx, event, span);
    }
}

fn dispatch_event(ctx: &PipelineContext, event: SegmenterEvent, span: &mut Option<Span>) {
    match event {
        SegmenterEvent::Started {
            start_tick,
            started_at,
        } => {
            ctx.diagnostics
                .utterances_started
                .fetch_add(1, Ordering::Relaxed);
            let utterance = info_span!(
                "utterance",
                start_tick,
                sample_rate = ctx.session.sample_rate(),
            );
            utterance.in_scope(|| debug!("recording window opened"));
            *span = Some(utterance);
            let _ = ctx.recording_tx.send(RecordingEvent::Started {
                start_tick,
                start_ms: started_at.as_millis() as u64,
            });
        }
        SegmenterEvent::Finalized(result) => {
            ctx.diagnostics
                .utterances_emitted
                .fetch_add(1, Ordering::Relaxed);
            if let Some(s) = span.take() {
                let _enter = s.enter();
                debug!(
                    sequence_id = result.sequence_id,
                    end_tick = result.window.end_tick,
                    "recording window closed"
                );
            }
            let _ = ctx.recording_tx.send(RecordingEvent::Finished {
                sequence_id: result.sequence_id,
                window: result.window,
            });
            if ctx.utterance_tx.send(result).is_err() {
                debug!("no utterance subscribers");
            }
        }
        SegmenterEvent::Dropped { reason, window } => {
            ctx.diagnostics
                .utterances_dropped
                .fetch_add(1, Ordering::Relaxed);
            if let Some(s) = span.take() {
                let _enter = s.enter();
                warn!(?reason, end_tick = window.end_tick, "recording window discarded");
            }
            let _ = ctx
                .recording_tx
                .send(RecordingEvent::Discarded { reason, window });
        }
    }
}

fn empty_sleep_ms() -> u64 {
    static EMPTY_SLEEP_MS: OnceLock<u64> = OnceLock::new();
    *EMPTY_SLEEP_MS.get_or_init(|| {
        std::env::var("INTONO_PIPELINE_EMPTY_SLEEP_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.clamp(1, 20))
            .unwrap_or(DEFAULT_SLEEP_EMPTY_MS)
    })
}
