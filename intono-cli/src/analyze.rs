//! Offline driver: feeds a decoded signal through a `Session` tick by tick.
//!
//! Ticks follow the same sample clock as the live pipeline. The signal is
//! padded with enough silence to let a phrase that runs to the end of the
//! file close normally instead of being aborted.

use std::time::Duration;

use intono_core::{
    engine::pipeline::sample_clock, DropReason, EngineConfig, FrameBuffer, IntonoError,
    RecordingWindow, SegmenterEvent, Session, UtteranceResult,
};
use tracing::debug;

#[derive(Debug, Default)]
pub struct Analysis {
    pub utterances: Vec<UtteranceResult>,
    pub dropped: Vec<(DropReason, RecordingWindow)>,
    pub ticks: u64,
}

/// Silence appended after the signal: one frame to flush the window, the
/// silence delay, and two hops of slack for tick granularity.
pub fn tail_padding(config: &EngineConfig, sample_rate: u32) -> usize {
    let delay = (config.silence_delay_ms * u64::from(sample_rate) / 1_000) as usize;
    config.frame_len + delay + 2 * config.hop_samples(sample_rate)
}

pub fn analyze(
    samples: &[f32],
    sample_rate: u32,
    config: &EngineConfig,
) -> Result<Analysis, IntonoError> {
    analyze_with(Session::new(config, sample_rate)?, samples, config)
}

/// Drive an already-built session over `samples`.
pub fn analyze_with(
    mut session: Session,
    samples: &[f32],
    config: &EngineConfig,
) -> Result<Analysis, IntonoError> {
    let sample_rate = session.sample_rate();
    let hop = config.hop_samples(sample_rate);
    let mut window = FrameBuffer::new(config.frame_len, sample_rate);

    let padded: Vec<f32> = samples
        .iter()
        .copied()
        .chain(std::iter::repeat(0.0).take(tail_padding(config, sample_rate)))
        .collect();

    let mut analysis = Analysis::default();
    let mut consumed = 0u64;
    let mut now = Duration::ZERO;

    for chunk in padded.chunks_exact(hop) {
        window.push(chunk);
        consumed += chunk.len() as u64;
        if !window.is_primed() {
            continue;
        }

        now = sample_clock(consumed, sample_rate);
        let report = session.tick(&window.frame(), now, false)?;
        match report.event {
            Some(SegmenterEvent::Started { start_tick, .. }) => {
                debug!(start_tick, "utterance opened");
            }
            Some(SegmenterEvent::Finalized(result)) => analysis.utterances.push(result),
            Some(SegmenterEvent::Dropped { reason, window }) => {
                analysis.dropped.push((reason, window));
            }
            None => {}
        }
    }

    if let Some(SegmenterEvent::Dropped { reason, window }) = session.stop(now) {
        analysis.dropped.push((reason, window));
    }
    analysis.ticks = session.ticks();
    Ok(analysis)
}
