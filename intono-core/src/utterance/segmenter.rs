//! Energy-driven utterance segmenter.
//!
//! | From | Condition | To | Action |
//! |------|-----------|----|--------|
//! | Idle | speech | Capturing | open utterance, append if voiced |
//! | Capturing | speech | Capturing | append if voiced |
//! | Capturing | silence | TrailingSilence | start silence timer |
//! | TrailingSilence | speech | Capturing | cancel timer, append if voiced |
//! | TrailingSilence | silence longer than delay | Idle | summarize, emit |
//! | any | stop | Idle | discard |
//!
//! The grace window means a breath inside a phrase does not split it.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{summary::summarize, DropReason, SegmenterEvent, Utterance, UtteranceState};
use crate::pitch::PitchSample;
use crate::vad::{EnergyVad, VoiceActivityDetector};

/// Default silence required before an utterance is closed.
pub const DEFAULT_SILENCE_DELAY: Duration = Duration::from_millis(1_000);

/// One tick's worth of input to the segmenter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// RMS of the frame.
    pub volume: f32,
    pub pitch: PitchSample,
    /// Monotonic session time of this tick.
    pub at: Duration,
    /// Tick index within the session.
    pub tick: u64,
}

enum Phase {
    Idle,
    Capturing(Utterance),
    TrailingSilence { utterance: Utterance, since: Duration },
}

/// VAD state machine that turns a tick stream into utterance events.
///
/// Single owner, one tick at a time (`&mut self`).
pub struct UtteranceSegmenter {
    vad: Box<dyn VoiceActivityDetector>,
    silence_delay: Duration,
    phase: Phase,
    next_sequence_id: u64,
}

impl UtteranceSegmenter {
    pub fn new(volume_threshold: f32, silence_delay: Duration) -> Self {
        Self::with_detector(Box::new(EnergyVad::new(volume_threshold)), silence_delay)
    }

    /// Use a custom detector for the speech/silence decision.
    pub fn with_detector(vad: Box<dyn VoiceActivityDetector>, silence_delay: Duration) -> Self {
        Self {
            vad,
            silence_delay,
            phase: Phase::Idle,
            next_sequence_id: 1,
        }
    }

    pub fn state(&self) -> UtteranceState {
        match self.phase {
            Phase::Idle => UtteranceState::Idle,
            Phase::Capturing(_) => UtteranceState::Capturing,
            Phase::TrailingSilence { .. } => UtteranceState::TrailingSilence,
        }
    }

    /// Id the next successful utterance will carry. Starts at 1.
    pub fn next_sequence_id(&self) -> u64 {
        self.next_sequence_id
    }

    /// Voiced samples collected so far in the open utterance.
    pub fn open_samples(&self) -> usize {
        match &self.phase {
            Phase::Idle => 0,
            Phase::Capturing(u) | Phase::TrailingSilence { utterance: u, .. } => u.len(),
        }
    }

    /// Advance one tick. `stop` forces `Idle` and discards any open utterance.
    pub fn tick(&mut self, obs: Observation, stop: bool) -> Option<SegmenterEvent> {
        if stop {
            return self.abort(obs.tick, obs.at);
        }

        let speech = self.vad.classify(obs.volume).is_speech();
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);

        let (next, event) = match (phase, speech) {
            (Phase::Idle, false) => (Phase::Idle, None),
            (Phase::Idle, true) => {
                let mut utterance = Utterance::new(obs.at, obs.tick);
                utterance.push(obs.pitch);
                info!(tick = obs.tick, volume = obs.volume, "utterance started");
                let event = SegmenterEvent::Started {
                    start_tick: obs.tick,
                    started_at: obs.at,
                };
                (Phase::Capturing(utterance), Some(event))
            }
            (Phase::Capturing(mut utterance), true) => {
                utterance.push(obs.pitch);
                (Phase::Capturing(utterance), None)
            }
            (Phase::Capturing(utterance), false) => {
                debug!(tick = obs.tick, "silence started");
                let next = Phase::TrailingSilence {
                    utterance,
                    since: obs.at,
                };
                (next, None)
            }
            (Phase::TrailingSilence { mut utterance, .. }, true) => {
                debug!(tick = obs.tick, "speech resumed within grace window");
                utterance.push(obs.pitch);
                (Phase::Capturing(utterance), None)
            }
            (Phase::TrailingSilence { utterance, since }, false) => {
                if obs.at.saturating_sub(since) > self.silence_delay {
                    let event = self.finalize(&utterance, obs.tick, obs.at);
                    (Phase::Idle, Some(event))
                } else {
                    (Phase::TrailingSilence { utterance, since }, None)
                }
            }
        };

        self.phase = next;
        event
    }

    /// Force `Idle`, discarding any open utterance without a result.
    pub fn abort(&mut self, tick: u64, at: Duration) -> Option<SegmenterEvent> {
        self.vad.reset();
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => None,
            Phase::Capturing(utterance) | Phase::TrailingSilence { utterance, .. } => {
                info!(
                    start_tick = utterance.start_tick(),
                    voiced = utterance.len(),
                    "utterance aborted by stop signal"
                );
                Some(SegmenterEvent::Dropped {
                    reason: DropReason::Aborted,
                    window: utterance.window(tick, at),
                })
            }
        }
    }

    fn finalize(&mut self, utterance: &Utterance, tick: u64, at: Duration) -> SegmenterEvent {
        match summarize(utterance, self.next_sequence_id, tick, at) {
            Some(result) => {
                self.next_sequence_id += 1;
                info!(
                    sequence_id = result.sequence_id,
                    hz = format_args!("{:.1}", result.representative_frequency_hz),
                    pitch_class = %result.pitch_class,
                    octave = result.octave,
                    voiced = result.voiced_samples,
                    "utterance finalized"
                );
                SegmenterEvent::Finalized(result)
            }
            None => {
                warn!(
                    start_tick = utterance.start_tick(),
                    end_tick = tick,
                    "utterance had no voiced frames, dropped"
                );
                SegmenterEvent::Dropped {
                    reason: DropReason::Empty,
                    window: utterance.window(tick, at),
                }
            }
        }
    }
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new(
            crate::vad::energy::DEFAULT_VOLUME_THRESHOLD,
            DEFAULT_SILENCE_DELAY,
        )
    }
}
