//! Utterance segmentation and summarization.
//!
//! ## States
//!
//! ```text
//! Idle ──(volume > T)──► Capturing ──(volume ≤ T)──► TrailingSilence
//!  ▲                         ▲                              │
//!  │                         └─────────(volume > T)─────────┤
//!  └────────────(quiet for longer than D: finalize)─────────┘
//!
//! stop: any state → Idle, the open utterance is discarded
//! ```
//!
//! Only volume drives the transitions. Pitch only decides whether a loud
//! tick contributes a sample.

pub mod segmenter;
pub mod summary;

pub use segmenter::{Observation, UtteranceSegmenter};
pub use summary::{representative_frequency, summarize};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ipc::events::{RecordingWindow, UtteranceResult};
use crate::pitch::PitchSample;

/// Externally visible segmenter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtteranceState {
    Idle,
    Capturing,
    #[serde(rename = "trailing")]
    TrailingSilence,
}

/// Voiced pitch samples collected since onset.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pitches: Vec<f32>,
    started_at: Duration,
    start_tick: u64,
}

impl Utterance {
    pub fn new(started_at: Duration, start_tick: u64) -> Self {
        Self {
            pitches: Vec::new(),
            started_at,
            start_tick,
        }
    }

    /// Append a sample if it is voiced with a usable frequency.
    ///
    /// Returns whether the sample was kept.
    pub fn push(&mut self, sample: PitchSample) -> bool {
        match sample {
            PitchSample::Voiced(hz) if hz.is_finite() && hz > 0.0 => {
                self.pitches.push(hz);
                true
            }
            _ => false,
        }
    }

    /// Voiced frequencies in arrival order.
    pub fn pitches(&self) -> &[f32] {
        &self.pitches
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn started_at(&self) -> Duration {
        self.started_at
    }

    pub fn start_tick(&self) -> u64 {
        self.start_tick
    }

    /// Window from onset to `end_tick` / `ended_at`.
    pub fn window(&self, end_tick: u64, ended_at: Duration) -> RecordingWindow {
        RecordingWindow {
            start_tick: self.start_tick,
            end_tick,
            start_ms: self.started_at.as_millis() as u64,
            end_ms: ended_at.as_millis() as u64,
        }
    }
}

/// Why an utterance ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropReason {
    /// Silence confirmed but no tick was voiced.
    Empty,
    /// Capture was stopped while the utterance was open.
    Aborted,
}

/// Output of a segmenter tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmenterEvent {
    /// `Idle → Capturing`: a new utterance opened on `start_tick`.
    Started {
        start_tick: u64,
        started_at: Duration,
    },
    /// Silence confirmed and the utterance produced a result.
    Finalized(UtteranceResult),
    /// The utterance ended without a result. No sequence id was consumed.
    Dropped {
        reason: DropReason,
        window: RecordingWindow,
    },
}
