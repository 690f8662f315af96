//! Event types emitted to front ends.
//!
//! ## Channel names
//!
//! | Event | Channel |
//! |-------|---------|
//! | `UtteranceResult` | `"intono://utterance"` |
//! | `RecordingEvent` | `"intono://recording"` |
//! | `AudioActivityEvent` | `"intono://activity"` |
//! | `EngineStatusEvent` | `"intono://status"` |

use serde::{Deserialize, Serialize};

use crate::pitch::{NoteNaming, PitchClass};
use crate::utterance::{DropReason, UtteranceState};

pub const UTTERANCE_CHANNEL: &str = "intono://utterance";
pub const RECORDING_CHANNEL: &str = "intono://recording";
pub const ACTIVITY_CHANNEL: &str = "intono://activity";
pub const STATUS_CHANNEL: &str = "intono://status";

// ---------------------------------------------------------------------------
// Utterance results
// ---------------------------------------------------------------------------

/// One recognized utterance. Emitted at most once per utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceResult {
    /// Dense, strictly increasing, starting at 1. Only successful
    /// utterances consume an id.
    pub sequence_id: u64,
    /// Lower median of the voiced samples; always an observed value.
    pub representative_frequency_hz: f32,
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Deviation of the representative frequency from the tempered note.
    pub cents_offset: f32,
    /// Number of voiced ticks aggregated.
    pub voiced_samples: usize,
    /// Onset-to-finalize span, for collaborators recording raw audio.
    pub window: RecordingWindow,
}

impl UtteranceResult {
    /// Note label with octave, e.g. `A4` / `La4`.
    pub fn note_name(&self, naming: NoteNaming) -> String {
        format!("{}{}", self.pitch_class.label(naming), self.octave)
    }
}

/// Tick and time span of an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingWindow {
    pub start_tick: u64,
    pub end_tick: u64,
    /// Session time of the onset tick, in milliseconds.
    pub start_ms: u64,
    /// Session time of the closing tick, in milliseconds.
    pub end_ms: u64,
}

// ---------------------------------------------------------------------------
// Recording window notifications
// ---------------------------------------------------------------------------

/// Lets a collaborator capture raw audio coincident with an utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordingEvent {
    /// An utterance opened; start buffering.
    #[serde(rename_all = "camelCase")]
    Started { start_tick: u64, start_ms: u64 },
    /// The utterance produced result `sequence_id`; keep `window`.
    #[serde(rename_all = "camelCase")]
    Finished {
        sequence_id: u64,
        window: RecordingWindow,
    },
    /// The utterance ended without a result; throw the audio away.
    #[serde(rename_all = "camelCase")]
    Discarded {
        reason: DropReason,
        window: RecordingWindow,
    },
}

// ---------------------------------------------------------------------------
// Audio activity events
// ---------------------------------------------------------------------------

/// Emitted on channel `"intono://activity"` once per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioActivityEvent {
    /// Tick index within the session.
    pub seq: u64,
    /// Root-mean-square level of the frame.
    pub rms: f32,
    /// Frame pitch, if voiced.
    pub pitch_hz: Option<f32>,
    /// Segmenter state after this tick.
    pub state: UtteranceState,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted on channel `"intono://status"` when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Capturing audio and segmenting utterances.
    Listening,
    /// Capture stopped; engine may be restarted.
    Stopped,
    /// Unrecoverable error; restart required.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> RecordingWindow {
        RecordingWindow {
            start_tick: 12,
            end_tick: 90,
            start_ms: 192,
            end_ms: 1_440,
        }
    }

    #[test]
    fn utterance_result_serializes_with_camel_case_and_note_label() {
        let result = UtteranceResult {
            sequence_id: 3,
            representative_frequency_hz: 220.5,
            pitch_class: PitchClass::A,
            octave: 3,
            cents_offset: 3.9,
            voiced_samples: 42,
            window: window(),
        };

        let json = serde_json::to_value(&result).expect("serialize utterance result");
        assert_eq!(json["sequenceId"], 3);
        assert_eq!(json["pitchClass"], "A");
        assert_eq!(json["octave"], 3);
        assert_eq!(json["voicedSamples"], 42);
        assert_eq!(json["window"]["startTick"], 12);
        let hz = json["representativeFrequencyHz"]
            .as_f64()
            .expect("frequency should serialize as number");
        assert!((hz - 220.5).abs() < 1e-5);

        let round_trip: UtteranceResult =
            serde_json::from_value(json).expect("deserialize utterance result");
        assert_eq!(round_trip, result);
        assert_eq!(round_trip.note_name(NoteNaming::English), "A3");
        assert_eq!(round_trip.note_name(NoteNaming::Solfege), "La3");
    }

    #[test]
    fn recording_events_are_tagged_by_kind() {
        let started = RecordingEvent::Started {
            start_tick: 12,
            start_ms: 192,
        };
        let json = serde_json::to_value(&started).expect("serialize started");
        assert_eq!(json["kind"], "started");
        assert_eq!(json["startTick"], 12);

        let discarded = RecordingEvent::Discarded {
            reason: DropReason::Aborted,
            window: window(),
        };
        let json = serde_json::to_value(&discarded).expect("serialize discarded");
        assert_eq!(json["kind"], "discarded");
        assert_eq!(json["reason"], "aborted");
        assert_eq!(json["window"]["endMs"], 1_440);

        let finished = RecordingEvent::Finished {
            sequence_id: 1,
            window: window(),
        };
        let json = serde_json::to_value(&finished).expect("serialize finished");
        assert_eq!(json["sequenceId"], 1);
    }

    #[test]
    fn activity_event_serializes_state_and_optional_pitch() {
        let event = AudioActivityEvent {
            seq: 3,
            rms: 0.18,
            pitch_hz: None,
            state: UtteranceState::TrailingSilence,
        };
        let json = serde_json::to_value(&event).expect("serialize activity event");
        assert_eq!(json["seq"], 3);
        assert!(json["pitchHz"].is_null());
        assert_eq!(json["state"], "trailing");
    }

    #[test]
    fn engine_status_event_serializes_with_lowercase_status() {
        let event = EngineStatusEvent {
            status: EngineStatus::Listening,
            detail: Some("default input".into()),
        };
        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "listening");

        let round_trip: EngineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, EngineStatus::Listening);
        assert_eq!(round_trip.detail.as_deref(), Some("default input"));
    }

    #[test]
    fn engine_status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<EngineStatus>(r#""Listening""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
