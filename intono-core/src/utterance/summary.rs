//! Robust per-utterance pitch: lower median of the voiced samples.
//!
//! The median shrugs off the occasional octave error from the estimator,
//! which would drag a mean far from the sung note.

use std::time::Duration;

use tracing::warn;

use super::Utterance;
use crate::ipc::events::UtteranceResult;
use crate::pitch::map_note;

/// Element at index `n / 2` of the ascending-sorted samples.
///
/// Always one of the inputs, never interpolated. `None` for no samples.
pub fn representative_frequency(pitches: &[f32]) -> Option<f32> {
    if pitches.is_empty() {
        return None;
    }
    let mut sorted = pitches.to_vec();
    sorted.sort_by(f32::total_cmp);
    Some(sorted[sorted.len() / 2])
}

/// Summarize a finished utterance into a result carrying `sequence_id`.
///
/// Returns `None` when the utterance has no voiced samples.
pub fn summarize(
    utterance: &Utterance,
    sequence_id: u64,
    end_tick: u64,
    ended_at: Duration,
) -> Option<UtteranceResult> {
    let hz = representative_frequency(utterance.pitches())?;
    let note = match map_note(hz) {
        Ok(note) => note,
        Err(e) => {
            warn!(error = %e, "representative frequency could not be mapped to a note");
            return None;
        }
    };

    Some(UtteranceResult {
        sequence_id,
        representative_frequency_hz: hz,
        pitch_class: note.pitch_class,
        octave: note.octave,
        cents_offset: note.cents,
        voiced_samples: utterance.len(),
        window: utterance.window(end_tick, ended_at),
    })
}
