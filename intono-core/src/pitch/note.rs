//! Frequency → equal-tempered note (A4 = 440 Hz, MIDI 69).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IntonoError, Result};

/// One of the twelve chromatic pitch classes, C through B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "B")]
    B,
}

const ENGLISH_LABELS: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const SOLFEGE_LABELS: [&str; 12] = [
    "Do", "Do#", "Ré", "Ré#", "Mi", "Fa", "Fa#", "Sol", "Sol#", "La", "La#", "Si",
];

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class for a semitone index; wraps with floor-mod so negative
    /// MIDI numbers map correctly.
    pub fn from_semitone(semitone: i32) -> Self {
        Self::ALL[semitone.rem_euclid(12) as usize]
    }

    /// Semitone index in `0..12`, C = 0.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self, naming: NoteNaming) -> &'static str {
        match naming {
            NoteNaming::English => ENGLISH_LABELS[self.index()],
            NoteNaming::Solfege => SOLFEGE_LABELS[self.index()],
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(NoteNaming::English))
    }
}

/// Label set used when rendering a pitch class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteNaming {
    /// C, C#, D … B
    #[default]
    English,
    /// Do, Do#, Ré … Si (fixed-do)
    Solfege,
}

/// Nearest equal-tempered note to a frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// MIDI note number (69 = A4). May be negative for sub-audio input.
    pub midi: i32,
    /// Signed deviation of the input from the tempered pitch, in cents (±50).
    pub cents: f32,
}

impl Note {
    /// Label with octave, e.g. `A4` or `La4`.
    pub fn name(&self, naming: NoteNaming) -> String {
        format!("{}{}", self.pitch_class.label(naming), self.octave)
    }
}

/// Map a frequency in Hz to the nearest note.
///
/// # Errors
/// `IntonoError::InvalidFrequency` if `frequency_hz` is not finite and > 0.
pub fn map_note(frequency_hz: f32) -> Result<Note> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(IntonoError::InvalidFrequency(frequency_hz));
    }

    let semitones = 12.0 * (f64::from(frequency_hz) / 440.0).log2();
    let offset = semitones.round();
    let midi = offset as i32 + 69;

    Ok(Note {
        pitch_class: PitchClass::from_semitone(midi),
        octave: midi.div_euclid(12) - 1,
        midi,
        cents: ((semitones - offset) * 100.0) as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn a_across_octaves() {
        for (hz, octave) in [(220.0, 3), (440.0, 4), (880.0, 5)] {
            let note = map_note(hz).expect("valid frequency");
            assert_eq!(note.pitch_class, PitchClass::A);
            assert_eq!(note.octave, octave);
        }
        assert_eq!(map_note(440.0).expect("valid").midi, 69);
    }

    #[test]
    fn middle_c_and_neighbours() {
        let c4 = map_note(261.63).expect("valid");
        assert_eq!((c4.pitch_class, c4.octave, c4.midi), (PitchClass::C, 4, 60));

        let b3 = map_note(246.94).expect("valid");
        assert_eq!((b3.pitch_class, b3.octave), (PitchClass::B, 3));

        let fs2 = map_note(92.5).expect("valid");
        assert_eq!((fs2.pitch_class, fs2.octave), (PitchClass::FSharp, 2));
    }

    #[test]
    fn rounds_to_nearest_semitone() {
        // 450 Hz is ~+39 cents above A4
        let note = map_note(450.0).expect("valid");
        assert_eq!(note.pitch_class, PitchClass::A);
        assert_abs_diff_eq!(note.cents, 38.9, epsilon = 0.5);

        // 460 Hz is closer to A#4
        let note = map_note(460.0).expect("valid");
        assert_eq!(note.pitch_class, PitchClass::ASharp);
        assert!(note.cents < 0.0);
    }

    #[test]
    fn negative_midi_uses_floor_mod() {
        // 4 Hz → 12·log2(4/440) ≈ −81.4 → midi −12 → C, octave −2
        let note = map_note(4.0).expect("valid");
        assert_eq!(note.midi, -12);
        assert_eq!(note.pitch_class, PitchClass::C);
        assert_eq!(note.octave, -2);

        // 5.15 Hz → offset −77 → midi −8 → E, octave −2
        let note = map_note(5.15).expect("valid");
        assert_eq!(note.midi, -8);
        assert_eq!(note.pitch_class, PitchClass::E);
        assert_eq!(note.octave, -2);
    }

    #[test]
    fn rejects_non_positive_and_non_finite() {
        for hz in [0.0, -440.0, f32::NAN, f32::INFINITY] {
            assert!(
                matches!(map_note(hz), Err(IntonoError::InvalidFrequency(_))),
                "{hz} should be rejected"
            );
        }
    }

    #[test]
    fn labels_in_both_namings() {
        assert_eq!(PitchClass::A.label(NoteNaming::English), "A");
        assert_eq!(PitchClass::A.label(NoteNaming::Solfege), "La");
        assert_eq!(PitchClass::DSharp.label(NoteNaming::Solfege), "Ré#");
        let note = map_note(261.63).expect("valid");
        assert_eq!(note.name(NoteNaming::English), "C4");
        assert_eq!(note.name(NoteNaming::Solfege), "Do4");
    }

    #[test]
    fn pitch_class_serializes_as_label() {
        let json = serde_json::to_value(PitchClass::CSharp).expect("serialize");
        assert_eq!(json, "C#");
        let back: PitchClass = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, PitchClass::CSharp);
    }

    #[test]
    fn from_semitone_wraps() {
        assert_eq!(PitchClass::from_semitone(-1), PitchClass::B);
        assert_eq!(PitchClass::from_semitone(12), PitchClass::C);
        assert_eq!(PitchClass::from_semitone(69), PitchClass::A);
    }
}
