//! Fundamental-frequency estimation and note naming.
//!
//! The `PitchEstimator` trait is the extensibility point for per-frame F0
//! estimation: `AutocorrelationEstimator` is the default, and anything else
//! that can turn a frame into a `PitchSample` plugs into the session without
//! touching the segmenter.

pub mod autocorr;
pub mod note;

pub use autocorr::AutocorrelationEstimator;
pub use note::{map_note, Note, NoteNaming, PitchClass};

use serde::{Deserialize, Serialize};

/// Per-frame pitch observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "hz")]
pub enum PitchSample {
    /// A periodic frame with fundamental frequency in Hz.
    Voiced(f32),
    /// Too quiet or no bounded period could be established.
    Unvoiced,
}

impl PitchSample {
    /// Frequency in Hz if voiced.
    pub fn frequency(self) -> Option<f32> {
        match self {
            PitchSample::Voiced(hz) => Some(hz),
            PitchSample::Unvoiced => None,
        }
    }

    pub fn is_voiced(self) -> bool {
        matches!(self, PitchSample::Voiced(_))
    }
}

/// How the autocorrelation curve is computed. Peak selection is identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    /// Direct O(n²) lagged dot products.
    #[default]
    Direct,
    /// Zero-padded FFT (requires the `fft` feature; otherwise falls back to `Direct`).
    Fft,
}

/// Trait for all per-frame pitch estimators.
///
/// Implementors may keep scratch buffers between calls, hence `&mut self`;
/// the result must depend only on the inputs.
pub trait PitchEstimator: Send + 'static {
    /// Estimate the fundamental frequency of `frame`.
    ///
    /// Never fails: every failure mode resolves to `PitchSample::Unvoiced`.
    fn estimate(&mut self, frame: &[f32], sample_rate: u32) -> PitchSample;
}
