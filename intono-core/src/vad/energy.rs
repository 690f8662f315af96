//! Energy-based VAD: a plain RMS threshold.
//!
//! A frame is `Speech` when its RMS is strictly above `threshold`. Short
//! pauses are bridged by the segmenter's time-based grace window, not here,
//! so this detector is stateless.

use super::{VadDecision, VoiceActivityDetector};

/// Default RMS threshold, in the same units as the estimator's `min_rms`.
pub const DEFAULT_VOLUME_THRESHOLD: f32 = 0.02;

/// A simple energy-based voice activity detector.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    /// RMS amplitude threshold. Frames above this are considered speech.
    /// Typical range: 0.01 to 0.05 depending on microphone gain.
    threshold: f32,
}

impl EnergyVad {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME_THRESHOLD)
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn classify(&mut self, volume: f32) -> VadDecision {
        if volume > self.threshold {
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }
}
