//! Voice Activity Detection (VAD) abstraction.
//!
//! The `VoiceActivityDetector` trait decides, per tick, whether the frame's
//! volume counts as voice. `EnergyVad` is the default; the utterance
//! segmenter owns one and layers the silence grace window on top.

pub mod energy;

pub use energy::EnergyVad;

/// Whether a given audio frame contains speech or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    /// The frame's energy is above threshold.
    Speech,
    /// The frame is at or below threshold.
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

/// Trait for all VAD implementations.
///
/// Implementors may be stateful (adaptive noise floors etc.).
pub trait VoiceActivityDetector: Send + 'static {
    /// Classify one tick from its RMS volume.
    fn classify(&mut self, volume: f32) -> VadDecision;

    /// Forget any state carried between ticks. Called when an open utterance
    /// is aborted, so the next session starts from silence.
    fn reset(&mut self) {}
}
