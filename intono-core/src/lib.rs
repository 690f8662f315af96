//! # intono-core
//!
//! Real-time pitch detection and utterance segmentation for sung or spoken
//! input.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → AudioCapture → SPSC RingBuffer → Pipeline(spawn_blocking)
//!                                                    │
//!                                          FrameBuffer (rolling window)
//!                                                    │
//!                                 Session::tick → RMS + PitchEstimator
//!                                                    │
//!                                          UtteranceSegmenter
//!                                                    │
//!                                  broadcast::Sender<UtteranceResult>
//! ```
//!
//! The audio callback never allocates per call. All analysis happens in the
//! pipeline thread. Offline callers drive a `Session` directly.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod pitch;
pub mod utterance;
pub mod vad;

// Convenience re-exports for downstream crates
pub use buffering::frame::{AudioFrame, FrameBuffer};
pub use engine::{EngineConfig, IntonoEngine, Session, TickReport};
pub use error::IntonoError;
pub use ipc::events::{
    AudioActivityEvent, EngineStatus, EngineStatusEvent, RecordingEvent, RecordingWindow,
    UtteranceResult,
};
pub use pitch::{
    map_note, AutocorrelationEstimator, CorrelationMethod, Note, NoteNaming, PitchClass,
    PitchEstimator, PitchSample,
};
pub use utterance::{DropReason, SegmenterEvent, UtteranceSegmenter, UtteranceState};
