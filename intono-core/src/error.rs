use thiserror::Error;

/// All errors produced by intono-core.
#[derive(Debug, Error)]
pub enum IntonoError {
    #[error("invalid frequency: {0} Hz (must be finite and > 0)")]
    InvalidFrequency(f32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "frame mismatch: expected {expected_len} samples @ {expected_rate} Hz, \
         got {actual_len} samples @ {actual_rate} Hz"
    )]
    FrameMismatch {
        expected_len: usize,
        actual_len: usize,
        expected_rate: u32,
        actual_rate: u32,
    },

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IntonoError>;
