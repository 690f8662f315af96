//! Per-stream processing context.
//!
//! A `Session` owns one pitch estimator and one segmenter, and turns each
//! incoming `AudioFrame` into a `TickReport`. Frame length and sample rate are
//! fixed when the session is created; a frame that disagrees is rejected
//! before any state is touched.

use std::time::Duration;

use tracing::debug;

use super::EngineConfig;
use crate::{
    buffering::frame::AudioFrame,
    dsp::rms,
    error::{IntonoError, Result},
    pitch::{AutocorrelationEstimator, PitchEstimator, PitchSample},
    utterance::{Observation, SegmenterEvent, UtteranceSegmenter, UtteranceState},
};

/// What one tick observed and produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Index of this tick within the session, starting at 0.
    pub tick: u64,
    /// RMS of the frame.
    pub volume: f32,
    pub pitch: PitchSample,
    /// Segmenter state after the tick.
    pub state: UtteranceState,
    pub event: Option<SegmenterEvent>,
}

pub struct Session {
    estimator: Box<dyn PitchEstimator>,
    segmenter: UtteranceSegmenter,
    frame_len: usize,
    sample_rate: u32,
    tick: u64,
}

impl Session {
    /// Build a session with the default autocorrelation estimator.
    pub fn new(config: &EngineConfig, sample_rate: u32) -> Result<Self> {
        let estimator = AutocorrelationEstimator::new(config.min_rms, config.trim_threshold)
            .with_method(config.correlation);
        Self::with_estimator(config, sample_rate, Box::new(estimator))
    }

    pub fn with_estimator(
        config: &EngineConfig,
        sample_rate: u32,
        estimator: Box<dyn PitchEstimator>,
    ) -> Result<Self> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(IntonoError::InvalidConfig(
                "sample rate must be positive".into(),
            ));
        }

        Ok(Self {
            estimator,
            segmenter: UtteranceSegmenter::new(config.volume_threshold, config.silence_delay()),
            frame_len: config.frame_len,
            sample_rate,
            tick: 0,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of ticks processed so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn state(&self) -> UtteranceState {
        self.segmenter.state()
    }

    pub fn next_sequence_id(&self) -> u64 {
        self.segmenter.next_sequence_id()
    }

    /// Process one frame observed at session time `now`.
    ///
    /// With `stop` set, any open utterance is discarded and the session
    /// returns to `Idle`; the frame is still validated but not analysed.
    ///
    /// # Errors
    /// `IntonoError::FrameMismatch` if the frame length or rate differ from
    /// the session's.
    pub fn tick(&mut self, frame: &AudioFrame, now: Duration, stop: bool) -> Result<TickReport> {
        if frame.len() != self.frame_len || frame.sample_rate() != self.sample_rate {
            return Err(IntonoError::FrameMismatch {
                expected_len: self.frame_len,
                actual_len: frame.len(),
                expected_rate: self.sample_rate,
                actual_rate: frame.sample_rate(),
            });
        }

        let volume = rms(frame.samples());
        let pitch = if stop {
            PitchSample::Unvoiced
        } else {
            self.estimator.estimate(frame.samples(), self.sample_rate)
        };

        let tick = self.tick;
        self.tick += 1;

        let event = self.segmenter.tick(
            Observation {
                volume,
                pitch,
                at: now,
                tick,
            },
            stop,
        );

        Ok(TickReport {
            tick,
            volume,
            pitch,
            state: self.segmenter.state(),
            event,
        })
    }

    /// Abort without a frame, e.g. when the input stream ends.
    pub fn stop(&mut self, now: Duration) -> Option<SegmenterEvent> {
        debug!(tick = self.tick, "session stop");
        self.segmenter.abort(self.tick, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utterance::DropReason;

    const RATE: u32 = 48_000;

    /// Scripted estimator so state-machine tests don't depend on DSP accuracy.
    struct FixedPitch(PitchSample);

    impl PitchEstimator for FixedPitch {
        fn estimate(&mut self, _frame: &[f32], _sample_rate: u32) -> PitchSample {
            self.0
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            frame_len: 256,
            ..EngineConfig::default()
        }
    }

    fn loud() -> AudioFrame {
        AudioFrame::new(vec![0.3; 256], RATE)
    }

    fn quiet() -> AudioFrame {
        AudioFrame::new(vec![0.0; 256], RATE)
    }

    fn sine(freq: f32, len: usize) -> AudioFrame {
        let samples = (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / RATE as f32).sin())
            .collect();
        AudioFrame::new(samples, RATE)
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn rejects_frame_of_wrong_length_without_touching_state() {
        let mut session =
            Session::with_estimator(&config(), RATE, Box::new(FixedPitch(PitchSample::Unvoiced)))
                .expect("valid config");

        let err = session
            .tick(&AudioFrame::new(vec![0.3; 100], RATE), ms(0), false)
            .expect_err("short frame must be rejected");
        assert!(matches!(
            err,
            IntonoError::FrameMismatch {
                expected_len: 256,
                actual_len: 100,
                ..
            }
        ));
        assert_eq!(session.ticks(), 0);
        assert_eq!(session.state(), UtteranceState::Idle);
    }

    #[test]
    fn rejects_frame_of_wrong_rate() {
        let mut session = Session::new(&config(), RATE).expect("valid config");
        let err = session
            .tick(&AudioFrame::new(vec![0.0; 256], 44_100), ms(0), false)
            .expect_err("rate mismatch must be rejected");
        assert!(matches!(
            err,
            IntonoError::FrameMismatch {
                expected_rate: 48_000,
                actual_rate: 44_100,
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_sample_rate_and_invalid_config() {
        assert!(matches!(
            Session::new(&config(), 0),
            Err(IntonoError::InvalidConfig(_))
        ));
        let bad = EngineConfig {
            frame_len: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Session::new(&bad, RATE),
            Err(IntonoError::InvalidConfig(_))
        ));
    }

    #[test]
    fn loud_voiced_frames_then_silence_produce_one_result() {
        let mut session =
            Session::with_estimator(&config(), RATE, Box::new(FixedPitch(PitchSample::Voiced(440.0))))
                .expect("valid config");

        let first = session.tick(&loud(), ms(0), false).expect("tick");
        assert_eq!(first.tick, 0);
        assert_eq!(first.state, UtteranceState::Capturing);
        assert!(matches!(
            first.event,
            Some(SegmenterEvent::Started { start_tick: 0, .. })
        ));

        session.tick(&loud(), ms(16), false).expect("tick");
        let trailing = session.tick(&quiet(), ms(32), false).expect("tick");
        assert_eq!(trailing.state, UtteranceState::TrailingSilence);
        assert_eq!(trailing.volume, 0.0);

        let held = session.tick(&quiet(), ms(1_032), false).expect("tick");
        assert!(held.event.is_none(), "exactly D of silence must not finalize");

        let done = session.tick(&quiet(), ms(1_048), false).expect("tick");
        match done.event {
            Some(SegmenterEvent::Finalized(result)) => {
                assert_eq!(result.sequence_id, 1);
                assert_eq!(result.representative_frequency_hz, 440.0);
                assert_eq!(result.voiced_samples, 2);
                assert_eq!(result.window.start_tick, 0);
                assert_eq!(result.window.end_tick, 4);
            }
            other => panic!("expected finalized result, got {other:?}"),
        }
        assert_eq!(done.state, UtteranceState::Idle);
        assert_eq!(session.next_sequence_id(), 2);
    }

    #[test]
    fn stop_tick_discards_open_utterance() {
        let mut session =
            Session::with_estimator(&config(), RATE, Box::new(FixedPitch(PitchSample::Voiced(220.0))))
                .expect("valid config");
        session.tick(&loud(), ms(0), false).expect("tick");

        let report = session.tick(&loud(), ms(16), true).expect("tick");
        assert_eq!(report.pitch, PitchSample::Unvoiced);
        assert_eq!(report.state, UtteranceState::Idle);
        assert!(matches!(
            report.event,
            Some(SegmenterEvent::Dropped {
                reason: DropReason::Aborted,
                ..
            })
        ));
        assert_eq!(session.next_sequence_id(), 1);
    }

    #[test]
    fn stop_without_frame_aborts_and_is_noop_when_idle() {
        let mut session = Session::new(&config(), RATE).expect("valid config");
        assert!(session.stop(ms(0)).is_none());

        session.tick(&loud(), ms(0), false).expect("tick");
        assert!(matches!(
            session.stop(ms(16)),
            Some(SegmenterEvent::Dropped {
                reason: DropReason::Aborted,
                ..
            })
        ));
        assert_eq!(session.state(), UtteranceState::Idle);
    }

    #[test]
    fn default_estimator_reports_sine_pitch() {
        let cfg = EngineConfig::default();
        let mut session = Session::new(&cfg, RATE).expect("valid config");
        let report = session
            .tick(&sine(400.0, cfg.frame_len), ms(0), false)
            .expect("tick");
        let hz = report.pitch.frequency().expect("sine should be voiced");
        assert!((hz - 400.0).abs() <= 1.0, "got {hz}");
        assert!(report.volume > 0.3);
    }
}
