use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use intono_core::buffering::{create_audio_ring, Producer};
use intono_core::engine::{pipeline, EngineConfig, Session};
use intono_core::{
    AudioActivityEvent, AudioFrame, PitchClass, PitchEstimator, PitchSample, RecordingEvent,
    SegmenterEvent, UtteranceResult, UtteranceState,
};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

const RATE: u32 = 48_000;

fn tone(freq: f32, secs: f32) -> Vec<f32> {
    let n = (RATE as f32 * secs) as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / RATE as f32).sin())
        .collect()
}

fn rest(secs: f32) -> Vec<f32> {
    vec![0.0; (RATE as f32 * secs) as usize]
}

fn recv_with_timeout<T: Clone>(rx: &mut broadcast::Receiver<T>, timeout: Duration) -> T {
    let start = Instant::now();
    loop {
        match rx.try_recv() {
            Ok(ev) => return ev,
            Err(TryRecvError::Empty) => {
                if start.elapsed() >= timeout {
                    panic!("timed out waiting for event");
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => panic!("channel closed unexpectedly"),
        }
    }
}

struct Run {
    utterances: Vec<UtteranceResult>,
    recordings: Vec<RecordingEvent>,
    activity: Vec<AudioActivityEvent>,
}

/// Feed `signal` through the ring and pipeline, collecting `expected` results.
fn run_pipeline(signal: &[f32], expected: usize) -> Run {
    let (mut producer, consumer) = create_audio_ring();
    assert_eq!(producer.push_slice(signal), signal.len(), "ring too small");

    let config = EngineConfig::default();
    let session = Session::new(&config, RATE).expect("valid config");
    let running = Arc::new(AtomicBool::new(true));
    let (utterance_tx, mut utterance_rx) = broadcast::channel(16);
    let (recording_tx, mut recording_rx) = broadcast::channel(16);
    let (activity_tx, mut activity_rx) = broadcast::channel(4_096);

    let ctx = pipeline::PipelineContext {
        config,
        session,
        consumer,
        running: Arc::clone(&running),
        utterance_tx,
        recording_tx,
        activity_tx,
        diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
    };
    let handle = thread::spawn(move || pipeline::run(ctx));

    let utterances = (0..expected)
        .map(|_| recv_with_timeout(&mut utterance_rx, Duration::from_secs(20)))
        .collect();

    running.store(false, Ordering::SeqCst);
    handle.join().expect("pipeline thread panicked");

    let mut recordings = Vec::new();
    while let Ok(ev) = recording_rx.try_recv() {
        recordings.push(ev);
    }
    let mut activity = Vec::new();
    while let Ok(ev) = activity_rx.try_recv() {
        activity.push(ev);
    }
    assert!(
        matches!(utterance_rx.try_recv(), Err(TryRecvError::Closed)),
        "more utterances than expected"
    );

    Run {
        utterances,
        recordings,
        activity,
    }
}

#[test]
fn breath_inside_phrase_does_not_split_and_ids_are_dense() {
    let mut signal = tone(400.0, 0.3);
    signal.extend(rest(0.3));
    signal.extend(tone(400.0, 0.3));
    signal.extend(rest(1.6));
    signal.extend(tone(200.0, 0.5));
    signal.extend(rest(1.6));

    let run = run_pipeline(&signal, 2);

    let first = &run.utterances[0];
    assert_eq!(first.sequence_id, 1);
    assert!((first.representative_frequency_hz - 400.0).abs() <= 1.0);
    assert_eq!((first.pitch_class, first.octave), (PitchClass::G, 4));

    let second = &run.utterances[1];
    assert_eq!(second.sequence_id, 2);
    assert!((second.representative_frequency_hz - 200.0).abs() <= 1.0);
    assert_eq!((second.pitch_class, second.octave), (PitchClass::G, 3));
    assert!(second.window.start_tick > first.window.end_tick);

    let kinds: Vec<&str> = run
        .recordings
        .iter()
        .map(|ev| match ev {
            RecordingEvent::Started { .. } => "started",
            RecordingEvent::Finished { .. } => "finished",
            RecordingEvent::Discarded { .. } => "discarded",
        })
        .collect();
    assert_eq!(kinds, ["started", "finished", "started", "finished"]);
}

#[test]
fn activity_stream_tracks_every_tick_in_order() {
    let mut signal = tone(800.0, 0.4);
    signal.extend(rest(1.5));

    let run = run_pipeline(&signal, 1);

    assert!(!run.activity.is_empty());
    for (idx, ev) in run.activity.iter().enumerate() {
        assert_eq!(ev.seq, idx as u64);
    }
    assert!(run
        .activity
        .iter()
        .any(|ev| ev.state == UtteranceState::Capturing && ev.pitch_hz.is_some()));
    assert!(run
        .activity
        .iter()
        .any(|ev| ev.state == UtteranceState::TrailingSilence));
    assert_eq!(
        run.activity.last().map(|ev| ev.state),
        Some(UtteranceState::Idle)
    );
}

/// Reports whatever it was built with, regardless of the frame.
struct ConstantEstimator(f32);

impl PitchEstimator for ConstantEstimator {
    fn estimate(&mut self, _frame: &[f32], _sample_rate: u32) -> PitchSample {
        PitchSample::Voiced(self.0)
    }
}

#[test]
fn custom_estimator_plugs_into_a_session() {
    let config = EngineConfig {
        frame_len: 512,
        ..EngineConfig::default()
    };
    let mut session = Session::with_estimator(&config, RATE, Box::new(ConstantEstimator(261.63)))
        .expect("valid config");

    let loud = AudioFrame::new(vec![0.1; 512], RATE);
    let quiet = AudioFrame::new(vec![0.0; 512], RATE);

    let mut now = Duration::ZERO;
    let step = Duration::from_millis(16);
    let mut finalized = None;
    for i in 0..120 {
        let frame = if i < 10 { &loud } else { &quiet };
        let report = session.tick(frame, now, false).expect("tick");
        if let Some(SegmenterEvent::Finalized(result)) = report.event {
            finalized = Some(result);
            break;
        }
        now += step;
    }

    let result = finalized.expect("utterance should finalize after the silence delay");
    assert_eq!(result.pitch_class, PitchClass::C);
    assert_eq!(result.octave, 4);
    assert_eq!(result.voiced_samples, 10);
}
