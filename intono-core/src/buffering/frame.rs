//! Typed analysis frame and the rolling window that produces it.

use super::{AudioConsumer, Consumer};

/// A fixed-length block of mono PCM samples at a known sample rate.
///
/// Immutable once built: one frame is handed to the session per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioFrame {
    /// Mono f32 samples in [-1.0, 1.0] at `sample_rate` Hz.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the duration of this frame in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Fixed-length rolling window over the most recent samples.
///
/// New samples enter at the end and push the oldest ones out, so after
/// priming the window always holds exactly `len` samples. Length and sample
/// rate are fixed at construction.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    window: Vec<f32>,
    filled: usize,
    sample_rate: u32,
}

impl FrameBuffer {
    pub fn new(len: usize, sample_rate: u32) -> Self {
        Self {
            window: vec![0.0; len],
            filled: 0,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// `true` once at least `len` samples have been pushed.
    pub fn is_primed(&self) -> bool {
        self.filled == self.window.len()
    }

    /// Slide `samples` into the window, dropping the oldest.
    pub fn push(&mut self, samples: &[f32]) {
        let len = self.window.len();
        let n = samples.len();
        if n == 0 || len == 0 {
            return;
        }
        if n >= len {
            self.window.copy_from_slice(&samples[n - len..]);
        } else {
            self.window.copy_within(n.., 0);
            self.window[len - n..].copy_from_slice(samples);
        }
        self.filled = (self.filled + n).min(len);
    }

    /// Drain up to `max` samples from a ring consumer into the window.
    ///
    /// `scratch` is reused between calls to keep the loop allocation-free.
    pub fn fill_from(
        &mut self,
        consumer: &mut AudioConsumer,
        scratch: &mut Vec<f32>,
        max: usize,
    ) -> usize {
        scratch.resize(max, 0.0);
        let n = consumer.pop_slice(&mut scratch[..max]);
        self.push(&scratch[..n]);
        n
    }

    /// Snapshot the current window as an immutable frame.
    pub fn frame(&self) -> AudioFrame {
        AudioFrame::new(self.window.clone(), self.sample_rate)
    }

    /// Zero the window and mark it unprimed.
    pub fn clear(&mut self) {
        self.window.iter_mut().for_each(|s| *s = 0.0);
        self.filled = 0;
    }
}
