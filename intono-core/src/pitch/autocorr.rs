//! Autocorrelation pitch estimator.
//!
//! ## Algorithm
//!
//! 1. Compute RMS of the frame. If RMS < `min_rms` → `Unvoiced`.
//! 2. Trim both edges up to the first low-amplitude sample
//!    (`|x| < trim_threshold`), searching at most half the frame from
//!    each side. Edges without such a sample are kept.
//! 3. Raw autocorrelation `c[lag] = Σ x[j]·x[j+lag]` over the trimmed buffer.
//! 4. Skip the initial downward slope from the zero-lag peak. A curve that
//!    never turns upward has no bounded period → `Unvoiced`.
//! 5. The highest point after the slope is the period `T0` (first maximum
//!    wins on ties) and the pitch is `sample_rate / T0`.
//!
//! ## Resolution
//!
//! `T0` is a whole number of samples and is not interpolated, so only
//! frequencies whose period is (close to) an integer lag come back within
//! 1 Hz. Elsewhere the error grows with frequency: 1000 Hz at 44.1 kHz has a
//! period of 44.1 samples and reads as `44_100 / 44 ≈ 1002.27` Hz, and near
//! 950 Hz at 48 kHz the step between adjacent lags is about 19 Hz.

use super::{CorrelationMethod, PitchEstimator, PitchSample};
use crate::dsp::rms;

/// Frames quieter than this are not analysed.
pub const DEFAULT_MIN_RMS: f32 = 0.01;

/// Amplitude below which a sample counts as a low-amplitude crossing.
pub const DEFAULT_TRIM_THRESHOLD: f32 = 0.2;

/// Time-domain autocorrelation estimator.
pub struct AutocorrelationEstimator {
    min_rms: f32,
    trim_threshold: f32,
    method: CorrelationMethod,
    /// Reused correlation curve.
    corr: Vec<f32>,
    #[cfg(feature = "fft")]
    fft: fft::FftCorrelator,
}

impl AutocorrelationEstimator {
    pub fn new(min_rms: f32, trim_threshold: f32) -> Self {
        Self {
            min_rms,
            trim_threshold,
            method: CorrelationMethod::Direct,
            corr: Vec::new(),
            #[cfg(feature = "fft")]
            fft: fft::FftCorrelator::default(),
        }
    }

    /// Select how the correlation curve is computed.
    pub fn with_method(mut self, method: CorrelationMethod) -> Self {
        #[cfg(not(feature = "fft"))]
        if method == CorrelationMethod::Fft {
            tracing::warn!("compiled without the `fft` feature, using direct autocorrelation");
            return self;
        }
        self.method = method;
        self
    }

    pub fn method(&self) -> CorrelationMethod {
        self.method
    }

    fn correlate(&mut self, buf: &[f32]) {
        match self.method {
            CorrelationMethod::Direct => autocorrelate(buf, &mut self.corr),
            #[cfg(feature = "fft")]
            CorrelationMethod::Fft => self.fft.autocorrelate(buf, &mut self.corr),
            #[cfg(not(feature = "fft"))]
            CorrelationMethod::Fft => autocorrelate(buf, &mut self.corr),
        }
    }
}

impl Default for AutocorrelationEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RMS, DEFAULT_TRIM_THRESHOLD)
    }
}

impl PitchEstimator for AutocorrelationEstimator {
    fn estimate(&mut self, frame: &[f32], sample_rate: u32) -> PitchSample {
        if rms(frame) < self.min_rms {
            return PitchSample::Unvoiced;
        }

        let trimmed = trim_edges(frame, self.trim_threshold);
        if trimmed.len() < 2 {
            return PitchSample::Unvoiced;
        }

        self.correlate(trimmed);

        match fundamental_lag(&self.corr) {
            Some(t0) => PitchSample::Voiced(sample_rate as f32 / t0 as f32),
            None => PitchSample::Unvoiced,
        }
    }
}

/// Interior of `buf` between the first low-amplitude sample from the start
/// and the first one from the end, as a half-open range.
pub fn trim_edges(buf: &[f32], threshold: f32) -> &[f32] {
    let size = buf.len();
    let half = (size + 1) / 2;

    let start = (0..half).find(|&i| buf[i].abs() < threshold).unwrap_or(0);
    let end = (1..half)
        .map(|i| size - i)
        .find(|&i| buf[i].abs() < threshold)
        .unwrap_or(size);

    if start >= end {
        return &[];
    }
    &buf[start..end]
}

/// Raw (unnormalised) autocorrelation for every lag in `0..buf.len()`.
pub fn autocorrelate(buf: &[f32], out: &mut Vec<f32>) {
    let n = buf.len();
    out.clear();
    out.extend((0..n).map(|lag| {
        buf[..n - lag]
            .iter()
            .zip(&buf[lag..])
            .map(|(a, b)| a * b)
            .sum::<f32>()
    }));
}

/// Lag of the dominant period in an autocorrelation curve.
///
/// Returns `None` when the curve never stops decreasing or the best lag is 0.
pub fn fundamental_lag(corr: &[f32]) -> Option<usize> {
    let n = corr.len();
    let mut d = 0;
    while d + 1 < n && corr[d] > corr[d + 1] {
        d += 1;
    }
    if d + 1 >= n {
        return None;
    }

    let mut best = d;
    for lag in d + 1..n {
        if corr[lag] > corr[best] {
            best = lag;
        }
    }

    (best != 0).then_some(best)
}

#[cfg(feature = "fft")]
mod fft {
    use std::sync::Arc;

    use rustfft::{num_complex::Complex, Fft, FftPlanner};

    /// Linear autocorrelation through a zero-padded FFT.
    ///
    /// Plans are cached per padded size; frame length is fixed per session
    /// so planning happens once.
    #[derive(Default)]
    pub struct FftCorrelator {
        plans: Option<(usize, Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>)>,
        spectrum: Vec<Complex<f32>>,
    }

    impl FftCorrelator {
        pub fn autocorrelate(&mut self, buf: &[f32], out: &mut Vec<f32>) {
            let n = buf.len();
            let size = (2 * n).next_power_of_two();

            let (forward, inverse) = match &self.plans {
                Some((planned, fwd, inv)) if *planned == size => (Arc::clone(fwd), Arc::clone(inv)),
                _ => {
                    let mut planner = FftPlanner::<f32>::new();
                    let fwd = planner.plan_fft_forward(size);
                    let inv = planner.plan_fft_inverse(size);
                    self.plans = Some((size, Arc::clone(&fwd), Arc::clone(&inv)));
                    (fwd, inv)
                }
            };

            self.spectrum.clear();
            self.spectrum
                .extend(buf.iter().map(|&x| Complex::new(x, 0.0)));
            self.spectrum.resize(size, Complex::new(0.0, 0.0));

            forward.process(&mut self.spectrum);
            for bin in self.spectrum.iter_mut() {
                *bin = Complex::new(bin.norm_sqr(), 0.0);
            }
            inverse.process(&mut self.spectrum);

            let scale = 1.0 / size as f32;
            out.clear();
            out.extend(self.spectrum[..n].iter().map(|v| v.re * scale));
        }
    }
}
