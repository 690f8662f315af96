//! Small signal helpers shared by the estimator and the session.

/// Root-mean-square of a sample slice. Empty input yields `0.0`.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_slice_is_zero() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn square_wave_rms_equals_amplitude() {
        let samples: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        assert_abs_diff_eq!(rms(&samples), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn sine_rms_is_amplitude_over_sqrt_two() {
        let samples: Vec<f32> = (0..4800)
            .map(|i| 0.4 * (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 48_000.0).sin())
            .collect();
        assert_abs_diff_eq!(rms(&samples), 0.4 / 2f32.sqrt(), epsilon = 1e-3);
    }
}
