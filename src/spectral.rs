/*! Spectral noise floor estimation.

Transforms a segment to the frequency domain and estimates the noise
floor from the power spectrum, in a way that a strong tone doesn't
drag the estimate up: any bin more than `exclusion_db` above the mean
bin power is left out of the average.

The FFT is not normalized, so for white noise of total power `σ²` per
sample, each bin has expected power `L·σ²`.
*/
use std::sync::Arc;

use rustfft::FftPlanner;

use crate::{Complex, Float};

/// Default exclusion, in dB above the mean bin power.
pub const DEFAULT_EXCLUSION_DB: Float = 15.0;

/// Convert power in dB to linear.
#[must_use]
pub fn db_to_linear(db: Float) -> Float {
    Float::powf(10.0, db / 10.0)
}

/// Convert linear power to dB.
#[must_use]
pub fn linear_to_db(p: Float) -> Float {
    10.0 * p.log10()
}

/** Estimate the noise floor of a power spectrum, in dB.

Bins above the mean by more than `exclusion_db` are left out, and the
rest are averaged in the linear domain. If every bin is excluded (can't
happen for a non-negative exclusion, but still), the mean is used.

An all-zero spectrum gives negative infinity.
*/
#[must_use]
pub fn noise_floor_db(power: &[Float], exclusion_db: Float) -> Float {
    if power.is_empty() {
        return Float::NEG_INFINITY;
    }
    let mean = power.iter().sum::<Float>() / power.len() as Float;
    let limit = mean * db_to_linear(exclusion_db);
    let (sum, count) = power
        .iter()
        .filter(|&&p| p <= limit)
        .fold((0.0 as Float, 0usize), |(s, n), p| (s + p, n + 1));
    let floor = if count > 0 { sum / count as Float } else { mean };
    linear_to_db(floor)
}

/// Noise floor estimator for segments of a fixed size.
pub struct NoiseFloor {
    fft: Arc<dyn rustfft::Fft<Float>>,
    buf: Vec<Complex>,
    scratch: Vec<Complex>,
    power: Vec<Float>,
    exclusion_db: Float,
}

impl NoiseFloor {
    /// Create new estimator for segments of `size` samples.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self::with_exclusion(size, DEFAULT_EXCLUSION_DB)
    }

    /// Create new estimator with non-default exclusion.
    #[must_use]
    pub fn with_exclusion(size: usize, exclusion_db: Float) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buf: vec![Complex::default(); size],
            scratch,
            power: vec![0.0; size],
            exclusion_db,
        }
    }

    /// Transform size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Power spectrum of the most recent segment.
    #[must_use]
    pub fn power_spectrum(&self) -> &[Float] {
        &self.power
    }

    /// Estimate the noise floor of a segment, in dB.
    ///
    /// Panics if the segment is not exactly `size()` long.
    pub fn estimate_db(&mut self, segment: &[Complex]) -> Float {
        self.buf.copy_from_slice(segment);
        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);
        for (p, x) in self.power.iter_mut().zip(self.buf.iter()) {
            *p = x.norm_sqr();
        }
        noise_floor_db(&self.power, self.exclusion_db)
    }
}
