/*! Multi state notch filter, for excising narrowband interference.

[`NotchLite`] watches a stream of complex samples, one segment at a
time, and runs a small state machine:

* `Estimating`: learn the noise floor from the spectrum of each
  segment, and pass samples through untouched.
* `Idle`: the noise floor is known, and the latest segment's energy
  doesn't exceed the CFAR threshold. Pass through.
* `Filtering`: a jammer is present. Place a notch on its frequency and
  filter.

The notch is the recursion

```text
y[i] = x[i] - z0·x[i-1] + c·z0·y[i-1]
```

where `z0` is a unit magnitude phasor at the jammer frequency, and `c`
is the pole radius. The jammer frequency is estimated from the phase
rotation between adjacent samples at the start and at the end of the
segment, which for a strong tone is just its angular frequency.

After a long enough quiet period, the segment counter is reset, which
makes the filter re-learn the noise floor, since it may have drifted.
*/
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::spectral::{NoiseFloor, db_to_linear};
use crate::{Complex, Error, Float, Result, chi2};

/// Configuration for [`NotchLite`].
///
/// Can be deserialized from JSON, with missing fields filled in from
/// [`NotchConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotchConfig {
    /// Pole radius `c` of the notch recursion. In (0,1].
    ///
    /// Closer to 1 gives a narrower notch, but a longer transient.
    pub pole_radius: Float,

    /// Target CFAR false alarm probability. In (0,1).
    pub false_alarm_probability: Float,

    /// Samples per segment. Also the FFT size used for noise
    /// estimation.
    pub segment_length: usize,

    /// Number of segments used to (re-)learn the noise floor.
    pub warmup_segment_count: u64,

    /// After the segment counter passes this, a quiet segment restarts
    /// noise floor estimation.
    pub quiet_reset_segment_count: u64,

    /// While filtering, re-estimate the notch frequency this often, in
    /// segments.
    pub coefficient_refresh_period: u64,
}

impl Default for NotchConfig {
    fn default() -> Self {
        Self {
            pole_radius: 0.9,
            false_alarm_probability: 0.001,
            segment_length: 32,
            warmup_segment_count: 12500,
            quiet_reset_segment_count: 5_000_000,
            coefficient_refresh_period: 5,
        }
    }
}

impl NotchConfig {
    /// Parse config from JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check that the config makes sense.
    pub fn validate(&self) -> Result<()> {
        if self.segment_length == 0 {
            return Err(Error::config("segment_length must be positive"));
        }
        let pfa = self.false_alarm_probability;
        if !(pfa > 0.0 && pfa < 1.0) {
            return Err(Error::config(format!(
                "false_alarm_probability must be in (0,1), got {pfa}"
            )));
        }
        if self.coefficient_refresh_period == 0 {
            return Err(Error::config(
                "coefficient_refresh_period must be positive",
            ));
        }
        let c = self.pole_radius;
        if !(c > 0.0 && c <= 1.0) {
            return Err(Error::config(format!(
                "pole_radius must be in (0,1], got {c}"
            )));
        }
        Ok(())
    }
}

/// State of the [`NotchLite`] state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotchState {
    /// Learning the noise floor.
    Estimating,

    /// No interference detected.
    Idle,

    /// Interference detected, notch applied.
    Filtering,
}

/// Adaptive single notch interference excision filter.
///
/// Each instance is one channel's worth of state. It's not shared, and
/// not meant to be.
pub struct NotchLite {
    pole_radius: Float,
    segment_length: usize,
    warmup_segments: u64,
    quiet_reset_segments: u64,
    refresh_period: u64,
    dof: usize,
    threshold: Float,

    noise_floor: NoiseFloor,
    noise_power: Float,
    averaged: u64,

    state: NotchState,
    segments: u64,
    episodes: u64,
    refresh_counter: u64,
    z0: Option<Complex>,
    feedback: Complex,
    last_ratio: Option<Float>,
}

impl NotchLite {
    /// Create a new notch filter.
    pub fn new(config: &NotchConfig) -> Result<Self> {
        config.validate()?;
        let dof = 2 * config.segment_length;
        let threshold = chi2::isf(config.false_alarm_probability as f64, dof as f64)? as Float;
        info!(
            "NotchLite: segment length {}, {} dof, pfa {} => threshold {:.3}",
            config.segment_length, dof, config.false_alarm_probability, threshold
        );
        if config.quiet_reset_segment_count < config.warmup_segment_count {
            info!(
                "NotchLite: quiet reset after {} segments is shorter than warm-up of {}. Noise floor will be re-learned on every quiet segment",
                config.quiet_reset_segment_count, config.warmup_segment_count
            );
        }
        Ok(Self {
            pole_radius: config.pole_radius,
            segment_length: config.segment_length,
            warmup_segments: config.warmup_segment_count,
            quiet_reset_segments: config.quiet_reset_segment_count,
            refresh_period: config.coefficient_refresh_period,
            dof,
            threshold,
            noise_floor: NoiseFloor::new(config.segment_length),
            noise_power: 0.0,
            averaged: 0,
            state: NotchState::Estimating,
            segments: 0,
            episodes: 0,
            refresh_counter: 0,
            z0: None,
            feedback: Complex::default(),
            last_ratio: None,
        })
    }

    /// Samples per segment.
    #[must_use]
    pub fn segment_length(&self) -> usize {
        self.segment_length
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> NotchState {
        self.state
    }

    /// Detection threshold.
    #[must_use]
    pub fn threshold(&self) -> Float {
        self.threshold
    }

    /// Degrees of freedom of the energy statistic.
    #[must_use]
    pub fn degrees_of_freedom(&self) -> usize {
        self.dof
    }

    /// Current noise power estimate, per real component.
    #[must_use]
    pub fn noise_power(&self) -> Float {
        self.noise_power
    }

    /// Number of segment estimates in the current noise power average.
    #[must_use]
    pub fn warmup_samples(&self) -> u64 {
        self.averaged
    }

    /// Segments processed since start, or since the last quiet reset.
    #[must_use]
    pub fn segments(&self) -> u64 {
        self.segments
    }

    /// Number of interference episodes seen so far.
    #[must_use]
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Current notch phasor, if one has been designed.
    #[must_use]
    pub fn coefficient(&self) -> Option<Complex> {
        self.z0
    }

    /// Segments since the notch phasor was last designed, modulo the
    /// refresh period.
    #[must_use]
    pub fn refresh_counter(&self) -> u64 {
        self.refresh_counter
    }

    /// Last output sample of the recursion.
    #[must_use]
    pub fn feedback(&self) -> Complex {
        self.feedback
    }

    /// Energy to noise ratio of the last tested segment.
    ///
    /// Infinite if there was no usable noise estimate.
    #[must_use]
    pub fn last_ratio(&self) -> Option<Float> {
        self.last_ratio
    }

    /** Process exactly one segment.

    `history` is the input sample right before `input[0]`.

    Panics if `input` or `output` is not exactly one segment long.
    */
    pub fn process_segment(&mut self, history: Complex, input: &[Complex], output: &mut [Complex]) {
        assert_eq!(input.len(), self.segment_length, "input is not one segment");
        assert_eq!(output.len(), self.segment_length, "output is not one segment");

        let mut reset = false;
        if self.state != NotchState::Filtering && self.segments < self.warmup_segments {
            self.state = NotchState::Estimating;
            self.estimate_noise(input);
            output.copy_from_slice(input);
            if self.segments + 1 == self.warmup_segments {
                info!(
                    "NotchLite: warm-up done, noise power {:.3e}",
                    self.noise_power
                );
            }
        } else if self.detect(input) {
            if self.state != NotchState::Filtering {
                self.state = NotchState::Filtering;
                self.feedback = Complex::default();
                self.refresh_counter = 0;
                self.episodes += 1;
                debug!(
                    "NotchLite: interference at segment {}, ratio {:?}",
                    self.segments, self.last_ratio
                );
            }
            let z0 = match self.z0 {
                Some(z0) if self.refresh_counter != 0 => z0,
                _ => self.design(history, input),
            };
            self.filter(z0, history, input, output);
            self.refresh_counter = (self.refresh_counter + 1) % self.refresh_period;
        } else {
            if self.state == NotchState::Filtering {
                debug!("NotchLite: interference gone at segment {}", self.segments);
            }
            self.state = NotchState::Idle;
            output.copy_from_slice(input);
            if self.segments > self.quiet_reset_segments {
                reset = true;
            }
        }
        self.segments += 1;
        if reset {
            info!(
                "NotchLite: quiet for {} segments, re-learning noise floor",
                self.segments
            );
            self.segments = 0;
        }
    }

    /** Process as many whole segments as fit.

    `input[0]` is the look-back sample, and `input[1..]` is new data.
    Returns the number of items consumed from `input[1..]`, which is
    also the number of items written to `output`. It's always a
    multiple of the segment length.
    */
    pub fn general_work(&mut self, input: &[Complex], output: &mut [Complex]) -> usize {
        if input.is_empty() {
            return 0;
        }
        let l = self.segment_length;
        let n = std::cmp::min((input.len() - 1) / l, output.len() / l);
        for (seg, out) in output.chunks_exact_mut(l).take(n).enumerate() {
            let start = seg * l;
            self.process_segment(input[start], &input[start + 1..start + 1 + l], out);
        }
        n * l
    }

    // Fold this segment's noise floor into the running average.
    fn estimate_noise(&mut self, input: &[Complex]) {
        let floor_db = self.noise_floor.estimate_db(input);
        let sample = db_to_linear(floor_db) / self.dof as Float;
        let n = self.segments as Float;
        self.noise_power = (n * self.noise_power + sample) / (n + 1.0);
        self.averaged = self.segments + 1;
        trace!(
            "NotchLite: segment {} noise floor {:.1} dB, estimate {:.3e}",
            self.segments, floor_db, self.noise_power
        );
    }

    // CFAR test. A noise estimate too small to be a normal float (zero,
    // subnormal or NaN) counts as detected.
    fn detect(&mut self, input: &[Complex]) -> bool {
        let energy = input.iter().map(|s| s.norm_sqr()).sum::<Float>();
        let ratio = if self.noise_power >= Float::MIN_POSITIVE {
            energy / self.noise_power
        } else {
            Float::INFINITY
        };
        self.last_ratio = Some(ratio);
        trace!(
            "NotchLite: segment {} ratio {ratio:.3} threshold {:.3}",
            self.segments, self.threshold
        );
        ratio > self.threshold || ratio.is_nan()
    }

    // Estimate the jammer phasor from the phase increment of the first
    // and last adjacent sample pairs.
    fn design(&mut self, history: Complex, input: &[Complex]) -> Complex {
        let l = input.len();
        // Index 0 is the history sample.
        let at = |i: usize| if i == 0 { history } else { input[i - 1] };
        let first = if l >= 2 { 1 } else { 0 };
        let angle1 = (at(first + 1) * at(first).conj()).arg();
        let angle2 = (at(l) * at(l - 1).conj()).arg();
        let angle = angle1 + wrap_phase(angle2 - angle1) / 2.0;
        let z0 = Complex::from_polar(1.0, angle);
        debug!(
            "NotchLite: notch at {:.5} rad/sample ({:.5} cycles/sample)",
            angle,
            angle / (2.0 * std::f32::consts::PI)
        );
        self.z0 = Some(z0);
        z0
    }

    fn filter(&mut self, z0: Complex, history: Complex, input: &[Complex], output: &mut [Complex]) {
        let cz0 = z0.scale(self.pole_radius);
        let mut prev = history;
        let mut y = self.feedback;
        for (o, &x) in output.iter_mut().zip(input) {
            y = x - z0 * prev + cz0 * y;
            *o = y;
            prev = x;
        }
        self.feedback = y;
    }
}

// Wrap phase to [-π, π).
fn wrap_phase(a: Float) -> Float {
    use std::f32::consts::PI;
    (a + PI).rem_euclid(2.0 * PI) - PI
}
