// Enable coverage attributes when measuring coverage on nightly.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

/*! This crate provides adaptive narrowband interference excision for
SDR (software defined radio) receive chains.

A strong continuous-wave jammer sitting inside the band of a weak
spread-spectrum signal can be removed with a single notch, as long as
the notch follows the jammer. This crate does that with a "lite"
notch: a one-zero, one-pole recursion whose zero is placed on the
jammer's frequency, estimated straight from the phase rotation between
adjacent samples.

# Architecture overview

Samples are processed in fixed size segments. For each segment:

```text
         [ segment of L samples ]
                    ↓
  [ warm-up? ] → yes → [ spectral noise floor ] → copy out
                    ↓ no
          [ CFAR energy detector ]
        ↓ quiet              ↓ jammed
     copy out     [ design notch (maybe) ]
                             ↓
                   [ notch recursion ]
```

The algorithm lives in [`notch::NotchLite`], which has no idea of
streams or schedulers. It can be driven directly, segment by segment,
or through [`notch::NotchLite::general_work`] with a buffer that
carries one sample of look-back.

For use in a flowgraph there's the [`blocks::NotchFilter`] block, run
by a [`graph::Graph`] like any other block.

# Example

```
use notchradio::graph::{Graph, GraphRunner};
use notchradio::blocks::{NotchFilter, VectorSink, VectorSource};
use notchradio::notch::NotchConfig;
use notchradio::Complex;

let config = NotchConfig {
    segment_length: 4,
    warmup_segment_count: 2,
    ..NotchConfig::default()
};
let (src, prev) = VectorSource::new(vec![Complex::new(1.0, 0.0); 40]);
let (notch, prev) = NotchFilter::new(prev, &config)?;
let sink = VectorSink::new(prev, 1000);
let hook = sink.hook();
let mut g = Graph::new();
g.add(Box::new(src));
g.add(Box::new(notch));
g.add(Box::new(sink));
g.run()?;
assert_eq!(hook.data().samples().len(), 40);
# Ok::<(), anyhow::Error>(())
```
 */

// Algorithm.
pub mod chi2;
pub mod multichannel;
pub mod notch;
pub mod spectral;

// Blocks.
pub mod notch_filter;
pub mod signal_source;
pub mod vector_sink;
pub mod vector_source;

pub mod block;
pub mod blocks;
pub mod graph;
pub mod stream;

/// Float type used. Usually f32, but not guaranteed.
pub type Float = f32;

/// Complex (I/Q) data.
pub type Complex = num_complex::Complex<Float>;

/// Error type used throughout the crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid construction-time configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Misuse of a stream, or mismatched buffers.
    #[error("stream error: {0}")]
    Stream(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Plain message.
    #[error("{0}")]
    Msg(String),

    /// Another error, with added context.
    #[error("{msg}: {source}")]
    Wrap {
        /// Context.
        msg: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Create error from message.
    pub fn msg<S: Into<String>>(msg: S) -> Self {
        Self::Msg(msg.into())
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error with some context.
    pub fn wrap<E, S>(source: E, msg: S) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        S: Into<String>,
    {
        Self::Wrap {
            msg: msg.into(),
            source: Box::new(source),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Error {
        Error::Wrap {
            msg: "anyhow".to_string(),
            source: e.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::config(format!("bad JSON: {e}"))
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
pub mod tests {
    //! Test helper functions.
    use super::*;

    /// For testing, assert that two slices are almost equal.
    ///
    /// Floating point numbers are almost never exactly equal.
    pub fn assert_almost_equal_complex(left: &[Complex], right: &[Complex]) {
        assert_eq!(
            left.len(),
            right.len(),
            "\nleft: {:?}\nright: {:?}",
            left,
            right
        );
        for i in 0..left.len() {
            let dist = (left[i] - right[i]).norm_sqr().sqrt();
            if dist > 0.001 {
                assert_eq!(
                    left[i], right[i],
                    "\nElement {i}:\nleft: {:?}\nright: {:?}",
                    left, right
                );
            }
        }
    }

    /// Complex white Gaussian noise with total power `power`, seeded.
    pub fn gaussian_noise(seed: u64, n: usize, power: Float) -> Vec<Complex> {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(seed);
        let sigma = (power as f64 / 2.0).sqrt();
        (0..n)
            .map(|_| {
                // Box-Muller. Keep u1 away from zero.
                let u1: f64 = 1.0 - rng.random::<f64>();
                let u2: f64 = rng.random::<f64>();
                let r = (-2.0 * u1.ln()).sqrt() * sigma;
                let t = 2.0 * std::f64::consts::PI * u2;
                Complex::new((r * t.cos()) as Float, (r * t.sin()) as Float)
            })
            .collect()
    }

    /// Unit magnitude samples with random phase.
    ///
    /// Every segment of these has exactly the same energy, which makes
    /// detector outcomes deterministic.
    pub fn phase_noise(seed: u64, n: usize) -> Vec<Complex> {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let t: Float = rng.random::<Float>() * 2.0 * std::f32::consts::PI;
                Complex::from_polar(1.0, t)
            })
            .collect()
    }

    /// Pure complex tone `amplitude * exp(j*(w*n + phase))`.
    pub fn tone(n: usize, amplitude: Float, w: f64, phase: f64) -> Vec<Complex> {
        (0..n)
            .map(|i| {
                let t = w * i as f64 + phase;
                Complex::new(
                    (amplitude as f64 * t.cos()) as Float,
                    (amplitude as f64 * t.sin()) as Float,
                )
            })
            .collect()
    }
}
