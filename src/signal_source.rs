//! Generate a pure signal.
//!
//! Mostly useful as a stand-in jammer in tests and demos.
use crate::Result;

use crate::block::{Block, BlockRet};
use crate::stream::{ReadStream, WriteStream};
use crate::{Complex, Float};

/// Generate a pure complex sine wave.
pub struct SignalSourceComplex {
    dst: Option<WriteStream<Complex>>,
    amplitude: Float,
    rad_per_sample: f64,
    current: f64,
    remaining: Option<u64>,
}

/// Generate pure complex sine wave.
impl SignalSourceComplex {
    /// Create new SignalSourceComplex block, that never stops.
    #[must_use]
    pub fn new(samp_rate: Float, freq: Float, amplitude: Float) -> (Self, ReadStream<Complex>) {
        Self::make(samp_rate, freq, amplitude, None)
    }

    /// Create new SignalSourceComplex block, that stops after
    /// `samples` samples.
    #[must_use]
    pub fn new_limited(
        samp_rate: Float,
        freq: Float,
        amplitude: Float,
        samples: u64,
    ) -> (Self, ReadStream<Complex>) {
        Self::make(samp_rate, freq, amplitude, Some(samples))
    }

    fn make(
        samp_rate: Float,
        freq: Float,
        amplitude: Float,
        remaining: Option<u64>,
    ) -> (Self, ReadStream<Complex>) {
        let (dst, dr) = crate::stream::new_stream();
        (
            Self {
                dst: Some(dst),
                current: 0.0,
                amplitude,
                rad_per_sample: 2.0 * std::f64::consts::PI * (freq as f64) / (samp_rate as f64),
                remaining,
            },
            dr,
        )
    }
}

impl Iterator for SignalSourceComplex {
    type Item = Complex;
    fn next(&mut self) -> Option<Complex> {
        let ret = Complex::new(
            (self.amplitude as f64 * self.current.cos()) as Float,
            (self.amplitude as f64 * self.current.sin()) as Float,
        );
        self.current = (self.current + self.rad_per_sample) % (2.0 * std::f64::consts::PI);
        Some(ret)
    }
}

impl Block for SignalSourceComplex {
    fn block_name(&self) -> &str {
        "SignalSourceComplex"
    }
    fn work(&mut self) -> Result<BlockRet<'_>> {
        let Some(dst) = self.dst.take() else {
            return Ok(BlockRet::EOF);
        };
        let n = {
            let mut o = dst.write_buf()?;
            let n = match self.remaining {
                Some(r) => std::cmp::min(o.len() as u64, r) as usize,
                None => o.len(),
            };
            for place in o.slice()[..n].iter_mut() {
                // Iterator never ends.
                *place = self.next().unwrap_or_default();
            }
            o.produce(n);
            n
        };
        if let Some(r) = &mut self.remaining {
            *r -= n as u64;
            if *r == 0 {
                return Ok(BlockRet::EOF);
            }
        }
        self.dst = Some(dst);
        if n == 0 {
            // Output full.
            if let Some(dst) = &self.dst {
                return Ok(BlockRet::WaitForStream(dst, 1));
            }
        }
        Ok(BlockRet::Again)
    }
}
