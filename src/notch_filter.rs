/*! Notch filter block.

Runs a [`NotchLite`] on a stream of complex samples.

The stream is processed in whole segments only. If less than one
segment of input is available, or less than one segment of output space,
nothing is consumed or produced. Leftover input stays in the stream
until the rest of its segment arrives.

The block keeps the last consumed input sample as the look-back for the
next segment. Before the first segment, that sample is zero.

Both streams must be able to hold at least one segment. The output
stream is created big enough, and an input stream that's too small is
rejected at construction. Once the input is closed and less than a
segment is left, the block is done, and the leftover is dropped.

```
use notchradio::blocks::NotchFilter;
use notchradio::notch::NotchConfig;
use notchradio::stream::ReadStream;
use notchradio::Complex;

let src = ReadStream::from_slice(&[Complex::default(); 100]);
let (notch, out) = NotchFilter::new(src, &NotchConfig::default())?;
# Ok::<(), anyhow::Error>(())
```
*/
use log::debug;

use crate::block::{Block, BlockRet};
use crate::notch::{NotchConfig, NotchLite};
use crate::stream::{DEFAULT_STREAM_SIZE, ReadStream, StreamWait, WriteStream};
use crate::{Complex, Error, Result};

/// Adaptive notch filter block.
pub struct NotchFilter {
    notch: NotchLite,
    history: Complex,
    segments: u64,
    src: ReadStream<Complex>,
    dst: WriteStream<Complex>,
}

impl NotchFilter {
    /// Create new notch filter block.
    pub fn new(
        src: ReadStream<Complex>,
        config: &NotchConfig,
    ) -> Result<(Self, ReadStream<Complex>)> {
        let notch = NotchLite::new(config)?;
        let l = notch.segment_length();
        if src.capacity() < l {
            return Err(Error::config(format!(
                "input stream holds {} samples, less than one segment of {l}",
                src.capacity()
            )));
        }
        let (dst, dr) =
            crate::stream::new_stream_with_capacity(std::cmp::max(DEFAULT_STREAM_SIZE, l));
        Ok((
            Self {
                notch,
                history: Complex::default(),
                segments: 0,
                src,
                dst,
            },
            dr,
        ))
    }

    /// Access the filter state.
    #[must_use]
    pub fn notch(&self) -> &NotchLite {
        &self.notch
    }
}

impl Block for NotchFilter {
    fn block_name(&self) -> &str {
        "NotchFilter"
    }
    fn work(&mut self) -> Result<BlockRet<'_>> {
        let l = self.notch.segment_length();
        let input = self.src.read_buf()?;
        if input.len() < l {
            if self.src.closed() {
                debug!(
                    "NotchFilter: input closed, dropping {} trailing samples",
                    input.len()
                );
                return Ok(BlockRet::EOF);
            }
            return Ok(BlockRet::WaitForStream(&self.src, l));
        }
        let mut o = self.dst.write_buf()?;
        if o.len() < l {
            return Ok(BlockRet::WaitForStream(&self.dst, l));
        }
        let n = std::cmp::min(input.len() / l, o.len() / l) * l;
        for (is, os) in input.slice()[..n]
            .chunks_exact(l)
            .zip(o.slice()[..n].chunks_exact_mut(l))
        {
            self.notch.process_segment(self.history, is, os);
            self.history = is[l - 1];
        }
        self.segments += (n / l) as u64;
        debug!(
            "NotchFilter: {} segments, state {:?}",
            n / l,
            self.notch.state()
        );
        o.produce(n);
        input.consume(n);
        Ok(BlockRet::Again)
    }
    fn report(&self) -> Option<String> {
        Some(format!(
            "{} segments, {} episodes, state {:?}",
            self.segments,
            self.notch.episodes(),
            self.notch.state()
        ))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::f64::consts::PI;

    use super::*;
    use crate::notch::NotchState;
    use crate::tests::{phase_noise, tone};

    fn config() -> NotchConfig {
        NotchConfig {
            segment_length: 8,
            warmup_segment_count: 4,
            false_alarm_probability: 0.001,
            ..NotchConfig::default()
        }
    }

    #[test]
    fn matches_general_work() -> Result<()> {
        let mut input = phase_noise(1, 8 * 6);
        input.extend(tone(8 * 10, 30.0, PI / 3.0, 0.0));
        input.extend(phase_noise(2, 8 * 4));

        let src = ReadStream::from_slice(&input);
        let (mut b, out) = NotchFilter::new(src, &config())?;
        assert!(matches!(b.work()?, BlockRet::Again));
        let got = out.read_buf()?.slice().to_vec();

        // Same thing, with an explicit leading zero for history.
        let mut core = NotchLite::new(&config())?;
        let mut with_history = vec![Complex::default()];
        with_history.extend(&input);
        let mut want = vec![Complex::default(); input.len()];
        assert_eq!(core.general_work(&with_history, &mut want), input.len());
        assert_eq!(got, want);
        assert_eq!(b.notch().state(), NotchState::Idle);
        Ok(())
    }

    #[test]
    fn partial_segments_wait() -> Result<()> {
        let (w, r) = crate::stream::new_stream();
        let (mut b, out) = NotchFilter::new(r, &config())?;
        let input = phase_noise(3, 20);
        {
            let mut o = w.write_buf()?;
            o.fill_from_slice(&input[..5]);
            o.produce(5);
        }
        assert!(matches!(b.work()?, BlockRet::WaitForStream(_, 8)));
        assert_eq!(out.available()?, 0);
        {
            let mut o = w.write_buf()?;
            o.fill_from_slice(&input[5..]);
            o.produce(15);
        }
        assert!(matches!(b.work()?, BlockRet::Again));
        // Two whole segments, four samples left behind.
        assert_eq!(out.read_buf()?.slice(), &input[..16]);
        assert_eq!(b.src.available()?, 4);
        assert_eq!(b.notch().segments(), 2);
        Ok(())
    }

    #[test]
    fn history_carries_over_calls() -> Result<()> {
        let mut input = phase_noise(4, 8 * 4);
        input.extend(tone(8 * 6, 25.0, 2.5, 0.0));
        let (w, r) = crate::stream::new_stream();
        let (mut b, out) = NotchFilter::new(r, &config())?;
        for chunk in input.chunks(8) {
            {
                let mut o = w.write_buf()?;
                o.fill_from_slice(chunk);
                o.produce(chunk.len());
            }
            b.work()?;
        }
        let got = out.read_buf()?.slice().to_vec();

        let src = ReadStream::from_slice(&input);
        let (mut b2, out2) = NotchFilter::new(src, &config())?;
        b2.work()?;
        assert_eq!(got, out2.read_buf()?.slice());
        assert_eq!(b.notch().state(), NotchState::Filtering);
        Ok(())
    }

    #[test]
    fn output_space_limits() -> Result<()> {
        let input = phase_noise(5, 64);
        let src = ReadStream::from_slice(&input);
        let (mut b, out) = NotchFilter::new(src, &config())?;
        // Fill up the output so only 20 samples fit.
        {
            let mut o = b.dst.write_buf()?;
            let n = o.len() - 20;
            o.produce(n);
        }
        assert!(matches!(b.work()?, BlockRet::Again));
        assert_eq!(b.notch().segments(), 2);
        assert_eq!(b.src.available()?, 48);
        out.read_buf()?.consume(crate::stream::DEFAULT_STREAM_SIZE - 20 + 16);
        b.work()?;
        assert_eq!(b.notch().segments(), 8);
        Ok(())
    }

    #[test]
    fn closed_short_input_is_eof() -> Result<()> {
        let input = phase_noise(6, 8 * 2 + 5);
        let src = ReadStream::from_slice(&input);
        let (mut b, out) = NotchFilter::new(src, &config())?;
        assert!(matches!(b.work()?, BlockRet::Again));
        // Five samples left, and nothing more will ever come.
        let r = b.work()?;
        assert!(matches!(r, BlockRet::EOF), "Got {r:?}");
        assert_eq!(out.read_buf()?.slice(), &input[..16]);
        assert_eq!(b.report().unwrap(), "2 segments, 0 episodes, state Estimating");
        Ok(())
    }

    #[test]
    fn open_short_input_waits() -> Result<()> {
        let (_w, r) = crate::stream::new_stream::<Complex>();
        let (mut b, _out) = NotchFilter::new(r, &config())?;
        assert!(matches!(b.work()?, BlockRet::WaitForStream(_, 8)));
        Ok(())
    }

    #[test]
    fn stream_smaller_than_segment() -> Result<()> {
        let (_w, r) = crate::stream::new_stream_with_capacity::<Complex>(7);
        assert!(matches!(
            NotchFilter::new(r, &config()),
            Err(Error::Config(_))
        ));

        // Output is sized to fit a segment.
        let big = NotchConfig {
            segment_length: DEFAULT_STREAM_SIZE + 1,
            ..config()
        };
        let (_w, r) = crate::stream::new_stream_with_capacity::<Complex>(DEFAULT_STREAM_SIZE + 1);
        let (_b, out) = NotchFilter::new(r, &big)?;
        assert_eq!(out.capacity(), DEFAULT_STREAM_SIZE + 1);
        Ok(())
    }
}
