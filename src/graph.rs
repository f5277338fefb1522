/*! Single threaded scheduler for blocks.

A [`Graph`] owns a set of blocks, and keeps calling their `work()` until
none of them can make any more progress.

A block that waits for more samples than the stream it waits on can
ever hold would never wake up. For a segment based block like
[`NotchFilter`](crate::blocks::NotchFilter) that means its input would
silently be dropped, so the graph treats it as an error instead.
 */
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::block::{Block, BlockRet};
use crate::{Error, Result};

/// How long to sleep when only `Pending` blocks are left.
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Something that runs blocks.
pub trait GraphRunner {
    /// Add a block.
    fn add(&mut self, b: Box<dyn Block + Send>);

    /// Run until every block is done, stuck waiting, or until cancelled.
    fn run(&mut self) -> Result<()>;

    /// Table of time spent and work done per block. `None` before the
    /// first `run()`.
    fn generate_stats(&self) -> Option<String>;

    /// Token for stopping the graph from another thread.
    fn cancel_token(&self) -> CancellationToken;
}

#[derive(Default, Clone, Copy)]
struct BlockStats {
    wall: Duration,
    cpu: Duration,
    calls: u64,
    active: u64,
}

/**
Graph of blocks, run in the calling thread.

```
use notchradio::graph::{Graph, GraphRunner};
use notchradio::blocks::{NotchFilter, VectorSink, VectorSource};
use notchradio::notch::NotchConfig;
use notchradio::Complex;
let (src, prev) = VectorSource::new(vec![Complex::new(0.5, 0.5); 100]);
let (notch, prev) = NotchFilter::new(prev, &NotchConfig::default())?;
let sink = VectorSink::new(prev, 1000);
let mut g = Graph::new();
g.add(Box::new(src));
g.add(Box::new(notch));
g.add(Box::new(sink));
g.run()?;
# Ok::<(), anyhow::Error>(())
```
*/
pub struct Graph {
    blocks: Vec<Box<dyn Block + Send>>,
    stats: Vec<BlockStats>,
    // Wall and CPU time of the last run.
    elapsed: Option<(Duration, Duration)>,
    cancel_token: CancellationToken,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            stats: Vec::new(),
            elapsed: None,
            cancel_token: CancellationToken::new(),
        }
    }

    // Call one block once. Returns true if it's done for good.
    fn step(&mut self, n: usize, progress: &mut bool, pending: &mut bool) -> Result<bool> {
        let b = &mut self.blocks[n];
        let stats = &mut self.stats[n];
        let name = b.block_name().to_owned();
        let wall = Instant::now();
        let cpu = get_cpu_time();
        let ret = b
            .work()
            .map_err(|e| Error::wrap(e, format!("in block {name}")))?;
        stats.wall += wall.elapsed();
        stats.cpu += get_cpu_time().saturating_sub(cpu);
        stats.calls += 1;
        let done = match ret {
            BlockRet::Again => {
                stats.active += 1;
                *progress = true;
                false
            }
            BlockRet::Pending => {
                *pending = true;
                false
            }
            BlockRet::WaitForStream(stream, need) => {
                let capacity = stream.capacity();
                if need > capacity {
                    return Err(Error::Stream(format!(
                        "{name} waits for {need} samples on a stream that holds at most {capacity}"
                    )));
                }
                let closed = stream.closed();
                closed || b.eof()
            }
            BlockRet::EOF => true,
        };
        if done {
            debug!("Graph: {name} done after {} calls", stats.calls);
        }
        Ok(done)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

// CPU time used by the whole process.
fn get_cpu_time() -> Duration {
    // SAFETY: timespec is plain integers, so all zeroes is valid.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: ts is a valid, writable timespec owned by this frame.
    if unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) } != 0 {
        return Duration::ZERO;
    }
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

impl GraphRunner for Graph {
    fn add(&mut self, b: Box<dyn Block + Send>) {
        self.blocks.push(b);
    }

    fn run(&mut self) -> Result<()> {
        let wall = Instant::now();
        let cpu = get_cpu_time();
        self.stats = vec![BlockStats::default(); self.blocks.len()];
        let mut done = vec![false; self.blocks.len()];
        while !self.cancel_token.is_canceled() {
            let mut progress = false;
            let mut pending = false;
            for n in 0..self.blocks.len() {
                if !done[n] {
                    done[n] = self.step(n, &mut progress, &mut pending)?;
                }
            }
            if !progress && !pending {
                // Everything is done, or waiting on something that
                // nobody will ever provide.
                break;
            }
            if !progress {
                trace!("Graph: only pending blocks. Sleeping a bit.");
                std::thread::sleep(IDLE_SLEEP);
            }
        }
        self.elapsed = Some((wall.elapsed(), get_cpu_time().saturating_sub(cpu)));
        if let Some(stats) = self.generate_stats() {
            stats.lines().for_each(|line| info!("{line}"));
        }
        Ok(())
    }

    fn generate_stats(&self) -> Option<String> {
        let (wall, cpu) = self.elapsed?;
        let width = self
            .blocks
            .iter()
            .map(|b| b.block_name().len())
            .max()
            .unwrap_or(0)
            .max("Total".len());
        let mut s = format!(
            "{:<width$} {:>10} {:>10} {:>10} {:>10}\n",
            "Block", "Calls", "Active", "Seconds", "CPU sec"
        );
        for (b, st) in self.blocks.iter().zip(&self.stats) {
            s.push_str(&format!(
                "{:<width$} {:>10} {:>10} {:>10.3} {:>10.3}\n",
                b.block_name(),
                st.calls,
                st.active,
                st.wall.as_secs_f64(),
                st.cpu.as_secs_f64(),
            ));
        }
        s.push_str(&format!(
            "{:<width$} {:>10} {:>10} {:>10.3} {:>10.3}\n",
            "Total",
            "",
            "",
            wall.as_secs_f64(),
            cpu.as_secs_f64(),
        ));
        for b in &self.blocks {
            if let Some(report) = b.report() {
                s.push_str(&format!("{}: {report}\n", b.block_name()));
            }
        }
        Some(s)
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

/** Stops a running [`Graph`], e.g. from a Ctrl-C handler.

The graph only checks it between rounds of `work()` calls, so a segment
is never cut in half.

```
use notchradio::graph::CancellationToken;
let token = CancellationToken::new();
let other = token.clone();
std::thread::spawn(move || other.cancel()).join().unwrap();
assert!(token.is_canceled());
```
*/
#[derive(Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// New, not yet cancelled, token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel. All clones see it.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// True once any clone has been cancelled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::Complex;
    use crate::blocks::{NotchFilter, VectorSink, VectorSource};
    use crate::notch::NotchConfig;
    use crate::stream::{ReadStream, new_stream_with_capacity};

    #[test]
    fn small_test() -> Result<()> {
        let input = vec![Complex::new(1.0, -1.0); 1000];
        let (src, prev) = VectorSource::new(input.clone());
        let (notch, prev) = NotchFilter::new(
            prev,
            &NotchConfig {
                segment_length: 10,
                ..NotchConfig::default()
            },
        )?;
        let sink = VectorSink::new(prev, 10000);
        let hook = sink.hook();
        let mut g = Graph::new();
        g.add(Box::new(src));
        g.add(Box::new(notch));
        g.add(Box::new(sink));
        g.run()?;
        // Still in warm-up, so untouched.
        assert_eq!(hook.data().samples(), &input[..]);
        let stats = g.generate_stats().unwrap();
        assert!(
            stats.contains("NotchFilter: 100 segments, 0 episodes, state Estimating"),
            "{stats}"
        );
        Ok(())
    }

    // Waits for more than any stream can hold.
    struct Greedy {
        src: ReadStream<u8>,
    }

    impl Block for Greedy {
        fn block_name(&self) -> &str {
            "Greedy"
        }
        fn work(&mut self) -> Result<BlockRet<'_>> {
            Ok(BlockRet::WaitForStream(&self.src, 11))
        }
    }

    #[test]
    fn unsatisfiable_wait() -> Result<()> {
        let (_w, src) = new_stream_with_capacity::<u8>(10);
        let mut g = Graph::new();
        g.add(Box::new(Greedy { src }));
        let err = g.run().unwrap_err();
        assert!(matches!(err, Error::Stream(_)), "{err}");
        assert!(err.to_string().contains("Greedy"), "{err}");
        Ok(())
    }

    #[test]
    fn cancelled_before_start() -> Result<()> {
        let (src, prev) = VectorSource::new(vec![Complex::default(); 100]);
        let sink = VectorSink::new(prev, 1000);
        let hook = sink.hook();
        let mut g = Graph::new();
        g.add(Box::new(src));
        g.add(Box::new(sink));
        g.cancel_token().cancel();
        g.run()?;
        assert!(hook.data().samples().is_empty());
        Ok(())
    }

    #[test]
    fn default_graph() -> Result<()> {
        let mut g = Graph::default();
        assert!(!g.cancel_token().is_canceled());
        assert!(g.generate_stats().is_none());
        g.run()?;
        assert!(g.generate_stats().unwrap().contains("Total"));
        Ok(())
    }
}
