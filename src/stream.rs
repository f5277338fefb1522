/*! Streams connecting blocks.

Blocks are connected with streams. A block can have zero or more input
streams, and write to zero or more output streams.

A stream has one writing end ([`WriteStream`]) and one reading end
([`ReadStream`]). It's bounded, so a writer can only write as much as
there's space for, and has to wait for the reader to consume to write
more.

Reading is a two step process: get the readable slice with
`read_buf()`, then `consume()` what was used. Writing is the same: get
the writable slice with `write_buf()`, fill it in, then `produce()`
what was written. Anything not produced is discarded.
*/
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Error, Result};

/// Default max number of samples in a stream.
pub const DEFAULT_STREAM_SIZE: usize = 65536;

/// Something that can be waited on, by the graph.
pub trait StreamWait {
    /// True if the other end is gone.
    fn closed(&self) -> bool;

    /// Max number of samples the stream can hold.
    ///
    /// Waiting for more than this can never succeed.
    fn capacity(&self) -> usize;
}

#[derive(Debug)]
struct Stream<T> {
    buf: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T> Stream<T> {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<T>>> {
        self.buf
            .lock()
            .map_err(|e| Error::Stream(format!("stream lock poisoned: {e}")))
    }
}

/// Reading end of a stream.
#[derive(Debug)]
pub struct ReadStream<T> {
    inner: Arc<Stream<T>>,
}

/// Writing end of a stream.
#[derive(Debug)]
pub struct WriteStream<T> {
    inner: Arc<Stream<T>>,
}

/// Create a new stream, with default capacity.
#[must_use]
pub fn new_stream<T>() -> (WriteStream<T>, ReadStream<T>) {
    new_stream_with_capacity(DEFAULT_STREAM_SIZE)
}

/// Create a new stream, holding at most `capacity` samples.
#[must_use]
pub fn new_stream_with_capacity<T>(capacity: usize) -> (WriteStream<T>, ReadStream<T>) {
    let inner = Arc::new(Stream {
        buf: Mutex::new(Vec::with_capacity(capacity)),
        capacity,
    });
    (
        WriteStream {
            inner: inner.clone(),
        },
        ReadStream { inner },
    )
}

impl<T: Copy> ReadStream<T> {
    /// Create a new stream with initial data in it.
    ///
    /// The writing end is already closed.
    #[must_use]
    pub fn from_slice(data: &[T]) -> Self {
        let capacity = std::cmp::max(DEFAULT_STREAM_SIZE, data.len());
        Self {
            inner: Arc::new(Stream {
                buf: Mutex::new(data.to_vec()),
                capacity,
            }),
        }
    }

    /// Return a read slice.
    pub fn read_buf(&self) -> Result<BufferReader<'_, T>> {
        Ok(BufferReader {
            guard: self.inner.lock()?,
        })
    }

    /// Number of samples readable right now.
    pub fn available(&self) -> Result<usize> {
        Ok(self.inner.lock()?.len())
    }
}

impl<T> StreamWait for ReadStream<T> {
    fn closed(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
    fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl<T: Copy + Default> WriteStream<T> {
    /// Return a write slice.
    pub fn write_buf(&self) -> Result<BufferWriter<'_, T>> {
        let mut guard = self.inner.lock()?;
        let start = guard.len();
        if start < self.inner.capacity {
            guard.resize(self.inner.capacity, T::default());
        }
        Ok(BufferWriter {
            guard,
            start,
            produced: 0,
        })
    }
}

impl<T> StreamWait for WriteStream<T> {
    fn closed(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
    fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

/// Readable part of a stream.
///
/// The stream is locked while this is alive.
pub struct BufferReader<'a, T> {
    guard: MutexGuard<'a, Vec<T>>,
}

impl<T: Copy> BufferReader<'_, T> {
    /// Number of readable samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard.len()
    }

    /// True if there's nothing to read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }

    /// The readable samples.
    #[must_use]
    pub fn slice(&self) -> &[T] {
        &self.guard
    }

    /// Iterate over the readable samples.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.guard.iter()
    }

    /// Consume the first `n` samples.
    ///
    /// Panics if `n` is more than what's readable.
    pub fn consume(mut self, n: usize) {
        assert!(
            n <= self.guard.len(),
            "Consumed too much: {n} > {}",
            self.guard.len()
        );
        self.guard.drain(..n).for_each(drop);
    }
}

/// Writable part of a stream.
///
/// The stream is locked while this is alive.
pub struct BufferWriter<'a, T> {
    guard: MutexGuard<'a, Vec<T>>,
    start: usize,
    produced: usize,
}

impl<T: Copy> BufferWriter<'_, T> {
    /// Number of samples that can be written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard.len() - self.start
    }

    /// True if there's no space to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The writable space.
    pub fn slice(&mut self) -> &mut [T] {
        &mut self.guard[self.start..]
    }

    /// Copy as much of `data` as fits into the writable space.
    ///
    /// Doesn't produce.
    pub fn fill_from_slice(&mut self, data: &[T]) -> usize {
        let n = std::cmp::min(data.len(), self.len());
        self.slice()[..n].copy_from_slice(&data[..n]);
        n
    }

    /// Commit the first `n` written samples.
    ///
    /// Panics if `n` is more than the writable space.
    pub fn produce(mut self, n: usize) {
        assert!(
            n <= self.len(),
            "can't produce that much. {} < {n}",
            self.len()
        );
        self.produced = n;
    }
}

impl<T> Drop for BufferWriter<'_, T> {
    fn drop(&mut self) {
        let end = self.start + self.produced;
        self.guard.truncate(end);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() -> Result<()> {
        let (w, r) = new_stream_with_capacity::<u32>(10);
        assert!(r.read_buf()?.is_empty());
        {
            let mut o = w.write_buf()?;
            assert_eq!(o.len(), 10);
            assert_eq!(o.fill_from_slice(&[1, 2, 3]), 3);
            o.produce(2);
        }
        {
            let i = r.read_buf()?;
            assert_eq!(i.slice(), &[1, 2]);
            i.consume(1);
        }
        assert_eq!(r.read_buf()?.slice(), &[2]);
        assert_eq!(w.write_buf()?.len(), 9);
        assert_eq!(r.available()?, 1);
        Ok(())
    }

    #[test]
    fn unproduced_is_discarded() -> Result<()> {
        let (w, r) = new_stream_with_capacity::<u8>(4);
        {
            let mut o = w.write_buf()?;
            o.slice().fill(7);
        }
        assert!(r.read_buf()?.is_empty());
        Ok(())
    }

    #[test]
    fn full_stream() -> Result<()> {
        let (w, _r) = new_stream_with_capacity::<u8>(3);
        let mut o = w.write_buf()?;
        o.fill_from_slice(&[1, 2, 3, 4]);
        o.produce(3);
        assert!(w.write_buf()?.is_empty());
        Ok(())
    }

    #[test]
    fn closed() -> Result<()> {
        let (w, r) = new_stream::<u8>();
        assert!(!r.closed());
        assert!(!w.closed());
        drop(w);
        assert!(r.closed());
        let r = ReadStream::from_slice(&[1u8, 2]);
        assert!(r.closed());
        assert_eq!(r.read_buf()?.slice(), &[1, 2]);
        Ok(())
    }

    #[test]
    fn reports_capacity() {
        let (w, r) = new_stream_with_capacity::<u8>(7);
        assert_eq!(w.capacity(), 7);
        assert_eq!(r.capacity(), 7);
        let big = vec![0u8; DEFAULT_STREAM_SIZE + 1];
        assert_eq!(ReadStream::from_slice(&big).capacity(), DEFAULT_STREAM_SIZE + 1);
        assert_eq!(ReadStream::from_slice(&[1u8]).capacity(), DEFAULT_STREAM_SIZE);
    }

    #[test]
    #[should_panic]
    fn consume_too_much() {
        let r = ReadStream::from_slice(&[1u8, 2]);
        r.read_buf().unwrap().consume(3);
    }
}
