//! Sink values into a vector.
//!
//! This block is really only useful for unit tests, and small demos.
use std::sync::{Arc, Mutex, MutexGuard};

use crate::block::{Block, BlockRet};
use crate::stream::ReadStream;
use crate::{Error, Result};

/// VectorSink.
///
/// Takes what comes from the stream and just adds it to a vector, up to
/// `max_size` samples. Anything beyond that is consumed and dropped.
pub struct VectorSink<T> {
    src: ReadStream<T>,
    storage: Arc<Mutex<Vec<T>>>,
    max_size: usize,
}

impl<T: Copy> VectorSink<T> {
    /// Create new VectorSink block.
    #[must_use]
    pub fn new(src: ReadStream<T>, max_size: usize) -> Self {
        Self {
            src,
            storage: Arc::new(Mutex::new(Vec::new())),
            max_size,
        }
    }

    /// Get a Hook into the data that will be written.
    #[must_use]
    pub fn hook(&self) -> Hook<T> {
        Hook {
            inner: self.storage.clone(),
        }
    }
}

/// Hook is a hook into getting the data written to the VectorSink.
pub struct Hook<T> {
    inner: Arc<Mutex<Vec<T>>>,
}

impl<T> Hook<T> {
    /// Get a locked read only reference to the samples.
    #[must_use]
    pub fn data(&self) -> Data<'_, T> {
        Data {
            // A poisoned lock only means a writer panicked. The samples
            // written so far are still fine to look at.
            inner: self.inner.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }
}

/// Lock a read only reference to the samples written to the VectorSink.
///
/// The VectorSink is unable to write anything new while the Data is alive.
pub struct Data<'a, T> {
    inner: MutexGuard<'a, Vec<T>>,
}

impl<T> Data<'_, T> {
    /// Get a slice of the data written to the VectorSink.
    #[must_use]
    pub fn samples(&self) -> &[T] {
        &self.inner
    }
}

impl<T: Copy> Block for VectorSink<T> {
    fn block_name(&self) -> &str {
        "VectorSink"
    }
    fn work(&mut self) -> Result<BlockRet<'_>> {
        let consumed = {
            let mut storage = self
                .storage
                .lock()
                .map_err(|e| Error::msg(format!("VectorSink storage poisoned: {e}")))?;
            let i = self.src.read_buf()?;
            let ilen = i.len();
            let n = std::cmp::min(ilen, self.max_size.saturating_sub(storage.len()));
            storage.extend_from_slice(&i.slice()[..n]);
            i.consume(ilen);
            ilen
        };
        if consumed == 0 {
            return Ok(BlockRet::WaitForStream(&self.src, 1));
        }
        Ok(BlockRet::Again)
    }
}
