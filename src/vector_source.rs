//! Generate values from a fixed vector.
use log::debug;

use crate::Result;
use crate::block::{Block, BlockRet};
use crate::stream::{ReadStream, WriteStream};

/// Generate values from a fixed vector.
///
/// Once all of the vector is written, the output stream is closed.
pub struct VectorSource<T> {
    data: Vec<T>,
    pos: usize,
    dst: Option<WriteStream<T>>,
}

impl<T: Copy + Default> VectorSource<T> {
    /// Create new Vector Source block.
    #[must_use]
    pub fn new(data: Vec<T>) -> (Self, ReadStream<T>) {
        Self::with_capacity(data, crate::stream::DEFAULT_STREAM_SIZE)
    }

    /// Create new Vector Source block, with a non-default output stream
    /// size.
    #[must_use]
    pub fn with_capacity(data: Vec<T>, capacity: usize) -> (Self, ReadStream<T>) {
        let (dst, dr) = crate::stream::new_stream_with_capacity(capacity);
        (
            Self {
                data,
                pos: 0,
                dst: Some(dst),
            },
            dr,
        )
    }
}

impl<T: Copy + Default> Block for VectorSource<T> {
    fn block_name(&self) -> &str {
        "VectorSource"
    }
    fn work(&mut self) -> Result<BlockRet<'_>> {
        if self.pos == self.data.len() {
            self.dst = None;
            return Ok(BlockRet::EOF);
        }
        let n = match &self.dst {
            None => return Ok(BlockRet::EOF),
            Some(dst) => {
                let mut o = dst.write_buf()?;
                let n = o.fill_from_slice(&self.data[self.pos..]);
                o.produce(n);
                n
            }
        };
        if n == 0 {
            // Output full.
            return Ok(match &self.dst {
                Some(dst) => BlockRet::WaitForStream(dst, 1),
                None => BlockRet::EOF,
            });
        }
        self.pos += n;
        if self.pos == self.data.len() {
            debug!("VectorSource: all {} samples written", self.data.len());
            self.dst = None;
            return Ok(BlockRet::EOF);
        }
        Ok(BlockRet::Again)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::stream::StreamWait;

    #[test]
    fn all_at_once() -> Result<()> {
        let (mut src, out) = VectorSource::new(vec![1u32, 2, 3]);
        assert!(matches!(src.work()?, BlockRet::EOF));
        assert_eq!(out.read_buf()?.slice(), &[1, 2, 3]);
        assert!(out.closed());
        assert!(matches!(src.work()?, BlockRet::EOF));
        Ok(())
    }

    #[test]
    fn more_than_fits() -> Result<()> {
        let n = crate::stream::DEFAULT_STREAM_SIZE + 10;
        let (mut src, out) = VectorSource::new(vec![7u8; n]);
        assert!(matches!(src.work()?, BlockRet::Again));
        assert!(matches!(src.work()?, BlockRet::WaitForStream(_, 1)));
        out.read_buf()?.consume(100);
        assert!(matches!(src.work()?, BlockRet::EOF));
        assert_eq!(out.available()?, n - 100);
        Ok(())
    }

    #[test]
    fn bigger_stream() -> Result<()> {
        let n = crate::stream::DEFAULT_STREAM_SIZE + 10;
        let (mut src, out) = VectorSource::with_capacity(vec![7u8; n], n);
        assert_eq!(out.capacity(), n);
        assert!(matches!(src.work()?, BlockRet::EOF));
        assert_eq!(out.available()?, n);
        Ok(())
    }
}
