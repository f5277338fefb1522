/*! Block implementation

Blocks are the main buildingblocks of a flowgraph. They each do one
thing, and you connect them together with streams to process the data.

*/
use crate::Result;
use crate::stream::StreamWait;

/** Return type for all blocks.

This will let the scheduler know if more data could come out of this block, or if
it should just never bother calling it again.
*/
pub enum BlockRet<'a> {
    /// At least one sample was consumed or produced. Call again.
    Again,

    /// Block didn't produce anything this time, but has a background
    /// process that may suddenly produce.
    Pending,

    /// Block needs more samples, or more output space, on the given
    /// stream. The number is how many it needs.
    WaitForStream(&'a dyn StreamWait, usize),

    /// Block indicates that it will never produce more output.
    ///
    /// Examples:
    /// * reading from a vector, without repeating, and all is written.
    /// * the source ran out of samples it was asked to produce.
    EOF,
}

impl std::fmt::Debug for BlockRet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BlockRet::Again => write!(f, "Again"),
            BlockRet::Pending => write!(f, "Pending"),
            BlockRet::WaitForStream(_, n) => write!(f, "WaitForStream(_, {n})"),
            BlockRet::EOF => write!(f, "EOF"),
        }
    }
}

/**
Block trait, that must be implemented for all blocks.
*/
pub trait Block {
    /** Name of block

    Not name of *instance* of block. But it may include the
    type. E.g. `VectorSource<Float>`.
     */
    fn block_name(&self) -> &str;

    /** Block work function

    Consuming data from an input stream involves first reading it,
    and then "consuming" from the stream. If `consume()` is not called
    on the read buffer, the same data will be read again next time.

    Writing data to an output stream is filling in its write buffer,
    and then calling `produce()`.
     */
    fn work(&mut self) -> Result<BlockRet<'_>>;

    /// Return true if the block knows it's done, even though it
    /// returned `WaitForStream`.
    fn eof(&mut self) -> bool {
        false
    }

    /// One line summary of what the block has done so far, for the
    /// graph's stats.
    fn report(&self) -> Option<String> {
        None
    }
}
