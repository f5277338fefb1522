//! Convenient mod collecting all standard library blocks for import.
pub use crate::notch_filter::NotchFilter;
pub use crate::signal_source::SignalSourceComplex;
pub use crate::vector_sink::VectorSink;
pub use crate::vector_source::VectorSource;
