//! HTTP/2 engine: frame layer, HPACK, per-direction stream multiplexer and
//! outbound encoder.

pub(crate) mod decoder;
pub(crate) mod encoder;
pub mod frame;
pub mod hpack;
pub(crate) mod stream;

pub use decoder::H2ConnectionState;
pub use stream::StreamState;
