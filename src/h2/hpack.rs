//! HPACK: Header Compression for HTTP/2 (RFC 7541)
//!
//! Thin wrapper around `fluke-hpack` converting between header blocks and
//! [`HttpHeaders`]. Each direction of a connection owns one decoder and
//! the outbound side one encoder, since the dynamic tables are stateful.

use crate::error::{ParserError, Result};
use crate::headers::{HeaderField, HttpHeaders};

/// HPACK decoder for HTTP/2 header blocks.
/// Wraps `fluke_hpack::Decoder` which maintains dynamic table state per-connection.
pub struct HpackDecoder {
    inner: fluke_hpack::Decoder<'static>,
}

impl std::fmt::Debug for HpackDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HpackDecoder").finish()
    }
}

impl Default for HpackDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HpackDecoder {
    pub fn new() -> Self {
        Self {
            inner: fluke_hpack::Decoder::new(),
        }
    }

    /// Decode a complete header block. Any failure leaves the dynamic
    /// table unusable, so callers treat it as connection-fatal.
    pub fn decode(&mut self, data: &[u8]) -> Result<HttpHeaders> {
        let pairs = self
            .inner
            .decode(data)
            .map_err(|e| ParserError::parse(format!("HPACK decode error: {e:?}")))?;
        Ok(pairs
            .into_iter()
            .map(|(name, value)| {
                HeaderField::new(
                    String::from_utf8_lossy(&name).into_owned(),
                    String::from_utf8_lossy(&value).into_owned(),
                )
            })
            .collect())
    }
}

/// HPACK encoder for HTTP/2 header blocks.
pub struct HpackEncoder {
    inner: fluke_hpack::Encoder<'static>,
}

impl std::fmt::Debug for HpackEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HpackEncoder").finish()
    }
}

impl Default for HpackEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HpackEncoder {
    pub fn new() -> Self {
        Self {
            inner: fluke_hpack::Encoder::new(),
        }
    }

    /// Encode headers into an HPACK header block. Names are lowercased as
    /// HTTP/2 requires; pseudo-headers are emitted first.
    pub fn encode(&mut self, headers: &HttpHeaders) -> Vec<u8> {
        let lowered: Vec<(Vec<u8>, &[u8])> = headers
            .iter()
            .filter(|f| f.name.starts_with(':'))
            .chain(headers.iter().filter(|f| !f.name.starts_with(':')))
            .map(|f| (f.name.to_ascii_lowercase().into_bytes(), f.value.as_bytes()))
            .collect();
        self.inner
            .encode(lowered.iter().map(|(name, value)| (name.as_slice(), *value)))
    }
}
