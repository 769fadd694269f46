//! Content transform pipeline: optional streaming decompression of body
//! bytes between the wire framing and the data callbacks.
//!
//! The pipeline preserves byte order and completeness, not chunk
//! alignment: one compressed input chunk may yield zero or several
//! kilobytes of output.

use std::io::Write;

use flate2::write::{DeflateDecoder, GzDecoder, ZlibDecoder};
use tracing::{debug, warn};

use crate::error::{ParserError, Result};
use crate::headers::HttpHeaders;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    /// `deflate`; zlib-wrapped or raw, sniffed from the stream.
    Deflate,
}

impl ContentEncoding {
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("gzip") || token.eq_ignore_ascii_case("x-gzip") {
            Some(Self::Gzip)
        } else if token.eq_ignore_ascii_case("deflate") {
            Some(Self::Deflate)
        } else {
            None
        }
    }

    /// The single decodable coding named by `Content-Encoding`, if any.
    /// Stacked codings are not decoded.
    pub fn from_headers(headers: &HttpHeaders) -> Option<Self> {
        let mut tokens = headers
            .get_all("content-encoding")
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("identity"));
        let first = tokens.next()?;
        if tokens.next().is_some() {
            debug!("stacked content codings are passed through undecoded");
            return None;
        }
        Self::from_token(first)
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }
}

enum Inflater {
    Gzip(GzDecoder<Vec<u8>>),
    Zlib(ZlibDecoder<Vec<u8>>),
    Raw(DeflateDecoder<Vec<u8>>),
    /// `deflate` before the first two bytes decide zlib vs raw.
    Sniffing(Vec<u8>),
}

/// Streaming decompressor for one body.
pub struct ContentDecoder {
    encoding: ContentEncoding,
    inflater: Inflater,
    ended: bool,
    received: bool,
}

impl std::fmt::Debug for ContentDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentDecoder")
            .field("encoding", &self.encoding)
            .field("ended", &self.ended)
            .finish()
    }
}

/// A zlib stream starts with CMF/FLG where CM = 8 and the pair is a
/// multiple of 31.
fn looks_like_zlib(b0: u8, b1: u8) -> bool {
    b0 & 0x0F == 8 && (u16::from(b0) << 8 | u16::from(b1)) % 31 == 0
}

fn zlib_error(err: std::io::Error) -> ParserError {
    ParserError::zlib(err.to_string())
}

/// Feed `input` into a write-side decoder, stopping quietly at end of
/// stream; returns whether the decoder refused further input.
fn write_all_or_end<W: Write>(decoder: &mut W, mut input: &[u8]) -> Result<bool> {
    while !input.is_empty() {
        let written = decoder.write(input).map_err(zlib_error)?;
        if written == 0 {
            warn!(trailing = input.len(), "dropping bytes after end of compressed stream");
            return Ok(true);
        }
        input = &input[written..];
    }
    Ok(false)
}

impl ContentDecoder {
    pub fn new(encoding: ContentEncoding) -> Self {
        let inflater = match encoding {
            ContentEncoding::Gzip => Inflater::Gzip(GzDecoder::new(Vec::new())),
            ContentEncoding::Deflate => Inflater::Sniffing(Vec::with_capacity(2)),
        };
        Self {
            encoding,
            inflater,
            ended: false,
            received: false,
        }
    }

    pub fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    /// Decompress one chunk, returning whatever output is ready.
    pub fn decode(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if self.ended {
            if !input.is_empty() {
                warn!(trailing = input.len(), "dropping bytes after end of compressed stream");
            }
            return Ok(Vec::new());
        }
        self.received |= !input.is_empty();
        if let Inflater::Sniffing(prefix) = &mut self.inflater {
            prefix.extend_from_slice(input);
            if prefix.len() < 2 {
                return Ok(Vec::new());
            }
            let buffered = std::mem::take(prefix);
            self.inflater = if looks_like_zlib(buffered[0], buffered[1]) {
                Inflater::Zlib(ZlibDecoder::new(Vec::new()))
            } else {
                debug!("deflate body is not zlib-wrapped, using raw inflate");
                Inflater::Raw(DeflateDecoder::new(Vec::new()))
            };
            return self.decode(&buffered);
        }
        self.ended = match &mut self.inflater {
            Inflater::Gzip(d) => write_all_or_end(d, input)?,
            Inflater::Zlib(d) => write_all_or_end(d, input)?,
            Inflater::Raw(d) => write_all_or_end(d, input)?,
            Inflater::Sniffing(_) => false,
        };
        Ok(self.take_output())
    }

    /// Flush the decompressor at the end of the body.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if !self.received {
            self.ended = true;
            return Ok(Vec::new());
        }
        match &mut self.inflater {
            Inflater::Gzip(d) => d.try_finish().map_err(zlib_error)?,
            Inflater::Zlib(d) => d.try_finish().map_err(zlib_error)?,
            Inflater::Raw(d) => d.try_finish().map_err(zlib_error)?,
            Inflater::Sniffing(prefix) if !prefix.is_empty() => {
                return Err(ParserError::zlib("deflate stream truncated"));
            }
            Inflater::Sniffing(_) => {}
        }
        self.ended = true;
        Ok(self.take_output())
    }

    fn take_output(&mut self) -> Vec<u8> {
        match &mut self.inflater {
            Inflater::Gzip(d) => std::mem::take(d.get_mut()),
            Inflater::Zlib(d) => std::mem::take(d.get_mut()),
            Inflater::Raw(d) => std::mem::take(d.get_mut()),
            Inflater::Sniffing(_) => Vec::new(),
        }
    }
}

/// The transform stage inserted into one message's or stream's data path.
#[derive(Debug, Default)]
pub enum BodyPipeline {
    /// Bytes pass through unchanged.
    #[default]
    Identity,
    Decode(ContentDecoder),
    /// Decompression failed; the rest of the body is swallowed.
    Failed,
}

impl BodyPipeline {
    /// Build the pipeline after the body-started callback answered.
    pub fn select(decompress: bool, headers: &HttpHeaders) -> Self {
        if !decompress {
            return Self::Identity;
        }
        match ContentEncoding::from_headers(headers) {
            Some(encoding) => {
                debug!(encoding = encoding.as_token(), "decompressing body");
                Self::Decode(ContentDecoder::new(encoding))
            }
            None => Self::Identity,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Pass a body chunk through. On error the pipeline turns `Failed`
    /// and the partial output is discarded.
    pub fn process(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let result = match self {
            Self::Identity => return Ok(data.to_vec()),
            Self::Failed => return Ok(Vec::new()),
            Self::Decode(decoder) => decoder.decode(data),
        };
        result.inspect_err(|err| {
            warn!(error = %err, "body decompression failed");
            *self = Self::Failed;
        })
    }

    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let result = match self {
            Self::Identity | Self::Failed => return Ok(Vec::new()),
            Self::Decode(decoder) => decoder.finish(),
        };
        result.inspect_err(|err| {
            warn!(error = %err, "body decompression failed at end of body");
            *self = Self::Failed;
        })
    }
}
