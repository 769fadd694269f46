//! HTTP/2 frame layer: constants, 9-byte frame header, payload
//! extraction and frame builders.
//!
//! Reference: RFC 7540 (HTTP/2)

use crate::config::{DEFAULT_MAX_FRAME_SIZE, MAX_ALLOWED_FRAME_SIZE, MAX_WINDOW_SIZE};
use crate::error::{ParserError, Result};

/// HTTP/2 frame types (RFC 7540 Section 6)
pub mod frame_type {
    pub const DATA: u8 = 0x0;
    pub const HEADERS: u8 = 0x1;
    pub const PRIORITY: u8 = 0x2;
    pub const RST_STREAM: u8 = 0x3;
    pub const SETTINGS: u8 = 0x4;
    pub const PUSH_PROMISE: u8 = 0x5;
    pub const PING: u8 = 0x6;
    pub const GOAWAY: u8 = 0x7;
    pub const WINDOW_UPDATE: u8 = 0x8;
    pub const CONTINUATION: u8 = 0x9;
}

/// HTTP/2 frame flags
pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

/// HTTP/2 SETTINGS identifiers (RFC 7540 Section 6.5.2)
pub mod settings_id {
    pub const HEADER_TABLE_SIZE: u16 = 0x1;
    pub const ENABLE_PUSH: u16 = 0x2;
    pub const MAX_CONCURRENT_STREAMS: u16 = 0x3;
    pub const INITIAL_WINDOW_SIZE: u16 = 0x4;
    pub const MAX_FRAME_SIZE: u16 = 0x5;
    pub const MAX_HEADER_LIST_SIZE: u16 = 0x6;
}

/// HTTP/2 error codes (RFC 7540 Section 7)
pub mod error_code {
    pub const NO_ERROR: u32 = 0x0;
    pub const PROTOCOL_ERROR: u32 = 0x1;
    pub const INTERNAL_ERROR: u32 = 0x2;
    pub const FLOW_CONTROL_ERROR: u32 = 0x3;
    pub const SETTINGS_TIMEOUT: u32 = 0x4;
    pub const STREAM_CLOSED: u32 = 0x5;
    pub const FRAME_SIZE_ERROR: u32 = 0x6;
    pub const REFUSED_STREAM: u32 = 0x7;
    pub const CANCEL: u32 = 0x8;
    pub const COMPRESSION_ERROR: u32 = 0x9;
    pub const CONNECT_ERROR: u32 = 0xa;
    pub const ENHANCE_YOUR_CALM: u32 = 0xb;
    pub const INADEQUATE_SECURITY: u32 = 0xc;
    pub const HTTP_1_1_REQUIRED: u32 = 0xd;
}

/// Frame header length in bytes.
pub const FRAME_HEADER_LEN: usize = 9;

/// The HTTP/2 connection preface (24 bytes)
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// A parsed HTTP/2 frame header (9 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H2FrameHeader {
    pub length: u32,      // 24 bits
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,   // 31 bits (high bit reserved)
}

impl H2FrameHeader {
    pub fn new(frame_type: u8, flags: u8, stream_id: u32, length: usize) -> Self {
        Self {
            length: length as u32,
            frame_type,
            flags,
            stream_id: stream_id & 0x7FFF_FFFF,
        }
    }

    /// Parse a 9-byte frame header
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < FRAME_HEADER_LEN {
            return None;
        }

        let length = ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | (data[2] as u32);
        // Clear reserved bit
        let stream_id = u32::from_be_bytes([data[5], data[6], data[7], data[8]]) & 0x7FFF_FFFF;

        Some(Self {
            length,
            frame_type: data[3],
            flags: data[4],
            stream_id,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push((self.length >> 16) as u8);
        out.push((self.length >> 8) as u8);
        out.push(self.length as u8);
        out.push(self.frame_type);
        out.push(self.flags);
        out.extend_from_slice(&self.stream_id.to_be_bytes());
    }

    /// Total frame size including header
    pub fn total_size(&self) -> usize {
        FRAME_HEADER_LEN + self.length as usize
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Check if END_STREAM flag is set
    pub fn is_end_stream(&self) -> bool {
        self.has_flag(flags::END_STREAM)
    }

    /// Check if END_HEADERS flag is set
    pub fn is_end_headers(&self) -> bool {
        self.has_flag(flags::END_HEADERS)
    }

    pub fn is_ack(&self) -> bool {
        self.has_flag(flags::ACK)
    }
}

/// Strip the pad-length byte and trailing padding of a PADDED frame.
fn strip_padding(header: &H2FrameHeader, payload: &mut Vec<u8>, what: &str) -> Result<()> {
    if !header.has_flag(flags::PADDED) {
        return Ok(());
    }
    if payload.is_empty() {
        return Err(ParserError::parse(format!("PADDED {what} frame with no payload")));
    }
    let pad_length = payload[0] as usize;
    if pad_length >= payload.len() {
        return Err(ParserError::parse(format!("Invalid padding length in {what} frame")));
    }
    payload.truncate(payload.len() - pad_length);
    payload.remove(0);
    Ok(())
}

/// Extract DATA payload, handling PADDED flag.
/// Takes ownership of the payload Vec to avoid re-copying.
pub fn extract_data_payload(header: &H2FrameHeader, mut payload: Vec<u8>) -> Result<Vec<u8>> {
    strip_padding(header, &mut payload, "DATA")?;
    Ok(payload)
}

/// Extract HEADERS payload, handling PADDED and PRIORITY flags.
pub fn extract_headers_payload(header: &H2FrameHeader, mut payload: Vec<u8>) -> Result<Vec<u8>> {
    strip_padding(header, &mut payload, "HEADERS")?;

    // Skip stream dependency (4 bytes) + weight (1 byte)
    if header.has_flag(flags::PRIORITY) {
        if payload.len() < 5 {
            return Err(ParserError::parse("PRIORITY HEADERS frame with insufficient data"));
        }
        payload.drain(..5);
    }
    Ok(payload)
}

/// Extract a PUSH_PROMISE payload into (promised stream id, header block).
pub fn extract_push_promise_payload(
    header: &H2FrameHeader,
    mut payload: Vec<u8>,
) -> Result<(u32, Vec<u8>)> {
    strip_padding(header, &mut payload, "PUSH_PROMISE")?;
    if payload.len() < 4 {
        return Err(ParserError::parse("PUSH_PROMISE frame too short"));
    }
    let promised = read_u32(&payload) & 0x7FFF_FFFF;
    payload.drain(..4);
    Ok((promised, payload))
}

/// Parse and validate SETTINGS entries: each is 6 bytes (u16 id + u32 value).
pub fn parse_settings(payload: &[u8]) -> Result<Vec<(u16, u32)>> {
    if payload.len() % 6 != 0 {
        return Err(ParserError::parse(format!(
            "SETTINGS payload length {} is not a multiple of 6",
            payload.len()
        )));
    }
    let mut settings = Vec::with_capacity(payload.len() / 6);
    for entry in payload.chunks_exact(6) {
        let id = u16::from_be_bytes([entry[0], entry[1]]);
        let value = u32::from_be_bytes([entry[2], entry[3], entry[4], entry[5]]);
        match id {
            settings_id::ENABLE_PUSH if value > 1 => {
                return Err(ParserError::parse(format!("invalid SETTINGS_ENABLE_PUSH {value}")));
            }
            settings_id::INITIAL_WINDOW_SIZE if value > MAX_WINDOW_SIZE => {
                return Err(ParserError::parse(format!(
                    "invalid SETTINGS_INITIAL_WINDOW_SIZE {value}"
                )));
            }
            settings_id::MAX_FRAME_SIZE
                if !(DEFAULT_MAX_FRAME_SIZE..=MAX_ALLOWED_FRAME_SIZE).contains(&value) =>
            {
                return Err(ParserError::parse(format!("invalid SETTINGS_MAX_FRAME_SIZE {value}")));
            }
            _ => {}
        }
        // Unknown identifiers are passed through
        settings.push((id, value));
    }
    Ok(settings)
}

pub fn read_u32(payload: &[u8]) -> u32 {
    u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
}

fn frame(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    H2FrameHeader::new(frame_type, flags, stream_id, payload.len()).encode(&mut out);
    out.extend_from_slice(payload);
    out
}

/// Create a RST_STREAM frame
pub fn create_rst_stream(stream_id: u32, error_code: u32) -> Vec<u8> {
    frame(frame_type::RST_STREAM, 0, stream_id, &error_code.to_be_bytes())
}

/// Create a GOAWAY frame (stream 0)
pub fn create_goaway(last_stream_id: u32, error_code: u32) -> Vec<u8> {
    let mut payload = [0u8; 8];
    payload[..4].copy_from_slice(&(last_stream_id & 0x7FFF_FFFF).to_be_bytes());
    payload[4..].copy_from_slice(&error_code.to_be_bytes());
    frame(frame_type::GOAWAY, 0, 0, &payload)
}

pub fn create_settings_ack() -> Vec<u8> {
    frame(frame_type::SETTINGS, flags::ACK, 0, &[])
}

/// Create a SETTINGS frame carrying the given (identifier, value) pairs
pub fn create_settings(settings: &[(u16, u32)]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(settings.len() * 6);
    for (id, value) in settings {
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes());
    }
    frame(frame_type::SETTINGS, 0, 0, &payload)
}

pub fn create_ping_ack(data: [u8; 8]) -> Vec<u8> {
    frame(frame_type::PING, flags::ACK, 0, &data)
}

/// Create a WINDOW_UPDATE frame to replenish flow control window
/// stream_id=0 updates connection-level window, otherwise stream-level
pub fn create_window_update(stream_id: u32, increment: u32) -> Vec<u8> {
    frame(frame_type::WINDOW_UPDATE, 0, stream_id, &(increment & 0x7FFF_FFFF).to_be_bytes())
}

pub fn create_headers_frame(
    stream_id: u32,
    fragment: &[u8],
    end_stream: bool,
    end_headers: bool,
) -> Vec<u8> {
    let mut flags_byte = 0;
    if end_stream {
        flags_byte |= flags::END_STREAM;
    }
    if end_headers {
        flags_byte |= flags::END_HEADERS;
    }
    frame(frame_type::HEADERS, flags_byte, stream_id, fragment)
}

/// Create a CONTINUATION frame to continue a header block
/// end_headers: true if this is the final frame in the header block sequence
pub fn create_continuation_frame(stream_id: u32, payload: &[u8], end_headers: bool) -> Vec<u8> {
    let flags_byte = if end_headers { flags::END_HEADERS } else { 0 };
    frame(frame_type::CONTINUATION, flags_byte, stream_id, payload)
}

pub fn create_data_frame(stream_id: u32, data: &[u8], end_stream: bool) -> Vec<u8> {
    let flags_byte = if end_stream { flags::END_STREAM } else { 0 };
    frame(frame_type::DATA, flags_byte, stream_id, data)
}
