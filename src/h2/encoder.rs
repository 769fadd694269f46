//! Outbound HTTP/2 encoder: SETTINGS, HEADERS/CONTINUATION, DATA,
//! RST_STREAM and GOAWAY for the side this connection sends on.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::frame::{self, settings_id, CONNECTION_PREFACE};
use super::hpack::HpackEncoder;
use super::stream::RecentlyClosed;
use crate::config::{ParserConfig, DEFAULT_MAX_FRAME_SIZE};
use crate::connection::Role;
use crate::error::{ParserError, Result};
use crate::message::Http2Message;

const MAX_STREAM_ID: u32 = 0x7FFF_FFFF;

pub(crate) struct H2Encoder {
    role: Role,
    config: ParserConfig,
    hpack: HpackEncoder,
    peer_max_frame_size: u32,
    settings_sent: bool,
    /// Streams this side has sent headers on and not yet ended.
    open: HashSet<u32>,
    closed: RecentlyClosed,
    /// Highest stream id that has reached us; reported in GOAWAY.
    last_peer_stream_id: u32,
    goaway_sent: bool,
}

fn check_stream_id(stream_id: u32) -> Result<()> {
    if stream_id == 0 || stream_id > MAX_STREAM_ID {
        return Err(ParserError::invalid_argument(format!("invalid stream id {stream_id}")));
    }
    Ok(())
}

impl H2Encoder {
    pub(crate) fn new(role: Role, config: ParserConfig) -> Self {
        let closed = RecentlyClosed::new(config.closed_stream_memory);
        Self {
            role,
            config,
            hpack: HpackEncoder::new(),
            peer_max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            settings_sent: false,
            open: HashSet::new(),
            closed,
            last_peer_stream_id: 0,
            goaway_sent: false,
        }
    }

    /// Apply SETTINGS received from the peer.
    pub(crate) fn apply_peer_settings(&mut self, settings: &[(u16, u32)]) {
        for &(id, value) in settings {
            if id == settings_id::MAX_FRAME_SIZE {
                debug!(max_frame_size = value, "peer max frame size");
                self.peer_max_frame_size = value;
            }
        }
    }

    pub(crate) fn note_peer_stream(&mut self, stream_id: u32) {
        self.last_peer_stream_id = self.last_peer_stream_id.max(stream_id);
    }

    /// The peer reset `stream_id`; nothing more may be sent on it.
    pub(crate) fn peer_reset(&mut self, stream_id: u32) {
        if self.open.remove(&stream_id) {
            self.closed.insert(stream_id);
        }
    }

    fn is_closed(&self, stream_id: u32) -> bool {
        self.closed.contains(stream_id)
    }

    fn start(&mut self, out: &mut Vec<u8>) {
        if !self.settings_sent {
            self.send_settings(out);
        }
    }

    /// Local SETTINGS. A client-side connection writes the connection
    /// preface before its first SETTINGS frame.
    pub(crate) fn send_settings(&mut self, out: &mut Vec<u8>) {
        if !self.settings_sent && self.role == Role::Client {
            out.extend_from_slice(CONNECTION_PREFACE);
        }
        let mut settings = vec![
            (settings_id::MAX_CONCURRENT_STREAMS, self.config.max_concurrent_streams),
            (settings_id::INITIAL_WINDOW_SIZE, self.config.initial_window_size),
            (settings_id::MAX_FRAME_SIZE, self.config.max_frame_size),
        ];
        if self.role == Role::Client {
            settings.insert(0, (settings_id::ENABLE_PUSH, 0));
        }
        debug!(role = ?self.role, "sending SETTINGS");
        out.extend_from_slice(&frame::create_settings(&settings));
        self.settings_sent = true;
    }

    pub(crate) fn send_headers(
        &mut self,
        message: &Http2Message,
        end_stream: bool,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let stream_id = message.stream_id;
        check_stream_id(stream_id)?;
        if self.is_closed(stream_id) {
            return Err(ParserError::invalid_state(format!("stream {stream_id} has ended")));
        }
        if !self.open.contains(&stream_id) {
            if self.goaway_sent {
                return Err(ParserError::invalid_state("GOAWAY sent, no new streams"));
            }
            if self.role == Role::Client && stream_id % 2 == 0 {
                return Err(ParserError::invalid_argument(format!(
                    "client streams use odd ids, got {stream_id}"
                )));
            }
        }
        if message.headers.is_empty() {
            return Err(ParserError::invalid_argument("header block is empty"));
        }
        self.start(out);

        let block = self.hpack.encode(&message.headers);
        let max = self.peer_max_frame_size as usize;
        let mut fragments = block.chunks(max);
        let first = fragments.next().unwrap_or_default();
        let mut rest = fragments.peekable();
        let end_headers = rest.peek().is_none();
        out.extend_from_slice(&frame::create_headers_frame(
            stream_id,
            first,
            end_stream,
            end_headers,
        ));
        while let Some(fragment) = rest.next() {
            let end_headers = rest.peek().is_none();
            out.extend_from_slice(&frame::create_continuation_frame(
                stream_id,
                fragment,
                end_headers,
            ));
        }
        trace!(stream_id, block_len = block.len(), end_stream, "sent header block");

        if end_stream {
            self.open.remove(&stream_id);
            self.closed.insert(stream_id);
        } else {
            self.open.insert(stream_id);
        }
        Ok(())
    }

    pub(crate) fn send_data(
        &mut self,
        stream_id: u32,
        data: &[u8],
        end_stream: bool,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        check_stream_id(stream_id)?;
        if !self.open.contains(&stream_id) {
            return Err(ParserError::invalid_state(format!(
                "stream {stream_id} is not open for data"
            )));
        }
        let max = self.peer_max_frame_size as usize;
        if data.is_empty() {
            if end_stream {
                out.extend_from_slice(&frame::create_data_frame(stream_id, &[], true));
            }
        } else {
            let mut chunks = data.chunks(max).peekable();
            while let Some(chunk) = chunks.next() {
                let last = chunks.peek().is_none();
                let end = end_stream && last;
                out.extend_from_slice(&frame::create_data_frame(stream_id, chunk, end));
            }
        }
        trace!(stream_id, len = data.len(), end_stream, "sent DATA");
        if end_stream {
            self.open.remove(&stream_id);
            self.closed.insert(stream_id);
        }
        Ok(())
    }

    pub(crate) fn reset_stream(
        &mut self,
        stream_id: u32,
        error_code: u32,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        check_stream_id(stream_id)?;
        self.start(out);
        debug!(stream_id, error_code, "sending RST_STREAM");
        out.extend_from_slice(&frame::create_rst_stream(stream_id, error_code));
        self.open.remove(&stream_id);
        self.closed.insert(stream_id);
        Ok(())
    }

    pub(crate) fn send_goaway(&mut self, error_code: u32, out: &mut Vec<u8>) {
        self.start(out);
        debug!(last_stream_id = self.last_peer_stream_id, error_code, "sending GOAWAY");
        out.extend_from_slice(&frame::create_goaway(self.last_peer_stream_id, error_code));
        self.goaway_sent = true;
    }
}
