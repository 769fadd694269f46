//! HTTP/2 frame state machine for one direction of a connection.
//!
//! Connection level: `PREFACE -> SETTINGS_EXCHANGED -> ACTIVE -> CLOSED`.
//! Frames are buffered until complete, then routed by stream id. Errors
//! come in two weights: stream-level ones are recorded and processing
//! continues with the next frame; connection-level ones stop the
//! direction for good (and, on the incoming leg, emit GOAWAY).
//!
//! Reference: RFC 7540 Sections 5 and 6

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use super::frame::{
    self, error_code, frame_type, H2FrameHeader, CONNECTION_PREFACE, FRAME_HEADER_LEN,
};
use super::hpack::HpackDecoder;
use super::stream::{H2Stream, RecentlyClosed, StreamState};
use crate::callbacks::{Flow, ParserCallbacks, Sink};
use crate::config::{ParserConfig, DEFAULT_INITIAL_WINDOW_SIZE};
use crate::connection::Direction;
use crate::content::BodyPipeline;
use crate::error::{FirstError, ParserError, Result};
use crate::headers::HttpHeaders;

/// Connection-level state of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H2ConnectionState {
    /// Waiting for the client preface and/or the first SETTINGS frame.
    Preface,
    SettingsExchanged,
    Active,
    /// GOAWAY seen, disconnected, or failed.
    Closed,
}

enum Failure {
    Stream(ParserError),
    Connection(ParserError, u32),
}

type FrameResult = std::result::Result<(), Failure>;

fn connection_error(msg: impl Into<String>, code: u32) -> Failure {
    Failure::Connection(ParserError::parse(msg), code)
}

fn stream_error(msg: impl Into<String>) -> Failure {
    Failure::Stream(ParserError::parse(msg))
}

/// What a header block will do once fully assembled.
enum Target {
    Open,
    /// Final headers after an interim 1xx response.
    Final,
    Trailers,
    /// Decoded only to keep HPACK in sync, then refused with RST_STREAM.
    Rejected(String, u32),
}

enum BlockPurpose {
    Headers(Target),
    PushPromise(u32),
}

/// HEADERS or PUSH_PROMISE waiting for CONTINUATION frames.
struct PendingBlock {
    stream_id: u32,
    end_stream: bool,
    purpose: BlockPurpose,
    block: Vec<u8>,
}

pub(crate) struct H2Decoder {
    direction: Direction,
    /// Whether this direction carries requests (and so opens odd streams).
    carries_requests: bool,
    config: ParserConfig,
    state: H2ConnectionState,
    buffer: Vec<u8>,
    preface_pending: bool,
    hpack: HpackDecoder,
    streams: HashMap<u32, H2Stream>,
    /// Highest stream id opened with the parity this direction initiates.
    watermark: u32,
    closed: RecentlyClosed,
    pending: Option<PendingBlock>,
    goaway_last_stream_id: Option<u32>,
    /// Connection-level DATA bytes not yet acknowledged.
    unacked: u32,
    failed: bool,
    eof: bool,
}

impl H2Decoder {
    pub(crate) fn new(direction: Direction, carries_requests: bool, config: ParserConfig) -> Self {
        let closed = RecentlyClosed::new(config.closed_stream_memory);
        Self {
            direction,
            carries_requests,
            config,
            state: H2ConnectionState::Preface,
            buffer: Vec::new(),
            preface_pending: carries_requests,
            hpack: HpackDecoder::new(),
            streams: HashMap::new(),
            watermark: 0,
            closed,
            pending: None,
            goaway_last_stream_id: None,
            unacked: 0,
            failed: false,
            eof: false,
        }
    }

    pub(crate) fn state(&self) -> H2ConnectionState {
        self.state
    }

    pub(crate) fn stream_state(&self, stream_id: u32) -> Option<StreamState> {
        self.streams.get(&stream_id).map(|s| s.state)
    }

    pub(crate) fn open_streams(&self) -> usize {
        self.streams.len()
    }

    fn is_incoming(&self) -> bool {
        self.direction == Direction::Incoming
    }

    /// Process incoming data, raising events through `sink`.
    pub(crate) fn feed<C: ParserCallbacks>(
        &mut self,
        data: &[u8],
        sink: &mut Sink<'_, C>,
    ) -> Result<()> {
        if self.eof {
            return Err(ParserError::invalid_state("input after disconnect"));
        }
        if self.failed {
            return Err(ParserError::parse("direction failed on an earlier protocol error"));
        }
        self.buffer.extend_from_slice(data);
        let mut errors = FirstError::default();

        // Check for connection preface (client sends this first)
        if self.preface_pending {
            let n = self.buffer.len().min(CONNECTION_PREFACE.len());
            if self.buffer[..n] != CONNECTION_PREFACE[..n] {
                let err = ParserError::parse("invalid HTTP/2 connection preface");
                self.fail(err.clone(), error_code::PROTOCOL_ERROR, sink, &mut errors);
                errors.record(err);
                return errors.into_result();
            }
            if n < CONNECTION_PREFACE.len() {
                return Ok(());
            }
            self.buffer.drain(..CONNECTION_PREFACE.len());
            self.preface_pending = false;
            debug!(direction = ?self.direction, "connection preface received");
        }

        // Parse frames
        loop {
            let Some(header) = H2FrameHeader::parse(&self.buffer) else {
                break;
            };
            if self.is_incoming() && header.length > self.config.max_frame_size {
                let err = ParserError::parse(format!(
                    "frame of {} bytes exceeds the advertised maximum of {}",
                    header.length, self.config.max_frame_size
                ));
                self.fail(err.clone(), error_code::FRAME_SIZE_ERROR, sink, &mut errors);
                errors.record(err);
                break;
            }
            // Check if we have the complete frame
            let total_size = header.total_size();
            if self.buffer.len() < total_size {
                break;
            }

            // Split buffer to avoid double copy: the frame stays in `frame_data`,
            // the remainder becomes the new buffer.
            let remainder = self.buffer.split_off(total_size);
            let mut frame_data = std::mem::replace(&mut self.buffer, remainder);
            frame_data.drain(..FRAME_HEADER_LEN);

            match self.process_frame(&header, frame_data, sink, &mut errors) {
                Ok(()) => {}
                Err(Failure::Stream(err)) => {
                    warn!(
                        direction = ?self.direction,
                        stream_id = header.stream_id,
                        error = %err,
                        "HTTP/2 stream error"
                    );
                    errors.record(err);
                }
                Err(Failure::Connection(err, code)) => {
                    self.fail(err.clone(), code, sink, &mut errors);
                    errors.record(err);
                    break;
                }
            }
        }
        errors.into_result()
    }

    /// End of stream on this direction. Streams still open end as reset.
    pub(crate) fn disconnect<C: ParserCallbacks>(&mut self, sink: &mut Sink<'_, C>) -> Result<()> {
        if self.eof {
            return Err(ParserError::invalid_state("direction already disconnected"));
        }
        self.eof = true;
        let mut errors = FirstError::default();
        if !self.failed && (!self.buffer.is_empty() || self.pending.is_some()) {
            warn!(
                direction = ?self.direction,
                buffered = self.buffer.len(),
                "connection closed mid-frame"
            );
            errors.record(ParserError::parse("connection closed in the middle of a frame"));
        }
        self.buffer.clear();
        self.pending = None;
        self.release_streams(sink, &mut errors);
        self.state = H2ConnectionState::Closed;
        errors.into_result()
    }

    fn fail<C: ParserCallbacks>(
        &mut self,
        err: ParserError,
        code: u32,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) {
        warn!(direction = ?self.direction, error = %err, code, "HTTP/2 connection error");
        self.failed = true;
        self.buffer.clear();
        self.pending = None;
        self.state = H2ConnectionState::Closed;
        if self.is_incoming() && sink.outbound.send_h2_goaway(code).is_ok() {
            sink.flush();
        }
        self.release_streams(sink, errors);
    }

    fn release_streams<C: ParserCallbacks>(
        &mut self,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) {
        let mut ids: Vec<u32> = self.streams.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            self.finish_stream(id, true, sink, errors);
        }
    }

    fn process_frame<C: ParserCallbacks>(
        &mut self,
        header: &H2FrameHeader,
        payload: Vec<u8>,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) -> FrameResult {
        trace!(
            direction = ?self.direction,
            frame_type = header.frame_type,
            flags = header.flags,
            stream_id = header.stream_id,
            len = header.length,
            "frame"
        );
        if let Some(pending) = &self.pending {
            if header.frame_type != frame_type::CONTINUATION
                || header.stream_id != pending.stream_id
            {
                return Err(connection_error(
                    format!(
                        "expected CONTINUATION for stream {}, got frame type {} on stream {}",
                        pending.stream_id, header.frame_type, header.stream_id
                    ),
                    error_code::PROTOCOL_ERROR,
                ));
            }
        }
        match self.state {
            H2ConnectionState::Preface => {
                if header.frame_type != frame_type::SETTINGS || header.is_ack() {
                    return Err(connection_error(
                        "first frame must be SETTINGS",
                        error_code::PROTOCOL_ERROR,
                    ));
                }
            }
            H2ConnectionState::SettingsExchanged => self.state = H2ConnectionState::Active,
            _ => {}
        }

        match header.frame_type {
            frame_type::DATA => self.on_data(header, payload, sink, errors),
            frame_type::HEADERS => self.on_headers(header, payload, sink, errors),
            frame_type::PRIORITY => {
                if header.stream_id == 0 {
                    return Err(connection_error(
                        "PRIORITY on stream 0",
                        error_code::PROTOCOL_ERROR,
                    ));
                }
                if payload.len() != 5 {
                    return Err(stream_error(format!("PRIORITY frame of {} bytes", payload.len())));
                }
                // Ignore PRIORITY frames
                Ok(())
            }
            frame_type::RST_STREAM => self.on_rst_stream(header, &payload, sink, errors),
            frame_type::SETTINGS => self.on_settings(header, &payload, sink),
            frame_type::PUSH_PROMISE => self.on_push_promise(header, payload),
            frame_type::PING => {
                if header.stream_id != 0 {
                    return Err(connection_error("PING on a stream", error_code::PROTOCOL_ERROR));
                }
                if payload.len() != 8 {
                    return Err(connection_error(
                        "PING frame must be 8 bytes",
                        error_code::FRAME_SIZE_ERROR,
                    ));
                }
                if !header.is_ack() && self.is_incoming() {
                    let mut data = [0u8; 8];
                    data.copy_from_slice(&payload);
                    sink.emit(&frame::create_ping_ack(data));
                }
                Ok(())
            }
            frame_type::GOAWAY => self.on_goaway(header, &payload, sink, errors),
            frame_type::WINDOW_UPDATE => {
                if payload.len() != 4 {
                    return Err(connection_error(
                        "WINDOW_UPDATE frame must be 4 bytes",
                        error_code::FRAME_SIZE_ERROR,
                    ));
                }
                let increment = frame::read_u32(&payload) & 0x7FFF_FFFF;
                if increment == 0 {
                    if header.stream_id == 0 {
                        return Err(connection_error(
                            "zero WINDOW_UPDATE increment",
                            error_code::PROTOCOL_ERROR,
                        ));
                    }
                    return Err(stream_error(format!(
                        "zero WINDOW_UPDATE increment on stream {}",
                        header.stream_id
                    )));
                }
                if header.stream_id != 0 && self.is_idle(header.stream_id) {
                    return Err(stream_error(format!(
                        "WINDOW_UPDATE on idle stream {}",
                        header.stream_id
                    )));
                }
                trace!(stream_id = header.stream_id, increment, "window update");
                Ok(())
            }
            frame_type::CONTINUATION => self.on_continuation(header, payload, sink, errors),
            _ => {
                // Unknown frame type - ignore
                Ok(())
            }
        }
    }

    /// Whether `stream_id` can no longer be opened on this direction.
    fn is_closed(&self, stream_id: u32) -> bool {
        let own_parity = (stream_id % 2 == 1) == self.carries_requests;
        (own_parity && stream_id <= self.watermark) || self.closed.contains(stream_id)
    }

    /// An id of this direction's own parity that was never opened.
    fn is_idle(&self, stream_id: u32) -> bool {
        let own_parity = (stream_id % 2 == 1) == self.carries_requests;
        own_parity
            && stream_id > self.watermark
            && !self.streams.contains_key(&stream_id)
            && !self.closed.contains(stream_id)
    }

    /// Replenish the connection window once half of it is consumed.
    fn consume_connection_window<C: ParserCallbacks>(&mut self, len: u32, sink: &mut Sink<'_, C>) {
        if !self.is_incoming() || !self.config.auto_window_update || len == 0 {
            return;
        }
        self.unacked += len;
        if self.unacked >= DEFAULT_INITIAL_WINDOW_SIZE / 2 {
            sink.emit(&frame::create_window_update(0, self.unacked));
            self.unacked = 0;
        }
    }

    fn stream_window_threshold(&self) -> u32 {
        (self.config.initial_window_size.min(DEFAULT_INITIAL_WINDOW_SIZE) / 2).max(1)
    }

    fn on_data<C: ParserCallbacks>(
        &mut self,
        header: &H2FrameHeader,
        payload: Vec<u8>,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) -> FrameResult {
        let stream_id = header.stream_id;
        if stream_id == 0 {
            return Err(connection_error("DATA on stream 0", error_code::PROTOCOL_ERROR));
        }
        let data = frame::extract_data_payload(header, payload)
            .map_err(|e| Failure::Connection(e, error_code::PROTOCOL_ERROR))?;
        // Padding counts against flow control too
        self.consume_connection_window(header.length, sink);

        let threshold = self.stream_window_threshold();
        let auto_update = self.is_incoming() && self.config.auto_window_update;
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return Err(self.closed_stream_frame(stream_id, "DATA", sink));
        };
        if stream.state != StreamState::Body {
            let state = stream.state;
            self.reset_stream(stream_id, error_code::PROTOCOL_ERROR, sink, errors);
            return Err(stream_error(format!("DATA on stream {stream_id} in state {state:?}")));
        }

        if !stream.aborted && stream.data_started && !data.is_empty() {
            match stream.pipeline.process(&data) {
                Ok(out) if !out.is_empty() => sink.h2_data(&stream.message, &out),
                Ok(_) => {}
                Err(err) => errors.record(err),
            }
        }
        if header.is_end_stream() {
            stream.state = StreamState::HalfClosed;
            self.finish_stream(stream_id, false, sink, errors);
        } else if auto_update && header.length > 0 {
            stream.unacked += header.length;
            if stream.unacked >= threshold {
                sink.emit(&frame::create_window_update(stream_id, stream.unacked));
                stream.unacked = 0;
            }
        }
        Ok(())
    }

    /// A frame for a stream this direction has no record of.
    fn closed_stream_frame<C: ParserCallbacks>(
        &mut self,
        stream_id: u32,
        kind: &str,
        sink: &mut Sink<'_, C>,
    ) -> Failure {
        if self.is_incoming() {
            sink.emit(&frame::create_rst_stream(stream_id, error_code::STREAM_CLOSED));
        }
        let what = if self.is_closed(stream_id) { "closed" } else { "idle" };
        stream_error(format!("{kind} frame on {what} stream {stream_id}"))
    }

    fn classify_headers(&self, stream_id: u32) -> Target {
        if let Some(stream) = self.streams.get(&stream_id) {
            return match stream.state {
                StreamState::Body => Target::Trailers,
                StreamState::Idle => Target::Final,
                state => Target::Rejected(
                    format!("HEADERS on stream {stream_id} in state {state:?}"),
                    error_code::PROTOCOL_ERROR,
                ),
            };
        }
        if self.is_closed(stream_id) {
            return Target::Rejected(
                format!("HEADERS frame on closed stream {stream_id}"),
                error_code::STREAM_CLOSED,
            );
        }
        if self.carries_requests && stream_id % 2 == 0 {
            return Target::Rejected(
                format!("request on even stream id {stream_id}"),
                error_code::PROTOCOL_ERROR,
            );
        }
        if self.goaway_last_stream_id.is_some() {
            return Target::Rejected(
                format!("stream {stream_id} opened after GOAWAY"),
                error_code::REFUSED_STREAM,
            );
        }
        if self.is_incoming() && self.streams.len() >= self.config.max_concurrent_streams as usize {
            return Target::Rejected(
                format!("stream {stream_id} exceeds the concurrent stream limit"),
                error_code::REFUSED_STREAM,
            );
        }
        Target::Open
    }

    fn check_block_size(&self, len: usize) -> FrameResult {
        if len > self.config.max_header_block_size {
            return Err(connection_error(
                format!(
                    "Header block too large ({} bytes, max {})",
                    len, self.config.max_header_block_size
                ),
                error_code::ENHANCE_YOUR_CALM,
            ));
        }
        Ok(())
    }

    fn on_headers<C: ParserCallbacks>(
        &mut self,
        header: &H2FrameHeader,
        payload: Vec<u8>,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) -> FrameResult {
        let stream_id = header.stream_id;
        if stream_id == 0 {
            return Err(connection_error("HEADERS on stream 0", error_code::PROTOCOL_ERROR));
        }
        let block = frame::extract_headers_payload(header, payload)
            .map_err(|e| Failure::Connection(e, error_code::PROTOCOL_ERROR))?;
        self.check_block_size(block.len())?;
        let target = self.classify_headers(stream_id);

        if header.is_end_headers() {
            let end_stream = header.is_end_stream();
            return self.complete_headers(stream_id, end_stream, target, &block, sink, errors);
        }
        // Headers span multiple frames - accumulate and wait for CONTINUATION
        match &target {
            Target::Open => {
                let mut placeholder = H2Stream::new(stream_id);
                placeholder.state = StreamState::HeadersInProgress;
                self.streams.insert(stream_id, placeholder);
            }
            Target::Final | Target::Trailers => {
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.state = StreamState::HeadersInProgress;
                }
            }
            Target::Rejected(..) => {}
        }
        self.pending = Some(PendingBlock {
            stream_id,
            end_stream: header.is_end_stream(),
            purpose: BlockPurpose::Headers(target),
            block,
        });
        Ok(())
    }

    fn on_continuation<C: ParserCallbacks>(
        &mut self,
        header: &H2FrameHeader,
        payload: Vec<u8>,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) -> FrameResult {
        let Some(mut pending) = self.pending.take() else {
            return Err(connection_error(
                format!("Unexpected CONTINUATION frame for stream {}", header.stream_id),
                error_code::PROTOCOL_ERROR,
            ));
        };
        // Guard against unbounded header block accumulation
        self.check_block_size(pending.block.len() + payload.len())?;
        pending.block.extend_from_slice(&payload);
        if !header.is_end_headers() {
            self.pending = Some(pending);
            return Ok(());
        }
        match pending.purpose {
            BlockPurpose::Headers(target) => self.complete_headers(
                pending.stream_id,
                pending.end_stream,
                target,
                &pending.block,
                sink,
                errors,
            ),
            BlockPurpose::PushPromise(promised) => {
                self.complete_push_promise(promised, &pending.block)
            }
        }
    }

    fn complete_headers<C: ParserCallbacks>(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        target: Target,
        block: &[u8],
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) -> FrameResult {
        // Always decode so the dynamic table stays in sync
        let headers = self
            .hpack
            .decode(block)
            .map_err(|e| Failure::Connection(e, error_code::COMPRESSION_ERROR))?;

        match target {
            Target::Rejected(msg, code) => {
                if self.streams.contains_key(&stream_id) {
                    self.reset_stream(stream_id, code, sink, errors);
                } else {
                    self.closed.insert(stream_id);
                    if self.is_incoming() {
                        sink.emit(&frame::create_rst_stream(stream_id, code));
                    }
                }
                Err(stream_error(msg))
            }
            Target::Open => {
                self.streams.remove(&stream_id);
                if (stream_id % 2 == 1) == self.carries_requests {
                    self.watermark = self.watermark.max(stream_id);
                }
                if self.is_incoming() {
                    if let Ok(encoder) = sink.outbound.h2() {
                        encoder.note_peer_stream(stream_id);
                    }
                }
                debug!(direction = ?self.direction, stream_id, end_stream, "stream opened");
                let mut stream = H2Stream::new(stream_id);
                stream.message.headers = headers;
                self.deliver_headers(stream, end_stream, sink, errors);
                Ok(())
            }
            Target::Final => {
                let Some(mut stream) = self.streams.remove(&stream_id) else {
                    return Err(stream_error(format!("stream {stream_id} vanished")));
                };
                stream.message.headers = headers;
                self.deliver_headers(stream, end_stream, sink, errors);
                Ok(())
            }
            Target::Trailers => {
                if !end_stream {
                    self.reset_stream(stream_id, error_code::PROTOCOL_ERROR, sink, errors);
                    return Err(stream_error(format!(
                        "trailers without END_STREAM on stream {stream_id}"
                    )));
                }
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.message.trailers = headers;
                    stream.state = StreamState::HalfClosed;
                }
                self.finish_stream(stream_id, false, sink, errors);
                Ok(())
            }
        }
    }

    fn deliver_headers<C: ParserCallbacks>(
        &mut self,
        mut stream: H2Stream,
        end_stream: bool,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) {
        let stream_id = stream.message.stream_id;
        stream.delivered = true;
        if !stream.aborted && sink.h2_headers(&stream.message) == Flow::Abort {
            debug!(direction = ?self.direction, stream_id, "stream aborted by callback");
            stream.aborted = true;
        }
        let interim = !self.carries_requests && is_interim(&stream.message.headers);
        if interim && !end_stream {
            stream.state = StreamState::Idle;
            self.streams.insert(stream_id, stream);
            return;
        }
        if end_stream {
            stream.state = StreamState::HalfClosed;
            self.streams.insert(stream_id, stream);
            self.finish_stream(stream_id, false, sink, errors);
            return;
        }
        if !stream.aborted {
            let decompress = sink.h2_data_started(&stream.message);
            stream.pipeline = BodyPipeline::select(decompress, &stream.message.headers);
            stream.data_started = true;
        }
        stream.state = StreamState::Body;
        self.streams.insert(stream_id, stream);
    }

    /// Remove a stream, raising its final event once.
    fn finish_stream<C: ParserCallbacks>(
        &mut self,
        stream_id: u32,
        is_reset: bool,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) {
        let Some(mut stream) = self.streams.remove(&stream_id) else {
            return;
        };
        stream.state = if is_reset {
            StreamState::Reset
        } else {
            StreamState::Closed
        };
        if stream.is_reported() {
            if !is_reset && stream.data_started {
                match stream.pipeline.finish() {
                    Ok(tail) if !tail.is_empty() => sink.h2_data(&stream.message, &tail),
                    Ok(_) => {}
                    Err(err) => errors.record(err),
                }
            }
            sink.h2_data_finished(&stream.message, is_reset);
        }
        self.closed.insert(stream_id);
        debug!(direction = ?self.direction, stream_id, state = ?stream.state, "stream closed");
    }

    /// Reset a stream after a stream-level protocol error.
    fn reset_stream<C: ParserCallbacks>(
        &mut self,
        stream_id: u32,
        code: u32,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) {
        if self.is_incoming() {
            sink.emit(&frame::create_rst_stream(stream_id, code));
            if let Ok(encoder) = sink.outbound.h2() {
                encoder.peer_reset(stream_id);
            }
        }
        self.finish_stream(stream_id, true, sink, errors);
    }

    fn on_rst_stream<C: ParserCallbacks>(
        &mut self,
        header: &H2FrameHeader,
        payload: &[u8],
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) -> FrameResult {
        if header.stream_id == 0 {
            return Err(connection_error("RST_STREAM on stream 0", error_code::PROTOCOL_ERROR));
        }
        if payload.len() != 4 {
            return Err(connection_error(
                "RST_STREAM frame must be 4 bytes",
                error_code::FRAME_SIZE_ERROR,
            ));
        }
        if self.is_idle(header.stream_id) {
            return Err(stream_error(format!("RST_STREAM on idle stream {}", header.stream_id)));
        }
        let code = frame::read_u32(payload);
        debug!(
            direction = ?self.direction,
            stream_id = header.stream_id,
            code,
            "RST_STREAM received"
        );
        if self.is_incoming() {
            if let Ok(encoder) = sink.outbound.h2() {
                encoder.peer_reset(header.stream_id);
            }
        }
        // Late resets for streams already gone are harmless
        self.finish_stream(header.stream_id, true, sink, errors);
        Ok(())
    }

    fn on_settings<C: ParserCallbacks>(
        &mut self,
        header: &H2FrameHeader,
        payload: &[u8],
        sink: &mut Sink<'_, C>,
    ) -> FrameResult {
        if header.stream_id != 0 {
            return Err(connection_error("SETTINGS on a stream", error_code::PROTOCOL_ERROR));
        }
        if header.is_ack() {
            if !payload.is_empty() {
                return Err(connection_error(
                    "SETTINGS ACK with payload",
                    error_code::FRAME_SIZE_ERROR,
                ));
            }
            trace!(direction = ?self.direction, "SETTINGS acknowledged");
            return Ok(());
        }
        if payload.len() % 6 != 0 {
            return Err(connection_error(
                "SETTINGS payload not a multiple of 6",
                error_code::FRAME_SIZE_ERROR,
            ));
        }
        let settings = frame::parse_settings(payload)
            .map_err(|e| Failure::Connection(e, error_code::PROTOCOL_ERROR))?;
        debug!(direction = ?self.direction, ?settings, "SETTINGS received");
        if self.is_incoming() {
            if let Ok(encoder) = sink.outbound.h2() {
                encoder.apply_peer_settings(&settings);
            }
            sink.emit(&frame::create_settings_ack());
        }
        if self.state == H2ConnectionState::Preface {
            self.state = H2ConnectionState::SettingsExchanged;
        }
        Ok(())
    }

    fn on_push_promise(&mut self, header: &H2FrameHeader, payload: Vec<u8>) -> FrameResult {
        if header.stream_id == 0 {
            return Err(connection_error("PUSH_PROMISE on stream 0", error_code::PROTOCOL_ERROR));
        }
        if self.carries_requests {
            return Err(connection_error(
                "PUSH_PROMISE sent by a client",
                error_code::PROTOCOL_ERROR,
            ));
        }
        let (promised, block) = frame::extract_push_promise_payload(header, payload)
            .map_err(|e| Failure::Connection(e, error_code::PROTOCOL_ERROR))?;
        self.check_block_size(block.len())?;
        if header.is_end_headers() {
            return self.complete_push_promise(promised, &block);
        }
        self.pending = Some(PendingBlock {
            stream_id: header.stream_id,
            end_stream: false,
            purpose: BlockPurpose::PushPromise(promised),
            block,
        });
        Ok(())
    }

    /// Promised requests are not surfaced; the block is decoded for HPACK.
    fn complete_push_promise(&mut self, promised: u32, block: &[u8]) -> FrameResult {
        let headers = self
            .hpack
            .decode(block)
            .map_err(|e| Failure::Connection(e, error_code::COMPRESSION_ERROR))?;
        debug!(
            direction = ?self.direction,
            promised,
            fields = headers.len(),
            "PUSH_PROMISE ignored"
        );
        Ok(())
    }

    fn on_goaway<C: ParserCallbacks>(
        &mut self,
        header: &H2FrameHeader,
        payload: &[u8],
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) -> FrameResult {
        if header.stream_id != 0 {
            return Err(connection_error("GOAWAY on a stream", error_code::PROTOCOL_ERROR));
        }
        if payload.len() < 8 {
            return Err(connection_error("GOAWAY frame too short", error_code::FRAME_SIZE_ERROR));
        }
        let last_stream_id = frame::read_u32(payload) & 0x7FFF_FFFF;
        let code = frame::read_u32(&payload[4..]);
        debug!(direction = ?self.direction, last_stream_id, code, "GOAWAY received");
        let last = self
            .goaway_last_stream_id
            .map_or(last_stream_id, |previous| previous.min(last_stream_id));
        self.goaway_last_stream_id = Some(last);
        self.state = H2ConnectionState::Closed;

        let mut doomed: Vec<u32> = self.streams.keys().copied().filter(|&id| id > last).collect();
        doomed.sort_unstable();
        for stream_id in doomed {
            self.finish_stream(stream_id, true, sink, errors);
        }
        Ok(())
    }
}

/// A 1xx response header block, which a final response will follow.
fn is_interim(headers: &HttpHeaders) -> bool {
    headers
        .get(":status")
        .and_then(|s| s.parse::<u16>().ok())
        .is_some_and(|code| (100..200).contains(&code))
}
