//! Embedder callbacks and the context handed to them.
//!
//! Every parse event is delivered through [`ParserCallbacks`]. Each call
//! gets a [`Context`] that can queue outbound traffic on the same
//! connection; queued bytes are passed to [`ParserCallbacks::raw_output`]
//! as soon as the callback returns, before any further event is raised.

use crate::connection::{ConnectionId, Direction};
use crate::error::{ParserError, Result};
use crate::h1::encoder::H1Encoder;
use crate::h2::encoder::H2Encoder;
use crate::message::{Http2Message, HttpMessage};

/// Returned by header callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    /// Stop raising events for this message or stream. Its bytes are still
    /// consumed so the connection stays in sync.
    Abort,
}

/// Event sink implemented by the embedder. All methods default to no-ops.
#[allow(unused_variables)]
pub trait ParserCallbacks {
    /// A complete HTTP/1 head was parsed.
    fn h1_headers(&mut self, cx: &mut Context<'_>, message: &HttpMessage) -> Flow {
        Flow::Continue
    }

    /// The message has a body. Return `true` to have it decompressed
    /// according to `Content-Encoding`.
    fn h1_data_started(&mut self, cx: &mut Context<'_>, message: &HttpMessage) -> bool {
        false
    }

    fn h1_data(&mut self, cx: &mut Context<'_>, message: &HttpMessage, data: &[u8]) {}

    /// The message is complete; trailers, if any, are on `message`.
    fn h1_data_finished(&mut self, cx: &mut Context<'_>, message: &HttpMessage) {}

    /// A header block opened (or, for 1xx responses, informed) a stream.
    fn h2_headers(&mut self, cx: &mut Context<'_>, message: &Http2Message) -> Flow {
        Flow::Continue
    }

    fn h2_data_started(&mut self, cx: &mut Context<'_>, message: &Http2Message) -> bool {
        false
    }

    fn h2_data(&mut self, cx: &mut Context<'_>, message: &Http2Message, data: &[u8]) {}

    /// The stream half ended. `is_reset` is set when it ended through
    /// RST_STREAM, GOAWAY or a disconnect instead of END_STREAM.
    fn h2_data_finished(&mut self, cx: &mut Context<'_>, message: &Http2Message, is_reset: bool) {}

    /// Bytes ready to be written to the outgoing transport.
    fn raw_output(&mut self, id: ConnectionId, data: &[u8]) {}
}

pub(crate) enum Encoder {
    Http1(H1Encoder),
    Http2(H2Encoder),
}

/// Outbound side of a connection: protocol encoder plus bytes queued for
/// [`ParserCallbacks::raw_output`].
pub(crate) struct Outbound {
    pub(crate) encoder: Encoder,
    pub(crate) pending: Vec<u8>,
}

impl Outbound {
    pub(crate) fn new(encoder: Encoder) -> Self {
        Self {
            encoder,
            pending: Vec::new(),
        }
    }

    pub(crate) fn h1(&mut self) -> Result<&mut H1Encoder> {
        match &mut self.encoder {
            Encoder::Http1(encoder) => Ok(encoder),
            Encoder::Http2(_) => Err(ParserError::invalid_state("connection speaks HTTP/2")),
        }
    }

    pub(crate) fn h2(&mut self) -> Result<&mut H2Encoder> {
        match &mut self.encoder {
            Encoder::Http2(encoder) => Ok(encoder),
            Encoder::Http1(_) => Err(ParserError::invalid_state("connection speaks HTTP/1")),
        }
    }

    pub(crate) fn send_h1_headers(&mut self, message: &HttpMessage) -> Result<()> {
        let Encoder::Http1(encoder) = &mut self.encoder else {
            return Err(ParserError::invalid_state("connection speaks HTTP/2"));
        };
        encoder.send_headers(message, &mut self.pending)
    }

    pub(crate) fn send_h1_data(&mut self, data: &[u8], eof: bool) -> Result<()> {
        let Encoder::Http1(encoder) = &mut self.encoder else {
            return Err(ParserError::invalid_state("connection speaks HTTP/2"));
        };
        encoder.send_data(data, eof, &mut self.pending)
    }

    pub(crate) fn send_h1_message(&mut self, message: &HttpMessage) -> Result<()> {
        let Encoder::Http1(encoder) = &mut self.encoder else {
            return Err(ParserError::invalid_state("connection speaks HTTP/2"));
        };
        encoder.send_message(message, &mut self.pending)
    }

    pub(crate) fn send_h2_settings(&mut self) -> Result<()> {
        let Encoder::Http2(encoder) = &mut self.encoder else {
            return Err(ParserError::invalid_state("connection speaks HTTP/1"));
        };
        encoder.send_settings(&mut self.pending);
        Ok(())
    }

    pub(crate) fn send_h2_headers(
        &mut self,
        message: &Http2Message,
        end_stream: bool,
    ) -> Result<()> {
        let Encoder::Http2(encoder) = &mut self.encoder else {
            return Err(ParserError::invalid_state("connection speaks HTTP/1"));
        };
        encoder.send_headers(message, end_stream, &mut self.pending)
    }

    pub(crate) fn send_h2_data(
        &mut self,
        stream_id: u32,
        data: &[u8],
        end_stream: bool,
    ) -> Result<()> {
        let Encoder::Http2(encoder) = &mut self.encoder else {
            return Err(ParserError::invalid_state("connection speaks HTTP/1"));
        };
        encoder.send_data(stream_id, data, end_stream, &mut self.pending)
    }

    pub(crate) fn reset_h2_stream(&mut self, stream_id: u32, error_code: u32) -> Result<()> {
        let Encoder::Http2(encoder) = &mut self.encoder else {
            return Err(ParserError::invalid_state("connection speaks HTTP/1"));
        };
        encoder.reset_stream(stream_id, error_code, &mut self.pending)
    }

    pub(crate) fn send_h2_goaway(&mut self, error_code: u32) -> Result<()> {
        let Encoder::Http2(encoder) = &mut self.encoder else {
            return Err(ParserError::invalid_state("connection speaks HTTP/1"));
        };
        encoder.send_goaway(error_code, &mut self.pending);
        Ok(())
    }
}

/// Handle passed into every parse callback.
///
/// Sends made here are queued and written out through
/// [`raw_output`](ParserCallbacks::raw_output) right after the callback
/// returns, so they never interleave with a partially emitted frame.
pub struct Context<'a> {
    id: ConnectionId,
    direction: Direction,
    outbound: &'a mut Outbound,
}

impl<'a> Context<'a> {
    pub(crate) fn new(id: ConnectionId, direction: Direction, outbound: &'a mut Outbound) -> Self {
        Self { id, direction, outbound }
    }

    /// The embedder-chosen id the connection was opened with.
    pub fn attachment(&self) -> ConnectionId {
        self.id
    }

    /// Direction of the byte stream that produced this event.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn send_h1_headers(&mut self, message: &HttpMessage) -> Result<()> {
        self.outbound.send_h1_headers(message)
    }

    pub fn send_h1_data(&mut self, data: &[u8], eof: bool) -> Result<()> {
        self.outbound.send_h1_data(data, eof)
    }

    /// Head plus the message's stored body, ending the message.
    pub fn send_h1_message(&mut self, message: &HttpMessage) -> Result<()> {
        self.outbound.send_h1_message(message)
    }

    pub fn send_h2_settings(&mut self) -> Result<()> {
        self.outbound.send_h2_settings()
    }

    pub fn send_h2_headers(&mut self, message: &Http2Message, end_stream: bool) -> Result<()> {
        self.outbound.send_h2_headers(message, end_stream)
    }

    pub fn send_h2_data(&mut self, stream_id: u32, data: &[u8], end_stream: bool) -> Result<()> {
        self.outbound.send_h2_data(stream_id, data, end_stream)
    }

    pub fn reset_h2_stream(&mut self, stream_id: u32, error_code: u32) -> Result<()> {
        self.outbound.reset_h2_stream(stream_id, error_code)
    }

    pub fn send_h2_goaway(&mut self, error_code: u32) -> Result<()> {
        self.outbound.send_h2_goaway(error_code)
    }
}

/// Routes decoder events to the embedder for one direction, flushing
/// queued output after every callback.
pub(crate) struct Sink<'a, C: ParserCallbacks> {
    pub(crate) id: ConnectionId,
    pub(crate) direction: Direction,
    pub(crate) callbacks: &'a mut C,
    pub(crate) outbound: &'a mut Outbound,
}

impl<'a, C: ParserCallbacks> Sink<'a, C> {
    pub(crate) fn new(
        id: ConnectionId,
        direction: Direction,
        callbacks: &'a mut C,
        outbound: &'a mut Outbound,
    ) -> Self {
        Self {
            id,
            direction,
            callbacks,
            outbound,
        }
    }

    pub(crate) fn flush(&mut self) {
        if self.outbound.pending.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.outbound.pending);
        self.callbacks.raw_output(self.id, &data);
    }

    /// Write a frame generated by the engine itself (ACKs, WINDOW_UPDATE,
    /// RST_STREAM, GOAWAY).
    pub(crate) fn emit(&mut self, data: &[u8]) {
        self.flush();
        self.callbacks.raw_output(self.id, data);
    }

    pub(crate) fn h1_headers(&mut self, message: &HttpMessage) -> Flow {
        let mut cx = Context::new(self.id, self.direction, &mut *self.outbound);
        let flow = self.callbacks.h1_headers(&mut cx, message);
        self.flush();
        flow
    }

    pub(crate) fn h1_data_started(&mut self, message: &HttpMessage) -> bool {
        let mut cx = Context::new(self.id, self.direction, &mut *self.outbound);
        let decompress = self.callbacks.h1_data_started(&mut cx, message);
        self.flush();
        decompress
    }

    pub(crate) fn h1_data(&mut self, message: &HttpMessage, data: &[u8]) {
        let mut cx = Context::new(self.id, self.direction, &mut *self.outbound);
        self.callbacks.h1_data(&mut cx, message, data);
        self.flush();
    }

    pub(crate) fn h1_data_finished(&mut self, message: &HttpMessage) {
        let mut cx = Context::new(self.id, self.direction, &mut *self.outbound);
        self.callbacks.h1_data_finished(&mut cx, message);
        self.flush();
    }

    pub(crate) fn h2_headers(&mut self, message: &Http2Message) -> Flow {
        let mut cx = Context::new(self.id, self.direction, &mut *self.outbound);
        let flow = self.callbacks.h2_headers(&mut cx, message);
        self.flush();
        flow
    }

    pub(crate) fn h2_data_started(&mut self, message: &Http2Message) -> bool {
        let mut cx = Context::new(self.id, self.direction, &mut *self.outbound);
        let decompress = self.callbacks.h2_data_started(&mut cx, message);
        self.flush();
        decompress
    }

    pub(crate) fn h2_data(&mut self, message: &Http2Message, data: &[u8]) {
        let mut cx = Context::new(self.id, self.direction, &mut *self.outbound);
        self.callbacks.h2_data(&mut cx, message, data);
        self.flush();
    }

    pub(crate) fn h2_data_finished(&mut self, message: &Http2Message, is_reset: bool) {
        let mut cx = Context::new(self.id, self.direction, &mut *self.outbound);
        self.callbacks.h2_data_finished(&mut cx, message, is_reset);
        self.flush();
    }
}
