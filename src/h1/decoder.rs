//! Incremental HTTP/1.x decoder for one direction of a connection.
//!
//! `START_LINE -> HEADERS -> BODY -> DONE`, looping back to `START_LINE`
//! for the next keep-alive message. A framing or syntax error moves the
//! direction to `FAILED`, which is terminal.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use super::{request_framing, response_framing, BodyFraming};
use crate::callbacks::{Flow, ParserCallbacks, Sink};
use crate::config::ParserConfig;
use crate::content::BodyPipeline;
use crate::error::{FirstError, ParserError, Result};
use crate::headers::HeaderField;
use crate::message::{HttpMessage, MessageKind, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum H1State {
    StartLine,
    Headers,
    Body,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyState {
    Length(u64),
    ChunkSize,
    ChunkData(u64),
    ChunkDataEnd,
    Trailers,
    UntilClose,
}

pub(crate) struct H1Decoder {
    kind: MessageKind,
    config: ParserConfig,
    buf: BytesMut,
    state: H1State,
    body: BodyState,
    message: HttpMessage,
    pipeline: BodyPipeline,
    data_started: bool,
    aborted: bool,
    trailer_bytes: usize,
    eof: bool,
}

fn validate_request_line(line: &[u8]) -> std::result::Result<(), String> {
    let parts: Vec<&[u8]> = line.split(|&b| b == b' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(format!("malformed request line {:?}", String::from_utf8_lossy(line)));
    };
    if method.is_empty() || target.is_empty() {
        return Err(format!("malformed request line {:?}", String::from_utf8_lossy(line)));
    }
    if *version != b"HTTP/1.1" && *version != b"HTTP/1.0" {
        return Err(format!("unsupported version {:?}", String::from_utf8_lossy(version)));
    }
    Ok(())
}

fn validate_status_line(line: &[u8]) -> std::result::Result<(), String> {
    let rest = line
        .strip_prefix(b"HTTP/1.1 ")
        .or_else(|| line.strip_prefix(b"HTTP/1.0 "))
        .ok_or_else(|| format!("malformed status line {:?}", String::from_utf8_lossy(line)))?;
    let code_ok = rest.len() >= 3
        && rest[..3].iter().all(u8::is_ascii_digit)
        && (rest.len() == 3 || rest[3] == b' ');
    if !code_ok {
        return Err(format!("malformed status line {:?}", String::from_utf8_lossy(line)));
    }
    Ok(())
}

fn parse_chunk_size(line: &[u8]) -> Result<u64> {
    let size = line.split(|&b| b == b';').next().unwrap_or_default();
    let size = size.trim_ascii();
    if size.is_empty() || size.len() > 16 || !size.iter().all(u8::is_ascii_hexdigit) {
        return Err(ParserError::parse(format!(
            "invalid chunk size {:?}",
            String::from_utf8_lossy(line)
        )));
    }
    // Only hex digits remain, at most 16 of them
    let digits = std::str::from_utf8(size).map_err(|e| ParserError::parse(e.to_string()))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ParserError::parse(format!("invalid chunk size: {e}")))
}

fn parse_trailer(line: &[u8]) -> Result<HeaderField> {
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| ParserError::parse("trailer line without ':'"))?;
    let name = &line[..colon];
    if name.is_empty() || name.iter().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(ParserError::parse(format!(
            "invalid trailer name {:?}",
            String::from_utf8_lossy(name)
        )));
    }
    Ok(HeaderField::new(
        String::from_utf8_lossy(name).into_owned(),
        String::from_utf8_lossy(line[colon + 1..].trim_ascii()).into_owned(),
    ))
}

fn head_error(err: httparse::Error) -> ParserError {
    match err {
        httparse::Error::TooManyHeaders => ParserError::parse("too many header fields"),
        other => ParserError::parse(format!("malformed message head: {other}")),
    }
}

fn parse_version(minor: u8) -> Result<Version> {
    Version::from_minor(minor).ok_or_else(|| ParserError::parse("unsupported HTTP version"))
}

fn collect_headers(message: &mut HttpMessage, fields: &[httparse::Header<'_>]) {
    for field in fields {
        message.headers_mut().push_unchecked(HeaderField::new(
            field.name,
            String::from_utf8_lossy(field.value).into_owned(),
        ));
    }
}

fn parse_request_head(buf: &[u8], max_headers: usize) -> Result<Option<(usize, HttpMessage)>> {
    let mut fields = vec![httparse::EMPTY_HEADER; max_headers];
    let mut req = httparse::Request::new(&mut fields);
    let len = match req.parse(buf).map_err(head_error)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };
    let (Some(method), Some(path), Some(minor)) = (req.method, req.path, req.version) else {
        return Err(ParserError::parse("incomplete request line"));
    };
    let mut message =
        HttpMessage::request(method, path).map_err(|e| ParserError::parse(e.to_string()))?;
    message.set_version(parse_version(minor)?);
    collect_headers(&mut message, req.headers);
    Ok(Some((len, message)))
}

fn parse_response_head(buf: &[u8], max_headers: usize) -> Result<Option<(usize, HttpMessage)>> {
    let mut fields = vec![httparse::EMPTY_HEADER; max_headers];
    let mut resp = httparse::Response::new(&mut fields);
    let len = match resp.parse(buf).map_err(head_error)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };
    let (Some(code), Some(minor)) = (resp.code, resp.version) else {
        return Err(ParserError::parse("incomplete status line"));
    };
    let mut message = HttpMessage::response(code, resp.reason.unwrap_or_default())
        .map_err(|e| ParserError::parse(e.to_string()))?;
    message.set_version(parse_version(minor)?);
    collect_headers(&mut message, resp.headers);
    Ok(Some((len, message)))
}

impl H1Decoder {
    pub(crate) fn new(kind: MessageKind, config: ParserConfig) -> Self {
        Self {
            kind,
            config,
            buf: BytesMut::new(),
            state: H1State::StartLine,
            body: BodyState::UntilClose,
            message: HttpMessage::new(),
            pipeline: BodyPipeline::Identity,
            data_started: false,
            aborted: false,
            trailer_bytes: 0,
            eof: false,
        }
    }

    pub(crate) fn state(&self) -> H1State {
        self.state
    }

    pub(crate) fn feed<C: ParserCallbacks>(
        &mut self,
        data: &[u8],
        sink: &mut Sink<'_, C>,
    ) -> Result<()> {
        if self.eof {
            return Err(ParserError::invalid_state("input after disconnect"));
        }
        if self.state == H1State::Failed {
            return Err(ParserError::parse("direction failed on an earlier protocol error"));
        }
        self.buf.extend_from_slice(data);
        let mut errors = FirstError::default();
        if let Err(err) = self.advance(sink, &mut errors) {
            warn!(direction = ?sink.direction, error = %err, "HTTP/1 parse failed");
            self.fail();
            errors.record(err);
        }
        errors.into_result()
    }

    /// End of stream on this direction.
    pub(crate) fn disconnect<C: ParserCallbacks>(&mut self, sink: &mut Sink<'_, C>) -> Result<()> {
        if self.eof {
            return Err(ParserError::invalid_state("direction already disconnected"));
        }
        self.eof = true;
        let mut errors = FirstError::default();
        match self.state {
            H1State::Body if self.body == BodyState::UntilClose => {
                self.finish_message(sink, &mut errors)
            }
            H1State::StartLine if self.buf.iter().all(|&b| b == b'\r' || b == b'\n') => {}
            H1State::Failed => {}
            state => {
                warn!(direction = ?sink.direction, ?state, "connection closed mid-message");
                self.fail();
                errors.record(ParserError::parse(
                    "connection closed before the message was complete",
                ));
            }
        }
        self.buf.clear();
        errors.into_result()
    }

    fn fail(&mut self) {
        self.state = H1State::Failed;
        self.buf.clear();
        self.pipeline = BodyPipeline::Identity;
    }

    fn advance<C: ParserCallbacks>(
        &mut self,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) -> Result<()> {
        loop {
            let progressed = match self.state {
                H1State::StartLine => self.parse_start_line()?,
                H1State::Headers => self.parse_head(sink)?,
                H1State::Body => self.parse_body(sink, errors)?,
                H1State::Done => {
                    self.finish_message(sink, errors);
                    true
                }
                H1State::Failed => false,
            };
            if !progressed {
                return Ok(());
            }
        }
    }

    fn parse_start_line(&mut self) -> Result<bool> {
        let skip = self.buf.iter().take_while(|&&b| b == b'\r' || b == b'\n').count();
        self.buf.advance(skip);
        let Some(end) = self.buf.iter().position(|&b| b == b'\n') else {
            if self.buf.len() > self.config.max_start_line {
                return Err(ParserError::parse("start line too long"));
            }
            return Ok(false);
        };
        let line = self.buf[..end].strip_suffix(b"\r").unwrap_or(&self.buf[..end]);
        if line.len() > self.config.max_start_line {
            return Err(ParserError::parse("start line too long"));
        }
        match self.kind {
            MessageKind::Request => validate_request_line(line),
            MessageKind::Response => validate_status_line(line),
        }
        .map_err(ParserError::parse)?;
        self.state = H1State::Headers;
        Ok(true)
    }

    fn parse_head<C: ParserCallbacks>(&mut self, sink: &mut Sink<'_, C>) -> Result<bool> {
        let parsed = match self.kind {
            MessageKind::Request => parse_request_head(&self.buf, self.config.max_headers)?,
            MessageKind::Response => parse_response_head(&self.buf, self.config.max_headers)?,
        };
        let Some((len, message)) = parsed else {
            if self.buf.len() > self.config.max_header_block_size {
                return Err(ParserError::parse("header block too large"));
            }
            return Ok(false);
        };
        if len > self.config.max_header_block_size {
            return Err(ParserError::parse("header block too large"));
        }
        self.buf.advance(len);

        let exchange = &mut sink.outbound.h1()?.exchange;
        let framing = match (message.method(), message.status_code()) {
            (Some(method), _) => {
                exchange.request(method);
                request_framing(message.headers())
            }
            (None, Some(code)) => {
                let method = exchange.response(code);
                response_framing(code, method.as_deref(), message.headers())
            }
            (None, None) => Err("message has no start line".to_string()),
        }
        .map_err(ParserError::parse)?;

        debug!(direction = ?sink.direction, kind = ?self.kind, ?framing, "HTTP/1 head parsed");
        self.message = message;
        self.data_started = false;
        self.aborted = sink.h1_headers(&self.message) == Flow::Abort;
        if self.aborted {
            debug!(direction = ?sink.direction, "message aborted by callback");
        }

        self.body = match framing {
            BodyFraming::None => {
                self.state = H1State::Done;
                return Ok(true);
            }
            BodyFraming::Length(len) => BodyState::Length(len),
            BodyFraming::Chunked => BodyState::ChunkSize,
            BodyFraming::UntilClose => BodyState::UntilClose,
        };
        if !self.aborted {
            let decompress = sink.h1_data_started(&self.message);
            self.pipeline = BodyPipeline::select(decompress, self.message.headers());
            self.data_started = true;
        }
        self.state = H1State::Body;
        Ok(true)
    }

    /// Pop one line (without its line ending) off the buffer.
    fn take_line(&mut self, limit: usize, what: &str) -> Result<Option<BytesMut>> {
        let Some(end) = self.buf.iter().position(|&b| b == b'\n') else {
            if self.buf.len() > limit {
                return Err(ParserError::parse(format!("{what} too long")));
            }
            return Ok(None);
        };
        if end > limit {
            return Err(ParserError::parse(format!("{what} too long")));
        }
        let mut line = self.buf.split_to(end + 1);
        line.truncate(end);
        if line.last() == Some(&b'\r') {
            line.truncate(end - 1);
        }
        Ok(Some(line))
    }

    fn parse_body<C: ParserCallbacks>(
        &mut self,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) -> Result<bool> {
        match self.body {
            BodyState::Length(remaining) | BodyState::ChunkData(remaining) => {
                if self.buf.is_empty() {
                    return Ok(false);
                }
                let take = remaining.min(self.buf.len() as u64) as usize;
                let chunk = self.buf.split_to(take);
                self.deliver(&chunk, sink, errors);
                let left = remaining - take as u64;
                match (self.body, left) {
                    (BodyState::Length(_), 0) => self.state = H1State::Done,
                    (BodyState::Length(_), left) => self.body = BodyState::Length(left),
                    (_, 0) => self.body = BodyState::ChunkDataEnd,
                    (_, left) => self.body = BodyState::ChunkData(left),
                }
                Ok(true)
            }
            BodyState::UntilClose => {
                if self.buf.is_empty() {
                    return Ok(false);
                }
                let chunk = self.buf.split();
                self.deliver(&chunk, sink, errors);
                Ok(true)
            }
            BodyState::ChunkSize => {
                let limit = self.config.max_chunk_line;
                let Some(line) = self.take_line(limit, "chunk size line")? else {
                    return Ok(false);
                };
                let size = parse_chunk_size(&line)?;
                trace!(size, "chunk header");
                self.body = if size == 0 {
                    BodyState::Trailers
                } else {
                    BodyState::ChunkData(size)
                };
                Ok(true)
            }
            BodyState::ChunkDataEnd => {
                if self.buf.len() < 2 {
                    if self.buf.first().is_some_and(|&b| b != b'\r') {
                        return Err(ParserError::parse("missing CRLF after chunk data"));
                    }
                    return Ok(false);
                }
                if &self.buf[..2] != b"\r\n" {
                    return Err(ParserError::parse("missing CRLF after chunk data"));
                }
                self.buf.advance(2);
                self.body = BodyState::ChunkSize;
                Ok(true)
            }
            BodyState::Trailers => {
                let limit = self.config.max_header_block_size.saturating_sub(self.trailer_bytes);
                let Some(line) = self.take_line(limit, "trailer block")? else {
                    return Ok(false);
                };
                if line.is_empty() {
                    self.state = H1State::Done;
                    return Ok(true);
                }
                self.trailer_bytes += line.len() + 2;
                let field = parse_trailer(&line)?;
                self.message.trailers_mut().push_unchecked(field);
                Ok(true)
            }
        }
    }

    fn deliver<C: ParserCallbacks>(
        &mut self,
        chunk: &[u8],
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) {
        if self.aborted || chunk.is_empty() {
            return;
        }
        trace!(direction = ?sink.direction, len = chunk.len(), "HTTP/1 body data");
        match self.pipeline.process(chunk) {
            Ok(out) if !out.is_empty() => sink.h1_data(&self.message, &out),
            Ok(_) => {}
            Err(err) => errors.record(err),
        }
    }

    fn finish_message<C: ParserCallbacks>(
        &mut self,
        sink: &mut Sink<'_, C>,
        errors: &mut FirstError,
    ) {
        if !self.aborted {
            if self.data_started {
                match self.pipeline.finish() {
                    Ok(tail) if !tail.is_empty() => sink.h1_data(&self.message, &tail),
                    Ok(_) => {}
                    Err(err) => errors.record(err),
                }
            }
            sink.h1_data_finished(&self.message);
        }
        debug!(direction = ?sink.direction, kind = ?self.kind, "HTTP/1 message complete");
        self.message = HttpMessage::new();
        self.pipeline = BodyPipeline::Identity;
        self.data_started = false;
        self.aborted = false;
        self.trailer_bytes = 0;
        self.state = H1State::StartLine;
    }
}
