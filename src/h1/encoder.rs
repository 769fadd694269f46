//! Outbound HTTP/1.x encoder: writes heads and frames body bytes the way
//! the head announced.

use tracing::{debug, trace};

use super::{request_framing, response_framing, BodyFraming, Exchange};
use crate::error::{ParserError, Result};
use crate::message::{HttpMessage, MessageKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutBody {
    /// No head sent, or the previous message is complete.
    Idle,
    Length(u64),
    Chunked,
    UntilClose,
    /// Head sent for a message that cannot carry a body.
    Empty,
}

#[derive(Debug, Clone)]
pub(crate) struct H1Encoder {
    kind: MessageKind,
    body: OutBody,
    pub(crate) exchange: Exchange,
}

impl H1Encoder {
    /// `kind` is what this side sends: requests for a client role,
    /// responses for a server role.
    pub(crate) fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            body: OutBody::Idle,
            exchange: Exchange::default(),
        }
    }

    pub(crate) fn send_headers(&mut self, message: &HttpMessage, out: &mut Vec<u8>) -> Result<()> {
        if message.kind() != Some(self.kind) {
            return Err(ParserError::invalid_argument(format!(
                "this side sends {:?} messages",
                self.kind
            )));
        }
        if !matches!(self.body, OutBody::Idle | OutBody::Empty) {
            return Err(ParserError::invalid_state("previous message body is not finished"));
        }
        let head = message.head_bytes()?;
        let framing = match (message.method(), message.status_code()) {
            (Some(method), _) => {
                let framing =
                    request_framing(message.headers()).map_err(ParserError::invalid_argument)?;
                self.exchange.request(method);
                framing
            }
            (None, Some(code)) => {
                let method = self.exchange.response(code);
                response_framing(code, method.as_deref(), message.headers())
                    .map_err(ParserError::invalid_argument)?
            }
            (None, None) => return Err(ParserError::invalid_state("message has no start line")),
        };
        debug!(kind = ?self.kind, ?framing, "sending HTTP/1 head");
        out.extend_from_slice(&head);
        self.body = match framing {
            BodyFraming::None => OutBody::Empty,
            BodyFraming::Length(len) => OutBody::Length(len),
            BodyFraming::Chunked => OutBody::Chunked,
            BodyFraming::UntilClose => OutBody::UntilClose,
        };
        Ok(())
    }

    /// Head and stored body in one go. Nothing is written, and the encoder
    /// is left as it was, unless the whole message fits its framing.
    pub(crate) fn send_message(&mut self, message: &HttpMessage, out: &mut Vec<u8>) -> Result<()> {
        let saved = self.clone();
        let mark = out.len();
        let result = self
            .send_headers(message, out)
            .and_then(|()| self.send_data(message.body(), true, out));
        if result.is_err() {
            *self = saved;
            out.truncate(mark);
        }
        result
    }

    /// Write body bytes in the framing armed by the last head. `eof` ends
    /// the message (the chunked terminator is written here).
    pub(crate) fn send_data(&mut self, data: &[u8], eof: bool, out: &mut Vec<u8>) -> Result<()> {
        trace!(len = data.len(), eof, "sending HTTP/1 body data");
        match self.body {
            OutBody::Idle => {
                return Err(ParserError::invalid_state("no message head has been sent"));
            }
            OutBody::Empty => {
                if !data.is_empty() {
                    return Err(ParserError::invalid_state("message cannot carry a body"));
                }
            }
            OutBody::Length(remaining) => {
                let len = data.len() as u64;
                if len > remaining {
                    return Err(ParserError::invalid_argument(format!(
                        "{len} body bytes exceed the {remaining} announced"
                    )));
                }
                if eof && len < remaining {
                    return Err(ParserError::invalid_state(format!(
                        "body ended {} bytes short of Content-Length",
                        remaining - len
                    )));
                }
                out.extend_from_slice(data);
                self.body = OutBody::Length(remaining - len);
            }
            OutBody::Chunked => {
                if !data.is_empty() {
                    out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
                    out.extend_from_slice(data);
                    out.extend_from_slice(b"\r\n");
                }
                if eof {
                    out.extend_from_slice(b"0\r\n\r\n");
                }
            }
            OutBody::UntilClose => out.extend_from_slice(data),
        }
        if eof {
            self.body = OutBody::Idle;
        }
        Ok(())
    }
}
