//! One intercepted connection: protocol engine, both directions, and the
//! send operations.

use std::fmt;

use tracing::debug;

use crate::callbacks::{Encoder, Outbound, ParserCallbacks, Sink};
use crate::config::ParserConfig;
use crate::error::{ParserError, Result};
use crate::h1::decoder::{H1Decoder, H1State};
use crate::h1::encoder::H1Encoder;
use crate::h2::decoder::H2Decoder;
use crate::h2::encoder::H2Encoder;
use crate::h2::{H2ConnectionState, StreamState};
use crate::message::{Http2Message, HttpMessage, MessageKind};

/// Embedder-chosen correlation token, handed back on every output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    Http1,
    Http2,
}

/// Which peer the connection faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Faces a client: incoming bytes carry requests.
    Server,
    /// Faces a server: incoming bytes carry responses.
    Client,
}

impl Role {
    /// Whether `direction` carries requests under this role.
    pub fn carries_requests(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Role::Server, Direction::Incoming) | (Role::Client, Direction::Outgoing)
        )
    }
}

/// One of the two byte streams of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bytes received from the peer.
    Incoming,
    /// Bytes sent to the peer, fed back in for observation.
    Outgoing,
}

impl Direction {
    fn index(self) -> usize {
        match self {
            Direction::Incoming => 0,
            Direction::Outgoing => 1,
        }
    }
}

enum Engine {
    Http1([H1Decoder; 2]),
    Http2([H2Decoder; 2]),
}

struct Live<C> {
    callbacks: C,
    engine: Engine,
    outbound: Outbound,
}

impl<C: ParserCallbacks> Live<C> {
    fn input(&mut self, id: ConnectionId, direction: Direction, data: &[u8]) -> Result<()> {
        let mut sink = Sink::new(id, direction, &mut self.callbacks, &mut self.outbound);
        let result = match &mut self.engine {
            Engine::Http1(legs) => legs[direction.index()].feed(data, &mut sink),
            Engine::Http2(legs) => legs[direction.index()].feed(data, &mut sink),
        };
        sink.flush();
        result
    }

    fn disconnect(&mut self, id: ConnectionId, direction: Direction) -> Result<()> {
        let mut sink = Sink::new(id, direction, &mut self.callbacks, &mut self.outbound);
        let result = match &mut self.engine {
            Engine::Http1(legs) => legs[direction.index()].disconnect(&mut sink),
            Engine::Http2(legs) => legs[direction.index()].disconnect(&mut sink),
        };
        sink.flush();
        result
    }

    fn send(
        &mut self,
        id: ConnectionId,
        op: impl FnOnce(&mut Outbound) -> Result<()>,
    ) -> Result<()> {
        let result = op(&mut self.outbound);
        if !self.outbound.pending.is_empty() {
            let data = std::mem::take(&mut self.outbound.pending);
            self.callbacks.raw_output(id, &data);
        }
        result
    }
}

/// A bidirectional HTTP/1.1 or HTTP/2 protocol engine for one connection.
///
/// Feed bytes from either direction with [`input`](Self::input); events
/// arrive on the callbacks. Calls must not overlap; distinct connections
/// are independent.
pub struct Connection<C: ParserCallbacks> {
    id: ConnectionId,
    version: ProtocolVersion,
    role: Role,
    live: Option<Live<C>>,
    last_error: Option<ParserError>,
}

impl<C: ParserCallbacks> fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("role", &self.role)
            .field("open", &self.live.is_some())
            .finish()
    }
}

fn closed() -> ParserError {
    ParserError::invalid_state("connection is closed")
}

impl<C: ParserCallbacks> Connection<C> {
    pub fn open(id: ConnectionId, version: ProtocolVersion, role: Role, callbacks: C) -> Self {
        Self::with_config(id, version, role, callbacks, ParserConfig::default())
    }

    pub fn with_config(
        id: ConnectionId,
        version: ProtocolVersion,
        role: Role,
        callbacks: C,
        config: ParserConfig,
    ) -> Self {
        let kind = |direction| {
            if role.carries_requests(direction) {
                MessageKind::Request
            } else {
                MessageKind::Response
            }
        };
        let (engine, encoder) = match version {
            ProtocolVersion::Http1 => (
                Engine::Http1([
                    H1Decoder::new(kind(Direction::Incoming), config.clone()),
                    H1Decoder::new(kind(Direction::Outgoing), config.clone()),
                ]),
                Encoder::Http1(H1Encoder::new(kind(Direction::Outgoing))),
            ),
            ProtocolVersion::Http2 => (
                Engine::Http2([
                    H2Decoder::new(
                        Direction::Incoming,
                        role.carries_requests(Direction::Incoming),
                        config.clone(),
                    ),
                    H2Decoder::new(
                        Direction::Outgoing,
                        role.carries_requests(Direction::Outgoing),
                        config.clone(),
                    ),
                ]),
                Encoder::Http2(H2Encoder::new(role, config)),
            ),
        };
        debug!(%id, ?version, ?role, "connection opened");
        Self {
            id,
            version,
            role,
            live: Some(Live {
                callbacks,
                engine,
                outbound: Outbound::new(encoder),
            }),
            last_error: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_open(&self) -> bool {
        self.live.is_some()
    }

    pub fn callbacks(&self) -> Result<&C> {
        self.live.as_ref().map(|live| &live.callbacks).ok_or_else(closed)
    }

    pub fn callbacks_mut(&mut self) -> Result<&mut C> {
        self.live.as_mut().map(|live| &mut live.callbacks).ok_or_else(closed)
    }

    /// Last error returned by any operation on this connection.
    pub fn last_error(&self) -> Option<&ParserError> {
        self.last_error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.last_error.as_ref().map(ToString::to_string)
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.last_error = Some(err.clone());
        }
        result
    }

    /// Feed bytes received on `direction`. A stream- or message-level
    /// error does not stop the rest of `data` from being consumed; the
    /// first such error is returned.
    pub fn input(&mut self, direction: Direction, data: &[u8]) -> Result<()> {
        let id = self.id;
        let result = match self.live.as_mut() {
            Some(live) => live.input(id, direction, data),
            None => Err(closed()),
        };
        self.track(result)
    }

    /// End of stream on `direction`.
    pub fn disconnect(&mut self, direction: Direction) -> Result<()> {
        let id = self.id;
        let result = match self.live.as_mut() {
            Some(live) => live.disconnect(id, direction),
            None => Err(closed()),
        };
        self.track(result)
    }

    /// Release all message and stream state and hand the callbacks back.
    /// No callback runs during close.
    pub fn close(&mut self) -> Result<C> {
        match self.live.take() {
            Some(live) => {
                debug!(id = %self.id, "connection closed");
                Ok(live.callbacks)
            }
            None => self.track(Err(closed())),
        }
    }

    fn send(&mut self, op: impl FnOnce(&mut Outbound) -> Result<()>) -> Result<()> {
        let id = self.id;
        let result = match self.live.as_mut() {
            Some(live) => live.send(id, op),
            None => Err(closed()),
        };
        self.track(result)
    }

    pub fn send_h1_headers(&mut self, message: &HttpMessage) -> Result<()> {
        self.send(|out| out.send_h1_headers(message))
    }

    pub fn send_h1_data(&mut self, data: &[u8], eof: bool) -> Result<()> {
        self.send(|out| out.send_h1_data(data, eof))
    }

    pub fn send_h1_message(&mut self, message: &HttpMessage) -> Result<()> {
        self.send(|out| out.send_h1_message(message))
    }

    pub fn send_h2_settings(&mut self) -> Result<()> {
        self.send(Outbound::send_h2_settings)
    }

    pub fn send_h2_headers(&mut self, message: &Http2Message, end_stream: bool) -> Result<()> {
        self.send(|out| out.send_h2_headers(message, end_stream))
    }

    pub fn send_h2_data(&mut self, stream_id: u32, data: &[u8], end_stream: bool) -> Result<()> {
        self.send(|out| out.send_h2_data(stream_id, data, end_stream))
    }

    pub fn reset_h2_stream(&mut self, stream_id: u32, error_code: u32) -> Result<()> {
        self.send(|out| out.reset_h2_stream(stream_id, error_code))
    }

    pub fn send_h2_goaway(&mut self, error_code: u32) -> Result<()> {
        self.send(|out| out.send_h2_goaway(error_code))
    }

    fn h2_leg(&self, direction: Direction) -> Option<&H2Decoder> {
        match &self.live.as_ref()?.engine {
            Engine::Http2(legs) => Some(&legs[direction.index()]),
            Engine::Http1(_) => None,
        }
    }

    /// HTTP/2 connection-level state of one direction.
    pub fn h2_state(&self, direction: Direction) -> Option<H2ConnectionState> {
        self.h2_leg(direction).map(H2Decoder::state)
    }

    /// State of a stream still routed on `direction`; `None` once closed.
    pub fn h2_stream_state(&self, direction: Direction, stream_id: u32) -> Option<StreamState> {
        self.h2_leg(direction)?.stream_state(stream_id)
    }

    pub fn h2_open_streams(&self, direction: Direction) -> usize {
        self.h2_leg(direction).map_or(0, H2Decoder::open_streams)
    }

    /// Whether an HTTP/1 direction stopped on a protocol error.
    pub fn h1_failed(&self, direction: Direction) -> bool {
        match self.live.as_ref().map(|live| &live.engine) {
            Some(Engine::Http1(legs)) => legs[direction.index()].state() == H1State::Failed,
            _ => false,
        }
    }
}
