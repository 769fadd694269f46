//! http12-parser: a sans-I/O HTTP/1.1 and HTTP/2 connection parser
//!
//! This crate sits between two peers of an intercepted connection. The
//! embedder feeds it the bytes seen in each direction and receives
//! structured events through callbacks. It can also produce protocol
//! traffic of its own, either from a callback or on its own initiative
//! (SETTINGS acknowledgements, PING replies, flow-control updates).
//!
//! # Features
//!
//! - **Sans-I/O Design**: no sockets, no runtime; you provide the bytes
//! - **HTTP/1.1**: request and response heads, Content-Length and chunked
//!   bodies, trailers, keep-alive pipelining, HEAD/1xx/204/304 framing
//! - **HTTP/2**: full frame layer, HPACK via fluke-hpack, CONTINUATION
//!   assembly, stream lifecycle, RST_STREAM and GOAWAY handling
//! - **Flow Control**: WINDOW_UPDATE generation for consumed DATA
//! - **Content Decoding**: optional gzip and deflate body decompression
//!
//! # Quick Start
//!
//! ```rust
//! use http12_parser::{
//!     Connection, ConnectionId, Context, Direction, Flow, HttpMessage, ParserCallbacks,
//!     ProtocolVersion, Role,
//! };
//!
//! #[derive(Default)]
//! struct Urls(Vec<String>);
//!
//! impl ParserCallbacks for Urls {
//!     fn h1_headers(&mut self, _cx: &mut Context<'_>, message: &HttpMessage) -> Flow {
//!         self.0.push(message.url().unwrap_or_default().to_string());
//!         Flow::Continue
//!     }
//! }
//!
//! let mut conn =
//!     Connection::open(ConnectionId(7), ProtocolVersion::Http1, Role::Server, Urls::default());
//! conn.input(Direction::Incoming, b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
//! assert_eq!(conn.callbacks().unwrap().0, ["/x"]);
//! ```
//!
//! # Directions
//!
//! A connection has two byte streams. [`Direction::Incoming`] carries what
//! the peer sends; [`Direction::Outgoing`] carries what is sent to it and
//! may be fed back in for observation. Under [`Role::Server`] incoming
//! bytes are requests; under [`Role::Client`] they are responses.
//!
//! Autonomous protocol replies are only generated for the incoming
//! direction, and every byte to be written leaves through
//! [`ParserCallbacks::raw_output`].

pub mod callbacks;
pub mod config;
pub mod connection;
pub mod content;
pub mod error;
pub(crate) mod h1;
pub mod h2;
pub mod headers;
pub mod message;
pub mod registry;

pub use callbacks::{Context, Flow, ParserCallbacks};
pub use config::ParserConfig;
pub use connection::{Connection, ConnectionId, Direction, ProtocolVersion, Role};
pub use content::{ContentDecoder, ContentEncoding};
pub use error::{ErrorCode, ParserError, Result};
pub use h2::frame::{error_code, CONNECTION_PREFACE};
pub use h2::{H2ConnectionState, StreamState};
pub use headers::{HeaderField, HttpHeaders};
pub use message::{reason_phrase, Http2Message, HttpMessage, MessageKind, Version};
pub use registry::{ConnectionHandle, ConnectionRegistry};
