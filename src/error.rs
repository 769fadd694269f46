//! Error taxonomy surfaced at the engine boundary.
//!
//! Every failure is a return value paired with a human-readable message.
//! The numeric codes are stable and match the historical C API, so a
//! binding layer can hand them across an FFI boundary unchanged.

use thiserror::Error;

/// Stable numeric error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    AlreadyConnected = 101,
    HttpParse = 102,
    Zlib = 103,
    NullPointer = 104,
    InvalidArgument = 105,
    InvalidState = 106,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            101 => Some(Self::AlreadyConnected),
            102 => Some(Self::HttpParse),
            103 => Some(Self::Zlib),
            104 => Some(Self::NullPointer),
            105 => Some(Self::InvalidArgument),
            106 => Some(Self::InvalidState),
            _ => None,
        }
    }
}

/// Errors returned by parser operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParserError {
    /// A live connection already uses this id.
    #[error("connection {0} is already connected")]
    AlreadyConnected(u64),

    /// Received bytes violate HTTP/1.1 or HTTP/2 framing.
    #[error("HTTP parse error: {0}")]
    HttpParse(String),

    /// A compressed body could not be decompressed.
    #[error("Zlib error: {0}")]
    Zlib(String),

    /// A handle refers to nothing that was ever allocated.
    #[error("null pointer: {0}")]
    NullPointer(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the current state (closed
    /// connection, stale handle, wrong protocol version, ...).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl ParserError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::HttpParse(msg.into())
    }

    pub fn zlib(msg: impl Into<String>) -> Self {
        Self::Zlib(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyConnected(_) => ErrorCode::AlreadyConnected,
            Self::HttpParse(_) => ErrorCode::HttpParse,
            Self::Zlib(_) => ErrorCode::Zlib,
            Self::NullPointer(_) => ErrorCode::NullPointer,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::InvalidState(_) => ErrorCode::InvalidState,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParserError>;

/// Keeps the first error seen while a batch of input keeps being consumed.
#[derive(Debug, Default)]
pub(crate) struct FirstError(Option<ParserError>);

impl FirstError {
    pub(crate) fn record(&mut self, err: ParserError) {
        if self.0.is_none() {
            self.0 = Some(err);
        }
    }

    pub(crate) fn into_result(self) -> Result<()> {
        match self.0 {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
