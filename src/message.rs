//! Message object model: HTTP/1.1 messages and HTTP/2 stream payloads.
//!
//! An [`HttpMessage`] is either a request (method + url) or a response
//! (status code + status text), never both. It can be built by the parser
//! or from scratch by the embedder, cloned deeply, mutated, and rendered
//! back to wire bytes with [`HttpMessage::to_bytes`].

use std::fmt;

use crate::error::{ParserError, Result};
use crate::headers::{validate_value, HeaderField, HttpHeaders};

/// Which kind of HTTP/1 message a byte stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }

    pub(crate) fn from_minor(minor: u8) -> Option<Self> {
        match minor {
            0 => Some(Self::Http10),
            1 => Some(Self::Http11),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum StartLine {
    #[default]
    Empty,
    Request {
        method: String,
        url: String,
    },
    Response {
        status_code: u16,
        status: String,
    },
}

/// An HTTP/1.1 request or response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpMessage {
    start: StartLine,
    version: Version,
    headers: HttpHeaders,
    trailers: HttpHeaders,
    body: Vec<u8>,
}

fn is_method_token(method: &str) -> bool {
    !method.is_empty()
        && method
            .bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b))
}

impl HttpMessage {
    /// An empty message with neither start line populated.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(method: &str, url: &str) -> Result<Self> {
        let mut message = Self::new();
        message.set_method(method)?;
        message.set_url(url)?;
        Ok(message)
    }

    pub fn response(status_code: u16, status: &str) -> Result<Self> {
        let mut message = Self::new();
        message.set_status_code(status_code)?;
        message.set_status(status)?;
        Ok(message)
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start, StartLine::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start, StartLine::Response { .. })
    }

    pub fn kind(&self) -> Option<MessageKind> {
        match self.start {
            StartLine::Empty => None,
            StartLine::Request { .. } => Some(MessageKind::Request),
            StartLine::Response { .. } => Some(MessageKind::Response),
        }
    }

    pub fn method(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { method, .. } if !method.is_empty() => Some(method),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { url, .. } if !url.is_empty() => Some(url),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.start {
            StartLine::Response { status_code, .. } if *status_code != 0 => Some(*status_code),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match &self.start {
            StartLine::Response { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn request_parts(&mut self) -> Result<(&mut String, &mut String)> {
        if let StartLine::Empty = self.start {
            self.start = StartLine::Request {
                method: String::new(),
                url: String::new(),
            };
        }
        match &mut self.start {
            StartLine::Request { method, url } => Ok((method, url)),
            _ => Err(ParserError::invalid_state("message is a response")),
        }
    }

    fn response_parts(&mut self) -> Result<(&mut u16, &mut String)> {
        if let StartLine::Empty = self.start {
            self.start = StartLine::Response {
                status_code: 0,
                status: String::new(),
            };
        }
        match &mut self.start {
            StartLine::Response { status_code, status } => Ok((status_code, status)),
            _ => Err(ParserError::invalid_state("message is a request")),
        }
    }

    pub fn set_method(&mut self, value: &str) -> Result<()> {
        if !is_method_token(value) {
            return Err(ParserError::invalid_argument(format!("invalid method {value:?}")));
        }
        let (method, _) = self.request_parts()?;
        *method = value.to_owned();
        Ok(())
    }

    pub fn set_url(&mut self, value: &str) -> Result<()> {
        if value.is_empty()
            || value
                .bytes()
                .any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
        {
            return Err(ParserError::invalid_argument(format!("invalid url {value:?}")));
        }
        let (_, url) = self.request_parts()?;
        *url = value.to_owned();
        Ok(())
    }

    pub fn set_status_code(&mut self, code: u16) -> Result<()> {
        if !(100..=999).contains(&code) {
            return Err(ParserError::invalid_argument(format!("invalid status code {code}")));
        }
        let (status_code, _) = self.response_parts()?;
        *status_code = code;
        Ok(())
    }

    pub fn set_status(&mut self, value: &str) -> Result<()> {
        validate_value(value)?;
        let (_, status) = self.response_parts()?;
        *status = value.to_owned();
        Ok(())
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HttpHeaders {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.headers.add(name, value)
    }

    /// Removes every field called `name`; returns how many were removed.
    pub fn remove_header(&mut self, name: &str) -> usize {
        self.headers.remove(name)
    }

    /// Chunked-body trailers, filled by the parser.
    pub fn trailers(&self) -> &HttpHeaders {
        &self.trailers
    }

    pub(crate) fn trailers_mut(&mut self) -> &mut HttpHeaders {
        &mut self.trailers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    fn write_head(&self, out: &mut Vec<u8>) -> Result<()> {
        match &self.start {
            StartLine::Request { method, url } => {
                if method.is_empty() || url.is_empty() {
                    return Err(ParserError::invalid_state("request needs both method and url"));
                }
                out.extend_from_slice(method.as_bytes());
                out.push(b' ');
                out.extend_from_slice(url.as_bytes());
                out.push(b' ');
                out.extend_from_slice(self.version.as_str().as_bytes());
            }
            StartLine::Response { status_code, status } => {
                if *status_code == 0 {
                    return Err(ParserError::invalid_state("response needs a status code"));
                }
                out.extend_from_slice(self.version.as_str().as_bytes());
                out.extend_from_slice(format!(" {status_code}").as_bytes());
                if !status.is_empty() {
                    out.push(b' ');
                    out.extend_from_slice(status.as_bytes());
                }
            }
            StartLine::Empty => {
                return Err(ParserError::invalid_state("message has no start line"));
            }
        }
        out.extend_from_slice(b"\r\n");
        for field in &self.headers {
            out.extend_from_slice(field.name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(field.value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Start line, headers and the terminating blank line.
    pub fn head_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.estimated_head_len());
        self.write_head(&mut out)?;
        Ok(out)
    }

    /// Full wire encoding: head followed by the stored body, if any.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.estimated_head_len() + self.body.len());
        self.write_head(&mut out)?;
        out.extend_from_slice(&self.body);
        Ok(out)
    }

    /// Length of [`to_bytes`](Self::to_bytes), for pre-sizing buffers.
    pub fn size_bytes(&self) -> Result<usize> {
        self.to_bytes().map(|bytes| bytes.len())
    }

    fn estimated_head_len(&self) -> usize {
        let fields: usize = self.headers.iter().map(|f| f.name.len() + f.value.len() + 4).sum();
        64 + fields
    }
}

/// HTTP/2 hop-by-hop headers that must not appear in a HEADERS block.
const CONNECTION_SPECIFIC: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Header payload of one side of an HTTP/2 stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Http2Message {
    pub stream_id: u32,
    pub headers: HttpHeaders,
    /// Trailer block received after the body, if any.
    pub trailers: HttpHeaders,
}

impl Http2Message {
    pub fn new(stream_id: u32) -> Self {
        Self {
            stream_id,
            ..Self::default()
        }
    }

    pub fn with_headers(stream_id: u32, headers: HttpHeaders) -> Self {
        Self {
            stream_id,
            headers,
            trailers: HttpHeaders::new(),
        }
    }

    pub fn is_response(&self) -> bool {
        self.headers.contains(":status")
    }

    /// Build the equivalent HTTP/1.1 message from pseudo-headers.
    pub fn to_http_message(&self) -> Result<HttpMessage> {
        let pseudo = |name: &str| self.headers.get(name);
        let mut message = if let Some(status) = pseudo(":status") {
            let code: u16 = status
                .parse()
                .map_err(|_| ParserError::parse(format!("invalid :status {status:?}")))?;
            let mut message = HttpMessage::new();
            message.set_status_code(code)?;
            message.set_status(reason_phrase(code))?;
            message
        } else {
            let method = pseudo(":method").ok_or_else(|| ParserError::parse("missing :method"))?;
            let path = match pseudo(":path") {
                Some(path) => path,
                None if method.eq_ignore_ascii_case("CONNECT") => {
                    pseudo(":authority").ok_or_else(|| ParserError::parse("missing :authority"))?
                }
                None => return Err(ParserError::parse("missing :path")),
            };
            let mut message = HttpMessage::request(method, path)?;
            if let Some(authority) = pseudo(":authority") {
                message.add_header("Host", authority)?;
            }
            message
        };
        for field in &self.headers {
            if !field.name.starts_with(':') {
                message.headers_mut().push_unchecked(field.clone());
            }
        }
        Ok(message)
    }

    /// Build an HTTP/2 header payload from an HTTP/1.1 message. `scheme`
    /// fills `:scheme` for requests.
    pub fn from_http_message(stream_id: u32, message: &HttpMessage, scheme: &str) -> Result<Self> {
        let mut headers = HttpHeaders::new();
        if let Some(code) = message.status_code() {
            headers.add(":status", code.to_string())?;
        } else {
            let method = message
                .method()
                .ok_or_else(|| ParserError::invalid_state("message has no start line"))?;
            headers.add(":method", method)?;
            if !method.eq_ignore_ascii_case("CONNECT") {
                headers.add(":scheme", scheme)?;
            }
            if let Some(host) = message.header("host") {
                headers.add(":authority", host)?;
            }
            if !method.eq_ignore_ascii_case("CONNECT") {
                headers.add(":path", message.url().unwrap_or("/"))?;
            }
        }
        for field in message.headers() {
            let lower = field.name.to_ascii_lowercase();
            if CONNECTION_SPECIFIC.contains(&lower.as_str()) {
                continue;
            }
            if lower == "te" && !field.value.eq_ignore_ascii_case("trailers") {
                continue;
            }
            headers.push_unchecked(HeaderField::new(lower, field.value.clone()));
        }
        Ok(Self::with_headers(stream_id, headers))
    }
}

/// Canonical reason phrase for a status code; empty if unknown.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
