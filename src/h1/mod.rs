//! HTTP/1.x engine: incremental decoder per direction, outbound encoder,
//! and the message framing rules both share.

pub(crate) mod decoder;
pub(crate) mod encoder;

use std::collections::VecDeque;

use crate::headers::HttpHeaders;

/// How a message body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyFraming {
    None,
    Length(u64),
    Chunked,
    /// Response body running until the connection closes.
    UntilClose,
}

fn content_length(headers: &HttpHeaders) -> Result<Option<u64>, String> {
    let mut length = None;
    for value in headers.get_all("content-length").flat_map(|v| v.split(',')) {
        let value = value.trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid Content-Length {value:?}"));
        }
        let parsed: u64 = value
            .parse()
            .map_err(|_| format!("Content-Length {value} out of range"))?;
        match length {
            Some(previous) if previous != parsed => {
                return Err(format!("conflicting Content-Length values {previous} and {parsed}"));
            }
            _ => length = Some(parsed),
        }
    }
    Ok(length)
}

/// Whether `Transfer-Encoding` is present, and whether chunked is its
/// final coding.
fn transfer_encoding(headers: &HttpHeaders) -> (bool, bool) {
    let codings: Vec<&str> = headers
        .get_all("transfer-encoding")
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    let chunked_last = codings.last().is_some_and(|t| t.eq_ignore_ascii_case("chunked"));
    (!codings.is_empty(), chunked_last)
}

pub(crate) fn request_framing(headers: &HttpHeaders) -> Result<BodyFraming, String> {
    let (has_te, chunked) = transfer_encoding(headers);
    let length = content_length(headers)?;
    if has_te {
        if length.is_some() {
            return Err("both Transfer-Encoding and Content-Length present".to_string());
        }
        if !chunked {
            return Err("request Transfer-Encoding must end with chunked".to_string());
        }
        return Ok(BodyFraming::Chunked);
    }
    Ok(match length {
        Some(0) | None => BodyFraming::None,
        Some(n) => BodyFraming::Length(n),
    })
}

/// A response never has a body for HEAD, 1xx, 204 and 304.
pub(crate) fn response_framing(
    status_code: u16,
    request_method: Option<&str>,
    headers: &HttpHeaders,
) -> Result<BodyFraming, String> {
    let head = request_method.is_some_and(|m| m.eq_ignore_ascii_case("HEAD"));
    if head || (100..200).contains(&status_code) || status_code == 204 || status_code == 304 {
        return Ok(BodyFraming::None);
    }
    let (has_te, chunked) = transfer_encoding(headers);
    let length = content_length(headers)?;
    if has_te {
        if length.is_some() {
            return Err("both Transfer-Encoding and Content-Length present".to_string());
        }
        return Ok(if chunked {
            BodyFraming::Chunked
        } else {
            BodyFraming::UntilClose
        });
    }
    Ok(match length {
        Some(0) => BodyFraming::None,
        Some(n) => BodyFraming::Length(n),
        None => BodyFraming::UntilClose,
    })
}

/// Request methods awaiting their response, oldest first. Fed by every
/// request seen on the connection, parsed or sent, so response framing
/// can tell a HEAD answer apart.
#[derive(Debug, Clone, Default)]
pub(crate) struct Exchange {
    methods: VecDeque<String>,
}

impl Exchange {
    pub(crate) fn request(&mut self, method: &str) {
        self.methods.push_back(method.to_string());
    }

    /// Method of the request a response with `status_code` answers. An
    /// interim 1xx response leaves the request pending.
    pub(crate) fn response(&mut self, status_code: u16) -> Option<String> {
        if (100..200).contains(&status_code) {
            self.methods.front().cloned()
        } else {
            self.methods.pop_front()
        }
    }
}
