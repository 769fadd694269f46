//! Tests for HTTP/1 protocol errors and end-of-stream handling

use http12_parser::{
    Connection, ConnectionId, Direction, ErrorCode, ParserConfig, ParserError, ProtocolVersion,
    Role,
};

use crate::support::{h1_client, h1_server, init_tracing, recorder, Recorder};

#[test]
fn test_malformed_request_line_fails_direction() {
    let mut conn = h1_server();
    let err = conn.input(Direction::Incoming, b"GET /x\r\n\r\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::HttpParse);
    assert!(conn.h1_failed(Direction::Incoming));

    // Failed is terminal for that direction only
    let err = conn.input(Direction::Incoming, b"GET / HTTP/1.1\r\n\r\n").unwrap_err();
    assert!(matches!(err, ParserError::HttpParse(_)));
    assert!(!conn.h1_failed(Direction::Outgoing));
    conn.input(Direction::Outgoing, b"HTTP/1.1 204 No Content\r\n\r\n").unwrap();
    assert_eq!(recorder(&conn).h1_heads().len(), 1);
}

#[test]
fn test_unsupported_version_rejected() {
    let mut conn = h1_server();
    assert!(matches!(
        conn.input(Direction::Incoming, b"GET / HTTP/2.0\r\n\r\n"),
        Err(ParserError::HttpParse(_))
    ));
}

#[test]
fn test_transfer_encoding_with_content_length_rejected() {
    let mut conn = h1_server();
    let err = conn
        .input(
            Direction::Incoming,
            b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 5\r\n\r\n",
        )
        .unwrap_err();
    assert!(matches!(err, ParserError::HttpParse(_)));
    assert!(recorder(&conn).events.is_empty());
}

#[test]
fn test_conflicting_content_lengths_rejected() {
    let mut conn = h1_server();
    let err = conn
        .input(
            Direction::Incoming,
            b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\n",
        )
        .unwrap_err();
    assert!(matches!(err, ParserError::HttpParse(_)));
}

#[test]
fn test_invalid_chunk_size() {
    let mut conn = h1_server();
    let err = conn
        .input(
            Direction::Incoming,
            b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n",
        )
        .unwrap_err();
    assert!(matches!(err, ParserError::HttpParse(_)));
    assert!(conn.h1_failed(Direction::Incoming));
}

#[test]
fn test_missing_crlf_after_chunk_data() {
    let mut conn = h1_server();
    let err = conn
        .input(
            Direction::Incoming,
            b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabcX",
        )
        .unwrap_err();
    assert!(matches!(err, ParserError::HttpParse(_)));
}

#[test]
fn test_header_block_limit() {
    init_tracing();
    let config = ParserConfig::new().max_header_block_size(64);
    let mut conn = Connection::with_config(
        ConnectionId(9),
        ProtocolVersion::Http1,
        Role::Server,
        Recorder::default(),
        config,
    );
    let mut wire = b"GET / HTTP/1.1\r\nX-Long: ".to_vec();
    wire.extend(std::iter::repeat(b'a').take(200));
    let err = conn.input(Direction::Incoming, &wire).unwrap_err();
    assert!(matches!(err, ParserError::HttpParse(_)));
}

#[test]
fn test_too_many_headers() {
    init_tracing();
    let config = ParserConfig::new().max_headers(2);
    let mut conn = Connection::with_config(
        ConnectionId(9),
        ProtocolVersion::Http1,
        Role::Server,
        Recorder::default(),
        config,
    );
    let err = conn
        .input(Direction::Incoming, b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n")
        .unwrap_err();
    assert!(matches!(err, ParserError::HttpParse(_)));
}

#[test]
fn test_disconnect_mid_body_is_parse_error() {
    let mut conn = h1_server();
    conn.input(Direction::Incoming, b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
        .unwrap();
    let err = conn.disconnect(Direction::Incoming).unwrap_err();
    assert!(matches!(err, ParserError::HttpParse(_)));
    assert!(recorder(&conn).h1_finished().is_empty());
}

#[test]
fn test_disconnect_between_messages_is_clean() {
    let mut conn = h1_client();
    conn.input(Direction::Incoming, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n\r\n")
        .unwrap();
    conn.disconnect(Direction::Incoming).unwrap();
}

#[test]
fn test_disconnect_twice_and_input_after_disconnect() {
    let mut conn = h1_server();
    conn.disconnect(Direction::Incoming).unwrap();
    assert!(matches!(conn.disconnect(Direction::Incoming), Err(ParserError::InvalidState(_))));
    assert!(matches!(
        conn.input(Direction::Incoming, b"GET / HTTP/1.1\r\n\r\n"),
        Err(ParserError::InvalidState(_))
    ));
    // The other direction is untouched
    conn.input(Direction::Outgoing, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").unwrap();
}

#[test]
fn test_error_message_is_human_readable() {
    let mut conn = h1_server();
    let _ = conn.input(Direction::Incoming, b"NOT A REQUEST\r\n\r\n");
    let message = conn.error_message().unwrap();
    assert!(message.starts_with("HTTP parse error"), "{message}");
    conn.clear_error();
    assert!(conn.error_message().is_none());
}
