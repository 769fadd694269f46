//! Tests for HTTP/1 body framing and content decoding

use std::io::Write;

use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use http12_parser::{Direction, ParserError};

use crate::support::{h1_client, h1_server, recorder, recorder_mut, Event};

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn gzip_response(body: &[u8]) -> Vec<u8> {
    let mut wire = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    wire.extend_from_slice(body);
    wire
}

#[test]
fn test_content_length_body_across_inputs() {
    let mut conn = h1_server();
    conn.input(Direction::Incoming, b"PUT /f HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123")
        .unwrap();
    assert!(recorder(&conn).h1_finished().is_empty());
    conn.input(Direction::Incoming, b"456789").unwrap();

    let rec = recorder(&conn);
    assert_eq!(rec.h1_body(), b"0123456789");
    assert_eq!(rec.h1_finished().len(), 1);
    assert!(matches!(rec.events[1], Event::H1DataStarted));
}

#[test]
fn test_chunked_body_with_extensions_and_trailers() {
    let mut conn = h1_server();
    conn.input(
        Direction::Incoming,
        b"POST /u HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
4;name=value\r\nWiki\r\n5\r\npedia\r\n0\r\nX-Checksum: 9\r\nX-Other: yes\r\n\r\n",
    )
    .unwrap();

    let rec = recorder(&conn);
    assert_eq!(rec.h1_body(), b"Wikipedia");
    let finished = rec.h1_finished();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].trailers().get("x-checksum"), Some("9"));
    assert_eq!(finished[0].trailers().get("X-OTHER"), Some("yes"));
}

#[test]
fn test_gzip_body_decompressed_on_request() {
    let plain = b"the quick brown fox jumps over the lazy dog".repeat(20);
    let mut conn = h1_client();
    recorder_mut(&mut conn).decompress = true;
    conn.input(Direction::Incoming, &gzip_response(&gzip(&plain))).unwrap();

    let rec = recorder(&conn);
    assert_eq!(rec.h1_body(), plain);
    assert_eq!(rec.h1_finished().len(), 1);
}

#[test]
fn test_gzip_body_passed_through_when_not_requested() {
    let compressed = gzip(b"payload");
    let mut conn = h1_client();
    conn.input(Direction::Incoming, &gzip_response(&compressed)).unwrap();
    assert_eq!(recorder(&conn).h1_body(), compressed);
}

#[test]
fn test_raw_deflate_body() {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"raw deflate data").unwrap();
    let body = encoder.finish().unwrap();

    let mut wire = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: deflate\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    wire.extend_from_slice(&body);

    let mut conn = h1_client();
    recorder_mut(&mut conn).decompress = true;
    conn.input(Direction::Incoming, &wire).unwrap();
    assert_eq!(recorder(&conn).h1_body(), b"raw deflate data");
}

#[test]
fn test_corrupt_gzip_fails_only_that_message() {
    let mut conn = h1_client();
    recorder_mut(&mut conn).decompress = true;

    let err = conn
        .input(Direction::Incoming, &gzip_response(b"definitely not gzip data"))
        .unwrap_err();
    assert!(matches!(err, ParserError::Zlib(_)));
    assert!(matches!(conn.last_error(), Some(ParserError::Zlib(_))));

    // The connection keeps parsing the next message normally
    conn.input(Direction::Incoming, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
        .unwrap();
    let rec = recorder(&conn);
    assert_eq!(rec.h1_heads().len(), 2);
    assert_eq!(rec.h1_finished().len(), 2);
    assert_eq!(rec.h1_body(), b"ok");
}

#[test]
fn test_zero_content_length_skips_data_started() {
    let mut conn = h1_server();
    conn.input(Direction::Incoming, b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").unwrap();
    let rec = recorder(&conn);
    assert_eq!(rec.events.len(), 2);
    assert!(!rec.events.contains(&Event::H1DataStarted));
}
