//! Tests for header blocks split across CONTINUATION frames

use http12_parser::h2::frame::{self, error_code, frame_type};
use http12_parser::{
    Connection, ConnectionId, Direction, ParserConfig, ProtocolVersion, Role, StreamState,
};

use crate::support::{client_preface, frames_of_type, init_tracing, recorder, Event, Peer, Recorder};

fn large_request_block(peer: &mut Peer) -> Vec<u8> {
    let cookie = "c".repeat(6_000);
    peer.block(&[
        (":method", "GET"),
        (":scheme", "https"),
        (":path", "/big"),
        ("cookie", &cookie),
    ])
}

#[test]
fn test_headers_assembled_from_continuation() {
    let mut conn = Connection::open(
        ConnectionId(1),
        ProtocolVersion::Http2,
        Role::Server,
        Recorder::default(),
    );
    let mut peer = Peer::new();
    let block = large_request_block(&mut peer);
    let third = block.len() / 3;
    let (first, rest) = block.split_at(third);
    let (middle, last) = rest.split_at(third);

    let mut wire = client_preface();
    wire.extend(frame::create_headers_frame(1, first, true, false));
    wire.extend(frame::create_continuation_frame(1, middle, false));
    conn.input(Direction::Incoming, &wire).unwrap();
    assert!(recorder(&conn).events.is_empty());
    assert_eq!(conn.h2_stream_state(Direction::Incoming, 1), Some(StreamState::HeadersInProgress));

    conn.input(Direction::Incoming, &frame::create_continuation_frame(1, last, true))
        .unwrap();
    let rec = recorder(&conn);
    assert_eq!(rec.events.len(), 2);
    let Event::H2Headers(message) = &rec.events[0] else {
        panic!("expected headers, got {:?}", rec.events[0]);
    };
    assert_eq!(message.headers.get(":path"), Some("/big"));
    assert_eq!(message.headers.get("cookie").map(str::len), Some(6_000));
    assert_eq!(rec.h2_finished(), [(1, false)]);
}

#[test]
fn test_interleaved_frame_during_continuation_is_fatal() {
    init_tracing();
    let mut conn = Connection::open(
        ConnectionId(1),
        ProtocolVersion::Http2,
        Role::Server,
        Recorder::default(),
    );
    let mut peer = Peer::new();
    let block = large_request_block(&mut peer);

    let mut wire = client_preface();
    wire.extend(frame::create_headers_frame(1, &block[..100], false, false));
    wire.extend(frame::create_data_frame(1, b"too early", false));
    assert!(conn.input(Direction::Incoming, &wire).is_err());

    let goaway = frames_of_type(&recorder(&conn).output, frame_type::GOAWAY);
    assert_eq!(frame::read_u32(&goaway[0].1[4..]), error_code::PROTOCOL_ERROR);
    assert!(recorder(&conn).events.is_empty());
}

#[test]
fn test_continuation_without_headers_is_fatal() {
    init_tracing();
    let mut conn = Connection::open(
        ConnectionId(1),
        ProtocolVersion::Http2,
        Role::Server,
        Recorder::default(),
    );
    let mut wire = client_preface();
    wire.extend(frame::create_continuation_frame(1, &[0x82], true));
    assert!(conn.input(Direction::Incoming, &wire).is_err());
    assert_eq!(frames_of_type(&recorder(&conn).output, frame_type::GOAWAY).len(), 1);
}

#[test]
fn test_accumulated_block_limit() {
    init_tracing();
    let config = ParserConfig::new().max_header_block_size(2_048);
    let mut conn = Connection::with_config(
        ConnectionId(1),
        ProtocolVersion::Http2,
        Role::Server,
        Recorder::default(),
        config,
    );
    let mut peer = Peer::new();
    let block = large_request_block(&mut peer);

    let mut wire = client_preface();
    wire.extend(frame::create_headers_frame(1, &block[..1_500], true, false));
    wire.extend(frame::create_continuation_frame(1, &block[1_500..], true));
    assert!(conn.input(Direction::Incoming, &wire).is_err());

    let goaway = frames_of_type(&recorder(&conn).output, frame_type::GOAWAY);
    assert_eq!(frame::read_u32(&goaway[0].1[4..]), error_code::ENHANCE_YOUR_CALM);
}

#[test]
fn test_trailers_split_across_continuation() {
    init_tracing();
    let mut conn = Connection::open(
        ConnectionId(1),
        ProtocolVersion::Http2,
        Role::Server,
        Recorder::default(),
    );
    let mut peer = Peer::new();
    let mut wire = client_preface();
    wire.extend(peer.headers(
        1,
        &[(":method", "POST"), (":scheme", "https"), (":path", "/")],
        false,
    ));
    wire.extend(frame::create_data_frame(1, b"x", false));
    let trailers = peer.block(&[("x-digest", "abc"), ("x-count", "1")]);
    let (a, b) = trailers.split_at(trailers.len() / 2);
    wire.extend(frame::create_headers_frame(1, a, true, false));
    wire.extend(frame::create_continuation_frame(1, b, true));
    conn.input(Direction::Incoming, &wire).unwrap();

    let rec = recorder(&conn);
    let trailers = rec.events.iter().find_map(|e| match e {
        Event::H2Trailers(1, t) => Some(t.clone()),
        _ => None,
    });
    assert_eq!(trailers.and_then(|t| t.get("x-count").map(str::to_string)), Some("1".to_string()));
    assert_eq!(rec.h2_finished(), [(1, false)]);
}
