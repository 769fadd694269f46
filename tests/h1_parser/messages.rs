//! Tests for HTTP/1 message heads and keep-alive sequencing

use http12_parser::Direction;

use crate::support::{h1_client, h1_server, recorder, Event};

#[test]
fn test_simple_get_request() {
    let mut conn = h1_server();
    conn.input(Direction::Incoming, b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();

    let rec = recorder(&conn);
    assert_eq!(rec.events.len(), 2);
    let Event::H1Headers(message) = &rec.events[0] else {
        panic!("expected headers event, got {:?}", rec.events[0]);
    };
    assert_eq!(message.method(), Some("GET"));
    assert_eq!(message.url(), Some("/x"));
    assert_eq!(message.header("host"), Some("a"));
    assert!(matches!(rec.events[1], Event::H1Finished(_)));
}

#[test]
fn test_pipelined_requests_in_one_input() {
    let mut conn = h1_server();
    conn.input(
        Direction::Incoming,
        b"GET /a HTTP/1.1\r\nHost: h\r\n\r\n\
          POST /b HTTP/1.1\r\nHost: h\r\nContent-Length: 3\r\n\r\nabc\
          GET /c HTTP/1.1\r\n\r\n",
    )
    .unwrap();

    let rec = recorder(&conn);
    let urls: Vec<_> = rec.h1_heads().iter().map(|m| m.url().unwrap().to_string()).collect();
    assert_eq!(urls, ["/a", "/b", "/c"]);
    assert_eq!(rec.h1_finished().len(), 3);
    assert_eq!(rec.h1_body(), b"abc");
}

#[test]
fn test_byte_at_a_time_matches_single_input() {
    let wire: &[u8] = b"POST /upload HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\n\r\n\
5\r\nhello\r\n6\r\n world\r\n0\r\nX-Trailer: t\r\n\r\nGET /next HTTP/1.1\r\n\r\n";

    let mut whole = h1_server();
    whole.input(Direction::Incoming, wire).unwrap();

    let mut split = h1_server();
    for byte in wire {
        split.input(Direction::Incoming, std::slice::from_ref(byte)).unwrap();
    }

    let a = recorder(&whole);
    let b = recorder(&split);
    assert_eq!(a.h1_heads(), b.h1_heads());
    assert_eq!(a.h1_finished(), b.h1_finished());
    assert_eq!(a.h1_body(), b"hello world");
    assert_eq!(b.h1_body(), b"hello world");
}

#[test]
fn test_leading_blank_lines_are_skipped() {
    let mut conn = h1_server();
    conn.input(Direction::Incoming, b"\r\n\r\nGET / HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(recorder(&conn).h1_heads().len(), 1);
}

#[test]
fn test_response_to_head_has_no_body() {
    let mut conn = h1_client();
    conn.input(Direction::Outgoing, b"HEAD /doc HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
    conn.input(
        Direction::Incoming,
        b"HTTP/1.1 200 OK\r\nContent-Length: 1234\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n",
    )
    .unwrap();

    let rec = recorder(&conn);
    let codes: Vec<_> = rec
        .h1_heads()
        .iter()
        .filter_map(|m| m.status_code())
        .collect();
    assert_eq!(codes, [200, 204]);
    assert!(!rec.events.iter().any(|e| matches!(e, Event::H1DataStarted | Event::H1Data(_))));
}

#[test]
fn test_interim_response_keeps_request_pending() {
    let mut conn = h1_client();
    conn.input(Direction::Outgoing, b"HEAD / HTTP/1.1\r\n\r\n").unwrap();
    conn.input(
        Direction::Incoming,
        b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n",
    )
    .unwrap();

    let rec = recorder(&conn);
    assert_eq!(rec.h1_heads().len(), 2);
    // Both complete without a body: the 1xx by definition, the 200 because
    // it still answers the HEAD.
    assert_eq!(rec.h1_finished().len(), 2);
    assert!(rec.h1_body().is_empty());
}

#[test]
fn test_response_status_line_fields() {
    let mut conn = h1_client();
    conn.input(Direction::Incoming, b"HTTP/1.0 404 Not Found\r\nContent-Length: 0\r\n\r\n")
        .unwrap();
    let rec = recorder(&conn);
    let head = rec.h1_heads()[0];
    assert_eq!(head.status_code(), Some(404));
    assert_eq!(head.status(), Some("Not Found"));
    assert_eq!(head.version().as_str(), "HTTP/1.0");
}

#[test]
fn test_body_until_close_ends_on_disconnect() {
    let mut conn = h1_client();
    conn.input(Direction::Incoming, b"HTTP/1.1 200 OK\r\n\r\nstreamed").unwrap();
    conn.input(Direction::Incoming, b" body").unwrap();
    assert!(recorder(&conn).h1_finished().is_empty());

    conn.disconnect(Direction::Incoming).unwrap();
    let rec = recorder(&conn);
    assert_eq!(rec.h1_body(), b"streamed body");
    assert_eq!(rec.h1_finished().len(), 1);
}

#[test]
fn test_directions_are_independent() {
    let mut conn = h1_server();
    conn.input(Direction::Incoming, b"GET /in HTTP/1.1\r\n").unwrap();
    conn.input(Direction::Outgoing, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").unwrap();
    conn.input(Direction::Incoming, b"\r\n").unwrap();

    let rec = recorder(&conn);
    assert_eq!(rec.h1_heads().len(), 2);
    assert_eq!(rec.h1_heads()[0].status_code(), Some(200));
    assert_eq!(rec.h1_heads()[1].url(), Some("/in"));
}

#[test]
fn test_aborted_message_is_consumed_silently() {
    let mut conn = h1_server();
    conn.callbacks_mut().unwrap().abort = true;
    conn.input(
        Direction::Incoming,
        b"POST /a HTTP/1.1\r\nContent-Length: 4\r\n\r\nbodyGET /b HTTP/1.1\r\n\r\n",
    )
    .unwrap();

    let rec = recorder(&conn);
    assert_eq!(rec.events.len(), 2);
    assert!(rec.events.iter().all(|e| matches!(e, Event::H1Headers(_))));
    assert_eq!(rec.h1_heads()[1].url(), Some("/b"));
}
